use core::fmt;

use crate::layout::{NPROC, NTHREAD};

/// Process identifier. Assigned monotonically and never reused while the
/// kernel runs, so a pid uniquely names a process for the lifetime of any
/// parent/child relationship.
pub type Pid = i32;

/// Compact task identifier naming one thread as (process slot, thread
/// slot). This is what travels through the ready queue and every wait
/// queue. It names table slots, not pids: consumers must check that the
/// slot still holds a thread in the state they expect before acting on it.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u16);

impl TaskId {
    pub const fn new(pslot: usize, tslot: usize) -> Self {
        debug_assert!(pslot < NPROC && tslot < NTHREAD);
        TaskId((pslot * NTHREAD + tslot) as u16)
    }

    /// Process-table slot this task belongs to.
    pub const fn proc_slot(self) -> usize {
        self.0 as usize / NTHREAD
    }

    /// Thread-array slot within the owning process.
    pub const fn thread_slot(self) -> usize {
        self.0 as usize % NTHREAD
    }

    /// Flat index in `0..MAX_TASKS`.
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}t{}", self.proc_slot(), self.thread_slot())
    }
}
