//! The execution core: process/thread tables, the ready-queue scheduler,
//! the trap dispatcher, and the blocking synchronization primitives.
//!
//! The whole kernel is one owned value. There is a single execution
//! unit: concurrency is cooperative interleaving of kernel-mode work
//! between traps, never parallelism, so leaving every structure
//! consistent across each voluntary switch is the only locking needed.
//! A thread gives up the processor at exactly three points: the timer
//! trap, an explicit yield, and blocking inside a primitive.

pub mod file;
pub mod loader;
pub mod proc;
pub mod queue;
pub mod sched;
pub mod sync;
pub mod syscall;
pub mod trap;

pub use proc::{Proc, ProcState, ProcTable, Resume, Thread, ThreadState};
pub use queue::TaskQueue;
pub use sched::Shutdown;
pub use syscall::SysResult;

use file::FilePool;
use types::MAX_TASKS;
use vm::{Machine, MachineConfig};

pub use types::TaskId;

/// The kernel: machine underneath, tables and queues on top.
#[derive(Debug)]
pub struct Kernel {
    pub machine: Machine,
    pub table: ProcTable,
    pub ready: TaskQueue,
    pub current: Option<TaskId>,
    pub files: FilePool,
}

impl Kernel {
    pub fn new(config: MachineConfig) -> Self {
        Self {
            machine: Machine::new(config),
            table: ProcTable::new(),
            ready: TaskQueue::new(MAX_TASKS),
            current: None,
            files: FilePool::new(),
        }
    }

    /// Make an executable image available to `spawn` and `exec`.
    pub fn install_program(&mut self, program: vm::Program) {
        self.machine.programs.insert(program);
    }
}
