//! The scheduler: an unprioritized FIFO of runnable tasks and the driver
//! loop that runs them. Threads never enqueue themselves on exit or
//! block; whichever operation makes a thread runnable again (yield,
//! wakeup, fork, thread creation) is responsible for the enqueue.

use log::{debug, info};

use types::TaskId;

use crate::proc::{ProcState, Resume, ThreadState};
use crate::Kernel;

/// Why the kernel stopped scheduling. Produced only on a clean batch
/// shutdown; every other way out is a panic with diagnostics.
#[derive(Debug)]
pub struct Shutdown {
    /// Instructions retired over the whole run.
    pub retired: u64,
    /// Final cycle count.
    pub cycles: u64,
}

impl Kernel {
    /// Append a task to the ready queue.
    pub fn add_task(&mut self, id: TaskId) {
        self.ready.push(id);
    }

    /// The one seam through which a running thread gives up the
    /// processor. The caller must already have moved the thread out of
    /// `Running` (and enqueued it if it should run again); handing over a
    /// still-running thread is a kernel bug.
    pub fn sched(&mut self, id: TaskId) {
        if self.table.thread(id).state == ThreadState::Running {
            panic!("sched: thread {:?} still running", id);
        }
        self.current = None;
    }

    /// Give up the processor for one scheduling round.
    pub fn yield_now(&mut self, id: TaskId) {
        self.table.thread_mut(id).state = ThreadState::Runnable;
        self.add_task(id);
        self.sched(id);
    }

    /// Step the saved pc back onto the trapping instruction and give up
    /// the slice, so the same call is re-issued on the thread's next
    /// turn. This is how spinning and zero-progress transfers wait.
    pub(crate) fn retry_after_yield(&mut self, id: TaskId) {
        let th = self.table.thread_mut(id);
        th.frame.epc = th.frame.epc.wrapping_sub(vm::cpu::INSN_BYTES);
        self.yield_now(id);
    }

    /// Drive the machine until every task has exited.
    ///
    /// Each iteration resumes the current thread's user code until a
    /// trap, then dispatches the trap; when no thread is current, the
    /// oldest runnable task is pulled from the ready queue. An empty
    /// queue with tasks still alive means every one of them is blocked
    /// with nothing left to wake it — that is a deadlock and fatal.
    pub fn run(&mut self) -> Shutdown {
        loop {
            let id = match self.current {
                Some(id) => id,
                None => {
                    let id = match self.ready.pop() {
                        Some(id) => id,
                        None => {
                            if self.table.live_task_count() == 0 {
                                info!("scheduler: all tasks finished, shutting down");
                                return Shutdown {
                                    retired: self.machine.cpu.retired,
                                    cycles: self.machine.timer.cycles(),
                                };
                            }
                            panic!(
                                "scheduler: ready queue empty but tasks remain, sleeping: {:?}",
                                self.table.sleeping_tasks()
                            );
                        }
                    };
                    // ids can go stale while queued (their process was
                    // torn down); drop them here rather than trusting
                    // the slot
                    let state = self.table.thread(id).state;
                    if state != ThreadState::Runnable {
                        debug!("scheduler: discarding {:?} in state {:?}", id, state);
                        continue;
                    }
                    if self.table.procs[id.proc_slot()].state != ProcState::Active {
                        debug!("scheduler: discarding {:?} of dead process", id);
                        continue;
                    }
                    self.table.thread_mut(id).state = ThreadState::Running;
                    self.current = Some(id);
                    if !self.replay_resume(id) {
                        // the continuation put the thread back to sleep
                        continue;
                    }
                    id
                }
            };
            let cause = self.return_to_user(id);
            self.handle_trap(id, cause);
        }
    }

    /// Finish a thread's saved kernel continuation before it returns to
    /// user mode. Returns false when the continuation blocked or
    /// re-queued the thread instead of completing.
    pub(crate) fn replay_resume(&mut self, id: TaskId) -> bool {
        match self.table.thread(id).resume {
            Resume::User => true,
            Resume::MutexReacquire { mutex_id } => {
                let p = id.proc_slot();
                if !self.table.procs[p].mutexes[mutex_id].locked {
                    self.table.procs[p].mutexes[mutex_id].locked = true;
                    self.table.thread_mut(id).resume = Resume::User;
                    true
                } else {
                    // an unlock hands the mutex to us directly, so once
                    // woken there is nothing left to redo
                    self.table.thread_mut(id).resume = Resume::User;
                    self.table.procs[p].mutexes[mutex_id].wait.push(id);
                    self.table.thread_mut(id).state = ThreadState::Sleeping;
                    self.sched(id);
                    false
                }
            }
            Resume::WaitChild { pid, status_va } => self.wait_check(id, pid, status_va),
        }
    }
}
