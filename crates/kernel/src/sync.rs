//! Blocking synchronization primitives. Each record owns a private FIFO
//! wait queue; the operations move threads between that queue, the
//! thread table, and the ready queue. Records live in fixed per-process
//! pools with monotonic allocation and no destroy/reuse.
//!
//! Between a thread deciding to block and the switch away nothing else
//! runs, so "push on the wait queue, mark sleeping, switch" is atomic
//! with respect to every other thread — there is no missed-wakeup
//! window to close.

use log::debug;

use types::{TaskId, LOCK_POOL_SIZE, NTHREAD};

use crate::proc::{Resume, ThreadState};
use crate::queue::TaskQueue;
use crate::syscall::SysResult;
use crate::Kernel;

/// Mutex; the variant is fixed at creation. A spinning mutex has no use
/// for its wait queue and never touches it.
#[derive(Debug)]
pub struct Mutex {
    pub blocking: bool,
    pub locked: bool,
    pub wait: TaskQueue,
}

impl Mutex {
    pub fn new() -> Self {
        Self {
            blocking: false,
            locked: false,
            wait: TaskQueue::new(NTHREAD),
        }
    }
}

impl Default for Mutex {
    fn default() -> Self {
        Self::new()
    }
}

/// Counting semaphore. Invariant: count < 0 exactly when |count| threads
/// sit in the wait queue.
#[derive(Debug)]
pub struct Semaphore {
    pub count: i32,
    pub wait: TaskQueue,
}

impl Semaphore {
    pub fn new() -> Self {
        Self {
            count: 0,
            wait: TaskQueue::new(NTHREAD),
        }
    }
}

impl Default for Semaphore {
    fn default() -> Self {
        Self::new()
    }
}

/// Condition variable: a wait queue and nothing else — no count, so a
/// signal with nobody waiting is a legal no-op.
#[derive(Debug)]
pub struct Condvar {
    pub wait: TaskQueue,
}

impl Condvar {
    pub fn new() -> Self {
        Self {
            wait: TaskQueue::new(NTHREAD),
        }
    }
}

impl Default for Condvar {
    fn default() -> Self {
        Self::new()
    }
}

impl Kernel {
    pub fn mutex_create(&mut self, p: usize, blocking: bool) -> i32 {
        let pr = &mut self.table.procs[p];
        if pr.next_mutex_id >= LOCK_POOL_SIZE {
            return -1;
        }
        let id = pr.next_mutex_id;
        pr.next_mutex_id += 1;
        pr.mutexes[id] = Mutex {
            blocking,
            locked: false,
            wait: TaskQueue::new(NTHREAD),
        };
        id as i32
    }

    pub fn mutex_lock(&mut self, id: TaskId, mutex_id: usize) -> SysResult {
        let p = id.proc_slot();
        let (blocking, locked) = {
            let m = &self.table.procs[p].mutexes[mutex_id];
            (m.blocking, m.locked)
        };
        if !locked {
            self.table.procs[p].mutexes[mutex_id].locked = true;
            debug!("lock a free mutex");
            return SysResult::Ret(0);
        }
        if !blocking {
            // spinning variant: re-issue the whole call after a yield
            debug!("spin for held mutex");
            self.retry_after_yield(id);
            return SysResult::Done;
        }
        self.table.procs[p].mutexes[mutex_id].wait.push(id);
        {
            let th = self.table.thread_mut(id);
            th.state = ThreadState::Sleeping;
            th.frame.set_ret(0);
        }
        debug!("block to wait for mutex");
        self.sched(id);
        SysResult::Done
    }

    pub fn mutex_unlock(&mut self, id: TaskId, mutex_id: usize) -> SysResult {
        self.mutex_unlock_inner(id.proc_slot(), mutex_id);
        SysResult::Ret(0)
    }

    /// Shared by `mutex_unlock` and the release half of `condvar_wait`.
    /// A blocking mutex with waiters is handed to the first of them
    /// directly: the locked flag never clears in between, so no third
    /// party can steal the lock during the wakeup.
    pub(crate) fn mutex_unlock_inner(&mut self, p: usize, mutex_id: usize) {
        let blocking = self.table.procs[p].mutexes[mutex_id].blocking;
        if !blocking {
            self.table.procs[p].mutexes[mutex_id].locked = false;
            return;
        }
        let waiter = loop {
            match self.table.procs[p].mutexes[mutex_id].wait.pop() {
                None => break None,
                Some(w) => {
                    if self.table.thread(w).state == ThreadState::Sleeping {
                        break Some(w);
                    }
                    debug!("mutex: skipping stale waiter {:?}", w);
                }
            }
        };
        match waiter {
            Some(w) => {
                self.table.thread_mut(w).state = ThreadState::Runnable;
                self.add_task(w);
                debug!("blocking mutex passed to {:?}", w);
            }
            None => {
                self.table.procs[p].mutexes[mutex_id].locked = false;
                debug!("blocking mutex released");
            }
        }
    }

    pub fn semaphore_create(&mut self, p: usize, count: i32) -> i32 {
        let pr = &mut self.table.procs[p];
        if pr.next_semaphore_id >= LOCK_POOL_SIZE {
            return -1;
        }
        let id = pr.next_semaphore_id;
        pr.next_semaphore_id += 1;
        pr.semaphores[id] = Semaphore {
            count,
            wait: TaskQueue::new(NTHREAD),
        };
        id as i32
    }

    pub fn semaphore_up(&mut self, id: TaskId, sem_id: usize) -> SysResult {
        let p = id.proc_slot();
        let count = {
            let s = &mut self.table.procs[p].semaphores[sem_id];
            s.count += 1;
            s.count
        };
        if count <= 0 {
            // someone must be queued; the counter says so
            let waiter = loop {
                match self.table.procs[p].semaphores[sem_id].wait.pop() {
                    None => panic!(
                        "semaphore: count {} after up but wait queue is empty",
                        count
                    ),
                    Some(w) => {
                        if self.table.thread(w).state == ThreadState::Sleeping {
                            break w;
                        }
                        debug!("semaphore: skipping stale waiter {:?}", w);
                    }
                }
            };
            self.table.thread_mut(waiter).state = ThreadState::Runnable;
            self.add_task(waiter);
            debug!("semaphore up and wake {:?}", waiter);
        }
        SysResult::Ret(0)
    }

    pub fn semaphore_down(&mut self, id: TaskId, sem_id: usize) -> SysResult {
        let p = id.proc_slot();
        let count = {
            let s = &mut self.table.procs[p].semaphores[sem_id];
            s.count -= 1;
            s.count
        };
        if count < 0 {
            self.table.procs[p].semaphores[sem_id].wait.push(id);
            {
                let th = self.table.thread_mut(id);
                th.state = ThreadState::Sleeping;
                th.frame.set_ret(0);
            }
            debug!("semaphore down to {} and wait", count);
            self.sched(id);
            return SysResult::Done;
        }
        SysResult::Ret(0)
    }

    pub fn condvar_create(&mut self, p: usize) -> i32 {
        let pr = &mut self.table.procs[p];
        if pr.next_condvar_id >= LOCK_POOL_SIZE {
            return -1;
        }
        let id = pr.next_condvar_id;
        pr.next_condvar_id += 1;
        pr.condvars[id] = Condvar {
            wait: TaskQueue::new(NTHREAD),
        };
        id as i32
    }

    pub fn condvar_signal(&mut self, id: TaskId, cond_id: usize) -> SysResult {
        let p = id.proc_slot();
        let waiter = loop {
            match self.table.procs[p].condvars[cond_id].wait.pop() {
                None => break None,
                Some(w) => {
                    if self.table.thread(w).state == ThreadState::Sleeping {
                        break Some(w);
                    }
                    debug!("condvar: skipping stale waiter {:?}", w);
                }
            }
        };
        match waiter {
            Some(w) => {
                self.table.thread_mut(w).state = ThreadState::Runnable;
                self.add_task(w);
                debug!("signal wakes {:?}", w);
            }
            None => debug!("signal with no waiter"),
        }
        SysResult::Ret(0)
    }

    /// Release the mutex, sleep on the condvar, and reacquire the mutex
    /// before returning to user code. The reacquire happens through the
    /// thread's saved continuation once it is woken; keeping the guarded
    /// invariant true across the check is the caller's job.
    pub fn condvar_wait(&mut self, id: TaskId, cond_id: usize, mutex_id: usize) -> SysResult {
        let p = id.proc_slot();
        self.mutex_unlock_inner(p, mutex_id);
        self.table.procs[p].condvars[cond_id].wait.push(id);
        {
            let th = self.table.thread_mut(id);
            th.state = ThreadState::Sleeping;
            th.resume = Resume::MutexReacquire { mutex_id };
            th.frame.set_ret(0);
        }
        debug!("wait for cond");
        self.sched(id);
        SysResult::Done
    }
}
