//! Process and thread tables: fixed pools, linear-scan allocation,
//! explicit state machines, and the lifecycle operations built on them.

use log::{debug, info};
use types::{
    kstack_top, trap_frame_va, PagePerms, Pid, TaskId, FD_MAX, KSTACK_SIZE, LOCK_POOL_SIZE,
    NPROC, NTHREAD, PAGE_SHIFT, PAGE_SIZE, USTACK_SIZE,
};
use vm::{reg, TrapFrame};

use crate::sync::{Condvar, Mutex, Semaphore};
use crate::Kernel;

/// Byte written over a freed thread's kernel stack; catches accidental
/// use of a stale stack.
pub const KSTACK_POISON: u8 = 0x07;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcState {
    Unused,
    Active,
    /// Exited, but the exit code has not been collected by the parent.
    Zombie,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    Unused,
    /// Allocated but not yet made runnable.
    Used,
    Runnable,
    Running,
    /// Blocked on a primitive's wait queue (or on a child exiting).
    Sleeping,
    /// Terminated; the exit code waits for collection.
    Exited,
}

/// Saved kernel continuation: what a thread must finish, once it is
/// scheduled again, before it may return to user mode. This is the
/// thread's kernel context in the cooperative model — the work that a
/// stack-switching kernel would keep frozen on the thread's kernel stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resume {
    /// Nothing pending; go straight back to user code.
    User,
    /// Reacquire this mutex after a condvar wakeup, blocking again if
    /// someone else holds it.
    MutexReacquire { mutex_id: usize },
    /// Re-scan for an exited child to reap, sleeping again if none.
    WaitChild { pid: Pid, status_va: u32 },
}

#[derive(Debug)]
pub struct Thread {
    pub state: ThreadState,
    /// Slot index while live, -1 when unused.
    pub tid: i32,
    pub frame: TrapFrame,
    pub resume: Resume,
    /// Base of this thread's user stack; 0 when none was allocated.
    pub ustack: u32,
    /// Whether the thread's trap-frame page is currently mapped.
    pub frame_mapped: bool,
    pub kstack: Box<[u8]>,
    pub exit_code: i32,
}

impl Thread {
    fn new() -> Self {
        Self {
            state: ThreadState::Unused,
            tid: -1,
            frame: TrapFrame::default(),
            resume: Resume::User,
            ustack: 0,
            frame_mapped: false,
            kstack: vec![0u8; KSTACK_SIZE].into_boxed_slice(),
            exit_code: 0,
        }
    }
}

#[derive(Debug)]
pub struct Proc {
    pub state: ProcState,
    pub pid: Pid,
    /// Pid of the parent; cleared when the parent exits first.
    pub parent: Option<Pid>,
    pub exit_code: i32,
    /// Page-table root of the owned address space.
    pub root: usize,
    /// One past the highest page index of the image + stacks; the bound
    /// `fork` copies up to.
    pub max_page: u32,
    /// Where per-thread user stacks start, above the image.
    pub ustack_base: u32,
    /// Descriptor table; entries index the global file pool.
    pub files: [Option<usize>; FD_MAX],
    pub threads: Vec<Thread>,
    pub mutexes: Vec<Mutex>,
    pub next_mutex_id: usize,
    pub semaphores: Vec<Semaphore>,
    pub next_semaphore_id: usize,
    pub condvars: Vec<Condvar>,
    pub next_condvar_id: usize,
}

impl Proc {
    fn new() -> Self {
        Self {
            state: ProcState::Unused,
            pid: 0,
            parent: None,
            exit_code: 0,
            root: 0,
            max_page: 0,
            ustack_base: 0,
            files: [None; FD_MAX],
            threads: (0..NTHREAD).map(|_| Thread::new()).collect(),
            mutexes: (0..LOCK_POOL_SIZE).map(|_| Mutex::new()).collect(),
            next_mutex_id: 0,
            semaphores: (0..LOCK_POOL_SIZE).map(|_| Semaphore::new()).collect(),
            next_semaphore_id: 0,
            condvars: (0..LOCK_POOL_SIZE).map(|_| Condvar::new()).collect(),
            next_condvar_id: 0,
        }
    }

    /// Any thread that still owns the processor now or in the future.
    pub fn has_live_thread(&self) -> bool {
        self.threads.iter().any(|t| {
            matches!(
                t.state,
                ThreadState::Used
                    | ThreadState::Runnable
                    | ThreadState::Running
                    | ThreadState::Sleeping
            )
        })
    }
}

/// The fixed process pool plus the monotonic pid counter.
#[derive(Debug)]
pub struct ProcTable {
    pub procs: Vec<Proc>,
    next_pid: Pid,
}

impl ProcTable {
    pub fn new() -> Self {
        Self {
            procs: (0..NPROC).map(|_| Proc::new()).collect(),
            next_pid: 1,
        }
    }

    pub fn alloc_pid(&mut self) -> Pid {
        let pid = self.next_pid;
        self.next_pid += 1;
        pid
    }

    pub fn thread(&self, id: TaskId) -> &Thread {
        &self.procs[id.proc_slot()].threads[id.thread_slot()]
    }

    pub fn thread_mut(&mut self, id: TaskId) -> &mut Thread {
        &mut self.procs[id.proc_slot()].threads[id.thread_slot()]
    }

    /// Slot of the live process with this pid, if any.
    pub fn find_active(&self, pid: Pid) -> Option<usize> {
        self.procs
            .iter()
            .position(|p| p.state == ProcState::Active && p.pid == pid)
    }

    /// Tasks that still hold or will hold the processor.
    pub fn live_task_count(&self) -> usize {
        self.procs
            .iter()
            .flat_map(|p| p.threads.iter())
            .filter(|t| {
                matches!(
                    t.state,
                    ThreadState::Used
                        | ThreadState::Runnable
                        | ThreadState::Running
                        | ThreadState::Sleeping
                )
            })
            .count()
    }

    /// (pid, tid) of every sleeping task, for deadlock diagnostics.
    pub fn sleeping_tasks(&self) -> Vec<(Pid, i32)> {
        let mut out = Vec::new();
        for p in &self.procs {
            for t in &p.threads {
                if t.state == ThreadState::Sleeping {
                    out.push((p.pid, t.tid));
                }
            }
        }
        out
    }
}

impl Default for ProcTable {
    fn default() -> Self {
        Self::new()
    }
}

impl Kernel {
    /// Claim an unused process slot: fresh address space, cleared
    /// descriptor table, reset primitive pools, new pid. `None` when the
    /// pool is exhausted.
    pub fn allocate_process(&mut self) -> Option<usize> {
        let slot = self
            .table
            .procs
            .iter()
            .position(|p| p.state == ProcState::Unused)?;
        let root = self.machine.mem.create_root();
        let pid = self.table.alloc_pid();
        let pr = &mut self.table.procs[slot];
        pr.state = ProcState::Active;
        pr.pid = pid;
        pr.parent = None;
        pr.exit_code = 0;
        pr.root = root;
        pr.max_page = 0;
        pr.ustack_base = 0;
        pr.files = [None; FD_MAX];
        for m in &mut pr.mutexes {
            *m = Mutex::new();
        }
        pr.next_mutex_id = 0;
        for s in &mut pr.semaphores {
            *s = Semaphore::new();
        }
        pr.next_semaphore_id = 0;
        for c in &mut pr.condvars {
            *c = Condvar::new();
        }
        pr.next_condvar_id = 0;
        debug!("allocate_process: pid {} in slot {}", pid, slot);
        Some(slot)
    }

    /// Claim a thread slot in `p`. Maps the slot's trap-frame page and,
    /// when `alloc_user_res` is set, a fresh user stack; the frame is
    /// initialized so the first resumption enters user mode at `entry`.
    /// `None` when the thread array or physical memory is exhausted.
    pub fn allocate_thread(&mut self, p: usize, entry: u32, alloc_user_res: bool) -> Option<usize> {
        let t = self.table.procs[p]
            .threads
            .iter()
            .position(|t| t.state == ThreadState::Unused)?;
        let root = self.table.procs[p].root;
        if !self
            .machine
            .mem
            .map_pages(root, trap_frame_va(t), 1, PagePerms::kernel_rw())
        {
            return None;
        }
        let mut ustack = 0;
        if alloc_user_res {
            ustack = self.table.procs[p].ustack_base
                + (t as u32) * ((USTACK_SIZE + PAGE_SIZE) as u32);
            if !self
                .machine
                .mem
                .map_pages(root, ustack, USTACK_SIZE / PAGE_SIZE, PagePerms::user_rw())
            {
                self.machine.mem.unmap_pages(root, trap_frame_va(t), 1, true);
                return None;
            }
            let top_page = ((ustack as usize + USTACK_SIZE) >> PAGE_SHIFT) as u32;
            let pr = &mut self.table.procs[p];
            pr.max_page = pr.max_page.max(top_page);
        }
        let th = &mut self.table.procs[p].threads[t];
        th.state = ThreadState::Used;
        th.tid = t as i32;
        th.exit_code = 0;
        th.resume = Resume::User;
        th.ustack = ustack;
        th.frame_mapped = true;
        th.kstack.fill(0);
        th.frame = TrapFrame::default();
        th.frame.epc = entry;
        if alloc_user_res {
            th.frame.regs[reg::SP] = ustack + USTACK_SIZE as u32;
        }
        Some(t)
    }

    /// Release a thread's memory: unmap the trap frame and user stack,
    /// poison the kernel stack, drop the saved continuation. Safe to call
    /// from self-exit and again from process teardown; the state field is
    /// left for the caller to settle.
    pub fn free_thread_resources(&mut self, id: TaskId) {
        let (p, t) = (id.proc_slot(), id.thread_slot());
        let root = self.table.procs[p].root;
        let (ustack, frame_mapped) = {
            let th = &mut self.table.procs[p].threads[t];
            let pair = (th.ustack, th.frame_mapped);
            th.ustack = 0;
            th.frame_mapped = false;
            th.kstack.fill(KSTACK_POISON);
            th.resume = Resume::User;
            th.frame = TrapFrame::default();
            pair
        };
        if frame_mapped {
            self.machine.mem.unmap_pages(root, trap_frame_va(t), 1, true);
        }
        if ustack != 0 {
            self.machine
                .mem
                .unmap_pages(root, ustack, USTACK_SIZE / PAGE_SIZE, true);
        }
    }

    /// Free every thread, close every open descriptor, release the
    /// address space. Leaves pid/exit_code/state for the caller.
    fn release_process_resources(&mut self, p: usize) {
        for t in 0..NTHREAD {
            if self.table.procs[p].threads[t].state != ThreadState::Unused {
                self.free_thread_resources(TaskId::new(p, t));
                let th = &mut self.table.procs[p].threads[t];
                th.state = ThreadState::Unused;
                th.tid = -1;
            }
        }
        // drop any stale ready-queue entries for this process
        self.ready.retain(|id| id.proc_slot() != p);
        // descriptors are closed unconditionally; nothing may leak here
        for fd in 0..FD_MAX {
            if let Some(idx) = self.table.procs[p].files[fd].take() {
                self.files.close(idx);
            }
        }
        self.machine.mem.free_root(self.table.procs[p].root);
    }

    /// Undo a partially constructed process (allocation failure paths).
    pub(crate) fn abort_process(&mut self, p: usize) {
        self.release_process_resources(p);
        self.table.procs[p].state = ProcState::Unused;
    }

    /// Full teardown at end of life: resources go away, children are
    /// orphaned, and the slot either becomes a zombie for the parent to
    /// reap or frees immediately when no parent remains.
    fn exit_process(&mut self, p: usize, code: i32) {
        self.release_process_resources(p);
        self.table.procs[p].exit_code = code;
        let my_pid = self.table.procs[p].pid;
        // orphaned children will never be reaped; zombies among them
        // free right now
        for i in 0..NPROC {
            if self.table.procs[i].parent == Some(my_pid) {
                self.table.procs[i].parent = None;
                if self.table.procs[i].state == ProcState::Zombie {
                    self.table.procs[i].state = ProcState::Unused;
                }
            }
        }
        let parent_slot = self.table.procs[p]
            .parent
            .and_then(|pp| self.table.find_active(pp));
        match parent_slot {
            Some(pp) => {
                self.table.procs[p].state = ProcState::Zombie;
                self.wake_child_waiters(pp, my_pid);
            }
            None => self.table.procs[p].state = ProcState::Unused,
        }
        info!("proc {} exit with {}", my_pid, code);
    }

    /// Wake every thread of `parent` sleeping in a child wait that this
    /// child satisfies. The woken thread re-scans when scheduled.
    fn wake_child_waiters(&mut self, parent: usize, child_pid: Pid) {
        for t in 0..NTHREAD {
            let th = &self.table.procs[parent].threads[t];
            if th.state != ThreadState::Sleeping {
                continue;
            }
            if let Resume::WaitChild { pid, .. } = th.resume {
                if pid == -1 || pid == child_pid {
                    let id = TaskId::new(parent, t);
                    self.table.thread_mut(id).state = ThreadState::Runnable;
                    self.add_task(id);
                }
            }
        }
    }

    /// Terminate the calling thread. When it was the process's last live
    /// thread the whole process exits with `code`.
    pub fn exit_thread(&mut self, id: TaskId, code: i32) {
        let (p, t) = (id.proc_slot(), id.thread_slot());
        info!(
            "proc {} thread {} exit with {}",
            self.table.procs[p].pid, t, code
        );
        {
            let th = self.table.thread_mut(id);
            th.state = ThreadState::Exited;
            th.exit_code = code;
        }
        self.free_thread_resources(id);
        if !self.table.procs[p].has_live_thread() {
            self.exit_process(p, code);
        }
        self.sched(id);
    }

    /// Forcibly terminate a whole process (memory fault, illegal
    /// instruction). Scheduling of everyone else continues.
    pub fn kill_process(&mut self, p: usize, code: i32) {
        self.exit_process(p, code);
        if let Some(cur) = self.current {
            if cur.proc_slot() == p {
                self.sched(cur);
            }
        }
    }

    /// Bookkeeping constant for a thread's kernel stack top.
    pub(crate) fn kernel_stack_top(id: TaskId) -> u32 {
        kstack_top(id)
    }
}
