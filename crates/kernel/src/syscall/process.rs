//! Process lifecycle syscalls: fork, exec, wait, and the small
//! identity/time calls.

use log::debug;

use types::{
    trap_frame_va, PagePerms, Pid, TaskId, CPU_FREQ, FD_MAX, MAX_ARG_NUM, MAX_STR_LEN, NTHREAD,
    PAGE_SIZE, USER_BASE, USTACK_SIZE,
};
use vm::memory::Access;
use vm::reg;

use crate::proc::{ProcState, Resume, ThreadState};
use crate::syscall::SysResult;
use crate::Kernel;

impl Kernel {
    /// Duplicate the calling process: eager copy of the address space up
    /// to its page bound, shared descriptor table entries, and one child
    /// thread cloned from the caller's frame. Returns the child pid to
    /// the parent; the child resumes from the same call with 0.
    pub fn sys_fork(&mut self, id: TaskId) -> SysResult {
        let p = id.proc_slot();
        let child = match self.allocate_process() {
            Some(c) => c,
            None => return SysResult::Ret(-1),
        };
        let (parent_pid, parent_root, max_page, ustack_base) = {
            let pr = &self.table.procs[p];
            (pr.pid, pr.root, pr.max_page, pr.ustack_base)
        };
        let child_root = self.table.procs[child].root;
        if !self.machine.mem.duplicate(parent_root, child_root, max_page) {
            self.abort_process(child);
            return SysResult::Ret(-1);
        }
        {
            let pr = &mut self.table.procs[child];
            pr.parent = Some(parent_pid);
            pr.max_page = max_page;
            pr.ustack_base = ustack_base;
        }
        for fd in 0..FD_MAX {
            if let Some(idx) = self.table.procs[p].files[fd] {
                self.files.dup(idx);
                self.table.procs[child].files[fd] = Some(idx);
            }
        }
        // the child's main thread reuses the caller's stack pages, which
        // the copy above already carried over
        let t = match self.allocate_thread(child, 0, false) {
            Some(t) => t,
            None => {
                self.abort_process(child);
                return SysResult::Ret(-1);
            }
        };
        let parent_frame = self.table.thread(id).frame;
        let parent_ustack = self.table.thread(id).ustack;
        let child_id = TaskId::new(child, t);
        {
            let th = self.table.thread_mut(child_id);
            th.frame = parent_frame;
            th.frame.regs[reg::A0] = 0;
            th.ustack = parent_ustack;
            th.state = ThreadState::Runnable;
        }
        self.add_task(child_id);
        let child_pid = self.table.procs[child].pid;
        debug!("fork: pid {} -> child pid {}", parent_pid, child_pid);
        SysResult::Ret(child_pid)
    }

    /// Replace the process image with the named one. Every sibling
    /// thread is dropped; the calling thread restarts at the new entry
    /// with a fresh stack. Returns argc on success, -1 (old image
    /// intact) when the path or arguments are bad.
    pub fn sys_exec(&mut self, id: TaskId, path_va: u32, argv_va: u32) -> SysResult {
        let (p, t) = (id.proc_slot(), id.thread_slot());
        let old_root = self.table.procs[p].root;
        let path = match self.machine.mem.copy_in_str(old_root, path_va, MAX_STR_LEN) {
            Some(s) => s,
            None => return SysResult::Ret(-1),
        };
        let mut args = Vec::new();
        if argv_va != 0 {
            for i in 0..MAX_ARG_NUM {
                let ptr = match self.machine.mem.load_word(
                    old_root,
                    argv_va + 4 * i as u32,
                    Access::Load,
                    false,
                ) {
                    Some(w) => w,
                    None => return SysResult::Ret(-1),
                };
                if ptr == 0 {
                    break;
                }
                match self.machine.mem.copy_in_str(old_root, ptr, MAX_STR_LEN) {
                    Some(s) => args.push(s),
                    None => return SysResult::Ret(-1),
                }
            }
        }
        let program = match self.machine.programs.get(&path) {
            Some(pr) => pr.clone(),
            None => {
                debug!("exec: no image '{}'", path);
                return SysResult::Ret(-1);
            }
        };

        // build the whole new address space before touching the old one,
        // so failure leaves the caller exactly where it was
        let new_root = self.machine.mem.create_root();
        let (max_page, ustack_base) = match self.load_image(new_root, &program) {
            Some(pair) => pair,
            None => {
                self.machine.mem.free_root(new_root);
                return SysResult::Ret(-1);
            }
        };
        if !self
            .machine
            .mem
            .map_pages(new_root, trap_frame_va(t), 1, PagePerms::kernel_rw())
        {
            self.machine.mem.free_root(new_root);
            return SysResult::Ret(-1);
        }
        let ustack = ustack_base + (t as u32) * ((USTACK_SIZE + PAGE_SIZE) as u32);
        if !self
            .machine
            .mem
            .map_pages(new_root, ustack, USTACK_SIZE / PAGE_SIZE, PagePerms::user_rw())
        {
            self.machine.mem.free_root(new_root);
            return SysResult::Ret(-1);
        }
        let (sp, argv_out, argc) =
            match self.push_args(new_root, ustack + USTACK_SIZE as u32, &args) {
                Some(triple) => triple,
                None => {
                    self.machine.mem.free_root(new_root);
                    return SysResult::Ret(-1);
                }
            };

        // commit: drop the siblings, then the old space
        for ot in 0..NTHREAD {
            if ot == t {
                continue;
            }
            if self.table.procs[p].threads[ot].state != ThreadState::Unused {
                self.free_thread_resources(TaskId::new(p, ot));
                let th = &mut self.table.procs[p].threads[ot];
                th.state = ThreadState::Unused;
                th.tid = -1;
            }
        }
        self.ready
            .retain(|q| q.proc_slot() != p || q.thread_slot() == t);
        {
            // the caller's old frame page and stack die with the root
            let th = &mut self.table.procs[p].threads[t];
            th.frame_mapped = false;
            th.ustack = 0;
        }
        self.machine.mem.free_root(old_root);

        let top_page = ((ustack as usize + USTACK_SIZE) >> types::PAGE_SHIFT) as u32;
        {
            let pr = &mut self.table.procs[p];
            pr.root = new_root;
            pr.max_page = max_page.max(top_page);
            pr.ustack_base = ustack_base;
        }
        {
            let th = self.table.thread_mut(id);
            th.frame_mapped = true;
            th.ustack = ustack;
            th.frame = vm::TrapFrame::default();
            th.frame.epc = USER_BASE + program.entry;
            th.frame.regs[reg::SP] = sp;
            th.frame.regs[reg::A1] = argv_out;
        }
        debug!("exec: pid {} now runs '{}'", self.table.procs[p].pid, path);
        SysResult::Ret(argc as i32)
    }

    /// Block until a matching child has exited, reap it, and report its
    /// exit code through `status_va`. Returns the reaped pid, or -1 when
    /// no matching child exists now or ever will.
    pub fn sys_wait(&mut self, id: TaskId, pid: Pid, status_va: u32) -> SysResult {
        self.wait_check(id, pid, status_va);
        SysResult::Done
    }

    /// One scan of the child list; called both on the way into a wait
    /// and each time the waiter is woken. Returns false when the thread
    /// went (back) to sleep.
    pub(crate) fn wait_check(&mut self, id: TaskId, pid: Pid, status_va: u32) -> bool {
        let me = id.proc_slot();
        let my_pid = self.table.procs[me].pid;
        let mut found_child = false;
        let mut zombie = None;
        for (i, pr) in self.table.procs.iter().enumerate() {
            if pr.state == ProcState::Unused || pr.parent != Some(my_pid) {
                continue;
            }
            if pid != -1 && pr.pid != pid {
                continue;
            }
            found_child = true;
            if pr.state == ProcState::Zombie {
                zombie = Some(i);
                break;
            }
        }
        if let Some(c) = zombie {
            let (child_pid, code) = (self.table.procs[c].pid, self.table.procs[c].exit_code);
            if status_va != 0 {
                let root = self.table.procs[me].root;
                if !self.machine.mem.copy_out(root, status_va, &code.to_le_bytes()) {
                    // bad status pointer: fail the call, leave the
                    // zombie for a well-formed wait
                    let th = self.table.thread_mut(id);
                    th.resume = Resume::User;
                    th.frame.set_ret(-1);
                    return true;
                }
            }
            self.table.procs[c].state = ProcState::Unused;
            let th = self.table.thread_mut(id);
            th.resume = Resume::User;
            th.frame.set_ret(child_pid);
            debug!("wait: pid {} reaped child {}", my_pid, child_pid);
            return true;
        }
        if !found_child {
            let th = self.table.thread_mut(id);
            th.resume = Resume::User;
            th.frame.set_ret(-1);
            return true;
        }
        // a child is still running; sleep until one exits
        {
            let th = self.table.thread_mut(id);
            th.resume = Resume::WaitChild { pid, status_va };
            th.state = ThreadState::Sleeping;
        }
        self.sched(id);
        false
    }

    pub fn sys_getpid(&mut self, id: TaskId) -> SysResult {
        SysResult::Ret(self.table.procs[id.proc_slot()].pid)
    }

    pub fn sys_getppid(&mut self, id: TaskId) -> SysResult {
        SysResult::Ret(self.table.procs[id.proc_slot()].parent.unwrap_or(0))
    }

    /// Write (seconds, microseconds) derived from the cycle counter.
    pub fn sys_get_time(&mut self, id: TaskId, tv_va: u32) -> SysResult {
        let cycles = self.machine.timer.cycles();
        let sec = (cycles / CPU_FREQ) as u32;
        let usec = (cycles % CPU_FREQ) as u32;
        let mut bytes = [0u8; 8];
        bytes[..4].copy_from_slice(&sec.to_le_bytes());
        bytes[4..].copy_from_slice(&usec.to_le_bytes());
        let root = self.table.procs[id.proc_slot()].root;
        if self.machine.mem.copy_out(root, tv_va, &bytes) {
            SysResult::Ret(0)
        } else {
            SysResult::Ret(-1)
        }
    }
}
