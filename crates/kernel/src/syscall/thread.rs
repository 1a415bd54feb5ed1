//! Thread syscalls: creation and join-style collection.

use log::debug;

use types::{TaskId, NTHREAD};
use vm::reg;

use crate::proc::{KSTACK_POISON, ThreadState};
use crate::syscall::SysResult;
use crate::Kernel;

impl Kernel {
    /// Start a sibling thread at `entry` with `arg` in its first
    /// argument register, on a private stack. Returns the new tid or -1.
    pub fn sys_thread_create(&mut self, id: TaskId, entry: u32, arg: u32) -> SysResult {
        let p = id.proc_slot();
        let t = match self.allocate_thread(p, entry, true) {
            Some(t) => t,
            None => {
                debug!("thread_create: out of thread slots or memory");
                return SysResult::Ret(-1);
            }
        };
        let new_id = TaskId::new(p, t);
        {
            let th = self.table.thread_mut(new_id);
            th.frame.regs[reg::A0] = arg;
            th.state = ThreadState::Runnable;
        }
        self.add_task(new_id);
        SysResult::Ret(t as i32)
    }

    /// Collect an exited sibling: -1 for an unknown slot or self, -2
    /// while it is still running, otherwise its exit code. Collection
    /// frees the slot for reuse.
    pub fn sys_waittid(&mut self, id: TaskId, tid: i32) -> SysResult {
        if tid < 0 || tid as usize >= NTHREAD {
            return SysResult::Ret(-1);
        }
        let p = id.proc_slot();
        let t = tid as usize;
        if t == id.thread_slot() {
            return SysResult::Ret(-1);
        }
        let state = self.table.procs[p].threads[t].state;
        match state {
            ThreadState::Unused => SysResult::Ret(-1),
            ThreadState::Exited => {
                let code = self.table.procs[p].threads[t].exit_code;
                let th = &mut self.table.procs[p].threads[t];
                th.kstack.fill(KSTACK_POISON);
                th.tid = -1;
                th.state = ThreadState::Unused;
                SysResult::Ret(code)
            }
            _ => SysResult::Ret(-2),
        }
    }
}
