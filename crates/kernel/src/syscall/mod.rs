//! Syscall decode and dispatch. The trap handler has already advanced
//! the saved pc past the trapping instruction; here the call number
//! (`a7`) selects a handler, the six argument registers (`a0..a5`) feed
//! it, and a plain result lands back in `a0`.

pub mod fs;
pub mod process;
pub mod sync;
pub mod thread;

use log::{debug, error};

use types::*;

use crate::Kernel;

/// What a handler did with the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SysResult {
    /// Plain result: store into the return register, keep running.
    Ret(i32),
    /// The handler staged the return value (if any) and possibly
    /// switched the thread away itself.
    Done,
}

impl Kernel {
    pub fn dispatch_syscall(&mut self, id: TaskId, no: u32, args: [u32; 6]) -> SysResult {
        if no != SYS_WRITE && no != SYS_READ && no != SYS_SCHED_YIELD {
            debug!(
                "syscall {} args = [{:x}, {:x}, {:x}, {:x}, {:x}, {:x}]",
                no, args[0], args[1], args[2], args[3], args[4], args[5]
            );
        }
        match no {
            SYS_OPENAT => self.sys_openat(id, args[0], args[1]),
            SYS_CLOSE => self.sys_close(id, args[0] as i32),
            SYS_PIPE2 => self.sys_pipe(id, args[0]),
            SYS_READ => self.sys_read(id, args[0] as i32, args[1], args[2]),
            SYS_WRITE => self.sys_write(id, args[0] as i32, args[1], args[2]),
            SYS_EXIT => {
                self.exit_thread(id, args[0] as i32);
                SysResult::Done
            }
            SYS_SCHED_YIELD => {
                self.yield_now(id);
                SysResult::Done
            }
            SYS_GETTIMEOFDAY => self.sys_get_time(id, args[0]),
            SYS_GETPID => self.sys_getpid(id),
            SYS_GETPPID => self.sys_getppid(id),
            SYS_CLONE => self.sys_fork(id),
            SYS_EXECVE => self.sys_exec(id, args[0], args[1]),
            SYS_WAIT4 => self.sys_wait(id, args[0] as i32, args[1]),
            SYS_THREAD_CREATE => self.sys_thread_create(id, args[0], args[1]),
            SYS_GETTID => SysResult::Ret(id.thread_slot() as i32),
            SYS_WAITTID => self.sys_waittid(id, args[0] as i32),
            SYS_MUTEX_CREATE => self.sys_mutex_create(id, args[0]),
            SYS_MUTEX_LOCK => self.sys_mutex_lock(id, args[0] as i32),
            SYS_MUTEX_UNLOCK => self.sys_mutex_unlock(id, args[0] as i32),
            SYS_SEMAPHORE_CREATE => self.sys_semaphore_create(id, args[0] as i32),
            SYS_SEMAPHORE_UP => self.sys_semaphore_up(id, args[0] as i32),
            SYS_SEMAPHORE_DOWN => self.sys_semaphore_down(id, args[0] as i32),
            SYS_CONDVAR_CREATE => self.sys_condvar_create(id),
            SYS_CONDVAR_SIGNAL => self.sys_condvar_signal(id, args[0] as i32),
            SYS_CONDVAR_WAIT => self.sys_condvar_wait(id, args[0] as i32, args[1] as i32),
            _ => {
                error!("unknown syscall {}", no);
                SysResult::Ret(-1)
            }
        }
    }
}
