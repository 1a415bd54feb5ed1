//! Synchronization syscalls: validate the per-process handle, then run
//! the primitive. Handles are plain indices into the process's pools;
//! anything out of range or never created fails with -1 instead of
//! touching a stale record.

use log::error;

use types::TaskId;

use crate::syscall::SysResult;
use crate::Kernel;

impl Kernel {
    fn check_mutex(&self, id: TaskId, mutex_id: i32) -> Option<usize> {
        let pr = &self.table.procs[id.proc_slot()];
        if mutex_id < 0 || mutex_id as usize >= pr.next_mutex_id {
            error!("unexpected mutex id {}", mutex_id);
            return None;
        }
        Some(mutex_id as usize)
    }

    fn check_semaphore(&self, id: TaskId, sem_id: i32) -> Option<usize> {
        let pr = &self.table.procs[id.proc_slot()];
        if sem_id < 0 || sem_id as usize >= pr.next_semaphore_id {
            error!("unexpected semaphore id {}", sem_id);
            return None;
        }
        Some(sem_id as usize)
    }

    fn check_condvar(&self, id: TaskId, cond_id: i32) -> Option<usize> {
        let pr = &self.table.procs[id.proc_slot()];
        if cond_id < 0 || cond_id as usize >= pr.next_condvar_id {
            error!("unexpected condvar id {}", cond_id);
            return None;
        }
        Some(cond_id as usize)
    }

    pub fn sys_mutex_create(&mut self, id: TaskId, blocking: u32) -> SysResult {
        SysResult::Ret(self.mutex_create(id.proc_slot(), blocking != 0))
    }

    pub fn sys_mutex_lock(&mut self, id: TaskId, mutex_id: i32) -> SysResult {
        match self.check_mutex(id, mutex_id) {
            Some(m) => self.mutex_lock(id, m),
            None => SysResult::Ret(-1),
        }
    }

    pub fn sys_mutex_unlock(&mut self, id: TaskId, mutex_id: i32) -> SysResult {
        match self.check_mutex(id, mutex_id) {
            Some(m) => self.mutex_unlock(id, m),
            None => SysResult::Ret(-1),
        }
    }

    pub fn sys_semaphore_create(&mut self, id: TaskId, count: i32) -> SysResult {
        SysResult::Ret(self.semaphore_create(id.proc_slot(), count))
    }

    pub fn sys_semaphore_up(&mut self, id: TaskId, sem_id: i32) -> SysResult {
        match self.check_semaphore(id, sem_id) {
            Some(s) => self.semaphore_up(id, s),
            None => SysResult::Ret(-1),
        }
    }

    pub fn sys_semaphore_down(&mut self, id: TaskId, sem_id: i32) -> SysResult {
        match self.check_semaphore(id, sem_id) {
            Some(s) => self.semaphore_down(id, s),
            None => SysResult::Ret(-1),
        }
    }

    pub fn sys_condvar_create(&mut self, id: TaskId) -> SysResult {
        SysResult::Ret(self.condvar_create(id.proc_slot()))
    }

    pub fn sys_condvar_signal(&mut self, id: TaskId, cond_id: i32) -> SysResult {
        match self.check_condvar(id, cond_id) {
            Some(c) => self.condvar_signal(id, c),
            None => SysResult::Ret(-1),
        }
    }

    pub fn sys_condvar_wait(&mut self, id: TaskId, cond_id: i32, mutex_id: i32) -> SysResult {
        let c = match self.check_condvar(id, cond_id) {
            Some(c) => c,
            None => return SysResult::Ret(-1),
        };
        let m = match self.check_mutex(id, mutex_id) {
            Some(m) => m,
            None => return SysResult::Ret(-1),
        };
        self.condvar_wait(id, c, m)
    }
}
