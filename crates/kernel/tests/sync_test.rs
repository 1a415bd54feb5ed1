//! Primitive state machines driven directly through the kernel API,
//! with threads staged by hand.

use kernel::{Kernel, SysResult, TaskId, ThreadState};
use types::LOCK_POOL_SIZE;
use vm::MachineConfig;

/// A process with three staged threads; returns (kernel, pslot, ids).
fn staged() -> (Kernel, usize, [TaskId; 3]) {
    let mut k = Kernel::new(MachineConfig::default());
    let p = k.allocate_process().unwrap();
    k.table.procs[p].ustack_base = 0x10_0000;
    let mut ids = [TaskId::new(0, 0); 3];
    for slot in &mut ids {
        let t = k.allocate_thread(p, 0x1000, true).unwrap();
        *slot = TaskId::new(p, t);
    }
    (k, p, ids)
}

fn make_running(k: &mut Kernel, id: TaskId) {
    k.table.thread_mut(id).state = ThreadState::Running;
    k.current = Some(id);
}

#[test]
fn pools_are_monotonic_and_bounded() {
    let (mut k, p, _) = staged();
    for expect in 0..LOCK_POOL_SIZE {
        assert_eq!(k.mutex_create(p, true), expect as i32);
    }
    assert_eq!(k.mutex_create(p, true), -1);
    assert_eq!(k.semaphore_create(p, 0), 0);
    assert_eq!(k.condvar_create(p), 0);
}

#[test]
fn blocking_mutex_hands_off_in_fifo_order() {
    let (mut k, p, [t1, t2, t3]) = staged();
    let m = k.mutex_create(p, true) as usize;

    make_running(&mut k, t1);
    assert_eq!(k.mutex_lock(t1, m), SysResult::Ret(0));
    assert!(k.table.procs[p].mutexes[m].locked);

    // t2 then t3 block on the held mutex
    make_running(&mut k, t2);
    assert_eq!(k.mutex_lock(t2, m), SysResult::Done);
    assert_eq!(k.table.thread(t2).state, ThreadState::Sleeping);
    make_running(&mut k, t3);
    assert_eq!(k.mutex_lock(t3, m), SysResult::Done);
    assert_eq!(k.table.thread(t3).state, ThreadState::Sleeping);

    // unlock wakes exactly the first waiter and keeps the lock held
    make_running(&mut k, t1);
    assert_eq!(k.mutex_unlock(t1, m), SysResult::Ret(0));
    assert_eq!(k.table.thread(t2).state, ThreadState::Runnable);
    assert_eq!(k.table.thread(t3).state, ThreadState::Sleeping);
    assert!(
        k.table.procs[p].mutexes[m].locked,
        "handoff must never drop the lock"
    );
    assert_eq!(k.ready.pop(), Some(t2));
    assert!(k.ready.is_empty());

    // and again for the second waiter
    assert_eq!(k.mutex_unlock(t2, m), SysResult::Ret(0));
    assert_eq!(k.table.thread(t3).state, ThreadState::Runnable);
    assert!(k.table.procs[p].mutexes[m].locked);

    // no waiters left: the flag finally clears
    assert_eq!(k.mutex_unlock(t3, m), SysResult::Ret(0));
    assert!(!k.table.procs[p].mutexes[m].locked);
}

#[test]
fn semaphore_count_mirrors_the_wait_queue() {
    let (mut k, p, [t1, t2, _]) = staged();
    let s = k.semaphore_create(p, 0) as usize;

    make_running(&mut k, t1);
    assert_eq!(k.semaphore_down(t1, s), SysResult::Done);
    assert_eq!(k.table.procs[p].semaphores[s].count, -1);
    assert_eq!(k.table.procs[p].semaphores[s].wait.len(), 1);
    assert_eq!(k.table.thread(t1).state, ThreadState::Sleeping);

    make_running(&mut k, t2);
    assert_eq!(k.semaphore_up(t2, s), SysResult::Ret(0));
    assert_eq!(k.table.procs[p].semaphores[s].count, 0);
    assert_eq!(k.table.procs[p].semaphores[s].wait.len(), 0);
    assert_eq!(k.table.thread(t1).state, ThreadState::Runnable);

    // an up with nobody waiting just banks the count
    assert_eq!(k.semaphore_up(t2, s), SysResult::Ret(0));
    assert_eq!(k.table.procs[p].semaphores[s].count, 1);
    assert_eq!(k.semaphore_down(t2, s), SysResult::Ret(0));
    assert_eq!(k.table.thread(t2).state, ThreadState::Running);
}

#[test]
#[should_panic(expected = "wait queue is empty")]
fn semaphore_wake_from_empty_queue_is_fatal() {
    let (mut k, p, [t1, _, _]) = staged();
    let s = k.semaphore_create(p, 0) as usize;
    // corrupt the invariant behind the kernel's back
    k.table.procs[p].semaphores[s].count = -1;
    make_running(&mut k, t1);
    let _ = k.semaphore_up(t1, s);
}

#[test]
fn condvar_signal_is_a_noop_without_waiters() {
    let (mut k, p, [t1, _, _]) = staged();
    let c = k.condvar_create(p) as usize;
    make_running(&mut k, t1);
    assert_eq!(k.condvar_signal(t1, c), SysResult::Ret(0));
    assert!(k.ready.is_empty());
}

#[test]
fn condvar_wait_releases_and_reacquires_the_mutex() {
    let (mut k, p, [t1, t2, _]) = staged();
    let m = k.mutex_create(p, true) as usize;
    let c = k.condvar_create(p) as usize;

    make_running(&mut k, t1);
    assert_eq!(k.mutex_lock(t1, m), SysResult::Ret(0));
    assert_eq!(k.condvar_wait(t1, c, m), SysResult::Done);
    // the mutex was released on the way to sleep
    assert!(!k.table.procs[p].mutexes[m].locked);
    assert_eq!(k.table.thread(t1).state, ThreadState::Sleeping);

    // signal moves the waiter to the ready queue with the reacquire
    // continuation pending
    make_running(&mut k, t2);
    assert_eq!(k.condvar_signal(t2, c), SysResult::Ret(0));
    assert_eq!(k.table.thread(t1).state, ThreadState::Runnable);
    assert_eq!(
        k.table.thread(t1).resume,
        kernel::Resume::MutexReacquire { mutex_id: m }
    );
}

#[test]
fn sync_handles_are_validated() {
    let (mut k, _, [t1, _, _]) = staged();
    make_running(&mut k, t1);
    // nothing created yet: every handle is stale
    assert_eq!(k.sys_mutex_lock(t1, 0), SysResult::Ret(-1));
    assert_eq!(k.sys_semaphore_up(t1, -3), SysResult::Ret(-1));
    assert_eq!(k.sys_condvar_signal(t1, 7), SysResult::Ret(-1));
}
