//! Fixed sizes and the user/kernel memory layout.
//!
//! Every address space shares the same skeleton: program image at
//! `USER_BASE`, per-thread user stacks above the image (one guard page
//! between neighbors), and per-thread trap-frame pages hanging just below
//! `USER_TOP` at the same virtual address in every address space, so the
//! boundary-crossing path can locate the right frame no matter which
//! thread resumes.

use crate::task::TaskId;

/// Page size in bytes (4 KiB).
pub const PAGE_SIZE: usize = 0x1000;
/// log2 of the page size.
pub const PAGE_SHIFT: usize = 12;

/// Process table slots.
pub const NPROC: usize = 16;
/// Thread slots per process.
pub const NTHREAD: usize = 8;
/// Upper bound on tasks that can exist at once.
pub const MAX_TASKS: usize = NPROC * NTHREAD;

/// Open-descriptor slots per process.
pub const FD_MAX: usize = 16;
/// Mutex/semaphore/condvar records per process, per kind.
pub const LOCK_POOL_SIZE: usize = 8;

/// Bytes of kernel stack per thread.
pub const KSTACK_SIZE: usize = PAGE_SIZE;
/// Bytes of user stack per thread.
pub const USTACK_SIZE: usize = PAGE_SIZE;

/// Longest string a syscall will copy in from user space.
pub const MAX_STR_LEN: usize = 200;
/// Most argv entries `exec` will accept.
pub const MAX_ARG_NUM: usize = 8;

/// Program images are loaded at this virtual address.
pub const USER_BASE: u32 = 0x1000;
/// One past the highest user-visible virtual address.
pub const USER_TOP: u32 = 0x8000_0000;

/// Virtual address of the trap-frame page for thread slot `tslot`.
/// Identical in every address space.
pub const fn trap_frame_va(tslot: usize) -> u32 {
    USER_TOP - ((tslot as u32 + 1) * PAGE_SIZE as u32)
}

/// Kernel stacks live in a dedicated region with a guard-page-sized gap
/// between neighbors. These addresses are bookkeeping handles: the
/// stacks themselves are host allocations owned by the thread records.
pub const KERNEL_STACK_TOP: u32 = 0xC000_0000;

/// Top of the kernel stack belonging to `task`.
pub const fn kstack_top(task: TaskId) -> u32 {
    KERNEL_STACK_TOP - (task.index() as u32) * ((KSTACK_SIZE + PAGE_SIZE) as u32)
}

/// Reentry marker installed in every trap frame; stands in for the
/// address of the kernel trap vector.
pub const KERNEL_TRAP_VECTOR: u32 = 0xFFFF_E000;

/// Nominal cycles per second of the machine; used to convert the cycle
/// counter into wall-clock time for `get_time`.
pub const CPU_FREQ: u64 = 1_000_000;
