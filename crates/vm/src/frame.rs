use core::fmt;

use crate::reg;

/// Words in a serialized trap frame.
pub const TRAP_FRAME_WORDS: usize = 4 + reg::NREGS;
/// Bytes in a serialized trap frame; one frame fits well inside its page.
pub const TRAP_FRAME_BYTES: usize = TRAP_FRAME_WORDS * 4;

/// Fixed-layout record of one thread's user-visible register state plus
/// the kernel-reentry bookkeeping the boundary-crossing path relies on.
/// The kernel writes each thread's frame through to a per-thread page
/// mapped at the same virtual address in every address space.
#[derive(Clone, Copy, Default)]
pub struct TrapFrame {
    /// Kernel page-table root to reinstall on the next trap.
    pub kernel_root: u32,
    /// Top of the owning thread's kernel stack.
    pub kernel_sp: u32,
    /// Kernel reentry address.
    pub kernel_trap: u32,
    /// Saved user program counter.
    pub epc: u32,
    /// General-purpose registers x0-x31 (x0 reads as zero).
    pub regs: [u32; reg::NREGS],
}

impl TrapFrame {
    /// Syscall argument `n` (0..=5), per the register convention.
    pub fn arg(&self, n: usize) -> u32 {
        self.regs[reg::A0 + n]
    }

    /// Syscall number register.
    pub fn syscall_id(&self) -> u32 {
        self.regs[reg::A7]
    }

    /// Store a syscall result.
    pub fn set_ret(&mut self, value: i32) {
        self.regs[reg::A0] = value as u32;
    }

    /// Serialize to the fixed on-page layout (little-endian words).
    pub fn to_le_bytes(&self) -> [u8; TRAP_FRAME_BYTES] {
        let mut words = [0u32; TRAP_FRAME_WORDS];
        words[0] = self.kernel_root;
        words[1] = self.kernel_sp;
        words[2] = self.kernel_trap;
        words[3] = self.epc;
        words[4..].copy_from_slice(&self.regs);
        let mut out = [0u8; TRAP_FRAME_BYTES];
        for (i, w) in words.iter().enumerate() {
            out[i * 4..i * 4 + 4].copy_from_slice(&w.to_le_bytes());
        }
        out
    }
}

impl fmt::Debug for TrapFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrapFrame")
            .field("epc", &format_args!("0x{:08x}", self.epc))
            .field("sp", &format_args!("0x{:08x}", self.regs[reg::SP]))
            .field("a0", &self.regs[reg::A0])
            .finish()
    }
}
