#![allow(dead_code)]

use kernel::Kernel;
use types::{SYS_SCHED_YIELD, SYS_WAITTID, SYS_WRITE};
use vm::asm::Asm;
use vm::{reg, MachineConfig, Program};

/// Build a kernel, install the given images, and start `init`.
pub fn boot_with(programs: Vec<Program>, init: &str) -> Kernel {
    boot_with_config(programs, init, MachineConfig::default())
}

pub fn boot_with_config(programs: Vec<Program>, init: &str, config: MachineConfig) -> Kernel {
    let mut k = Kernel::new(config);
    for p in programs {
        k.install_program(p);
    }
    k.spawn(init).expect("init image missing");
    k
}

pub fn console_string(k: &Kernel) -> String {
    String::from_utf8_lossy(k.machine.console.output()).into_owned()
}

/// Emit "write one byte to stdout". Clobbers t0, a0, a1, a2, a7 and the
/// word just below the stack pointer.
pub fn putc(a: &mut Asm, c: u8) {
    a.li(reg::T0, c as u32);
    a.sw(reg::SP, -4, reg::T0);
    putc_reg_common(a);
}

/// Emit "write the low byte of `rs` to stdout". Same clobbers as `putc`.
pub fn putc_reg(a: &mut Asm, rs: usize) {
    a.sw(reg::SP, -4, rs);
    putc_reg_common(a);
}

fn putc_reg_common(a: &mut Asm) {
    a.addi(reg::A1, reg::SP, -4);
    a.li(reg::A0, 1);
    a.li(reg::A2, 1);
    a.sys(SYS_WRITE);
}

/// Emit a join loop on a sibling's tid: retry while `waittid` says "not
/// yet" (-2), yielding between attempts. Leaves the exit code in a0.
/// Clobbers t0 and a7.
pub fn emit_join(a: &mut Asm, tid: u32) {
    let again = a.label();
    let done = a.label();
    a.bind(again);
    a.li(reg::A0, tid);
    a.sys(SYS_WAITTID);
    a.li(reg::T0, (-2i32) as u32);
    a.bne(reg::A0, reg::T0, done);
    a.sys(SYS_SCHED_YIELD);
    a.jal(reg::ZERO, again);
    a.bind(done);
}
