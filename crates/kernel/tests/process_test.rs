mod common;

use common::{boot_with, console_string, putc, putc_reg};
use kernel::ProcState;
use types::{SYS_CLONE, SYS_EXIT, SYS_GETPPID, SYS_PIPE2, SYS_READ, SYS_WAIT4, SYS_WRITE, USER_BASE};
use vm::asm::Asm;
use vm::reg;

#[test]
fn fork_exit_wait_reaps_the_child() {
    let mut a = Asm::new(USER_BASE);
    let parent = a.label();
    let bad = a.label();
    a.sys(SYS_CLONE);
    a.bne(reg::A0, reg::ZERO, parent);
    // child side of the fork
    a.li(reg::A0, 7);
    a.sys(SYS_EXIT);
    a.bind(parent);
    a.mv(reg::S0, reg::A0);
    a.addi(reg::S1, reg::SP, -16);
    a.mv(reg::A0, reg::S0);
    a.mv(reg::A1, reg::S1);
    a.sys(SYS_WAIT4);
    a.bne(reg::A0, reg::S0, bad);
    a.lw(reg::T1, reg::S1, 0);
    a.li(reg::T2, 7);
    a.bne(reg::T1, reg::T2, bad);
    putc(&mut a, b'O');
    putc(&mut a, b'K');
    a.li(reg::A0, 0);
    a.sys(SYS_EXIT);
    a.bind(bad);
    putc(&mut a, b'X');
    a.li(reg::A0, 1);
    a.sys(SYS_EXIT);

    let mut k = boot_with(vec![a.finish("forker")], "forker");
    k.run();

    assert_eq!(console_string(&k), "OK");
    // the reaped child's slot is free again
    assert_eq!(k.table.procs[1].state, ProcState::Unused);
    assert_eq!(k.table.procs[1].exit_code, 7);
    assert_eq!(k.table.procs[0].exit_code, 0);
}

#[test]
fn child_sees_its_parent_pid() {
    let mut a = Asm::new(USER_BASE);
    let parent = a.label();
    a.sys(SYS_CLONE);
    a.bne(reg::A0, reg::ZERO, parent);
    // child: print getppid as a digit (init is pid 1)
    a.sys(SYS_GETPPID);
    a.addi(reg::T1, reg::A0, 48);
    putc_reg(&mut a, reg::T1);
    a.li(reg::A0, 0);
    a.sys(SYS_EXIT);
    a.bind(parent);
    a.li(reg::A0, (-1i32) as u32);
    a.li(reg::A1, 0);
    a.sys(SYS_WAIT4);
    a.li(reg::A0, 0);
    a.sys(SYS_EXIT);

    let mut k = boot_with(vec![a.finish("ppid")], "ppid");
    k.run();
    assert_eq!(console_string(&k), "1");
}

#[test]
fn wait_without_children_fails_immediately() {
    let mut a = Asm::new(USER_BASE);
    let bad = a.label();
    a.li(reg::A0, (-1i32) as u32);
    a.li(reg::A1, 0);
    a.sys(SYS_WAIT4);
    a.li(reg::T0, (-1i32) as u32);
    a.bne(reg::A0, reg::T0, bad);
    putc(&mut a, b'n');
    a.li(reg::A0, 0);
    a.sys(SYS_EXIT);
    a.bind(bad);
    putc(&mut a, b'X');
    a.li(reg::A0, 1);
    a.sys(SYS_EXIT);

    let mut k = boot_with(vec![a.finish("lonely")], "lonely");
    k.run();
    assert_eq!(console_string(&k), "n");
}

#[test]
fn pipe_carries_a_byte_from_parent_to_child() {
    let mut a = Asm::new(USER_BASE);
    let parent = a.label();
    // int fds[2] at sp-8; fds[0] read end, fds[1] write end
    a.addi(reg::A0, reg::SP, -8);
    a.sys(SYS_PIPE2);
    a.lw(reg::S0, reg::SP, -8);
    a.lw(reg::S1, reg::SP, -4);
    a.sys(SYS_CLONE);
    a.bne(reg::A0, reg::ZERO, parent);
    // child: block reading one byte, then echo it to the console
    a.mv(reg::A0, reg::S0);
    a.addi(reg::A1, reg::SP, -16);
    a.li(reg::A2, 1);
    a.sys(SYS_READ);
    a.li(reg::A0, 1);
    a.addi(reg::A1, reg::SP, -16);
    a.li(reg::A2, 1);
    a.sys(SYS_WRITE);
    a.li(reg::A0, 0);
    a.sys(SYS_EXIT);
    a.bind(parent);
    a.mv(reg::S2, reg::A0);
    a.li(reg::T0, b'P' as u32);
    a.sw(reg::SP, -16, reg::T0);
    a.mv(reg::A0, reg::S1);
    a.addi(reg::A1, reg::SP, -16);
    a.li(reg::A2, 1);
    a.sys(SYS_WRITE);
    a.mv(reg::A0, reg::S2);
    a.li(reg::A1, 0);
    a.sys(SYS_WAIT4);
    a.li(reg::A0, 0);
    a.sys(SYS_EXIT);

    let mut k = boot_with(vec![a.finish("piper")], "piper");
    k.run();
    assert_eq!(console_string(&k), "P");
}
