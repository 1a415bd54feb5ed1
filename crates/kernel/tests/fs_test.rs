mod common;

use common::{boot_with, console_string, putc};
use types::{
    O_CREATE, O_RDONLY, O_RDWR, SYS_CLOSE, SYS_EXIT, SYS_OPENAT, SYS_READ, SYS_WRITE, USER_BASE,
};
use vm::asm::Asm;
use vm::reg;

#[test]
fn create_write_reopen_read() {
    let mut a = Asm::new(USER_BASE);
    let path = a.label();
    let bad = a.label();

    a.li_label(reg::A0, path);
    a.li(reg::A1, O_CREATE | O_RDWR);
    a.sys(SYS_OPENAT);
    a.li(reg::T0, (-1i32) as u32);
    a.beq(reg::A0, reg::T0, bad);
    a.mv(reg::S0, reg::A0);

    a.li(reg::T0, u32::from_le_bytes(*b"xy\0\0"));
    a.sw(reg::SP, -4, reg::T0);
    a.mv(reg::A0, reg::S0);
    a.addi(reg::A1, reg::SP, -4);
    a.li(reg::A2, 2);
    a.sys(SYS_WRITE);

    a.mv(reg::A0, reg::S0);
    a.sys(SYS_CLOSE);

    a.li_label(reg::A0, path);
    a.li(reg::A1, O_RDONLY);
    a.sys(SYS_OPENAT);
    a.mv(reg::S0, reg::A0);
    a.mv(reg::A0, reg::S0);
    a.addi(reg::A1, reg::SP, -8);
    a.li(reg::A2, 2);
    a.sys(SYS_READ);
    a.li(reg::T0, 2);
    a.bne(reg::A0, reg::T0, bad);

    a.li(reg::A0, 1);
    a.addi(reg::A1, reg::SP, -8);
    a.li(reg::A2, 2);
    a.sys(SYS_WRITE);
    a.mv(reg::A0, reg::S0);
    a.sys(SYS_CLOSE);
    a.li(reg::A0, 0);
    a.sys(SYS_EXIT);

    a.bind(bad);
    putc(&mut a, b'X');
    a.li(reg::A0, 1);
    a.sys(SYS_EXIT);

    a.bind(path);
    a.word(u32::from_le_bytes(*b"f\0\0\0"));

    let mut k = boot_with(vec![a.finish("fileio")], "fileio");
    k.run();
    assert_eq!(console_string(&k), "xy");
    // the node outlives the process
    assert_eq!(k.files.nodes[0].data, b"xy");
}

#[test]
fn descriptors_are_validated() {
    let mut a = Asm::new(USER_BASE);
    let bad = a.label();
    // fd 9 was never opened
    a.li(reg::A0, 9);
    a.addi(reg::A1, reg::SP, -4);
    a.li(reg::A2, 1);
    a.sys(SYS_WRITE);
    a.li(reg::T0, (-1i32) as u32);
    a.bne(reg::A0, reg::T0, bad);
    putc(&mut a, b'e');
    a.li(reg::A0, 0);
    a.sys(SYS_EXIT);
    a.bind(bad);
    putc(&mut a, b'X');
    a.li(reg::A0, 1);
    a.sys(SYS_EXIT);

    let mut k = boot_with(vec![a.finish("badfd")], "badfd");
    k.run();
    assert_eq!(console_string(&k), "e");
}

#[test]
fn stdin_reads_queued_console_input() {
    let mut a = Asm::new(USER_BASE);
    a.li(reg::A0, 0);
    a.addi(reg::A1, reg::SP, -4);
    a.li(reg::A2, 1);
    a.sys(SYS_READ);
    a.li(reg::A0, 1);
    a.addi(reg::A1, reg::SP, -4);
    a.li(reg::A2, 1);
    a.sys(SYS_WRITE);
    a.li(reg::A0, 0);
    a.sys(SYS_EXIT);

    let mut k = boot_with(vec![a.finish("echo")], "echo");
    k.machine.console.feed_input(b"z");
    k.run();
    assert_eq!(console_string(&k), "z");
}
