mod common;

use common::{boot_with, console_string, putc};
use kernel::ProcState;
use types::{EXIT_FAULT, EXIT_ILLEGAL, SYS_EXECVE, SYS_EXIT, SYS_WRITE, USER_BASE};
use vm::asm::Asm;
use vm::{reg, Program};

#[test]
fn init_writes_to_the_console_and_exits() {
    let mut a = Asm::new(USER_BASE);
    // "hi" as one little-endian word just below the stack pointer
    a.li(reg::T0, u32::from_le_bytes(*b"hi\0\0"));
    a.sw(reg::SP, -4, reg::T0);
    a.addi(reg::A1, reg::SP, -4);
    a.li(reg::A0, 1);
    a.li(reg::A2, 2);
    a.sys(SYS_WRITE);
    a.li(reg::A0, 0);
    a.sys(SYS_EXIT);
    let mut k = boot_with(vec![a.finish("hello")], "hello");

    let shutdown = k.run();
    assert_eq!(console_string(&k), "hi");
    assert!(shutdown.retired > 0);
    assert_eq!(k.table.procs[0].state, ProcState::Unused);
    assert_eq!(k.table.procs[0].exit_code, 0);
}

#[test]
fn unknown_syscall_number_returns_minus_one() {
    let mut a = Asm::new(USER_BASE);
    let bad = a.label();
    a.sys(9999);
    a.li(reg::T0, (-1i32) as u32);
    a.bne(reg::A0, reg::T0, bad);
    putc(&mut a, b'u');
    a.li(reg::A0, 0);
    a.sys(SYS_EXIT);
    a.bind(bad);
    putc(&mut a, b'X');
    a.li(reg::A0, 1);
    a.sys(SYS_EXIT);
    let mut k = boot_with(vec![a.finish("nosys")], "nosys");

    k.run();
    assert_eq!(console_string(&k), "u");
}

#[test]
fn store_fault_kills_only_the_offending_process() {
    let mut a = Asm::new(USER_BASE);
    a.li(reg::T0, 0x4000_0000);
    a.sw(reg::T0, 0, reg::ZERO);
    putc(&mut a, b'X'); // never reached
    a.li(reg::A0, 0);
    a.sys(SYS_EXIT);
    let mut k = boot_with(vec![a.finish("wild")], "wild");

    k.run();
    assert_eq!(console_string(&k), "");
    assert_eq!(k.table.procs[0].state, ProcState::Unused);
    assert_eq!(k.table.procs[0].exit_code, EXIT_FAULT);
}

#[test]
fn illegal_instruction_gets_its_own_exit_code() {
    let mut k = boot_with(vec![Program::new("zeroes", vec![0, 0], 0)], "zeroes");
    k.run();
    assert_eq!(k.table.procs[0].exit_code, EXIT_ILLEGAL);
}

#[test]
fn exec_replaces_the_image() {
    let mut a = Asm::new(USER_BASE);
    let path = a.label();
    a.li_label(reg::A0, path);
    a.li(reg::A1, 0);
    a.sys(SYS_EXECVE);
    // only reached when exec failed
    putc(&mut a, b'X');
    a.li(reg::A0, 1);
    a.sys(SYS_EXIT);
    a.bind(path);
    a.word(u32::from_le_bytes(*b"seco"));
    a.word(u32::from_le_bytes(*b"nd\0\0"));
    let first = a.finish("first");

    let mut b = Asm::new(USER_BASE);
    putc(&mut b, b'E');
    b.li(reg::A0, 0);
    b.sys(SYS_EXIT);
    let second = b.finish("second");

    let mut k = boot_with(vec![first, second], "first");
    k.run();
    assert_eq!(console_string(&k), "E");
    assert_eq!(k.table.procs[0].exit_code, 0);
}

#[test]
fn exec_of_a_missing_image_fails_cleanly() {
    let mut a = Asm::new(USER_BASE);
    let path = a.label();
    let bad = a.label();
    a.li_label(reg::A0, path);
    a.li(reg::A1, 0);
    a.sys(SYS_EXECVE);
    a.li(reg::T0, (-1i32) as u32);
    a.bne(reg::A0, reg::T0, bad);
    putc(&mut a, b'f');
    a.li(reg::A0, 0);
    a.sys(SYS_EXIT);
    a.bind(bad);
    putc(&mut a, b'X');
    a.li(reg::A0, 1);
    a.sys(SYS_EXIT);
    a.bind(path);
    a.word(u32::from_le_bytes(*b"nope"));
    a.word(0);
    let mut k = boot_with(vec![a.finish("first")], "first");

    k.run();
    assert_eq!(console_string(&k), "f");
}
