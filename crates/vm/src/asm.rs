//! Tiny two-pass assembler for authoring user programs in tests and
//! demos. Forward references go through `Label`s and are patched when
//! the program is finished.
//!
//! ```
//! use vm::{asm::Asm, reg};
//! use types::{SYS_EXIT, USER_BASE};
//!
//! let mut a = Asm::new(USER_BASE);
//! a.li(reg::A0, 0);
//! a.sys(SYS_EXIT);
//! let program = a.finish("exit0");
//! ```

use crate::cpu::{
    encode, OP_ADD, OP_ADDI, OP_BEQ, OP_BLT, OP_BNE, OP_ECALL, OP_JAL, OP_JR, OP_LI, OP_LW, OP_MV,
    OP_SUB, OP_SW,
};
use crate::program::Program;
use crate::reg;

/// Handle for a not-yet-resolved code location.
#[derive(Debug, Clone, Copy)]
pub struct Label(usize);

pub struct Asm {
    base: u32,
    words: Vec<u32>,
    labels: Vec<Option<u32>>,
    fixups: Vec<(usize, Label)>,
}

impl Asm {
    /// Start a program that will be loaded at virtual address `base`.
    pub fn new(base: u32) -> Self {
        Self {
            base,
            words: Vec::new(),
            labels: Vec::new(),
            fixups: Vec::new(),
        }
    }

    /// Virtual address of the next emitted instruction.
    pub fn here(&self) -> u32 {
        self.base + (self.words.len() as u32) * 4
    }

    /// Declare a label; bind it later with `bind`.
    pub fn label(&mut self) -> Label {
        self.labels.push(None);
        Label(self.labels.len() - 1)
    }

    /// Bind `label` to the current position.
    pub fn bind(&mut self, label: Label) {
        assert!(
            self.labels[label.0].is_none(),
            "label {} bound twice",
            label.0
        );
        self.labels[label.0] = Some(self.here());
    }

    fn emit(&mut self, op: u8, rd: usize, rs1: usize, rs2: usize, imm: u32) {
        self.words.push(encode(op, rd, rs1, rs2));
        self.words.push(imm);
    }

    fn emit_at_label(&mut self, op: u8, rd: usize, rs1: usize, rs2: usize, target: Label) {
        self.words.push(encode(op, rd, rs1, rs2));
        self.fixups.push((self.words.len(), target));
        self.words.push(0);
    }

    pub fn li(&mut self, rd: usize, imm: u32) {
        self.emit(OP_LI, rd, 0, 0, imm);
    }

    /// Load a label's address into a register (for thread entry points,
    /// jump tables, and the like).
    pub fn li_label(&mut self, rd: usize, target: Label) {
        self.emit_at_label(OP_LI, rd, 0, 0, target);
    }

    pub fn mv(&mut self, rd: usize, rs1: usize) {
        self.emit(OP_MV, rd, rs1, 0, 0);
    }

    pub fn add(&mut self, rd: usize, rs1: usize, rs2: usize) {
        self.emit(OP_ADD, rd, rs1, rs2, 0);
    }

    pub fn addi(&mut self, rd: usize, rs1: usize, imm: i32) {
        self.emit(OP_ADDI, rd, rs1, 0, imm as u32);
    }

    pub fn sub(&mut self, rd: usize, rs1: usize, rs2: usize) {
        self.emit(OP_SUB, rd, rs1, rs2, 0);
    }

    pub fn lw(&mut self, rd: usize, rs1: usize, off: i32) {
        self.emit(OP_LW, rd, rs1, 0, off as u32);
    }

    pub fn sw(&mut self, rs1: usize, off: i32, rs2: usize) {
        self.emit(OP_SW, 0, rs1, rs2, off as u32);
    }

    pub fn beq(&mut self, rs1: usize, rs2: usize, target: Label) {
        self.emit_at_label(OP_BEQ, 0, rs1, rs2, target);
    }

    pub fn bne(&mut self, rs1: usize, rs2: usize, target: Label) {
        self.emit_at_label(OP_BNE, 0, rs1, rs2, target);
    }

    pub fn blt(&mut self, rs1: usize, rs2: usize, target: Label) {
        self.emit_at_label(OP_BLT, 0, rs1, rs2, target);
    }

    pub fn jal(&mut self, rd: usize, target: Label) {
        self.emit_at_label(OP_JAL, rd, 0, 0, target);
    }

    pub fn jr(&mut self, rs1: usize) {
        self.emit(OP_JR, 0, rs1, 0, 0);
    }

    pub fn ecall(&mut self) {
        self.emit(OP_ECALL, 0, 0, 0, 0);
    }

    /// Emit a raw data word. Bind a label first to address it; keep data
    /// out of the execution path.
    pub fn word(&mut self, value: u32) {
        self.words.push(value);
    }

    /// Shorthand: load a syscall number into `a7` and trap.
    pub fn sys(&mut self, no: u32) {
        self.li(reg::A7, no);
        self.ecall();
    }

    /// Resolve fixups and produce the image. Panics on an unbound label.
    pub fn finish(mut self, name: &str) -> Program {
        for (word_idx, label) in self.fixups.drain(..).collect::<Vec<_>>() {
            let va = self.labels[label.0]
                .unwrap_or_else(|| panic!("label {} never bound in '{}'", label.0, name));
            self.words[word_idx] = va;
        }
        Program::new(name, self.words, 0)
    }
}
