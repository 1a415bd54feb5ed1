use crate::device::IntController;
use crate::frame::TrapFrame;
use crate::memory::{Access, Memory};
use crate::timer::Timer;

/// Every instruction is two little-endian words:
/// `word0 = op | rd << 8 | rs1 << 16 | rs2 << 24`, `word1 = imm`.
pub const INSN_BYTES: u32 = 8;

pub const OP_LI: u8 = 0x01;
pub const OP_MV: u8 = 0x02;
pub const OP_ADD: u8 = 0x03;
pub const OP_ADDI: u8 = 0x04;
pub const OP_SUB: u8 = 0x05;
pub const OP_LW: u8 = 0x06;
pub const OP_SW: u8 = 0x07;
pub const OP_BEQ: u8 = 0x08;
pub const OP_BNE: u8 = 0x09;
pub const OP_BLT: u8 = 0x0a;
pub const OP_JAL: u8 = 0x0b;
pub const OP_JR: u8 = 0x0c;
pub const OP_ECALL: u8 = 0x0d;

/// Pack one instruction word from its fields.
pub const fn encode(op: u8, rd: usize, rs1: usize, rs2: usize) -> u32 {
    op as u32 | (rd as u32) << 8 | (rs1 as u32) << 16 | (rs2 as u32) << 24
}

/// Why user execution stopped and control came back to the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrapCause {
    /// An `ecall` was reached; the saved pc still points at it.
    UserEnvCall,
    /// The timer deadline passed.
    TimerInterrupt,
    /// The interrupt controller has a pending source.
    ExternalInterrupt,
    /// A data load failed translation (or was misaligned).
    LoadPageFault(u32),
    /// A data store failed translation (or was misaligned).
    StorePageFault(u32),
    /// Instruction fetch failed translation.
    InstructionPageFault(u32),
    /// Undecodable instruction word.
    IllegalInstruction(u32),
}

/// The user-mode execution unit. Register state lives in the trap frame
/// handed to `run`; the CPU itself only keeps the retired-instruction
/// counter and its runaway ceiling.
#[derive(Debug)]
pub struct Cpu {
    /// Instructions retired since power-on.
    pub retired: u64,
    limit: u64,
}

impl Cpu {
    pub fn new(instruction_limit: u64) -> Self {
        Self {
            retired: 0,
            limit: instruction_limit,
        }
    }

    /// Execute from `frame` under `root` until a boundary crossing.
    ///
    /// Interrupt lines and the timer are sampled between instructions,
    /// so a reported interrupt never splits an instruction. On
    /// `UserEnvCall` the frame's pc is left on the `ecall` itself; the
    /// handler decides how far to advance it.
    pub fn run(
        &mut self,
        frame: &mut TrapFrame,
        mem: &mut Memory,
        root: usize,
        timer: &mut Timer,
        intc: &IntController,
    ) -> TrapCause {
        loop {
            if intc.has_pending() {
                return TrapCause::ExternalInterrupt;
            }
            if timer.expired() {
                return TrapCause::TimerInterrupt;
            }

            let pc = frame.epc;
            let w0 = match mem.load_word(root, pc, Access::Fetch, true) {
                Some(w) => w,
                None => return TrapCause::InstructionPageFault(pc),
            };
            let imm = match mem.load_word(root, pc.wrapping_add(4), Access::Fetch, true) {
                Some(w) => w,
                None => return TrapCause::InstructionPageFault(pc.wrapping_add(4)),
            };

            let op = (w0 & 0xff) as u8;
            let rd = (w0 >> 8 & 0xff) as usize;
            let rs1 = (w0 >> 16 & 0xff) as usize;
            let rs2 = (w0 >> 24 & 0xff) as usize;
            if rd >= 32 || rs1 >= 32 || rs2 >= 32 {
                return TrapCause::IllegalInstruction(w0);
            }

            if self.limit != 0 && self.retired >= self.limit {
                panic!(
                    "cpu: instruction limit {} exceeded at pc 0x{:08x}",
                    self.limit, pc
                );
            }
            self.retired += 1;
            timer.advance(1);

            // an ecall retires like any instruction, but the saved pc is
            // left on it; the handler decides how far to step
            if op == OP_ECALL {
                return TrapCause::UserEnvCall;
            }

            let mut next_pc = pc.wrapping_add(INSN_BYTES);
            match op {
                OP_LI => wr(frame, rd, imm),
                OP_MV => wr(frame, rd, rdv(frame, rs1)),
                OP_ADD => wr(frame, rd, rdv(frame, rs1).wrapping_add(rdv(frame, rs2))),
                OP_ADDI => wr(frame, rd, rdv(frame, rs1).wrapping_add(imm)),
                OP_SUB => wr(frame, rd, rdv(frame, rs1).wrapping_sub(rdv(frame, rs2))),
                OP_LW => {
                    let addr = rdv(frame, rs1).wrapping_add(imm);
                    match mem.load_word(root, addr, Access::Load, true) {
                        Some(v) => wr(frame, rd, v),
                        None => return TrapCause::LoadPageFault(addr),
                    }
                }
                OP_SW => {
                    let addr = rdv(frame, rs1).wrapping_add(imm);
                    if !mem.store_word(root, addr, rdv(frame, rs2), true) {
                        return TrapCause::StorePageFault(addr);
                    }
                }
                OP_BEQ => {
                    if rdv(frame, rs1) == rdv(frame, rs2) {
                        next_pc = imm;
                    }
                }
                OP_BNE => {
                    if rdv(frame, rs1) != rdv(frame, rs2) {
                        next_pc = imm;
                    }
                }
                OP_BLT => {
                    if (rdv(frame, rs1) as i32) < (rdv(frame, rs2) as i32) {
                        next_pc = imm;
                    }
                }
                OP_JAL => {
                    wr(frame, rd, pc.wrapping_add(INSN_BYTES));
                    next_pc = imm;
                }
                OP_JR => next_pc = rdv(frame, rs1).wrapping_add(imm),
                _ => return TrapCause::IllegalInstruction(w0),
            }
            frame.epc = next_pc;
        }
    }
}

#[inline]
fn rdv(frame: &TrapFrame, r: usize) -> u32 {
    if r == 0 {
        0
    } else {
        frame.regs[r]
    }
}

#[inline]
fn wr(frame: &mut TrapFrame, r: usize, value: u32) {
    if r != 0 {
        frame.regs[r] = value;
    }
}
