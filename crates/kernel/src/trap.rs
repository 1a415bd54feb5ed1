//! The trap dispatcher: one entry point for everything that stops user
//! execution, and the return path that reinstalls user mode.

use log::{debug, error, info};

use types::{trap_frame_va, TaskId, EXIT_FAULT, EXIT_ILLEGAL, KERNEL_TRAP_VECTOR};
use vm::cpu::INSN_BYTES;
use vm::memory::KERNEL_ROOT;
use vm::{TrapCause, UART0_IRQ};

use crate::syscall::SysResult;
use crate::Kernel;

impl Kernel {
    /// Reinstall user mode for `id` and run it until the next trap.
    ///
    /// The frame's kernel-reentry fields are refreshed, the frame is
    /// written through to its thread-indexed page (the same virtual
    /// address in every address space, so the boundary-crossing path can
    /// find the right frame no matter which thread resumes), and the
    /// process's page-table root is activated.
    pub fn return_to_user(&mut self, id: TaskId) -> TrapCause {
        let (p, t) = (id.proc_slot(), id.thread_slot());
        let root = self.table.procs[p].root;
        {
            let th = &mut self.table.procs[p].threads[t];
            th.frame.kernel_root = KERNEL_ROOT as u32;
            th.frame.kernel_sp = Kernel::kernel_stack_top(id);
            th.frame.kernel_trap = KERNEL_TRAP_VECTOR;
        }
        let bytes = self.table.procs[p].threads[t].frame.to_le_bytes();
        if !self.machine.mem.copy_out(root, trap_frame_va(t), &bytes) {
            panic!("return_to_user: trap-frame page missing for {:?}", id);
        }
        self.machine
            .run_user(&mut self.table.procs[p].threads[t].frame, root)
    }

    /// Branch on what stopped user execution.
    pub fn handle_trap(&mut self, id: TaskId, cause: TrapCause) {
        match cause {
            TrapCause::UserEnvCall => {
                let (no, args, epc) = {
                    let f = &self.table.thread(id).frame;
                    (
                        f.syscall_id(),
                        [f.arg(0), f.arg(1), f.arg(2), f.arg(3), f.arg(4), f.arg(5)],
                        f.epc,
                    )
                };
                // step past the trapping instruction before dispatch so
                // a plain return resumes after the ecall
                self.table.thread_mut(id).frame.epc = epc.wrapping_add(INSN_BYTES);
                if let SysResult::Ret(v) = self.dispatch_syscall(id, no, args) {
                    self.table.thread_mut(id).frame.set_ret(v);
                }
            }
            TrapCause::TimerInterrupt => {
                self.machine.timer.set_next_deadline();
                // the slice always belonged to user code; yield it for
                // round-robin fairness
                self.yield_now(id);
            }
            TrapCause::ExternalInterrupt => {
                let irq = match self.machine.intc.claim() {
                    Some(irq) => irq,
                    None => panic!("trap: external interrupt with nothing pending"),
                };
                match irq {
                    UART0_IRQ => debug!("uart: interrupt serviced"),
                    other => info!("trap: unexpected interrupt irq={}", other),
                }
                self.machine.intc.complete(irq);
            }
            TrapCause::LoadPageFault(addr)
            | TrapCause::StorePageFault(addr)
            | TrapCause::InstructionPageFault(addr) => {
                let epc = self.table.thread(id).frame.epc;
                error!(
                    "{:?} in application, bad addr = 0x{:08x}, bad instruction = 0x{:08x}, kernel killed it.",
                    cause, addr, epc
                );
                self.kill_process(id.proc_slot(), EXIT_FAULT);
            }
            TrapCause::IllegalInstruction(word) => {
                error!(
                    "IllegalInstruction 0x{:08x} in application, kernel killed it.",
                    word
                );
                self.kill_process(id.proc_slot(), EXIT_ILLEGAL);
            }
        }
    }
}
