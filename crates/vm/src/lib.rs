//! The machine: a single-core, paged-virtual-memory computer emulated in
//! software. Physical memory, a two-level MMU with one page-table root
//! per address space, a small user-mode CPU, a console, an interrupt
//! controller, and a cycle timer. The CPU never handles a trap itself:
//! it runs user code until a boundary crossing and reports the cause to
//! whoever called it.

pub mod asm;
pub mod cpu;
pub mod device;
pub mod frame;
pub mod memory;
pub mod program;
pub mod pte;
pub mod reg;
pub mod timer;

pub use cpu::{Cpu, TrapCause};
pub use device::{Console, IntController, UART0_IRQ};
pub use frame::TrapFrame;
pub use memory::{Access, Memory};
pub use program::{Program, ProgramStore};
pub use timer::Timer;

/// Runtime-variable machine knobs. Pool sizes and the address-space
/// layout are compile-time constants in `types`.
#[derive(Debug, Clone, Copy)]
pub struct MachineConfig {
    /// Bytes of physical memory.
    pub memory_bytes: usize,
    /// Cycles between timer interrupts; 0 disables the timer.
    pub timer_interval: u64,
    /// Hard ceiling on retired instructions; exceeding it is treated as
    /// a runaway machine and panics. 0 disables the ceiling.
    pub instruction_limit: u64,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            memory_bytes: 4 * 1024 * 1024,
            timer_interval: 200_000,
            instruction_limit: 100_000_000,
        }
    }
}

/// The whole machine, owned by the kernel.
#[derive(Debug)]
pub struct Machine {
    pub mem: Memory,
    pub cpu: Cpu,
    pub timer: Timer,
    pub intc: IntController,
    pub console: Console,
    pub programs: ProgramStore,
}

impl Machine {
    pub fn new(config: MachineConfig) -> Self {
        Self {
            mem: Memory::new(config.memory_bytes),
            cpu: Cpu::new(config.instruction_limit),
            timer: Timer::new(config.timer_interval),
            intc: IntController::new(),
            console: Console::new(),
            programs: ProgramStore::new(),
        }
    }

    /// Enter user mode: activate `root` and execute from `frame` until
    /// the next boundary crossing.
    pub fn run_user(&mut self, frame: &mut TrapFrame, root: usize) -> TrapCause {
        self.mem.set_current_root(root);
        self.cpu
            .run(frame, &mut self.mem, root, &mut self.timer, &self.intc)
    }
}
