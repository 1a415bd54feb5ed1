//! Materializing program images into address spaces. The image store
//! itself lives in the machine; this is the kernel-side glue that maps
//! an image, lays out the argument vector, and starts the main thread.

use log::{debug, info};

use types::{PagePerms, Pid, TaskId, PAGE_SHIFT, PAGE_SIZE, USER_BASE};
use vm::{reg, Program};

use crate::proc::ThreadState;
use crate::Kernel;

impl Kernel {
    /// Map `program` at `USER_BASE` under `root` and copy it in. Returns
    /// the image's page bound and the base VA for user stacks above it
    /// (one guard page in between).
    pub(crate) fn load_image(&mut self, root: usize, program: &Program) -> Option<(u32, u32)> {
        let npages = (program.size_bytes() + PAGE_SIZE - 1) / PAGE_SIZE;
        if npages == 0 {
            return None;
        }
        if !self
            .machine
            .mem
            .map_pages(root, USER_BASE, npages, PagePerms::user_rwx())
        {
            return None;
        }
        if !self
            .machine
            .mem
            .copy_out(root, USER_BASE, &program.to_le_bytes())
        {
            return None;
        }
        let max_page = (USER_BASE as usize >> PAGE_SHIFT) as u32 + npages as u32;
        let ustack_base = USER_BASE + ((npages + 1) * PAGE_SIZE) as u32;
        debug!(
            "load_image: '{}' {} pages, stacks from 0x{:08x}",
            program.name, npages, ustack_base
        );
        Some((max_page, ustack_base))
    }

    /// Copy argv strings onto the stack, then the pointer array. Returns
    /// the new stack pointer (which doubles as the argv address) and the
    /// argument count.
    pub(crate) fn push_args(
        &mut self,
        root: usize,
        sp_top: u32,
        args: &[String],
    ) -> Option<(u32, u32, usize)> {
        let mut sp = sp_top;
        let mut ptrs = Vec::with_capacity(args.len());
        for arg in args {
            let mut bytes = arg.as_bytes().to_vec();
            bytes.push(0);
            sp -= bytes.len() as u32;
            if !self.machine.mem.copy_out(root, sp, &bytes) {
                return None;
            }
            ptrs.push(sp);
        }
        sp &= !3;
        sp -= 4 * (ptrs.len() as u32 + 1);
        let argv_va = sp;
        for (i, ptr) in ptrs.iter().enumerate() {
            if !self
                .machine
                .mem
                .store_word(root, argv_va + 4 * i as u32, *ptr, false)
            {
                return None;
            }
        }
        if !self
            .machine
            .mem
            .store_word(root, argv_va + 4 * ptrs.len() as u32, 0, false)
        {
            return None;
        }
        Some((sp, argv_va, args.len()))
    }

    /// Point the three standard descriptors at the console.
    pub(crate) fn init_stdio(&mut self, p: usize) {
        for fd in 0..3 {
            let idx = self
                .files
                .alloc_stdio(fd)
                .expect("file pool exhausted at process start");
            self.table.procs[p].files[fd] = Some(idx);
        }
    }

    /// Start a fresh process running the named image, with `argv =
    /// [name]`. Returns the new pid, or `None` when the image does not
    /// exist or a pool is exhausted.
    pub fn spawn(&mut self, name: &str) -> Option<Pid> {
        let program = self.machine.programs.get(name)?.clone();
        let p = self.allocate_process()?;
        let root = self.table.procs[p].root;
        self.init_stdio(p);
        let (max_page, ustack_base) = match self.load_image(root, &program) {
            Some(pair) => pair,
            None => {
                self.abort_process(p);
                return None;
            }
        };
        self.table.procs[p].max_page = max_page;
        self.table.procs[p].ustack_base = ustack_base;
        let t = match self.allocate_thread(p, USER_BASE + program.entry, true) {
            Some(t) => t,
            None => {
                self.abort_process(p);
                return None;
            }
        };
        let id = TaskId::new(p, t);
        let sp_top = self.table.thread(id).frame.regs[reg::SP];
        let (sp, argv_va, argc) = match self.push_args(root, sp_top, &[name.to_string()]) {
            Some(triple) => triple,
            None => {
                self.abort_process(p);
                return None;
            }
        };
        {
            let th = self.table.thread_mut(id);
            th.frame.regs[reg::SP] = sp;
            th.frame.regs[reg::A0] = argc as u32;
            th.frame.regs[reg::A1] = argv_va;
            th.state = ThreadState::Runnable;
        }
        self.add_task(id);
        let pid = self.table.procs[p].pid;
        info!("spawn: '{}' as pid {}", name, pid);
        Some(pid)
    }
}
