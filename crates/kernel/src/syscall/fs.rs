//! Descriptor syscalls: console stdio, flat in-memory files, and pipes.
//! A pipe transfer that cannot progress at all gives up its slice and
//! re-issues the call on its next turn, so a full or empty ring never
//! wedges the processor.

use log::{debug, error};

use types::{TaskId, FD_MAX, MAX_STR_LEN, O_CREATE, O_RDWR, O_TRUNC, O_WRONLY};

use crate::file::FileKind;
use crate::syscall::SysResult;
use crate::Kernel;

impl Kernel {
    fn fd_entry(&self, p: usize, fd: i32) -> Option<usize> {
        if fd < 0 || fd as usize >= FD_MAX {
            return None;
        }
        self.table.procs[p].files[fd as usize]
    }

    fn fdalloc(&mut self, p: usize, fidx: usize) -> Option<usize> {
        let fd = self.table.procs[p].files.iter().position(|f| f.is_none())?;
        self.table.procs[p].files[fd] = Some(fidx);
        Some(fd)
    }

    pub fn sys_write(&mut self, id: TaskId, fd: i32, va: u32, len: u32) -> SysResult {
        let p = id.proc_slot();
        let fidx = match self.fd_entry(p, fd) {
            Some(i) => i,
            None => {
                error!("invalid fd {}", fd);
                return SysResult::Ret(-1);
            }
        };
        if !self.files.files[fidx].writable {
            return SysResult::Ret(-1);
        }
        match self.files.files[fidx].kind {
            FileKind::Stdio => self.console_write(p, va, len),
            FileKind::Pipe(slot) => self.pipe_write(id, slot, va, len),
            FileKind::Node(n) => self.node_write(p, fidx, n, va, len),
            FileKind::None => SysResult::Ret(-1),
        }
    }

    pub fn sys_read(&mut self, id: TaskId, fd: i32, va: u32, len: u32) -> SysResult {
        let p = id.proc_slot();
        let fidx = match self.fd_entry(p, fd) {
            Some(i) => i,
            None => {
                error!("invalid fd {}", fd);
                return SysResult::Ret(-1);
            }
        };
        if !self.files.files[fidx].readable {
            return SysResult::Ret(-1);
        }
        match self.files.files[fidx].kind {
            FileKind::Stdio => self.console_read(p, va, len),
            FileKind::Pipe(slot) => self.pipe_read(id, slot, va, len),
            FileKind::Node(n) => self.node_read(p, fidx, n, va, len),
            FileKind::None => SysResult::Ret(-1),
        }
    }

    fn console_write(&mut self, p: usize, va: u32, len: u32) -> SysResult {
        let n = (len as usize).min(MAX_STR_LEN);
        let mut buf = vec![0u8; n];
        let root = self.table.procs[p].root;
        if !self.machine.mem.copy_in(root, va, &mut buf) {
            return SysResult::Ret(-1);
        }
        for b in buf {
            self.machine.console.putchar(b);
        }
        SysResult::Ret(len as i32)
    }

    fn console_read(&mut self, p: usize, va: u32, len: u32) -> SysResult {
        let mut buf = Vec::new();
        while buf.len() < len as usize {
            match self.machine.console.getchar() {
                Some(b) => buf.push(b),
                None => break,
            }
        }
        let root = self.table.procs[p].root;
        if !buf.is_empty() && !self.machine.mem.copy_out(root, va, &buf) {
            return SysResult::Ret(-1);
        }
        SysResult::Ret(buf.len() as i32)
    }

    fn node_write(&mut self, p: usize, fidx: usize, node: usize, va: u32, len: u32) -> SysResult {
        let mut buf = vec![0u8; len as usize];
        let root = self.table.procs[p].root;
        if !self.machine.mem.copy_in(root, va, &mut buf) {
            return SysResult::Ret(-1);
        }
        let off = self.files.files[fidx].off;
        let data = &mut self.files.nodes[node].data;
        if data.len() < off + buf.len() {
            data.resize(off + buf.len(), 0);
        }
        data[off..off + buf.len()].copy_from_slice(&buf);
        self.files.files[fidx].off = off + buf.len();
        SysResult::Ret(buf.len() as i32)
    }

    fn node_read(&mut self, p: usize, fidx: usize, node: usize, va: u32, len: u32) -> SysResult {
        let off = self.files.files[fidx].off;
        let data = &self.files.nodes[node].data;
        if off >= data.len() {
            return SysResult::Ret(0);
        }
        let n = (len as usize).min(data.len() - off);
        let chunk = data[off..off + n].to_vec();
        let root = self.table.procs[p].root;
        if !self.machine.mem.copy_out(root, va, &chunk) {
            return SysResult::Ret(-1);
        }
        self.files.files[fidx].off = off + n;
        SysResult::Ret(n as i32)
    }

    pub fn sys_openat(&mut self, id: TaskId, path_va: u32, omode: u32) -> SysResult {
        let p = id.proc_slot();
        let root = self.table.procs[p].root;
        let path = match self.machine.mem.copy_in_str(root, path_va, MAX_STR_LEN) {
            Some(s) => s,
            None => return SysResult::Ret(-1),
        };
        let node = match self.files.node_lookup(&path) {
            Some(n) => n,
            None => {
                if omode & O_CREATE == 0 {
                    return SysResult::Ret(-1);
                }
                self.files.node_create(&path)
            }
        };
        if omode & O_TRUNC != 0 {
            self.files.nodes[node].data.clear();
        }
        let fidx = match self.files.alloc() {
            Some(i) => i,
            None => return SysResult::Ret(-1),
        };
        {
            let f = &mut self.files.files[fidx];
            f.kind = FileKind::Node(node);
            f.readable = omode & O_WRONLY == 0;
            f.writable = omode & O_WRONLY != 0 || omode & O_RDWR != 0;
            f.off = 0;
        }
        match self.fdalloc(p, fidx) {
            Some(fd) => SysResult::Ret(fd as i32),
            None => {
                self.files.close(fidx);
                SysResult::Ret(-1)
            }
        }
    }

    pub fn sys_close(&mut self, id: TaskId, fd: i32) -> SysResult {
        let p = id.proc_slot();
        let fidx = match self.fd_entry(p, fd) {
            Some(i) => i,
            None => {
                error!("invalid fd {}", fd);
                return SysResult::Ret(-1);
            }
        };
        self.table.procs[p].files[fd as usize] = None;
        self.files.close(fidx);
        SysResult::Ret(0)
    }

    /// Build a pipe and write its two descriptors (read end first) to
    /// `fdarray_va`.
    pub fn sys_pipe(&mut self, id: TaskId, fdarray_va: u32) -> SysResult {
        let p = id.proc_slot();
        let f0 = match self.files.alloc() {
            Some(i) => i,
            None => return SysResult::Ret(-1),
        };
        let f1 = match self.files.alloc() {
            Some(i) => i,
            None => {
                self.files.close(f0);
                return SysResult::Ret(-1);
            }
        };
        let slot = self.files.alloc_pipe();
        {
            let f = &mut self.files.files[f0];
            f.kind = FileKind::Pipe(slot);
            f.readable = true;
            f.writable = false;
        }
        {
            let f = &mut self.files.files[f1];
            f.kind = FileKind::Pipe(slot);
            f.readable = false;
            f.writable = true;
        }
        let fd0 = self.fdalloc(p, f0);
        let fd1 = fd0.and_then(|_| self.fdalloc(p, f1));
        let (fd0, fd1) = match (fd0, fd1) {
            (Some(a), Some(b)) => (a, b),
            (a, _) => {
                if let Some(fd) = a {
                    self.table.procs[p].files[fd] = None;
                }
                self.files.close(f0);
                self.files.close(f1);
                return SysResult::Ret(-1);
            }
        };
        let mut bytes = [0u8; 8];
        bytes[..4].copy_from_slice(&(fd0 as u32).to_le_bytes());
        bytes[4..].copy_from_slice(&(fd1 as u32).to_le_bytes());
        let root = self.table.procs[p].root;
        if !self.machine.mem.copy_out(root, fdarray_va, &bytes) {
            self.table.procs[p].files[fd0] = None;
            self.table.procs[p].files[fd1] = None;
            self.files.close(f0);
            self.files.close(f1);
            return SysResult::Ret(-1);
        }
        SysResult::Ret(0)
    }

    /// Pipe read. An empty ring with the write end still open re-issues
    /// the whole call after a yield: the saved pc steps back onto the
    /// ecall, exactly like the spinning mutex.
    fn pipe_read(&mut self, id: TaskId, slot: usize, va: u32, len: u32) -> SysResult {
        let p = id.proc_slot();
        let mut buf = Vec::new();
        let writeopen = {
            let pipe = match self.files.pipe_mut(slot) {
                Some(pipe) => pipe,
                None => return SysResult::Ret(-1),
            };
            while buf.len() < len as usize {
                match pipe.read_byte() {
                    Some(b) => buf.push(b),
                    None => break,
                }
            }
            pipe.writeopen
        };
        if !buf.is_empty() {
            let root = self.table.procs[p].root;
            if !self.machine.mem.copy_out(root, va, &buf) {
                return SysResult::Ret(-1);
            }
            return SysResult::Ret(buf.len() as i32);
        }
        if len == 0 {
            return SysResult::Ret(0);
        }
        if !writeopen {
            // drained and no writer will ever come back
            return SysResult::Ret(0);
        }
        debug!("pipe: reader {:?} waiting for data", id);
        self.retry_after_yield(id);
        SysResult::Done
    }

    /// Pipe write. Writes as much as fits and reports the (possibly
    /// short) count; a completely full ring yields and re-issues the
    /// call.
    fn pipe_write(&mut self, id: TaskId, slot: usize, va: u32, len: u32) -> SysResult {
        let p = id.proc_slot();
        let (space, readopen) = {
            let pipe = match self.files.pipe(slot) {
                Some(pipe) => pipe,
                None => return SysResult::Ret(-1),
            };
            (pipe.space(), pipe.readopen)
        };
        if !readopen {
            // writing into a pipe nobody will read is an error
            return SysResult::Ret(-1);
        }
        if len == 0 {
            return SysResult::Ret(0);
        }
        if space == 0 {
            debug!("pipe: writer {:?} waiting for space", id);
            self.retry_after_yield(id);
            return SysResult::Done;
        }
        let n = (len as usize).min(space);
        let mut buf = vec![0u8; n];
        let root = self.table.procs[p].root;
        if !self.machine.mem.copy_in(root, va, &mut buf) {
            return SysResult::Ret(-1);
        }
        let pipe = self
            .files
            .pipe_mut(slot)
            .expect("pipe vanished between checks");
        for &b in &buf {
            if !pipe.write_byte(b) {
                panic!("pipe: ring filled while reserved space remained");
            }
        }
        SysResult::Ret(n as i32)
    }

}
