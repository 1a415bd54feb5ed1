//! The open-file layer: one system-wide pool of reference-counted file
//! records shared by every process, console stdio, byte-ring pipes, and
//! a flat in-memory node store standing in for the on-disk file system.

use log::warn;
use types::{FD_MAX, NPROC};

/// System-wide open-file records; enough for every descriptor of every
/// process at once.
pub const FILE_POOL_SIZE: usize = NPROC * FD_MAX;

/// Bytes a pipe ring buffers.
pub const PIPE_SIZE: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    None,
    /// Console-backed standard io.
    Stdio,
    /// One end of the pipe at this slot.
    Pipe(usize),
    /// Flat in-memory file at this node index.
    Node(usize),
}

/// One open file. Two descriptors that share an entry (after `fork`)
/// share the offset as well.
#[derive(Debug)]
pub struct OsFile {
    pub refs: i32,
    pub kind: FileKind,
    pub readable: bool,
    pub writable: bool,
    pub off: usize,
}

impl OsFile {
    fn empty() -> Self {
        Self {
            refs: 0,
            kind: FileKind::None,
            readable: false,
            writable: false,
            off: 0,
        }
    }
}

/// Byte ring shared by a read end and a write end.
#[derive(Debug)]
pub struct Pipe {
    data: [u8; PIPE_SIZE],
    nread: usize,
    nwrite: usize,
    pub readopen: bool,
    pub writeopen: bool,
}

impl Pipe {
    fn new() -> Self {
        Self {
            data: [0; PIPE_SIZE],
            nread: 0,
            nwrite: 0,
            readopen: true,
            writeopen: true,
        }
    }

    pub fn available(&self) -> usize {
        self.nwrite - self.nread
    }

    pub fn space(&self) -> usize {
        PIPE_SIZE - self.available()
    }

    pub fn read_byte(&mut self) -> Option<u8> {
        if self.available() == 0 {
            return None;
        }
        let b = self.data[self.nread % PIPE_SIZE];
        self.nread += 1;
        Some(b)
    }

    pub fn write_byte(&mut self, b: u8) -> bool {
        if self.space() == 0 {
            return false;
        }
        self.data[self.nwrite % PIPE_SIZE] = b;
        self.nwrite += 1;
        true
    }
}

/// A named flat file.
#[derive(Debug)]
pub struct Fnode {
    pub name: String,
    pub data: Vec<u8>,
}

/// The global pool of open files plus the pipe and node stores behind
/// them.
#[derive(Debug)]
pub struct FilePool {
    pub files: Vec<OsFile>,
    pipes: Vec<Option<Pipe>>,
    free_pipes: Vec<usize>,
    pub nodes: Vec<Fnode>,
}

impl FilePool {
    pub fn new() -> Self {
        Self {
            files: (0..FILE_POOL_SIZE).map(|_| OsFile::empty()).collect(),
            pipes: Vec::new(),
            free_pipes: Vec::new(),
            nodes: Vec::new(),
        }
    }

    /// Claim a free record, or `None` when the table is full.
    pub fn alloc(&mut self) -> Option<usize> {
        let idx = self.files.iter().position(|f| f.refs == 0)?;
        self.files[idx].refs = 1;
        Some(idx)
    }

    /// A console-backed record for one of the three standard
    /// descriptors.
    pub fn alloc_stdio(&mut self, fd: usize) -> Option<usize> {
        let idx = self.alloc()?;
        let f = &mut self.files[idx];
        f.kind = FileKind::Stdio;
        f.readable = fd == 0 || fd == 2;
        f.writable = fd == 1 || fd == 2;
        f.off = 0;
        Some(idx)
    }

    /// Share an open record (descriptor duplication across `fork`).
    pub fn dup(&mut self, idx: usize) {
        debug_assert!(self.files[idx].refs > 0);
        self.files[idx].refs += 1;
    }

    /// Drop one reference; the last close tears the record down and, for
    /// a pipe, closes this end of the ring.
    pub fn close(&mut self, idx: usize) {
        let f = &mut self.files[idx];
        if f.refs < 1 {
            panic!("fileclose: refs {} on entry {}", f.refs, idx);
        }
        f.refs -= 1;
        if f.refs > 0 {
            return;
        }
        let (kind, readable, writable) = (f.kind, f.readable, f.writable);
        *f = OsFile::empty();
        if let FileKind::Pipe(slot) = kind {
            let done = {
                let pipe = match self.pipes[slot].as_mut() {
                    Some(p) => p,
                    None => {
                        warn!("fileclose: pipe slot {} already gone", slot);
                        return;
                    }
                };
                if readable {
                    pipe.readopen = false;
                }
                if writable {
                    pipe.writeopen = false;
                }
                !pipe.readopen && !pipe.writeopen
            };
            if done {
                self.pipes[slot] = None;
                self.free_pipes.push(slot);
            }
        }
    }

    /// Build a fresh pipe and return its slot.
    pub fn alloc_pipe(&mut self) -> usize {
        match self.free_pipes.pop() {
            Some(slot) => {
                self.pipes[slot] = Some(Pipe::new());
                slot
            }
            None => {
                self.pipes.push(Some(Pipe::new()));
                self.pipes.len() - 1
            }
        }
    }

    pub fn pipe_mut(&mut self, slot: usize) -> Option<&mut Pipe> {
        self.pipes.get_mut(slot).and_then(|p| p.as_mut())
    }

    pub fn pipe(&self, slot: usize) -> Option<&Pipe> {
        self.pipes.get(slot).and_then(|p| p.as_ref())
    }

    pub fn node_lookup(&self, name: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.name == name)
    }

    pub fn node_create(&mut self, name: &str) -> usize {
        self.nodes.push(Fnode {
            name: name.to_string(),
            data: Vec::new(),
        });
        self.nodes.len() - 1
    }
}

impl Default for FilePool {
    fn default() -> Self {
        Self::new()
    }
}
