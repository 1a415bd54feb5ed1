use log::warn;

/// A named executable image: the instruction/data words that get copied
/// into a fresh address space, plus the entry point's byte offset from
/// the image base.
#[derive(Debug, Clone)]
pub struct Program {
    pub name: String,
    pub words: Vec<u32>,
    pub entry: u32,
}

impl Program {
    pub fn new(name: impl Into<String>, words: Vec<u32>, entry: u32) -> Self {
        Self {
            name: name.into(),
            words,
            entry,
        }
    }

    pub fn size_bytes(&self) -> usize {
        self.words.len() * 4
    }

    pub fn to_le_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.size_bytes());
        for w in &self.words {
            out.extend_from_slice(&w.to_le_bytes());
        }
        out
    }
}

/// The images the kernel can materialize by name. Stands in for the
/// program loader's storage side; the kernel only ever asks "give me the
/// image called X".
#[derive(Debug, Default)]
pub struct ProgramStore {
    programs: Vec<Program>,
}

impl ProgramStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, program: Program) {
        if self.get(&program.name).is_some() {
            warn!("program store: replacing image '{}'", program.name);
            self.programs.retain(|p| p.name != program.name);
        }
        self.programs.push(program);
    }

    pub fn get(&self, name: &str) -> Option<&Program> {
        self.programs.iter().find(|p| p.name == name)
    }
}
