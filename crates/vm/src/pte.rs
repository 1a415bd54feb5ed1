use types::PagePerms;

/// Page-table entry for the software MMU.
///
/// Leaf entries carry a physical page number and the R/W/X/U permission
/// set; interior entries point at an L2 table. `valid` gates both kinds.
#[derive(Clone, Copy, Debug, Default)]
pub struct Pte {
    /// Entry is present.
    pub valid: bool,
    /// Leaf permissions; empty on interior entries.
    pub perms: PagePerms,
    /// Physical page number of the mapped frame (leaf entries).
    pub ppn: usize,
    /// Index of the next-level L2 table (interior entries).
    pub next_l2: Option<usize>,
}

impl Pte {
    /// A valid entry with any of R/W/X set maps a frame; otherwise it
    /// points at the next level.
    pub fn is_leaf(&self) -> bool {
        self.valid
            && self
                .perms
                .intersects(PagePerms::R | PagePerms::W | PagePerms::X)
    }
}
