use bitflags::bitflags;

bitflags! {
    /// Leaf permissions for one mapped page.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct PagePerms: u8 {
        /// Readable.
        const R = 1 << 0;
        /// Writable.
        const W = 1 << 1;
        /// Executable.
        const X = 1 << 2;
        /// Visible to user mode.
        const U = 1 << 3;
    }
}

impl PagePerms {
    pub const fn user_rwx() -> Self {
        Self::R.union(Self::W).union(Self::X).union(Self::U)
    }

    pub const fn user_rw() -> Self {
        Self::R.union(Self::W).union(Self::U)
    }

    pub const fn kernel_rw() -> Self {
        Self::R.union(Self::W)
    }
}
