#![no_std]

pub mod layout;
pub use layout::*;

pub mod perms;
pub use perms::PagePerms;

pub mod task;
pub use task::{Pid, TaskId};

pub mod sysno;
pub use sysno::*;
