//! FUSE filesystem implementation for drivefs
//!
//! This module projects a remote folder as a read-only local directory.
//! File contents are downloaded lazily, chunk by chunk, as the kernel reads.

pub mod attrs;
pub mod dir;
pub mod drive_fs;
pub mod driver;
pub mod error;
pub mod handles;
pub mod inode_table;
pub mod mount;
pub mod path_index;

pub use attrs::{Attributes, NodeKind};
pub use drive_fs::DriveFs;
pub use driver::Driver;
pub use error::FsError;
pub use mount::{spawn_mount, MountError};
pub use path_index::PathIndex;
