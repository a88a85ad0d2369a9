//! Synthetic stat records
//!
//! Remote objects carry no inode, owner or usable timestamps, so every
//! record is made up on the spot: fixed permission bits, the remote size
//! for files, and the current time for all three timestamps.

use std::time::SystemTime;

use common::prelude::RemoteStore;

use super::error::FsError;
use super::path_index::{is_hidden, is_root, PathIndex};

pub const DIR_PERM: u16 = 0o755;
pub const FILE_PERM: u16 = 0o644;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Directory,
    RegularFile,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attributes {
    pub kind: NodeKind,
    pub perm: u16,
    pub nlink: u32,
    pub size: u64,
    pub atime: SystemTime,
    pub mtime: SystemTime,
    pub ctime: SystemTime,
}

impl Attributes {
    pub fn directory(now: SystemTime) -> Self {
        Self {
            kind: NodeKind::Directory,
            perm: DIR_PERM,
            nlink: 2,
            size: 0,
            atime: now,
            mtime: now,
            ctime: now,
        }
    }

    pub fn regular_file(size: u64, now: SystemTime) -> Self {
        Self {
            kind: NodeKind::RegularFile,
            perm: FILE_PERM,
            nlink: 1,
            size,
            atime: now,
            mtime: now,
            ctime: now,
        }
    }

    /// Full `st_mode`: file type bits plus permissions
    pub fn mode(&self) -> u32 {
        let type_bits = match self.kind {
            NodeKind::Directory => libc::S_IFDIR,
            NodeKind::RegularFile => libc::S_IFREG,
        };
        type_bits as u32 | u32::from(self.perm)
    }
}

pub struct AttributeSynthesizer<'a> {
    store: &'a dyn RemoteStore,
    index: &'a PathIndex,
}

impl<'a> AttributeSynthesizer<'a> {
    pub fn new(store: &'a dyn RemoteStore, index: &'a PathIndex) -> Self {
        Self { store, index }
    }

    pub async fn getattr(&self, path: &str) -> Result<Attributes, FsError> {
        let now = SystemTime::now();

        // Never hits the remote store
        if is_hidden(path) {
            return Err(FsError::not_found(path));
        }

        if is_root(path) {
            return Ok(Attributes::directory(now));
        }

        let Some(id) = self.index.resolve(path) else {
            tracing::debug!("File not found for path: {}", path);
            return Err(FsError::not_found(path));
        };
        tracing::debug!("File ID for path {}: {}", path, id);

        let metadata = self.store.get_metadata(id).await.map_err(|e| {
            tracing::error!("Failed to fetch metadata for {} ({}): {}", path, id, e);
            FsError::Io(e)
        })?;

        Ok(Attributes::regular_file(metadata.size_or_zero(), now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_bits() {
        let now = SystemTime::now();
        assert_eq!(
            Attributes::directory(now).mode(),
            libc::S_IFDIR as u32 | 0o755
        );
        assert_eq!(
            Attributes::regular_file(10, now).mode(),
            libc::S_IFREG as u32 | 0o644
        );
    }

    #[test]
    fn test_timestamps_share_call_time() {
        let now = SystemTime::now();
        let attr = Attributes::regular_file(10, now);
        assert_eq!(attr.atime, now);
        assert_eq!(attr.mtime, now);
        assert_eq!(attr.ctime, now);
        assert_eq!(attr.size, 10);
        assert_eq!(attr.nlink, 1);
    }
}
