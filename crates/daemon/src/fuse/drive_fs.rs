//! FUSE adapter for the driver
//!
//! Implements the fuser::Filesystem trait: translates inodes to paths,
//! bridges into the async driver with `block_on`, and maps `FsError` to
//! errno. fuser runs its session loop on a single thread, so every callback
//! here is serialized.

use std::ffi::OsStr;
use std::time::Duration;

use fuser::{
    FileAttr, FileType, Filesystem, ReplyAttr, ReplyData, ReplyDirectory, ReplyEmpty,
    ReplyEntry, ReplyOpen, ReplyXattr, Request,
};
use tokio::runtime::Handle;

use super::attrs::{Attributes, NodeKind};
use super::driver::Driver;
use super::error::FsError;
use super::inode_table::InodeTable;

/// Reject any open that could modify the file
fn check_read_only(flags: i32) -> Result<(), FsError> {
    let write_access = (flags & libc::O_ACCMODE) != libc::O_RDONLY;
    if write_access || (flags & libc::O_TRUNC) != 0 {
        return Err(FsError::ReadOnly);
    }
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum XattrList {
    /// Answer to a size query (`size == 0`)
    Size(u32),
    Data(Vec<u8>),
}

/// Encode xattr names as concatenated NUL-terminated strings, answering
/// either the size query or the data query
fn xattr_list(names: &[String], size: u32) -> Result<XattrList, libc::c_int> {
    let mut data = Vec::new();
    for name in names {
        data.extend_from_slice(name.as_bytes());
        data.push(0);
    }

    if size == 0 {
        Ok(XattrList::Size(data.len() as u32))
    } else if (size as usize) < data.len() {
        Err(libc::ERANGE)
    } else {
        Ok(XattrList::Data(data))
    }
}

/// FUSE filesystem over a remote store
pub struct DriveFs {
    /// Tokio runtime handle for async operations
    rt: Handle,
    driver: Driver,
    inodes: InodeTable,
    uid: u32,
    gid: u32,
}

impl DriveFs {
    /// Default TTL for FUSE attributes
    const ATTR_TTL: Duration = Duration::from_secs(1);

    /// Block size for FUSE
    const BLOCK_SIZE: u32 = 512;

    pub fn new(rt: Handle, driver: Driver) -> Self {
        Self {
            rt,
            driver,
            inodes: InodeTable::new(),
            uid: unsafe { libc::getuid() },
            gid: unsafe { libc::getgid() },
        }
    }

    fn make_attr(&self, ino: u64, attr: &Attributes) -> FileAttr {
        let kind = match attr.kind {
            NodeKind::Directory => FileType::Directory,
            NodeKind::RegularFile => FileType::RegularFile,
        };

        FileAttr {
            ino,
            size: attr.size,
            blocks: attr.size.div_ceil(u64::from(Self::BLOCK_SIZE)),
            atime: attr.atime,
            mtime: attr.mtime,
            ctime: attr.ctime,
            crtime: attr.ctime,
            kind,
            perm: attr.perm,
            nlink: attr.nlink,
            uid: self.uid,
            gid: self.gid,
            rdev: 0,
            blksize: Self::BLOCK_SIZE,
            flags: 0,
        }
    }

    fn path_of(&self, ino: u64) -> Result<String, FsError> {
        self.inodes
            .get_path(ino)
            .map(str::to_string)
            .ok_or_else(|| FsError::not_found(format!("inode {}", ino)))
    }

    fn lookup_attr(&mut self, parent: u64, name: &OsStr) -> Result<FileAttr, FsError> {
        let name = name
            .to_str()
            .ok_or_else(|| FsError::InvalidArgument(format!("non UTF-8 name {:?}", name)))?;
        let path = InodeTable::child_path(&self.path_of(parent)?, name);

        let attr = self.rt.block_on(self.driver.getattr(&path))?;
        let ino = self.inodes.get_or_create(&path);
        Ok(self.make_attr(ino, &attr))
    }

    fn list_dir(&mut self, ino: u64) -> Result<Vec<(u64, FileType, String)>, FsError> {
        let path = self.path_of(ino)?;
        let names = self.rt.block_on(self.driver.readdir(&path))?;

        let parent_ino = if ino == InodeTable::ROOT_INODE {
            ino
        } else {
            self.inodes.get_or_create(&InodeTable::parent_path(&path))
        };

        let entries = names
            .into_iter()
            .map(|name| match name.as_str() {
                "." => (ino, FileType::Directory, name),
                ".." => (parent_ino, FileType::Directory, name),
                _ => {
                    let child_ino = self
                        .inodes
                        .get_or_create(&InodeTable::child_path(&path, &name));
                    (child_ino, FileType::RegularFile, name)
                }
            })
            .collect();

        Ok(entries)
    }

    fn release_handle(&mut self, ino: u64, fh: u64) -> Result<(), FsError> {
        let path = self.path_of(ino)?;
        self.driver.release(&path, fh);
        Ok(())
    }

    fn xattr_value(&self, ino: u64, name: &OsStr) -> Result<Vec<u8>, FsError> {
        let path = self.path_of(ino)?;
        self.driver.getxattr(&path, &name.to_string_lossy())
    }

    fn xattr_names(&self, ino: u64) -> Result<Vec<String>, FsError> {
        let path = self.path_of(ino)?;
        Ok(self.driver.listxattr(&path))
    }

    fn read_data(&mut self, ino: u64, fh: u64, offset: i64, size: u32) -> Result<Vec<u8>, FsError> {
        let offset = u64::try_from(offset)
            .map_err(|_| FsError::InvalidArgument(format!("negative offset {}", offset)))?;
        let path = self.path_of(ino)?;
        self.rt.block_on(self.driver.read(&path, fh, offset, size))
    }
}

impl Filesystem for DriveFs {
    fn init(
        &mut self,
        _req: &Request<'_>,
        _config: &mut fuser::KernelConfig,
    ) -> Result<(), libc::c_int> {
        tracing::info!(
            "FUSE filesystem initialized for root folder {} ({} indexed files)",
            self.driver.root_id(),
            self.driver.index().len()
        );
        Ok(())
    }

    fn destroy(&mut self) {
        tracing::info!("FUSE filesystem destroyed for root folder {}", self.driver.root_id());
    }

    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        match self.lookup_attr(parent, name) {
            Ok(attr) => reply.entry(&Self::ATTR_TTL, &attr, 0),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        let result = self
            .path_of(ino)
            .and_then(|path| self.rt.block_on(self.driver.getattr(&path)));

        match result {
            Ok(attr) => reply.attr(&Self::ATTR_TTL, &self.make_attr(ino, &attr)),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let entries = match self.list_dir(ino) {
            Ok(entries) => entries,
            Err(e) => return reply.error(e.errno()),
        };

        // Skip to offset and add entries
        for (i, (ino, kind, name)) in entries.into_iter().enumerate().skip(offset as usize) {
            if reply.add(ino, (i + 1) as i64, kind, &name) {
                break;
            }
        }

        reply.ok();
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, flags: i32, reply: ReplyOpen) {
        let result = check_read_only(flags)
            .and_then(|_| self.path_of(ino))
            .and_then(|path| self.driver.open(&path, flags));

        match result {
            Ok(fh) => reply.opened(fh, 0),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        match self.read_data(ino, fh, offset, size) {
            Ok(data) => reply.data(&data),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn release(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        match self.release_handle(ino, fh) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(e.errno()),
        }
    }

    // Extended attributes: nothing beyond stat fields is exposed
    fn getxattr(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        name: &OsStr,
        _size: u32,
        reply: ReplyXattr,
    ) {
        match self.xattr_value(ino, name) {
            Ok(value) => reply.data(&value),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn listxattr(&mut self, _req: &Request<'_>, ino: u64, size: u32, reply: ReplyXattr) {
        let names = match self.xattr_names(ino) {
            Ok(names) => names,
            Err(e) => return reply.error(e.errno()),
        };

        match xattr_list(&names, size) {
            Ok(XattrList::Size(len)) => reply.size(len),
            Ok(XattrList::Data(data)) => reply.data(&data),
            Err(errno) => reply.error(errno),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use common::prelude::RemoteStore;
    use common::testkit::MemoryStore;

    use super::*;

    #[test]
    fn test_write_opens_are_read_only() {
        for flags in [
            libc::O_WRONLY,
            libc::O_RDWR,
            libc::O_RDONLY | libc::O_TRUNC,
            libc::O_WRONLY | libc::O_APPEND,
        ] {
            let result = check_read_only(flags);
            assert!(matches!(result, Err(FsError::ReadOnly)), "{:#o}", flags);
            assert_eq!(result.unwrap_err().errno(), libc::EROFS);
        }
    }

    #[test]
    fn test_read_opens_pass() {
        assert!(check_read_only(libc::O_RDONLY).is_ok());
        assert!(check_read_only(libc::O_RDONLY | libc::O_NONBLOCK).is_ok());
    }

    #[test]
    fn test_empty_xattr_list() {
        assert_eq!(xattr_list(&[], 0), Ok(XattrList::Size(0)));
        assert_eq!(xattr_list(&[], 4096), Ok(XattrList::Data(Vec::new())));
    }

    #[test]
    fn test_xattr_list_encoding() {
        let names = vec!["user.a".to_string(), "user.bc".to_string()];
        assert_eq!(xattr_list(&names, 0), Ok(XattrList::Size(15)));
        assert_eq!(
            xattr_list(&names, 15),
            Ok(XattrList::Data(b"user.a\0user.bc\0".to_vec()))
        );
        assert_eq!(xattr_list(&names, 4), Err(libc::ERANGE));
    }

    async fn drive_fs() -> DriveFs {
        let store = MemoryStore::new(4);
        store.add_file("root", "A1", "report.txt", b"0123456789".to_vec());
        let store: Arc<dyn RemoteStore> = Arc::new(store);
        let driver = Driver::init(store, "root", Duration::from_secs(5))
            .await
            .unwrap();
        DriveFs::new(Handle::current(), driver)
    }

    #[tokio::test]
    async fn test_unknown_inode_is_not_found() {
        let mut fs = drive_fs().await;

        let release = fs.release_handle(99, 1);
        assert_eq!(release.unwrap_err().errno(), libc::ENOENT);
        let value = fs.xattr_value(99, OsStr::new("user.a"));
        assert_eq!(value.unwrap_err().errno(), libc::ENOENT);
        let names = fs.xattr_names(99);
        assert_eq!(names.unwrap_err().errno(), libc::ENOENT);
    }

    #[tokio::test]
    async fn test_known_inode_xattrs() {
        let fs = drive_fs().await;
        let root = InodeTable::ROOT_INODE;

        assert!(fs.xattr_names(root).unwrap().is_empty());
        let value = fs.xattr_value(root, OsStr::new("user.a"));
        assert_eq!(value.unwrap_err().errno(), libc::ENOTSUP);
    }

    #[tokio::test]
    async fn test_release_known_inode_drops_handle() {
        let mut fs = drive_fs().await;
        let root = InodeTable::ROOT_INODE;
        let ino = fs.inodes.get_or_create("/report.txt");
        let fh = fs.driver.open("/report.txt", libc::O_RDONLY).unwrap();

        fs.release_handle(ino, fh).unwrap();
        assert_eq!(fs.driver.handles().open_handles(), 0);
        assert!(fs.release_handle(root, fh).is_ok());
    }
}
