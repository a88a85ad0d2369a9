//! Path-addressed filesystem operations
//!
//! `Driver` is the callback surface the kernel adapter dispatches to. It
//! owns the path index and every open handle, and borrows the remote store
//! for each call. Methods that mutate state take `&mut self`: callbacks are
//! serialized, so nothing here needs a lock.

use std::sync::Arc;
use std::time::Duration;

use common::prelude::RemoteStore;

use super::attrs::{AttributeSynthesizer, Attributes};
use super::dir::DirectoryEnumerator;
use super::error::FsError;
use super::handles::FileHandleManager;
use super::path_index::PathIndex;

pub struct Driver {
    store: Arc<dyn RemoteStore>,
    root_id: String,
    index: PathIndex,
    handles: FileHandleManager,
}

impl Driver {
    /// Build the path index from the root folder and return a ready driver
    ///
    /// Fails if the root listing fails; there is no degraded mode.
    pub async fn init(
        store: Arc<dyn RemoteStore>,
        root_id: impl Into<String>,
        chunk_timeout: Duration,
    ) -> Result<Self, FsError> {
        let root_id = root_id.into();
        let index = PathIndex::build(store.as_ref(), &root_id).await?;

        Ok(Self {
            store,
            root_id,
            index,
            handles: FileHandleManager::new(chunk_timeout),
        })
    }

    pub fn index(&self) -> &PathIndex {
        &self.index
    }

    pub fn handles(&self) -> &FileHandleManager {
        &self.handles
    }

    pub fn root_id(&self) -> &str {
        &self.root_id
    }

    /// Log the whole path index at debug level
    pub fn debug_file_mapping(&self) {
        tracing::debug!("Current file path to ID mapping:");
        for (path, id) in self.index.entries() {
            tracing::debug!("Path: {} -> File ID: {}", path, id);
        }
    }

    pub async fn getattr(&self, path: &str) -> Result<Attributes, FsError> {
        tracing::debug!("getattr called for path: {}", path);
        AttributeSynthesizer::new(self.store.as_ref(), &self.index)
            .getattr(path)
            .await
    }

    pub async fn readdir(&self, path: &str) -> Result<Vec<String>, FsError> {
        tracing::debug!("readdir called for path: {}", path);
        DirectoryEnumerator::new(self.store.as_ref(), &self.index, &self.root_id)
            .readdir(path)
            .await
    }

    /// Open `path` and return a handle token for subsequent reads
    pub fn open(&mut self, path: &str, flags: i32) -> Result<u64, FsError> {
        tracing::debug!("open called for path: {} with flags: {:#o}", path, flags);
        self.handles.open(&self.index, path)
    }

    pub async fn read(
        &mut self,
        path: &str,
        fh: u64,
        offset: u64,
        size: u32,
    ) -> Result<Vec<u8>, FsError> {
        tracing::debug!(
            "read called for path: {} with size: {} and offset: {}",
            path,
            size,
            offset
        );
        self.handles
            .read(self.store.as_ref(), fh, offset, size)
            .await
    }

    pub fn release(&mut self, path: &str, fh: u64) {
        tracing::debug!("release called for path: {} (fh {})", path, fh);
        self.handles.release(fh);
    }

    pub fn getxattr(&self, _path: &str, _name: &str) -> Result<Vec<u8>, FsError> {
        Err(FsError::Unsupported)
    }

    pub fn listxattr(&self, _path: &str) -> Vec<String> {
        Vec::new()
    }
}
