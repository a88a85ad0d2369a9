//! Directory listings straight from the remote store

use common::prelude::RemoteStore;

use super::error::FsError;
use super::path_index::{is_root, PathIndex};

pub struct DirectoryEnumerator<'a> {
    store: &'a dyn RemoteStore,
    index: &'a PathIndex,
    root_id: &'a str,
}

impl<'a> DirectoryEnumerator<'a> {
    pub fn new(store: &'a dyn RemoteStore, index: &'a PathIndex, root_id: &'a str) -> Self {
        Self {
            store,
            index,
            root_id,
        }
    }

    /// Names of `path`'s children, prefixed with `.` and `..`, in remote
    /// listing order
    ///
    /// The root is always listed live rather than from the index. Any other
    /// path is resolved through the index first; an unresolved path is
    /// still sent to the store with an empty id, which the store rejects.
    pub async fn readdir(&self, path: &str) -> Result<Vec<String>, FsError> {
        let parent_id = if is_root(path) {
            self.root_id
        } else {
            self.index.resolve(path).unwrap_or_else(|| {
                tracing::warn!("readdir on unindexed path {}, listing with empty id", path);
                ""
            })
        };

        let children = self.store.list_children(parent_id).await.map_err(|e| {
            tracing::error!("Failed to list directory contents of {}: {}", path, e);
            FsError::Io(e)
        })?;

        let mut entries = Vec::with_capacity(children.len() + 2);
        entries.push(".".to_string());
        entries.push("..".to_string());
        entries.extend(children.into_iter().map(|child| child.name));

        Ok(entries)
    }
}
