//! Path to remote identifier mapping
//!
//! The remote store addresses objects by opaque id; the kernel addresses
//! them by path. The index is built once at startup from the root folder's
//! immediate children and is read-only afterwards. Nested paths are never
//! indexed.

use std::collections::HashMap;

use common::prelude::{RemoteObject, RemoteStore};

use super::error::FsError;

/// Normalize a path the way `open`/`stat` callers expect it to compare:
/// repeated and trailing slashes collapse, `.` segments vanish and `..`
/// pops its parent. The result always starts with `/`.
pub fn normalize(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    format!("/{}", segments.join("/"))
}

pub fn is_root(path: &str) -> bool {
    normalize(path) == "/"
}

/// True when the first raw path segment starts with a dot.
///
/// Checked before normalization, so `/.`, `/..` and `/./x` count as hidden.
pub fn is_hidden(path: &str) -> bool {
    path.trim_start_matches('/')
        .split('/')
        .next()
        .is_some_and(|first| first.starts_with('.'))
}

/// Bidirectional path <-> remote id map for the root folder's children
#[derive(Debug, Default)]
pub struct PathIndex {
    path_to_id: HashMap<String, String>,
    id_to_path: HashMap<String, String>,
}

impl PathIndex {
    /// List `root_id` once and index every child as `/<name>`
    ///
    /// A listing failure is returned as `FsError::Io`; callers treat it as
    /// fatal since there is nothing useful to mount.
    pub async fn build(store: &dyn RemoteStore, root_id: &str) -> Result<Self, FsError> {
        tracing::debug!("Initializing path index from root folder {}", root_id);

        let children = store.list_children(root_id).await.map_err(|e| {
            tracing::error!("Failed to list root folder {}: {}", root_id, e);
            FsError::Io(e)
        })?;

        tracing::debug!("Fetched {} objects from root folder", children.len());
        let index = Self::from_objects(children);
        tracing::debug!("Path index initialization completed");
        Ok(index)
    }

    /// Index a pre-fetched listing. A later object with the same name
    /// replaces the earlier one's path mapping.
    pub fn from_objects(objects: impl IntoIterator<Item = RemoteObject>) -> Self {
        let mut index = Self::default();
        for object in objects {
            index.insert(&format!("/{}", object.name), &object.id);
        }
        index
    }

    fn insert(&mut self, path: &str, id: &str) {
        tracing::trace!("Mapping {} to id {}", path, id);
        self.path_to_id.insert(path.to_string(), id.to_string());
        self.id_to_path.insert(id.to_string(), path.to_string());
    }

    /// Remote id for a path, after normalization
    pub fn resolve(&self, path: &str) -> Option<&str> {
        self.path_to_id.get(&normalize(path)).map(String::as_str)
    }

    /// Path recorded for a remote id
    pub fn path_of(&self, id: &str) -> Option<&str> {
        self.id_to_path.get(id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.path_to_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.path_to_id.is_empty()
    }

    /// `(path, id)` pairs, sorted by path
    pub fn entries(&self) -> Vec<(&str, &str)> {
        let mut entries: Vec<_> = self
            .path_to_id
            .iter()
            .map(|(path, id)| (path.as_str(), id.as_str()))
            .collect();
        entries.sort_unstable();
        entries
    }
}
