//! Remote object store abstraction
//!
//! The store is flat and ID-addressed: every object has an opaque identifier,
//! a display name and (for binary content) a size. Hierarchy only exists
//! through parent links, which is what `list_children` queries.

mod error;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};

pub use error::RemoteError;

/// A child object as returned by a listing call
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteObject {
    pub id: String,
    pub name: String,
    /// Drive encodes sizes as decimal strings and omits them entirely
    /// for native documents
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub mime_type: Option<String>,
}

impl RemoteObject {
    pub fn new(id: impl Into<String>, name: impl Into<String>, size: u64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            size: Some(size),
            mime_type: None,
        }
    }
}

/// Metadata for a single object, fetched on demand
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteMetadata {
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub size: Option<u64>,
}

impl RemoteMetadata {
    /// Size in bytes, 0 when the store reports none
    pub fn size_or_zero(&self) -> u64 {
        self.size.unwrap_or(0)
    }
}

/// A resumable, chunk-at-a-time download of one object's content
#[async_trait]
pub trait MediaStream: Send {
    /// Pull the next chunk. `Ok(None)` means the stream is exhausted and
    /// every byte of the object has been handed out.
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, RemoteError>;
}

/// Operations the filesystem driver needs from the remote store
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// List the immediate, non-trashed children of `parent_id`, in the
    /// store's own order
    async fn list_children(&self, parent_id: &str) -> Result<Vec<RemoteObject>, RemoteError>;

    /// Fetch size metadata for a single object
    async fn get_metadata(&self, id: &str) -> Result<RemoteMetadata, RemoteError>;

    /// Open a chunked media stream over the object's content. No bytes are
    /// transferred until the first `next_chunk`.
    async fn open_media_stream(&self, id: &str) -> Result<Box<dyn MediaStream>, RemoteError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_object_parses_string_size() {
        let json = r#"{"id":"A1","name":"report.txt","size":"10","mimeType":"text/plain"}"#;
        let object: RemoteObject = serde_json::from_str(json).unwrap();

        assert_eq!(object.id, "A1");
        assert_eq!(object.name, "report.txt");
        assert_eq!(object.size, Some(10));
        assert_eq!(object.mime_type.as_deref(), Some("text/plain"));
    }

    #[test]
    fn test_native_document_has_no_size() {
        let json = r#"{"id":"D1","name":"notes","mimeType":"application/vnd.google-apps.document"}"#;
        let object: RemoteObject = serde_json::from_str(json).unwrap();
        assert_eq!(object.size, None);

        let metadata: RemoteMetadata = serde_json::from_str("{}").unwrap();
        assert_eq!(metadata.size_or_zero(), 0);
    }
}
