use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use reqwest::StatusCode;

use crate::remote::{MediaStream, RemoteError, RemoteMetadata, RemoteObject, RemoteStore};

/// Snapshot of how many times each remote operation was invoked
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub list_children: usize,
    pub get_metadata: usize,
    pub open_media_stream: usize,
    pub next_chunk: usize,
}

impl CallCounts {
    pub fn total(&self) -> usize {
        self.list_children + self.get_metadata + self.open_media_stream + self.next_chunk
    }
}

#[derive(Debug, Default)]
struct Counters {
    list_children: AtomicUsize,
    get_metadata: AtomicUsize,
    open_media_stream: AtomicUsize,
    next_chunk: AtomicUsize,
}

#[derive(Debug, Default)]
struct Failures {
    listing: AtomicBool,
    metadata: AtomicBool,
    streams: AtomicBool,
}

/// In-memory `RemoteStore`
pub struct MemoryStore {
    children: RwLock<HashMap<String, Vec<RemoteObject>>>,
    objects: RwLock<HashMap<String, RemoteObject>>,
    contents: RwLock<HashMap<String, Bytes>>,
    chunk_size: usize,
    chunk_delay: Option<Duration>,
    counters: Arc<Counters>,
    failures: Arc<Failures>,
}

impl MemoryStore {
    /// Create an empty store whose media streams hand out `chunk_size`
    /// bytes per chunk
    pub fn new(chunk_size: usize) -> Self {
        Self {
            children: RwLock::new(HashMap::new()),
            objects: RwLock::new(HashMap::new()),
            contents: RwLock::new(HashMap::new()),
            chunk_size: chunk_size.max(1),
            chunk_delay: None,
            counters: Arc::new(Counters::default()),
            failures: Arc::new(Failures::default()),
        }
    }

    /// Sleep before every chunk, to exercise timeouts
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = Some(delay);
        self
    }

    /// Add a binary file under `parent_id`; its size is the content length
    pub fn add_file(&self, parent_id: &str, id: &str, name: &str, content: impl Into<Bytes>) {
        let content = content.into();
        let object = RemoteObject::new(id, name, content.len() as u64);
        self.add_object(parent_id, object);
        self.contents.write().insert(id.to_string(), content);
    }

    /// Add an object without content, e.g. a folder or a native document
    pub fn add_object(&self, parent_id: &str, object: RemoteObject) {
        self.objects.write().insert(object.id.clone(), object.clone());
        self.children
            .write()
            .entry(parent_id.to_string())
            .or_default()
            .push(object);
    }

    pub fn fail_listing(&self, fail: bool) {
        self.failures.listing.store(fail, Ordering::SeqCst);
    }

    pub fn fail_metadata(&self, fail: bool) {
        self.failures.metadata.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `next_chunk` fail, including on streams that
    /// are already open
    pub fn fail_streams(&self, fail: bool) {
        self.failures.streams.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> CallCounts {
        CallCounts {
            list_children: self.counters.list_children.load(Ordering::SeqCst),
            get_metadata: self.counters.get_metadata.load(Ordering::SeqCst),
            open_media_stream: self.counters.open_media_stream.load(Ordering::SeqCst),
            next_chunk: self.counters.next_chunk.load(Ordering::SeqCst),
        }
    }
}

fn injected_failure(operation: &str) -> RemoteError {
    RemoteError::HttpStatus(
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("injected {} failure", operation),
    )
}

fn not_found(id: &str) -> RemoteError {
    RemoteError::HttpStatus(StatusCode::NOT_FOUND, format!("File not found: {}", id))
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn list_children(&self, parent_id: &str) -> Result<Vec<RemoteObject>, RemoteError> {
        self.counters.list_children.fetch_add(1, Ordering::SeqCst);

        if self.failures.listing.load(Ordering::SeqCst) {
            return Err(injected_failure("listing"));
        }
        if parent_id.is_empty() {
            return Err(RemoteError::HttpStatus(
                StatusCode::BAD_REQUEST,
                "Invalid Value".to_string(),
            ));
        }

        Ok(self
            .children
            .read()
            .get(parent_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_metadata(&self, id: &str) -> Result<RemoteMetadata, RemoteError> {
        self.counters.get_metadata.fetch_add(1, Ordering::SeqCst);

        if self.failures.metadata.load(Ordering::SeqCst) {
            return Err(injected_failure("metadata"));
        }

        self.objects
            .read()
            .get(id)
            .map(|object| RemoteMetadata { size: object.size })
            .ok_or_else(|| not_found(id))
    }

    async fn open_media_stream(&self, id: &str) -> Result<Box<dyn MediaStream>, RemoteError> {
        self.counters.open_media_stream.fetch_add(1, Ordering::SeqCst);

        let data = self
            .contents
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| not_found(id))?;

        Ok(Box::new(MemoryMediaStream {
            data,
            position: 0,
            chunk_size: self.chunk_size,
            chunk_delay: self.chunk_delay,
            counters: self.counters.clone(),
            failures: self.failures.clone(),
        }))
    }
}

struct MemoryMediaStream {
    data: Bytes,
    position: usize,
    chunk_size: usize,
    chunk_delay: Option<Duration>,
    counters: Arc<Counters>,
    failures: Arc<Failures>,
}

#[async_trait]
impl MediaStream for MemoryMediaStream {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, RemoteError> {
        self.counters.next_chunk.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.chunk_delay {
            tokio::time::sleep(delay).await;
        }
        if self.failures.streams.load(Ordering::SeqCst) {
            return Err(injected_failure("download"));
        }
        if self.position >= self.data.len() {
            return Ok(None);
        }

        let end = (self.position + self.chunk_size).min(self.data.len());
        let chunk = self.data.slice(self.position..end);
        self.position = end;
        Ok(Some(chunk))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stream_hands_out_fixed_chunks() {
        let store = MemoryStore::new(4);
        store.add_file("root", "A1", "report.txt", b"0123456789".to_vec());

        let mut stream = store.open_media_stream("A1").await.unwrap();
        let mut chunks = Vec::new();
        while let Some(chunk) = stream.next_chunk().await.unwrap() {
            chunks.push(chunk);
        }

        assert_eq!(chunks, vec![&b"0123"[..], &b"4567"[..], &b"89"[..]]);
        let calls = store.calls();
        assert_eq!(calls.open_media_stream, 1);
        // three chunks plus the call that reported exhaustion
        assert_eq!(calls.next_chunk, 4);
    }

    #[tokio::test]
    async fn test_listing_keeps_insertion_order() {
        let store = MemoryStore::new(4);
        store.add_file("root", "B", "b.txt", b"b".to_vec());
        store.add_file("root", "A", "a.txt", b"a".to_vec());

        let names: Vec<_> = store
            .list_children("root")
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.name)
            .collect();
        assert_eq!(names, vec!["b.txt", "a.txt"]);
        assert!(store.list_children("elsewhere").await.unwrap().is_empty());
        assert!(store.list_children("").await.is_err());
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let store = MemoryStore::new(4);
        store.add_file("root", "A1", "report.txt", b"0123456789".to_vec());

        store.fail_listing(true);
        assert!(store.list_children("root").await.is_err());

        store.fail_metadata(true);
        assert!(store.get_metadata("A1").await.is_err());

        let mut stream = store.open_media_stream("A1").await.unwrap();
        store.fail_streams(true);
        assert!(stream.next_chunk().await.is_err());
        store.fail_streams(false);
        assert_eq!(stream.next_chunk().await.unwrap().unwrap(), &b"0123"[..]);
    }
}
