//! Open file state and offset-addressable reads over chunked downloads
//!
//! The remote download API only hands out content front to back, one chunk
//! at a time. Each open handle therefore keeps a growing in-memory buffer:
//! a read at `offset` first pulls chunks until the buffer covers
//! `offset + size` (or the stream runs dry), then slices.
//!
//! Memory held by a handle equals the highest offset read so far. Nothing is
//! evicted until the handle is released.

use std::collections::HashMap;
use std::time::Duration;

use common::prelude::{MediaStream, RemoteStore};

use super::error::FsError;
use super::path_index::PathIndex;

enum StreamState {
    /// Opened, nothing downloaded yet
    Idle,
    Active(Box<dyn MediaStream>),
    /// Every byte of the object is in the buffer
    Exhausted,
}

struct OpenFileHandle {
    path: String,
    remote_id: String,
    /// Bytes below `buffer.len()` are never rewritten
    buffer: Vec<u8>,
    stream: StreamState,
}

pub struct FileHandleManager {
    handles: HashMap<u64, OpenFileHandle>,
    next_fh: u64,
    chunk_timeout: Duration,
}

impl FileHandleManager {
    /// `chunk_timeout` bounds every single chunk fetch
    pub fn new(chunk_timeout: Duration) -> Self {
        Self {
            handles: HashMap::new(),
            next_fh: 1,
            chunk_timeout,
        }
    }

    /// Allocate a fresh handle for an indexed path
    ///
    /// Opening the same path twice yields two independent handles, each
    /// with its own buffer and download.
    pub fn open(&mut self, index: &PathIndex, path: &str) -> Result<u64, FsError> {
        let Some(remote_id) = index.resolve(path) else {
            tracing::debug!("File not found for path: {}", path);
            return Err(FsError::not_found(path));
        };

        // Handles carry the indexed spelling of the path, not the caller's
        let indexed_path = index.path_of(remote_id).unwrap_or(path);

        let fh = self.next_fh;
        self.next_fh += 1;
        self.handles.insert(
            fh,
            OpenFileHandle {
                path: indexed_path.to_string(),
                remote_id: remote_id.to_string(),
                buffer: Vec::new(),
                stream: StreamState::Idle,
            },
        );

        tracing::debug!("File opened for path: {}, file_id: {}, fh: {}", path, remote_id, fh);
        Ok(fh)
    }

    /// Read up to `size` bytes at `offset`, downloading as needed
    ///
    /// Short reads only happen at end of file.
    pub async fn read(
        &mut self,
        store: &dyn RemoteStore,
        fh: u64,
        offset: u64,
        size: u32,
    ) -> Result<Vec<u8>, FsError> {
        let chunk_timeout = self.chunk_timeout;
        let Some(handle) = self.handles.get_mut(&fh) else {
            tracing::debug!("Read on unopened handle {}", fh);
            return Err(FsError::not_found(format!("file handle {}", fh)));
        };

        if matches!(handle.stream, StreamState::Idle) {
            let stream = store
                .open_media_stream(&handle.remote_id)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to start download for {}: {}", handle.path, e);
                    FsError::Io(e)
                })?;
            tracing::debug!("Downloader initialized for file_id: {}", handle.remote_id);
            handle.stream = StreamState::Active(stream);
        }

        let end = offset.saturating_add(u64::from(size));

        while (handle.buffer.len() as u64) < end {
            let StreamState::Active(stream) = &mut handle.stream else {
                break;
            };

            let chunk = match tokio::time::timeout(chunk_timeout, stream.next_chunk()).await {
                Ok(result) => result.map_err(|e| {
                    tracing::error!("Chunk download failed for {}: {}", handle.path, e);
                    FsError::Io(e)
                })?,
                Err(_) => {
                    tracing::error!(
                        "Chunk download for {} timed out after {:?}",
                        handle.path,
                        chunk_timeout
                    );
                    return Err(FsError::Timeout(chunk_timeout));
                }
            };

            match chunk {
                Some(chunk) => {
                    handle.buffer.extend_from_slice(&chunk);
                    tracing::debug!(
                        "Download progress for {}: {} bytes materialized",
                        handle.path,
                        handle.buffer.len()
                    );
                }
                None => {
                    tracing::debug!("Download completed for {}", handle.path);
                    handle.stream = StreamState::Exhausted;
                }
            }
        }

        let available = handle.buffer.len() as u64;
        let start = offset.min(available) as usize;
        let stop = end.min(available) as usize;
        let data = handle.buffer[start..stop].to_vec();

        tracing::debug!(
            "Returning {} bytes for read request on path: {}",
            data.len(),
            handle.path
        );
        Ok(data)
    }

    /// Drop a handle and its buffer. Returns false for unknown handles.
    pub fn release(&mut self, fh: u64) -> bool {
        match self.handles.remove(&fh) {
            Some(handle) => {
                tracing::debug!(
                    "Released fh {} for {} ({} bytes buffered)",
                    fh,
                    handle.path,
                    handle.buffer.len()
                );
                true
            }
            None => false,
        }
    }

    /// Bytes downloaded so far for a handle
    pub fn materialized_len(&self, fh: u64) -> Option<u64> {
        self.handles.get(&fh).map(|h| h.buffer.len() as u64)
    }

    /// Whether the handle's download has reached end of stream
    pub fn is_exhausted(&self, fh: u64) -> bool {
        self.handles
            .get(&fh)
            .is_some_and(|h| matches!(h.stream, StreamState::Exhausted))
    }

    /// Indexed path a handle was opened for
    pub fn handle_path(&self, fh: u64) -> Option<&str> {
        self.handles.get(&fh).map(|h| h.path.as_str())
    }

    pub fn open_handles(&self) -> usize {
        self.handles.len()
    }
}
