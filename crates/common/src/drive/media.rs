use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{CONTENT_RANGE, RANGE};
use reqwest::StatusCode;

use super::client::DriveClient;
use crate::remote::{MediaStream, RemoteError};

/// Where a chunked download stands, and how each response moves it along
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct DownloadProgress {
    /// Bytes handed out so far
    pub(crate) progress: u64,
    /// Total object size, known after the first response
    pub(crate) total_size: Option<u64>,
    pub(crate) done: bool,
}

impl DownloadProgress {
    /// `Range` header value for the next `chunk_size` bytes
    pub(crate) fn range_header(&self, chunk_size: u64) -> String {
        let last = self
            .progress
            .saturating_add(chunk_size.max(1))
            .saturating_sub(1);
        format!("bytes={}-{}", self.progress, last)
    }

    /// A 416 before any byte was received means the object is empty.
    /// Returns true when the stream is now finished.
    pub(crate) fn finish_if_empty(&mut self, status: StatusCode) -> bool {
        if status == StatusCode::RANGE_NOT_SATISFIABLE && self.progress == 0 {
            self.total_size = Some(0);
            self.done = true;
        }
        self.done
    }

    /// Account for a successful response carrying `body_len` bytes.
    /// Returns whether the body should be handed out.
    pub(crate) fn record(
        &mut self,
        content_range: Option<&str>,
        body_len: u64,
    ) -> Result<bool, RemoteError> {
        let total = content_range.map(parse_content_range_total).transpose()?;
        self.progress = self.progress.saturating_add(body_len);

        match total {
            Some(total) => {
                self.total_size = Some(total);
                if self.progress >= total {
                    self.done = true;
                }
            }
            None => {
                // No Content-Range: the server ignored the range and sent
                // the whole object in one response
                self.total_size = Some(self.progress);
                self.done = true;
            }
        }

        if body_len == 0 {
            self.done = true;
            return Ok(false);
        }

        Ok(true)
    }
}

/// Chunked download of one file's content via `alt=media` range requests
///
/// Each `next_chunk` asks for the next `chunk_size` bytes and reads the
/// total length back out of `Content-Range`. Progress lives entirely in this
/// struct, so a failed chunk can simply be requested again.
pub struct DriveMediaStream {
    client: DriveClient,
    file_id: String,
    state: DownloadProgress,
}

impl DriveMediaStream {
    pub fn new(client: DriveClient, file_id: &str) -> Self {
        Self {
            client,
            file_id: file_id.to_string(),
            state: DownloadProgress::default(),
        }
    }
}

/// Extract the complete length from `bytes <first>-<last>/<total>` or
/// `bytes */<total>`
pub(crate) fn parse_content_range_total(value: &str) -> Result<u64, RemoteError> {
    let invalid = || RemoteError::InvalidResponse(format!("bad Content-Range: {}", value));

    let range = value.trim().strip_prefix("bytes ").ok_or_else(invalid)?;
    let (_, total) = range.split_once('/').ok_or_else(invalid)?;
    total.trim().parse::<u64>().map_err(|_| invalid())
}

#[async_trait]
impl MediaStream for DriveMediaStream {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, RemoteError> {
        if self.state.done {
            return Ok(None);
        }

        let url = self.client.files_url(Some(&self.file_id))?;
        let response = self
            .client
            .http_client()
            .get(url)
            .query(&[("alt", "media")])
            .header(RANGE, self.state.range_header(self.client.chunk_size()))
            .send()
            .await?;

        let status = response.status();
        if self.state.finish_if_empty(status) {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(RemoteError::HttpStatus(status, response.text().await?));
        }

        let content_range = response
            .headers()
            .get(CONTENT_RANGE)
            .map(|value| {
                value
                    .to_str()
                    .map(str::to_string)
                    .map_err(|e| RemoteError::InvalidResponse(e.to_string()))
            })
            .transpose()?;

        let body = response.bytes().await?;
        let deliver = self
            .state
            .record(content_range.as_deref(), body.len() as u64)?;

        tracing::debug!(
            file_id = %self.file_id,
            progress = self.state.progress,
            total = ?self.state.total_size,
            "download progress"
        );

        Ok(deliver.then_some(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_content_range_total() {
        assert_eq!(parse_content_range_total("bytes 0-99/1234").unwrap(), 1234);
        assert_eq!(parse_content_range_total("bytes 1200-1233/1234").unwrap(), 1234);
        assert_eq!(parse_content_range_total("bytes */0").unwrap(), 0);
    }

    #[test]
    fn test_ranged_chunks_until_total() {
        let mut state = DownloadProgress::default();
        assert_eq!(state.range_header(4), "bytes=0-3");

        assert!(!state.finish_if_empty(StatusCode::PARTIAL_CONTENT));
        assert!(state.record(Some("bytes 0-3/10"), 4).unwrap());
        assert_eq!(state.total_size, Some(10));
        assert!(!state.done);
        assert_eq!(state.range_header(4), "bytes=4-7");

        assert!(state.record(Some("bytes 4-7/10"), 4).unwrap());
        assert!(!state.done);

        assert!(state.record(Some("bytes 8-9/10"), 2).unwrap());
        assert_eq!(state.progress, 10);
        assert!(state.done);
    }

    #[test]
    fn test_range_not_satisfiable_on_empty_object() {
        let mut state = DownloadProgress::default();
        assert!(state.finish_if_empty(StatusCode::RANGE_NOT_SATISFIABLE));
        assert_eq!(state.total_size, Some(0));
        assert!(state.done);
    }

    #[test]
    fn test_range_not_satisfiable_mid_stream_is_not_end() {
        let mut state = DownloadProgress::default();
        state.record(Some("bytes 0-3/10"), 4).unwrap();
        assert!(!state.finish_if_empty(StatusCode::RANGE_NOT_SATISFIABLE));
        assert_eq!(state.total_size, Some(10));
    }

    #[test]
    fn test_full_body_without_content_range() {
        let mut state = DownloadProgress::default();
        assert!(state.record(None, 10).unwrap());
        assert_eq!(state.total_size, Some(10));
        assert_eq!(state.progress, 10);
        assert!(state.done);
    }

    #[test]
    fn test_empty_body_ends_stream() {
        let mut state = DownloadProgress::default();
        assert!(!state.record(Some("bytes */0"), 0).unwrap());
        assert!(state.done);
    }

    #[test]
    fn test_bad_content_range_leaves_progress() {
        let mut state = DownloadProgress::default();
        assert!(state.record(Some("items 0-3"), 4).is_err());
        assert_eq!(state, DownloadProgress::default());
    }

    #[test]
    fn test_range_header_saturates() {
        let state = DownloadProgress {
            progress: 10,
            ..Default::default()
        };
        assert_eq!(
            state.range_header(u64::MAX),
            format!("bytes=10-{}", u64::MAX - 1)
        );
        assert_eq!(state.range_header(0), "bytes=10-10");
    }

    #[test]
    fn test_parse_content_range_rejects_garbage() {
        assert!(parse_content_range_total("0-99/1234").is_err());
        assert!(parse_content_range_total("bytes 0-99").is_err());
        assert!(parse_content_range_total("bytes 0-99/*").is_err());
    }
}
