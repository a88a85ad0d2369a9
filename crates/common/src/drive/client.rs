use std::future::Future;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use url::Url;

use super::media::DriveMediaStream;
use crate::remote::{MediaStream, RemoteError, RemoteMetadata, RemoteObject, RemoteStore};

pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/drive/v3/";

/// Same default the Google client libraries use for media downloads (100MB)
pub const DEFAULT_CHUNK_SIZE: u64 = 100 * 1024 * 1024;

const LIST_FIELDS: &str = "nextPageToken, files(id, name, size, mimeType)";
const METADATA_FIELDS: &str = "id, name, size";
const PAGE_SIZE: &str = "1000";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    next_page_token: Option<String>,
    #[serde(default)]
    files: Vec<RemoteObject>,
}

#[derive(Debug, Clone)]
pub struct DriveClient {
    api_base: Url,
    client: Client,
    chunk_size: u64,
}

impl DriveClient {
    pub fn new(api_base: &Url, access_token: &str, chunk_size: u64) -> Result<Self, RemoteError> {
        let mut bearer = HeaderValue::from_str(&format!("Bearer {}", access_token.trim()))?;
        bearer.set_sensitive(true);

        let mut default_headers = HeaderMap::new();
        default_headers.insert(AUTHORIZATION, bearer);
        let client = Client::builder().default_headers(default_headers).build()?;

        Ok(Self {
            api_base: api_base.clone(),
            client,
            chunk_size: chunk_size.max(1),
        })
    }

    /// Get the underlying HTTP client for custom requests
    pub fn http_client(&self) -> &Client {
        &self.client
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// `{api_base}/files` or `{api_base}/files/{id}`, with the id encoded as
    /// a single path segment
    pub fn files_url(&self, id: Option<&str>) -> Result<Url, RemoteError> {
        let mut url = self.api_base.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| RemoteError::InvalidBaseUrl(self.api_base.to_string()))?;
            segments.pop_if_empty().push("files");
            if let Some(id) = id {
                segments.push(id);
            }
        }
        Ok(url)
    }

    async fn call<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, RemoteError> {
        let response = request.send().await?;

        if response.status().is_success() {
            Ok(response.json::<T>().await?)
        } else {
            Err(RemoteError::HttpStatus(
                response.status(),
                response.text().await?,
            ))
        }
    }
}

/// Build the `q` parameter for a parent listing. Quotes and backslashes in
/// the id are escaped per the Drive query grammar.
fn parents_query(parent_id: &str) -> String {
    let escaped = parent_id.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{}' in parents and trashed=false", escaped)
}

/// Drain a paginated listing: request pages, passing each
/// `nextPageToken` back, until a page arrives without one. Objects keep the
/// order the pages delivered them in.
async fn collect_pages<F, Fut>(mut fetch_page: F) -> Result<Vec<RemoteObject>, RemoteError>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<FileList, RemoteError>>,
{
    let mut objects = Vec::new();
    let mut page_token: Option<String> = None;

    loop {
        let page = fetch_page(page_token.take()).await?;
        tracing::trace!(count = page.files.len(), "fetched listing page");
        objects.extend(page.files);

        match page.next_page_token {
            Some(token) if !token.is_empty() => page_token = Some(token),
            _ => break,
        }
    }

    Ok(objects)
}

#[async_trait]
impl RemoteStore for DriveClient {
    async fn list_children(&self, parent_id: &str) -> Result<Vec<RemoteObject>, RemoteError> {
        let url = self.files_url(None)?;
        let query = parents_query(parent_id);

        collect_pages(move |page_token| {
            let mut request = self.client.get(url.clone()).query(&[
                ("q", query.as_str()),
                ("fields", LIST_FIELDS),
                ("pageSize", PAGE_SIZE),
            ]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }
            self.call::<FileList>(request)
        })
        .await
    }

    async fn get_metadata(&self, id: &str) -> Result<RemoteMetadata, RemoteError> {
        let url = self.files_url(Some(id))?;
        let request = self.client.get(url).query(&[("fields", METADATA_FIELDS)]);
        self.call(request).await
    }

    async fn open_media_stream(&self, id: &str) -> Result<Box<dyn MediaStream>, RemoteError> {
        Ok(Box::new(DriveMediaStream::new(self.clone(), id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> DriveClient {
        DriveClient::new(&Url::parse(base).unwrap(), "token", DEFAULT_CHUNK_SIZE).unwrap()
    }

    #[test]
    fn test_files_url_with_trailing_slash() {
        let client = client(DEFAULT_API_BASE);
        assert_eq!(
            client.files_url(None).unwrap().as_str(),
            "https://www.googleapis.com/drive/v3/files"
        );
        assert_eq!(
            client.files_url(Some("A1")).unwrap().as_str(),
            "https://www.googleapis.com/drive/v3/files/A1"
        );
    }

    #[test]
    fn test_files_url_without_trailing_slash() {
        let client = client("http://localhost:8080/drive/v3");
        assert_eq!(
            client.files_url(Some("A1")).unwrap().as_str(),
            "http://localhost:8080/drive/v3/files/A1"
        );
    }

    #[test]
    fn test_files_url_encodes_id() {
        let client = client(DEFAULT_API_BASE);
        let url = client.files_url(Some("a/b c")).unwrap();
        assert_eq!(url.path(), "/drive/v3/files/a%2Fb%20c");
    }

    #[test]
    fn test_parents_query_escapes_quotes() {
        assert_eq!(parents_query("root"), "'root' in parents and trashed=false");
        assert_eq!(
            parents_query("it's"),
            "'it\\'s' in parents and trashed=false"
        );
    }

    fn page(names: &[&str], next: Option<&str>) -> FileList {
        FileList {
            next_page_token: next.map(str::to_string),
            files: names
                .iter()
                .map(|name| RemoteObject::new(format!("id-{}", name), *name, 1))
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_collect_pages_follows_tokens() {
        let mut pages = vec![
            page(&["a", "b"], Some("p2")),
            page(&["c"], Some("p3")),
            page(&["d"], None),
        ]
        .into_iter();
        let mut seen_tokens = Vec::new();

        let objects = collect_pages(|token| {
            seen_tokens.push(token);
            std::future::ready(pages.next().ok_or_else(|| {
                RemoteError::InvalidResponse("no more pages".into())
            }))
        })
        .await
        .unwrap();

        let names: Vec<_> = objects.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c", "d"]);
        assert_eq!(
            seen_tokens,
            vec![None, Some("p2".to_string()), Some("p3".to_string())]
        );
    }

    #[tokio::test]
    async fn test_collect_pages_stops_on_empty_token() {
        let mut calls = 0;
        let objects = collect_pages(|_| {
            calls += 1;
            std::future::ready(Ok(page(&["only"], Some(""))))
        })
        .await
        .unwrap();

        assert_eq!(objects.len(), 1);
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_collect_pages_fails_on_any_page_error() {
        let mut pages = vec![
            Ok(page(&["a"], Some("p2"))),
            Err(RemoteError::InvalidResponse("truncated".into())),
        ]
        .into_iter();

        let result = collect_pages(|_| {
            std::future::ready(pages.next().unwrap_or_else(|| Ok(page(&[], None))))
        })
        .await;

        assert!(matches!(result, Err(RemoteError::InvalidResponse(_))));
    }

    #[test]
    fn test_rejects_token_with_newline() {
        let base = Url::parse(DEFAULT_API_BASE).unwrap();
        let result = DriveClient::new(&base, "bad\ntoken", DEFAULT_CHUNK_SIZE);
        assert!(matches!(result, Err(RemoteError::InvalidToken(_))));
    }

    #[test]
    fn test_zero_chunk_size_is_clamped() {
        let base = Url::parse(DEFAULT_API_BASE).unwrap();
        let client = DriveClient::new(&base, "token", 0).unwrap();
        assert_eq!(client.chunk_size(), 1);
    }
}
