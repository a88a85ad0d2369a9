use reqwest::StatusCode;

/// Errors returned by any remote store operation
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("HTTP request failed: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
    #[error("HTTP status {0}: {1}")]
    HttpStatus(StatusCode, String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("invalid access token: {0}")]
    InvalidToken(#[from] reqwest::header::InvalidHeaderValue),
    #[error("API base URL cannot carry path segments: {0}")]
    InvalidBaseUrl(String),
}
