//! Google Drive v3 remote store
//!
//! `DriveClient` speaks the REST API directly over reqwest with a bearer
//! token. Obtaining that token (service account, OAuth consent) is left to
//! the caller.

mod client;
mod media;

pub use client::{DriveClient, DEFAULT_API_BASE, DEFAULT_CHUNK_SIZE};
pub use media::DriveMediaStream;
