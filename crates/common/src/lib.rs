/**
 * Google Drive v3 implementation of the remote store.
 *  Listing, single-object metadata and ranged
 *  media downloads over reqwest.
 */
pub mod drive;
/**
 * The remote object store seam the filesystem
 *  driver is written against: listing children,
 *  fetching metadata and opening chunked media
 *  streams by remote identifier.
 */
pub mod remote;
/**
 * In-memory store for tests. Counts every remote
 *  call and can be told to fail.
 */
#[cfg(feature = "testkit")]
pub mod testkit;
/**
 * Build metadata baked in at compile time.
 */
pub mod version;

pub mod prelude {
    pub use crate::drive::{DriveClient, DriveMediaStream, DEFAULT_CHUNK_SIZE};
    pub use crate::remote::{MediaStream, RemoteError, RemoteMetadata, RemoteObject, RemoteStore};
    pub use crate::version::build_info;
}
