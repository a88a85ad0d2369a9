use std::time::Duration;

use common::prelude::RemoteError;

/// Failure kinds shared by every filesystem component
///
/// Components return these; only `DriveFs` turns them into errno values
/// for the kernel.
#[derive(Debug, thiserror::Error)]
pub enum FsError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("operation not supported")]
    Unsupported,

    #[error("remote store error: {0}")]
    Io(#[from] RemoteError),

    #[error("remote fetch timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("filesystem is read-only")]
    ReadOnly,
}

impl FsError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// POSIX error code reported to the kernel
    pub fn errno(&self) -> libc::c_int {
        match self {
            FsError::NotFound(_) => libc::ENOENT,
            FsError::Unsupported => libc::ENOTSUP,
            FsError::Io(_) | FsError::Timeout(_) => libc::EIO,
            FsError::InvalidArgument(_) => libc::EINVAL,
            FsError::ReadOnly => libc::EROFS,
        }
    }
}
