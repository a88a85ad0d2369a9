//! Kernel mount of a `DriveFs`
//!
//! The session runs on a thread owned by fuser. Dropping the returned
//! `BackgroundSession` unmounts the filesystem.

use std::path::Path;

use common::prelude::RemoteError;
use fuser::BackgroundSession;

use super::drive_fs::DriveFs;
use super::error::FsError;
use crate::state::StateError;

const FS_NAME: &str = "drivefs";

/// Mount options for the current platform. The mount is always read-only.
fn mount_options() -> Vec<fuser::MountOption> {
    #[cfg(target_os = "linux")]
    {
        vec![
            fuser::MountOption::FSName(FS_NAME.to_string()),
            fuser::MountOption::Subtype(FS_NAME.to_string()),
            fuser::MountOption::RO,
            fuser::MountOption::NoAtime,
        ]
    }

    #[cfg(target_os = "macos")]
    {
        vec![
            fuser::MountOption::FSName(FS_NAME.to_string()),
            fuser::MountOption::RO,
            fuser::MountOption::CUSTOM("volname=Google Drive".to_string()),
            fuser::MountOption::CUSTOM("noappledouble".to_string()),
        ]
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    {
        vec![
            fuser::MountOption::FSName(FS_NAME.to_string()),
            fuser::MountOption::RO,
        ]
    }
}

/// Mount `fs` at `mount_point` on a background session thread
pub fn spawn_mount(fs: DriveFs, mount_point: &Path) -> Result<BackgroundSession, MountError> {
    if !mount_point.exists() {
        return Err(MountError::MountPointNotFound(
            mount_point.display().to_string(),
        ));
    }
    if !mount_point.is_dir() {
        return Err(MountError::MountPointNotDirectory(
            mount_point.display().to_string(),
        ));
    }

    let options = mount_options();
    tracing::info!("Mounting drivefs at {:?}", mount_point);

    fuser::spawn_mount2(fs, mount_point, &options).map_err(|e| {
        tracing::error!("Failed to mount at {:?}: {}", mount_point, e);
        MountError::Mount(e)
    })
}

/// Errors that abort startup
#[derive(Debug, thiserror::Error)]
pub enum MountError {
    #[error("configuration error: {0}")]
    State(#[from] StateError),

    #[error("remote client error: {0}")]
    Client(#[from] RemoteError),

    #[error("failed to build path index: {0}")]
    Index(FsError),

    #[error("mount point not found: {0}")]
    MountPointNotFound(String),

    #[error("mount point is not a directory: {0}")]
    MountPointNotDirectory(String),

    #[error("failed to mount FUSE filesystem: {0}")]
    Mount(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_are_read_only() {
        let options = mount_options();
        assert!(options.contains(&fuser::MountOption::RO));
        assert!(options.contains(&fuser::MountOption::FSName("drivefs".to_string())));
    }
}
