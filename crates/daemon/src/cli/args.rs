pub use clap::Parser;

use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "drivefs", version)]
#[command(about = "Mount a Google Drive folder as a read-only filesystem")]
pub struct Args {
    /// Directory to mount the drive folder on
    pub mountpoint: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_mountpoint() {
        let args = Args::try_parse_from(["drivefs", "/mnt/drive"]).unwrap();
        assert_eq!(args.mountpoint, PathBuf::from("/mnt/drive"));
    }

    #[test]
    fn test_mountpoint_is_required() {
        let err = Args::try_parse_from(["drivefs"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }
}
