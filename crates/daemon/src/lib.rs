pub mod fuse;
pub mod process;

// App state (configuration, paths)
pub mod state;

pub use fuse::{Driver, DriveFs, FsError, MountError};
pub use process::{init_logging, run};
pub use state::{AppConfig, AppState, StateError};
