pub mod utils;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use common::prelude::{DriveClient, RemoteStore};
use tokio::runtime::Handle;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};
use url::Url;

use crate::fuse::{spawn_mount, DriveFs, Driver, MountError};
use crate::state::AppState;

const LOG_FILE_NAME: &str = "drivefs.log";

/// Initialize logging, panic handler, and build info reporting.
/// Returns guards that must be kept alive for the duration of the program.
pub fn init_logging(
    log_level: tracing::Level,
    log_dir: &Path,
) -> Vec<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::fmt::format::FmtSpan;

    let mut guards = Vec::new();

    // Stdout layer
    let (stdout_writer, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());
    guards.push(stdout_guard);

    let stdout_env_filter = EnvFilter::builder()
        .with_default_directive(log_level.into())
        .from_env_lossy();

    let stdout_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(stdout_writer)
        .with_filter(stdout_env_filter);

    // File layer
    if let Err(e) = std::fs::create_dir_all(log_dir) {
        eprintln!(
            "Warning: Failed to create log directory {:?}: {}",
            log_dir, e
        );
    }

    let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_NAME);
    let (file_writer, file_guard) = tracing_appender::non_blocking(file_appender);
    guards.push(file_guard);

    let file_env_filter = EnvFilter::builder()
        .with_default_directive(log_level.into())
        .from_env_lossy();

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_span_events(FmtSpan::CLOSE)
        .with_filter(file_env_filter);

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(file_layer)
        .init();

    utils::register_panic_logger();
    utils::report_build_info();

    guards
}

/// Build the driver, mount it, and block until SIGINT or SIGTERM.
///
/// Any failure before the mount is up is fatal; the index is never rebuilt.
pub async fn run(mount_point: PathBuf, state: AppState) -> Result<(), MountError> {
    let config = &state.config;
    tracing::info!(
        "Loaded config from {:?} (state directory {:?})",
        state.config_path,
        state.drivefs_dir
    );

    let api_base = Url::parse(&config.api_base).map_err(common::prelude::RemoteError::from)?;
    let token = state.access_token()?;
    let client = DriveClient::new(&api_base, &token, config.chunk_size)?;
    let store: Arc<dyn RemoteStore> = Arc::new(client);

    tracing::info!(
        "Building path index for root folder {} from {}",
        config.root_folder_id,
        api_base
    );
    let driver = Driver::init(store, config.root_folder_id.clone(), config.chunk_timeout())
        .await
        .map_err(|e| {
            tracing::error!("Failed to initialize path index: {}", e);
            MountError::Index(e)
        })?;
    tracing::info!("Path index ready with {} entries", driver.index().len());
    driver.debug_file_mapping();

    let fs = DriveFs::new(Handle::current(), driver);
    let session = spawn_mount(fs, &mount_point)?;
    tracing::info!("drivefs mounted at {:?}", mount_point);

    utils::shutdown_signal().await?;

    // Dropping the session unmounts and joins the FUSE thread
    tracing::info!("Unmounting {:?}", mount_point);
    if let Err(e) = tokio::task::spawn_blocking(move || drop(session)).await {
        tracing::error!("FUSE session did not shut down cleanly: {}", e);
    }

    Ok(())
}
