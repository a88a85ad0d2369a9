use std::time::Duration;
use std::{fs, path::PathBuf};

use common::drive::{DEFAULT_API_BASE, DEFAULT_CHUNK_SIZE};
use serde::{Deserialize, Serialize};

pub const APP_NAME: &str = "drivefs";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const TOKEN_FILE_NAME: &str = "token";
pub const LOGS_DIR_NAME: &str = "logs";

/// Overrides the state directory (defaults to ~/.drivefs)
pub const DIR_ENV: &str = "DRIVEFS_DIR";
/// Overrides the access token file
pub const TOKEN_ENV: &str = "DRIVEFS_ACCESS_TOKEN";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Remote identifier of the folder projected at the mount root
    pub root_folder_id: String,
    /// Base URL of the Drive v3 API
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// File holding the OAuth access token (defaults to <dir>/token)
    #[serde(default)]
    pub access_token_file: Option<PathBuf>,
    /// Bytes requested per ranged download
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,
    /// Upper bound on a single chunk fetch
    #[serde(default = "default_chunk_timeout_secs")]
    pub chunk_timeout_secs: u64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Directory for the rolling log file (defaults to <dir>/logs)
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_chunk_size() -> u64 {
    DEFAULT_CHUNK_SIZE
}

fn default_chunk_timeout_secs() -> u64 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    pub fn chunk_timeout(&self) -> Duration {
        Duration::from_secs(self.chunk_timeout_secs)
    }

    pub fn log_level(&self) -> Result<tracing::Level, StateError> {
        self.log_level
            .parse()
            .map_err(|_| StateError::InvalidLogLevel(self.log_level.clone()))
    }
}

#[derive(Debug, Clone)]
pub struct AppState {
    /// Path to the drivefs directory (~/.drivefs)
    pub drivefs_dir: PathBuf,
    /// Path to the config file
    pub config_path: PathBuf,
    /// Path to the access token file
    pub token_path: PathBuf,
    /// Directory the log file rolls in
    pub log_dir: PathBuf,
    /// Loaded configuration
    pub config: AppConfig,
}

impl AppState {
    /// Get the drivefs directory path (custom, $DRIVEFS_DIR, or ~/.drivefs)
    pub fn drivefs_dir(custom_path: Option<PathBuf>) -> Result<PathBuf, StateError> {
        if let Some(path) = custom_path {
            return Ok(path);
        }

        if let Some(path) = std::env::var_os(DIR_ENV).filter(|p| !p.is_empty()) {
            return Ok(PathBuf::from(path));
        }

        let home = dirs::home_dir().ok_or(StateError::NoHomeDirectory)?;
        Ok(home.join(format!(".{}", APP_NAME)))
    }

    /// Load existing state from the drivefs directory
    pub fn load(custom_path: Option<PathBuf>) -> Result<Self, StateError> {
        let drivefs_dir = Self::drivefs_dir(custom_path)?;

        if !drivefs_dir.exists() {
            return Err(StateError::NotInitialized(drivefs_dir));
        }

        let config_path = drivefs_dir.join(CONFIG_FILE_NAME);
        if !config_path.exists() {
            return Err(StateError::MissingFile(CONFIG_FILE_NAME.to_string()));
        }

        let config_toml = fs::read_to_string(&config_path)?;
        let config: AppConfig = toml::from_str(&config_toml)?;

        if config.root_folder_id.trim().is_empty() {
            return Err(StateError::MissingRootFolder);
        }
        config.log_level()?;

        let token_path = config
            .access_token_file
            .clone()
            .unwrap_or_else(|| drivefs_dir.join(TOKEN_FILE_NAME));
        let log_dir = config
            .log_dir
            .clone()
            .unwrap_or_else(|| drivefs_dir.join(LOGS_DIR_NAME));

        Ok(Self {
            drivefs_dir,
            config_path,
            token_path,
            log_dir,
            config,
        })
    }

    /// Access token from $DRIVEFS_ACCESS_TOKEN, falling back to the token file
    pub fn access_token(&self) -> Result<String, StateError> {
        self.resolve_token(std::env::var(TOKEN_ENV).ok())
    }

    fn resolve_token(&self, from_env: Option<String>) -> Result<String, StateError> {
        if let Some(token) = from_env.map(|t| t.trim().to_string()) {
            if !token.is_empty() {
                return Ok(token);
            }
        }

        if !self.token_path.exists() {
            return Err(StateError::MissingFile(
                self.token_path.display().to_string(),
            ));
        }

        let token = fs::read_to_string(&self.token_path)?.trim().to_string();
        if token.is_empty() {
            return Err(StateError::EmptyToken(self.token_path.clone()));
        }

        Ok(token)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("drivefs directory {0} not found. Create it with a config.toml first")]
    NotInitialized(PathBuf),

    #[error("no home directory found")]
    NoHomeDirectory,

    #[error("missing required file: {0}")]
    MissingFile(String),

    #[error("root_folder_id must not be empty")]
    MissingRootFolder,

    #[error("invalid log level: {0}")]
    InvalidLogLevel(String),

    #[error("access token file {0} is empty")]
    EmptyToken(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(dir: &std::path::Path, contents: &str) {
        fs::write(dir.join(CONFIG_FILE_NAME), contents).unwrap();
    }

    #[test]
    fn test_load_applies_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        write_config(tmp.path(), "root_folder_id = \"root123\"\n");

        let state = AppState::load(Some(tmp.path().to_path_buf())).unwrap();

        assert_eq!(state.drivefs_dir, tmp.path());
        assert_eq!(state.config_path, tmp.path().join("config.toml"));
        assert_eq!(state.config.root_folder_id, "root123");
        assert_eq!(state.config.api_base, "https://www.googleapis.com/drive/v3/");
        assert_eq!(state.config.chunk_size, 104857600);
        assert_eq!(state.config.chunk_timeout(), Duration::from_secs(60));
        assert_eq!(state.config.log_level().unwrap(), tracing::Level::INFO);
        assert_eq!(state.token_path, tmp.path().join("token"));
        assert_eq!(state.log_dir, tmp.path().join("logs"));
    }

    #[test]
    fn test_load_overrides() {
        let tmp = tempfile::tempdir().unwrap();
        write_config(
            tmp.path(),
            r#"
root_folder_id = "root123"
api_base = "http://localhost:8080/drive/v3/"
access_token_file = "/etc/drivefs/token"
chunk_size = 4096
chunk_timeout_secs = 5
log_level = "debug"
log_dir = "/var/log/drivefs"
"#,
        );

        let state = AppState::load(Some(tmp.path().to_path_buf())).unwrap();

        assert_eq!(state.config.api_base, "http://localhost:8080/drive/v3/");
        assert_eq!(state.config.chunk_size, 4096);
        assert_eq!(state.config.chunk_timeout(), Duration::from_secs(5));
        assert_eq!(state.config.log_level().unwrap(), tracing::Level::DEBUG);
        assert_eq!(state.token_path, PathBuf::from("/etc/drivefs/token"));
        assert_eq!(state.log_dir, PathBuf::from("/var/log/drivefs"));
    }

    #[test]
    fn test_load_errors() {
        let tmp = tempfile::tempdir().unwrap();

        let missing = AppState::load(Some(tmp.path().join("nope")));
        assert!(matches!(missing, Err(StateError::NotInitialized(_))));

        let no_config = AppState::load(Some(tmp.path().to_path_buf()));
        assert!(matches!(no_config, Err(StateError::MissingFile(_))));

        write_config(tmp.path(), "chunk_size = 10\n");
        let no_root = AppState::load(Some(tmp.path().to_path_buf()));
        assert!(matches!(no_root, Err(StateError::TomlDe(_))));

        write_config(tmp.path(), "root_folder_id = \"r\"\nlog_level = \"loud\"\n");
        let bad_level = AppState::load(Some(tmp.path().to_path_buf()));
        assert!(matches!(bad_level, Err(StateError::InvalidLogLevel(_))));
    }

    #[test]
    fn test_token_resolution() {
        let tmp = tempfile::tempdir().unwrap();
        write_config(tmp.path(), "root_folder_id = \"root123\"\n");
        let state = AppState::load(Some(tmp.path().to_path_buf())).unwrap();

        assert!(matches!(
            state.resolve_token(None),
            Err(StateError::MissingFile(_))
        ));

        fs::write(&state.token_path, "  \n").unwrap();
        assert!(matches!(
            state.resolve_token(None),
            Err(StateError::EmptyToken(_))
        ));

        fs::write(&state.token_path, "ya29.file-token\n").unwrap();
        assert_eq!(state.resolve_token(None).unwrap(), "ya29.file-token");

        // Environment wins over the file, blank environment does not
        assert_eq!(
            state.resolve_token(Some("ya29.env-token".into())).unwrap(),
            "ya29.env-token"
        );
        assert_eq!(
            state.resolve_token(Some(String::new())).unwrap(),
            "ya29.file-token"
        );
    }
}
