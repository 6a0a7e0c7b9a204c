use serde::Deserialize;
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read the config file.
    ReadFile { path: PathBuf, source: std::io::Error },
    /// Failed to parse JSON.
    ParseJson { path: PathBuf, source: serde_json::Error },
    /// Validation error.
    Validation(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFile { path, source } => {
                write!(f, "failed to read config file '{}': {}", path.display(), source)
            }
            Self::ParseJson { path, source } => {
                write!(f, "failed to parse config file '{}': {}", path.display(), source)
            }
            Self::Validation(msg) => write!(f, "config validation error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ReadFile { source, .. } => Some(source),
            Self::ParseJson { source, .. } => Some(source),
            Self::Validation(_) => None,
        }
    }
}

#[derive(Deserialize)]
struct ConfigFile {
    /// Address the chat server listens on.
    #[serde(default = "default_listen_addr")]
    listen_addr: String,
    /// Number of recent messages replayed to a joining client.
    #[serde(default = "default_max_history")]
    max_history: usize,
    /// Directory for state files (logs). Defaults to current directory.
    data_dir: Option<String>,
}

fn default_listen_addr() -> String {
    "0.0.0.0:5000".to_string()
}

fn default_max_history() -> usize {
    100
}

pub struct Config {
    pub listen_addr: SocketAddr,
    pub max_history: usize,
    /// Directory for state files (logs).
    pub data_dir: PathBuf,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config_path = path.as_ref().to_path_buf();
        let content = std::fs::read_to_string(&config_path)
            .map_err(|e| ConfigError::ReadFile { path: config_path.clone(), source: e })?;
        let file: ConfigFile = serde_json::from_str(&content)
            .map_err(|e| ConfigError::ParseJson { path: config_path.clone(), source: e })?;

        let listen_addr: SocketAddr = file.listen_addr.parse().map_err(|_| {
            ConfigError::Validation(format!(
                "listen_addr '{}' is not a valid socket address",
                file.listen_addr
            ))
        })?;

        if file.max_history == 0 {
            return Err(ConfigError::Validation("max_history must be at least 1".into()));
        }

        let data_dir = file
            .data_dir
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self {
            listen_addr,
            max_history: file.max_history,
            data_dir,
        })
    }
}
