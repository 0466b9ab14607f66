//! Server configuration: TOML file plus environment overrides.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sylva_error::{ClientError, Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Project root all relative file paths resolve against.
    pub root_dir: PathBuf,
    /// The store file. The socket is named after its file stem.
    pub db_path: PathBuf,
    pub socket_dir: PathBuf,
    pub backup_dir: PathBuf,
    pub max_connections: usize,
    pub max_frame_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("."),
            db_path: PathBuf::from(".sylva/store.db"),
            socket_dir: PathBuf::from(".sylva/sockets"),
            backup_dir: PathBuf::from(".sylva/backups"),
            max_connections: 64,
            max_frame_bytes: 16 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    /// Load from an optional TOML file, then apply `SYLVA_*` environment
    /// overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .map_err(|e| Error::file_op("read", path, e))?;
                toml::from_str(&content).map_err(|e| {
                    Error::from(ClientError::Validation {
                        message: format!("invalid config file {}: {e}", path.display()),
                    })
                })?
            }
            None => Self::default(),
        };

        if let Ok(v) = std::env::var("SYLVA_ROOT_DIR") {
            config.root_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("SYLVA_DB_PATH") {
            config.db_path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("SYLVA_SOCKET_DIR") {
            config.socket_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("SYLVA_BACKUP_DIR") {
            config.backup_dir = PathBuf::from(v);
        }
        Ok(config)
    }

    /// One socket per store, named from the store filename.
    pub fn socket_path(&self) -> PathBuf {
        let stem = self
            .db_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "sylva".into());
        self.socket_dir.join(format!("{stem}.sock"))
    }
}
