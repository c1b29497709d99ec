//! Configuration file loading.
//!
//! The file is JSON; every field is optional:
//!
//! ```json
//! {
//!   "endpoints": { "manifest": "sync.example:9998" },
//!   "save_root": "/home/me/.minecraft/saves",
//!   "connect_timeout_secs": 5,
//!   "retry_attempts": 5
//! }
//! ```
//!
//! Command-line flags override the file, which overrides the defaults.

use minesync_engine::{Endpoints, RetryConfig, SyncConfig};
use minesync_server::ServerConfig;
use serde::Deserialize;
use std::fs;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors raised while assembling configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("cannot read {}: {source}", .path.display())]
    Read {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid.
    #[error("invalid configuration in {}: {source}", .path.display())]
    Parse {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// An endpoint address cannot be bound.
    #[error("invalid listen address {0:?}")]
    InvalidAddress(String),
}

/// Values from the command line that override the file.
#[derive(Debug, Default)]
pub struct Overrides {
    pub save_root: Option<PathBuf>,
    pub manifest_addr: Option<String>,
    pub upload_addr: Option<String>,
    pub download_addr: Option<String>,
}

/// Contents of a configuration file.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub endpoints: Endpoints,
    pub save_root: Option<PathBuf>,
    pub temp_dir: Option<PathBuf>,
    pub connect_timeout_secs: Option<u64>,
    pub io_timeout_secs: Option<u64>,
    pub retry_attempts: Option<u32>,
    pub storage: Option<PathBuf>,
}

impl FileConfig {
    /// Reads a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn endpoints(&self, overrides: &Overrides) -> Endpoints {
        let mut endpoints = self.endpoints.clone();
        if let Some(addr) = &overrides.manifest_addr {
            endpoints.manifest = addr.clone();
        }
        if let Some(addr) = &overrides.upload_addr {
            endpoints.upload = addr.clone();
        }
        if let Some(addr) = &overrides.download_addr {
            endpoints.download = addr.clone();
        }
        endpoints
    }

    /// Builds the client configuration.
    pub fn sync_config(&self, overrides: &Overrides) -> SyncConfig {
        let mut config = SyncConfig::new(self.endpoints(overrides));
        if let Some(root) = overrides.save_root.as_ref().or(self.save_root.as_ref()) {
            config = config.with_save_root(root);
        }
        if let Some(dir) = &self.temp_dir {
            config = config.with_temp_dir(dir);
        }
        if let Some(secs) = self.connect_timeout_secs {
            config = config.with_connect_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = self.io_timeout_secs {
            // 0 disables the timeout
            let timeout = (secs > 0).then(|| Duration::from_secs(secs));
            config = config.with_io_timeout(timeout);
        }
        if let Some(attempts) = self.retry_attempts {
            config = config.with_retry(RetryConfig::new(attempts));
        }
        config
    }

    /// Builds the server configuration.
    pub fn server_config(
        &self,
        overrides: &Overrides,
        storage: Option<PathBuf>,
    ) -> Result<ServerConfig, ConfigError> {
        let endpoints = self.endpoints(overrides);
        let mut config = ServerConfig::new(
            listen_addr(&endpoints.manifest)?,
            listen_addr(&endpoints.upload)?,
            listen_addr(&endpoints.download)?,
        );
        if let Some(dir) = storage.or_else(|| self.storage.clone()) {
            config = config.with_storage(dir);
        }
        if let Some(secs) = self.io_timeout_secs {
            let timeout = (secs > 0).then(|| Duration::from_secs(secs));
            config = config.with_io_timeout(timeout);
        }
        Ok(config)
    }
}

fn listen_addr(addr: &str) -> Result<SocketAddr, ConfigError> {
    addr.to_socket_addrs()
        .ok()
        .and_then(|mut addrs| addrs.next())
        .ok_or_else(|| ConfigError::InvalidAddress(addr.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn file_values_apply_and_flags_win() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("minesync.json");
        fs::write(
            &path,
            r#"{
                "endpoints": { "manifest": "10.0.0.1:9998" },
                "save_root": "/from/file",
                "connect_timeout_secs": 3,
                "io_timeout_secs": 0,
                "retry_attempts": 5
            }"#,
        )
        .unwrap();

        let file = FileConfig::load(&path).unwrap();
        let config = file.sync_config(&Overrides::default());
        assert_eq!(config.endpoints.manifest, "10.0.0.1:9998");
        assert_eq!(config.endpoints.upload, "127.0.0.1:9999");
        assert_eq!(config.save_root, Some(PathBuf::from("/from/file")));
        assert_eq!(config.connect_timeout, Duration::from_secs(3));
        assert_eq!(config.io_timeout, None);
        assert_eq!(config.retry.max_attempts, 5);

        let overrides = Overrides {
            save_root: Some(PathBuf::from("/from/flag")),
            manifest_addr: Some("10.0.0.2:1".into()),
            ..Overrides::default()
        };
        let config = file.sync_config(&overrides);
        assert_eq!(config.endpoints.manifest, "10.0.0.2:1");
        assert_eq!(config.save_root, Some(PathBuf::from("/from/flag")));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bad.json");
        fs::write(&path, r#"{ "endpoint": {} }"#).unwrap();

        assert!(matches!(
            FileConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn server_config_from_endpoints() {
        let file = FileConfig::default();
        let config = file
            .server_config(&Overrides::default(), Some(PathBuf::from("/srv")))
            .unwrap();
        assert_eq!(config.manifest_addr.port(), 9998);
        assert_eq!(config.storage, Some(PathBuf::from("/srv")));

        let overrides = Overrides {
            upload_addr: Some("not an address".into()),
            ..Overrides::default()
        };
        assert!(matches!(
            file.server_config(&overrides, None),
            Err(ConfigError::InvalidAddress(_))
        ));
    }
}
