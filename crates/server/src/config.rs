//! Server configuration.
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use url::Url;

use crate::{Error, Result};

/// Configuration for the signaling relay.
#[derive(Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ServerConfig {
    /// Applications served by this process; one address namespace
    /// each.
    pub apps: Vec<AppConfig>,

    /// Maximum size in bytes of a single websocket message.
    ///
    /// Default is 1 MiB.
    pub max_payload: usize,

    /// Listen endpoint as `host:port`.
    ///
    /// A bind address given on the command line takes precedence,
    /// and a `PORT` environment variable supersedes both.
    pub bind: Option<String>,

    /// Configuration for TLS encryption.
    pub tls: Option<TlsConfig>,

    /// Configuration for CORS.
    pub cors: CorsConfig,

    /// Token required to register user tokens.
    ///
    /// When set, websocket clients must present a registered
    /// `userToken` query parameter; when unset all sockets are
    /// admitted.
    pub admin_token: Option<String>,

    /// Log at debug level by default.
    pub verbose: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            apps: Vec::new(),
            max_payload: 1024 * 1024,
            bind: None,
            tls: None,
            cors: Default::default(),
            admin_token: None,
            verbose: false,
        }
    }
}

/// A single application namespace.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AppConfig {
    /// Logical name, used in logs.
    pub name: String,

    /// URL path websocket clients connect to, for example
    /// `/callapp`.
    pub path: String,

    /// Allow several peers to listen on the same address and
    /// auto-connect them to each other.
    #[serde(default)]
    pub address_sharing: bool,
}

/// Certificate and key for TLS.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct TlsConfig {
    /// Path to the certificate.
    pub cert: PathBuf,
    /// Path to the certificate key file.
    pub key: PathBuf,
}

/// Configuration for CORS.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CorsConfig {
    /// List of additional CORS origins for the server.
    pub origins: Vec<Url>,
}

impl ServerConfig {
    /// Load a server config from a file path.
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        if !fs::try_exists(path.as_ref()).await? {
            return Err(Error::NotFile(path.as_ref().to_path_buf()));
        }

        let contents = fs::read_to_string(path.as_ref()).await?;
        let mut config: ServerConfig = toml::from_str(&contents)?;
        config.validate()?;

        let dir = Self::directory(path.as_ref())?;
        if let Some(tls) = config.tls.as_mut() {
            if tls.cert.is_relative() {
                tls.cert = dir.join(&tls.cert).canonicalize()?;
            }
            if tls.key.is_relative() {
                tls.key = dir.join(&tls.key).canonicalize()?;
            }
        }

        Ok(config)
    }

    /// Check the application table.
    pub fn validate(&self) -> Result<()> {
        if self.apps.is_empty() {
            return Err(Error::NoApps);
        }
        let mut paths = std::collections::HashSet::new();
        for app in &self.apps {
            if !app.path.starts_with('/') {
                return Err(Error::InvalidAppPath(
                    app.path.clone(),
                ));
            }
            if !paths.insert(app.path.as_str()) {
                return Err(Error::DuplicateAppPath(
                    app.path.clone(),
                ));
            }
        }
        Ok(())
    }

    /// Parent directory of the configuration file.
    fn directory(file: impl AsRef<Path>) -> Result<PathBuf> {
        file.as_ref()
            .parent()
            .map(|p| p.to_path_buf())
            .ok_or(Error::NoParentDir)
    }
}
