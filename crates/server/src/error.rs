use std::path::PathBuf;
use thiserror::Error;

/// Errors generated by the signaling relay server.
#[derive(Debug, Error)]
pub enum Error {
    /// Error generated when a config file path is not a file.
    #[error("path {0} is not a file")]
    NotFile(PathBuf),

    /// Error generated when a config file path has no parent
    /// directory.
    #[error("could not determine parent directory")]
    NoParentDir,

    /// Error generated when the configuration declares no
    /// applications.
    #[error("config must declare at least one app")]
    NoApps,

    /// Error generated when an application path does not begin with
    /// a slash.
    #[error(r#"app path "{0}" must begin with a slash"#)]
    InvalidAppPath(String),

    /// Error generated when two applications share a path.
    #[error(r#"app path "{0}" is declared more than once"#)]
    DuplicateAppPath(String),

    /// Error generated by the wire protocol.
    #[error(transparent)]
    Protocol(#[from] switchboard_protocol::Error),

    /// Error generated by input/output.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Error generated parsing TOML.
    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    /// Error generated converting a CORS origin to a header value.
    #[error(transparent)]
    InvalidHeaderValue(
        #[from] axum::http::header::InvalidHeaderValue,
    ),
}
