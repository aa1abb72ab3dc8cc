//! Typed errors for the acquisition core.
//!
//! All of these are recovered somewhere below the coordinator except
//! `AcquireError`, which is what callers of `fetch` see.

use std::path::PathBuf;

use thiserror::Error;

/// Failure of a single HTTP exchange.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Network request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Request to {url} failed: {reason}")]
    Unreachable { url: String, reason: String },
}

/// Failure while listing or downloading remote photos.
#[derive(Error, Debug)]
pub enum RemoteError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("Invalid endpoint URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("Server returned an unexpected status code: {0}")]
    Status(u16),
    #[error("Failed to decode photo listing: {0}")]
    Listing(#[from] serde_json::Error),
    #[error("Failed to decode downloaded image: {0}")]
    Image(String),
}

/// Failure reported by a photo library.
#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("Photo library access denied: {0:?}")]
    AccessDenied(PathBuf),
    #[error("Asset index {index} is out of range for a library of {len} assets")]
    OutOfRange { index: usize, len: usize },
    #[error("Failed to read photo library: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to load {path:?}: {reason}")]
    Load { path: PathBuf, reason: String },
}

/// Errors returned to callers of the acquisition coordinator.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AcquireError {
    #[error("An acquisition cycle is already in flight")]
    CycleInFlight,
    #[error("Invalid acquisition request: {0}")]
    InvalidRequest(String),
    #[error("Acquisition cycle aborted: {0}")]
    Aborted(String),
}

/// Errors while loading the application configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
