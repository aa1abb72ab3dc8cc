//! Photo sources feeding the acquisition coordinator.
//!
//! - `RemotePhotoSource` - random photos from the Unsplash API
//! - `LocalPhotoSource` - random samples from a `PhotoLibrary`
//! - `DirectoryLibrary` - a `PhotoLibrary` over a directory of image files
//! - `HttpTransport` - the network seam used by the remote source

pub mod library;
pub mod local;
pub mod remote;
pub mod transport;

use serde::{Deserialize, Serialize};

pub use library::{Asset, DirectoryLibrary, PhotoLibrary, ScanConfig};
pub use local::{LocalFetchReport, LocalPhotoSource};
pub use remote::RemotePhotoSource;
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};

/// What a source does with a photo it could not load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Drop the slot; the cycle ends with fewer photos.
    Omit,
    /// Keep the slot and fill it with an empty image.
    Placeholder,
}

/// Range used when sampling asset indices from a library of `len` assets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SampleBound {
    /// `0..len`
    #[default]
    HalfOpen,
    /// `0..=len`; an index of `len` is out of range and fails to load.
    Inclusive,
}

impl SampleBound {
    /// Upper bound (inclusive) of the sampled index range, or `None` when
    /// there is nothing to sample.
    pub fn max_index(&self, len: usize) -> Option<usize> {
        match self {
            Self::HalfOpen => len.checked_sub(1),
            Self::Inclusive => Some(len),
        }
    }
}
