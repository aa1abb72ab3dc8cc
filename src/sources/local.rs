//! Random samples from the local photo library.
//!
//! Indices are drawn with replacement, so the same photo can appear more
//! than once in a cycle. Loads run concurrently and each photo is sent on
//! as soon as it is decoded, in completion order.

use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use image::DynamicImage;
use rand::rngs::StdRng;
use rand::Rng;
use tracing::{debug, info, warn};

use super::library::{Asset, PhotoLibrary};
use super::{FailurePolicy, SampleBound};
use crate::error::LibraryError;
use crate::models::{AcquiredImage, Provenance};

/// Libraries smaller than this are not sampled at all.
pub const DEFAULT_MIN_LIBRARY_SIZE: usize = 10;

/// Outcome of one local fetch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LocalFetchReport {
    pub requested: usize,
    pub delivered: usize,
    pub failed: usize,
    /// Set when nothing was sampled (no access, or library below the floor).
    pub skipped: bool,
}

pub struct LocalPhotoSource {
    library: Arc<dyn PhotoLibrary>,
    min_library_size: usize,
    sample_bound: SampleBound,
    failure_policy: FailurePolicy,
    max_size: Option<u32>,
}

impl LocalPhotoSource {
    pub fn new(library: Arc<dyn PhotoLibrary>) -> Self {
        Self {
            library,
            min_library_size: DEFAULT_MIN_LIBRARY_SIZE,
            sample_bound: SampleBound::HalfOpen,
            failure_policy: FailurePolicy::Omit,
            max_size: None,
        }
    }

    pub fn with_min_library_size(mut self, min: usize) -> Self {
        self.min_library_size = min;
        self
    }

    pub fn with_sample_bound(mut self, bound: SampleBound) -> Self {
        self.sample_bound = bound;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Bound the longer side of loaded photos. `None` loads full resolution.
    pub fn with_max_size(mut self, max_size: Option<u32>) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn library(&self) -> &Arc<dyn PhotoLibrary> {
        &self.library
    }

    /// Draw `count` indices for a library of `len` assets, with replacement.
    pub fn sample_indices<R: Rng + ?Sized>(&self, count: usize, len: usize, rng: &mut R) -> Vec<usize> {
        match self.sample_bound.max_index(len) {
            Some(max) => (0..count).map(|_| rng.gen_range(0..=max)).collect(),
            None => Vec::new(),
        }
    }

    /// Sample `count` photos and send each one to `sink` as it loads.
    ///
    /// Returns once every sampled photo has either been sent or failed.
    pub async fn fetch<T>(&self, count: usize, mut rng: StdRng, sink: &flume::Sender<T>) -> LocalFetchReport
    where
        T: From<AcquiredImage> + Send,
    {
        let mut report = LocalFetchReport {
            requested: count,
            ..Default::default()
        };

        if count == 0 {
            report.skipped = true;
            return report;
        }

        let status = self.library.authorization_status();
        if !status.grants_access() {
            warn!(?status, "Photo library not authorized, skipping local photos");
            report.skipped = true;
            return report;
        }

        let assets = match self.library.list_assets().await {
            Ok(assets) => assets,
            Err(e) => {
                warn!(error = %e, "Failed to list photo library, skipping local photos");
                report.skipped = true;
                return report;
            }
        };

        if assets.len() < self.min_library_size {
            info!(
                library_size = assets.len(),
                min = self.min_library_size,
                "Photo library too small to sample"
            );
            report.skipped = true;
            return report;
        }

        let indices = self.sample_indices(count, assets.len(), &mut rng);
        debug!(?indices, "Sampling local photos");

        let assets = &assets;
        let mut pending: FuturesUnordered<_> = indices
            .into_iter()
            .map(|index| async move { (index, self.load(assets, index).await) })
            .collect();

        while let Some((index, result)) = pending.next().await {
            let image = match result {
                Ok((path, img)) => AcquiredImage::local(path, img),
                Err(e) => {
                    warn!(index, error = %e, "Local photo failed to load");
                    report.failed += 1;
                    match self.failure_policy {
                        FailurePolicy::Omit => continue,
                        FailurePolicy::Placeholder => AcquiredImage::placeholder(Provenance::Local {
                            path: assets.get(index).map(|a| a.path.clone()).unwrap_or_default(),
                        }),
                    }
                }
            };

            if sink.send_async(T::from(image)).await.is_err() {
                debug!("Local photo receiver dropped, stopping");
                break;
            }
            report.delivered += 1;
        }

        report
    }

    async fn load(
        &self,
        assets: &[Asset],
        index: usize,
    ) -> Result<(std::path::PathBuf, DynamicImage), LibraryError> {
        let asset = assets.get(index).ok_or(LibraryError::OutOfRange {
            index,
            len: assets.len(),
        })?;
        let img = self.library.load_image(asset, self.max_size, true).await?;
        Ok((asset.path.clone(), img))
    }
}
