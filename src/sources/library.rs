//! Local photo library.
//!
//! `PhotoLibrary` is the collaborator the local source samples from.
//! `DirectoryLibrary` implements it over a directory tree:
//! - Recursive discovery using walkdir, filtered by image extension
//! - Assets ordered by creation time (modification time where the
//!   filesystem does not record creation), oldest first
//! - Access is granted once the directory has been read successfully, and
//!   denied only when the OS refuses permission. A missing directory stays
//!   undetermined.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use image::DynamicImage;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::task;
use tracing::{debug, info, trace, warn};
use walkdir::WalkDir;

use crate::error::LibraryError;
use crate::image_loader;
use crate::models::AccessStatus;

/// A photo in the library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub path: PathBuf,
    /// Creation time in seconds since the epoch.
    pub created: i64,
    pub size: u64,
}

#[async_trait]
pub trait PhotoLibrary: Send + Sync {
    /// Current access state, without prompting.
    fn authorization_status(&self) -> AccessStatus;

    /// Ask for access and remember the answer.
    async fn request_authorization(&self) -> AccessStatus;

    /// All image assets, oldest first.
    async fn list_assets(&self) -> Result<Vec<Asset>, LibraryError>;

    /// Load an asset's pixels. `max_size` bounds the longer side (`None` for
    /// full resolution); `allow_network` permits fetching assets whose bytes
    /// are not stored locally.
    async fn load_image(
        &self,
        asset: &Asset,
        max_size: Option<u32>,
        allow_network: bool,
    ) -> Result<DynamicImage, LibraryError>;
}

/// Configuration for directory discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Whether to scan directories recursively.
    pub recursive: bool,
    /// Maximum directory depth (0 = unlimited).
    pub max_depth: usize,
    /// Whether to follow symbolic links.
    pub follow_symlinks: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            recursive: true,
            max_depth: 0, // unlimited
            follow_symlinks: false,
        }
    }
}

/// A photo library backed by a directory of image files.
pub struct DirectoryLibrary {
    root: PathBuf,
    config: ScanConfig,
    status: RwLock<AccessStatus>,
}

impl DirectoryLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_config(root, ScanConfig::default())
    }

    pub fn with_config(root: impl Into<PathBuf>, config: ScanConfig) -> Self {
        Self {
            root: root.into(),
            config,
            status: RwLock::new(AccessStatus::NotDetermined),
        }
    }

    fn probe_access(root: &Path) -> AccessStatus {
        match std::fs::read_dir(root) {
            Ok(_) => AccessStatus::Authorized,
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                warn!(?root, "Photo library access denied");
                AccessStatus::Denied
            }
            Err(e) => {
                warn!(?root, error = %e, "Photo library unavailable");
                AccessStatus::NotDetermined
            }
        }
    }

    /// Discovers all image files under `dir`, oldest first.
    fn discover_assets(dir: &Path, config: &ScanConfig) -> Result<Vec<Asset>, LibraryError> {
        // Surface an unreadable root instead of silently reporting an empty library.
        std::fs::read_dir(dir)?;

        let mut walker = WalkDir::new(dir).follow_links(config.follow_symlinks);

        if !config.recursive {
            walker = walker.max_depth(1);
        } else if config.max_depth > 0 {
            walker = walker.max_depth(config.max_depth);
        }

        let mut assets = Vec::new();

        for entry in walker.into_iter().filter_map(|e| e.ok()) {
            if entry.file_type().is_dir() {
                continue;
            }

            let path = entry.path();
            let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
            if !image_loader::is_image_extension(ext) {
                continue;
            }

            let metadata = match entry.metadata() {
                Ok(m) => m,
                Err(e) => {
                    warn!("Failed to read metadata for {:?}: {}", path, e);
                    continue;
                }
            };

            let created = metadata
                .created()
                .or_else(|_| metadata.modified())
                .ok()
                .map(epoch_secs)
                .unwrap_or(0);

            assets.push(Asset {
                path: path.to_path_buf(),
                created,
                size: metadata.len(),
            });
        }

        // Creation date ascending; path breaks ties for a stable order.
        assets.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.path.cmp(&b.path)));

        Ok(assets)
    }
}

fn epoch_secs(time: SystemTime) -> i64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[async_trait]
impl PhotoLibrary for DirectoryLibrary {
    fn authorization_status(&self) -> AccessStatus {
        *self.status.read()
    }

    async fn request_authorization(&self) -> AccessStatus {
        let root = self.root.clone();
        let status = task::spawn_blocking(move || Self::probe_access(&root))
            .await
            .unwrap_or(AccessStatus::Denied);
        *self.status.write() = status;
        debug!(root = ?self.root, ?status, "Photo library authorization");
        status
    }

    async fn list_assets(&self) -> Result<Vec<Asset>, LibraryError> {
        if self.authorization_status() == AccessStatus::Denied {
            return Err(LibraryError::AccessDenied(self.root.clone()));
        }

        let root = self.root.clone();
        let config = self.config;
        let assets = task::spawn_blocking(move || Self::discover_assets(&root, &config))
            .await
            .map_err(|e| LibraryError::Load {
                path: self.root.clone(),
                reason: format!("scan task failed: {}", e),
            })??;

        info!("Discovered {} photos in {:?}", assets.len(), self.root);
        Ok(assets)
    }

    async fn load_image(
        &self,
        asset: &Asset,
        max_size: Option<u32>,
        allow_network: bool,
    ) -> Result<DynamicImage, LibraryError> {
        // Files on disk are always local; the flag only matters for
        // libraries with remotely stored originals.
        trace!(path = ?asset.path, ?max_size, allow_network, "Loading local photo");

        let path = asset.path.clone();
        let loaded = task::spawn_blocking(move || {
            image_loader::open_image(&path).map(|img| match max_size {
                Some(max) => image_loader::fit_within(img, max),
                None => img,
            })
        })
        .await;

        match loaded {
            Ok(Ok(img)) => Ok(img),
            Ok(Err(e)) => Err(LibraryError::Load {
                path: asset.path.clone(),
                reason: format!("{:#}", e),
            }),
            Err(e) => Err(LibraryError::Load {
                path: asset.path.clone(),
                reason: format!("load task failed: {}", e),
            }),
        }
    }
}
