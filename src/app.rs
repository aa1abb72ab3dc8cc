use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use directories::UserDirs;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::acquisition::{AcquisitionEvent, CycleSummary, PhotoAcquisitionCoordinator};
use crate::config::AppConfig;
use crate::models::{AccessStatus, AcquiredImage, AcquisitionRequest, Provenance};
use crate::preview::{ImageCache, PreviewRenderer};
use crate::sources::{
    DirectoryLibrary, HttpTransport, LocalPhotoSource, PhotoLibrary, RemotePhotoSource,
    ReqwestTransport,
};
use crate::wheel::{Point, Wheel};

/// What one invocation should do after acquiring photos.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Explicit `(total, local)` split instead of a random one.
    pub split: Option<(usize, usize)>,
    /// Number of random spins; the last one picks the photo.
    pub spins: usize,
    /// Select by pointer position (relative to the wheel center) instead of spinning.
    pub drag: Option<Point>,
    /// Where to write a JPEG preview of the selected photo.
    pub output: Option<PathBuf>,
}

/// Result of a run, mostly for tests.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub summary: CycleSummary,
    pub selected: Option<usize>,
}

pub struct PhotoWheelApp {
    config: AppConfig,
    coordinator: PhotoAcquisitionCoordinator,
    renderer: PreviewRenderer,
    wheel: Wheel,
    rng: StdRng,
}

impl PhotoWheelApp {
    /// Build the app against the configured library directory and the live API.
    pub fn new(config: AppConfig, seed: Option<u64>) -> Result<Self> {
        let library_dir = match config.library_dir.clone() {
            Some(dir) => dir,
            None => UserDirs::new()
                .and_then(|dirs| dirs.picture_dir().map(|p| p.to_path_buf()))
                .context("No photo library directory configured; pass --library")?,
        };
        info!(?library_dir, scan = ?config.library_scan, "Using photo library");

        let library: Arc<dyn PhotoLibrary> =
            Arc::new(DirectoryLibrary::with_config(library_dir, config.library_scan));
        let transport: Arc<dyn HttpTransport> = Arc::new(
            ReqwestTransport::new(config.request_timeout()).context("Failed to build HTTP client")?,
        );
        Self::with_parts(config, library, transport, seed)
    }

    pub fn with_parts(
        config: AppConfig,
        library: Arc<dyn PhotoLibrary>,
        transport: Arc<dyn HttpTransport>,
        seed: Option<u64>,
    ) -> Result<Self> {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let local = LocalPhotoSource::new(library)
            .with_min_library_size(config.min_library_size)
            .with_sample_bound(config.sample_bound)
            .with_failure_policy(config.local_failure_policy)
            .with_max_size(config.local_max_size);

        let remote = RemotePhotoSource::new(
            transport,
            &config.unsplash_base_url,
            config.access_key.clone(),
        )
        .context("Invalid Unsplash endpoint")?
        .with_failure_policy(config.remote_failure_policy);

        let coordinator =
            PhotoAcquisitionCoordinator::with_rng(local, remote, StdRng::seed_from_u64(rng.gen()))
                .with_count_range(config.total_range);

        let renderer = PreviewRenderer::new(
            config.preview_height,
            ImageCache::new(config.cache_capacity, config.cache_max_bytes),
        );

        Ok(Self {
            config,
            coordinator,
            renderer,
            wheel: Wheel::new(),
            rng,
        })
    }

    pub fn coordinator(&self) -> &PhotoAcquisitionCoordinator {
        &self.coordinator
    }

    pub async fn run(&mut self, options: RunOptions) -> Result<RunOutcome> {
        match self.coordinator.request_access().await {
            AccessStatus::Denied => println!(
                "Photo library access denied. Grant read access to the library directory \
                 (or choose another with --library) to include your own photos."
            ),
            AccessStatus::NotDetermined => println!(
                "Photo library not found or unreadable. Choose one with --library \
                 to include your own photos."
            ),
            AccessStatus::Authorized | AccessStatus::Limited => {}
        }

        let summary = self.acquire(options.split).await?;
        println!(
            "Fetched {} photos: {} from the library, {} from Unsplash ({} unavailable)",
            summary.photos, summary.local_delivered, summary.remote_delivered, summary.placeholders
        );

        let photos = self.coordinator.photos();
        if photos.is_empty() {
            println!("No photos to spin.");
            return Ok(RunOutcome {
                summary,
                selected: None,
            });
        }

        match options.drag {
            Some(pointer) => {
                let angle = self.wheel.drag(pointer, Point::new(0.0, 0.0));
                self.print_selection("Drag", angle, &photos);
            }
            None => {
                for spin in 1..=options.spins.max(1) {
                    let angle = self.wheel.spin(&mut self.rng);
                    self.print_selection(&format!("Spin {}", spin), angle, &photos);
                }
            }
        }

        let selected = self.wheel.index(photos.len());
        if let (Some(output), Some(photo)) = (&options.output, self.wheel.select(&photos)) {
            let (width, height) = self.renderer.save(photo, output)?;
            println!("Saved {}x{} preview to {}", width, height, output.display());
        }

        Ok(RunOutcome { summary, selected })
    }

    /// Run one acquisition cycle, printing progress as it arrives.
    async fn acquire(&self, split: Option<(usize, usize)>) -> Result<CycleSummary> {
        let request = match split {
            Some((total, local)) => Some(AcquisitionRequest::new(total, local, &self.config.total_range)?),
            None => None,
        };

        // Subscribe first so the Started event is not missed.
        let events = self.coordinator.events();
        let handle = match request {
            Some(request) => self.coordinator.fetch_with(request)?,
            None => self.coordinator.fetch()?,
        };

        let total = handle.request.total_count();
        let mut wait = Box::pin(handle.wait());

        let summary = loop {
            tokio::select! {
                summary = &mut wait => break summary?,
                Ok(event) = events.recv_async() => report(&event, total),
            }
        };

        // Whatever is left belongs to the finished cycle.
        let stale = events.drain().count();
        debug!(stale, "Discarded trailing acquisition events");
        Ok(summary)
    }

    fn print_selection(&self, label: &str, angle: f64, photos: &[AcquiredImage]) {
        if let (Some(index), Some(photo)) = (self.wheel.index(photos.len()), self.wheel.select(photos)) {
            println!("{}: {:.1}° -> photo {} ({})", label, angle, index + 1, describe(photo));
        }
    }
}

fn report(event: &AcquisitionEvent, total: usize) {
    match event {
        AcquisitionEvent::Started { request, .. } => println!(
            "Fetching {} photos ({} local, {} remote)...",
            request.total_count(),
            request.local_count(),
            request.remote_count()
        ),
        AcquisitionEvent::LocalImage { progress, .. } => println!("  [{}/{}] library photo", progress, total),
        AcquisitionEvent::RemoteBatch {
            count, progress, ..
        } => println!("  [{}/{}] {} Unsplash photos", progress, total, count),
        _ => {}
    }
}

fn describe(photo: &AcquiredImage) -> String {
    let source = match photo.provenance() {
        Provenance::Local { path } => format!("library: {}", path.display()),
        Provenance::Remote { id, .. } => format!("unsplash: {}", id),
    };
    if photo.is_placeholder() {
        format!("{}, unavailable", source)
    } else {
        let (width, height) = photo.dimensions();
        format!("{}, {}x{}", source, width, height)
    }
}
