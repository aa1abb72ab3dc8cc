//! Preview rendering for the selected photo.
//!
//! Scales to a target height while preserving aspect ratio, then writes JPEG.
//! Rendered previews are memoized in an `ImageCache` keyed by provenance.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use tracing::debug;

use super::cache::{CacheKey, ImageCache};
use crate::models::AcquiredImage;

/// Default target height for previews in pixels.
pub const DEFAULT_PREVIEW_HEIGHT: u32 = 512;

/// Minimum width for previews (to handle extreme aspect ratios).
const MIN_PREVIEW_WIDTH: u32 = 64;

/// Maximum width for previews (to handle extreme panoramas).
const MAX_PREVIEW_WIDTH: u32 = 2048;

/// JPEG quality for preview encoding (0-100).
const JPEG_QUALITY: u8 = 85;

pub struct PreviewRenderer {
    target_height: u32,
    cache: ImageCache,
}

impl PreviewRenderer {
    pub fn new(target_height: u32, cache: ImageCache) -> Self {
        Self {
            target_height: target_height.max(1),
            cache,
        }
    }

    pub fn cache(&self) -> &ImageCache {
        &self.cache
    }

    /// The preview for `photo`, from cache when possible.
    pub fn preview(&self, photo: &AcquiredImage) -> Arc<DynamicImage> {
        let key = CacheKey::new(&photo.provenance().key());
        if let Some(cached) = self.cache.get(&key) {
            return cached.image;
        }

        let rendered = Arc::new(self.render(photo.image()));
        // Placeholders share a key per slot but carry no content worth keeping.
        if !photo.is_placeholder() {
            self.cache.insert(key, Arc::clone(&rendered));
        }
        rendered
    }

    /// Render and save a JPEG preview of `photo` to `dst`.
    pub fn save(&self, photo: &AcquiredImage, dst: &Path) -> Result<(u32, u32)> {
        let preview = self.preview(photo);

        if let Some(parent) = dst.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create preview directory: {:?}", parent))?;
        }

        save_jpeg(&preview, dst)?;
        Ok(preview.dimensions())
    }

    fn render(&self, img: &DynamicImage) -> DynamicImage {
        let (src_width, src_height) = img.dimensions();
        let (width, height) = calculate_dimensions(src_width, src_height, self.target_height);
        debug!(src_width, src_height, width, height, "Rendering preview");
        if (width, height) == (src_width, src_height) {
            return img.clone();
        }
        img.resize_exact(width, height, FilterType::CatmullRom)
    }
}

/// Calculate preview dimensions preserving aspect ratio.
///
/// Never upscales. Width is clamped to MIN_PREVIEW_WIDTH..MAX_PREVIEW_WIDTH
/// for extreme aspect ratios, with height following.
fn calculate_dimensions(src_width: u32, src_height: u32, target_height: u32) -> (u32, u32) {
    if src_height == 0 || src_width == 0 {
        return (1, 1);
    }

    let effective_height = target_height.min(src_height);
    if effective_height == src_height && src_width <= MAX_PREVIEW_WIDTH {
        return (src_width, src_height);
    }

    let aspect_ratio = src_width as f64 / src_height as f64;
    let calculated_width = (effective_height as f64 * aspect_ratio).round() as u32;
    let final_width = calculated_width.clamp(MIN_PREVIEW_WIDTH, MAX_PREVIEW_WIDTH).min(src_width);

    let final_height = if final_width != calculated_width {
        (final_width as f64 / aspect_ratio).round() as u32
    } else {
        effective_height
    };

    (final_width.max(1), final_height.max(1))
}

fn save_jpeg(img: &DynamicImage, dst: &Path) -> Result<()> {
    use image::codecs::jpeg::JpegEncoder;
    use std::fs::File;
    use std::io::BufWriter;

    let file =
        File::create(dst).with_context(|| format!("Failed to create preview file: {:?}", dst))?;
    let mut writer = BufWriter::new(file);

    // JPEG has no alpha channel.
    let rgb_img = img.to_rgb8();
    let encoder = JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY);
    rgb_img
        .write_with_encoder(encoder)
        .with_context(|| format!("Failed to encode preview: {:?}", dst))?;

    debug!(?dst, "Saved preview");
    Ok(())
}
