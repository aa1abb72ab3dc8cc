use std::io::Cursor;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::codecs::gif::GifDecoder;
use image::imageops::FilterType;
use image::AnimationDecoder;
use image::{DynamicImage, GenericImageView, ImageFormat};

/// Extensions the local library treats as photos.
pub fn is_image_extension(ext: &str) -> bool {
    matches!(
        ext.to_lowercase().as_str(),
        "jpg" | "jpeg" | "png" | "webp" | "gif" | "bmp" | "tiff" | "tif"
    )
}

pub fn open_image(path: &Path) -> Result<DynamicImage> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read image: {:?}", path))?;
    decode_image(&bytes).with_context(|| format!("Failed to decode image: {:?}", path))
}

/// Decode an in-memory image. Animated GIFs yield their first frame.
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage> {
    let format = image::guess_format(bytes).ok();

    if format == Some(ImageFormat::Gif) {
        let decoder = GifDecoder::new(Cursor::new(bytes)).context("Failed to decode GIF")?;
        let mut frames = decoder.into_frames();
        if let Some(frame) = frames.next() {
            let frame = frame.context("Failed to decode GIF frame")?;
            return Ok(DynamicImage::ImageRgba8(frame.into_buffer()));
        }
        return Err(anyhow!("GIF has no frames"));
    }

    match format {
        Some(fmt) => image::load_from_memory_with_format(bytes, fmt)
            .with_context(|| format!("Failed to decode {:?} image", fmt)),
        None => image::load_from_memory(bytes).context("Failed to decode image"),
    }
}

/// Shrink an image so neither side exceeds `max_size`, preserving aspect ratio.
/// Images already within bounds are returned untouched.
pub fn fit_within(image: DynamicImage, max_size: u32) -> DynamicImage {
    let (width, height) = image.dimensions();
    if width <= max_size && height <= max_size {
        return image;
    }
    image.resize(max_size, max_size, FilterType::CatmullRom)
}

/// Stand-in for a slot whose image could not be fetched.
pub fn placeholder() -> DynamicImage {
    DynamicImage::new_rgba8(1, 1)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Encode a solid image of the given size as PNG bytes.
    pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        DynamicImage::new_rgb8(width, height)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    pub fn write_png(path: &Path, width: u32, height: u32) {
        std::fs::write(path, png_bytes(width, height)).unwrap();
    }
}
