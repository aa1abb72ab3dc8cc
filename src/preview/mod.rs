//! Display-side helpers for the selected photo.
//!
//! - `ImageCache` - bounded LRU cache of rendered images
//! - `PreviewRenderer` - scales the current photo and writes it as JPEG

pub mod cache;
pub mod renderer;

pub use cache::{CacheKey, ImageCache};
pub use renderer::{PreviewRenderer, DEFAULT_PREVIEW_HEIGHT};
