use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use image::{DynamicImage, GenericImageView};

use crate::image_loader;

/// Metadata for a remote photo, decoded from the listing response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoDescriptor {
    pub id: String,
    pub description: Option<String>,
    pub full_url: String,
}

/// Where an acquired image came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provenance {
    Local { path: PathBuf },
    Remote { id: String, url: String },
}

impl Provenance {
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local { .. })
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote { .. })
    }

    /// Stable string identifying the underlying photo.
    pub fn key(&self) -> String {
        match self {
            Self::Local { path } => format!("local:{}", path.display()),
            Self::Remote { url, .. } => format!("remote:{}", url),
        }
    }
}

/// A decoded photo ready for display.
///
/// The pixel data is shared, so cloning is cheap and snapshots of the
/// acquisition state do not copy bitmaps.
#[derive(Clone)]
pub struct AcquiredImage {
    image: Arc<DynamicImage>,
    provenance: Provenance,
    placeholder: bool,
}

impl AcquiredImage {
    pub fn local(path: PathBuf, image: DynamicImage) -> Self {
        Self {
            image: Arc::new(image),
            provenance: Provenance::Local { path },
            placeholder: false,
        }
    }

    pub fn remote(descriptor: &PhotoDescriptor, image: DynamicImage) -> Self {
        Self {
            image: Arc::new(image),
            provenance: Provenance::Remote {
                id: descriptor.id.clone(),
                url: descriptor.full_url.clone(),
            },
            placeholder: false,
        }
    }

    /// An empty image occupying the slot of a photo that failed to load.
    pub fn placeholder(provenance: Provenance) -> Self {
        Self {
            image: Arc::new(image_loader::placeholder()),
            provenance,
            placeholder: true,
        }
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    pub fn is_placeholder(&self) -> bool {
        self.placeholder
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

impl fmt::Debug for AcquiredImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AcquiredImage")
            .field("provenance", &self.provenance)
            .field("dimensions", &self.dimensions())
            .field("placeholder", &self.placeholder)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> PhotoDescriptor {
        PhotoDescriptor {
            id: "abc".into(),
            description: None,
            full_url: "https://images.example/abc.jpg".into(),
        }
    }

    #[test]
    fn test_remote_provenance() {
        let img = AcquiredImage::remote(&descriptor(), DynamicImage::new_rgb8(3, 2));
        assert!(img.provenance().is_remote());
        assert!(!img.is_placeholder());
        assert_eq!(img.dimensions(), (3, 2));
        assert_eq!(img.provenance().key(), "remote:https://images.example/abc.jpg");
    }

    #[test]
    fn test_placeholder_is_flagged() {
        let img = AcquiredImage::placeholder(Provenance::Remote {
            id: "abc".into(),
            url: "https://images.example/abc.jpg".into(),
        });
        assert!(img.is_placeholder());
        assert_eq!(img.dimensions(), (1, 1));
    }

    #[test]
    fn test_clone_shares_pixels() {
        let img = AcquiredImage::local("/photos/a.png".into(), DynamicImage::new_rgb8(2, 2));
        let copy = img.clone();
        assert!(Arc::ptr_eq(&img.image, &copy.image));
        assert!(copy.provenance().is_local());
    }
}
