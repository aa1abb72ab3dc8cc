//! Random photos from the Unsplash API.
//!
//! One listing request returns `count` descriptors; every descriptor's full
//! size image is then downloaded concurrently and the whole batch is handed
//! back at once, in listing order. Every failure is absorbed here: a failed
//! listing yields an empty batch and a failed download yields a placeholder
//! (or nothing, under `FailurePolicy::Omit`).

use std::sync::Arc;

use futures::future::join_all;
use image::DynamicImage;
use serde::Deserialize;
use tracing::{debug, info, trace, warn};
use url::Url;

use super::transport::{HttpRequest, HttpTransport};
use super::FailurePolicy;
use crate::error::RemoteError;
use crate::image_loader;
use crate::models::{AcquiredImage, PhotoDescriptor, Provenance};

pub const DEFAULT_BASE_URL: &str = "https://api.unsplash.com/";

const RANDOM_PHOTOS_PATH: &str = "photos/random";

const ACCEPT_VERSION: &str = "v1";

/// One entry of the listing response.
#[derive(Debug, Deserialize)]
struct ListingEntry {
    id: String,
    description: Option<String>,
    urls: ListingUrls,
}

#[derive(Debug, Deserialize)]
struct ListingUrls {
    full: String,
}

impl From<ListingEntry> for PhotoDescriptor {
    fn from(entry: ListingEntry) -> Self {
        Self {
            id: entry.id,
            description: entry.description,
            full_url: entry.urls.full,
        }
    }
}

pub struct RemotePhotoSource {
    transport: Arc<dyn HttpTransport>,
    base_url: Url,
    access_key: String,
    failure_policy: FailurePolicy,
}

impl RemotePhotoSource {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        base_url: &str,
        access_key: impl Into<String>,
    ) -> Result<Self, RemoteError> {
        // `Url::join` replaces the last segment unless the base ends in '/'.
        let base_url = if base_url.ends_with('/') {
            Url::parse(base_url)?
        } else {
            Url::parse(&format!("{}/", base_url))?
        };

        Ok(Self {
            transport,
            base_url,
            access_key: access_key.into(),
            failure_policy: FailurePolicy::Placeholder,
        })
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// URL of the random-photo listing for `count` photos.
    pub fn listing_url(&self, count: usize) -> Result<Url, RemoteError> {
        let mut url = self.base_url.join(RANDOM_PHOTOS_PATH)?;
        url.query_pairs_mut()
            .append_pair("count", &count.to_string())
            .append_pair("client_id", &self.access_key);
        Ok(url)
    }

    /// Fetch `count` random photos. Never fails; see the module docs.
    pub async fn fetch(&self, count: usize) -> Vec<AcquiredImage> {
        if count == 0 {
            debug!("No remote photos requested");
            return Vec::new();
        }

        let descriptors = self.list_descriptors(count).await;
        let requested = descriptors.len();

        let downloads = descriptors.iter().map(|d| self.download(d));
        let batch: Vec<AcquiredImage> = join_all(downloads).await.into_iter().flatten().collect();

        let placeholders = batch.iter().filter(|img| img.is_placeholder()).count();
        info!(
            requested,
            delivered = batch.len(),
            placeholders,
            "Remote batch complete"
        );
        batch
    }

    /// List up to `count` descriptors, or none if the listing fails.
    pub async fn list_descriptors(&self, count: usize) -> Vec<PhotoDescriptor> {
        match self.try_list_descriptors(count).await {
            Ok(mut descriptors) => {
                if descriptors.len() > count {
                    debug!(
                        returned = descriptors.len(),
                        count, "Listing returned extra photos, truncating"
                    );
                    descriptors.truncate(count);
                }
                descriptors
            }
            Err(e) => {
                warn!(error = %e, "Remote listing failed, continuing without remote photos");
                Vec::new()
            }
        }
    }

    async fn try_list_descriptors(&self, count: usize) -> Result<Vec<PhotoDescriptor>, RemoteError> {
        let request = HttpRequest::get(self.listing_url(count)?)
            .with_header("Accept-Version", ACCEPT_VERSION)
            .bypass_cache();

        let response = self.transport.get(request).await?;
        if response.status != 200 {
            return Err(RemoteError::Status(response.status));
        }

        let entries: Vec<ListingEntry> = serde_json::from_slice(&response.body)?;
        Ok(entries.into_iter().map(PhotoDescriptor::from).collect())
    }

    /// Download one photo, applying the failure policy on error.
    async fn download(&self, descriptor: &PhotoDescriptor) -> Option<AcquiredImage> {
        match self.try_download(descriptor).await {
            Ok(image) => Some(AcquiredImage::remote(descriptor, image)),
            Err(e) => {
                warn!(id = %descriptor.id, error = %e, "Remote photo download failed");
                match self.failure_policy {
                    FailurePolicy::Placeholder => Some(AcquiredImage::placeholder(Provenance::Remote {
                        id: descriptor.id.clone(),
                        url: descriptor.full_url.clone(),
                    })),
                    FailurePolicy::Omit => None,
                }
            }
        }
    }

    async fn try_download(&self, descriptor: &PhotoDescriptor) -> Result<DynamicImage, RemoteError> {
        trace!(id = %descriptor.id, url = %descriptor.full_url, "Downloading remote photo");
        let url = Url::parse(&descriptor.full_url)?;
        let response = self.transport.get(HttpRequest::get(url)).await?;
        if !(200..300).contains(&response.status) {
            return Err(RemoteError::Status(response.status));
        }

        tokio::task::spawn_blocking(move || image_loader::decode_image(&response.body))
            .await
            .map_err(|e| RemoteError::Image(format!("decode task failed: {}", e)))?
            .map_err(|e| RemoteError::Image(format!("{:#}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_loader::test_support::png_bytes;
    use crate::sources::transport::testing::FakeTransport;

    const LISTING: &str = "https://api.unsplash.com/photos/random";

    fn listing_json(ids: &[&str]) -> String {
        let entries: Vec<String> = ids
            .iter()
            .map(|id| {
                format!(
                    r#"{{"id":"{id}","description":null,"urls":{{"full":"https://images.example/{id}.png","raw":"x"}},"likes":3}}"#
                )
            })
            .collect();
        format!("[{}]", entries.join(","))
    }

    fn image_url(id: &str) -> String {
        format!("https://images.example/{}.png", id)
    }

    fn source(transport: Arc<FakeTransport>) -> RemotePhotoSource {
        RemotePhotoSource::new(transport, DEFAULT_BASE_URL, "test-key").unwrap()
    }

    #[test]
    fn test_listing_url() {
        let src = source(Arc::new(FakeTransport::new()));
        let url = src.listing_url(7).unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.unsplash.com/photos/random?count=7&client_id=test-key"
        );

        let custom = RemotePhotoSource::new(
            Arc::new(FakeTransport::new()),
            "http://localhost:9000/api",
            "k",
        )
        .unwrap();
        assert_eq!(
            custom.listing_url(1).unwrap().as_str(),
            "http://localhost:9000/api/photos/random?count=1&client_id=k"
        );
    }

    #[tokio::test]
    async fn test_fetch_all_succeed_in_listing_order() {
        let ids = ["a", "b", "c"];
        let mut transport = FakeTransport::new().route(LISTING, 200, listing_json(&ids));
        for (i, id) in ids.iter().enumerate() {
            transport = transport.route(&image_url(id), 200, png_bytes(i as u32 + 1, 1));
        }
        let transport = Arc::new(transport);

        let batch = source(Arc::clone(&transport)).fetch(3).await;

        assert_eq!(batch.len(), 3);
        for (i, img) in batch.iter().enumerate() {
            assert!(!img.is_placeholder());
            assert_eq!(img.dimensions(), (i as u32 + 1, 1));
        }

        let requests = transport.requests();
        let listing = &requests[0];
        assert_eq!(listing.header("Accept-Version"), Some("v1"));
        assert!(listing.bypass_cache);
        let query: Vec<(String, String)> = listing.url.query_pairs().into_owned().collect();
        assert!(query.contains(&("count".into(), "3".into())));
        assert!(query.contains(&("client_id".into(), "test-key".into())));
    }

    #[tokio::test]
    async fn test_non_200_listing_yields_empty_batch() {
        let transport = Arc::new(FakeTransport::new().route(LISTING, 403, "Rate Limit Exceeded"));
        let batch = source(Arc::clone(&transport)).fetch(5).await;
        assert!(batch.is_empty());
        // No downloads attempted after a failed listing.
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_network_failure_yields_empty_batch() {
        let transport = Arc::new(FakeTransport::new());
        assert!(source(transport).fetch(5).await.is_empty());
    }

    #[tokio::test]
    async fn test_undecodable_listing_yields_empty_batch() {
        let transport = Arc::new(FakeTransport::new().route(LISTING, 200, r#"{"errors":["nope"]}"#));
        assert!(source(transport).fetch(2).await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_download_keeps_placeholder_slot() {
        let ids = ["a", "b", "c", "d"];
        let transport = FakeTransport::new()
            .route(LISTING, 200, listing_json(&ids))
            .route(&image_url("a"), 200, png_bytes(2, 2))
            // "b" is unreachable
            .route(&image_url("c"), 200, b"not an image".to_vec())
            .route(&image_url("d"), 500, Vec::<u8>::new());

        let batch = source(Arc::new(transport)).fetch(4).await;

        assert_eq!(batch.len(), 4);
        let placeholders: Vec<bool> = batch.iter().map(|img| img.is_placeholder()).collect();
        assert_eq!(placeholders, vec![false, true, true, true]);
        assert_eq!(
            batch[1].provenance(),
            &Provenance::Remote {
                id: "b".into(),
                url: image_url("b")
            }
        );
    }

    #[tokio::test]
    async fn test_omit_policy_drops_failed_downloads() {
        let transport = FakeTransport::new()
            .route(LISTING, 200, listing_json(&["a", "b"]))
            .route(&image_url("a"), 200, png_bytes(2, 2));

        let batch = source(Arc::new(transport))
            .with_failure_policy(FailurePolicy::Omit)
            .fetch(2)
            .await;

        assert_eq!(batch.len(), 1);
        assert!(!batch[0].is_placeholder());
    }

    #[tokio::test]
    async fn test_zero_count_skips_network() {
        let transport = Arc::new(FakeTransport::new().route(LISTING, 200, listing_json(&["a"])));
        assert!(source(Arc::clone(&transport)).fetch(0).await.is_empty());
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_oversized_listing_is_truncated() {
        let transport = Arc::new(FakeTransport::new().route(LISTING, 200, listing_json(&["a", "b", "c"])));
        let descriptors = source(transport).list_descriptors(2).await;
        assert_eq!(descriptors.len(), 2);
        assert_eq!(descriptors[0].id, "a");
        assert_eq!(descriptors[0].description, None);
        assert_eq!(descriptors[1].full_url, image_url("b"));
    }
}
