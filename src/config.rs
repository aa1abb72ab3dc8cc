//! Application configuration.
//!
//! Loaded from `config.toml` in the platform config directory (or an explicit
//! path), then overridden by `UNSPLASH_ACCESS_KEY`. Missing fields take their
//! defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ConfigError;
use crate::models::CountRange;
use crate::preview::cache::{DEFAULT_CAPACITY, DEFAULT_MAX_BYTES};
use crate::preview::DEFAULT_PREVIEW_HEIGHT;
use crate::sources::local::DEFAULT_MIN_LIBRARY_SIZE;
use crate::sources::remote::DEFAULT_BASE_URL;
use crate::sources::{FailurePolicy, SampleBound, ScanConfig};

/// Environment variable overriding `access_key`.
pub const ACCESS_KEY_ENV: &str = "UNSPLASH_ACCESS_KEY";

const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub unsplash_base_url: String,
    pub access_key: String,
    /// Directory used as the local photo library.
    pub library_dir: Option<PathBuf>,
    /// How the library directory is walked (`[library_scan]` table).
    pub library_scan: ScanConfig,
    pub total_range: CountRange,
    pub min_library_size: usize,
    pub sample_bound: SampleBound,
    pub local_failure_policy: FailurePolicy,
    pub remote_failure_policy: FailurePolicy,
    /// Bound on the longer side of local photos; unset loads full resolution.
    pub local_max_size: Option<u32>,
    pub request_timeout_secs: Option<u64>,
    pub cache_capacity: usize,
    pub cache_max_bytes: usize,
    pub preview_height: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            unsplash_base_url: DEFAULT_BASE_URL.to_string(),
            access_key: String::new(),
            library_dir: None,
            library_scan: ScanConfig::default(),
            total_range: CountRange::default(),
            min_library_size: DEFAULT_MIN_LIBRARY_SIZE,
            sample_bound: SampleBound::HalfOpen,
            local_failure_policy: FailurePolicy::Omit,
            remote_failure_policy: FailurePolicy::Placeholder,
            local_max_size: None,
            request_timeout_secs: None,
            cache_capacity: DEFAULT_CAPACITY,
            cache_max_bytes: DEFAULT_MAX_BYTES,
            preview_height: DEFAULT_PREVIEW_HEIGHT,
        }
    }
}

impl AppConfig {
    /// Default config file location.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "photowheel").map(|dirs| dirs.config_dir().join(CONFIG_FILE))
    }

    /// Load from `path`, or from the default location when `path` is `None`.
    ///
    /// An explicit path must exist; a missing default file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => {
                    debug!("No config file, using defaults");
                    Self::default()
                }
            },
        };

        config.apply_env(std::env::var(ACCESS_KEY_ENV).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(?path, "Loaded config file");
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    fn apply_env(&mut self, access_key: Option<String>) {
        if let Some(key) = access_key.filter(|k| !k.trim().is_empty()) {
            self.access_key = key;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.total_range
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if self.preview_height == 0 {
            return Err(ConfigError::Invalid("preview_height must be positive".into()));
        }
        if url::Url::parse(&self.unsplash_base_url).is_err() {
            return Err(ConfigError::Invalid(format!(
                "unsplash_base_url is not a URL: {}",
                self.unsplash_base_url
            )));
        }
        if self.access_key.is_empty() {
            warn!(
                "No Unsplash access key configured (set {}); remote photos will be unavailable",
                ACCESS_KEY_ENV
            );
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.total_range, CountRange { min: 10, max: 20 });
        assert_eq!(config.min_library_size, 10);
        assert_eq!(config.sample_bound, SampleBound::HalfOpen);
        assert_eq!(config.local_failure_policy, FailurePolicy::Omit);
        assert_eq!(config.remote_failure_policy, FailurePolicy::Placeholder);
        assert_eq!(config.cache_capacity, 100);
        assert_eq!(config.cache_max_bytes, 100 * 1024 * 1024);
        assert_eq!(config.library_scan, ScanConfig::default());
        assert!(config.request_timeout().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_toml() {
        let config = AppConfig::parse(
            r#"
            access_key = "abc"
            sample_bound = "inclusive"
            remote_failure_policy = "omit"
            request_timeout_secs = 30

            [total_range]
            min = 5
            max = 8

            [library_scan]
            recursive = false
            "#,
        )
        .unwrap();

        assert_eq!(config.access_key, "abc");
        assert_eq!(config.sample_bound, SampleBound::Inclusive);
        assert_eq!(config.remote_failure_policy, FailurePolicy::Omit);
        assert_eq!(config.total_range, CountRange { min: 5, max: 8 });
        assert!(!config.library_scan.recursive);
        assert!(!config.library_scan.follow_symlinks);
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(30)));
        // Untouched fields keep defaults.
        assert_eq!(config.unsplash_base_url, DEFAULT_BASE_URL);
        assert_eq!(config.min_library_size, 10);
    }

    #[test]
    fn test_parse_rejects_bad_values() {
        assert!(AppConfig::parse("sample_bound = \"sideways\"").is_err());
        assert!(AppConfig::parse("min_library_size = \"ten\"").is_err());
    }

    #[test]
    fn test_validate() {
        let mut config = AppConfig::default();
        config.total_range = CountRange { min: 20, max: 10 };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = AppConfig::default();
        config.unsplash_base_url = "not a url".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_override() {
        let mut config = AppConfig::parse("access_key = \"from-file\"").unwrap();
        config.apply_env(Some("   ".into()));
        assert_eq!(config.access_key, "from-file");
        config.apply_env(None);
        assert_eq!(config.access_key, "from-file");
        config.apply_env(Some("from-env".into()));
        assert_eq!(config.access_key, "from-env");
    }

    #[test]
    fn test_load_explicit_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "min_library_size = 3\npreview_height = 256\n").unwrap();

        let config = AppConfig::from_file(&path).unwrap();
        assert_eq!(config.min_library_size, 3);
        assert_eq!(config.preview_height, 256);

        let missing = dir.path().join("missing.toml");
        assert!(matches!(
            AppConfig::load(Some(&missing)),
            Err(ConfigError::Read { .. })
        ));
    }
}
