//! Cache configuration.
//!
//! All knobs are supplied by the embedding runtime; this crate only
//! consumes them. The cache is disabled by default so that runtimes opt
//! in explicitly.

use std::path::PathBuf;

/// Persistent cache configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Whether the persistent cache is enabled at all
    pub enabled: bool,
    /// Cache root directory. An empty path means caching is unavailable
    /// for every request (not an error).
    pub root_dir: PathBuf,
    /// Minimum image size in bytes eligible for caching (0 = unbounded)
    pub min_image_size: u64,
    /// Maximum image size in bytes eligible for caching (0 = unbounded)
    pub max_image_size: u64,
    /// Skip caching entirely while the pipeline injects profiling
    /// instrumentation; instrumented binaries are run-specific.
    pub exclude_instrumented: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        let root_dir = dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("progcache");

        Self {
            enabled: false,
            root_dir,
            min_image_size: 0,
            max_image_size: 0,
            exclude_instrumented: false,
        }
    }
}

impl CacheConfig {
    /// Create an enabled configuration rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            enabled: true,
            root_dir: root_dir.into(),
            ..Self::default()
        }
    }

    /// Set the minimum eligible image size in bytes (0 = unbounded).
    pub fn with_min_image_size(mut self, bytes: u64) -> Self {
        self.min_image_size = bytes;
        self
    }

    /// Set the maximum eligible image size in bytes (0 = unbounded).
    pub fn with_max_image_size(mut self, bytes: u64) -> Self {
        self.max_image_size = bytes;
        self
    }

    /// Set whether instrumented images are excluded from caching.
    pub fn with_exclude_instrumented(mut self, exclude: bool) -> Self {
        self.exclude_instrumented = exclude;
        self
    }

    /// Enable or disable the cache.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}
