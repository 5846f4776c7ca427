//! Persistent cache controller.
//!
//! [`PersistentCache`] ties eligibility checks, path derivation, lock
//! files, the binary codec and source records together into the store and
//! fetch protocols. A cache malfunction always degrades to "recompute":
//! store failures are swallowed, fetch failures become misses, and no
//! error from this module ever reaches a caller.

use crate::codec;
use crate::config::CacheConfig;
use crate::lock::ItemLock;
use crate::path;
use crate::source;
use crate::stats::CacheStats;
use crate::types::{CacheError, CacheKey, DeviceImage};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use tracing::debug;

/// Enablement announced in the trace log once per process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EnabledState {
    Enabled,
    Disabled,
}

static ENABLED_STATE: OnceLock<EnabledState> = OnceLock::new();

/// Persistent on-disk cache for compiled device program binaries.
///
/// Safe to share between processes: all coordination goes through the
/// filesystem (exclusive-create lock files), and readers never block on a
/// writer. Within a process the controller is `Sync`; statistics are kept
/// behind a mutex.
#[derive(Debug)]
pub struct PersistentCache {
    config: CacheConfig,
    stats: Mutex<CacheStats>,
}

impl PersistentCache {
    /// Create a controller over the given configuration.
    pub fn new(config: CacheConfig) -> Self {
        ENABLED_STATE.get_or_init(|| {
            if config.enabled {
                debug!("persistent program cache enabled");
                EnabledState::Enabled
            } else {
                debug!("persistent program cache disabled");
                EnabledState::Disabled
            }
        });

        Self {
            config,
            stats: Mutex::new(CacheStats::new()),
        }
    }

    /// Whether binaries compiled from `image` are eligible for caching.
    ///
    /// Gates store and fetch identically: an image that would never be
    /// stored is never looked up either.
    pub fn is_cacheable(&self, image: &DeviceImage) -> bool {
        if !self.config.enabled || !image.format.is_cacheable() {
            return false;
        }

        if self.config.exclude_instrumented {
            return false;
        }

        // Zero thresholds leave the corresponding side unbounded.
        let size = image.size() as u64;
        if self.config.max_image_size != 0 && size > self.config.max_image_size {
            return false;
        }
        if self.config.min_image_size != 0 && size < self.config.min_image_size {
            return false;
        }

        true
    }

    /// Store compiled binaries for `key`, one blob per target sub-device.
    ///
    /// Best-effort: ineligible requests, lock contention and filesystem
    /// errors all leave the cache unchanged without surfacing anything to
    /// the caller.
    pub fn store(&self, key: &CacheKey, binaries: &[Vec<u8>]) {
        if !self.is_cacheable(&key.image) {
            return;
        }
        let Some(dir) = path::item_directory(&self.config.root_dir, key) else {
            return;
        };

        match self.store_item(&dir, key, binaries) {
            Ok(StoreOutcome::Stored) => {
                if let Ok(mut stats) = self.stats.lock() {
                    stats.record_store();
                }
            }
            Ok(StoreOutcome::Contended) => {
                if let Ok(mut stats) = self.stats.lock() {
                    stats.record_lock_contention();
                }
            }
            Err(err) => {
                debug!("failed to store cache item under {}: {}", dir.display(), err);
                if let Ok(mut stats) = self.stats.lock() {
                    stats.record_store_failure();
                }
            }
        }
    }

    /// Fetch the binaries previously stored for `key`.
    ///
    /// Returns the ordered blobs exactly as stored, or `None` on a miss.
    /// Corrupt and locked candidates are skipped; a failure on one index
    /// never hides a valid item at a higher one.
    pub fn fetch(&self, key: &CacheKey) -> Option<Vec<Vec<u8>>> {
        if !self.is_cacheable(&key.image) {
            return None;
        }
        let dir = path::item_directory(&self.config.root_dir, key)?;

        let result = self.fetch_item(&dir, key);
        if let Ok(mut stats) = self.stats.lock() {
            match result {
                Some(_) => stats.record_hit(),
                None => stats.record_miss(),
            }
        }
        result
    }

    /// Snapshot of the cache activity counters.
    pub fn stats(&self) -> CacheStats {
        self.stats
            .lock()
            .map(|stats| stats.clone())
            .unwrap_or_default()
    }

    fn store_item(
        &self,
        dir: &Path,
        key: &CacheKey,
        binaries: &[Vec<u8>],
    ) -> Result<StoreOutcome, CacheError> {
        let base = first_free_base(dir);
        fs::create_dir_all(dir)?;

        // Lock released on scope exit whether the writes succeed or not.
        let lock = ItemLock::acquire(&base);
        if !lock.is_owned() {
            return Ok(StoreOutcome::Contended);
        }

        let bin = path::binary_file(&base);
        codec::write_blobs(&bin, binaries)?;
        debug!("device binary cached: {}", bin.display());
        source::write_record(&path::source_file(&base), key)?;

        Ok(StoreOutcome::Stored)
    }

    fn fetch_item(&self, dir: &Path, key: &CacheKey) -> Option<Vec<Vec<u8>>> {
        if !dir.is_dir() {
            return None;
        }

        let mut index = 0;
        loop {
            let base = path::item_base(dir, index);
            let bin = path::binary_file(&base);
            let src = path::source_file(&base);

            // Neither file present marks the end of known candidates.
            if !bin.exists() && !src.exists() {
                return None;
            }

            if !ItemLock::is_locked(&base) && source::matches(&src, key) {
                match codec::read_blobs(&bin) {
                    Ok(blobs) => {
                        debug!("using cached device binary: {}", bin.display());
                        return Some(blobs);
                    }
                    // A later index may still hold a complete item.
                    Err(err) => {
                        debug!("failed to read cached binary {}: {}", bin.display(), err);
                    }
                }
            }

            index += 1;
        }
    }
}

enum StoreOutcome {
    Stored,
    Contended,
}

/// First item base in `dir` with no binary file present.
fn first_free_base(dir: &Path) -> PathBuf {
    let mut index = 0;
    loop {
        let base = path::item_base(dir, index);
        if !path::binary_file(&base).exists() {
            return base;
        }
        index += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DeviceIdentity, DeviceImage, ImageFormat};
    use tempfile::TempDir;

    fn test_key(image_bytes: Vec<u8>) -> CacheKey {
        CacheKey::new(
            DeviceIdentity::new("cuda", "sm_90", "12.4", "550.54"),
            DeviceImage::new(ImageFormat::SpirV, image_bytes),
            vec![1, 2],
            "-O2",
        )
    }

    fn test_cache(root: &Path) -> PersistentCache {
        PersistentCache::new(CacheConfig::new(root))
    }

    #[test]
    fn test_store_then_fetch_returns_same_blobs() {
        let dir = TempDir::new().unwrap();
        let cache = test_cache(dir.path());
        let key = test_key(vec![1, 2, 3, 4]);
        let binaries = vec![vec![10u8; 64], vec![20u8; 32]];

        cache.store(&key, &binaries);

        assert_eq!(cache.fetch(&key), Some(binaries));
    }

    #[test]
    fn test_fetch_unknown_key_is_miss() {
        let dir = TempDir::new().unwrap();
        let cache = test_cache(dir.path());

        assert_eq!(cache.fetch(&test_key(vec![9, 9, 9])), None);
    }

    #[test]
    fn test_fetch_rejects_different_key_in_same_directory() {
        // Force both keys into one directory by writing the second item
        // by hand; the source record must reject it.
        let dir = TempDir::new().unwrap();
        let cache = test_cache(dir.path());
        let stored = test_key(vec![1, 2, 3, 4]);
        cache.store(&stored, &[vec![1u8]]);

        let mut probe = stored.clone();
        probe.build_options = "-O0".to_string();

        assert_eq!(cache.fetch(&probe), None);
    }

    #[test]
    fn test_store_is_noop_when_disabled() {
        let dir = TempDir::new().unwrap();
        let cache = PersistentCache::new(CacheConfig::new(dir.path()).with_enabled(false));
        let key = test_key(vec![1, 2, 3]);

        cache.store(&key, &[vec![1u8]]);

        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_empty_root_is_unconditional_noop() {
        let cache = PersistentCache::new(CacheConfig::new(""));
        let key = test_key(vec![1, 2, 3]);

        cache.store(&key, &[vec![1u8]]);

        assert_eq!(cache.fetch(&key), None);
    }

    #[test]
    fn test_unsupported_format_is_not_cacheable() {
        let dir = TempDir::new().unwrap();
        let cache = test_cache(dir.path());

        let image = DeviceImage::new(ImageFormat::LlvmIr, vec![1, 2, 3]);
        assert!(!cache.is_cacheable(&image));
    }

    #[test]
    fn test_image_below_min_size_is_never_stored_or_fetched() {
        let dir = TempDir::new().unwrap();
        let eligible = test_cache(dir.path());
        let key = test_key(vec![7u8; 100]);
        eligible.store(&key, &[vec![1u8]]);
        assert!(eligible.fetch(&key).is_some());

        let gated =
            PersistentCache::new(CacheConfig::new(dir.path()).with_min_image_size(1024));
        gated.store(&key, &[vec![2u8]]);

        // Even the previously stored item must not be served.
        assert_eq!(gated.fetch(&key), None);
    }

    #[test]
    fn test_image_above_max_size_is_not_cacheable() {
        let dir = TempDir::new().unwrap();
        let cache =
            PersistentCache::new(CacheConfig::new(dir.path()).with_max_image_size(16));

        assert!(!cache.is_cacheable(&DeviceImage::new(ImageFormat::SpirV, vec![0u8; 17])));
        assert!(cache.is_cacheable(&DeviceImage::new(ImageFormat::SpirV, vec![0u8; 16])));
    }

    #[test]
    fn test_instrumented_exclusion_gates_all_images() {
        let dir = TempDir::new().unwrap();
        let cache = PersistentCache::new(
            CacheConfig::new(dir.path()).with_exclude_instrumented(true),
        );

        assert!(!cache.is_cacheable(&DeviceImage::new(ImageFormat::SpirV, vec![1, 2, 3])));
    }

    #[test]
    fn test_second_store_lands_at_next_index() {
        let dir = TempDir::new().unwrap();
        let cache = test_cache(dir.path());
        let key = test_key(vec![1, 2, 3, 4]);

        cache.store(&key, &[vec![1u8]]);
        cache.store(&key, &[vec![2u8]]);

        let item_dir = path::item_directory(dir.path(), &key).unwrap();
        assert!(path::binary_file(&path::item_base(&item_dir, 0)).exists());
        assert!(path::binary_file(&path::item_base(&item_dir, 1)).exists());

        // Index 0 wins the scan.
        assert_eq!(cache.fetch(&key), Some(vec![vec![1u8]]));
    }

    #[test]
    fn test_locked_item_is_skipped() {
        let dir = TempDir::new().unwrap();
        let cache = test_cache(dir.path());
        let key = test_key(vec![1, 2, 3, 4]);
        cache.store(&key, &[vec![1u8]]);

        let item_dir = path::item_directory(dir.path(), &key).unwrap();
        let lock = path::lock_file(&path::item_base(&item_dir, 0));
        std::fs::write(&lock, b"").unwrap();

        assert_eq!(cache.fetch(&key), None);

        std::fs::remove_file(&lock).unwrap();
        assert!(cache.fetch(&key).is_some());
    }

    #[test]
    fn test_store_contention_leaves_no_item() {
        let dir = TempDir::new().unwrap();
        let cache = test_cache(dir.path());
        let key = test_key(vec![1, 2, 3, 4]);

        // Pre-create the key directory and hold the lock for index 0.
        let item_dir = path::item_directory(dir.path(), &key).unwrap();
        fs::create_dir_all(&item_dir).unwrap();
        let held = ItemLock::acquire(&path::item_base(&item_dir, 0));
        assert!(held.is_owned());

        cache.store(&key, &[vec![1u8]]);

        assert!(!path::binary_file(&path::item_base(&item_dir, 0)).exists());
        assert_eq!(cache.stats().lock_contention, 1);
    }

    #[test]
    fn test_corrupt_source_at_zero_falls_through_to_next_item() {
        let dir = TempDir::new().unwrap();
        let cache = test_cache(dir.path());
        let key = test_key(vec![1, 2, 3, 4]);

        cache.store(&key, &[vec![1u8]]);
        cache.store(&key, &[vec![2u8]]);

        let item_dir = path::item_directory(dir.path(), &key).unwrap();
        let src0 = path::source_file(&path::item_base(&item_dir, 0));
        std::fs::write(&src0, b"garbage").unwrap();

        assert_eq!(cache.fetch(&key), Some(vec![vec![2u8]]));
    }

    #[test]
    fn test_corrupt_binary_at_zero_falls_through_to_next_item() {
        let dir = TempDir::new().unwrap();
        let cache = test_cache(dir.path());
        let key = test_key(vec![1, 2, 3, 4]);

        cache.store(&key, &[vec![1u8]]);
        cache.store(&key, &[vec![2u8]]);

        let item_dir = path::item_directory(dir.path(), &key).unwrap();
        let bin0 = path::binary_file(&path::item_base(&item_dir, 0));
        std::fs::write(&bin0, u64::MAX.to_ne_bytes()).unwrap();

        assert_eq!(cache.fetch(&key), Some(vec![vec![2u8]]));
    }

    #[test]
    fn test_stats_track_hits_misses_and_stores() {
        let dir = TempDir::new().unwrap();
        let cache = test_cache(dir.path());
        let key = test_key(vec![1, 2, 3, 4]);

        cache.fetch(&key);
        cache.store(&key, &[vec![1u8]]);
        cache.fetch(&key);
        cache.fetch(&key);

        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.stores, 1);
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.hit_rate(), 2.0 / 3.0);
    }
}
