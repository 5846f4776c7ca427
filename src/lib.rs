//! Persistent on-disk cache for compiled device program binaries.
//!
//! Compiling a device image for a specific target, specialization
//! constants and build options is expensive; this crate lets a second
//! identical request skip recompilation by loading previously stored
//! binaries from disk. The cache survives process restarts, is safely
//! shared by concurrent processes on one machine, and never returns a
//! binary that does not exactly match the current compilation inputs.
//!
//! # Example
//!
//! ```ignore
//! use progcache::{CacheConfig, CacheKey, DeviceIdentity, DeviceImage, ImageFormat, PersistentCache};
//!
//! let cache = PersistentCache::new(CacheConfig::new("/var/cache/progcache"));
//!
//! let key = CacheKey::new(
//!     DeviceIdentity::new("Intel(R) OpenCL", "gpu0", "3.0", "24.1"),
//!     DeviceImage::new(ImageFormat::SpirV, image_bytes),
//!     spec_constant_bytes,
//!     "-cl-fast-relaxed-math",
//! );
//!
//! let binaries = match cache.fetch(&key) {
//!     Some(binaries) => binaries,
//!     None => {
//!         let binaries = compile(&key);
//!         cache.store(&key, &binaries);
//!         binaries
//!     }
//! };
//! ```
//!
//! Caching is strictly best-effort: every failure below the controller
//! degrades to "recompute", never to an error at the call site.

pub mod cache;
pub mod codec;
pub mod config;
pub mod lock;
pub mod path;
pub mod source;
pub mod stats;
pub mod types;

pub use cache::PersistentCache;
pub use config::CacheConfig;
pub use lock::ItemLock;
pub use stats::CacheStats;
pub use types::{CacheError, CacheKey, DeviceIdentity, DeviceImage, ImageFormat};

/// Version of the progcache library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
