//! Cache path derivation and item file naming.
//!
//! Every cache key maps to a directory of four nested hash-named
//! segments under the cache root:
//!
//! ```text
//! <root>/<H(device id)>/<H(image)>/<H(spec constants)>/<H(build options)>/
//!     0.bin, 0.src, 0.lock(transient)
//!     1.bin, 1.src, ...
//! ```
//!
//! The hash is fast and non-cryptographic; distinct keys may in principle
//! collide on the full path, which is why every fetch verifies the source
//! record before trusting a binary.

use crate::types::CacheKey;
use std::ffi::OsString;
use std::hash::{DefaultHasher, Hasher};
use std::path::{Path, PathBuf};
use tracing::trace;

/// Derive the directory holding all cached items for a key.
///
/// Returns `None` when `root` is empty, which signals that caching is
/// unavailable for this request. This is not an error.
pub fn item_directory(root: &Path, key: &CacheKey) -> Option<PathBuf> {
    if root.as_os_str().is_empty() {
        trace!("persistent cache unavailable: no cache root configured");
        return None;
    }

    Some(
        root.join(component_hash(key.device.id_string().as_bytes()))
            .join(component_hash(&key.image.bytes))
            .join(component_hash(&key.spec_constants))
            .join(component_hash(key.build_options.as_bytes())),
    )
}

/// Base path (no extension) of the item at `index` inside a key directory.
/// The binary, source and lock files all share this base.
pub fn item_base(dir: &Path, index: usize) -> PathBuf {
    dir.join(index.to_string())
}

/// Path of the binary file for an item base.
pub fn binary_file(base: &Path) -> PathBuf {
    append_suffix(base, ".bin")
}

/// Path of the source record file for an item base.
pub fn source_file(base: &Path) -> PathBuf {
    append_suffix(base, ".src")
}

/// Path of the lock file for an item base.
pub fn lock_file(base: &Path) -> PathBuf {
    append_suffix(base, ".lock")
}

/// Hash one key component to its decimal path segment.
///
/// `DefaultHasher` is stable within a build, which is all the layout
/// needs: the source record catches any cross-version drift the same way
/// it catches hash collisions.
fn component_hash(bytes: &[u8]) -> String {
    let mut hasher = DefaultHasher::new();
    hasher.write(bytes);
    hasher.finish().to_string()
}

// Item bases never carry an extension of their own; the suffix is
// appended, not substituted.
fn append_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(base.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}
