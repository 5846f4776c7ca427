//! Inter-process lock files for in-progress cache item writes.
//!
//! The cache is shared by unrelated processes with no common memory, so
//! the only synchronization primitive is the filesystem's atomic
//! exclusive-create. A lock file next to an item marks its write as in
//! progress; readers skip locked items instead of waiting.
//!
//! A process killed mid-write leaves its lock file behind and the item
//! stays permanently skipped. There is no staleness timeout: a reader
//! cannot distinguish a live writer from a crashed one without racing the
//! writer, and removing a live writer's lock could surface a torn item.
//! Clearing abandoned locks is left to external cache maintenance.

use crate::path::lock_file;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Scoped ownership of one cache item's lock file.
///
/// Acquisition never blocks and never fails hard: losing the race to
/// another writer simply yields a guard that reports `is_owned() ==
/// false`, and the caller abandons its store attempt.
#[derive(Debug)]
pub struct ItemLock {
    path: PathBuf,
    owned: bool,
}

impl ItemLock {
    /// Attempt to acquire the lock for the item at `base`.
    ///
    /// Creates `<base>.lock` with an exclusive-create open so concurrent
    /// processes racing for the same item have exactly one winner.
    pub fn acquire(base: &Path) -> Self {
        let path = lock_file(base);
        let owned = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => true,
            Err(err) => {
                debug!("failed to acquire lock file {}: {}", path.display(), err);
                false
            }
        };

        Self { path, owned }
    }

    /// Whether this attempt won the lock.
    pub fn is_owned(&self) -> bool {
        self.owned
    }

    /// Whether the item at `base` is currently locked.
    ///
    /// Pure existence check used by readers; never creates or removes
    /// anything.
    pub fn is_locked(base: &Path) -> bool {
        lock_file(base).exists()
    }
}

impl Drop for ItemLock {
    fn drop(&mut self) {
        if self.owned {
            if let Err(err) = fs::remove_file(&self.path) {
                debug!("failed to release lock file {}: {}", self.path.display(), err);
            }
        }
    }
}
