//! Hot-reloadable credential store handle.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, SystemTime};

use tracing::{error, info};

use crate::error::BastionError;

use super::loader;
use super::records::StoreSnapshot;

/// Handle to the currently active credential store snapshot.
///
/// The snapshot is immutable once loaded; a reload replaces it with an
/// atomic swap, so concurrent resolvers never observe a partially-updated
/// store. A load failure at startup is fatal; at reload time the last-good
/// snapshot stays active and the failure is logged.
pub struct StoreHandle {
    path: PathBuf,
    snapshot: RwLock<Arc<StoreSnapshot>>,
    last_modified: Mutex<Option<SystemTime>>,
}

impl StoreHandle {
    /// Load the store and build a handle around the initial snapshot.
    pub fn open(path: &Path) -> Result<Self, BastionError> {
        let snapshot = loader::load(path)?;
        let last_modified = loader::modified_time(path);

        Ok(Self {
            path: path.to_path_buf(),
            snapshot: RwLock::new(Arc::new(snapshot)),
            last_modified: Mutex::new(last_modified),
        })
    }

    /// The latest atomically-swapped snapshot.
    pub fn current(&self) -> Arc<StoreSnapshot> {
        let guard = self.snapshot.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Path of the backing store file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reload the store if the backing file's modification time changed.
    ///
    /// Returns `true` if a new snapshot was installed. On a failed reload
    /// the previous snapshot stays active; the new modification time is
    /// still remembered so one broken write is logged once, not on every
    /// poll.
    pub fn reload_if_modified(&self) -> bool {
        let current_mtime = loader::modified_time(&self.path);

        {
            let guard = self.last_modified.lock().unwrap_or_else(|e| e.into_inner());
            if *guard == current_mtime {
                return false;
            }
        }

        match loader::load(&self.path) {
            Ok(new_snapshot) => {
                let identities = new_snapshot.identities.len();
                {
                    let mut guard = self.snapshot.write().unwrap_or_else(|e| e.into_inner());
                    *guard = Arc::new(new_snapshot);
                }
                {
                    let mut guard = self.last_modified.lock().unwrap_or_else(|e| e.into_inner());
                    *guard = current_mtime;
                }
                info!(
                    path = %self.path.display(),
                    identities,
                    "Credential store reloaded"
                );
                true
            }
            Err(e) => {
                {
                    let mut guard = self.last_modified.lock().unwrap_or_else(|e| e.into_inner());
                    *guard = current_mtime;
                }
                error!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to reload credential store, keeping last-good snapshot"
                );
                false
            }
        }
    }

    /// Start a background task that polls the store file for changes.
    pub fn start_watch_task(self: &Arc<Self>, interval: Duration) {
        let handle = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval_timer = tokio::time::interval(interval);
            loop {
                interval_timer.tick().await;
                handle.reload_if_modified();
            }
        });
    }
}
