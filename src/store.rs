//! Durable storage of the cross-poll state
//!
//! The state file is single-writer (the poll loop) with a possible
//! independent reader (the visualization component), so `save` replaces the
//! file atomically: the serialized state is written to a sibling temp file
//! and renamed over the target, and the reader only ever observes a
//! complete, previously-committed state.

use crate::error::Result;
use crate::types::PersistedState;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Loads and saves the persisted state tuple
pub struct PersistenceStore {
    path: PathBuf,
}

impl PersistenceStore {
    /// Creates a store backed by the given file path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load prior state, downgrading any read or parse failure to "no prior
    /// state"
    ///
    /// A missing file is the normal first-run condition; a corrupt file is
    /// logged and likewise feeds a cold start rather than aborting.
    pub fn load(&self) -> Option<PersistedState> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "No usable state file, starting cold");
                return None;
            }
        };
        match serde_json::from_str(&content) {
            Ok(state) => {
                debug!(path = %self.path.display(), "Recovered persisted state");
                Some(state)
            }
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "State file is corrupt, starting cold"
                );
                None
            }
        }
    }

    /// Serialize and atomically replace the stored state
    ///
    /// Runs after every successful poll whether or not an event was
    /// recorded, keeping the boot/uptime baselines current. Failure here is
    /// fatal for the process; there is no buffering of unsaved results.
    pub fn save(&self, state: &PersistedState) -> Result<()> {
        let json = serde_json::to_string(state)?;
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, json)?;
        fs::rename(&tmp_path, &self.path)?;
        debug!(path = %self.path.display(), "Persisted state saved");
        Ok(())
    }
}
