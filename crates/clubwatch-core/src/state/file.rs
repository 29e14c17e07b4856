// # File State Store
//
// File-based implementation of StateStore with crash recovery.
//
// ## Purpose
//
// Keeps the last accepted snapshot of every source across restarts, so a
// change that was already announced is not announced again.
//
// ## Crash Recovery
//
// - Atomic writes: Uses write-then-rename for atomicity
// - Corruption detection: Validates JSON on load
// - Automatic backup: Keeps .backup of last known good state
// - Recovery: Falls back to backup if corruption detected
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "sources": {
//     "registration_bans": {
//       "source_id": "registration_bans",
//       "last_snapshot": { "kind": "scalar", "count": 3 },
//       "last_updated_at": "2025-01-09T12:00:00Z"
//     }
//   }
// }
// ```

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::Error;
use crate::model::{ScalarSnapshot, Snapshot};
use crate::traits::state_store::{SourceState, StateStore};

/// State file format version
const STATE_FILE_VERSION: &str = "1.0";

/// File-based state store with crash recovery
///
/// Every accepted snapshot is written through to disk immediately.
///
/// # Example
///
/// ```rust,no_run
/// use clubwatch_core::state::FileStateStore;
/// use clubwatch_core::traits::StateStore;
/// use clubwatch_core::model::{ScalarSnapshot, Snapshot};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileStateStore::new("/var/lib/clubwatch/state.json").await?;
///
///     let snapshot = Snapshot::from(ScalarSnapshot::new(3));
///     store.put_snapshot("registration_bans", &snapshot).await?;
///
///     let stored = store.get_snapshot("registration_bans").await?;
///     assert_eq!(stored, Some(snapshot));
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileStateStore {
    path: PathBuf,
    state: Arc<RwLock<FileState>>,
}

/// Internal state for file-based store
#[derive(Debug)]
struct FileState {
    sources: BTreeMap<String, SourceState>,
    dirty: bool,
}

/// Serializable state file format
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct StateFileFormat {
    version: String,
    sources: BTreeMap<String, SourceState>,
}

/// Single-count file written by earlier single-source deployments
///
/// `{"count": 3}` is read as the state of [`LEGACY_COUNT_SOURCE`].
#[derive(Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct LegacyCountFile {
    count: u64,
}

/// Source id a legacy count file is migrated to
const LEGACY_COUNT_SOURCE: &str = "registration_bans";

/// Why a state file could not be loaded
#[derive(Debug)]
enum LoadError {
    /// File exists but is not valid state JSON
    Corrupt(String),
    /// File could not be read
    Io(String),
}

fn io_failure(action: &str, path: &Path, e: impl std::fmt::Display) -> Error {
    Error::state_store(format!("Failed to {} {}: {}", action, path.display(), e))
}

impl FileStateStore {
    /// Open the state file at `path`, creating parent directories as needed
    ///
    /// A corrupt file is replaced by its `.backup` copy when that one loads;
    /// otherwise the store starts empty and every source re-baselines.
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::config(format!(
                    "Failed to create state directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let sources = Self::load_with_recovery(&path).await?;

        Ok(Self {
            path,
            state: Arc::new(RwLock::new(FileState {
                sources,
                dirty: false,
            })),
        })
    }

    async fn load_with_recovery(path: &Path) -> Result<BTreeMap<String, SourceState>, Error> {
        let corruption = match Self::load(path).await {
            Ok(sources) => {
                tracing::debug!("Loaded {} source record(s) from {}", sources.len(), path.display());
                return Ok(sources);
            }
            Err(LoadError::Io(msg)) => return Err(Error::state_store(msg)),
            Err(LoadError::Corrupt(msg)) => msg,
        };

        tracing::warn!("State file is corrupt ({}), trying the backup", corruption);

        let backup_path = Self::backup_path(path);
        if !backup_path.exists() {
            tracing::warn!("No state backup at {}; starting empty", backup_path.display());
            return Ok(BTreeMap::new());
        }

        match Self::load(&backup_path).await {
            Ok(sources) => {
                tracing::info!("Recovered {} source record(s) from backup", sources.len());
                if let Err(e) = fs::copy(&backup_path, path).await {
                    tracing::error!("{}", io_failure("restore state file", path, e));
                }
                Ok(sources)
            }
            Err(backup_err) => {
                tracing::error!("State backup unusable too ({:?}); starting empty", backup_err);
                Ok(BTreeMap::new())
            }
        }
    }

    async fn load(path: &Path) -> Result<BTreeMap<String, SourceState>, LoadError> {
        if !path.exists() {
            tracing::debug!("No state file at {}", path.display());
            return Ok(BTreeMap::new());
        }

        let content = fs::read_to_string(path)
            .await
            .map_err(|e| LoadError::Io(io_failure("read state file", path, e).to_string()))?;

        match serde_json::from_str::<StateFileFormat>(&content) {
            Ok(state_file) => {
                if state_file.version != STATE_FILE_VERSION {
                    tracing::warn!(
                        "State file version {} (expected {}), loading anyway",
                        state_file.version,
                        STATE_FILE_VERSION
                    );
                }
                Ok(state_file.sources)
            }
            Err(e) => match serde_json::from_str::<LegacyCountFile>(&content) {
                Ok(legacy) => {
                    tracing::info!(
                        "Migrating legacy count file (count {}) to source {}",
                        legacy.count,
                        LEGACY_COUNT_SOURCE
                    );
                    let state = SourceState::new(
                        LEGACY_COUNT_SOURCE,
                        Snapshot::from(ScalarSnapshot::new(legacy.count)),
                    );
                    Ok(BTreeMap::from([(LEGACY_COUNT_SOURCE.to_string(), state)]))
                }
                Err(_) => Err(LoadError::Corrupt(format!("{}: {}", path.display(), e))),
            },
        }
    }

    /// Replace the state file with the in-memory records
    ///
    /// Writes a synced temp file, copies the current file to `.backup`, then
    /// renames the temp file over the original.
    async fn write_state(&self) -> Result<(), Error> {
        let json = {
            let state_guard = self.state.read().await;
            serde_json::to_string_pretty(&StateFileFormat {
                version: STATE_FILE_VERSION.to_string(),
                sources: state_guard.sources.clone(),
            })
            .map_err(|e| Error::state_store(format!("Failed to serialize state: {}", e)))?
        };

        let temp_path = self.temp_path();
        let mut file = fs::File::create(&temp_path)
            .await
            .map_err(|e| io_failure("create", &temp_path, e))?;
        file.write_all(json.as_bytes())
            .await
            .map_err(|e| io_failure("write", &temp_path, e))?;
        file.sync_all()
            .await
            .map_err(|e| io_failure("sync", &temp_path, e))?;
        drop(file);

        if self.path.exists()
            && let Err(e) = fs::copy(&self.path, Self::backup_path(&self.path)).await
        {
            tracing::warn!("Failed to back up state file: {}", e);
        }

        fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| io_failure("move temp file over", &self.path, e))?;

        self.state.write().await.dirty = false;
        tracing::trace!("State written to {}", self.path.display());
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        self.path.with_extension("tmp")
    }

    fn backup_path(path: &Path) -> PathBuf {
        path.with_extension("backup")
    }

    /// Path of the state file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn get_state(&self, source_id: &str) -> Result<Option<SourceState>, Error> {
        let state_guard = self.state.read().await;
        Ok(state_guard.sources.get(source_id).cloned())
    }

    async fn put_snapshot(&self, source_id: &str, snapshot: &Snapshot) -> Result<(), Error> {
        self.set_state(&SourceState::new(source_id, snapshot.clone())).await
    }

    async fn set_state(&self, state: &SourceState) -> Result<(), Error> {
        let previous = {
            let mut state_guard = self.state.write().await;
            state_guard.dirty = true;
            state_guard
                .sources
                .insert(state.source_id.clone(), state.clone())
        };

        // Write through; roll back the in-memory record if the disk write fails
        if let Err(e) = self.write_state().await {
            let mut state_guard = self.state.write().await;
            match previous {
                Some(previous) => {
                    state_guard.sources.insert(state.source_id.clone(), previous);
                }
                None => {
                    state_guard.sources.remove(&state.source_id);
                }
            }
            return Err(e);
        }
        Ok(())
    }

    async fn list_sources(&self) -> Result<Vec<String>, Error> {
        let state_guard = self.state.read().await;
        Ok(state_guard.sources.keys().cloned().collect())
    }

    async fn flush(&self) -> Result<(), Error> {
        let dirty = self.state.read().await.dirty;
        if dirty { self.write_state().await } else { Ok(()) }
    }
}
