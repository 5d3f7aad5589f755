//! Persistence service: versioned state snapshots in a key-value store.
//!
//! DESIGN
//! ======
//! The whole `AppState` is saved under one key as
//! `{"version": N, "state": {...}}`. Loading reads the version, runs each
//! migration step up to `SNAPSHOT_VERSION`, then deserializes. Snapshots
//! with no version field are treated as version 0.
//!
//! Version history:
//! - 0: rooms carry `college` instead of `collegeId`; users have no `isVerified`.
//! - 1: current layout.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};

use crate::state::AppState;

pub const SNAPSHOT_VERSION: u64 = 1;

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("storage io failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("snapshot version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: u64, supported: u64 },
    #[error("malformed snapshot: {0}")]
    Malformed(String),
}

// =============================================================================
// KEY-VALUE STORES
// =============================================================================

/// Local string key-value storage.
pub trait KvStore: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, PersistError>;

    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), PersistError>;

    /// Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be written.
    fn remove(&self, key: &str) -> Result<(), PersistError>;
}

/// Process-local store. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, PersistError> {
        let map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(map.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PersistError> {
        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        map.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), PersistError> {
        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        map.remove(key);
        Ok(())
    }
}

/// One `<key>.json` file per key under a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KvStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, PersistError> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PersistError> {
        std::fs::create_dir_all(&self.dir)?;
        // Write-then-rename so a crash never leaves a half-written snapshot.
        let path = self.path_for(key);
        let tmp = self.dir.join(format!("{key}.json.tmp"));
        std::fs::write(&tmp, value)?;
        if let Err(e) = std::fs::rename(&tmp, &path) {
            if let Err(cleanup) = std::fs::remove_file(&tmp) {
                warn!(error = %cleanup, path = %tmp.display(), "temp snapshot cleanup failed");
            }
            return Err(e.into());
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), PersistError> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// =============================================================================
// SNAPSHOTS
// =============================================================================

/// Serialize state into a versioned snapshot string.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn encode_snapshot(state: &AppState) -> Result<String, PersistError> {
    let snapshot = json!({
        "version": SNAPSHOT_VERSION,
        "state": serde_json::to_value(state)?,
    });
    Ok(serde_json::to_string(&snapshot)?)
}

/// Parse a snapshot of any supported version into current state.
///
/// # Errors
///
/// Returns an error for invalid JSON, an unknown future version, or a
/// state body that does not fit the current layout after migration.
pub fn decode_snapshot(raw: &str) -> Result<AppState, PersistError> {
    let mut root: Value = serde_json::from_str(raw)?;
    let Some(obj) = root.as_object_mut() else {
        return Err(PersistError::Malformed("snapshot root is not an object".into()));
    };

    let mut version = match obj.get("version") {
        None | Some(Value::Null) => 0,
        Some(v) => v
            .as_u64()
            .ok_or_else(|| PersistError::Malformed(format!("version is not a number: {v}")))?,
    };
    if version > SNAPSHOT_VERSION {
        return Err(PersistError::UnsupportedVersion { found: version, supported: SNAPSHOT_VERSION });
    }

    let mut state = obj
        .remove("state")
        .ok_or_else(|| PersistError::Malformed("missing state".into()))?;

    while version < SNAPSHOT_VERSION {
        state = migrate_step(version, state)?;
        version += 1;
        debug!(version, "snapshot migrated");
    }

    let mut state: AppState = serde_json::from_value(state)?;
    state.ensure_global_room();
    Ok(state)
}

fn migrate_step(from: u64, state: Value) -> Result<Value, PersistError> {
    match from {
        0 => migrate_v0_to_v1(state),
        other => Err(PersistError::Malformed(format!("no migration from version {other}"))),
    }
}

fn migrate_v0_to_v1(mut state: Value) -> Result<Value, PersistError> {
    let Some(obj) = state.as_object_mut() else {
        return Err(PersistError::Malformed("state is not an object".into()));
    };

    if let Some(Value::Array(rooms)) = obj.get_mut("rooms") {
        for room in rooms.iter_mut().filter_map(Value::as_object_mut) {
            rename_key(room, "college", "collegeId");
        }
    }

    if let Some(Value::Object(user)) = obj.get_mut("user") {
        user.entry("isVerified").or_insert(Value::Bool(false));
    }

    Ok(state)
}

fn rename_key(obj: &mut Map<String, Value>, from: &str, to: &str) {
    if let Some(value) = obj.remove(from) {
        obj.entry(to).or_insert(value);
    }
}

/// Save state under `key`.
///
/// # Errors
///
/// Returns an error if encoding or the store write fails.
pub fn save(store: &dyn KvStore, key: &str, state: &AppState) -> Result<(), PersistError> {
    let raw = encode_snapshot(state)?;
    store.set(key, &raw)?;
    debug!(key, bytes = raw.len(), "snapshot saved");
    Ok(())
}

/// Load state from `key`. `None` when nothing has been saved yet.
///
/// # Errors
///
/// Returns an error if the store read or decoding fails.
pub fn load(store: &dyn KvStore, key: &str) -> Result<Option<AppState>, PersistError> {
    let Some(raw) = store.get(key)? else {
        return Ok(None);
    };
    let state = decode_snapshot(&raw)?;
    info!(key, rooms = state.rooms.len(), messages = state.messages.len(), "snapshot restored");
    Ok(Some(state))
}

#[cfg(test)]
#[path = "persistence_test.rs"]
mod tests;
