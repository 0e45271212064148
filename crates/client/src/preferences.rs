//! Durable user preferences.
//!
//! Only preferences live here, never data derived from the server.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use crate::error::ClientResult;

/// Key of the selected group filter.
pub const SELECTED_GROUP_ID: &str = "selectedGroupId";

/// Value meaning "no group filter".
pub const ALL_GROUPS: &str = "all";

/// A string key-value store.
pub trait PreferenceStore {
    /// Read `key`.
    fn get(&self, key: &str) -> Option<String>;

    /// Write `key`.
    fn set(&mut self, key: &str, value: &str) -> ClientResult<()>;

    /// Delete `key`.
    fn remove(&mut self, key: &str) -> ClientResult<()>;
}

/// Store that forgets everything on drop.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl PreferenceStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> ClientResult<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> ClientResult<()> {
        self.values.remove(key);
        Ok(())
    }
}

/// Store backed by a JSON object on disk, rewritten on every change.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl JsonFileStore {
    /// Open `path`; a missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> ClientResult<Self> {
        let path = path.into();
        let values = match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, values })
    }

    fn persist(&self) -> ClientResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_vec_pretty(&self.values)?)?;
        Ok(())
    }
}

impl PreferenceStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> ClientResult<()> {
        self.values.insert(key.to_string(), value.to_string());
        self.persist()
    }

    fn remove(&mut self, key: &str) -> ClientResult<()> {
        if self.values.remove(key).is_some() {
            self.persist()?;
        }
        Ok(())
    }
}

/// Remember the selected group.
pub fn select_group<S: PreferenceStore + ?Sized>(store: &mut S, group_id: &str) -> ClientResult<()> {
    store.set(SELECTED_GROUP_ID, group_id)
}

/// The saved group if it is still one of `valid`, else [`ALL_GROUPS`].
///
/// A saved group that is no longer valid is forgotten.
pub fn restore_group<S: PreferenceStore + ?Sized>(
    store: &mut S,
    valid: &[String],
) -> ClientResult<String> {
    let Some(saved) = store.get(SELECTED_GROUP_ID) else {
        return Ok(ALL_GROUPS.to_string());
    };
    if saved == ALL_GROUPS || valid.contains(&saved) {
        return Ok(saved);
    }
    tracing::debug!(group = %saved, "Dropping stale group preference");
    store.remove(SELECTED_GROUP_ID)?;
    Ok(ALL_GROUPS.to_string())
}
