//! Durable key-value persistence
//!
//! The engine persists three independent aggregates as JSON: the click
//! buffer, the record set and the user profile. Any store that can read and
//! write a string per key will do.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

use crate::error::PressureError;
use crate::events::EventStore;
use crate::profile::UserProfile;
use crate::records::RecordSet;

/// Key of the current-day click buffer
pub const TODAY_CLICKS_KEY: &str = "today_clicks";

/// Key of the historical record set
pub const RECORDS_KEY: &str = "pressure_records";

/// Key of the user profile
pub const PROFILE_KEY: &str = "user_profile";

/// Minimal durable key-value capability
pub trait KeyValueStore: Send + Sync {
    /// Value stored under `key`, if any
    fn load(&self, key: &str) -> Result<Option<String>, PressureError>;

    /// Replace the value under `key`
    fn save(&self, key: &str, value: &str) -> Result<(), PressureError>;
}

/// One JSON file per key inside a directory
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `dir`
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, PressureError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn load(&self, key: &str) -> Result<Option<String>, PressureError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PressureError::persistence(key, e)),
        }
    }

    fn save(&self, key: &str, value: &str) -> Result<(), PressureError> {
        // Write then rename so a crash never leaves a half-written aggregate
        let target = self.path_for(key);
        let staging = self.dir.join(format!(".{key}.json.tmp"));
        fs::write(&staging, value).map_err(|e| PressureError::persistence(key, e))?;
        fs::rename(&staging, &target).map_err(|e| PressureError::persistence(key, e))?;
        debug!(key, bytes = value.len(), "aggregate saved");
        Ok(())
    }
}

/// In-process store
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<String>, PressureError> {
        let entries = self.entries.lock().map_err(|_| PressureError::LockPoisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn save(&self, key: &str, value: &str) -> Result<(), PressureError> {
        let mut entries = self.entries.lock().map_err(|_| PressureError::LockPoisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Load and decode the aggregate under `key`, or its default when absent
pub fn load_json<T: DeserializeOwned + Default>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<T, PressureError> {
    match store.load(key)? {
        Some(json) => serde_json::from_str(&json).map_err(|e| PressureError::persistence(key, e)),
        None => Ok(T::default()),
    }
}

/// Encode and save the aggregate under `key`
pub fn save_json<T: Serialize>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), PressureError> {
    let json = serde_json::to_string(value)?;
    store.save(key, &json)
}

/// The three persisted aggregates
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub events: EventStore,
    pub records: RecordSet,
    pub profile: UserProfile,
}

impl Snapshot {
    pub fn load(store: &dyn KeyValueStore) -> Result<Self, PressureError> {
        Ok(Self {
            events: load_json(store, TODAY_CLICKS_KEY)?,
            records: load_json(store, RECORDS_KEY)?,
            profile: load_json(store, PROFILE_KEY)?,
        })
    }

    #[cfg(test)]
    pub fn save(&self, store: &dyn KeyValueStore) -> Result<(), PressureError> {
        save_json(store, RECORDS_KEY, &self.records)?;
        save_json(store, PROFILE_KEY, &self.profile)?;
        save_json(store, TODAY_CLICKS_KEY, &self.events)
    }
}
