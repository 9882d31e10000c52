use std::{
    collections::{BTreeMap, HashMap},
    path::{Path, PathBuf},
};

use crate::{config::StoreKeys, PlayerError, Result};

/// Durable key-value store used for the player's persisted flags.
///
/// Values are stored as JSON text so that a boolean reads back as `"true"` or
/// `"false"`, the same shape a browser's local storage would hold.
pub trait PreferenceStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

/// Reads a boolean flag, falling back to `default` when the key is missing or
/// its value cannot be parsed.
pub fn read_flag(store: &dyn PreferenceStore, key: &str, default: bool) -> bool {
    match store.get(key) {
        Ok(Some(raw)) => serde_json::from_str::<bool>(&raw).unwrap_or_else(|err| {
            tracing::warn!(key, %err, "ignoring unreadable stored flag");
            default
        }),
        Ok(None) => default,
        Err(err) => {
            tracing::warn!(key, %err, "preference store unavailable, using default");
            default
        }
    }
}

pub fn write_flag(store: &mut dyn PreferenceStore, key: &str, value: bool) -> Result<()> {
    let raw = serde_json::to_string(&value)?;
    store.set(key, &raw)
}

/// Snapshot of every persisted flag, read once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preferences {
    pub shuffle: bool,
    pub continuous_effects: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            shuffle: true,
            continuous_effects: false,
        }
    }
}

impl Preferences {
    pub fn load(store: &dyn PreferenceStore, keys: &StoreKeys) -> Self {
        let defaults = Self::default();
        Self {
            shuffle: read_flag(store, &keys.shuffle, defaults.shuffle),
            continuous_effects: read_flag(
                store,
                &keys.continuous_effects,
                defaults.continuous_effects,
            ),
        }
    }
}

/// Volatile store, mostly useful in tests and headless runs.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Store persisted as a single JSON object on disk. The whole file is
/// rewritten on every `set`.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl JsonFileStore {
    /// Opens the store at `path`. A missing file is treated as empty.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let values: BTreeMap<String, String> = match std::fs::read_to_string(&path) {
            Ok(raw) if raw.trim().is_empty() => BTreeMap::new(),
            Ok(raw) => serde_json::from_str(&raw).map_err(|err| {
                PlayerError::Store(format!("{} is not a valid store: {err}", path.display()))
            })?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(err.into()),
        };

        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<()> {
        let raw = serde_json::to_string_pretty(&self.values)?;
        std::fs::write(&self.path, raw).map_err(|err| {
            PlayerError::Store(format!("cannot write {}: {err}", self.path.display()))
        })
    }
}

impl PreferenceStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        self.flush()
    }
}
