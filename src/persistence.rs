//! Flat key-value snapshot of the ledger (and upgrade levels).
//!
//! The store is a plain `key -> number` map so any platform preference store
//! can back it. `JsonFileStore` keeps the map as a single JSON object on
//! disk; `MemoryStore` is for tests and headless runs.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::{Number, Value};
use tracing::{info, warn};

use crate::protocol::{LedgerSnapshot, UpgradeKind};

pub const KEY_CORN: &str = "corn";
pub const KEY_EGGS: &str = "eggs";
pub const KEY_COINS: &str = "coins";
pub const KEY_AGENT_COUNT: &str = "agentCount";
pub const KEY_CORN_RATE: &str = "cornRate";
pub const KEY_EGG_RATE: &str = "eggRate";
pub const KEY_PRICE_RATE: &str = "priceRate";
pub const KEY_SPEED_RATE: &str = "speedRate";

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("snapshot io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("snapshot at {path} is not a flat JSON object: {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Minimal key-value store the snapshot is written through.
pub trait KeyValueStore {
    fn has_key(&self, key: &str) -> bool;
    fn get_int(&self, key: &str) -> Option<u64>;
    fn get_float(&self, key: &str) -> Option<f64>;
    fn set_int(&mut self, key: &str, value: u64);
    fn set_float(&mut self, key: &str, value: f64);
    fn flush(&mut self) -> Result<(), SnapshotError>;
}

fn upgrade_key(kind: UpgradeKind) -> String {
    format!("upgrade.{:?}.level", kind)
}

/// Everything a restart needs beyond the starting configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedGame {
    pub ledger: LedgerSnapshot,
    pub upgrade_levels: Vec<(UpgradeKind, u32)>,
}

/// Write the snapshot keys and flush the store.
pub fn save_game<S: KeyValueStore>(store: &mut S, saved: &SavedGame) -> Result<(), SnapshotError> {
    let ledger = &saved.ledger;
    store.set_int(KEY_CORN, ledger.corn);
    store.set_int(KEY_EGGS, ledger.eggs);
    store.set_int(KEY_COINS, ledger.coins);
    store.set_int(KEY_AGENT_COUNT, ledger.agent_count);
    store.set_float(KEY_CORN_RATE, ledger.corn_rate);
    store.set_float(KEY_EGG_RATE, ledger.egg_rate);
    store.set_float(KEY_PRICE_RATE, ledger.price_rate);
    store.set_float(KEY_SPEED_RATE, ledger.speed_rate);
    for (kind, level) in &saved.upgrade_levels {
        store.set_int(&upgrade_key(*kind), *level as u64);
    }
    store.flush()
}

/// Read a snapshot back. `None` means "no prior save": the `corn` key is the
/// marker for the whole set. Missing rates default to 1.0, missing counts
/// and levels to 0.
pub fn load_game<S: KeyValueStore>(store: &S) -> Option<SavedGame> {
    if !store.has_key(KEY_CORN) {
        return None;
    }
    let int = |key: &str| store.get_int(key).unwrap_or(0);
    let rate = |key: &str| store.get_float(key).unwrap_or(1.0);

    let ledger = LedgerSnapshot {
        corn: int(KEY_CORN),
        eggs: int(KEY_EGGS),
        coins: int(KEY_COINS),
        agent_count: int(KEY_AGENT_COUNT),
        corn_rate: rate(KEY_CORN_RATE),
        egg_rate: rate(KEY_EGG_RATE),
        price_rate: rate(KEY_PRICE_RATE),
        speed_rate: rate(KEY_SPEED_RATE),
    };
    let upgrade_levels = UpgradeKind::ALL
        .iter()
        .map(|kind| (*kind, int(&upgrade_key(*kind)).min(u32::MAX as u64) as u32))
        .collect();

    Some(SavedGame {
        ledger,
        upgrade_levels,
    })
}

// ── In-memory store ─────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: BTreeMap<String, Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn remove(&mut self, key: &str) {
        self.values.remove(key);
    }
}

fn value_as_int(value: &Value) -> Option<u64> {
    value
        .as_u64()
        .or_else(|| value.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64))
}

impl KeyValueStore for MemoryStore {
    fn has_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    fn get_int(&self, key: &str) -> Option<u64> {
        self.values.get(key).and_then(value_as_int)
    }

    fn get_float(&self, key: &str) -> Option<f64> {
        self.values.get(key).and_then(Value::as_f64)
    }

    fn set_int(&mut self, key: &str, value: u64) {
        self.values.insert(key.to_string(), Value::from(value));
    }

    fn set_float(&mut self, key: &str, value: f64) {
        let value = Number::from_f64(value).map(Value::Number).unwrap_or(Value::Null);
        self.values.insert(key.to_string(), value);
    }

    fn flush(&mut self) -> Result<(), SnapshotError> {
        Ok(())
    }
}

// ── JSON file store ─────────────────────────────────────────────────

/// A flat JSON object on disk, loaded once and rewritten on flush.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    inner: MemoryStore,
}

impl JsonFileStore {
    /// Open the store at `path`. A missing file is an empty store; a file
    /// that exists but cannot be read or parsed is an error.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SnapshotError> {
        let path = path.into();
        let values = match std::fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str::<BTreeMap<String, Value>>(&contents)
                .map_err(|source| SnapshotError::Format {
                    path: path.clone(),
                    source,
                })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No save file at {}", path.display());
                BTreeMap::new()
            }
            Err(source) => return Err(SnapshotError::Io { path, source }),
        };
        Ok(Self {
            path,
            inner: MemoryStore { values },
        })
    }

    /// Like [`JsonFileStore::open`], but a corrupt or unreadable file is
    /// logged and treated as empty.
    pub fn open_or_empty(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match Self::open(path.clone()) {
            Ok(store) => store,
            Err(e) => {
                warn!("{}. Starting without a save.", e);
                Self {
                    path,
                    inner: MemoryStore::new(),
                }
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KeyValueStore for JsonFileStore {
    fn has_key(&self, key: &str) -> bool {
        self.inner.has_key(key)
    }

    fn get_int(&self, key: &str) -> Option<u64> {
        self.inner.get_int(key)
    }

    fn get_float(&self, key: &str) -> Option<f64> {
        self.inner.get_float(key)
    }

    fn set_int(&mut self, key: &str, value: u64) {
        self.inner.set_int(key, value);
    }

    fn set_float(&mut self, key: &str, value: f64) {
        self.inner.set_float(key, value);
    }

    fn flush(&mut self) -> Result<(), SnapshotError> {
        let io_err = |source: std::io::Error| SnapshotError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(&self.inner.values).map_err(|source| {
            SnapshotError::Format {
                path: self.path.clone(),
                source,
            }
        })?;
        std::fs::write(&self.path, json).map_err(io_err)?;
        info!("Saved game to {}", self.path.display());
        Ok(())
    }
}
