//! Persisted configuration: keys, records, snapshots, and the store seam.
//!
//! DESIGN
//! ======
//! The host persistence area is a JSON key-value store shared by every
//! context. Three keys matter here: `enabled`, `settings`, `exceptions`.
//! Reads and writes are partial (per key); a missing key is normal, not an
//! error, and is covered by defaults at the snapshot layer.
//!
//! Every write notifies subscribers with the set of key names it touched.
//! Notifications carry names only; interested readers re-fetch the full
//! record rather than trusting notification payloads, so a reader can never
//! act on a torn combination of old and new values.
//!
//! ERROR HANDLING
//! ==============
//! Decode failures surface as [`StoreError::Corrupt`] naming the offending
//! key. Readers treat any failed read as "keep the previous state"; the next
//! successful read self-corrects.

#[cfg(test)]
#[path = "store_test.rs"]
mod store_test;

use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tokio::sync::broadcast;
use tracing::debug;

use crate::exceptions::ExceptionSet;
use crate::settings::Settings;

// =============================================================================
// KEYS
// =============================================================================

/// A persisted configuration key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StoreKey {
    /// Global on/off flag (`enabled`).
    Enabled,
    /// Filter parameters (`settings`).
    Settings,
    /// Excepted domains (`exceptions`).
    Exceptions,
}

impl StoreKey {
    /// Every key the render decision depends on.
    pub const ALL: [StoreKey; 3] = [StoreKey::Enabled, StoreKey::Settings, StoreKey::Exceptions];

    /// The key's name in the persisted schema.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Enabled => "enabled",
            Self::Settings => "settings",
            Self::Exceptions => "exceptions",
        }
    }
}

// =============================================================================
// CHANGE SET
// =============================================================================

/// The key names touched by one store write.
///
/// The store is shared with the rest of the host, so a change set may name
/// keys outside this crate's schema; [`ChangeSet::touches_config`] tells
/// readers whether a re-fetch is worth it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChangeSet {
    keys: BTreeSet<String>,
}

impl ChangeSet {
    /// Create an empty change set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a schema key as changed.
    pub fn add(&mut self, key: StoreKey) {
        self.keys.insert(key.as_str().to_string());
    }

    /// Record an arbitrary key name as changed.
    pub fn add_name(&mut self, key: &str) {
        self.keys.insert(key.to_string());
    }

    /// Whether `key` is in the set.
    #[must_use]
    pub fn contains(&self, key: StoreKey) -> bool {
        self.keys.contains(key.as_str())
    }

    /// Whether any of `enabled`, `settings`, `exceptions` changed.
    #[must_use]
    pub fn touches_config(&self) -> bool {
        StoreKey::ALL.iter().any(|key| self.contains(*key))
    }

    /// Returns `true` if no key changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

// =============================================================================
// RECORDS AND SNAPSHOTS
// =============================================================================

/// Partial view of the persisted record. `None` means "key absent".
///
/// Doubles as the write shape: `set` stores present fields and leaves the
/// rest untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreRecord {
    /// Value of `enabled`, if present.
    pub enabled: Option<bool>,
    /// Value of `settings`, if present.
    pub settings: Option<Settings>,
    /// Value of `exceptions`, if present.
    pub exceptions: Option<ExceptionSet>,
}

impl StoreRecord {
    /// Returns `true` if no key is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.enabled.is_none() && self.settings.is_none() && self.exceptions.is_none()
    }

    /// The keys present in this record.
    #[must_use]
    pub fn keys(&self) -> ChangeSet {
        let mut changed = ChangeSet::new();
        if self.enabled.is_some() {
            changed.add(StoreKey::Enabled);
        }
        if self.settings.is_some() {
            changed.add(StoreKey::Settings);
        }
        if self.exceptions.is_some() {
            changed.add(StoreKey::Exceptions);
        }
        changed
    }

    /// Combine two partial reads; present fields of `other` win.
    #[must_use]
    pub fn merge(mut self, other: StoreRecord) -> StoreRecord {
        if other.enabled.is_some() {
            self.enabled = other.enabled;
        }
        if other.settings.is_some() {
            self.settings = other.settings;
        }
        if other.exceptions.is_some() {
            self.exceptions = other.exceptions;
        }
        self
    }
}

/// Fully-defaulted view of the three keys.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigSnapshot {
    /// Whether dark mode is on at all.
    pub enabled: bool,
    /// Current filter parameters.
    pub settings: Settings,
    /// Domains that stay light.
    pub exceptions: ExceptionSet,
}

impl ConfigSnapshot {
    /// Merge a partial record over defaults.
    #[must_use]
    pub fn from_record(record: StoreRecord) -> Self {
        Self {
            enabled: record.enabled.unwrap_or_default(),
            settings: record.settings.unwrap_or_default(),
            exceptions: record.exceptions.unwrap_or_default(),
        }
    }
}

// =============================================================================
// ERRORS
// =============================================================================

/// Error returned by store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The storage backend failed or is unavailable.
    #[error("storage backend failed: {0}")]
    Backend(String),
    /// A stored value does not match the schema for its key.
    #[error("corrupt value for key `{key}`: {source}")]
    Corrupt {
        /// Schema key whose value failed to decode.
        key: &'static str,
        /// The underlying decode failure.
        #[source]
        source: serde_json::Error,
    },
    /// A value could not be serialized for storage.
    #[error("failed to encode value for key `{key}`: {source}")]
    Encode {
        /// Schema key whose value failed to encode.
        key: &'static str,
        /// The underlying encode failure.
        #[source]
        source: serde_json::Error,
    },
}

// =============================================================================
// STORE SEAM
// =============================================================================

/// Host-neutral interface to the persisted configuration area.
///
/// Enables substituting in-memory fakes in tests.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Fetch the requested keys. Absent keys come back as `None`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the backend fails and
    /// [`StoreError::Corrupt`] if a stored value does not decode.
    async fn get(&self, keys: &[StoreKey]) -> Result<StoreRecord, StoreError>;

    /// Write the present keys of `record`, leaving others untouched.
    ///
    /// Subscribers are notified with exactly the keys written.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the backend fails and
    /// [`StoreError::Encode`] if a value does not serialize.
    async fn set(&self, record: StoreRecord) -> Result<(), StoreError>;

    /// Subscribe to change notifications.
    fn subscribe(&self) -> broadcast::Receiver<ChangeSet>;
}

// =============================================================================
// MEMORY STORE
// =============================================================================

const CHANGE_FEED_CAPACITY: usize = 64;

/// In-memory [`ConfigStore`] holding raw JSON values, as a host store would.
///
/// Values stay encoded until read, so corrupt entries surface through the
/// same path they would from a real backend. [`MemoryStore::insert_raw`]
/// plays the part of writers outside this process.
pub struct MemoryStore {
    values: Mutex<HashMap<String, serde_json::Value>>,
    changes: broadcast::Sender<ChangeSet>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        let (changes, _initial_rx) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self { values: Mutex::new(HashMap::new()), changes }
    }

    /// Seed or overwrite one raw key, notifying subscribers.
    ///
    /// Simulates a writer outside this process: another surface, the host's
    /// sync service, or a tool writing values this crate cannot decode.
    pub fn insert_raw(&self, key: &str, value: serde_json::Value) {
        self.lock_values().insert(key.to_string(), value);
        let mut changed = ChangeSet::new();
        changed.add_name(key);
        self.notify(changed);
    }

    /// The raw stored value for `key`, if any.
    ///
    /// The read-side counterpart of [`MemoryStore::insert_raw`], for
    /// asserting on exactly what was persisted.
    #[must_use]
    pub fn raw_value(&self, key: &str) -> Option<serde_json::Value> {
        self.lock_values().get(key).cloned()
    }

    fn lock_values(&self) -> std::sync::MutexGuard<'_, HashMap<String, serde_json::Value>> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, changed: ChangeSet) {
        // A send error only means nothing is subscribed yet.
        if self.changes.send(changed).is_err() {
            debug!("store changed with no subscribers");
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConfigStore for MemoryStore {
    async fn get(&self, keys: &[StoreKey]) -> Result<StoreRecord, StoreError> {
        let values = self.lock_values();
        let mut record = StoreRecord::default();
        for key in keys {
            let Some(value) = values.get(key.as_str()) else {
                continue;
            };
            match key {
                StoreKey::Enabled => record.enabled = Some(decode(*key, value)?),
                StoreKey::Settings => record.settings = Some(decode(*key, value)?),
                StoreKey::Exceptions => record.exceptions = Some(decode(*key, value)?),
            }
        }
        Ok(record)
    }

    async fn set(&self, record: StoreRecord) -> Result<(), StoreError> {
        let changed = record.keys();
        if changed.is_empty() {
            return Ok(());
        }

        // Encode everything before touching the map, so a failed encode
        // leaves no partial write behind.
        let mut pairs: Vec<(&'static str, serde_json::Value)> = Vec::new();
        if let Some(enabled) = record.enabled {
            pairs.push((StoreKey::Enabled.as_str(), serde_json::Value::Bool(enabled)));
        }
        if let Some(settings) = record.settings {
            pairs.push((StoreKey::Settings.as_str(), encode(StoreKey::Settings, &settings)?));
        }
        if let Some(exceptions) = record.exceptions {
            pairs.push((StoreKey::Exceptions.as_str(), encode(StoreKey::Exceptions, &exceptions)?));
        }

        {
            let mut values = self.lock_values();
            for (key, value) in pairs {
                values.insert(key.to_string(), value);
            }
        }

        self.notify(changed);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeSet> {
        self.changes.subscribe()
    }
}

fn decode<T: DeserializeOwned>(key: StoreKey, value: &serde_json::Value) -> Result<T, StoreError> {
    serde_json::from_value(value.clone())
        .map_err(|source| StoreError::Corrupt { key: key.as_str(), source })
}

fn encode<T: serde::Serialize>(key: StoreKey, value: &T) -> Result<serde_json::Value, StoreError> {
    serde_json::to_value(value).map_err(|source| StoreError::Encode { key: key.as_str(), source })
}
