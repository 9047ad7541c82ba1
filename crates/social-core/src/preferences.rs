//! Persisted user preferences
//!
//! A [`PreferenceStore`] is a small string key/value store with change
//! notification. [`FilePreferenceStore`] keeps every value in one JSON
//! file and writes it synchronously on each `set`, so a value is on disk
//! before `set` returns. [`ThemePreference`] is the typed view the UI uses.

use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::error::{SocialError, SocialResult};

/// Storage key of the UI theme
pub const THEME_KEY: &str = "ClgVibe-theme";
/// Theme used until the user picks one
pub const DEFAULT_THEME: &str = "coffee";

const CHANGE_CHANNEL_CAPACITY: usize = 16;

/// A value that was just written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreferenceChange {
    pub key: String,
    pub value: String,
}

pub trait PreferenceStore: Send + Sync {
    fn get(&self, key: &str) -> SocialResult<Option<String>>;

    /// Store `value` under `key` and notify subscribers
    fn set(&self, key: &str, value: &str) -> SocialResult<()>;

    fn subscribe(&self) -> broadcast::Receiver<PreferenceChange>;
}

/// In-memory store; nothing survives the process
pub struct MemoryPreferenceStore {
    values: RwLock<HashMap<String, String>>,
    changes: broadcast::Sender<PreferenceChange>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            values: RwLock::new(HashMap::new()),
            changes,
        }
    }
}

impl Default for MemoryPreferenceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn get(&self, key: &str) -> SocialResult<Option<String>> {
        Ok(self.values.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> SocialResult<()> {
        self.values.write().insert(key.to_string(), value.to_string());
        let _ = self.changes.send(PreferenceChange {
            key: key.to_string(),
            value: value.to_string(),
        });
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<PreferenceChange> {
        self.changes.subscribe()
    }
}

/// Store backed by a JSON object on disk
pub struct FilePreferenceStore {
    path: PathBuf,
    values: RwLock<BTreeMap<String, String>>,
    changes: broadcast::Sender<PreferenceChange>,
}

impl FilePreferenceStore {
    /// Open the store at `path`. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> SocialResult<Self> {
        let path = path.into();
        let values = match fs::read_to_string(&path) {
            Ok(raw) if raw.trim().is_empty() => BTreeMap::new(),
            Ok(raw) => serde_json::from_str(&raw).map_err(|e| {
                SocialError::preference(path.display().to_string(), format!("corrupt preference file: {}", e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No preference file yet");
                BTreeMap::new()
            }
            Err(e) => {
                return Err(SocialError::preference(path.display().to_string(), e.to_string()));
            }
        };

        info!(path = %path.display(), entries = values.len(), "Preference store opened");
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Ok(Self {
            path,
            values: RwLock::new(values),
            changes,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, values: &BTreeMap<String, String>, key: &str) -> SocialResult<()> {
        let json = serde_json::to_string_pretty(values)?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| SocialError::preference(key, e.to_string()))?;
            }
        }

        // Atomic replace
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| SocialError::preference(key, e.to_string()))?;
        fs::rename(&tmp, &self.path).map_err(|e| SocialError::preference(key, e.to_string()))
    }
}

impl PreferenceStore for FilePreferenceStore {
    fn get(&self, key: &str) -> SocialResult<Option<String>> {
        Ok(self.values.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> SocialResult<()> {
        let mut values = self.values.write();
        let previous = values.insert(key.to_string(), value.to_string());

        if let Err(e) = self.persist(&values, key) {
            // Roll back the in-memory value
            match previous {
                Some(previous) => values.insert(key.to_string(), previous),
                None => values.remove(key),
            };
            warn!(key, error = %e, "Could not persist preference");
            return Err(e);
        }
        drop(values);

        debug!(key, value, "Preference saved");
        let _ = self.changes.send(PreferenceChange {
            key: key.to_string(),
            value: value.to_string(),
        });
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<PreferenceChange> {
        self.changes.subscribe()
    }
}

/// The UI theme, stored under [`THEME_KEY`]
#[derive(Clone)]
pub struct ThemePreference {
    store: Arc<dyn PreferenceStore>,
    default_theme: String,
}

impl ThemePreference {
    pub fn new(store: Arc<dyn PreferenceStore>) -> Self {
        Self::with_default(store, DEFAULT_THEME)
    }

    pub fn with_default(store: Arc<dyn PreferenceStore>, default_theme: impl Into<String>) -> Self {
        Self {
            store,
            default_theme: default_theme.into(),
        }
    }

    /// The saved theme, or the default when none is saved or the store fails
    pub fn theme(&self) -> String {
        match self.store.get(THEME_KEY) {
            Ok(Some(theme)) if !theme.trim().is_empty() => theme,
            Ok(_) => self.default_theme.clone(),
            Err(e) => {
                warn!(error = %e, "Theme unreadable; using default");
                self.default_theme.clone()
            }
        }
    }

    pub fn set_theme(&self, theme: &str) -> SocialResult<()> {
        if theme.trim().is_empty() {
            return Err(SocialError::preference(THEME_KEY, "theme name must not be empty"));
        }
        self.store.set(THEME_KEY, theme)
    }

    /// Theme changes from now on
    pub fn subscribe(&self) -> ThemeSubscription {
        ThemeSubscription {
            changes: self.store.subscribe(),
        }
    }
}

/// Receives every newly saved theme
pub struct ThemeSubscription {
    changes: broadcast::Receiver<PreferenceChange>,
}

impl ThemeSubscription {
    /// Next theme, or `None` once the store is gone
    pub async fn next(&mut self) -> Option<String> {
        loop {
            match self.changes.recv().await {
                Ok(change) if change.key == THEME_KEY => return Some(change.value),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "Theme subscriber lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
