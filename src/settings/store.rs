use super::{Setting, SettingsRepository, UserSettings};
use crate::errors::SettingsError;
use dashmap::DashMap;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Settings keyed by chat id, optionally mirrored to one JSON file.
///
/// Every mutation holds `persist` for the whole read-modify-write, so the
/// file always reflects a complete snapshot of the map.
#[derive(Clone)]
pub struct SettingsStore {
    inner: Arc<DashMap<i64, UserSettings>>,
    defaults: Arc<UserSettings>,
    persist: Arc<Mutex<Option<PathBuf>>>,
}

impl SettingsStore {
    pub fn in_memory(defaults: UserSettings) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            defaults: Arc::new(defaults),
            persist: Arc::new(Mutex::new(None)),
        }
    }

    /// Opens a file-backed store. A missing or unreadable file starts an
    /// empty store; stored records are backfilled from `defaults`.
    pub fn open(path: impl Into<PathBuf>, defaults: UserSettings) -> Self {
        let path = path.into();
        let inner = DashMap::new();

        match read_file(&path) {
            Ok(records) => {
                for (key, record) in records {
                    match key.parse::<i64>() {
                        Ok(chat_id) => {
                            inner.insert(chat_id, backfill(&defaults, record));
                        }
                        Err(_) => tracing::warn!("Skipping settings for invalid chat id {key:?}"),
                    }
                }
                tracing::info!("Loaded settings for {} chats from {}", inner.len(), path.display());
            }
            Err(e) => {
                tracing::warn!("No stored settings at {} ({e}), starting empty", path.display());
            }
        }

        Self {
            inner: Arc::new(inner),
            defaults: Arc::new(defaults),
            persist: Arc::new(Mutex::new(Some(path))),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<PathBuf>> {
        // a panic while holding the lock leaves the map intact, keep going
        self.persist.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Writes the map to `path`, with `pending` overlaid when given so a
    /// value reaches memory only after it reached the file.
    fn save(&self, path: &Path, pending: Option<(i64, &UserSettings)>) -> Result<(), SettingsError> {
        let mut snapshot: BTreeMap<String, UserSettings> = self
            .inner
            .iter()
            .map(|r| (r.key().to_string(), r.value().clone()))
            .collect();
        if let Some((chat_id, settings)) = pending {
            snapshot.insert(chat_id.to_string(), settings.clone());
        }

        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(&snapshot)?)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

impl SettingsRepository for SettingsStore {
    fn get(&self, chat_id: i64) -> UserSettings {
        if let Some(settings) = self.inner.get(&chat_id) {
            return settings.value().clone();
        }

        let guard = self.lock();
        let settings = self
            .inner
            .entry(chat_id)
            .or_insert_with(|| (*self.defaults).clone())
            .value()
            .clone();

        if let Some(path) = guard.as_deref() {
            if let Err(e) = self.save(path, None) {
                tracing::error!("Failed to persist new settings for chat {chat_id}: {e}");
            }
        }
        settings
    }

    fn set(&self, chat_id: i64, setting: Setting) -> Result<UserSettings, SettingsError> {
        let guard = self.lock();

        let mut candidate = match self.inner.get(&chat_id) {
            Some(current) => current.value().clone(),
            None => (*self.defaults).clone(),
        };
        candidate.apply(setting)?;

        if let Some(path) = guard.as_deref() {
            self.save(path, Some((chat_id, &candidate)))?;
        }
        self.inner.insert(chat_id, candidate.clone());
        tracing::debug!("Updated settings for chat {chat_id}");
        Ok(candidate)
    }

    fn snapshot(&self) -> Vec<(i64, UserSettings)> {
        let mut all: Vec<_> = self
            .inner
            .iter()
            .map(|r| (*r.key(), r.value().clone()))
            .collect();
        all.sort_by_key(|(id, _)| *id);
        all
    }
}

fn read_file(path: &Path) -> Result<Map<String, Value>, SettingsError> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

/// Overlays a stored record on the defaults key by key, so records written
/// before a key existed still load.
fn backfill(defaults: &UserSettings, stored: Value) -> UserSettings {
    let Ok(Value::Object(mut merged)) = serde_json::to_value(defaults) else {
        return defaults.clone();
    };

    if let Value::Object(mut record) = stored {
        if let Some(legacy) = record.remove("update_interval") {
            record.entry("interval").or_insert(legacy);
        }
        for (key, value) in record {
            if !merged.contains_key(&key) {
                continue;
            }
            let mut probe = merged.clone();
            probe.insert(key.clone(), value.clone());
            // keep the default when the stored value has the wrong type
            if serde_json::from_value::<UserSettings>(Value::Object(probe)).is_ok() {
                merged.insert(key, value);
            } else {
                tracing::warn!("Ignoring stored setting {key:?} with unexpected value {value}");
            }
        }
    }

    serde_json::from_value(Value::Object(merged)).unwrap_or_else(|_| defaults.clone())
}
