use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::{DailyTargets, IntakeTotals, MealHistoryEntry, MenuDay, RecommendationSet, UserProfile};

pub const USER_PROFILE_KEY: &str = "userProfile";
pub const DAILY_TARGETS_KEY: &str = "dailyTargets";
pub const TDEE_KEY: &str = "tdee";
pub const CURRENT_INTAKE_KEY: &str = "currentIntake";
pub const SAVED_MENUS_KEY: &str = "savedMenus";
pub const MEAL_HISTORY_KEY: &str = "mealHistory";
pub const ONBOARDING_COMPLETE_KEY: &str = "onboardingComplete";
pub const LAST_RECOMMENDATIONS_KEY: &str = "lastRecommendations";

const STORE_FILE_NAME: &str = "store.json";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("stored value for '{key}' is not valid: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("store file {path} is not a JSON object: {source}")]
    CorruptFile {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// String-keyed persistence of JSON text values.
pub trait KeyValueStore: Send {
    fn get_raw(&self, key: &str) -> Option<String>;
    fn set_raw(&mut self, key: &str, value: String) -> Result<(), StoreError>;
    fn remove(&mut self, key: &str) -> Result<(), StoreError>;

    /// Writes several keys as one update. Stores that can persist them
    /// together override this.
    fn set_many(&mut self, entries: Vec<(String, String)>) -> Result<(), StoreError> {
        for (key, value) in entries {
            self.set_raw(&key, value)?;
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get_raw(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set_raw(&mut self, key: &str, value: String) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Keeps every key in a single `store.json` inside the data directory.
///
/// The file is rewritten through a temporary sibling and a rename on every
/// write, so a crash leaves either the old or the new contents.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileStore {
    pub fn open(data_dir: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(data_dir).map_err(|source| StoreError::Io {
            path: data_dir.to_path_buf(),
            source,
        })?;
        let path = data_dir.join(STORE_FILE_NAME);

        let entries = match fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => BTreeMap::new(),
            Ok(content) => serde_json::from_str(&content).map_err(|source| StoreError::CorruptFile {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        debug!(path = %path.display(), keys = entries.len(), "opened file store");

        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let tmp_path = self.path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(entries).map_err(|source| StoreError::CorruptFile {
            path: self.path.clone(),
            source,
        })?;
        fs::write(&tmp_path, content).map_err(|source| StoreError::Io {
            path: tmp_path.clone(),
            source,
        })?;
        fs::rename(&tmp_path, &self.path).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

impl KeyValueStore for FileStore {
    fn get_raw(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set_raw(&mut self, key: &str, value: String) -> Result<(), StoreError> {
        self.set_many(vec![(key.to_string(), value)])
    }

    /// One file rewrite for all entries. Memory is only updated once the
    /// rename succeeded.
    fn set_many(&mut self, entries: Vec<(String, String)>) -> Result<(), StoreError> {
        let mut next = self.entries.clone();
        next.extend(entries);
        self.persist(&next)?;
        self.entries = next;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        if self.entries.contains_key(key) {
            let mut next = self.entries.clone();
            next.remove(key);
            self.persist(&next)?;
            self.entries = next;
        }
        Ok(())
    }
}

/// Typed values collected for a single [`AppStore::commit`].
#[derive(Debug, Default)]
pub struct WriteBatch {
    entries: Vec<(String, String)>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put<T: Serialize>(mut self, key: &str, value: &T) -> Result<Self, StoreError> {
        self.entries.push((key.to_string(), encode(key, value)?));
        Ok(self)
    }
}

fn encode<T: Serialize>(key: &str, value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|source| StoreError::Corrupt {
        key: key.to_string(),
        source,
    })
}

/// Typed access to the planner's keys on top of any [`KeyValueStore`].
pub struct AppStore {
    inner: Box<dyn KeyValueStore>,
}

impl AppStore {
    pub fn new(inner: impl KeyValueStore + 'static) -> Self {
        Self {
            inner: Box::new(inner),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryStore::new())
    }

    pub fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        match self.inner.get_raw(key) {
            None => Ok(None),
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|source| {
                    warn!(key, "stored value failed to parse");
                    StoreError::Corrupt {
                        key: key.to_string(),
                        source,
                    }
                }),
        }
    }

    pub fn write<T: Serialize>(&mut self, key: &str, value: &T) -> Result<(), StoreError> {
        let raw = encode(key, value)?;
        self.inner.set_raw(key, raw)
    }

    /// Writes every value in `batch` or, on error, none of them.
    pub fn commit(&mut self, batch: WriteBatch) -> Result<(), StoreError> {
        self.inner.set_many(batch.entries)
    }

    pub fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.inner.remove(key)
    }

    pub fn user_profile(&self) -> Result<Option<UserProfile>, StoreError> {
        self.read(USER_PROFILE_KEY)
    }

    pub fn set_user_profile(&mut self, profile: &UserProfile) -> Result<(), StoreError> {
        self.write(USER_PROFILE_KEY, profile)
    }

    pub fn daily_targets(&self) -> Result<Option<DailyTargets>, StoreError> {
        self.read(DAILY_TARGETS_KEY)
    }

    pub fn set_daily_targets(&mut self, targets: &DailyTargets) -> Result<(), StoreError> {
        self.write(DAILY_TARGETS_KEY, targets)
    }

    pub fn tdee(&self) -> Result<Option<f64>, StoreError> {
        self.read(TDEE_KEY)
    }

    pub fn set_tdee(&mut self, tdee: f64) -> Result<(), StoreError> {
        self.write(TDEE_KEY, &tdee)
    }

    /// Zero when nothing has been logged yet.
    pub fn current_intake(&self) -> Result<IntakeTotals, StoreError> {
        Ok(self.read(CURRENT_INTAKE_KEY)?.unwrap_or_default())
    }

    pub fn set_current_intake(&mut self, intake: &IntakeTotals) -> Result<(), StoreError> {
        self.write(CURRENT_INTAKE_KEY, intake)
    }

    pub fn saved_menus(&self) -> Result<BTreeMap<String, MenuDay>, StoreError> {
        Ok(self.read(SAVED_MENUS_KEY)?.unwrap_or_default())
    }

    pub fn set_saved_menus(&mut self, menus: &BTreeMap<String, MenuDay>) -> Result<(), StoreError> {
        self.write(SAVED_MENUS_KEY, menus)
    }

    pub fn meal_history(&self) -> Result<Vec<MealHistoryEntry>, StoreError> {
        Ok(self.read(MEAL_HISTORY_KEY)?.unwrap_or_default())
    }

    pub fn onboarding_complete(&self) -> Result<bool, StoreError> {
        Ok(self.read(ONBOARDING_COMPLETE_KEY)?.unwrap_or(false))
    }

    pub fn set_onboarding_complete(&mut self, complete: bool) -> Result<(), StoreError> {
        self.write(ONBOARDING_COMPLETE_KEY, &complete)
    }

    /// Recommendations from the last `recommend` call and the menu date they were built for.
    pub fn last_recommendations(&self) -> Result<Option<(String, RecommendationSet)>, StoreError> {
        self.read(LAST_RECOMMENDATIONS_KEY)
    }

    pub fn set_last_recommendations(&mut self, menu_date: &str, set: &RecommendationSet) -> Result<(), StoreError> {
        self.write(LAST_RECOMMENDATIONS_KEY, &(menu_date, set))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Macros;

    #[test]
    fn test_missing_keys_read_as_defaults() {
        let store = AppStore::in_memory();
        assert!(store.user_profile().unwrap().is_none());
        assert_eq!(store.current_intake().unwrap(), Macros::default());
        assert!(store.saved_menus().unwrap().is_empty());
        assert!(store.meal_history().unwrap().is_empty());
        assert!(!store.onboarding_complete().unwrap());
    }

    #[test]
    fn test_invalid_json_is_reported_as_corrupt() {
        let mut raw = MemoryStore::new();
        raw.set_raw(DAILY_TARGETS_KEY, "{not json".to_string()).unwrap();
        let store = AppStore::new(raw);
        match store.daily_targets() {
            Err(StoreError::Corrupt { key, .. }) => assert_eq!(key, DAILY_TARGETS_KEY),
            other => panic!("expected corrupt error, got {:?}", other),
        }
    }

    #[test]
    fn test_onboarding_flag_reads_bare_true() {
        // Older data dirs hold the flag as the bare text `true`.
        let mut raw = MemoryStore::new();
        raw.set_raw(ONBOARDING_COMPLETE_KEY, "true".to_string()).unwrap();
        let store = AppStore::new(raw);
        assert!(store.onboarding_complete().unwrap());
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut store = AppStore::new(FileStore::open(dir.path()).unwrap());
            store.set_tdee(2450.0).unwrap();
            store.set_current_intake(&Macros::new(500.0, 40.0, 0.0, 0.0)).unwrap();
        }
        let reopened = AppStore::new(FileStore::open(dir.path()).unwrap());
        assert_eq!(reopened.tdee().unwrap(), Some(2450.0));
        assert_eq!(reopened.current_intake().unwrap().protein, 40.0);
        assert!(!dir.path().join("store.json.tmp").exists());
    }

    #[test]
    fn test_file_store_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("store.json"), "[1, 2").unwrap();
        assert!(matches!(
            FileStore::open(dir.path()),
            Err(StoreError::CorruptFile { .. })
        ));
    }

    #[test]
    fn test_commit_persists_every_key_in_one_write() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut store = AppStore::new(FileStore::open(dir.path()).unwrap());
            let batch = WriteBatch::new()
                .put(TDEE_KEY, &2450.0)
                .unwrap()
                .put(CURRENT_INTAKE_KEY, &Macros::new(300.0, 20.0, 0.0, 0.0))
                .unwrap();
            store.commit(batch).unwrap();
        }
        let reopened = AppStore::new(FileStore::open(dir.path()).unwrap());
        assert_eq!(reopened.tdee().unwrap(), Some(2450.0));
        assert_eq!(reopened.current_intake().unwrap().calories, 300.0);
    }

    #[test]
    fn test_failed_commit_changes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("data");
        let mut store = AppStore::new(FileStore::open(&data_dir).unwrap());
        store.set_tdee(2000.0).unwrap();

        std::fs::remove_dir_all(&data_dir).unwrap();
        let batch = WriteBatch::new()
            .put(TDEE_KEY, &3000.0)
            .unwrap()
            .put(CURRENT_INTAKE_KEY, &Macros::new(1.0, 1.0, 1.0, 1.0))
            .unwrap();
        assert!(matches!(store.commit(batch), Err(StoreError::Io { .. })));
        assert_eq!(store.tdee().unwrap(), Some(2000.0));
        assert_eq!(store.current_intake().unwrap(), Macros::default());
    }

    #[test]
    fn test_remove_clears_key() {
        let mut store = AppStore::in_memory();
        store.set_tdee(2000.0).unwrap();
        store.remove(TDEE_KEY).unwrap();
        assert_eq!(store.tdee().unwrap(), None);
    }
}
