//! Durable locality counter.
//!
//! The locality id groups every observation from one capture run. It is a
//! single integer kept in a key-value medium, advanced by
//! [`CounterStore::allocate_next`] and cleared by [`CounterStore::reset`].
//! A missing or unreadable value counts as zero; a failed commit is always
//! returned to the caller so an unpersisted id is never handed out.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Key under which the locality id is stored.
pub const LOCALITY_KEY: &str = "id_loc";

/// Key-value persistence for integer counters.
pub trait CounterMedium {
    /// Read the value for `key`, or `None` if it was never written.
    ///
    /// # Errors
    ///
    /// Returns an error if the medium cannot be read.
    fn get(&self, key: &str) -> Result<Option<i64>>;

    /// Durably commit `value` for `key`.
    ///
    /// Either the new value lands completely or the previous value is
    /// retained.
    ///
    /// # Errors
    ///
    /// Returns an error if the value could not be committed.
    fn set(&mut self, key: &str, value: i64) -> Result<()>;
}

/// Volatile medium, mostly useful in tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryMedium {
    values: BTreeMap<String, i64>,
}

impl MemoryMedium {
    /// Create an empty medium.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CounterMedium for MemoryMedium {
    fn get(&self, key: &str) -> Result<Option<i64>> {
        Ok(self.values.get(key).copied())
    }

    fn set(&mut self, key: &str, value: i64) -> Result<()> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }
}

/// JSON file medium committed by write-to-temp and rename.
#[derive(Debug, Clone)]
pub struct FileMedium {
    path: PathBuf,
}

impl FileMedium {
    /// Use the file at `path`. Nothing is touched until the first commit.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, i64>> {
        match fs::read_to_string(&self.path) {
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn commit(&self, values: &BTreeMap<String, i64>) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let encoded = serde_json::to_vec_pretty(values)?;
        let temp_path = self.path.with_extension("json.tmp");
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(&encoded)?;
        file.sync_all()?;
        drop(file);

        if let Err(e) = fs::rename(&temp_path, &self.path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e);
        }
        Ok(())
    }
}

impl CounterMedium for FileMedium {
    fn get(&self, key: &str) -> Result<Option<i64>> {
        Ok(self.load()?.get(key).copied())
    }

    fn set(&mut self, key: &str, value: i64) -> Result<()> {
        // A damaged file is replaced wholesale.
        let mut values = self.load().unwrap_or_else(|e| {
            warn!(path = %self.path.display(), error = %e, "Discarding unreadable counter file");
            BTreeMap::new()
        });
        values.insert(key.to_string(), value);
        self.commit(&values)
            .map_err(|source| Error::counter_commit(key, &self.path, source))
    }
}

/// Monotonic locality id allocator over a [`CounterMedium`].
///
/// Calls must be sequential: the read-increment-commit step is not
/// protected against concurrent allocators on the same medium.
#[derive(Debug)]
pub struct CounterStore<M> {
    medium: M,
    key: String,
}

impl<M: CounterMedium> CounterStore<M> {
    /// Create a store for the locality id.
    #[must_use]
    pub fn new(medium: M) -> Self {
        Self::with_key(medium, LOCALITY_KEY)
    }

    /// Create a store for an arbitrary key.
    #[must_use]
    pub fn with_key(medium: M, key: impl Into<String>) -> Self {
        Self {
            medium,
            key: key.into(),
        }
    }

    /// Current stored value, treating a missing, unreadable or negative
    /// value as 0.
    #[must_use]
    pub fn current(&self) -> i64 {
        match self.medium.get(&self.key) {
            Ok(Some(value)) if value < 0 => {
                warn!(key = %self.key, value, "Counter holds a negative value, starting from 0");
                0
            }
            Ok(value) => value.unwrap_or(0),
            Err(e) => {
                warn!(key = %self.key, error = %e, "Counter unreadable, starting from 0");
                0
            }
        }
    }

    /// Allocate the next id and commit it before returning it.
    ///
    /// # Errors
    ///
    /// Returns an error if the incremented value cannot be committed, or
    /// if the counter would overflow.
    pub fn allocate_next(&mut self) -> Result<i64> {
        let next = self
            .current()
            .checked_add(1)
            .ok_or_else(|| Error::CounterOverflow {
                key: self.key.clone(),
            })?;
        self.medium.set(&self.key, next)?;
        debug!(key = %self.key, value = next, "Allocated counter value");
        Ok(next)
    }

    /// Durably set the counter back to zero.
    ///
    /// # Errors
    ///
    /// Returns an error if the reset cannot be committed.
    pub fn reset(&mut self) -> Result<()> {
        self.medium.set(&self.key, 0)?;
        info!(key = %self.key, "Counter reset, next value will be 1");
        Ok(())
    }

    /// Borrow the underlying medium.
    #[must_use]
    pub fn medium(&self) -> &M {
        &self.medium
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Medium whose reads and/or writes always fail.
    #[derive(Debug, Default)]
    struct BrokenMedium {
        fail_get: bool,
        fail_set: bool,
        last_set: Option<i64>,
    }

    impl CounterMedium for BrokenMedium {
        fn get(&self, _key: &str) -> Result<Option<i64>> {
            if self.fail_get {
                return Err(Error::internal("read failed"));
            }
            Ok(self.last_set)
        }

        fn set(&mut self, key: &str, value: i64) -> Result<()> {
            if self.fail_set {
                return Err(Error::counter_commit(
                    key,
                    "/broken",
                    std::io::Error::new(std::io::ErrorKind::Other, "write failed"),
                ));
            }
            self.last_set = Some(value);
            Ok(())
        }
    }

    #[test]
    fn test_allocate_sequence_from_fresh_state() {
        let mut store = CounterStore::new(MemoryMedium::new());
        let ids: Vec<i64> = (0..5).map(|_| store.allocate_next().unwrap()).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        assert_eq!(store.current(), 5);
    }

    #[test]
    fn test_reset_then_allocate_returns_one() {
        let mut store = CounterStore::new(MemoryMedium::new());
        store.allocate_next().unwrap();
        store.allocate_next().unwrap();
        store.reset().unwrap();
        assert_eq!(store.current(), 0);
        assert_eq!(store.allocate_next().unwrap(), 1);
    }

    #[test]
    fn test_unreadable_medium_counts_as_zero() {
        let medium = BrokenMedium {
            fail_get: true,
            ..BrokenMedium::default()
        };
        let mut store = CounterStore::new(medium);
        assert_eq!(store.current(), 0);
        assert_eq!(store.allocate_next().unwrap(), 1);
        assert_eq!(store.medium().last_set, Some(1));
    }

    #[test]
    fn test_negative_value_counts_as_zero() {
        let mut medium = MemoryMedium::new();
        medium.set(LOCALITY_KEY, -3).unwrap();
        let mut store = CounterStore::new(medium);
        assert_eq!(store.current(), 0);
        assert_eq!(store.allocate_next().unwrap(), 1);
        assert_eq!(store.medium().get(LOCALITY_KEY).unwrap(), Some(1));
    }

    #[test]
    fn test_commit_failure_is_surfaced() {
        let medium = BrokenMedium {
            fail_set: true,
            ..BrokenMedium::default()
        };
        let mut store = CounterStore::new(medium);
        let err = store.allocate_next().unwrap_err();
        assert!(err.is_storage_failure());
        assert!(store.reset().is_err());
    }

    #[test]
    fn test_overflow_is_an_error() {
        let mut medium = MemoryMedium::new();
        medium.set(LOCALITY_KEY, i64::MAX).unwrap();
        let mut store = CounterStore::new(medium);
        assert!(matches!(
            store.allocate_next(),
            Err(Error::CounterOverflow { .. })
        ));
        assert_eq!(store.current(), i64::MAX);
    }

    #[test]
    fn test_custom_key_is_independent() {
        let mut medium = MemoryMedium::new();
        medium.set(LOCALITY_KEY, 41).unwrap();
        let mut store = CounterStore::with_key(medium, "other");
        assert_eq!(store.allocate_next().unwrap(), 1);
        assert_eq!(store.medium().get(LOCALITY_KEY).unwrap(), Some(41));
    }

    #[test]
    fn test_file_medium_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nvs").join("counter.json");

        let mut store = CounterStore::new(FileMedium::new(&path));
        assert_eq!(store.allocate_next().unwrap(), 1);
        assert_eq!(store.allocate_next().unwrap(), 2);

        let mut reopened = CounterStore::new(FileMedium::new(&path));
        assert_eq!(reopened.current(), 2);
        assert_eq!(reopened.allocate_next().unwrap(), 3);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_file_medium_missing_file_is_zero() {
        let dir = tempfile::tempdir().unwrap();
        let medium = FileMedium::new(dir.path().join("absent.json"));
        assert_eq!(medium.get(LOCALITY_KEY).unwrap(), None);
        assert_eq!(CounterStore::new(medium).current(), 0);
    }

    #[test]
    fn test_file_medium_corrupt_file_is_zero_and_recovers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("counter.json");
        std::fs::write(&path, "{not json").unwrap();

        let mut store = CounterStore::new(FileMedium::new(&path));
        assert_eq!(store.current(), 0);
        assert_eq!(store.allocate_next().unwrap(), 1);
        assert_eq!(CounterStore::new(FileMedium::new(&path)).current(), 1);
    }

    #[test]
    fn test_file_medium_unwritable_location_fails() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not_a_dir");
        std::fs::write(&blocker, "").unwrap();

        let mut store = CounterStore::new(FileMedium::new(blocker.join("counter.json")));
        let err = store.allocate_next().unwrap_err();
        assert!(matches!(err, Error::CounterCommit { .. }));
    }

    #[test]
    fn test_file_medium_reset_keeps_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("counter.json");
        let mut medium = FileMedium::new(&path);
        medium.set("other", 7).unwrap();

        let mut store = CounterStore::new(medium);
        store.allocate_next().unwrap();
        store.reset().unwrap();

        let medium = FileMedium::new(&path);
        assert_eq!(medium.get(LOCALITY_KEY).unwrap(), Some(0));
        assert_eq!(medium.get("other").unwrap(), Some(7));
    }
}
