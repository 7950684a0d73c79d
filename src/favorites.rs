use anyhow::Result;
use std::collections::HashSet;

use crate::storage::KeyValueStorage;

const STORAGE_KEY: &str = "favorites";

/// A user's liked photos, keyed by content hash.
///
/// Mutations are in-memory only; callers that want them to survive a
/// restart must call `write()` themselves.
pub struct FavoriteStore {
    set: HashSet<String>,
}

impl FavoriteStore {
    /// Loads the persisted membership. A missing or corrupt entry
    /// yields an empty set.
    pub fn load(storage: &KeyValueStorage) -> Self {
        let favorites: Vec<String> = storage.get(STORAGE_KEY).unwrap_or_default();
        Self {
            set: favorites.into_iter().collect(),
        }
    }

    pub fn has(&self, hash: &str) -> bool {
        self.set.contains(hash)
    }

    /// Inserts the hash if absent, removes it if present.
    pub fn toggle(&mut self, hash: &str) {
        if !self.set.remove(hash) {
            self.set.insert(hash.to_string());
        }
    }

    /// No-op when the hash is not a member.
    pub fn remove(&mut self, hash: &str) {
        self.set.remove(hash);
    }

    pub fn size(&self) -> usize {
        self.set.len()
    }

    /// Membership as an unordered sequence.
    pub fn to_array(&self) -> Vec<String> {
        self.set.iter().cloned().collect()
    }

    /// Serializes the full membership to storage, overwriting prior
    /// content.
    pub fn write(&self, storage: &mut KeyValueStorage) -> Result<()> {
        storage.set(STORAGE_KEY, self.to_array());
        storage.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_storage(dir: &tempfile::TempDir) -> KeyValueStorage {
        KeyValueStorage::open(dir.path().join("state.json"))
    }

    #[test]
    fn empty_storage_yields_empty_set() {
        let dir = tempfile::tempdir().unwrap();
        let store = FavoriteStore::load(&empty_storage(&dir));
        assert_eq!(store.size(), 0);
    }

    #[test]
    fn toggle_is_its_own_inverse() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FavoriteStore::load(&empty_storage(&dir));

        store.toggle("cafe1");
        assert!(store.has("cafe1"));
        store.toggle("cafe1");
        assert!(!store.has("cafe1"));
        assert_eq!(store.size(), 0);
    }

    #[test]
    fn remove_is_noop_for_non_member() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FavoriteStore::load(&empty_storage(&dir));

        store.toggle("aaa");
        store.remove("bbb");
        assert_eq!(store.size(), 1);
        store.remove("aaa");
        assert_eq!(store.size(), 0);
    }

    #[test]
    fn mutation_without_write_does_not_persist() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = empty_storage(&dir);

        let mut store = FavoriteStore::load(&storage);
        store.toggle("aaa");
        // No write() here
        drop(store);
        storage.flush().unwrap();

        let reloaded = FavoriteStore::load(&KeyValueStorage::open(dir.path().join("state.json")));
        assert_eq!(reloaded.size(), 0);
    }

    #[test]
    fn write_then_reload_round_trips_membership() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let mut storage = KeyValueStorage::open(&path);

        let mut store = FavoriteStore::load(&storage);
        store.toggle("aaa");
        store.toggle("bbb");
        store.toggle("ccc");
        store.remove("bbb");
        store.write(&mut storage).unwrap();

        let reloaded = FavoriteStore::load(&KeyValueStorage::open(&path));
        assert_eq!(reloaded.size(), 2);
        assert!(reloaded.has("aaa"));
        assert!(reloaded.has("ccc"));
        assert!(!reloaded.has("bbb"));
    }

    #[test]
    fn corrupt_favorites_entry_yields_empty_set() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, br#"{"favorites": "not-an-array"}"#).unwrap();

        let store = FavoriteStore::load(&KeyValueStorage::open(&path));
        assert_eq!(store.size(), 0);
    }
}
