//! In-memory key store.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::MutexGuard;

use crate::dht::Did;
use crate::dht::RingRange;
use crate::error::Error;
use crate::error::Result;

/// Local hashed-key → opaque-value store.
///
/// Request workers and the migration path share it, so one lock guards
/// every read-modify-write. The lock is only held for the duration of a
/// store operation, never across a remote call.
#[derive(Debug, Default)]
pub struct MemKeyStore {
    table: Mutex<HashMap<Did, Vec<u8>>>,
}

impl MemKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<HashMap<Did, Vec<u8>>>> {
        self.table.lock().map_err(|_| Error::SyncLock)
    }

    pub fn get(&self, key: &Did) -> Result<Option<Vec<u8>>> {
        Ok(self.lock()?.get(key).cloned())
    }

    pub fn insert(&self, key: Did, value: Vec<u8>) -> Result<()> {
        self.lock()?.insert(key, value);
        Ok(())
    }

    pub fn remove(&self, key: &Did) -> Result<Option<Vec<u8>>> {
        Ok(self.lock()?.remove(key))
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn keys(&self) -> Result<Vec<Did>> {
        Ok(self.lock()?.keys().copied().collect())
    }

    /// Remove and return every record whose key falls outside `owned`.
    /// One lock hold covers the scan and the removals, so a concurrent
    /// insert cannot slip a record past the migration.
    pub fn evict_outside(&self, owned: &RingRange) -> Result<Vec<(Did, Vec<u8>)>> {
        let mut table = self.lock()?;
        let moved: Vec<Did> = table
            .keys()
            .filter(|key| !owned.contains(**key))
            .copied()
            .collect();
        Ok(moved
            .into_iter()
            .filter_map(|key| table.remove(&key).map(|value| (key, value)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_interface() {
        let store = MemKeyStore::new();
        let key = Did::hash("some key");

        assert_eq!(store.get(&key).unwrap(), None);
        assert!(store.is_empty().unwrap());

        store.insert(key, b"value 1".to_vec()).unwrap();
        assert_eq!(store.get(&key).unwrap(), Some(b"value 1".to_vec()));

        store.insert(key, b"value 2".to_vec()).unwrap();
        assert_eq!(store.get(&key).unwrap(), Some(b"value 2".to_vec()));
        assert_eq!(store.len().unwrap(), 1);

        assert_eq!(store.remove(&key).unwrap(), Some(b"value 2".to_vec()));
        assert_eq!(store.get(&key).unwrap(), None);
    }

    #[test]
    fn test_evict_outside() {
        let store = MemKeyStore::new();
        for n in [9u32, 11, 50, 200, 201] {
            store.insert(Did::from(n), vec![n as u8]).unwrap();
        }

        // Keep (200, 10]; everything else moves out.
        let owned = RingRange::open_closed(Did::from(200u32), Did::from(10u32));
        let mut moved = store.evict_outside(&owned).unwrap();
        moved.sort_by_key(|(key, _)| *key);

        let moved_keys: Vec<Did> = moved.iter().map(|(key, _)| *key).collect();
        assert_eq!(moved_keys, vec![
            Did::from(11u32),
            Did::from(50u32),
            Did::from(200u32),
        ]);
        assert_eq!(store.len().unwrap(), 2);
        assert!(store.get(&Did::from(9u32)).unwrap().is_some());
        assert!(store.get(&Did::from(201u32)).unwrap().is_some());
    }
}
