use std::collections::HashMap;
use std::sync::Mutex;

use serde::{de::DeserializeOwned, Serialize};

/// Byte-level key/value storage the repositories are written against.
///
/// Production runs on the Spin key-value store; the native server and the
/// tests use [`MemoryStore`].
pub trait KvStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>>;
    fn set(&self, key: &str, value: &[u8]) -> anyhow::Result<()>;
    fn delete(&self, key: &str) -> anyhow::Result<()>;

    /// Read-modify-write of one key. `apply` receives the current bytes and
    /// returns the new value, `None` deleting the key. Backends that can hold
    /// a lock across the call make the update atomic; `apply` must not touch
    /// the store itself.
    fn update(
        &self,
        key: &str,
        apply: &mut dyn FnMut(Option<Vec<u8>>) -> anyhow::Result<Option<Vec<u8>>>,
    ) -> anyhow::Result<()> {
        match apply(self.get(key)?)? {
            Some(bytes) => self.set(key, &bytes),
            None => self.delete(key),
        }
    }
}

/// JSON record helpers over any [`KvStore`], including trait objects.
pub trait KvStoreExt {
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> anyhow::Result<Option<T>>;
    fn set_json<T: Serialize>(&self, key: &str, value: &T) -> anyhow::Result<()>;

    /// Atomically edits the JSON value at `key`, starting from `T::default()`
    /// when the key is missing. Returns what `edit` returns.
    fn update_json<T, R, F>(&self, key: &str, edit: F) -> anyhow::Result<R>
    where
        T: DeserializeOwned + Serialize + Default,
        F: FnOnce(&mut T) -> R;
}

fn decode<T: DeserializeOwned>(key: &str, bytes: &[u8]) -> anyhow::Result<T> {
    serde_json::from_slice(bytes).map_err(|e| anyhow::anyhow!("Corrupt record at {}: {}", key, e))
}

impl<S: KvStore + ?Sized> KvStoreExt for S {
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> anyhow::Result<Option<T>> {
        match self.get(key)? {
            Some(bytes) => Ok(Some(decode(key, &bytes)?)),
            None => Ok(None),
        }
    }

    fn set_json<T: Serialize>(&self, key: &str, value: &T) -> anyhow::Result<()> {
        self.set(key, &serde_json::to_vec(value)?)
    }

    fn update_json<T, R, F>(&self, key: &str, edit: F) -> anyhow::Result<R>
    where
        T: DeserializeOwned + Serialize + Default,
        F: FnOnce(&mut T) -> R,
    {
        let mut edit = Some(edit);
        let mut result = None;
        self.update(key, &mut |current: Option<Vec<u8>>| -> anyhow::Result<Option<Vec<u8>>> {
            let mut value: T = match current {
                Some(bytes) => decode(key, &bytes)?,
                None => T::default(),
            };
            let edit = edit
                .take()
                .ok_or_else(|| anyhow::anyhow!("Update of {} applied twice", key))?;
            result = Some(edit(&mut value));
            Ok(Some(serde_json::to_vec(&value)?))
        })?;
        result.ok_or_else(|| anyhow::anyhow!("Update of {} did not run", key))
    }
}

impl KvStore for spin_sdk::key_value::Store {
    fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        spin_sdk::key_value::Store::get(self, key)
            .map_err(|e| anyhow::anyhow!("Key-value get failed for {}: {:?}", key, e))
    }

    fn set(&self, key: &str, value: &[u8]) -> anyhow::Result<()> {
        spin_sdk::key_value::Store::set(self, key, value)
            .map_err(|e| anyhow::anyhow!("Key-value set failed for {}: {:?}", key, e))
    }

    fn delete(&self, key: &str) -> anyhow::Result<()> {
        spin_sdk::key_value::Store::delete(self, key)
            .map_err(|e| anyhow::anyhow!("Key-value delete failed for {}: {:?}", key, e))
    }
}

/// In-process store shared by every worker of the native server. Each
/// operation, `update` included, runs under a single lock acquisition.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> anyhow::Result<std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>>> {
        self.entries
            .lock()
            .map_err(|_| anyhow::anyhow!("Memory store lock poisoned"))
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> anyhow::Result<()> {
        self.lock()?.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }

    fn update(
        &self,
        key: &str,
        apply: &mut dyn FnMut(Option<Vec<u8>>) -> anyhow::Result<Option<Vec<u8>>>,
    ) -> anyhow::Result<()> {
        let mut entries = self.lock()?;
        match apply(entries.get(key).cloned())? {
            Some(bytes) => {
                entries.insert(key.to_string(), bytes);
            }
            None => {
                entries.remove(key);
            }
        }
        Ok(())
    }
}
