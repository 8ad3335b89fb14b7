//! `window.localStorage` backend

use web_sys::{window, Storage};

use super::KeyValueStore;
use crate::error::{GameError, Result};

/// Browser `localStorage`, shared by every tab of the origin
#[derive(Debug, Clone)]
pub struct WasmLocalStorage {
    storage: Storage,
}

impl WasmLocalStorage {
    pub fn new() -> Result<Self> {
        let window = window().ok_or_else(|| GameError::Storage("No window".into()))?;
        let storage = window
            .local_storage()
            .map_err(|_| GameError::Storage("localStorage not available".into()))?
            .ok_or_else(|| GameError::Storage("localStorage is null".into()))?;
        Ok(Self { storage })
    }
}

impl KeyValueStore for WasmLocalStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.storage
            .get_item(key)
            .map_err(|e| GameError::Storage(format!("Failed to read {}: {:?}", key, e)))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.storage
            .set_item(key, value)
            .map_err(|e| GameError::Storage(format!("Failed to write {}: {:?}", key, e)))
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.storage
            .remove_item(key)
            .map_err(|e| GameError::Storage(format!("Failed to remove {}: {:?}", key, e)))
    }

    fn keys(&self) -> Result<Vec<String>> {
        let len = self
            .storage
            .length()
            .map_err(|e| GameError::Storage(format!("Failed to enumerate keys: {:?}", e)))?;
        let mut keys = Vec::with_capacity(len as usize);
        for i in 0..len {
            if let Ok(Some(key)) = self.storage.key(i) {
                keys.push(key);
            }
        }
        Ok(keys)
    }
}
