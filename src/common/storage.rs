//! Local key/value storage backing the values a node is responsible for.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::{PoisonError, RwLock};

use bytes::Bytes;

use crate::StorageError;

/// Exact-key storage of the values this node holds.
pub trait Storage: Debug + Send + Sync {
    fn get(&self, key: &[u8]) -> Result<Option<Bytes>, StorageError>;

    /// Store a value, overwriting any previous value for the same key.
    fn set(&self, key: &[u8], value: Bytes) -> Result<(), StorageError>;
}

#[derive(Debug, Default)]
/// In-memory [Storage], values are lost when the node shuts down.
pub struct MemoryStorage {
    values: RwLock<HashMap<Bytes, Bytes>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &[u8]) -> Result<Option<Bytes>, StorageError> {
        Ok(self
            .values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    fn set(&self, key: &[u8], value: Bytes) -> Result<(), StorageError> {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(Bytes::copy_from_slice(key), value);

        Ok(())
    }
}
