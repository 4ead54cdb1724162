//! Content-addressed storage boundary for off-chain decision trails.
//!
//! Uploads must be deterministically reproducible: identical canonical
//! JSON input yields the identical content id.

use crate::core::{Error, Result};
use crate::enclave::crypto::keccak256;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// Content-addressed storage boundary.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Store content and return its content id.
    async fn upload(&self, content: &[u8]) -> Result<String>;

    /// Fetch content by id.
    async fn fetch(&self, content_id: &str) -> Result<Vec<u8>>;
}

/// In-memory content store. The content id is the hex keccak256 of the
/// content, so identical input always maps to the identical id.
pub struct MemoryContentStore {
    objects: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryContentStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.objects.read().expect("store lock poisoned").len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryContentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn upload(&self, content: &[u8]) -> Result<String> {
        let content_id = hex::encode(keccak256(content).as_bytes());
        let mut objects = self.objects.write().expect("store lock poisoned");
        objects.insert(content_id.clone(), content.to_vec());
        Ok(content_id)
    }

    async fn fetch(&self, content_id: &str) -> Result<Vec<u8>> {
        let objects = self.objects.read().expect("store lock poisoned");
        objects
            .get(content_id)
            .cloned()
            .ok_or_else(|| Error::Storage(format!("unknown content id {content_id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upload_is_deterministic() {
        let store = MemoryContentStore::new();
        let a = store.upload(b"{\"k\":1}").await.unwrap();
        let b = store.upload(b"{\"k\":1}").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_different_content_different_id() {
        let store = MemoryContentStore::new();
        let a = store.upload(b"{\"k\":1}").await.unwrap();
        let b = store.upload(b"{\"k\":2}").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_fetch_roundtrip() {
        let store = MemoryContentStore::new();
        let id = store.upload(b"payload").await.unwrap();
        assert_eq!(store.fetch(&id).await.unwrap(), b"payload");
    }

    #[tokio::test]
    async fn test_fetch_unknown_id_errors() {
        let store = MemoryContentStore::new();
        assert!(matches!(
            store.fetch("missing").await,
            Err(Error::Storage(_))
        ));
    }
}
