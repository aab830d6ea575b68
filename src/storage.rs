//! Storage boundary: a key-addressed blob store.
//!
//! The analysis pipeline treats persistence as an external collaborator
//! behind this trait. Services take the store as a constructor argument,
//! so tests substitute [`MemoryBlobStore`] and embedders plug in object
//! storage. Storage failures are propagated, never retried, by the core.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::Result;

/// Logical bucket a key lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    /// Raw uploaded GPX files
    RawFiles,
    /// Serialized analyzed-track blobs
    AnalyzedTracks,
}

impl Bucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::RawFiles => "raw-files",
            Bucket::AnalyzedTracks => "analyzed-tracks",
        }
    }
}

/// Key-addressed blob storage collaborator.
pub trait BlobStore: Send + Sync {
    fn save(&self, key: &str, bytes: &[u8], bucket: Bucket) -> Result<()>;

    /// `Ok(None)` when the key is absent; errors are reserved for storage
    /// failures, not missing keys.
    fn load(&self, key: &str, bucket: Bucket) -> Result<Option<Vec<u8>>>;

    fn exists(&self, key: &str, bucket: Bucket) -> Result<bool>;

    /// Returns whether the key existed.
    fn delete(&self, key: &str, bucket: Bucket) -> Result<bool>;
}

/// Key of the analyzed blob derived from a raw file key.
pub fn analyzed_key(raw_key: &str) -> String {
    format!("{raw_key}.analyzed.bin")
}

/// In-memory [`BlobStore`] for tests and embedded use.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<(Bucket, String), Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs across all buckets.
    pub fn len(&self) -> usize {
        self.blobs.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BlobStore for MemoryBlobStore {
    fn save(&self, key: &str, bytes: &[u8], bucket: Bucket) -> Result<()> {
        self.blobs
            .lock()
            .unwrap()
            .insert((bucket, key.to_string()), bytes.to_vec());
        Ok(())
    }

    fn load(&self, key: &str, bucket: Bucket) -> Result<Option<Vec<u8>>> {
        Ok(self
            .blobs
            .lock()
            .unwrap()
            .get(&(bucket, key.to_string()))
            .cloned())
    }

    fn exists(&self, key: &str, bucket: Bucket) -> Result<bool> {
        Ok(self
            .blobs
            .lock()
            .unwrap()
            .contains_key(&(bucket, key.to_string())))
    }

    fn delete(&self, key: &str, bucket: Bucket) -> Result<bool> {
        Ok(self
            .blobs
            .lock()
            .unwrap()
            .remove(&(bucket, key.to_string()))
            .is_some())
    }
}
