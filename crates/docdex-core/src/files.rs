//! Blob storage for uploaded files.
//!
//! Uploaded bytes are kept so that failed documents can be reprocessed
//! without a re-upload. [`FileStore`] abstracts where they live; the app
//! crate provides the on-disk implementation, [`MemoryFileStore`] backs
//! tests.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{Error, Result};

/// Stores and retrieves the raw bytes of uploaded files.
pub trait FileStore: Send + Sync {
    /// Persist `bytes` under a location derived from `id` and `filename`.
    /// Returns the storage location recorded on the document.
    fn save(&self, id: &str, filename: &str, bytes: &[u8]) -> Result<String>;

    /// Read back the bytes at `location`.
    fn load(&self, location: &str) -> Result<Vec<u8>>;

    /// Remove the file at `location`. Removing an already-absent file is
    /// not an error, so deletes stay idempotent.
    fn remove(&self, location: &str) -> Result<()>;
}

/// In-memory [`FileStore`] for tests.
#[derive(Default)]
pub struct MemoryFileStore {
    files: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FileStore for MemoryFileStore {
    fn save(&self, id: &str, filename: &str, bytes: &[u8]) -> Result<String> {
        let location = format!("{id}_{filename}");
        self.files
            .write()
            .unwrap()
            .insert(location.clone(), bytes.to_vec());
        Ok(location)
    }

    fn load(&self, location: &str) -> Result<Vec<u8>> {
        self.files
            .read()
            .unwrap()
            .get(location)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("stored file: {location}")))
    }

    fn remove(&self, location: &str) -> Result<()> {
        self.files.write().unwrap().remove(location);
        Ok(())
    }
}
