//! In-memory [`VectorIndex`] for testing.
//!
//! Brute-force cosine similarity over all stored vectors behind a
//! `std::sync::RwLock`, like the SQLite backend but without the trip
//! through BLOB encoding.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::error::Result;

use super::{IndexFilter, IndexStats, VectorIndex, VectorMatch, VectorMetadata};

struct StoredEntry {
    vector: Vec<f32>,
    metadata: VectorMetadata,
}

/// In-memory index backing unit and pipeline tests.
#[derive(Default)]
pub struct InMemoryVectorIndex {
    entries: RwLock<HashMap<String, StoredEntry>>,
}

impl InMemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn upsert(&self, id: &str, vector: &[f32], metadata: &VectorMetadata) -> Result<()> {
        self.entries.write().unwrap().insert(
            id.to_string(),
            StoredEntry {
                vector: vector.to_vec(),
                metadata: metadata.clone(),
            },
        );
        Ok(())
    }

    async fn update_metadata(&self, id: &str, metadata: &VectorMetadata) -> Result<bool> {
        let mut entries = self.entries.write().unwrap();
        match entries.get_mut(id) {
            Some(entry) => {
                entry.metadata = metadata.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.entries.write().unwrap().remove(id).is_some())
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: &IndexFilter,
    ) -> Result<Vec<VectorMatch>> {
        let entries = self.entries.read().unwrap();
        let mut matches: Vec<VectorMatch> = entries
            .iter()
            .filter(|(_, entry)| filter.matches(&entry.metadata))
            .map(|(id, entry)| VectorMatch {
                id: id.clone(),
                score: cosine_similarity(vector, &entry.vector),
                metadata: entry.metadata.clone(),
            })
            .collect();
        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        matches.truncate(top_k);
        Ok(matches)
    }

    async fn list_ids(&self) -> Result<Vec<String>> {
        Ok(self.entries.read().unwrap().keys().cloned().collect())
    }

    async fn stats(&self) -> Result<IndexStats> {
        Ok(IndexStats {
            total_vector_count: self.entries.read().unwrap().len() as u64,
        })
    }
}
