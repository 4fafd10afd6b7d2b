//! Vector index abstraction.
//!
//! The [`VectorIndex`] owns `(document ID, vector, metadata)` tuples and
//! answers nearest-neighbor queries with metadata filtering. The document
//! ID is a foreign key back into the metadata store; the two are kept
//! consistent by the ingestion orchestrator and the delete path, with the
//! reconciliation pass ([`crate::reconcile`]) as the repair hook — there
//! is no transactional guarantee across them.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{normalize_category, normalize_version, DocumentRecord};

/// Filterable copy of document fields stored alongside each vector.
///
/// Refreshed on document edits; its lifetime mirrors the document record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorMetadata {
    pub title: String,
    pub category: String,
    pub version: String,
    pub description: Option<String>,
    pub tags: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}

impl VectorMetadata {
    pub fn from_record(record: &DocumentRecord) -> Self {
        VectorMetadata {
            title: record.title.clone(),
            category: record.category.clone(),
            version: record.version.clone(),
            description: record.description.clone(),
            tags: record.tags.clone(),
            uploaded_at: record.uploaded_at,
        }
    }
}

/// Category/version restriction applied inside the index.
///
/// Values are held normalized (categories lowercased, versions lowercased
/// with whitespace stripped); empty lists mean "no restriction".
#[derive(Debug, Clone, Default)]
pub struct IndexFilter {
    categories: Vec<String>,
    versions: Vec<String>,
}

impl IndexFilter {
    pub fn new(categories: &[String], versions: &[String]) -> Self {
        IndexFilter {
            categories: categories.iter().map(|c| normalize_category(c)).collect(),
            versions: versions.iter().map(|v| normalize_version(v)).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty() && self.versions.is_empty()
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn versions(&self) -> &[String] {
        &self.versions
    }

    /// Whether a metadata entry passes the filter.
    pub fn matches(&self, metadata: &VectorMetadata) -> bool {
        (self.categories.is_empty()
            || self
                .categories
                .contains(&normalize_category(&metadata.category)))
            && (self.versions.is_empty()
                || self.versions.contains(&normalize_version(&metadata.version)))
    }
}

/// One nearest-neighbor hit.
#[derive(Debug, Clone)]
pub struct VectorMatch {
    pub id: String,
    /// Raw cosine similarity in `[-1.0, 1.0]`.
    pub score: f32,
    pub metadata: VectorMetadata,
}

/// Index-level counters.
#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub total_vector_count: u64,
}

/// Nearest-neighbor store keyed by document ID.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or replace the entry for a document.
    async fn upsert(&self, id: &str, vector: &[f32], metadata: &VectorMetadata) -> Result<()>;

    /// Replace only the metadata copy, keeping the stored vector.
    /// Returns whether an entry existed.
    async fn update_metadata(&self, id: &str, metadata: &VectorMetadata) -> Result<bool>;

    /// Remove the entry for a document. Returns whether one existed.
    async fn delete(&self, id: &str) -> Result<bool>;

    /// Top-`k` entries by cosine similarity to `vector`, restricted to
    /// entries passing `filter`, best first.
    async fn query(&self, vector: &[f32], top_k: usize, filter: &IndexFilter)
        -> Result<Vec<VectorMatch>>;

    /// Every document ID with an entry. Used by reconciliation to find
    /// orphans in either direction.
    async fn list_ids(&self) -> Result<Vec<String>>;

    /// Index counters.
    async fn stats(&self) -> Result<IndexStats>;
}
