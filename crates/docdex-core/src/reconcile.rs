//! Reconciliation between the metadata store and the vector index.
//!
//! The two are written in separate operations with no distributed
//! transaction, so a crash between them is an expected failure mode. The
//! scan detects both directions of divergence; repair is
//! operator-triggered and never happens implicitly on the serving path:
//!
//! - a `processed` document without a vector entry is re-ingested
//!   (forced reprocess) or left flagged,
//! - a vector entry whose document record is gone is purged or left
//!   flagged.

use serde::Serialize;
use std::collections::HashSet;

use crate::error::Result;
use crate::index::VectorIndex;
use crate::ingest::Ingestor;
use crate::models::DocumentStatus;
use crate::store::MetadataStore;

/// What to do with detected divergence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repair {
    /// Detect and report only.
    ReportOnly,
    /// Re-run the pipeline for processed documents missing vectors, and
    /// purge orphan vector entries.
    Apply,
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconcileReport {
    /// Documents with `status = processed` but no vector entry.
    pub missing_vectors: Vec<String>,
    /// Vector entries whose document record no longer exists.
    pub orphan_vectors: Vec<String>,
    /// IDs re-ingested by an applied repair.
    pub reingested: Vec<String>,
    /// IDs purged from the index by an applied repair.
    pub purged: Vec<String>,
}

impl ReconcileReport {
    pub fn is_consistent(&self) -> bool {
        self.missing_vectors.is_empty() && self.orphan_vectors.is_empty()
    }
}

/// Compare store and index and report divergence, without repairing.
pub async fn scan(
    store: &dyn MetadataStore,
    index: &dyn VectorIndex,
) -> Result<ReconcileReport> {
    let documents = store.list_documents().await?;
    let indexed: HashSet<String> = index.list_ids().await?.into_iter().collect();
    let known: HashSet<&str> = documents.iter().map(|d| d.id.as_str()).collect();

    let mut report = ReconcileReport::default();
    for doc in &documents {
        if doc.status == DocumentStatus::Processed && !indexed.contains(&doc.id) {
            report.missing_vectors.push(doc.id.clone());
        }
    }
    for id in indexed {
        if !known.contains(id.as_str()) {
            report.orphan_vectors.push(id);
        }
    }
    report.missing_vectors.sort();
    report.orphan_vectors.sort();
    Ok(report)
}

impl Ingestor {
    /// Run a reconciliation pass, optionally applying repairs.
    ///
    /// Repairs are best-effort per ID: a failed re-ingest leaves the
    /// document flagged in the report rather than aborting the pass.
    pub async fn reconcile(&self, repair: Repair) -> Result<ReconcileReport> {
        let mut report = scan(self.store().as_ref(), self.index().as_ref()).await?;
        if repair == Repair::ReportOnly {
            return Ok(report);
        }

        for id in &report.missing_vectors {
            match self.reprocess(id, true).await {
                Ok(()) => {
                    tracing::info!(id, "re-ingested document with missing vector");
                    report.reingested.push(id.clone());
                }
                Err(e) => {
                    tracing::warn!(id, error = %e, "repair re-ingest failed");
                }
            }
        }
        for id in &report.orphan_vectors {
            match self.index().delete(id).await {
                Ok(_) => {
                    tracing::info!(id, "purged orphan vector entry");
                    report.purged.push(id.clone());
                }
                Err(e) => {
                    tracing::warn!(id, error = %e, "orphan purge failed");
                }
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbedder;
    use crate::extract::PlainExtractor;
    use crate::files::MemoryFileStore;
    use crate::index::memory::InMemoryVectorIndex;
    use crate::index::VectorMetadata;
    use crate::ingest::IngestRequest;
    use crate::store::memory::InMemoryMetadataStore;
    use chrono::Utc;
    use std::sync::Arc;

    fn ingestor() -> (Ingestor, Arc<InMemoryMetadataStore>, Arc<InMemoryVectorIndex>) {
        let store = Arc::new(InMemoryMetadataStore::new());
        let index = Arc::new(InMemoryVectorIndex::new());
        let ingestor = Ingestor::new(
            store.clone(),
            index.clone(),
            Arc::new(MemoryFileStore::new()),
            Arc::new(PlainExtractor),
            Arc::new(HashEmbedder::new(64)),
        );
        (ingestor, store, index)
    }

    fn request(title: &str) -> IngestRequest {
        IngestRequest {
            filename: "doc.md".to_string(),
            bytes: b"body text".to_vec(),
            title: title.to_string(),
            category: "Tutorials".to_string(),
            version: "5.3".to_string(),
            description: None,
            tags: None,
            uploaded_by: "tester".to_string(),
        }
    }

    #[tokio::test]
    async fn clean_state_reports_consistent() {
        let (ingestor, _, _) = ingestor();
        ingestor.ingest(request("Doc")).await.unwrap();

        let report = ingestor.reconcile(Repair::ReportOnly).await.unwrap();
        assert!(report.is_consistent());
    }

    #[tokio::test]
    async fn missing_vector_is_detected_and_reingested() {
        let (ingestor, _, index) = ingestor();
        let id = ingestor.ingest(request("Doc")).await.unwrap();

        // simulate a crash between status update and index write
        index.delete(&id).await.unwrap();

        let report = ingestor.reconcile(Repair::ReportOnly).await.unwrap();
        assert_eq!(report.missing_vectors, vec![id.clone()]);
        assert!(report.reingested.is_empty());

        let report = ingestor.reconcile(Repair::Apply).await.unwrap();
        assert_eq!(report.reingested, vec![id]);
        assert_eq!(index.stats().await.unwrap().total_vector_count, 1);
    }

    #[tokio::test]
    async fn orphan_vector_is_detected_and_purged() {
        let (ingestor, _, index) = ingestor();
        let metadata = VectorMetadata {
            title: "ghost".to_string(),
            category: "API".to_string(),
            version: "5.0".to_string(),
            description: None,
            tags: None,
            uploaded_at: Utc::now(),
        };
        index.upsert("ghost-id", &[1.0, 0.0], &metadata).await.unwrap();

        let report = ingestor.reconcile(Repair::Apply).await.unwrap();
        assert_eq!(report.orphan_vectors, vec!["ghost-id".to_string()]);
        assert_eq!(report.purged, vec!["ghost-id".to_string()]);
        assert_eq!(index.stats().await.unwrap().total_vector_count, 0);
    }
}
