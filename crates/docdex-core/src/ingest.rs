//! Ingestion pipeline orchestration.
//!
//! Drives a document through storage → extraction → embedding → indexing
//! and manages its lifecycle states. The record is persisted with status
//! `processing` before any pipeline work starts, so a crash mid-pipeline
//! leaves a recoverable record rather than silent loss.
//!
//! Pipeline failures after that point are captured onto the record
//! (`status = failed`, `error = ...`), not returned to the caller:
//! [`Ingestor::ingest`] only reports that an ID was created. Callers
//! poll the record to learn the outcome. No partial vector entries are
//! ever written — the index upsert happens only after extraction and
//! embedding both succeed, and `processed` is set only after the upsert.

use std::sync::Arc;

use chrono::Utc;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::embedding::EmbeddingProvider;
use crate::error::{Error, Result};
use crate::extract::{DocumentFormat, TextExtractor};
use crate::files::FileStore;
use crate::index::{VectorIndex, VectorMetadata};
use crate::models::{DocumentRecord, DocumentStatus};
use crate::store::MetadataStore;

/// Everything a client submits with an upload.
#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub title: String,
    pub category: String,
    pub version: String,
    pub description: Option<String>,
    pub tags: Option<String>,
    pub uploaded_by: String,
}

/// Partial edit of a document's descriptive fields.
///
/// `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct DocumentPatch {
    pub title: Option<String>,
    pub category: Option<String>,
    pub version: Option<String>,
    pub description: Option<String>,
    pub tags: Option<String>,
}

/// Coordinates the metadata store, file store, extractor, embedding
/// provider, and vector index for the document lifecycle.
pub struct Ingestor {
    store: Arc<dyn MetadataStore>,
    index: Arc<dyn VectorIndex>,
    files: Arc<dyn FileStore>,
    extractor: Arc<dyn TextExtractor>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl Ingestor {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        index: Arc<dyn VectorIndex>,
        files: Arc<dyn FileStore>,
        extractor: Arc<dyn TextExtractor>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Ingestor {
            store,
            index,
            files,
            extractor,
            embedder,
        }
    }

    pub(crate) fn store(&self) -> &Arc<dyn MetadataStore> {
        &self.store
    }

    pub(crate) fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    /// Accept an upload and run the processing pipeline.
    ///
    /// Returns the new document ID once the record exists. Extraction,
    /// embedding, and indexing failures are recorded on the document,
    /// not raised here; only input validation and the initial persistence
    /// can fail synchronously.
    pub async fn ingest(&self, request: IngestRequest) -> Result<String> {
        validate_required("title", &request.title)?;
        validate_required("category", &request.category)?;
        validate_required("version", &request.version)?;
        validate_required("filename", &request.filename)?;
        validate_required("uploaded_by", &request.uploaded_by)?;
        if request.bytes.is_empty() {
            return Err(Error::InvalidArgument("uploaded file is empty".to_string()));
        }

        let id = Uuid::new_v4().to_string();
        let content_hash = hex_sha256(&request.bytes);
        let storage_location = self.files.save(&id, &request.filename, &request.bytes)?;
        let now = Utc::now();

        let record = DocumentRecord {
            id: id.clone(),
            title: request.title,
            category: request.category,
            version: request.version,
            description: request.description,
            tags: request.tags,
            filename: request.filename,
            storage_location,
            size_bytes: request.bytes.len() as u64,
            content_hash,
            status: DocumentStatus::Processing,
            error: None,
            extracted_text: None,
            uploaded_at: now,
            uploaded_by: request.uploaded_by.clone(),
            updated_at: now,
            updated_by: request.uploaded_by,
        };
        self.store.put_document(&record).await?;
        tracing::info!(id = %record.id, title = %record.title, "document record created");

        self.run_pipeline(&record, &request.bytes).await?;
        Ok(id)
    }

    /// Re-run the pipeline for a document, reading back the stored file.
    ///
    /// Idempotent: an already-`processed` document is left untouched
    /// unless `force` is set. Used for `failed` documents and for
    /// reconciliation repairs.
    pub async fn reprocess(&self, id: &str, force: bool) -> Result<()> {
        let mut record = self.get(id).await?;
        if record.status == DocumentStatus::Processed && !force {
            tracing::debug!(id, "already processed, skipping reprocess");
            return Ok(());
        }

        let bytes = self.files.load(&record.storage_location)?;
        self.store
            .set_document_status(id, DocumentStatus::Processing, None, None)
            .await?;
        record.status = DocumentStatus::Processing;
        record.error = None;

        self.run_pipeline(&record, &bytes).await
    }

    /// Remove the stored file, the metadata record, and the vector entry,
    /// in that order. Each step is attempted even if an earlier one
    /// fails; partial failure surfaces as [`Error::Inconsistent`] so the
    /// remaining divergence is never silently dropped.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let record = self.get(id).await?;

        let mut failures: Vec<String> = Vec::new();
        if let Err(e) = self.files.remove(&record.storage_location) {
            failures.push(format!("file removal: {e}"));
        }
        match self.store.delete_document(id).await {
            Ok(_) => {}
            Err(e) => failures.push(format!("record removal: {e}")),
        }
        match self.index.delete(id).await {
            Ok(_) => {}
            Err(e) => failures.push(format!("vector removal: {e}")),
        }

        if failures.is_empty() {
            tracing::info!(id, "document deleted");
            Ok(())
        } else {
            let detail = failures.join("; ");
            tracing::warn!(id, %detail, "partial delete");
            Err(Error::Inconsistent {
                id: id.to_string(),
                detail,
            })
        }
    }

    /// Edit descriptive fields, stamping the audit trail and refreshing
    /// the vector index's metadata copy for processed documents.
    pub async fn update_document(
        &self,
        id: &str,
        patch: DocumentPatch,
        actor: &str,
    ) -> Result<DocumentRecord> {
        let mut record = self.get(id).await?;

        if let Some(title) = patch.title {
            validate_required("title", &title)?;
            record.title = title;
        }
        if let Some(category) = patch.category {
            validate_required("category", &category)?;
            record.category = category;
        }
        if let Some(version) = patch.version {
            validate_required("version", &version)?;
            record.version = version;
        }
        if let Some(description) = patch.description {
            record.description = Some(description);
        }
        if let Some(tags) = patch.tags {
            record.tags = Some(tags);
        }
        record.updated_at = Utc::now();
        record.updated_by = actor.to_string();

        self.store.put_document(&record).await?;

        if record.status == DocumentStatus::Processed {
            let refreshed = self
                .index
                .update_metadata(id, &VectorMetadata::from_record(&record))
                .await?;
            if !refreshed {
                tracing::warn!(id, "processed document has no vector entry to refresh");
            }
        }
        Ok(record)
    }

    /// Fetch a record, failing with `NotFound` when absent.
    pub async fn get(&self, id: &str) -> Result<DocumentRecord> {
        self.store
            .get_document(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("document: {id}")))
    }

    /// All records, most recent upload first.
    pub async fn list(&self) -> Result<Vec<DocumentRecord>> {
        let mut records = self.store.list_documents().await?;
        records.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at).then(a.id.cmp(&b.id)));
        Ok(records)
    }

    /// The `limit` most recently uploaded records.
    pub async fn recent(&self, limit: usize) -> Result<Vec<DocumentRecord>> {
        let mut records = self.list().await?;
        records.truncate(limit);
        Ok(records)
    }

    /// Extraction → embedding → indexing, with failures captured onto
    /// the record. Only a failure to write the terminal status escapes.
    async fn run_pipeline(&self, record: &DocumentRecord, bytes: &[u8]) -> Result<()> {
        match self.process(record, bytes).await {
            Ok(text) => {
                self.store
                    .set_document_status(
                        &record.id,
                        DocumentStatus::Processed,
                        None,
                        Some(&text),
                    )
                    .await?;
                tracing::info!(id = %record.id, "document processed");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(id = %record.id, error = %e, "document processing failed");
                self.store
                    .set_document_status(
                        &record.id,
                        DocumentStatus::Failed,
                        Some(&e.to_string()),
                        None,
                    )
                    .await?;
                Ok(())
            }
        }
    }

    async fn process(&self, record: &DocumentRecord, bytes: &[u8]) -> Result<String> {
        let format = DocumentFormat::from_filename(&record.filename)?;
        let text = self.extractor.extract(bytes, format)?;
        if text.trim().is_empty() {
            return Err(Error::ExtractionFailed(
                "document contains no extractable text".to_string(),
            ));
        }

        let vector = self.embedder.embed(&text).await?;
        self.index
            .upsert(&record.id, &vector, &VectorMetadata::from_record(record))
            .await?;
        Ok(text)
    }
}

fn validate_required(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::InvalidArgument(format!("{field} is required")));
    }
    Ok(())
}

fn hex_sha256(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbedder;
    use crate::extract::PlainExtractor;
    use crate::files::MemoryFileStore;
    use crate::index::memory::InMemoryVectorIndex;
    use crate::index::IndexFilter;
    use crate::store::memory::InMemoryMetadataStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails the first `failures` embed calls, then behaves like
    /// [`HashEmbedder`].
    struct FlakyEmbedder {
        inner: HashEmbedder,
        failures: usize,
        calls: AtomicUsize,
    }

    impl FlakyEmbedder {
        fn new(failures: usize) -> Self {
            FlakyEmbedder {
                inner: HashEmbedder::new(64),
                failures,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for FlakyEmbedder {
        fn model_name(&self) -> &str {
            "flaky"
        }
        fn dims(&self) -> usize {
            self.inner.dims()
        }
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(Error::ProviderUnavailable("simulated outage".to_string()));
            }
            self.inner.embed(text).await
        }
    }

    struct Fixture {
        store: Arc<InMemoryMetadataStore>,
        index: Arc<InMemoryVectorIndex>,
        files: Arc<MemoryFileStore>,
        ingestor: Ingestor,
    }

    fn fixture_with_embedder(embedder: Arc<dyn EmbeddingProvider>) -> Fixture {
        let store = Arc::new(InMemoryMetadataStore::new());
        let index = Arc::new(InMemoryVectorIndex::new());
        let files = Arc::new(MemoryFileStore::new());
        let ingestor = Ingestor::new(
            store.clone(),
            index.clone(),
            files.clone(),
            Arc::new(PlainExtractor),
            embedder,
        );
        Fixture {
            store,
            index,
            files,
            ingestor,
        }
    }

    fn fixture() -> Fixture {
        fixture_with_embedder(Arc::new(HashEmbedder::new(64)))
    }

    fn request(filename: &str, title: &str) -> IngestRequest {
        IngestRequest {
            filename: filename.to_string(),
            bytes: b"Some document body about level streaming.".to_vec(),
            title: title.to_string(),
            category: "Tutorials".to_string(),
            version: "5.3".to_string(),
            description: None,
            tags: None,
            uploaded_by: "tester".to_string(),
        }
    }

    #[tokio::test]
    async fn ingest_round_trips_submitted_fields() {
        let f = fixture();
        let id = f.ingestor.ingest(request("guide.md", "Level Streaming")).await.unwrap();

        let record = f.ingestor.get(&id).await.unwrap();
        assert_eq!(record.title, "Level Streaming");
        assert_eq!(record.category, "Tutorials");
        assert_eq!(record.version, "5.3");
        assert_eq!(record.status, DocumentStatus::Processed);
        assert!(record.error.is_none());
        assert!(record.extracted_text.is_some());

        assert_eq!(f.index.stats().await.unwrap().total_vector_count, 1);
    }

    #[tokio::test]
    async fn missing_required_field_is_rejected_before_any_record() {
        let f = fixture();
        let mut bad = request("guide.md", "  ");
        bad.title = "  ".to_string();
        assert!(matches!(
            f.ingestor.ingest(bad).await,
            Err(Error::InvalidArgument(_))
        ));
        assert!(f.store.list_documents().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unsupported_format_fails_without_vector_entry() {
        let f = fixture();
        let id = f.ingestor.ingest(request("scene.blend", "Scene")).await.unwrap();

        let record = f.ingestor.get(&id).await.unwrap();
        assert_eq!(record.status, DocumentStatus::Failed);
        assert!(record.error.as_deref().unwrap().contains("unsupported format"));
        assert_eq!(f.index.stats().await.unwrap().total_vector_count, 0);
    }

    #[tokio::test]
    async fn embedding_outage_is_recorded_then_reprocess_recovers() {
        let f = fixture_with_embedder(Arc::new(FlakyEmbedder::new(1)));
        let id = f.ingestor.ingest(request("guide.md", "Guide")).await.unwrap();

        let record = f.ingestor.get(&id).await.unwrap();
        assert_eq!(record.status, DocumentStatus::Failed);
        assert!(record
            .error
            .as_deref()
            .unwrap()
            .contains("provider unavailable"));
        assert_eq!(f.index.stats().await.unwrap().total_vector_count, 0);

        f.ingestor.reprocess(&id, false).await.unwrap();
        let record = f.ingestor.get(&id).await.unwrap();
        assert_eq!(record.status, DocumentStatus::Processed);
        assert_eq!(f.index.stats().await.unwrap().total_vector_count, 1);
    }

    #[tokio::test]
    async fn reprocess_is_a_noop_on_processed_documents() {
        let embedder = Arc::new(FlakyEmbedder::new(0));
        let f = fixture_with_embedder(embedder.clone());
        let id = f.ingestor.ingest(request("guide.md", "Guide")).await.unwrap();
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);

        f.ingestor.reprocess(&id, false).await.unwrap();
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1, "no-op re-ran pipeline");

        f.ingestor.reprocess(&id, true).await.unwrap();
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 2, "force did not re-run");
    }

    #[tokio::test]
    async fn delete_removes_record_vector_and_file() {
        let f = fixture();
        let id = f.ingestor.ingest(request("guide.md", "Guide")).await.unwrap();
        let location = f.ingestor.get(&id).await.unwrap().storage_location;

        f.ingestor.delete(&id).await.unwrap();

        assert!(matches!(f.ingestor.get(&id).await, Err(Error::NotFound(_))));
        assert_eq!(f.index.stats().await.unwrap().total_vector_count, 0);
        assert!(matches!(f.files.load(&location), Err(Error::NotFound(_))));

        assert!(matches!(
            f.ingestor.delete("no-such-id").await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn update_refreshes_index_metadata() {
        let f = fixture();
        let id = f.ingestor.ingest(request("guide.md", "Guide")).await.unwrap();

        let patch = DocumentPatch {
            category: Some("Reference".to_string()),
            ..DocumentPatch::default()
        };
        let updated = f.ingestor.update_document(&id, patch, "editor").await.unwrap();
        assert_eq!(updated.category, "Reference");
        assert_eq!(updated.updated_by, "editor");

        let vector = HashEmbedder::new(64)
            .embed("Some document body about level streaming.")
            .await
            .unwrap();
        let hits = f
            .index
            .query(
                &vector,
                5,
                &IndexFilter::new(&["reference".to_string()], &[]),
            )
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, id);
    }
}
