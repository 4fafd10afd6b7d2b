//! In-memory [`MetadataStore`] implementation for testing.
//!
//! `HashMap`s behind `std::sync::RwLock`. Holding the write lock for the
//! whole of each read-modify-write satisfies the per-ID and per-query-key
//! atomicity contract of the trait.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{
    normalize_query, DocumentRecord, DocumentStatus, FeedbackRecord, FeedbackStatus,
    SearchHistoryEntry,
};

use super::MetadataStore;

/// In-memory store backing unit and pipeline tests.
#[derive(Default)]
pub struct InMemoryMetadataStore {
    documents: RwLock<HashMap<String, DocumentRecord>>,
    feedback: RwLock<HashMap<String, FeedbackRecord>>,
    history: RwLock<HashMap<String, SearchHistoryEntry>>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn put_document(&self, record: &DocumentRecord) -> Result<()> {
        self.documents
            .write()
            .unwrap()
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn get_document(&self, id: &str) -> Result<Option<DocumentRecord>> {
        Ok(self.documents.read().unwrap().get(id).cloned())
    }

    async fn delete_document(&self, id: &str) -> Result<bool> {
        Ok(self.documents.write().unwrap().remove(id).is_some())
    }

    async fn list_documents(&self) -> Result<Vec<DocumentRecord>> {
        Ok(self.documents.read().unwrap().values().cloned().collect())
    }

    async fn set_document_status(
        &self,
        id: &str,
        status: DocumentStatus,
        error: Option<&str>,
        extracted_text: Option<&str>,
    ) -> Result<bool> {
        let mut documents = self.documents.write().unwrap();
        match documents.get_mut(id) {
            Some(record) => {
                record.status = status;
                record.error = error.map(str::to_string);
                if let Some(text) = extracted_text {
                    record.extracted_text = Some(text.to_string());
                }
                record.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn put_feedback(&self, record: &FeedbackRecord) -> Result<()> {
        self.feedback
            .write()
            .unwrap()
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn get_feedback(&self, id: &str) -> Result<Option<FeedbackRecord>> {
        Ok(self.feedback.read().unwrap().get(id).cloned())
    }

    async fn list_feedback(&self) -> Result<Vec<FeedbackRecord>> {
        let mut records: Vec<FeedbackRecord> =
            self.feedback.read().unwrap().values().cloned().collect();
        records.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        Ok(records)
    }

    async fn set_feedback_status(
        &self,
        id: &str,
        status: FeedbackStatus,
        actor: &str,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut feedback = self.feedback.write().unwrap();
        match feedback.get_mut(id) {
            Some(record) if record.status == FeedbackStatus::Pending => {
                record.status = status;
                record.updated_at = at;
                record.updated_by = actor.to_string();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn record_search(
        &self,
        query: &str,
        success: bool,
        at: DateTime<Utc>,
    ) -> Result<SearchHistoryEntry> {
        let key = normalize_query(query);
        let mut history = self.history.write().unwrap();
        let entry = history
            .entry(key.clone())
            .and_modify(|e| e.register(success, at))
            .or_insert_with(|| SearchHistoryEntry::first(key, success, at));
        Ok(entry.clone())
    }

    async fn list_search_history(&self) -> Result<Vec<SearchHistoryEntry>> {
        Ok(self.history.read().unwrap().values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::rounded_percent;

    fn record(id: &str) -> DocumentRecord {
        let now = Utc::now();
        DocumentRecord {
            id: id.to_string(),
            title: "Title".to_string(),
            category: "Tutorials".to_string(),
            version: "5.3".to_string(),
            description: None,
            tags: None,
            filename: "title.md".to_string(),
            storage_location: format!("{id}_title.md"),
            size_bytes: 12,
            content_hash: "abc".to_string(),
            status: DocumentStatus::Processing,
            error: None,
            extracted_text: None,
            uploaded_at: now,
            uploaded_by: "tester".to_string(),
            updated_at: now,
            updated_by: "tester".to_string(),
        }
    }

    #[tokio::test]
    async fn status_update_clears_error() {
        let store = InMemoryMetadataStore::new();
        store.put_document(&record("d1")).await.unwrap();

        store
            .set_document_status("d1", DocumentStatus::Failed, Some("boom"), None)
            .await
            .unwrap();
        let doc = store.get_document("d1").await.unwrap().unwrap();
        assert_eq!(doc.status, DocumentStatus::Failed);
        assert_eq!(doc.error.as_deref(), Some("boom"));

        store
            .set_document_status("d1", DocumentStatus::Processed, None, Some("text"))
            .await
            .unwrap();
        let doc = store.get_document("d1").await.unwrap().unwrap();
        assert_eq!(doc.status, DocumentStatus::Processed);
        assert!(doc.error.is_none());
        assert_eq!(doc.extracted_text.as_deref(), Some("text"));
    }

    #[tokio::test]
    async fn status_update_on_missing_id_reports_absence() {
        let store = InMemoryMetadataStore::new();
        let updated = store
            .set_document_status("nope", DocumentStatus::Processed, None, None)
            .await
            .unwrap();
        assert!(!updated);
    }

    #[tokio::test]
    async fn record_search_normalizes_and_counts() {
        let store = InMemoryMetadataStore::new();
        let at = Utc::now();

        store.record_search("  Blueprint ", true, at).await.unwrap();
        let entry = store.record_search("blueprint", false, at).await.unwrap();

        assert_eq!(entry.query, "blueprint");
        assert_eq!(entry.count, 2);
        assert_eq!(entry.successful_count, 1);
        assert_eq!(entry.success_rate, rounded_percent(1, 2));
    }
}
