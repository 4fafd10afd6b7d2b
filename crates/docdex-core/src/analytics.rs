//! Correction feedback and query analytics.
//!
//! [`Tracker`] is the single analytics component: it owns feedback
//! submission and review, popular-query reporting, category
//! distribution, and dashboard totals. It is constructed once and passed
//! by handle; all counter updates go through the store's atomic
//! operations rather than any ambient global state.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::index::VectorIndex;
use crate::models::{
    rounded_percent, CategoryCount, FeedbackRecord, FeedbackStatus, OverviewStats,
    SearchHistoryEntry,
};
use crate::store::MetadataStore;

/// Feedback and analytics over the metadata store and vector index.
pub struct Tracker {
    store: Arc<dyn MetadataStore>,
    index: Arc<dyn VectorIndex>,
}

impl Tracker {
    pub fn new(store: Arc<dyn MetadataStore>, index: Arc<dyn VectorIndex>) -> Self {
        Tracker { store, index }
    }

    /// Record a correction against an existing document.
    ///
    /// Fails with `NotFound` when `document_id` does not resolve; the
    /// reference is checked only at creation time. The new record starts
    /// `pending`.
    pub async fn submit_feedback(
        &self,
        document_id: &str,
        content: &str,
        correction: &str,
        submitted_by: &str,
    ) -> Result<FeedbackRecord> {
        if content.trim().is_empty() {
            return Err(Error::InvalidArgument(
                "feedback content is required".to_string(),
            ));
        }
        if correction.trim().is_empty() {
            return Err(Error::InvalidArgument(
                "feedback correction is required".to_string(),
            ));
        }

        let document = self
            .store
            .get_document(document_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("document: {document_id}")))?;

        let now = Utc::now();
        let record = FeedbackRecord {
            id: Uuid::new_v4().to_string(),
            document_id: document_id.to_string(),
            document_title: document.title,
            content: content.to_string(),
            correction: correction.to_string(),
            status: FeedbackStatus::Pending,
            submitted_at: now,
            submitted_by: submitted_by.to_string(),
            updated_at: now,
            updated_by: submitted_by.to_string(),
        };
        self.store.put_feedback(&record).await?;
        tracing::info!(feedback = %record.id, document = %document_id, "feedback submitted");
        Ok(record)
    }

    /// Resolve a pending feedback record to `approved` or `rejected`.
    ///
    /// Any other target is `InvalidArgument`; so is re-resolving a record
    /// already in a terminal state. A missing ID is `NotFound`.
    pub async fn set_feedback_status(
        &self,
        feedback_id: &str,
        status: FeedbackStatus,
        actor: &str,
    ) -> Result<FeedbackRecord> {
        if status == FeedbackStatus::Pending {
            return Err(Error::InvalidArgument(
                "feedback can only be resolved to approved or rejected".to_string(),
            ));
        }

        let updated = self
            .store
            .set_feedback_status(feedback_id, status, actor, Utc::now())
            .await?;
        if !updated {
            return match self.store.get_feedback(feedback_id).await? {
                None => Err(Error::NotFound(format!("feedback: {feedback_id}"))),
                Some(record) => Err(Error::InvalidArgument(format!(
                    "feedback {feedback_id} is already {}",
                    record.status.as_str()
                ))),
            };
        }

        self.store
            .get_feedback(feedback_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("feedback: {feedback_id}")))
    }

    /// All feedback records, newest submission first.
    pub async fn list_feedback(&self) -> Result<Vec<FeedbackRecord>> {
        self.store.list_feedback().await
    }

    /// History entries ordered by `count` descending, then query string
    /// ascending for a stable tie-break.
    pub async fn popular_queries(&self, limit: usize) -> Result<Vec<SearchHistoryEntry>> {
        let mut entries = self.store.list_search_history().await?;
        entries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.query.cmp(&b.query)));
        entries.truncate(limit);
        Ok(entries)
    }

    /// Documents of every status grouped by category, with per-category
    /// rounded percentages. Ordered by count descending, then name.
    pub async fn category_distribution(&self) -> Result<Vec<CategoryCount>> {
        let documents = self.store.list_documents().await?;
        let total = documents.len() as u64;

        let mut counts: HashMap<String, u64> = HashMap::new();
        for doc in documents {
            *counts.entry(doc.category).or_insert(0) += 1;
        }

        let mut distribution: Vec<CategoryCount> = counts
            .into_iter()
            .map(|(name, count)| CategoryCount {
                name,
                count,
                percentage: rounded_percent(count, total),
            })
            .collect();
        distribution.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
        Ok(distribution)
    }

    /// Dashboard totals across the store and index.
    pub async fn stats(&self) -> Result<OverviewStats> {
        let total_documents = self.store.list_documents().await?.len() as u64;
        let total_searches = self
            .store
            .list_search_history()
            .await?
            .iter()
            .map(|e| e.count)
            .sum();
        let total_feedback = self.store.list_feedback().await?.len() as u64;
        let vector_count = self.index.stats().await?.total_vector_count;

        Ok(OverviewStats {
            total_documents,
            total_searches,
            total_feedback,
            vector_count,
        })
    }

    /// Distinct categories across all documents, sorted.
    pub async fn categories(&self) -> Result<Vec<String>> {
        let mut categories: Vec<String> = self
            .store
            .list_documents()
            .await?
            .into_iter()
            .map(|d| d.category)
            .collect();
        categories.sort();
        categories.dedup();
        Ok(categories)
    }

    /// Distinct versions across all documents, sorted.
    pub async fn versions(&self) -> Result<Vec<String>> {
        let mut versions: Vec<String> = self
            .store
            .list_documents()
            .await?
            .into_iter()
            .map(|d| d.version)
            .collect();
        versions.sort();
        versions.dedup();
        Ok(versions)
    }
}
