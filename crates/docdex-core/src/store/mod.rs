//! Storage abstraction for document, feedback, and search-history records.
//!
//! The [`MetadataStore`] trait defines every persistence operation the
//! pipeline needs, enabling pluggable backends (SQLite in the app crate,
//! in-memory here for tests).
//!
//! # Atomicity contract
//!
//! Implementations must make the read-modify-write operations atomic:
//!
//! - [`set_document_status`](MetadataStore::set_document_status) and
//!   [`set_feedback_status`](MetadataStore::set_feedback_status) are
//!   single conditional updates per ID, so a status transition cannot
//!   race with a concurrent edit of the same record.
//! - [`record_search`](MetadataStore::record_search) is an atomic
//!   upsert-increment per normalized query key; concurrent identical
//!   queries must not lose counts.
//!
//! Operations on distinct IDs never serialize against each other.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{
    DocumentRecord, DocumentStatus, FeedbackRecord, FeedbackStatus, SearchHistoryEntry,
};

/// Abstract storage backend owning all three record families.
///
/// All operations are async (via `async-trait`); in-memory
/// implementations return immediately-ready futures.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Insert or fully replace a document record.
    async fn put_document(&self, record: &DocumentRecord) -> Result<()>;

    /// Fetch a document by ID.
    async fn get_document(&self, id: &str) -> Result<Option<DocumentRecord>>;

    /// Remove a document record. Returns whether a record existed.
    async fn delete_document(&self, id: &str) -> Result<bool>;

    /// Full scan of all document records, in no particular order.
    async fn list_documents(&self) -> Result<Vec<DocumentRecord>>;

    /// Atomically transition a document's lifecycle state.
    ///
    /// Sets `status`, replaces `error` (clearing it when `None`), stores
    /// `extracted_text` when provided, and stamps `updated_at`. Returns
    /// whether the document existed.
    async fn set_document_status(
        &self,
        id: &str,
        status: DocumentStatus,
        error: Option<&str>,
        extracted_text: Option<&str>,
    ) -> Result<bool>;

    /// Insert a feedback record.
    async fn put_feedback(&self, record: &FeedbackRecord) -> Result<()>;

    /// Fetch a feedback record by ID.
    async fn get_feedback(&self, id: &str) -> Result<Option<FeedbackRecord>>;

    /// All feedback records, newest submission first.
    async fn list_feedback(&self) -> Result<Vec<FeedbackRecord>>;

    /// Atomically resolve a pending feedback record.
    ///
    /// The update applies only while the record is still `Pending`;
    /// returns `false` when the record is absent or already terminal,
    /// leaving the caller to distinguish the two.
    async fn set_feedback_status(
        &self,
        id: &str,
        status: FeedbackStatus,
        actor: &str,
        at: DateTime<Utc>,
    ) -> Result<bool>;

    /// Atomically record one search outcome for a normalized query,
    /// creating the history entry on first sight. Returns the updated
    /// entry.
    async fn record_search(
        &self,
        query: &str,
        success: bool,
        at: DateTime<Utc>,
    ) -> Result<SearchHistoryEntry>;

    /// All history entries, in no particular order.
    async fn list_search_history(&self) -> Result<Vec<SearchHistoryEntry>>;
}
