//! Core data models: documents, feedback, and search history.
//!
//! These are the strongly-typed records that flow through the ingestion
//! and retrieval pipeline. The metadata store owns all three record
//! families; the vector index holds a filterable copy of document fields
//! keyed by the same document ID.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Lifecycle state of a document.
///
/// Every document starts at `Processing` and moves to exactly one terminal
/// state. Only `Processed` documents are discoverable by search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Processing,
    Processed,
    Failed,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Processing => "processing",
            DocumentStatus::Processed => "processed",
            DocumentStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "processing" => Ok(DocumentStatus::Processing),
            "processed" => Ok(DocumentStatus::Processed),
            "failed" => Ok(DocumentStatus::Failed),
            other => Err(Error::InvalidArgument(format!(
                "unknown document status: {other}"
            ))),
        }
    }
}

/// A stored document and its upload/processing metadata.
///
/// `id` is generated at ingestion and never changes; it is the join key
/// into the vector index. `error` is populated only when `status` is
/// `Failed`. `extracted_text` is filled by a successful extraction and
/// backs keyword search and highlighting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: String,
    pub title: String,
    pub category: String,
    pub version: String,
    pub description: Option<String>,
    pub tags: Option<String>,
    pub filename: String,
    pub storage_location: String,
    pub size_bytes: u64,
    pub content_hash: String,
    pub status: DocumentStatus,
    pub error: Option<String>,
    pub extracted_text: Option<String>,
    pub uploaded_at: DateTime<Utc>,
    pub uploaded_by: String,
    pub updated_at: DateTime<Utc>,
    pub updated_by: String,
}

/// Review state of a correction submission.
///
/// `Pending` is the only non-terminal state; once a record is approved or
/// rejected it cannot be re-opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackStatus {
    Pending,
    Approved,
    Rejected,
}

impl FeedbackStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackStatus::Pending => "pending",
            FeedbackStatus::Approved => "approved",
            FeedbackStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(FeedbackStatus::Pending),
            "approved" => Ok(FeedbackStatus::Approved),
            "rejected" => Ok(FeedbackStatus::Rejected),
            other => Err(Error::InvalidArgument(format!(
                "unknown feedback status: {other}"
            ))),
        }
    }
}

/// A correction submitted against a document.
///
/// `document_id` must resolve at creation time; the reference is not
/// re-checked if the document is later deleted. `document_title` is
/// denormalized at submission time for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub id: String,
    pub document_id: String,
    pub document_title: String,
    pub content: String,
    pub correction: String,
    pub status: FeedbackStatus,
    pub submitted_at: DateTime<Utc>,
    pub submitted_by: String,
    pub updated_at: DateTime<Utc>,
    pub updated_by: String,
}

/// Running counters for one normalized query string.
///
/// `success_rate` is derived: `round(successful_count / count * 100)`,
/// recomputed on every update. `successful_count <= count` always holds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHistoryEntry {
    pub query: String,
    pub count: u64,
    pub successful_count: u64,
    pub success_rate: u32,
    pub last_searched_at: DateTime<Utc>,
}

impl SearchHistoryEntry {
    /// A fresh entry for a query's first recorded search.
    pub fn first(query: String, success: bool, at: DateTime<Utc>) -> Self {
        let successful = if success { 1 } else { 0 };
        SearchHistoryEntry {
            query,
            count: 1,
            successful_count: successful,
            success_rate: rounded_percent(successful, 1),
            last_searched_at: at,
        }
    }

    /// Apply one more search outcome, recomputing the derived rate.
    pub fn register(&mut self, success: bool, at: DateTime<Utc>) {
        self.count += 1;
        if success {
            self.successful_count += 1;
        }
        self.success_rate = rounded_percent(self.successful_count, self.count);
        self.last_searched_at = at;
    }
}

/// `round(part / whole * 100)`, `0` when `whole` is zero.
pub fn rounded_percent(part: u64, whole: u64) -> u32 {
    if whole == 0 {
        return 0;
    }
    (part as f64 / whole as f64 * 100.0).round() as u32
}

/// One row of the category distribution report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    pub name: String,
    pub count: u64,
    pub percentage: u32,
}

/// Dashboard-level totals across the store and index.
#[derive(Debug, Clone, Serialize)]
pub struct OverviewStats {
    pub total_documents: u64,
    pub total_searches: u64,
    pub total_feedback: u64,
    pub vector_count: u64,
}

/// Normalize a query for use as a history key: trimmed and lowercased.
pub fn normalize_query(query: &str) -> String {
    query.trim().to_lowercase()
}

/// Normalize a category for case-insensitive filter matching.
pub fn normalize_category(category: &str) -> String {
    category.trim().to_lowercase()
}

/// Normalize a version for filter matching: lowercased with all
/// whitespace removed, so `"5.1"` and `"5 .1"` compare equal.
pub fn normalize_version(version: &str) -> String {
    version
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
}
