//! SQLite-backed [`MetadataStore`] implementation.
//!
//! The per-ID atomicity contract maps onto single `UPDATE` statements
//! (status transitions, feedback resolution) and the per-query-key
//! history increment onto a single `INSERT ... ON CONFLICT DO UPDATE`,
//! so no read-modify-write races cross statement boundaries.

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use docdex_core::error::Result;
use docdex_core::models::{
    normalize_query, rounded_percent, DocumentRecord, DocumentStatus, FeedbackRecord,
    FeedbackStatus, SearchHistoryEntry,
};
use docdex_core::store::MetadataStore;

/// SQLite implementation of the [`MetadataStore`] trait.
pub struct SqliteMetadataStore {
    pool: SqlitePool,
}

impl SqliteMetadataStore {
    pub fn new(pool: SqlitePool) -> Self {
        SqliteMetadataStore { pool }
    }
}

fn from_ts(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(ts, 0).unwrap_or(DateTime::UNIX_EPOCH)
}

fn row_to_document(row: &sqlx::sqlite::SqliteRow) -> Result<DocumentRecord> {
    Ok(DocumentRecord {
        id: row.get("id"),
        title: row.get("title"),
        category: row.get("category"),
        version: row.get("version"),
        description: row.get("description"),
        tags: row.get("tags"),
        filename: row.get("filename"),
        storage_location: row.get("storage_location"),
        size_bytes: row.get::<i64, _>("size_bytes") as u64,
        content_hash: row.get("content_hash"),
        status: DocumentStatus::parse(row.get::<String, _>("status").as_str())?,
        error: row.get("error"),
        extracted_text: row.get("extracted_text"),
        uploaded_at: from_ts(row.get("uploaded_at")),
        uploaded_by: row.get("uploaded_by"),
        updated_at: from_ts(row.get("updated_at")),
        updated_by: row.get("updated_by"),
    })
}

fn row_to_feedback(row: &sqlx::sqlite::SqliteRow) -> Result<FeedbackRecord> {
    Ok(FeedbackRecord {
        id: row.get("id"),
        document_id: row.get("document_id"),
        document_title: row.get("document_title"),
        content: row.get("content"),
        correction: row.get("correction"),
        status: FeedbackStatus::parse(row.get::<String, _>("status").as_str())?,
        submitted_at: from_ts(row.get("submitted_at")),
        submitted_by: row.get("submitted_by"),
        updated_at: from_ts(row.get("updated_at")),
        updated_by: row.get("updated_by"),
    })
}

fn row_to_history(row: &sqlx::sqlite::SqliteRow) -> SearchHistoryEntry {
    SearchHistoryEntry {
        query: row.get("query"),
        count: row.get::<i64, _>("count") as u64,
        successful_count: row.get::<i64, _>("successful_count") as u64,
        success_rate: row.get::<i64, _>("success_rate") as u32,
        last_searched_at: from_ts(row.get("last_searched_at")),
    }
}

#[async_trait]
impl MetadataStore for SqliteMetadataStore {
    async fn put_document(&self, record: &DocumentRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO documents
                (id, title, category, version, description, tags, filename,
                 storage_location, size_bytes, content_hash, status, error,
                 extracted_text, uploaded_at, uploaded_by, updated_at, updated_by)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.title)
        .bind(&record.category)
        .bind(&record.version)
        .bind(&record.description)
        .bind(&record.tags)
        .bind(&record.filename)
        .bind(&record.storage_location)
        .bind(record.size_bytes as i64)
        .bind(&record.content_hash)
        .bind(record.status.as_str())
        .bind(&record.error)
        .bind(&record.extracted_text)
        .bind(record.uploaded_at.timestamp())
        .bind(&record.uploaded_by)
        .bind(record.updated_at.timestamp())
        .bind(&record.updated_by)
        .execute(&self.pool)
        .await
        .context("upsert document")?;
        Ok(())
    }

    async fn get_document(&self, id: &str) -> Result<Option<DocumentRecord>> {
        let row = sqlx::query("SELECT * FROM documents WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("fetch document")?;
        row.as_ref().map(row_to_document).transpose()
    }

    async fn delete_document(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("delete document")?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_documents(&self) -> Result<Vec<DocumentRecord>> {
        let rows = sqlx::query("SELECT * FROM documents")
            .fetch_all(&self.pool)
            .await
            .context("list documents")?;
        rows.iter().map(row_to_document).collect()
    }

    async fn set_document_status(
        &self,
        id: &str,
        status: DocumentStatus,
        error: Option<&str>,
        extracted_text: Option<&str>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE documents
            SET status = ?,
                error = ?,
                extracted_text = COALESCE(?, extracted_text),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(status.as_str())
        .bind(error)
        .bind(extracted_text)
        .bind(Utc::now().timestamp())
        .bind(id)
        .execute(&self.pool)
        .await
        .context("update document status")?;
        Ok(result.rows_affected() > 0)
    }

    async fn put_feedback(&self, record: &FeedbackRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO feedback
                (id, document_id, document_title, content, correction, status,
                 submitted_at, submitted_by, updated_at, updated_by)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.document_id)
        .bind(&record.document_title)
        .bind(&record.content)
        .bind(&record.correction)
        .bind(record.status.as_str())
        .bind(record.submitted_at.timestamp())
        .bind(&record.submitted_by)
        .bind(record.updated_at.timestamp())
        .bind(&record.updated_by)
        .execute(&self.pool)
        .await
        .context("insert feedback")?;
        Ok(())
    }

    async fn get_feedback(&self, id: &str) -> Result<Option<FeedbackRecord>> {
        let row = sqlx::query("SELECT * FROM feedback WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("fetch feedback")?;
        row.as_ref().map(row_to_feedback).transpose()
    }

    async fn list_feedback(&self) -> Result<Vec<FeedbackRecord>> {
        let rows = sqlx::query("SELECT * FROM feedback ORDER BY submitted_at DESC, id ASC")
            .fetch_all(&self.pool)
            .await
            .context("list feedback")?;
        rows.iter().map(row_to_feedback).collect()
    }

    async fn set_feedback_status(
        &self,
        id: &str,
        status: FeedbackStatus,
        actor: &str,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        // the status guard makes terminal states one-way
        let result = sqlx::query(
            r#"
            UPDATE feedback
            SET status = ?, updated_at = ?, updated_by = ?
            WHERE id = ? AND status = 'pending'
            "#,
        )
        .bind(status.as_str())
        .bind(at.timestamp())
        .bind(actor)
        .bind(id)
        .execute(&self.pool)
        .await
        .context("update feedback status")?;
        Ok(result.rows_affected() > 0)
    }

    async fn record_search(
        &self,
        query: &str,
        success: bool,
        at: DateTime<Utc>,
    ) -> Result<SearchHistoryEntry> {
        let key = normalize_query(query);
        let successful = if success { 1i64 } else { 0i64 };

        sqlx::query(
            r#"
            INSERT INTO search_history (query, count, successful_count, success_rate, last_searched_at)
            VALUES (?, 1, ?, ?, ?)
            ON CONFLICT(query) DO UPDATE SET
                count = count + 1,
                successful_count = successful_count + excluded.successful_count,
                success_rate = CAST(ROUND((successful_count + excluded.successful_count) * 100.0 / (count + 1)) AS INTEGER),
                last_searched_at = excluded.last_searched_at
            "#,
        )
        .bind(&key)
        .bind(successful)
        .bind(rounded_percent(successful as u64, 1) as i64)
        .bind(at.timestamp())
        .execute(&self.pool)
        .await
        .context("record search")?;

        let row = sqlx::query("SELECT * FROM search_history WHERE query = ?")
            .bind(&key)
            .fetch_one(&self.pool)
            .await
            .context("fetch search history entry")?;
        Ok(row_to_history(&row))
    }

    async fn list_search_history(&self) -> Result<Vec<SearchHistoryEntry>> {
        let rows = sqlx::query("SELECT * FROM search_history")
            .fetch_all(&self.pool)
            .await
            .context("list search history")?;
        Ok(rows.iter().map(row_to_history).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db, migrate};

    async fn store() -> SqliteMetadataStore {
        let pool = db::connect_memory().await.unwrap();
        migrate::run_migrations(&pool).await.unwrap();
        SqliteMetadataStore::new(pool)
    }

    fn record(id: &str) -> DocumentRecord {
        let now = Utc::now();
        DocumentRecord {
            id: id.to_string(),
            title: "Niagara Basics".to_string(),
            category: "Tutorials".to_string(),
            version: "5.3".to_string(),
            description: Some("particles".to_string()),
            tags: None,
            filename: "niagara.md".to_string(),
            storage_location: format!("{id}_niagara.md"),
            size_bytes: 42,
            content_hash: "deadbeef".to_string(),
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
    async fn document_round_trip() {
        let store = store().await;
        store.put_document(&record("d1")).await.unwrap();

        let doc = store.get_document("d1").await.unwrap().unwrap();
        assert_eq!(doc.title, "Niagara Basics");
        assert_eq!(doc.category, "Tutorials");
        assert_eq!(doc.version, "5.3");
        assert_eq!(doc.status, DocumentStatus::Processing);
        assert_eq!(doc.size_bytes, 42);

        assert!(store.delete_document("d1").await.unwrap());
        assert!(store.get_document("d1").await.unwrap().is_none());
        assert!(!store.delete_document("d1").await.unwrap());
    }

    #[tokio::test]
    async fn status_transition_is_conditional_on_existence() {
        let store = store().await;
        store.put_document(&record("d1")).await.unwrap();

        assert!(store
            .set_document_status("d1", DocumentStatus::Failed, Some("no text"), None)
            .await
            .unwrap());
        let doc = store.get_document("d1").await.unwrap().unwrap();
        assert_eq!(doc.status, DocumentStatus::Failed);
        assert_eq!(doc.error.as_deref(), Some("no text"));

        assert!(store
            .set_document_status("d1", DocumentStatus::Processed, None, Some("body"))
            .await
            .unwrap());
        let doc = store.get_document("d1").await.unwrap().unwrap();
        assert!(doc.error.is_none());
        assert_eq!(doc.extracted_text.as_deref(), Some("body"));

        assert!(!store
            .set_document_status("missing", DocumentStatus::Processed, None, None)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn feedback_guard_blocks_second_resolution() {
        let store = store().await;
        let now = Utc::now();
        let feedback = FeedbackRecord {
            id: "f1".to_string(),
            document_id: "d1".to_string(),
            document_title: "Doc".to_string(),
            content: "wrong".to_string(),
            correction: "right".to_string(),
            status: FeedbackStatus::Pending,
            submitted_at: now,
            submitted_by: "user".to_string(),
            updated_at: now,
            updated_by: "user".to_string(),
        };
        store.put_feedback(&feedback).await.unwrap();

        assert!(store
            .set_feedback_status("f1", FeedbackStatus::Approved, "admin", now)
            .await
            .unwrap());
        assert!(!store
            .set_feedback_status("f1", FeedbackStatus::Rejected, "admin", now)
            .await
            .unwrap());

        let stored = store.get_feedback("f1").await.unwrap().unwrap();
        assert_eq!(stored.status, FeedbackStatus::Approved);
        assert_eq!(stored.updated_by, "admin");
    }

    #[tokio::test]
    async fn record_search_upsert_keeps_derived_rate() {
        let store = store().await;
        let at = Utc::now();

        let entry = store.record_search("Landscape", false, at).await.unwrap();
        assert_eq!(entry.query, "landscape");
        assert_eq!(entry.count, 1);
        assert_eq!(entry.success_rate, 0);

        let entry = store.record_search("landscape", true, at).await.unwrap();
        assert_eq!(entry.count, 2);
        assert_eq!(entry.successful_count, 1);
        assert_eq!(entry.success_rate, 50);

        let entry = store.record_search("LANDSCAPE ", true, at).await.unwrap();
        assert_eq!(entry.count, 3);
        assert_eq!(entry.successful_count, 2);
        assert_eq!(entry.success_rate, 67);
    }
}
