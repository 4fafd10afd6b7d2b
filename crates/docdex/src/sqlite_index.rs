//! SQLite-backed [`VectorIndex`] implementation.
//!
//! Embeddings are stored as little-endian f32 BLOBs alongside a
//! filterable metadata copy. Category/version filters are pushed into
//! SQL over pre-normalized columns; similarity is brute-force cosine in
//! Rust over the filtered candidate rows, like the in-memory reference
//! backend.

use anyhow::Context;
use async_trait::async_trait;
use chrono::DateTime;
use sqlx::{Row, SqlitePool};

use docdex_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use docdex_core::error::Result;
use docdex_core::index::{IndexFilter, IndexStats, VectorIndex, VectorMatch, VectorMetadata};
use docdex_core::models::{normalize_category, normalize_version};

/// SQLite implementation of the [`VectorIndex`] trait.
pub struct SqliteVectorIndex {
    pool: SqlitePool,
}

impl SqliteVectorIndex {
    pub fn new(pool: SqlitePool) -> Self {
        SqliteVectorIndex { pool }
    }
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

fn row_to_metadata(row: &sqlx::sqlite::SqliteRow) -> VectorMetadata {
    VectorMetadata {
        title: row.get("title"),
        category: row.get("category"),
        version: row.get("version"),
        description: row.get("description"),
        tags: row.get("tags"),
        uploaded_at: DateTime::from_timestamp(row.get("uploaded_at"), 0)
            .unwrap_or(DateTime::UNIX_EPOCH),
    }
}

#[async_trait]
impl VectorIndex for SqliteVectorIndex {
    async fn upsert(&self, id: &str, vector: &[f32], metadata: &VectorMetadata) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO vectors
                (id, vector, dims, title, category, category_norm,
                 version, version_norm, description, tags, uploaded_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id)
        .bind(vec_to_blob(vector))
        .bind(vector.len() as i64)
        .bind(&metadata.title)
        .bind(&metadata.category)
        .bind(normalize_category(&metadata.category))
        .bind(&metadata.version)
        .bind(normalize_version(&metadata.version))
        .bind(&metadata.description)
        .bind(&metadata.tags)
        .bind(metadata.uploaded_at.timestamp())
        .execute(&self.pool)
        .await
        .context("upsert vector")?;
        Ok(())
    }

    async fn update_metadata(&self, id: &str, metadata: &VectorMetadata) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE vectors
            SET title = ?, category = ?, category_norm = ?,
                version = ?, version_norm = ?, description = ?, tags = ?,
                uploaded_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&metadata.title)
        .bind(&metadata.category)
        .bind(normalize_category(&metadata.category))
        .bind(&metadata.version)
        .bind(normalize_version(&metadata.version))
        .bind(&metadata.description)
        .bind(&metadata.tags)
        .bind(metadata.uploaded_at.timestamp())
        .bind(id)
        .execute(&self.pool)
        .await
        .context("update vector metadata")?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM vectors WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("delete vector")?;
        Ok(result.rows_affected() > 0)
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: &IndexFilter,
    ) -> Result<Vec<VectorMatch>> {
        let mut sql = String::from(
            "SELECT id, vector, title, category, version, description, tags, uploaded_at FROM vectors",
        );
        let mut clauses: Vec<String> = Vec::new();
        if !filter.categories().is_empty() {
            clauses.push(format!(
                "category_norm IN ({})",
                placeholders(filter.categories().len())
            ));
        }
        if !filter.versions().is_empty() {
            clauses.push(format!(
                "version_norm IN ({})",
                placeholders(filter.versions().len())
            ));
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }

        let mut query = sqlx::query(&sql);
        for category in filter.categories() {
            query = query.bind(category);
        }
        for version in filter.versions() {
            query = query.bind(version);
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .context("query vectors")?;

        let mut matches: Vec<VectorMatch> = rows
            .iter()
            .map(|row| {
                let stored = blob_to_vec(row.get::<Vec<u8>, _>("vector").as_slice());
                VectorMatch {
                    id: row.get("id"),
                    score: cosine_similarity(vector, &stored),
                    metadata: row_to_metadata(row),
                }
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
        let rows = sqlx::query("SELECT id FROM vectors")
            .fetch_all(&self.pool)
            .await
            .context("list vector ids")?;
        Ok(rows.iter().map(|row| row.get("id")).collect())
    }

    async fn stats(&self) -> Result<IndexStats> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM vectors")
            .fetch_one(&self.pool)
            .await
            .context("count vectors")?;
        Ok(IndexStats {
            total_vector_count: count as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db, migrate};
    use chrono::Utc;

    async fn index() -> SqliteVectorIndex {
        let pool = db::connect_memory().await.unwrap();
        migrate::run_migrations(&pool).await.unwrap();
        SqliteVectorIndex::new(pool)
    }

    fn metadata(category: &str, version: &str) -> VectorMetadata {
        VectorMetadata {
            title: "t".to_string(),
            category: category.to_string(),
            version: version.to_string(),
            description: None,
            tags: None,
            uploaded_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn vectors_survive_blob_round_trip() {
        let index = index().await;
        index
            .upsert("a", &[0.5, -0.25, 1.0], &metadata("Tutorials", "5.3"))
            .await
            .unwrap();

        let hits = index
            .query(&[0.5, -0.25, 1.0], 10, &IndexFilter::default())
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert!((hits[0].score - 1.0).abs() < 1e-6);
        assert_eq!(hits[0].metadata.category, "Tutorials");
    }

    #[tokio::test]
    async fn sql_filters_match_normalized_values() {
        let index = index().await;
        index
            .upsert("a", &[1.0, 0.0], &metadata("Tutorials", "5.3"))
            .await
            .unwrap();
        index
            .upsert("b", &[1.0, 0.0], &metadata("API", "5 .1"))
            .await
            .unwrap();

        let hits = index
            .query(
                &[1.0, 0.0],
                10,
                &IndexFilter::new(&["tutorials".to_string()], &[]),
            )
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "a");

        let hits = index
            .query(
                &[1.0, 0.0],
                10,
                &IndexFilter::new(&[], &["5.1".to_string()]),
            )
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "b");
    }

    #[tokio::test]
    async fn delete_update_and_stats() {
        let index = index().await;
        index
            .upsert("a", &[1.0, 0.0], &metadata("API", "5.0"))
            .await
            .unwrap();
        assert_eq!(index.stats().await.unwrap().total_vector_count, 1);
        assert_eq!(index.list_ids().await.unwrap(), vec!["a".to_string()]);

        assert!(index
            .update_metadata("a", &metadata("Reference", "5.0"))
            .await
            .unwrap());
        let hits = index
            .query(
                &[1.0, 0.0],
                10,
                &IndexFilter::new(&["reference".to_string()], &[]),
            )
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);

        assert!(index.delete("a").await.unwrap());
        assert!(!index.delete("a").await.unwrap());
        assert_eq!(index.stats().await.unwrap().total_vector_count, 0);
    }
}
