//! Component wiring.
//!
//! Builds the SQLite-backed stores, the extractor, and the configured
//! embedding provider, and hands the assembled core components to
//! callers. Constructed once per process; the CLI and tests both go
//! through here.

use std::sync::Arc;

use anyhow::Result;
use sqlx::SqlitePool;

use docdex_core::analytics::Tracker;
use docdex_core::embedding::EmbeddingProvider;
use docdex_core::extract::TextExtractor;
use docdex_core::files::FileStore;
use docdex_core::index::VectorIndex;
use docdex_core::ingest::Ingestor;
use docdex_core::search::SearchEngine;
use docdex_core::store::MetadataStore;

use crate::config::Config;
use crate::db;
use crate::embedding::create_provider;
use crate::extract::DocExtractor;
use crate::files::FsFileStore;
use crate::migrate;
use crate::sqlite_index::SqliteVectorIndex;
use crate::sqlite_store::SqliteMetadataStore;

/// The assembled retrieval service.
pub struct Service {
    pool: SqlitePool,
    pub ingestor: Ingestor,
    pub engine: SearchEngine,
    pub tracker: Tracker,
}

impl Service {
    /// Connect to the configured database (running the idempotent
    /// migrations) and assemble all components.
    pub async fn open(config: &Config) -> Result<Service> {
        let pool = db::connect(&config.storage).await?;
        migrate::run_migrations(&pool).await?;
        Service::with_pool(pool, config)
    }

    /// Assemble components over an existing pool. The schema must
    /// already be migrated.
    pub fn with_pool(pool: SqlitePool, config: &Config) -> Result<Service> {
        let store: Arc<dyn MetadataStore> = Arc::new(SqliteMetadataStore::new(pool.clone()));
        let index: Arc<dyn VectorIndex> = Arc::new(SqliteVectorIndex::new(pool.clone()));
        let files: Arc<dyn FileStore> =
            Arc::new(FsFileStore::new(config.storage.files_dir.clone()));
        let extractor: Arc<dyn TextExtractor> = Arc::new(DocExtractor);
        let embedder: Arc<dyn EmbeddingProvider> = create_provider(&config.embedding)?;

        let ingestor = Ingestor::new(
            store.clone(),
            index.clone(),
            files,
            extractor,
            embedder.clone(),
        );
        let engine = SearchEngine::new(
            store.clone(),
            index.clone(),
            embedder,
            config.retrieval.params(),
        );
        let tracker = Tracker::new(store, index);

        Ok(Service {
            pool,
            ingestor,
            engine,
            tracker,
        })
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}
