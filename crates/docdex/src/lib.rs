//! # Docdex
//!
//! **A document retrieval service for versioned documentation sets.**
//!
//! Docdex ingests uploaded documents (plain text, Markdown, HTML, PDF,
//! DOCX), extracts their text, embeds them into a vector index, and
//! answers queries through semantic, keyword, or hybrid search with
//! category/version filtering, highlighted snippets, query analytics,
//! and per-document correction feedback.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────────────┐   ┌──────────────┐
//! │  Upload  │──▶│     Pipeline       │──▶│    SQLite     │
//! │  (file)  │   │ Extract+Embed+Idx │   │ records+vecs │
//! └──────────┘   └───────────────────┘   └──────┬───────┘
//!                                               │
//!                                         ┌─────▼────┐
//!                                         │   CLI    │
//!                                         │  (dex)   │
//!                                         └──────────┘
//! ```
//!
//! ## Data Flow
//!
//! 1. An upload creates a document record with status `processing`
//!    before any pipeline work starts.
//! 2. The **extractor** ([`extract`]) converts the stored bytes to text;
//!    the **embedding provider** ([`embedding`]) turns the text into a
//!    vector; the **vector index** ([`sqlite_index`]) stores it with a
//!    filterable metadata copy.
//! 3. On success the record becomes `processed` and is discoverable;
//!    failures are recorded on the record (`failed` + error) and can be
//!    retried with `dex reprocess`.
//! 4. The **search engine** answers keyword, semantic, and hybrid
//!    queries, updating per-query history counters as a side effect.
//! 5. The **tracker** records correction feedback against documents and
//!    serves popular-query and category-distribution analytics.
//! 6. `dex reconcile` detects and repairs divergence between the record
//!    store and the vector index.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`db`] | SQLite connection pool with WAL mode |
//! | [`migrate`] | Database schema migrations (idempotent) |
//! | [`sqlite_store`] | SQLite-backed metadata store |
//! | [`sqlite_index`] | SQLite-backed vector index |
//! | [`extract`] | Multi-format text extraction (text, HTML, PDF, DOCX) |
//! | [`embedding`] | Embedding providers: local, OpenAI-compatible, disabled |
//! | [`files`] | On-disk storage of uploaded files |
//! | [`service`] | Component wiring |
//!
//! The pipeline, search, and analytics logic itself lives in
//! [`docdex_core`] and is backend-agnostic.

pub mod config;
pub mod db;
pub mod embedding;
pub mod extract;
pub mod files;
pub mod migrate;
pub mod service;
pub mod sqlite_index;
pub mod sqlite_store;

pub use service::Service;
