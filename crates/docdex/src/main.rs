//! # Docdex CLI (`dex`)
//!
//! The `dex` binary is the operational interface for Docdex. It covers
//! database initialization, document upload and lifecycle management,
//! search, feedback review, analytics, and store/index reconciliation.
//!
//! ## Usage
//!
//! ```bash
//! dex --config ./config/dex.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `dex init` | Create the SQLite database and run schema migrations |
//! | `dex ingest <file>` | Upload a document and run the processing pipeline |
//! | `dex get <id>` | Show a document record |
//! | `dex list` | List all documents, newest first |
//! | `dex update <id>` | Edit a document's descriptive fields |
//! | `dex reprocess <id>` | Re-run the pipeline for a failed document |
//! | `dex delete <id>` | Remove a document, its file, and its vector entry |
//! | `dex search "<query>"` | Search processed documents |
//! | `dex feedback <...>` | Submit, resolve, and list correction feedback |
//! | `dex popular` | Most frequent search queries |
//! | `dex categories` | Category distribution across all documents |
//! | `dex stats` | Document, search, feedback, and vector totals |
//! | `dex reconcile` | Detect (and optionally repair) store/index divergence |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use docdex::config;
use docdex::Service;
use docdex_core::ingest::{DocumentPatch, IngestRequest};
use docdex_core::models::FeedbackStatus;
use docdex_core::reconcile::Repair;
use docdex_core::search::{SearchFilters, SearchMode};

/// Docdex CLI — a document retrieval service for versioned
/// documentation sets.
#[derive(Parser)]
#[command(
    name = "dex",
    about = "Docdex — upload, index, and search versioned documentation",
    version,
    long_about = "Docdex ingests uploaded documents (text, Markdown, HTML, PDF, DOCX), \
    extracts and embeds their content, and answers semantic, keyword, and hybrid search \
    queries with category/version filtering, correction feedback, and query analytics."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/dex.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables
    /// (documents, feedback, search_history, vectors). Idempotent.
    Init,

    /// Upload a document and run the processing pipeline.
    ///
    /// The record is created with status `processing`; check `dex get`
    /// for the terminal state (`processed` or `failed`).
    Ingest {
        /// Path to the file to upload.
        file: PathBuf,

        /// Document title.
        #[arg(long)]
        title: String,

        /// Document category (e.g. `Tutorials`, `API`).
        #[arg(long)]
        category: String,

        /// Product version this document covers (e.g. `5.3`).
        #[arg(long)]
        version: String,

        /// Optional free-text description.
        #[arg(long)]
        description: Option<String>,

        /// Optional comma-separated tags.
        #[arg(long)]
        tags: Option<String>,

        /// Uploader recorded on the audit trail.
        #[arg(long, default_value = "cli")]
        by: String,
    },

    /// Show a document record by ID.
    Get {
        /// Document ID.
        id: String,
    },

    /// List all documents, newest first.
    List {
        /// Maximum number of documents to show.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Edit a document's descriptive fields.
    ///
    /// Also refreshes the vector index's metadata copy so filters see
    /// the new values.
    Update {
        /// Document ID.
        id: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        category: Option<String>,

        #[arg(long)]
        version: Option<String>,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        tags: Option<String>,

        /// Editor recorded on the audit trail.
        #[arg(long, default_value = "cli")]
        by: String,
    },

    /// Re-run the processing pipeline for a document.
    ///
    /// A no-op for already-processed documents unless `--force` is set.
    Reprocess {
        /// Document ID.
        id: String,

        /// Re-run even if the document is already processed.
        #[arg(long)]
        force: bool,
    },

    /// Remove a document, its stored file, and its vector entry.
    Delete {
        /// Document ID.
        id: String,
    },

    /// Search processed documents.
    Search {
        /// The search query string.
        query: String,

        /// Search mode: `keyword`, `semantic`, or `hybrid`.
        #[arg(long, default_value = "hybrid")]
        mode: String,

        /// Restrict to a category (repeatable, case-insensitive).
        #[arg(long = "category")]
        categories: Vec<String>,

        /// Restrict to a version (repeatable, whitespace-insensitive).
        #[arg(long = "version")]
        versions: Vec<String>,
    },

    /// Submit, resolve, and list correction feedback.
    Feedback {
        #[command(subcommand)]
        action: FeedbackAction,
    },

    /// Most frequent search queries with success rates.
    Popular {
        /// Maximum number of queries to show.
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Category distribution across all documents.
    Categories,

    /// Distinct versions across all documents.
    Versions,

    /// Document, search, feedback, and vector totals.
    Stats,

    /// Detect divergence between the record store and vector index.
    Reconcile {
        /// Repair: re-ingest documents missing vectors and purge orphan
        /// vector entries. Without this flag the pass only reports.
        #[arg(long)]
        apply: bool,
    },
}

/// Feedback subcommands.
#[derive(Subcommand)]
enum FeedbackAction {
    /// Submit a correction against a document.
    Submit {
        /// ID of the document the correction applies to.
        document_id: String,

        /// What is inaccurate.
        #[arg(long)]
        content: String,

        /// The proposed fix.
        #[arg(long)]
        correction: String,

        /// Submitter recorded on the audit trail.
        #[arg(long, default_value = "cli")]
        by: String,
    },

    /// Resolve a pending feedback record.
    Resolve {
        /// Feedback ID.
        id: String,

        /// Target status: `approved` or `rejected`.
        status: String,

        /// Reviewer recorded on the audit trail.
        #[arg(long, default_value = "cli")]
        by: String,
    },

    /// List all feedback records, newest first.
    List,
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn format_ts(ts: chrono::DateTime<chrono::Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    let service = Service::open(&cfg).await?;

    let result = run(&service, cli.command).await;
    service.close().await;
    result
}

async fn run(service: &Service, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Init => {
            // Service::open already ran the migrations.
            println!("Database initialized successfully.");
        }

        Commands::Ingest {
            file,
            title,
            category,
            version,
            description,
            tags,
            by,
        } => {
            let bytes = std::fs::read(&file)
                .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", file.display()))?;
            let filename = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            let id = service
                .ingestor
                .ingest(IngestRequest {
                    filename,
                    bytes,
                    title,
                    category,
                    version,
                    description,
                    tags,
                    uploaded_by: by,
                })
                .await?;
            let record = service.ingestor.get(&id).await?;

            println!("ingested {}", record.filename);
            println!("  id: {id}");
            println!("  status: {}", record.status.as_str());
            if let Some(error) = &record.error {
                println!("  error: {error}");
            }
        }

        Commands::Get { id } => {
            let record = service.ingestor.get(&id).await?;
            println!("id: {}", record.id);
            println!("title: {}", record.title);
            println!("category: {}", record.category);
            println!("version: {}", record.version);
            if let Some(description) = &record.description {
                println!("description: {description}");
            }
            if let Some(tags) = &record.tags {
                println!("tags: {tags}");
            }
            println!("status: {}", record.status.as_str());
            if let Some(error) = &record.error {
                println!("error: {error}");
            }
            println!("filename: {}", record.filename);
            println!("size: {} bytes", record.size_bytes);
            println!(
                "uploaded: {} by {}",
                format_ts(record.uploaded_at),
                record.uploaded_by
            );
            println!(
                "updated: {} by {}",
                format_ts(record.updated_at),
                record.updated_by
            );
        }

        Commands::List { limit } => {
            let records = match limit {
                Some(limit) => service.ingestor.recent(limit).await?,
                None => service.ingestor.list().await?,
            };
            if records.is_empty() {
                println!("No documents.");
                return Ok(());
            }
            for record in &records {
                println!(
                    "{}  [{}]  {} ({}, {})",
                    record.id,
                    record.status.as_str(),
                    record.title,
                    record.category,
                    record.version
                );
            }
            println!();
            println!("{} document(s)", records.len());
        }

        Commands::Update {
            id,
            title,
            category,
            version,
            description,
            tags,
            by,
        } => {
            let record = service
                .ingestor
                .update_document(
                    &id,
                    DocumentPatch {
                        title,
                        category,
                        version,
                        description,
                        tags,
                    },
                    &by,
                )
                .await?;
            println!("updated {id}");
            println!(
                "  {} ({}, {})",
                record.title, record.category, record.version
            );
        }

        Commands::Reprocess { id, force } => {
            service.ingestor.reprocess(&id, force).await?;
            let record = service.ingestor.get(&id).await?;
            println!("reprocessed {id}: {}", record.status.as_str());
            if let Some(error) = &record.error {
                println!("  error: {error}");
            }
        }

        Commands::Delete { id } => {
            service.ingestor.delete(&id).await?;
            println!("deleted {id}");
        }

        Commands::Search {
            query,
            mode,
            categories,
            versions,
        } => {
            let mode = SearchMode::parse(&mode)?;
            let filters = SearchFilters {
                categories,
                versions,
            };
            let results = service.engine.search(&query, mode, &filters).await?;

            if results.is_empty() {
                println!("No results.");
                return Ok(());
            }
            for (i, result) in results.iter().enumerate() {
                println!(
                    "{}. [{:.2}] {} ({}, {})",
                    i + 1,
                    result.score,
                    result.title,
                    result.category,
                    result.version
                );
                if let Some(snippet) = result.highlights.first() {
                    println!("    excerpt: \"{}\"", snippet.replace('\n', " ").trim());
                }
                println!("    id: {}", result.id);
                println!();
            }
        }

        Commands::Feedback { action } => match action {
            FeedbackAction::Submit {
                document_id,
                content,
                correction,
                by,
            } => {
                let record = service
                    .tracker
                    .submit_feedback(&document_id, &content, &correction, &by)
                    .await?;
                println!("feedback recorded: {}", record.id);
                println!("  document: {} ({})", record.document_title, document_id);
                println!("  status: {}", record.status.as_str());
            }
            FeedbackAction::Resolve { id, status, by } => {
                let status = FeedbackStatus::parse(&status)?;
                let record = service.tracker.set_feedback_status(&id, status, &by).await?;
                println!("feedback {}: {}", record.id, record.status.as_str());
            }
            FeedbackAction::List => {
                let records = service.tracker.list_feedback().await?;
                if records.is_empty() {
                    println!("No feedback.");
                    return Ok(());
                }
                for record in &records {
                    println!(
                        "{}  [{}]  {} — {}",
                        record.id,
                        record.status.as_str(),
                        record.document_title,
                        record.content
                    );
                }
                println!();
                println!("{} feedback record(s)", records.len());
            }
        },

        Commands::Popular { limit } => {
            let entries = service.tracker.popular_queries(limit).await?;
            if entries.is_empty() {
                println!("No searches recorded.");
                return Ok(());
            }
            println!("{:<32} {:>6} {:>9}", "QUERY", "COUNT", "SUCCESS");
            for entry in &entries {
                println!(
                    "{:<32} {:>6} {:>8}%",
                    entry.query, entry.count, entry.success_rate
                );
            }
        }

        Commands::Categories => {
            let distribution = service.tracker.category_distribution().await?;
            if distribution.is_empty() {
                println!("No documents.");
                return Ok(());
            }
            for row in &distribution {
                println!("{}: {} ({}%)", row.name, row.count, row.percentage);
            }
        }

        Commands::Versions => {
            let versions = service.tracker.versions().await?;
            if versions.is_empty() {
                println!("No documents.");
                return Ok(());
            }
            for version in &versions {
                println!("{version}");
            }
        }

        Commands::Stats => {
            let stats = service.tracker.stats().await?;
            println!("documents: {}", stats.total_documents);
            println!("searches: {}", stats.total_searches);
            println!("feedback: {}", stats.total_feedback);
            println!("vectors: {}", stats.vector_count);
        }

        Commands::Reconcile { apply } => {
            let repair = if apply { Repair::Apply } else { Repair::ReportOnly };
            let report = service.ingestor.reconcile(repair).await?;

            if report.is_consistent() {
                println!("store and index are consistent");
                return Ok(());
            }
            for id in &report.missing_vectors {
                println!("missing vector: {id}");
            }
            for id in &report.orphan_vectors {
                println!("orphan vector: {id}");
            }
            for id in &report.reingested {
                println!("re-ingested: {id}");
            }
            for id in &report.purged {
                println!("purged: {id}");
            }
        }
    }

    Ok(())
}
