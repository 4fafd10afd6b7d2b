//! Search engine with keyword, semantic, and hybrid retrieval modes.
//!
//! The engine operates entirely through the [`MetadataStore`],
//! [`VectorIndex`], and [`EmbeddingProvider`] traits.
//!
//! # Modes
//!
//! - `semantic` — embed the query, nearest-neighbor lookup against the
//!   vector index, cosine similarity clamped to `[0, 1]`.
//! - `keyword` — tiered, deterministic match-quality scoring of the query
//!   against document titles and extracted text (exact > prefix >
//!   substring > all-tokens > phrase-in-text > token-hits-in-text).
//! - `hybrid` — both, merged by document ID with a fixed weighting
//!   (default `0.6 * semantic + 0.4 * keyword`), deduplicated.
//!
//! Only `processed` documents are discoverable. Category filters compare
//! case-insensitively; version filters additionally ignore whitespace.
//! Ties break by most-recent upload, then ID. Every completed call
//! records the outcome in the search history.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::embedding::EmbeddingProvider;
use crate::error::{Error, Result};
use crate::index::{IndexFilter, VectorIndex, VectorMetadata};
use crate::models::{normalize_query, DocumentRecord, DocumentStatus};
use crate::store::MetadataStore;

/// Retrieval strategy for one search call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    Semantic,
    Keyword,
    Hybrid,
}

impl SearchMode {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "semantic" => Ok(SearchMode::Semantic),
            "keyword" => Ok(SearchMode::Keyword),
            "hybrid" => Ok(SearchMode::Hybrid),
            other => Err(Error::InvalidArgument(format!(
                "unknown search mode: {other}. Use semantic, keyword, or hybrid."
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMode::Semantic => "semantic",
            SearchMode::Keyword => "keyword",
            SearchMode::Hybrid => "hybrid",
        }
    }
}

/// Category/version restrictions supplied by the caller, unnormalized.
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    pub categories: Vec<String>,
    pub versions: Vec<String>,
}

/// Retrieval tuning parameters, decoupled from application config.
#[derive(Debug, Clone)]
pub struct SearchParams {
    /// Weight of the semantic score in hybrid mode.
    pub semantic_weight: f64,
    /// Weight of the keyword score in hybrid mode.
    pub keyword_weight: f64,
    /// Nearest-neighbor candidates fetched from the index.
    pub candidate_k: usize,
    /// Maximum results to return.
    pub final_limit: usize,
}

impl Default for SearchParams {
    fn default() -> Self {
        SearchParams {
            semantic_weight: 0.6,
            keyword_weight: 0.4,
            candidate_k: 50,
            final_limit: 10,
        }
    }
}

/// A ranked search hit.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredResult {
    pub id: String,
    pub title: String,
    pub category: String,
    pub version: String,
    /// Relevance in `[0.0, 1.0]`.
    pub score: f64,
    /// Snippets with the query occurrence wrapped in `<mark>` tags.
    pub highlights: Vec<String>,
    pub uploaded_at: DateTime<Utc>,
}

/// Executes queries against the store and index.
pub struct SearchEngine {
    store: Arc<dyn MetadataStore>,
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
    params: SearchParams,
}

struct Candidate {
    record: DocumentRecord,
    semantic: f64,
    keyword: f64,
}

impl SearchEngine {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn EmbeddingProvider>,
        params: SearchParams,
    ) -> Self {
        SearchEngine {
            store,
            index,
            embedder,
            params,
        }
    }

    /// Run one search. Rejects empty queries with `InvalidArgument`;
    /// every completed call updates the history entry for the normalized
    /// query string.
    pub async fn search(
        &self,
        query: &str,
        mode: SearchMode,
        filters: &SearchFilters,
    ) -> Result<Vec<ScoredResult>> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidArgument(
                "search query must not be empty".to_string(),
            ));
        }

        let index_filter = IndexFilter::new(&filters.categories, &filters.versions);
        let mut candidates: HashMap<String, Candidate> = HashMap::new();

        if matches!(mode, SearchMode::Semantic | SearchMode::Hybrid) {
            self.collect_semantic(trimmed, &index_filter, &mut candidates)
                .await?;
        }
        if matches!(mode, SearchMode::Keyword | SearchMode::Hybrid) {
            self.collect_keyword(trimmed, &index_filter, &mut candidates)
                .await?;
        }

        let (w_semantic, w_keyword) = match mode {
            SearchMode::Semantic => (1.0, 0.0),
            SearchMode::Keyword => (0.0, 1.0),
            SearchMode::Hybrid => (self.params.semantic_weight, self.params.keyword_weight),
        };

        let mut results: Vec<ScoredResult> = candidates
            .into_values()
            .filter_map(|c| {
                let score = (w_semantic * c.semantic + w_keyword * c.keyword).clamp(0.0, 1.0);
                if score <= 0.0 {
                    return None;
                }
                Some(ScoredResult {
                    highlights: result_highlights(&c.record, trimmed),
                    id: c.record.id,
                    title: c.record.title,
                    category: c.record.category,
                    version: c.record.version,
                    score,
                    uploaded_at: c.record.uploaded_at,
                })
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.uploaded_at.cmp(&a.uploaded_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        results.truncate(self.params.final_limit);

        self.store
            .record_search(&normalize_query(trimmed), !results.is_empty(), Utc::now())
            .await?;

        Ok(results)
    }

    async fn collect_semantic(
        &self,
        query: &str,
        filter: &IndexFilter,
        candidates: &mut HashMap<String, Candidate>,
    ) -> Result<()> {
        let query_vec = self.embedder.embed(query).await?;
        let matches = self
            .index
            .query(&query_vec, self.params.candidate_k, filter)
            .await?;

        for m in matches {
            // Re-check against the live record: the index copy may lag,
            // and mid-ingestion documents are not yet `processed`.
            let Some(record) = self.store.get_document(&m.id).await? else {
                tracing::warn!(id = %m.id, "vector entry without document record");
                continue;
            };
            if record.status != DocumentStatus::Processed {
                continue;
            }
            if !filter.matches(&VectorMetadata::from_record(&record)) {
                continue;
            }
            let score = (m.score as f64).clamp(0.0, 1.0);
            match candidates.entry(record.id.clone()) {
                Entry::Occupied(mut e) => e.get_mut().semantic = score,
                Entry::Vacant(e) => {
                    e.insert(Candidate {
                        record,
                        semantic: score,
                        keyword: 0.0,
                    });
                }
            }
        }
        Ok(())
    }

    async fn collect_keyword(
        &self,
        query: &str,
        filter: &IndexFilter,
        candidates: &mut HashMap<String, Candidate>,
    ) -> Result<()> {
        for record in self.store.list_documents().await? {
            if record.status != DocumentStatus::Processed {
                continue;
            }
            if !filter.matches(&VectorMetadata::from_record(&record)) {
                continue;
            }
            let Some(score) =
                keyword_score(&record.title, record.extracted_text.as_deref(), query)
            else {
                continue;
            };
            match candidates.entry(record.id.clone()) {
                Entry::Occupied(mut e) => e.get_mut().keyword = score,
                Entry::Vacant(e) => {
                    e.insert(Candidate {
                        record,
                        semantic: 0.0,
                        keyword: score,
                    });
                }
            }
        }
        Ok(())
    }
}

/// Tiered keyword match quality in `[0.2, 1.0]`, or `None` for no match.
///
/// Title matches outrank text matches: exact title (1.0), title prefix
/// (0.9), title substring (0.75), every query token in the title (0.6),
/// the whole phrase in the text (0.5), then a fraction of query tokens in
/// the text (0.2–0.4). All comparisons are case-insensitive.
pub fn keyword_score(title: &str, text: Option<&str>, query: &str) -> Option<f64> {
    let q = normalize_query(query);
    if q.is_empty() {
        return None;
    }
    let tokens: Vec<&str> = q.split_whitespace().collect();
    let title = title.trim().to_lowercase();

    if title == q {
        return Some(1.0);
    }
    if title.starts_with(&q) {
        return Some(0.9);
    }
    if title.contains(&q) {
        return Some(0.75);
    }
    if !tokens.is_empty() && tokens.iter().all(|t| title.contains(t)) {
        return Some(0.6);
    }

    if let Some(text) = text {
        let text = text.to_lowercase();
        if text.contains(&q) {
            return Some(0.5);
        }
        let hits = tokens.iter().filter(|t| text.contains(**t)).count();
        if hits > 0 {
            return Some(0.2 + 0.2 * hits as f64 / tokens.len() as f64);
        }
    }

    None
}

/// Snippets for a result: prefer the extracted text, fall back to the
/// title so a title-only match still carries a highlight.
fn result_highlights(record: &DocumentRecord, query: &str) -> Vec<String> {
    if let Some(text) = record.extracted_text.as_deref() {
        let snippets = highlight_snippets(text, query, 3, 80);
        if !snippets.is_empty() {
            return snippets;
        }
    }
    highlight_snippets(&record.title, query, 1, 80)
}

/// Extract up to `max_snippets` context windows around case-insensitive
/// occurrences of `query` (or, failing that, its tokens), wrapping each
/// occurrence in `<mark>` tags. Truncated context is marked with `...`.
pub fn highlight_snippets(
    text: &str,
    query: &str,
    max_snippets: usize,
    context: usize,
) -> Vec<String> {
    let q = normalize_query(query);
    if text.is_empty() || q.is_empty() {
        return Vec::new();
    }

    let mut needles: Vec<String> = vec![q.clone()];
    for token in q.split_whitespace() {
        if token.len() >= 3 && token != q {
            needles.push(token.to_string());
        }
    }

    let mut spans: Vec<(usize, usize)> = Vec::new();
    for needle in &needles {
        let mut from = 0;
        while let Some(start) = find_ignore_ascii_case(text, needle, from) {
            let end = start + needle.len();
            if !spans.iter().any(|&(s, e)| start < e && end > s) {
                spans.push((start, end));
            }
            from = end;
            if spans.len() >= max_snippets {
                break;
            }
        }
        if spans.len() >= max_snippets {
            break;
        }
    }
    spans.sort_unstable();

    spans
        .into_iter()
        .take(max_snippets)
        .map(|(start, end)| {
            let ctx_start = floor_char_boundary(text, start.saturating_sub(context));
            let ctx_end = ceil_char_boundary(text, (end + context).min(text.len()));
            let mut snippet = String::new();
            if ctx_start > 0 {
                snippet.push_str("...");
            }
            snippet.push_str(&text[ctx_start..start]);
            snippet.push_str("<mark>");
            snippet.push_str(&text[start..end]);
            snippet.push_str("</mark>");
            snippet.push_str(&text[end..ctx_end]);
            if ctx_end < text.len() {
                snippet.push_str("...");
            }
            snippet
        })
        .collect()
}

/// Byte offset of the next ASCII-case-insensitive occurrence of `needle`
/// in `haystack` at or after `from`, aligned to a char boundary.
fn find_ignore_ascii_case(haystack: &str, needle: &str, from: usize) -> Option<usize> {
    let h = haystack.as_bytes();
    let n = needle.as_bytes();
    if n.is_empty() || h.len() < n.len() {
        return None;
    }
    let mut i = from;
    while i + n.len() <= h.len() {
        if haystack.is_char_boundary(i) && h[i..i + n.len()].eq_ignore_ascii_case(n) {
            return Some(i);
        }
        i += 1;
    }
    None
}

fn floor_char_boundary(s: &str, mut i: usize) -> usize {
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn ceil_char_boundary(s: &str, mut i: usize) -> usize {
    while i < s.len() && !s.is_char_boundary(i) {
        i += 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbedder;
    use crate::index::memory::InMemoryVectorIndex;
    use crate::models::DocumentRecord;
    use crate::store::memory::InMemoryMetadataStore;
    use chrono::Duration;

    #[test]
    fn keyword_score_tiers_are_ordered() {
        let text = Some("a long body mentioning gameplay tags and more");
        let exact = keyword_score("Blueprint Basics", None, "blueprint basics").unwrap();
        let prefix = keyword_score("Blueprint Basics Guide", None, "blueprint basics").unwrap();
        let substring = keyword_score("The Blueprint Basics Guide", None, "blueprint basics").unwrap();
        let tokens = keyword_score("Basics of Blueprint", None, "blueprint basics").unwrap();
        let phrase = keyword_score("Other", Some("see gameplay tags here"), "gameplay tags").unwrap();
        let partial = keyword_score("Other", text, "gameplay systems").unwrap();

        assert!(exact > prefix);
        assert!(prefix > substring);
        assert!(substring > tokens);
        assert!(tokens > phrase);
        assert!(phrase > partial);
        assert!(partial >= 0.2);

        assert!(keyword_score("Other", Some("nothing relevant"), "missing").is_none());
    }

    #[test]
    fn highlight_wraps_match_in_mark() {
        let snippets = highlight_snippets(
            "An introduction to Blueprint visual scripting in the editor.",
            "blueprint",
            3,
            10,
        );
        assert_eq!(snippets.len(), 1);
        assert!(snippets[0].contains("<mark>Blueprint</mark>"), "{snippets:?}");
        assert!(snippets[0].starts_with("..."));
    }

    #[test]
    fn highlight_falls_back_to_tokens() {
        let snippets = highlight_snippets(
            "Navigation meshes guide agents around obstacles.",
            "navigation query",
            3,
            15,
        );
        assert!(!snippets.is_empty());
        assert!(snippets[0].contains("<mark>Navigation</mark>"));
    }

    #[test]
    fn mode_parse_rejects_unknown() {
        assert_eq!(SearchMode::parse("hybrid").unwrap(), SearchMode::Hybrid);
        assert!(matches!(
            SearchMode::parse("fuzzy"),
            Err(Error::InvalidArgument(_))
        ));
    }

    fn processed_record(id: &str, title: &str, category: &str, version: &str, text: &str) -> DocumentRecord {
        let now = Utc::now();
        DocumentRecord {
            id: id.to_string(),
            title: title.to_string(),
            category: category.to_string(),
            version: version.to_string(),
            description: None,
            tags: None,
            filename: format!("{id}.md"),
            storage_location: format!("{id}.md"),
            size_bytes: text.len() as u64,
            content_hash: String::new(),
            status: DocumentStatus::Processed,
            error: None,
            extracted_text: Some(text.to_string()),
            uploaded_at: now,
            uploaded_by: "tester".to_string(),
            updated_at: now,
            updated_by: "tester".to_string(),
        }
    }

    async fn engine_with_docs(
        docs: Vec<DocumentRecord>,
    ) -> (SearchEngine, Arc<InMemoryMetadataStore>) {
        let store = Arc::new(InMemoryMetadataStore::new());
        let index = Arc::new(InMemoryVectorIndex::new());
        let embedder = Arc::new(HashEmbedder::new(128));

        for doc in &docs {
            store.put_document(doc).await.unwrap();
            if doc.status == DocumentStatus::Processed {
                let vector = embedder
                    .embed(doc.extracted_text.as_deref().unwrap_or(&doc.title))
                    .await
                    .unwrap();
                index
                    .upsert(&doc.id, &vector, &VectorMetadata::from_record(doc))
                    .await
                    .unwrap();
            }
        }

        let engine = SearchEngine::new(
            store.clone(),
            index,
            embedder,
            SearchParams::default(),
        );
        (engine, store)
    }

    #[tokio::test]
    async fn empty_query_is_rejected_and_not_recorded() {
        let (engine, store) = engine_with_docs(vec![]).await;
        assert!(matches!(
            engine.search("   ", SearchMode::Keyword, &SearchFilters::default()).await,
            Err(Error::InvalidArgument(_))
        ));
        assert!(store.list_search_history().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn keyword_search_finds_title_and_tracks_history() {
        let (engine, store) = engine_with_docs(vec![processed_record(
            "d1",
            "Blueprint Basics",
            "Tutorials",
            "5.3",
            "Learn Blueprint visual scripting from scratch.",
        )])
        .await;

        let results = engine
            .search("blueprint", SearchMode::Keyword, &SearchFilters::default())
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "d1");
        assert!(results[0].highlights[0].to_lowercase().contains("blueprint"));

        engine
            .search("Blueprint", SearchMode::Keyword, &SearchFilters::default())
            .await
            .unwrap();
        let history = store.list_search_history().await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].count, 2);
        assert_eq!(history[0].success_rate, 100);
    }

    #[tokio::test]
    async fn hybrid_deduplicates_and_bounds_scores() {
        let (engine, _store) = engine_with_docs(vec![
            processed_record(
                "d1",
                "Shader Pipeline",
                "Rendering",
                "5.3",
                "The shader pipeline compiles materials into GPU programs.",
            ),
            processed_record(
                "d2",
                "Animation Notes",
                "Animation",
                "5.3",
                "Notes about shader usage in animation blending.",
            ),
        ])
        .await;

        let results = engine
            .search("shader pipeline", SearchMode::Hybrid, &SearchFilters::default())
            .await
            .unwrap();

        let mut ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), results.len(), "duplicate document in results");
        assert!(results.iter().all(|r| (0.0..=1.0).contains(&r.score)));
        assert_eq!(results[0].id, "d1");
    }

    #[tokio::test]
    async fn filters_restrict_by_category_and_version() {
        let (engine, _store) = engine_with_docs(vec![
            processed_record("d1", "Guide A", "Tutorials", "5.1", "guide contents"),
            processed_record("d2", "Guide B", "API", "5.2", "guide contents"),
        ])
        .await;

        let filters = SearchFilters {
            categories: vec!["TUTORIALS".to_string()],
            versions: vec![],
        };
        let results = engine
            .search("guide", SearchMode::Keyword, &filters)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "d1");

        let filters = SearchFilters {
            categories: vec![],
            versions: vec!["5 .2".to_string()],
        };
        let results = engine
            .search("guide", SearchMode::Keyword, &filters)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "d2");
    }

    #[tokio::test]
    async fn equal_scores_break_ties_by_recency() {
        let mut older = processed_record("d-old", "Lighting Guide", "Rendering", "5.0", "x");
        let mut newer = processed_record("d-new", "Lighting Guide", "Rendering", "5.3", "y");
        older.uploaded_at = Utc::now() - Duration::days(7);
        newer.uploaded_at = Utc::now();

        let (engine, _store) = engine_with_docs(vec![older, newer]).await;
        let results = engine
            .search("lighting guide", SearchMode::Keyword, &SearchFilters::default())
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "d-new");
        assert_eq!(results[1].id, "d-old");
    }

    #[tokio::test]
    async fn unprocessed_documents_stay_hidden() {
        let mut pending = processed_record("d1", "Hidden Doc", "Tutorials", "5.3", "hidden");
        pending.status = DocumentStatus::Processing;
        let (engine, store) = engine_with_docs(vec![pending]).await;

        let results = engine
            .search("hidden", SearchMode::Keyword, &SearchFilters::default())
            .await
            .unwrap();
        assert!(results.is_empty());

        // the miss is still recorded, as an unsuccessful search
        let history = store.list_search_history().await.unwrap();
        assert_eq!(history[0].count, 1);
        assert_eq!(history[0].successful_count, 0);
        assert_eq!(history[0].success_rate, 0);
    }
}
