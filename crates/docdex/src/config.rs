use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use docdex_core::search::SearchParams;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub storage: StorageConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// SQLite database file.
    pub db_path: PathBuf,
    /// Directory holding the raw uploaded files.
    pub files_dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_semantic_weight")]
    pub semantic_weight: f64,
    #[serde(default = "default_keyword_weight")]
    pub keyword_weight: f64,
    #[serde(default = "default_candidate_k")]
    pub candidate_k: usize,
    #[serde(default = "default_final_limit")]
    pub final_limit: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        RetrievalConfig {
            semantic_weight: default_semantic_weight(),
            keyword_weight: default_keyword_weight(),
            candidate_k: default_candidate_k(),
            final_limit: default_final_limit(),
        }
    }
}

impl RetrievalConfig {
    pub fn params(&self) -> SearchParams {
        SearchParams {
            semantic_weight: self.semantic_weight,
            keyword_weight: self.keyword_weight,
            candidate_k: self.candidate_k,
            final_limit: self.final_limit,
        }
    }
}

fn default_semantic_weight() -> f64 {
    0.6
}
fn default_keyword_weight() -> f64 {
    0.4
}
fn default_candidate_k() -> usize {
    50
}
fn default_final_limit() -> usize {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// `local`, `openai`, or `disabled`.
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        EmbeddingConfig {
            provider: default_provider(),
            model: None,
            dims: default_dims(),
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_provider() -> String {
    "local".to_string()
}
fn default_dims() -> usize {
    256
}
fn default_endpoint() -> String {
    "https://api.openai.com/v1/embeddings".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    5
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    let r = &config.retrieval;
    if !(0.0..=1.0).contains(&r.semantic_weight) || !(0.0..=1.0).contains(&r.keyword_weight) {
        anyhow::bail!("retrieval weights must each be in [0.0, 1.0]");
    }
    let sum = r.semantic_weight + r.keyword_weight;
    if sum <= 0.0 || sum > 1.0 + 1e-9 {
        anyhow::bail!("retrieval weights must sum to a value in (0.0, 1.0]");
    }
    if r.final_limit < 1 {
        anyhow::bail!("retrieval.final_limit must be >= 1");
    }
    if r.candidate_k < 1 {
        anyhow::bail!("retrieval.candidate_k must be >= 1");
    }

    let e = &config.embedding;
    match e.provider.as_str() {
        "disabled" => {}
        "local" => {
            if e.dims == 0 {
                anyhow::bail!("embedding.dims must be > 0 for the local provider");
            }
        }
        "openai" => {
            if e.dims == 0 {
                anyhow::bail!("embedding.dims must be > 0 for the openai provider");
            }
            if e.model.is_none() {
                anyhow::bail!("embedding.model must be set for the openai provider");
            }
        }
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be local, openai, or disabled.",
            other
        ),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_str: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_str)?;
        validate(&config)?;
        Ok(config)
    }

    const MINIMAL: &str = r#"
[storage]
db_path = "data/dex.sqlite"
files_dir = "data/files"
"#;

    #[test]
    fn minimal_config_gets_defaults() {
        let config = parse(MINIMAL).unwrap();
        assert_eq!(config.retrieval.semantic_weight, 0.6);
        assert_eq!(config.retrieval.keyword_weight, 0.4);
        assert_eq!(config.embedding.provider, "local");
        assert_eq!(config.embedding.dims, 256);
    }

    #[test]
    fn bad_weights_are_rejected() {
        let toml_str = format!("{MINIMAL}\n[retrieval]\nsemantic_weight = 0.9\nkeyword_weight = 0.9\n");
        assert!(parse(&toml_str).is_err());

        let toml_str = format!("{MINIMAL}\n[retrieval]\nsemantic_weight = 1.4\nkeyword_weight = 0.0\n");
        assert!(parse(&toml_str).is_err());
    }

    #[test]
    fn openai_provider_requires_model() {
        let toml_str = format!("{MINIMAL}\n[embedding]\nprovider = \"openai\"\ndims = 1536\n");
        assert!(parse(&toml_str).is_err());

        let toml_str = format!(
            "{MINIMAL}\n[embedding]\nprovider = \"openai\"\ndims = 1536\nmodel = \"text-embedding-3-small\"\n"
        );
        assert!(parse(&toml_str).is_ok());
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let toml_str = format!("{MINIMAL}\n[embedding]\nprovider = \"quantum\"\n");
        assert!(parse(&toml_str).is_err());
    }
}
