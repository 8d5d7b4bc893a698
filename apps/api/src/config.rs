use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{bail, Context, Result};

use crate::cv::gate::GateThresholds;

/// Application configuration loaded from environment variables.
/// Fails at startup if a required variable is missing or a value does not parse.
#[derive(Debug, Clone)]
pub struct Config {
    pub openai_api_key: String,
    pub cv: CvModelConfig,
    pub analysis: AnalysisModelConfig,
    pub embedding_model: String,
    pub embedding_batch_size: usize,
    pub retrieval: RetrievalConfig,
    pub job_offers_dir: PathBuf,
    pub vector_index_path: PathBuf,
    pub job_store_path: PathBuf,
    pub gate: GateThresholds,
    pub llm_timeout_secs: u64,
    pub llm_max_attempts: u32,
    pub batch_concurrency: usize,
    pub port: u16,
    pub rust_log: String,
}

/// Model settings shared by every stage of the CV-generation workflow.
#[derive(Debug, Clone, PartialEq)]
pub struct CvModelConfig {
    pub model: String,
    pub temperature: f32,
    /// The gate's validator call runs colder than the content stages.
    pub validator_temperature: f32,
    pub max_tokens: Option<u32>,
}

impl Default for CvModelConfig {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo".to_string(),
            temperature: 0.1,
            validator_temperature: 0.0,
            max_tokens: None,
        }
    }
}

/// Model settings for the free-text match analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisModelConfig {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for AnalysisModelConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.3,
            max_tokens: 600,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub use_rerank: bool,
    pub rerank_weight: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            use_rerank: true,
            rerank_weight: 0.8,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let gate_defaults = GateThresholds::default();

        let config = Config {
            openai_api_key: resolve_api_key()?,
            cv: CvModelConfig {
                model: env_or("CV_MODEL", "gpt-3.5-turbo"),
                temperature: parse_env("CV_TEMPERATURE", 0.1)?,
                validator_temperature: parse_env("VALIDATOR_TEMPERATURE", 0.0)?,
                max_tokens: parse_optional_env("CV_MAX_TOKENS")?,
            },
            analysis: AnalysisModelConfig {
                model: env_or("ANALYSIS_MODEL", "gpt-4o-mini"),
                temperature: parse_env("ANALYSIS_TEMPERATURE", 0.3)?,
                max_tokens: parse_env("ANALYSIS_MAX_TOKENS", 600)?,
            },
            embedding_model: env_or("EMBEDDING_MODEL", "text-embedding-3-large"),
            embedding_batch_size: parse_env("EMBEDDING_BATCH_SIZE", 32)?,
            retrieval: RetrievalConfig {
                top_k: parse_env("RETRIEVAL_TOP_K", 5)?,
                use_rerank: parse_env("USE_RERANK", true)?,
                rerank_weight: parse_env("RERANK_WEIGHT", 0.8)?,
            },
            job_offers_dir: PathBuf::from(env_or("JOB_OFFERS_DIR", "data/job_offers")),
            vector_index_path: PathBuf::from(env_or("VECTOR_INDEX_PATH", "data/embeddings.idx")),
            job_store_path: PathBuf::from(env_or("JOB_STORE_PATH", "data/job_offers.jsonl")),
            gate: GateThresholds {
                fast_accept_skills: parse_env(
                    "GATE_FAST_ACCEPT_SKILLS",
                    gate_defaults.fast_accept_skills,
                )?,
                fast_accept_responsibilities: parse_env(
                    "GATE_FAST_ACCEPT_RESPONSIBILITIES",
                    gate_defaults.fast_accept_responsibilities,
                )?,
                override_score: parse_env("GATE_OVERRIDE_SCORE", gate_defaults.override_score)?,
                fallback_score: parse_env("GATE_FALLBACK_SCORE", gate_defaults.fallback_score)?,
                bonus_cap: parse_env("GATE_BONUS_CAP", gate_defaults.bonus_cap)?,
            },
            llm_timeout_secs: parse_env("LLM_TIMEOUT_SECS", 120)?,
            llm_max_attempts: parse_env("LLM_MAX_ATTEMPTS", 1)?,
            batch_concurrency: parse_env("BATCH_CONCURRENCY", 4)?,
            port: parse_env("PORT", 8080)?,
            rust_log: env_or("RUST_LOG", "info"),
        };

        if config.embedding_batch_size == 0 {
            bail!("EMBEDDING_BATCH_SIZE must be at least 1");
        }
        if config.llm_max_attempts == 0 {
            bail!("LLM_MAX_ATTEMPTS must be at least 1");
        }
        if config.batch_concurrency == 0 {
            bail!("BATCH_CONCURRENCY must be at least 1");
        }

        Ok(config)
    }
}

#[cfg(test)]
impl Config {
    /// Defaults with every data path placed under `dir`.
    pub fn for_tests(dir: &std::path::Path) -> Self {
        Config {
            openai_api_key: "sk-test".to_string(),
            cv: CvModelConfig::default(),
            analysis: AnalysisModelConfig::default(),
            embedding_model: "text-embedding-3-large".to_string(),
            embedding_batch_size: 2,
            retrieval: RetrievalConfig::default(),
            job_offers_dir: dir.join("job_offers"),
            vector_index_path: dir.join("embeddings.idx"),
            job_store_path: dir.join("job_offers.jsonl"),
            gate: GateThresholds::default(),
            llm_timeout_secs: 120,
            llm_max_attempts: 1,
            batch_concurrency: 2,
            port: 0,
            rust_log: "info".to_string(),
        }
    }
}

/// The API key comes from `OPENAI_API_KEY`, or from the file named by `OPENAI_KEY_PATH`.
fn resolve_api_key() -> Result<String> {
    if let Ok(key) = std::env::var("OPENAI_API_KEY") {
        if !key.trim().is_empty() {
            return Ok(key.trim().to_string());
        }
    }

    let path = std::env::var("OPENAI_KEY_PATH").context(
        "Required environment variable 'OPENAI_API_KEY' is not set (nor 'OPENAI_KEY_PATH')",
    )?;
    read_secret_key(&path)
}

fn read_secret_key(path: &str) -> Result<String> {
    let key = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read API key file '{path}'"))?;
    let key = key.trim();
    if key.is_empty() {
        bail!("API key file '{path}' is empty");
    }
    Ok(key.to_string())
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value: '{raw}'")),
        Err(_) => Ok(default),
    }
}

fn parse_optional_env<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .with_context(|| format!("{key} has an invalid value: '{raw}'")),
        _ => Ok(None),
    }
}
