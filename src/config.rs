use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;
use thiserror::Error;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the indexer.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Base URL of the Qdrant instance that stores embeddings.
    pub qdrant_url: String,
    /// Name of the Qdrant collection receiving indexed articles.
    pub qdrant_collection_name: String,
    /// Optional API key required to access Qdrant.
    pub qdrant_api_key: Option<String>,
    /// Embedding provider used to generate vector representations.
    pub embedding_provider: EmbeddingProvider,
    /// Base URL of the embedding service (`POST /embed`).
    pub embedding_url: String,
    /// Expected dimensionality of produced vectors, when pinned by the operator.
    pub embedding_dimension: Option<usize>,
    /// Text embedded once at startup to discover the vector dimension.
    pub embedding_canary_text: String,
    /// Number of points buffered before an upsert is issued.
    pub index_batch_size: usize,
    /// Upper bound on upsert attempts for a single batch.
    pub upsert_max_attempts: u32,
    /// Base backoff delay between upsert attempts, in milliseconds.
    pub upsert_backoff_ms: u64,
    /// Deadline applied to every embedding and vector store call, in seconds.
    pub request_timeout_secs: u64,
    /// Number of input sources processed concurrently.
    pub source_concurrency: usize,
    /// File receiving a copy of every log event.
    pub log_file: PathBuf,
}

/// Supported embedding backends for the indexing pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Remote sentence-transformer service speaking the `/embed` JSON contract.
    Http,
    /// Deterministic in-process hashing embedder, useful offline and for dry runs.
    Hashing,
}

/// Log file used when `MEDINDEX_LOG_FILE` is unset.
pub const DEFAULT_LOG_FILE: &str = "logs/medindex.log";

/// Dimension used by the hashing provider when `EMBEDDING_DIMENSION` is unset.
pub const DEFAULT_HASHING_DIMENSION: usize = 384;

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            qdrant_url: load_env_or("QDRANT_URL", "http://localhost:6333"),
            qdrant_collection_name: load_env_or("QDRANT_COLLECTION_NAME", "medical_abstracts"),
            qdrant_api_key: load_env_optional("QDRANT_API_KEY"),
            embedding_provider: load_env_or("EMBEDDING_PROVIDER", "http")
                .parse()
                .map_err(|()| ConfigError::InvalidValue("EMBEDDING_PROVIDER".to_string()))?,
            embedding_url: load_env_or("EMBEDDING_URL", "http://localhost:8000"),
            embedding_dimension: parse_optional("EMBEDDING_DIMENSION")?,
            embedding_canary_text: load_env_or(
                "EMBEDDING_CANARY_TEXT",
                "cardiovascular disease treatment",
            ),
            index_batch_size: parse_positive("INDEX_BATCH_SIZE", 10)?,
            upsert_max_attempts: parse_positive("UPSERT_MAX_ATTEMPTS", 3)?,
            upsert_backoff_ms: parse_optional("UPSERT_BACKOFF_MS")?.unwrap_or(500),
            request_timeout_secs: parse_positive("REQUEST_TIMEOUT_SECS", 30)?,
            source_concurrency: parse_positive("SOURCE_CONCURRENCY", 1)?,
            log_file: PathBuf::from(load_env_or("MEDINDEX_LOG_FILE", DEFAULT_LOG_FILE)),
        })
    }
}

fn load_env_or(key: &str, default: &str) -> String {
    load_env_optional(key).unwrap_or_else(|| default.to_string())
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_optional<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    load_env_optional(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
}

fn parse_positive<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    let value = parse_optional(key)?.unwrap_or(default);
    if value <= T::default() {
        return Err(ConfigError::InvalidValue(key.to_string()));
    }
    Ok(value)
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "http" => Ok(Self::Http),
            "hashing" => Ok(Self::Hashing),
            _ => Err(()),
        }
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() -> Result<&'static Config, ConfigError> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    Ok(CONFIG.get_or_init(|| config))
}
