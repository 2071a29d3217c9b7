//! Configuration management for scholar
//!
//! Handles loading, saving, and validating configuration from TOML files.

mod defaults;

pub use defaults::*;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Vector database configuration
    #[serde(default)]
    pub vector: VectorConfig,

    /// Chat completion configuration
    #[serde(default)]
    pub llm: LlmConfig,

    /// Embedding API configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Token issuance configuration
    #[serde(default)]
    pub auth: AuthConfig,

    /// Chunking configuration
    #[serde(default)]
    pub chunk: ChunkConfig,

    /// Retrieval-augmented analysis defaults
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Paper search configuration
    #[serde(default)]
    pub search: SearchConfig,

    /// Paths configuration (internal, not user-editable)
    #[serde(skip)]
    pub paths: PathsConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_host")]
    pub host: String,

    #[serde(default = "default_server_port")]
    pub port: u16,

    /// Origins allowed by CORS
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Maximum accepted PDF upload size in bytes
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    /// Where uploaded and downloaded PDFs live (empty = `<base_dir>/uploads`)
    #[serde(default = "default_upload_dir")]
    pub upload_dir: String,
}

/// Vector database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorConfig {
    /// "qdrant" or "memory"
    #[serde(default = "default_vector_backend")]
    pub backend: String,

    /// Qdrant connection URL
    #[serde(default = "default_qdrant_url")]
    pub qdrant_url: String,

    /// Environment variable name for Qdrant API key
    #[serde(default = "default_qdrant_api_key_env")]
    pub qdrant_api_key_env: String,

    /// Qdrant collection name
    #[serde(default = "default_collection_name")]
    pub collection_name: String,
}

/// Chat completion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_upstage_base_url")]
    pub base_url: String,

    /// Environment variable holding the API key
    #[serde(default = "default_upstage_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_llm_model")]
    pub model: String,

    #[serde(default = "default_llm_temperature")]
    pub temperature: f32,

    #[serde(default = "default_llm_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_llm_top_p")]
    pub top_p: f32,

    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_upstage_base_url")]
    pub base_url: String,

    /// Environment variable holding the API key
    #[serde(default = "default_upstage_api_key_env")]
    pub api_key_env: String,

    /// Model used for document passages
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Model used for search queries
    #[serde(default = "default_embedding_query_model")]
    pub query_model: String,

    /// Embedding dimension (must match model)
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Batch size for embedding
    #[serde(default = "default_embedding_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,
}

/// Token issuance configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Environment variable holding the HS256 signing secret
    #[serde(default = "default_jwt_secret_env")]
    pub secret_env: String,

    #[serde(default = "default_access_token_minutes")]
    pub access_token_minutes: i64,

    #[serde(default = "default_refresh_token_days")]
    pub refresh_token_days: i64,
}

/// Chunking configuration (token = whitespace-delimited word)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkConfig {
    /// Default tokens per chunk
    #[serde(default = "default_chunk_tokens")]
    pub chunk_tokens: usize,

    /// Overlap tokens between consecutive chunks
    #[serde(default = "default_chunk_overlap_tokens")]
    pub overlap_tokens: usize,

    /// Smallest chunk size a request may ask for
    #[serde(default = "default_chunk_min_tokens")]
    pub min_tokens: usize,

    /// Largest chunk size a request may ask for
    #[serde(default = "default_chunk_max_tokens")]
    pub max_tokens: usize,
}

/// Analysis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_analysis_top_k")]
    pub top_k: usize,

    /// Minimum similarity score (0.0 - 1.0)
    #[serde(default = "default_analysis_min_relevance")]
    pub min_relevance: f32,

    #[serde(default = "default_analysis_max_tokens")]
    pub max_tokens: u32,
}

/// Paper search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_arxiv_url")]
    pub arxiv_url: String,

    #[serde(default = "default_pubmed_url")]
    pub pubmed_url: String,

    /// Minimum relevance for a candidate to be kept (0.0 - 1.0)
    #[serde(default = "default_search_min_relevance")]
    pub min_relevance: f32,

    #[serde(default = "default_search_count")]
    pub default_count: usize,

    #[serde(default = "default_search_max_count")]
    pub max_count: usize,

    /// Candidates fetched per requested paper
    #[serde(default = "default_search_candidate_multiplier")]
    pub candidate_multiplier: usize,

    #[serde(default = "default_search_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,
}

/// Resolved filesystem locations
#[derive(Debug, Clone, Default)]
pub struct PathsConfig {
    pub base_dir: PathBuf,
    pub config_file: PathBuf,
    pub db_file: PathBuf,
    pub upload_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
            cors_origins: default_cors_origins(),
            max_upload_bytes: default_max_upload_bytes(),
            upload_dir: default_upload_dir(),
        }
    }
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            backend: default_vector_backend(),
            qdrant_url: default_qdrant_url(),
            qdrant_api_key_env: default_qdrant_api_key_env(),
            collection_name: default_collection_name(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_upstage_base_url(),
            api_key_env: default_upstage_api_key_env(),
            model: default_llm_model(),
            temperature: default_llm_temperature(),
            max_tokens: default_llm_max_tokens(),
            top_p: default_llm_top_p(),
            timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: default_upstage_base_url(),
            api_key_env: default_upstage_api_key_env(),
            model: default_embedding_model(),
            query_model: default_embedding_query_model(),
            dimension: default_embedding_dimension(),
            batch_size: default_embedding_batch_size(),
            timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret_env: default_jwt_secret_env(),
            access_token_minutes: default_access_token_minutes(),
            refresh_token_days: default_refresh_token_days(),
        }
    }
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_tokens: default_chunk_tokens(),
            overlap_tokens: default_chunk_overlap_tokens(),
            min_tokens: default_chunk_min_tokens(),
            max_tokens: default_chunk_max_tokens(),
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            top_k: default_analysis_top_k(),
            min_relevance: default_analysis_min_relevance(),
            max_tokens: default_analysis_max_tokens(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            arxiv_url: default_arxiv_url(),
            pubmed_url: default_pubmed_url(),
            min_relevance: default_search_min_relevance(),
            default_count: default_search_count(),
            max_count: default_search_max_count(),
            candidate_multiplier: default_search_candidate_multiplier(),
            user_agent: default_search_user_agent(),
            timeout_secs: default_request_timeout(),
        }
    }
}

impl Config {
    /// Get the default base directory for scholar (~/.scholar)
    pub fn default_base_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".scholar")
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        Self::default_base_dir().join("config.toml")
    }

    /// Initialize paths configuration
    pub fn init_paths(&mut self, base_dir: Option<PathBuf>) {
        let base = base_dir.unwrap_or_else(Self::default_base_dir);
        self.paths = PathsConfig {
            config_file: base.join("config.toml"),
            db_file: base.join("scholar.db"),
            upload_dir: self.resolve_upload_dir(&base),
            base_dir: base,
        };
    }

    fn resolve_upload_dir(&self, base: &Path) -> PathBuf {
        if self.server.upload_dir.trim().is_empty() {
            base.join("uploads")
        } else {
            PathBuf::from(&self.server.upload_dir)
        }
    }

    /// Load configuration from a specific file path
    pub fn load(config_path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", config_path);

        if !config_path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }

        let content = std::fs::read_to_string(config_path)?;
        let mut config: Config = toml::from_str(&content)?;

        // Set up paths based on config file location
        let base = config_path.parent().unwrap_or(Path::new(".")).to_path_buf();
        config.paths = PathsConfig {
            config_file: config_path.to_path_buf(),
            db_file: base.join("scholar.db"),
            upload_dir: config.resolve_upload_dir(&base),
            base_dir: base,
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific base directory
    pub fn load_from(base_dir: Option<PathBuf>) -> Result<Self> {
        let mut config = Config::default();
        config.init_paths(base_dir);

        if config.paths.config_file.exists() {
            debug!("Loading config from {:?}", config.paths.config_file);
            let content = std::fs::read_to_string(&config.paths.config_file)?;
            let mut loaded: Config = toml::from_str(&content)?;
            let base = config.paths.base_dir.clone();
            loaded.paths = config.paths;
            loaded.paths.upload_dir = loaded.resolve_upload_dir(&base);
            config = loaded;
        } else {
            debug!("No config file found, using defaults");
        }

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = self.paths.config_file.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&self.paths.config_file, content)?;
        info!("Saved config to {:?}", self.paths.config_file);
        Ok(())
    }

    /// Get the Qdrant API key from environment
    pub fn qdrant_api_key(&self) -> Option<String> {
        std::env::var(&self.vector.qdrant_api_key_env).ok()
    }

    /// Upstage API key for chat completions
    pub fn llm_api_key(&self) -> Result<String> {
        read_secret(&self.llm.api_key_env)
    }

    /// Upstage API key for embeddings
    pub fn embedding_api_key(&self) -> Result<String> {
        read_secret(&self.embedding.api_key_env)
    }

    /// HS256 signing secret for access and refresh tokens
    pub fn jwt_secret(&self) -> Result<String> {
        read_secret(&self.auth.secret_env)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.chunk.min_tokens > self.chunk.max_tokens {
            return Err(Error::Config(
                "chunk.min_tokens must be <= chunk.max_tokens".to_string(),
            ));
        }

        if self.chunk.chunk_tokens < self.chunk.min_tokens
            || self.chunk.chunk_tokens > self.chunk.max_tokens
        {
            return Err(Error::Config(
                "chunk.chunk_tokens must be within chunk.min_tokens..=chunk.max_tokens".to_string(),
            ));
        }

        if self.chunk.overlap_tokens >= self.chunk.min_tokens {
            return Err(Error::Config(
                "chunk.overlap_tokens must be < chunk.min_tokens".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.analysis.min_relevance) {
            return Err(Error::Config(
                "analysis.min_relevance must be between 0.0 and 1.0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.search.min_relevance) {
            return Err(Error::Config(
                "search.min_relevance must be between 0.0 and 1.0".to_string(),
            ));
        }

        if self.search.default_count == 0 || self.search.default_count > self.search.max_count {
            return Err(Error::Config(
                "search.default_count must be between 1 and search.max_count".to_string(),
            ));
        }

        if self.embedding.dimension == 0 || self.embedding.batch_size == 0 {
            return Err(Error::Config(
                "embedding.dimension and embedding.batch_size must be positive".to_string(),
            ));
        }

        match self.vector.backend.as_str() {
            "qdrant" | "memory" => {}
            other => {
                return Err(Error::Config(format!(
                    "Unknown vector.backend '{}'; expected 'qdrant' or 'memory'",
                    other
                )))
            }
        }

        if self.auth.access_token_minutes <= 0 || self.auth.refresh_token_days <= 0 {
            return Err(Error::Config(
                "auth token lifetimes must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

fn read_secret(var: &str) -> Result<String> {
    match std::env::var(var) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(Error::Config(format!(
            "Environment variable {} is not set",
            var
        ))),
    }
}
