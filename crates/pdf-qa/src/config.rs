//! Configuration for the PDF Q&A service
//!
//! Loaded from an optional TOML file, then overridden by environment
//! variables. [`AppConfig::validate`] turns missing credentials into a
//! start-up error instead of a per-request failure.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Upper bound for `openai.max_retries`; backoff doubles on every attempt
pub const MAX_RETRIES_LIMIT: u32 = 10;

/// Main service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// OpenAI-compatible API configuration (embeddings + chat)
    pub openai: OpenAiConfig,
    /// Chunking configuration
    pub chunking: ChunkingConfig,
    /// Vector index configuration
    pub vector_db: VectorDbConfig,
    /// Agent configuration
    pub agent: AgentConfig,
    /// Upload handling configuration
    pub upload: UploadConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
    /// Maximum upload size in bytes (default: 50MB)
    pub max_upload_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            enable_cors: true,
            max_upload_size: 50 * 1024 * 1024,
        }
    }
}

/// OpenAI-compatible API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    /// API key (usually from `OPENAI_API_KEY`)
    pub api_key: Option<String>,
    /// API base URL
    pub base_url: String,
    /// Chat model name (usually from `OPEN_AI_MODEL`)
    pub chat_model: Option<String>,
    /// Embedding model name
    pub embed_model: String,
    /// Sampling temperature for the agent
    pub temperature: f32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Number of retries for failed requests
    pub max_retries: u32,
    /// Texts per embeddings request
    pub embed_batch_size: usize,
    /// Embedding dimensions reported by the provider
    pub dimensions: usize,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            chat_model: None,
            embed_model: "text-embedding-ada-002".to_string(),
            temperature: 0.0,
            timeout_secs: 60,
            max_retries: 2,
            embed_batch_size: 64,
            dimensions: 1536,
        }
    }
}

impl OpenAiConfig {
    /// API key, or a configuration error if none was provided
    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::Config("OPENAI_API_KEY is not set".to_string()))
    }

    /// Chat model name, or a configuration error if none was provided
    pub fn require_chat_model(&self) -> Result<&str> {
        self.chat_model
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .ok_or_else(|| Error::Config("OPEN_AI_MODEL is not set".to_string()))
    }
}

/// Text chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk size in characters
    pub chunk_size: usize,
    /// Overlap between neighbouring chunks in characters
    pub chunk_overlap: usize,
    /// Timeout for PDF text extraction in seconds
    pub extract_timeout_secs: u64,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 500,
            extract_timeout_secs: 60,
        }
    }
}

/// Vector index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorDbConfig {
    /// Storage directory for the vector index (usually from `VECTOR_DB_PATH`)
    pub storage_path: Option<PathBuf>,
    /// Number of excerpts returned by the retrieval tool
    pub top_k: usize,
    /// Write a JSON snapshot of every populated collection to `storage_path`
    pub persist_collections: bool,
    /// Snapshots kept on disk; older ones are deleted
    pub max_snapshots: usize,
}

impl Default for VectorDbConfig {
    fn default() -> Self {
        Self {
            storage_path: None,
            top_k: 4,
            persist_collections: false,
            max_snapshots: 20,
        }
    }
}

impl VectorDbConfig {
    /// Storage path, or a configuration error if none was provided
    pub fn require_storage_path(&self) -> Result<&Path> {
        self.storage_path
            .as_deref()
            .ok_or_else(|| Error::Config("VECTOR_DB_PATH is not set".to_string()))
    }
}

/// What the agent does when it runs out of iterations or time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EarlyStopping {
    /// Stop immediately and report the run as stopped
    #[default]
    Force,
    /// Make one last model call asking for a final answer
    Generate,
}

/// Agent configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Maximum reasoning iterations per question
    pub max_iterations: usize,
    /// Early stopping method once the limits are hit
    pub early_stopping: EarlyStopping,
    /// Feed malformed model output back as an observation instead of failing
    pub handle_parsing_errors: bool,
    /// Optional wall-clock budget for one agent run in seconds
    pub max_execution_secs: Option<u64>,
    /// Hard timeout for one question's invocation in seconds
    pub question_timeout_secs: u64,
    /// Answers at or below this confidence are replaced by the sentinel
    pub confidence_threshold: f64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            early_stopping: EarlyStopping::Force,
            handle_parsing_errors: true,
            max_execution_secs: None,
            question_timeout_secs: 120,
            confidence_threshold: 0.30,
        }
    }
}

/// Upload handling configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Directory for request-scoped upload files (system temp dir if unset)
    pub temp_dir: Option<PathBuf>,
}

impl AppConfig {
    /// Load configuration: TOML file (if given), then environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse a TOML configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Invalid TOML in {}: {}", path.display(), e)))
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))
    }

    /// Apply environment variable overrides from the process environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary lookup (the environment in production)
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.openai.api_key = Some(key);
        }
        if let Some(model) = lookup("OPEN_AI_MODEL") {
            self.openai.chat_model = Some(model);
        }
        if let Some(model) = lookup("OPENAI_EMBED_MODEL") {
            self.openai.embed_model = model;
        }
        if let Some(url) = lookup("OPENAI_BASE_URL") {
            self.openai.base_url = url;
        }
        if let Some(path) = lookup("VECTOR_DB_PATH").or_else(|| lookup("CHROMA_DB_PATH")) {
            self.vector_db.storage_path = Some(PathBuf::from(path));
        }
        if let Some(host) = lookup("PDFQA_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PDFQA_PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!("Ignoring invalid PDFQA_PORT value: {}", port),
            }
        }
    }

    /// Validate everything the service needs before it starts serving
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        if let Err(e) = self.openai.require_api_key() {
            problems.push(e.to_string());
        }
        if let Err(e) = self.openai.require_chat_model() {
            problems.push(e.to_string());
        }
        if let Err(e) = self.vector_db.require_storage_path() {
            problems.push(e.to_string());
        }
        if self.chunking.chunk_size == 0 {
            problems.push("chunking.chunk_size must be > 0".to_string());
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            problems.push(format!(
                "chunking.chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            ));
        }
        if self.vector_db.top_k == 0 {
            problems.push("vector_db.top_k must be > 0".to_string());
        }
        if self.vector_db.persist_collections && self.vector_db.max_snapshots == 0 {
            problems.push("vector_db.max_snapshots must be > 0".to_string());
        }
        if self.agent.max_iterations == 0 {
            problems.push("agent.max_iterations must be > 0".to_string());
        }
        if self.openai.embed_batch_size == 0 {
            problems.push("openai.embed_batch_size must be > 0".to_string());
        }
        if self.openai.max_retries > MAX_RETRIES_LIMIT {
            problems.push(format!(
                "openai.max_retries ({}) must be at most {}",
                self.openai.max_retries, MAX_RETRIES_LIMIT
            ));
        }
        if self.agent.question_timeout_secs == 0 {
            problems.push("agent.question_timeout_secs must be > 0".to_string());
        }
        if self.agent.max_execution_secs == Some(0) {
            problems.push("agent.max_execution_secs must be > 0 when set".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(Error::Config(problems.join("; ")))
        }
    }
}
