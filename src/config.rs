//! Runtime configuration: `.env`, an optional YAML file, then environment
//! overrides, in that order of increasing precedence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::ConfigError;
use crate::ports::EnvConfig;

/// Config file consulted when `TASKGEN_CONFIG` is unset.
pub const DEFAULT_CONFIG_FILE: &str = "taskgen.yaml";

/// Top-level settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Working directory for generated tasks, the failure store, and cassettes.
    pub home: PathBuf,

    /// Generated-task directory; defaults to `<home>/generated_tasks`.
    #[serde(rename = "generated-dir")]
    pub generated_dir: Option<PathBuf>,

    /// Failure store file; defaults to `<home>/failed_generations.json`.
    #[serde(rename = "failure-store")]
    pub failure_store: Option<PathBuf>,

    /// Optional API reference text injected into code prompts.
    #[serde(rename = "api-reference")]
    pub api_reference: Option<PathBuf>,

    /// Language model endpoint.
    pub llm: LlmSettings,

    /// Retrieval backend.
    pub retrieval: RetrievalSettings,

    /// Simulation harness process.
    pub harness: HarnessSettings,

    /// Verification environment parameters.
    pub env: EnvConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            home: PathBuf::from(".taskgen"),
            generated_dir: None,
            failure_store: None,
            api_reference: None,
            llm: LlmSettings::default(),
            retrieval: RetrievalSettings::default(),
            harness: HarnessSettings::default(),
            env: EnvConfig::default(),
        }
    }
}

/// OpenAI-compatible chat endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// API base URL, without the `/chat/completions` suffix.
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Environment variable holding the API key.
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// Default model identifier.
    pub model: String,

    /// Default sampling temperature.
    pub temperature: f32,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            model: "gpt-4.1-mini".to_string(),
            temperature: 0.7,
        }
    }
}

/// How examples are retrieved for the code prompt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalBackend {
    /// Dense vectors from the embeddings endpoint.
    #[default]
    Embeddings,
    /// In-process TF-IDF; works offline.
    Lexical,
}

impl std::str::FromStr for RetrievalBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "embeddings" => Ok(Self::Embeddings),
            "lexical" => Ok(Self::Lexical),
            other => Err(format!("unknown retrieval backend: {other}")),
        }
    }
}

/// Retrieval settings. The embeddings backend reuses the LLM endpoint's base
/// URL and API key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    /// Which backend ranks the corpus.
    pub backend: RetrievalBackend,

    /// Embedding model identifier.
    #[serde(rename = "embedding-model")]
    pub embedding_model: String,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            backend: RetrievalBackend::default(),
            embedding_model: "text-embedding-3-small".to_string(),
        }
    }
}

/// External simulation harness.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessSettings {
    /// Program and arguments; empty means no harness is configured.
    pub command: Vec<String>,
}

impl Settings {
    /// Generated-task directory.
    #[must_use]
    pub fn generated_dir(&self) -> PathBuf {
        self.generated_dir.clone().unwrap_or_else(|| self.home.join("generated_tasks"))
    }

    /// Failure store file.
    #[must_use]
    pub fn failure_store(&self) -> PathBuf {
        self.failure_store.clone().unwrap_or_else(|| self.home.join("failed_generations.json"))
    }

    /// Reads `path` if it exists; a missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "no config file; using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "loaded config");
        Ok(settings)
    }

    /// Applies `TASKGEN_*` overrides using `var` to look up variables.
    #[must_use]
    pub fn with_overrides(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        let path = |name: &str| var(name).filter(|v| !v.is_empty()).map(PathBuf::from);
        if let Some(home) = path("TASKGEN_HOME") {
            self.home = home;
        }
        if let Some(dir) = path("TASKGEN_GENERATED_DIR") {
            self.generated_dir = Some(dir);
        }
        if let Some(store) = path("TASKGEN_FAILURE_STORE") {
            self.failure_store = Some(store);
        }
        if let Some(reference) = path("TASKGEN_API_REFERENCE") {
            self.api_reference = Some(reference);
        }
        if let Some(command) = var("TASKGEN_HARNESS") {
            self.harness.command = command.split_whitespace().map(str::to_string).collect();
        }
        if let Some(url) = var("TASKGEN_LLM_BASE_URL").filter(|v| !v.is_empty()) {
            self.llm.base_url = url;
        }
        if let Some(name) = var("TASKGEN_LLM_API_KEY_ENV").filter(|v| !v.is_empty()) {
            self.llm.api_key_env = name;
        }
        if let Some(backend) = var("TASKGEN_RETRIEVAL").filter(|v| !v.is_empty()) {
            match backend.parse() {
                Ok(backend) => self.retrieval.backend = backend,
                Err(e) => warn!(error = %e, "ignoring TASKGEN_RETRIEVAL"),
            }
        }
        self
    }
}

/// Loads settings from `.env`, the config file, and the process environment.
///
/// # Errors
///
/// Returns an error if a config file exists but is unreadable or invalid.
pub fn load() -> Result<Settings, ConfigError> {
    if let Ok(path) = dotenvy::dotenv() {
        debug!(path = %path.display(), "loaded .env");
    }
    let file = std::env::var("TASKGEN_CONFIG")
        .map_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from);
    Ok(Settings::from_file(&file)?.with_overrides(|name| std::env::var(name).ok()))
}
