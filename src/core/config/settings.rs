use serde::{Deserialize, Serialize};

use super::defaults::*;
use crate::toc::Level;

/// Typed view of the merged `config.yml` + `secrets.yaml` + environment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub scraper: ScraperSettings,
    pub index: IndexSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub api_prefix: String,
    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            api_prefix: DEFAULT_API_PREFIX.to_string(),
            cors_allowed_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub embedding_model: String,
    pub temperature: Option<f64>,
    pub max_tokens: Option<i32>,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_LLM_BASE_URL.to_string(),
            api_key: None,
            model: DEFAULT_CHAT_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            temperature: None,
            max_tokens: None,
            timeout_secs: DEFAULT_LLM_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperSettings {
    pub base_url: String,
    pub toc_path: String,
    pub max_depth: usize,
    pub request_interval_ms: u64,
    pub timeout_secs: u64,
    pub user_agent: String,
    pub cache_file: String,
}

impl Default for ScraperSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_SCRAPE_BASE_URL.to_string(),
            toc_path: DEFAULT_TOC_PATH.to_string(),
            max_depth: DEFAULT_MAX_DEPTH,
            request_interval_ms: DEFAULT_REQUEST_INTERVAL_MS,
            timeout_secs: DEFAULT_SCRAPE_TIMEOUT_SECS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            cache_file: DEFAULT_CACHE_FILE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    pub summarization_level: Level,
    pub similarity_top_k: usize,
    pub embed_batch_size: usize,
    pub use_sub_questions: bool,
    pub tool_name: String,
    pub tool_description: String,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            summarization_level: Level::Chapter,
            similarity_top_k: DEFAULT_SIMILARITY_TOP_K,
            embed_batch_size: DEFAULT_EMBED_BATCH_SIZE,
            use_sub_questions: true,
            tool_name: DEFAULT_TOOL_NAME.to_string(),
            tool_description: DEFAULT_TOOL_DESCRIPTION.to_string(),
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Falls back to local development origins when none are configured.
    pub fn allowed_origins(&self) -> Vec<String> {
        let origins: Vec<String> = self
            .cors_allowed_origins
            .iter()
            .map(|origin| origin.trim())
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect();

        if origins.is_empty() {
            return default_local_origins();
        }
        origins
    }
}
