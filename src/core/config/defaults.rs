pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_API_PREFIX: &str = "/api";

pub const DEFAULT_LLM_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_CHAT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-ada-002";
pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 60;

pub const DEFAULT_SCRAPE_BASE_URL: &str = "https://www.vatican.va/archive/ENG0015/";
pub const DEFAULT_TOC_PATH: &str = "_INDEX.HTM";
pub const DEFAULT_MAX_DEPTH: usize = 4;
pub const DEFAULT_REQUEST_INTERVAL_MS: u64 = 100;
pub const DEFAULT_SCRAPE_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CACHE_FILE: &str = "text_data.json";
pub const DEFAULT_USER_AGENT: &str = concat!("catechism-rag/", env!("CARGO_PKG_VERSION"));

pub const DEFAULT_SIMILARITY_TOP_K: usize = 3;
pub const DEFAULT_EMBED_BATCH_SIZE: usize = 32;
pub const DEFAULT_TOOL_NAME: &str = "catechism";
pub const DEFAULT_TOOL_DESCRIPTION: &str = "The Catechism of the Catholic church which has information about creed, sacraments, prayer, morals.";

pub fn default_local_origins() -> Vec<String> {
    vec![
        "http://localhost".to_string(),
        "http://localhost:3000".to_string(),
        "http://localhost:5173".to_string(),
        "http://127.0.0.1".to_string(),
        "http://127.0.0.1:3000".to_string(),
        "http://127.0.0.1:5173".to_string(),
        "http://127.0.0.1:8000".to_string(),
    ]
}
