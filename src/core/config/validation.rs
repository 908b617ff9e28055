use reqwest::Url;

use super::settings::AppConfig;
use crate::core::errors::ConfigError;
use crate::toc::Level;

pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    validate_non_empty("server.host", &config.server.host)?;
    if !config.server.api_prefix.starts_with('/') {
        return Err(ConfigError::invalid(
            "server.api_prefix",
            "must start with '/'",
        ));
    }
    for (index, origin) in config.server.cors_allowed_origins.iter().enumerate() {
        validate_non_empty(&format!("server.cors_allowed_origins[{}]", index), origin)?;
    }

    validate_url("llm.base_url", &config.llm.base_url)?;
    validate_non_empty("llm.model", &config.llm.model)?;
    validate_non_empty("llm.embedding_model", &config.llm.embedding_model)?;
    validate_range("llm.timeout_secs", config.llm.timeout_secs, 1, 3_600)?;
    if let Some(temperature) = config.llm.temperature {
        if !(0.0..=2.0).contains(&temperature) {
            return Err(ConfigError::invalid(
                "llm.temperature",
                "must be between 0 and 2",
            ));
        }
    }

    validate_url("scraper.base_url", &config.scraper.base_url)?;
    validate_non_empty("scraper.toc_path", &config.scraper.toc_path)?;
    validate_non_empty("scraper.cache_file", &config.scraper.cache_file)?;
    validate_range(
        "scraper.max_depth",
        config.scraper.max_depth as u64,
        1,
        Level::ALL.len() as u64,
    )?;
    validate_range(
        "scraper.request_interval_ms",
        config.scraper.request_interval_ms,
        0,
        60_000,
    )?;
    validate_range("scraper.timeout_secs", config.scraper.timeout_secs, 1, 3_600)?;

    validate_range(
        "index.similarity_top_k",
        config.index.similarity_top_k as u64,
        1,
        100,
    )?;
    validate_range(
        "index.embed_batch_size",
        config.index.embed_batch_size as u64,
        1,
        2_048,
    )?;
    validate_non_empty("index.tool_name", &config.index.tool_name)?;
    if config.index.summarization_level.depth() >= config.scraper.max_depth {
        return Err(ConfigError::invalid(
            "index.summarization_level",
            format!(
                "'{}' is deeper than anything scraped with max_depth {}",
                config.index.summarization_level, config.scraper.max_depth
            ),
        ));
    }

    Ok(())
}

fn validate_non_empty(path: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::invalid(path, "value cannot be empty"));
    }
    Ok(())
}

fn validate_range(path: &str, value: u64, min: u64, max: u64) -> Result<(), ConfigError> {
    if value < min || value > max {
        return Err(ConfigError::invalid(
            path,
            format!("must be between {} and {}", min, max),
        ));
    }
    Ok(())
}

fn validate_url(path: &str, value: &str) -> Result<(), ConfigError> {
    Url::parse(value)
        .map(|_| ())
        .map_err(|err| ConfigError::invalid(path, err.to_string()))
}
