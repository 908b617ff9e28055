use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Map, Value};

use super::paths::AppPaths;
use super::settings::AppConfig;
use super::validation::validate_config;
use crate::core::errors::ConfigError;

#[derive(Clone)]
pub struct ConfigService {
    paths: Arc<AppPaths>,
}

impl ConfigService {
    pub fn new(paths: Arc<AppPaths>) -> Self {
        Self { paths }
    }

    pub fn config_path(&self) -> PathBuf {
        if let Ok(path) = env::var("CATECHISM_CONFIG_PATH") {
            return PathBuf::from(path);
        }

        let user_config = self.paths.user_data_dir.join("config.yml");
        if user_config.exists() {
            return user_config;
        }

        self.paths.project_root.join("config.yml")
    }

    pub fn secrets_path(&self) -> PathBuf {
        self.paths.secrets_path.clone()
    }

    /// Loads `config.yml`, layers `secrets.yaml` and the process environment
    /// on top, then validates the result.
    pub fn load_config(&self) -> Result<AppConfig, ConfigError> {
        self.load_config_with_env(|key| env::var(key).ok())
    }

    pub fn load_config_with_env<F>(&self, lookup: F) -> Result<AppConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let public_config = load_yaml_file(&self.config_path())?;
        let secrets_config = load_yaml_file(&self.secrets_path())?;
        let merged = deep_merge(&public_config, &secrets_config);

        let mut config: AppConfig =
            serde_json::from_value(merged).map_err(ConfigError::Structure)?;
        apply_env_overrides(&mut config, lookup);
        validate_config(&config)?;
        Ok(config)
    }
}

fn load_yaml_file(path: &Path) -> Result<Value, ConfigError> {
    if !path.exists() {
        return Ok(Value::Object(Map::new()));
    }

    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let value = serde_yaml::from_str::<Value>(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    match value {
        Value::Object(_) => Ok(value),
        // An empty YAML document parses as null.
        Value::Null => Ok(Value::Object(Map::new())),
        _ => Err(ConfigError::invalid("root", "expected a mapping")),
    }
}

fn deep_merge(base: &Value, override_value: &Value) -> Value {
    match (base, override_value) {
        (Value::Object(base_map), Value::Object(override_map)) => {
            let mut merged: Map<String, Value> = base_map.clone();
            for (key, value) in override_map {
                let merged_value = match merged.get(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), merged_value);
            }
            Value::Object(merged)
        }
        _ => override_value.clone(),
    }
}

fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

    if let Some(model) = non_empty("MODEL") {
        config.llm.model = model;
    }
    if let Some(model) = non_empty("EMBEDDING_MODEL") {
        config.llm.embedding_model = model;
    }
    if let Some(key) = non_empty("OPENAI_API_KEY") {
        config.llm.api_key = Some(key);
    }
    if let Some(url) = non_empty("OPENAI_BASE_URL") {
        config.llm.base_url = url;
    }
    if let Some(host) = non_empty("HOST") {
        config.server.host = host;
    }
    match non_empty("PORT").map(|val| val.parse::<u16>()) {
        Some(Ok(port)) => config.server.port = port,
        Some(Err(err)) => tracing::warn!("Ignoring invalid PORT value: {}", err),
        None => {}
    }
}
