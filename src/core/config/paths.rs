use std::env;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub project_root: PathBuf,
    pub user_data_dir: PathBuf,
    pub log_dir: PathBuf,
    pub storage_dir: PathBuf,
    pub secrets_path: PathBuf,
}

impl AppPaths {
    pub fn new() -> Self {
        let project_root = discover_project_root();
        let user_data_dir = discover_user_data_dir(&project_root);
        let paths = Self::with_data_dir(project_root, user_data_dir);

        let _ = fs::create_dir_all(&paths.user_data_dir);
        let _ = fs::create_dir_all(&paths.log_dir);

        paths
    }

    /// Lays out every derived path under `user_data_dir` without touching the filesystem.
    pub fn with_data_dir(project_root: PathBuf, user_data_dir: PathBuf) -> Self {
        let log_dir = user_data_dir.join("logs");
        let storage_dir = user_data_dir.join("storage");
        let secrets_path = user_data_dir.join("secrets.yaml");

        AppPaths {
            project_root,
            user_data_dir,
            log_dir,
            storage_dir,
            secrets_path,
        }
    }

    pub fn index_db_path(&self) -> PathBuf {
        self.storage_dir.join("index.db")
    }

    pub fn nodes_path(&self) -> PathBuf {
        self.storage_dir.join("nodes.json")
    }

    /// Relative cache paths from config are resolved against the data dir.
    pub fn resolve_data_path(&self, raw: &str) -> PathBuf {
        let candidate = PathBuf::from(raw);
        if candidate.is_absolute() {
            return candidate;
        }
        self.user_data_dir.join(candidate)
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

fn discover_project_root() -> PathBuf {
    if let Ok(root) = env::var("CATECHISM_ROOT") {
        return PathBuf::from(root);
    }

    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    if manifest_dir.join("config.yml").exists() {
        return manifest_dir;
    }

    env::current_dir().unwrap_or(manifest_dir)
}

fn discover_user_data_dir(project_root: &Path) -> PathBuf {
    if let Ok(dir) = env::var("CATECHISM_DATA_DIR") {
        return PathBuf::from(dir);
    }

    if cfg!(debug_assertions) {
        return project_root.join("data");
    }

    if cfg!(target_os = "windows") {
        let base = env::var("LOCALAPPDATA")
            .unwrap_or_else(|_| env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string()));
        return PathBuf::from(base).join("CatechismRag");
    }

    if cfg!(target_os = "macos") {
        return home_dir()
            .join("Library")
            .join("Application Support")
            .join("CatechismRag");
    }

    let xdg = env::var("XDG_DATA_HOME").unwrap_or_else(|_| {
        home_dir()
            .join(".local/share")
            .to_string_lossy()
            .to_string()
    });
    PathBuf::from(xdg).join("catechism-rag")
}

fn home_dir() -> PathBuf {
    env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_paths_live_under_data_dir() {
        let paths = AppPaths::with_data_dir(PathBuf::from("/srv/app"), PathBuf::from("/var/data"));

        assert_eq!(paths.log_dir, PathBuf::from("/var/data/logs"));
        assert_eq!(paths.index_db_path(), PathBuf::from("/var/data/storage/index.db"));
        assert_eq!(paths.nodes_path(), PathBuf::from("/var/data/storage/nodes.json"));
        assert_eq!(
            paths.resolve_data_path("text_data.json"),
            PathBuf::from("/var/data/text_data.json")
        );
        assert_eq!(
            paths.resolve_data_path("/tmp/cache.json"),
            PathBuf::from("/tmp/cache.json")
        );
    }
}
