//! Application paths for config, secrets, and cache.

use directories::ProjectDirs;
use std::path::PathBuf;

/// Application paths.
pub struct AppPaths {
    /// Configuration directory (config.toml, secrets.toml).
    pub config: PathBuf,
    /// Cache directory.
    pub cache: PathBuf,
}

impl AppPaths {
    /// Create paths for the reip application.
    #[must_use]
    pub fn new() -> Self {
        if let Some(proj_dirs) = ProjectDirs::from("io", "reip", "reip") {
            Self {
                config: proj_dirs.config_dir().to_path_buf(),
                cache: proj_dirs.cache_dir().to_path_buf(),
            }
        } else {
            // Fallback to home directory
            let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
            Self {
                config: home.join(".config/reip"),
                cache: home.join(".cache/reip"),
            }
        }
    }

    /// Paths rooted at an explicit directory (tests, portable installs).
    #[must_use]
    pub fn rooted(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            config: root.join("config"),
            cache: root.join("cache"),
        }
    }

    #[must_use]
    pub fn config_file(&self) -> PathBuf {
        self.config.join("config.toml")
    }

    #[must_use]
    pub fn secrets_file(&self) -> PathBuf {
        self.config.join("secrets.toml")
    }

    /// Directory holding persisted API responses.
    #[must_use]
    pub fn response_cache_dir(&self) -> PathBuf {
        self.cache.join("responses")
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

mod dirs {
    use std::path::PathBuf;

    pub fn home_dir() -> Option<PathBuf> {
        directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rooted_layout() {
        let paths = AppPaths::rooted("/tmp/reip-test");
        assert_eq!(
            paths.secrets_file(),
            PathBuf::from("/tmp/reip-test/config/secrets.toml")
        );
        assert_eq!(
            paths.response_cache_dir(),
            PathBuf::from("/tmp/reip-test/cache/responses")
        );
    }
}
