//! Configuration loader using figment.
//!
//! Sources are layered, later ones winning:
//!
//! 1. Built-in defaults
//! 2. Profile file (`tether.{profile}.toml`)
//! 3. Main file (`tether.toml`)
//! 4. Environment variables (`TETHER_*`)
//! 5. Programmatic merges
//!
//! Environment variables use `__` for nesting:
//!
//! - `TETHER_GATEWAY__TOKEN=...` → `gateway.token`
//! - `TETHER_GATEWAY__RETRY__MAX_RETRIES=10` → `gateway.retry.max_retries`
//! - `TETHER_LOGGING__LEVEL=debug` → `logging.level`
//!
//! The profile comes from [`ConfigLoader::profile`] or `TETHER_PROFILE`.
//! YAML files (`tether.yaml`, `tether.yml`) are searched as well when the
//! `yaml-config` feature is enabled.
//!
//! ```rust,ignore
//! let config = ConfigLoader::new()
//!     .profile("production")
//!     .load()?;
//! ```

use std::path::{Path, PathBuf};

use figment::Figment;
#[cfg(any(feature = "yaml-config", feature = "toml-config"))]
use figment::providers::Format;
#[cfg(feature = "toml-config")]
use figment::providers::Toml;
#[cfg(feature = "yaml-config")]
use figment::providers::Yaml;
use figment::providers::{Env, Serialized};
use tracing::{debug, info, trace, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::TetherConfig;

const ENV_PREFIX: &str = "TETHER_";
const PROFILE_VAR: &str = "TETHER_PROFILE";
const FILE_STEM: &str = "tether";

/// File extensions searched, in order.
const EXTENSIONS: &[&str] = &[
    #[cfg(feature = "toml-config")]
    "toml",
    #[cfg(feature = "yaml-config")]
    "yaml",
    #[cfg(feature = "yaml-config")]
    "yml",
];

/// Multi-source configuration loader.
pub struct ConfigLoader {
    merges: Figment,
    profile: Option<String>,
    search_paths: Vec<PathBuf>,
    config_file: Option<PathBuf>,
    load_env: bool,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a loader that searches the working directory and the user
    /// config directory, and reads `TETHER_*` variables.
    pub fn new() -> Self {
        Self {
            merges: Figment::new(),
            profile: std::env::var(PROFILE_VAR).ok().filter(|p| !p.is_empty()),
            search_paths: Vec::new(),
            config_file: None,
            load_env: true,
        }
    }

    /// Sets the profile.
    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into().to_lowercase());
        self
    }

    /// Adds a directory to search. Replaces the default search paths.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Loads exactly this file instead of searching.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Disables environment variables.
    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Merges a configuration on top of every other source.
    pub fn merge(mut self, config: TetherConfig) -> Self {
        self.merges = self.merges.merge(Serialized::defaults(config));
        self
    }

    /// Loads and returns the configuration.
    pub fn load(self) -> ConfigResult<TetherConfig> {
        let profile = self.profile.clone();
        let figment = self.build_figment()?;

        let config: TetherConfig = figment
            .extract()
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!(
            profile = ?profile,
            application_id = config.gateway.application_id,
            logging_level = %config.logging.level,
            "Configuration loaded"
        );
        Ok(config)
    }

    fn build_figment(mut self) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(TetherConfig::default()));

        if let Some(path) = self.config_file.take() {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path));
            }
            info!(path = %path.display(), "Loading configuration file");
            figment = merge_file(figment, &path)?;
        } else {
            figment = self.search_files(figment)?;
        }

        if self.load_env {
            trace!(prefix = ENV_PREFIX, "Loading environment variables");
            figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        }

        Ok(figment.merge(self.merges))
    }

    fn resolve_search_paths(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }
        let mut paths = Vec::new();
        if let Ok(cwd) = std::env::current_dir() {
            paths.push(cwd);
        }
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join(FILE_STEM));
        }
        paths
    }

    /// Loads the profile file and main file from the first directory that
    /// has a main file.
    fn search_files(&self, mut figment: Figment) -> ConfigResult<Figment> {
        for dir in self.resolve_search_paths() {
            for ext in EXTENSIONS {
                let main = dir.join(format!("{FILE_STEM}.{ext}"));
                if !main.exists() {
                    continue;
                }
                if let Some(profile) = &self.profile {
                    let profiled = dir.join(format!("{FILE_STEM}.{profile}.{ext}"));
                    if profiled.exists() {
                        debug!(path = %profiled.display(), "Loading profile configuration");
                        figment = merge_file(figment, &profiled)?;
                    }
                }
                info!(path = %main.display(), "Loading configuration file");
                return merge_file(figment, &main);
            }
        }
        warn!("No configuration file found, using defaults and environment");
        Ok(figment)
    }
}

fn merge_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    match ext {
        #[cfg(feature = "toml-config")]
        "toml" => Ok(figment.merge(Toml::file(path))),
        #[cfg(feature = "yaml-config")]
        "yaml" | "yml" => Ok(figment.merge(Yaml::file(path))),
        _ => Err(ConfigError::ParseError(format!(
            "Unsupported or disabled configuration file format: .{ext}"
        ))),
    }
}

/// Loads configuration from the default locations.
pub fn load_config() -> ConfigResult<TetherConfig> {
    ConfigLoader::new().load()
}

/// Loads configuration from one file plus environment variables.
pub fn load_config_from_file<P: AsRef<Path>>(path: P) -> ConfigResult<TetherConfig> {
    ConfigLoader::new().file(path).load()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(all(test, feature = "toml-config"))]
mod tests {
    use super::*;
    use crate::config::LogLevel;
    use figment::Jail;

    #[test]
    fn test_defaults_without_sources() {
        Jail::expect_with(|jail| {
            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .without_env()
                .load()
                .map_err(|e| e.to_string())?;
            assert_eq!(config.logging.level, LogLevel::Info);
            assert_eq!(config.gateway.ack_wait_attempts, 3);
            assert!(!config.gateway.resume_on_reconnect);
            Ok(())
        });
    }

    #[test]
    fn test_profile_file_is_overridden_by_main_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "tether.production.toml",
                r#"
                [gateway]
                token = "from-profile"
                application_id = 7
                "#,
            )?;
            jail.create_file(
                "tether.toml",
                r#"
                [gateway]
                token = "from-main"
                "#,
            )?;

            let config = ConfigLoader::new()
                .profile("production")
                .search_path(jail.directory())
                .without_env()
                .load()
                .map_err(|e| e.to_string())?;
            assert_eq!(config.gateway.token, "from-main");
            assert_eq!(config.gateway.application_id, 7);
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file("tether.toml", "[gateway]\ntoken = \"file\"\n")?;
            jail.set_env("TETHER_GATEWAY__TOKEN", "env");
            jail.set_env("TETHER_GATEWAY__RETRY__MAX_RETRIES", "9");
            jail.set_env("TETHER_LOGGING__LEVEL", "debug");

            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .load()
                .map_err(|e| e.to_string())?;
            assert_eq!(config.gateway.token, "env");
            assert_eq!(config.gateway.retry.max_retries, 9);
            assert_eq!(config.logging.level, LogLevel::Debug);
            Ok(())
        });
    }

    #[test]
    fn test_programmatic_merge_wins() {
        Jail::expect_with(|jail| {
            jail.set_env("TETHER_GATEWAY__AUTO_RECONNECT", "false");
            let mut overrides = TetherConfig::default();
            overrides.gateway.auto_reconnect = true;

            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .merge(overrides)
                .load()
                .map_err(|e| e.to_string())?;
            assert!(config.gateway.auto_reconnect);
            Ok(())
        });
    }

    #[test]
    fn test_missing_explicit_file() {
        let result = ConfigLoader::new()
            .file("/definitely/not/here/tether.toml")
            .without_env()
            .load();
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }
}
