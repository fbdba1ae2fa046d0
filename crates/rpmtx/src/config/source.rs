use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ResolutionError, Result};

/// Where a configuration value came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Built-in default
    Default,
    /// Loaded from a JSON configuration file
    File(PathBuf),
    /// From an `RPMTX_*` environment variable
    Environment(String),
    /// From the macro collaborator
    Macros,
    /// Programmatically set
    Command,
}

impl ConfigSource {
    pub fn as_str(&self) -> &str {
        match self {
            ConfigSource::Default => "default",
            ConfigSource::File(_) => "file",
            ConfigSource::Environment(var) => var,
            ConfigSource::Macros => "macros",
            ConfigSource::Command => "command",
        }
    }
}

/// Raw key/value pairs as read from a configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawConfig {
    #[serde(flatten)]
    pub values: IndexMap<String, serde_json::Value>,
}

impl RawConfig {
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Loads resolver configuration from files and the environment
#[derive(Debug)]
pub struct ConfigLoader {
    use_environment: bool,
}

impl ConfigLoader {
    pub fn new(use_environment: bool) -> Self {
        Self { use_environment }
    }

    /// Get an environment variable, ignoring empty values
    pub fn get_env(&self, var: &str) -> Option<String> {
        if !self.use_environment {
            return None;
        }

        env::var(var).ok().filter(|s| !s.is_empty())
    }

    /// Default location of the user configuration file
    pub fn default_config_path(&self) -> PathBuf {
        if let Some(path) = self.get_env("RPMTX_CONFIG") {
            return PathBuf::from(shellexpand::tilde(&path).into_owned());
        }

        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "rpmtx") {
            proj_dirs.config_dir().join("config.json")
        } else if let Some(base) = directories::BaseDirs::new() {
            base.home_dir().join(".rpmtx").join("config.json")
        } else {
            PathBuf::from(".rpmtx/config.json")
        }
    }

    /// Default location of the persistent result cache
    pub fn default_cache_path(&self) -> PathBuf {
        if let Some(path) = self.get_env("RPMTX_CACHE_FILE") {
            return PathBuf::from(shellexpand::tilde(&path).into_owned());
        }

        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "rpmtx") {
            proj_dirs.cache_dir().join("depends.json")
        } else {
            PathBuf::from(".rpmtx/depends.json")
        }
    }

    /// Load a JSON configuration file. A missing file yields an empty config.
    pub fn load_config_file<P: AsRef<Path>>(&self, path: P) -> Result<RawConfig> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(RawConfig::default());
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| ResolutionError::Config(format!("Failed to read {}: {}", path.display(), e)))?;

        let config: RawConfig = serde_json::from_str(&contents)
            .map_err(|e| ResolutionError::Config(format!("Failed to parse {}: {}", path.display(), e)))?;

        Ok(config)
    }

    /// Get a configuration value from the environment.
    /// Converts "foo-bar" to "RPMTX_FOO_BAR"
    pub fn get_env_config(&self, key: &str) -> Option<String> {
        let env_var = format!("RPMTX_{}", key.replace('-', "_").to_uppercase());
        self.get_env(&env_var)
    }

    pub fn get_env_bool(&self, key: &str) -> Option<bool> {
        self.get_env_config(key).map(|val| {
            !matches!(val.to_lowercase().as_str(), "false" | "0" | "no" | "")
        })
    }

    pub fn get_env_u64(&self, key: &str) -> Option<u64> {
        self.get_env_config(key).and_then(|val| val.parse().ok())
    }

    pub fn get_env_path(&self, key: &str) -> Option<PathBuf> {
        self.get_env_config(key)
            .map(|val| PathBuf::from(shellexpand::tilde(&val).into_owned()))
    }
}
