use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::macros::{MacroContext, MacroTable};
use super::source::{ConfigLoader, ConfigSource, RawConfig};
use crate::db::MatchTag;
use crate::error::{ResolutionError, Result};
use crate::ts::CheckFlags;

pub const DEFAULT_SYSINFO_PATH: &str = "/etc/rpm/sysinfo";

/// Resolver settings normally supplied by the macro collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ResolverConfig {
    /// Whitespace separated `requirer>provider` pairs ignored while ordering
    #[serde(default)]
    pub dependency_whiteout: String,

    /// `name` looks upgrades up by package name, anything else by provides
    #[serde(default = "default_name_tag")]
    pub upgrade_tag: String,

    #[serde(default = "default_name_tag")]
    pub obsolete_tag: String,

    /// `sourcerpm` or `pkgid`; only `sourcerpm` is acted upon
    #[serde(default = "default_debuginfo_tag")]
    pub debuginfo_tag: String,

    #[serde(default = "default_sysinfo_path")]
    pub sysinfo_path: PathBuf,

    #[serde(default = "default_varrun")]
    pub varrun: PathBuf,

    #[serde(default = "default_gpg_program")]
    pub gpg_program: String,

    #[serde(default)]
    pub disable_shell_interpreter_deps: bool,

    #[serde(default = "default_max_rescans")]
    pub max_rescans: u32,

    #[serde(default = "default_solver_retries")]
    pub solver_retries: u32,

    #[serde(default = "default_dirname_depth_limit")]
    pub dirname_depth_limit: usize,

    #[serde(default)]
    pub transaction_color: u32,

    #[serde(default = "default_prefer_color")]
    pub prefer_color: u32,

    #[serde(default = "default_true")]
    pub nopromote: bool,

    #[serde(default = "default_true")]
    pub cache_results: bool,

    /// Check flag names, e.g. `["nosuggest", "deploops"]`
    #[serde(default)]
    pub dep_flags: Vec<String>,

    /// Plain macro table consulted by the macro and function probes
    #[serde(default)]
    pub macros: IndexMap<String, String>,

    #[serde(skip)]
    sources: HashMap<String, ConfigSource>,
}

fn default_name_tag() -> String {
    "name".to_string()
}

fn default_debuginfo_tag() -> String {
    "sourcerpm".to_string()
}

fn default_sysinfo_path() -> PathBuf {
    PathBuf::from(DEFAULT_SYSINFO_PATH)
}

fn default_varrun() -> PathBuf {
    PathBuf::from("/var/run")
}

fn default_gpg_program() -> String {
    "gpg".to_string()
}

fn default_max_rescans() -> u32 {
    10
}

fn default_solver_retries() -> u32 {
    20
}

fn default_dirname_depth_limit() -> usize {
    100
}

fn default_prefer_color() -> u32 {
    2
}

fn default_true() -> bool {
    true
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            dependency_whiteout: String::new(),
            upgrade_tag: default_name_tag(),
            obsolete_tag: default_name_tag(),
            debuginfo_tag: default_debuginfo_tag(),
            sysinfo_path: default_sysinfo_path(),
            varrun: default_varrun(),
            gpg_program: default_gpg_program(),
            disable_shell_interpreter_deps: false,
            max_rescans: default_max_rescans(),
            solver_retries: default_solver_retries(),
            dirname_depth_limit: default_dirname_depth_limit(),
            transaction_color: 0,
            prefer_color: default_prefer_color(),
            nopromote: true,
            cache_results: true,
            dep_flags: Vec::new(),
            macros: IndexMap::new(),
            sources: HashMap::new(),
        }
    }
}

impl ResolverConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build configuration from defaults, an optional JSON file and,
    /// when enabled, `RPMTX_*` environment overrides.
    pub fn build<P: AsRef<Path>>(config_file: Option<P>, use_environment: bool) -> Result<Self> {
        let loader = ConfigLoader::new(use_environment);
        let mut config = Self::default();

        let path = match config_file {
            Some(p) => p.as_ref().to_path_buf(),
            None => loader.default_config_path(),
        };
        let raw = loader.load_config_file(&path)?;
        if !raw.is_empty() {
            log::debug!("Loading resolver configuration from {}", path.display());
            config.merge_raw_config(raw, ConfigSource::File(path))?;
        }

        if use_environment {
            config.apply_env_overrides(&loader)?;
        }

        Ok(config)
    }

    /// Read the configuration macros from the macro collaborator.
    pub fn from_macros(macros: &dyn MacroContext) -> Self {
        let mut config = Self::default();

        let set = |key: &str, name: &str, config: &mut Self| -> Option<String> {
            let value = macros.get(name).filter(|v| !v.trim().is_empty())?;
            config.sources.insert(key.to_string(), ConfigSource::Macros);
            Some(value.trim().to_string())
        };

        if let Some(v) = set("dependency-whiteout", "_dependency_whiteout", &mut config) {
            config.dependency_whiteout = v;
        }
        if let Some(v) = set("upgrade-tag", "_upgrade_tag", &mut config) {
            config.upgrade_tag = v;
        }
        if let Some(v) = set("obsolete-tag", "_obsolete_tag", &mut config) {
            config.obsolete_tag = v;
        }
        if let Some(v) = set("debuginfo-tag", "_debuginfo_tag", &mut config) {
            config.debuginfo_tag = v;
        }
        if let Some(v) = set("sysinfo-path", "_rpmds_sysinfo_path", &mut config) {
            config.sysinfo_path = PathBuf::from(v);
        }
        if let Some(v) = set("varrun", "_varrun", &mut config) {
            config.varrun = PathBuf::from(v);
        }
        if let Some(v) = set("gpg-program", "__gpg", &mut config) {
            config.gpg_program = v;
        }
        if set("disable-shell-interpreter-deps", "_disable_shell_interpreter_deps", &mut config).is_some() {
            config.disable_shell_interpreter_deps =
                macros.expand_numeric("%{_disable_shell_interpreter_deps}") != 0;
        }

        config
    }

    /// Where a value came from, if it was not a built-in default.
    pub fn get_source(&self, key: &str) -> Option<&ConfigSource> {
        self.sources.get(key)
    }

    /// Record a programmatic override.
    pub fn set_source(&mut self, key: &str, source: ConfigSource) {
        self.sources.insert(key.to_string(), source);
    }

    /// Parsed `dep-flags`.
    pub fn check_flags(&self) -> Result<CheckFlags> {
        let mut flags = CheckFlags::empty();
        for name in &self.dep_flags {
            flags |= CheckFlags::from_flag_name(name)
                .ok_or_else(|| ResolutionError::Config(format!("Unknown dependency flag: {}", name)))?;
        }
        Ok(flags)
    }

    /// Index used to find installed packages an upgrade replaces.
    pub fn upgrade_match_tag(&self) -> MatchTag {
        Self::match_tag(&self.upgrade_tag)
    }

    /// Index used to find installed packages an Obsoletes: names.
    pub fn obsolete_match_tag(&self) -> MatchTag {
        Self::match_tag(&self.obsolete_tag)
    }

    fn match_tag(tag: &str) -> MatchTag {
        if tag.eq_ignore_ascii_case("name") {
            MatchTag::Name
        } else {
            MatchTag::ProvideName
        }
    }

    /// Whether orphaned debuginfo packages are tracked through their source rpm.
    pub fn debuginfo_by_sourcerpm(&self) -> bool {
        self.debuginfo_tag.eq_ignore_ascii_case("sourcerpm")
    }

    /// System provides file; relative paths fall back to the default.
    pub fn sysinfo_path(&self) -> PathBuf {
        let expanded = shellexpand::tilde(&self.sysinfo_path.to_string_lossy()).into_owned();
        let path = PathBuf::from(expanded);
        if path.is_absolute() {
            path
        } else {
            default_sysinfo_path()
        }
    }

    /// Macro table built from the `macros` key.
    pub fn macro_table(&self) -> MacroTable {
        MacroTable::from(self.macros.clone())
    }

    fn merge_raw_config(&mut self, raw: RawConfig, source: ConfigSource) -> Result<()> {
        let mut current = serde_json::to_value(&*self)?;
        let keys: Vec<String> = raw.values.keys().cloned().collect();

        if let Some(obj) = current.as_object_mut() {
            for (key, value) in raw.values {
                if !obj.contains_key(&key) {
                    log::warn!("Ignoring unknown configuration key \"{}\"", key);
                    continue;
                }
                obj.insert(key, value);
            }
        }

        let sources = std::mem::take(&mut self.sources);
        *self = serde_json::from_value(current)
            .map_err(|e| ResolutionError::Config(format!("Invalid configuration: {}", e)))?;
        self.sources = sources;
        for key in keys {
            self.sources.insert(key, source.clone());
        }
        Ok(())
    }

    fn apply_env_overrides(&mut self, loader: &ConfigLoader) -> Result<()> {
        let current = serde_json::to_value(&*self)?;
        let mut raw = RawConfig::default();

        if let Some(obj) = current.as_object() {
            for (key, value) in obj {
                let override_value = match value {
                    serde_json::Value::Bool(_) => loader.get_env_bool(key).map(serde_json::Value::Bool),
                    serde_json::Value::Number(_) => loader.get_env_u64(key).map(serde_json::Value::from),
                    serde_json::Value::String(_) => loader.get_env_config(key).map(serde_json::Value::String),
                    serde_json::Value::Array(_) => loader.get_env_config(key).map(|v| {
                        serde_json::Value::Array(
                            v.split(|c: char| c == ',' || c.is_whitespace())
                                .filter(|s| !s.is_empty())
                                .map(|s| serde_json::Value::String(s.to_string()))
                                .collect(),
                        )
                    }),
                    _ => None,
                };
                if let Some(v) = override_value {
                    raw.values.insert(key.clone(), v);
                }
            }
        }

        let keys: Vec<String> = raw.values.keys().cloned().collect();
        if !raw.is_empty() {
            self.merge_raw_config(raw, ConfigSource::Default)?;
        }
        for key in keys {
            let var = format!("RPMTX_{}", key.replace('-', "_").to_uppercase());
            self.sources.insert(key, ConfigSource::Environment(var));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ResolverConfig::default();
        assert_eq!(config.upgrade_tag, "name");
        assert_eq!(config.obsolete_tag, "name");
        assert_eq!(config.debuginfo_tag, "sourcerpm");
        assert_eq!(config.sysinfo_path, PathBuf::from("/etc/rpm/sysinfo"));
        assert_eq!(config.varrun, PathBuf::from("/var/run"));
        assert_eq!(config.max_rescans, 10);
        assert_eq!(config.solver_retries, 20);
        assert_eq!(config.dirname_depth_limit, 100);
        assert_eq!(config.prefer_color, 2);
        assert!(config.nopromote);
        assert!(config.cache_results);
        assert!(config.check_flags().unwrap().is_empty());
    }

    #[test]
    fn test_match_tags() {
        let mut config = ResolverConfig::default();
        assert_eq!(config.upgrade_match_tag(), MatchTag::Name);
        config.obsolete_tag = "providename".to_string();
        assert_eq!(config.obsolete_match_tag(), MatchTag::ProvideName);
    }

    #[test]
    fn test_relative_sysinfo_path_falls_back() {
        let mut config = ResolverConfig::default();
        config.sysinfo_path = PathBuf::from("etc/sysinfo");
        assert_eq!(config.sysinfo_path(), PathBuf::from(DEFAULT_SYSINFO_PATH));
        config.sysinfo_path = PathBuf::from("/opt/sysinfo");
        assert_eq!(config.sysinfo_path(), PathBuf::from("/opt/sysinfo"));
    }

    #[test]
    fn test_from_macros() {
        let macros = MacroTable::new()
            .with("_dependency_whiteout", "a>b c>d")
            .with("_upgrade_tag", "providename")
            .with("_disable_shell_interpreter_deps", "1")
            .with("_varrun", "  ");

        let config = ResolverConfig::from_macros(&macros);
        assert_eq!(config.dependency_whiteout, "a>b c>d");
        assert_eq!(config.upgrade_match_tag(), MatchTag::ProvideName);
        assert!(config.disable_shell_interpreter_deps);
        assert_eq!(config.varrun, PathBuf::from("/var/run"));
        assert_eq!(config.get_source("upgrade-tag"), Some(&ConfigSource::Macros));
        assert_eq!(config.get_source("varrun"), None);
    }

    #[test]
    fn test_check_flags() {
        let mut config = ResolverConfig::default();
        config.dep_flags = vec!["nosuggest".to_string(), "noconflicts".to_string()];
        let flags = config.check_flags().unwrap();
        assert!(flags.contains(CheckFlags::NOSUGGEST | CheckFlags::NOCONFLICTS));

        config.dep_flags.push("bogus".to_string());
        assert!(config.check_flags().is_err());
    }

    #[test]
    fn test_merge_raw_config() {
        let mut config = ResolverConfig::default();
        let raw: RawConfig = serde_json::from_str(r#"{"max-rescans": 3, "unknown-key": 1}"#).unwrap();
        config.merge_raw_config(raw, ConfigSource::Command).unwrap();
        assert_eq!(config.max_rescans, 3);
        assert_eq!(config.get_source("max-rescans"), Some(&ConfigSource::Command));
    }
}
