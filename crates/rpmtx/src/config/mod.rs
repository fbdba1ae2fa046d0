//! Resolver configuration
//!
//! Values come from (highest priority first) `RPMTX_*` environment
//! variables, a JSON configuration file and built-in defaults. Callers that
//! embed a macro engine can instead build the configuration from it with
//! [`ResolverConfig::from_macros`].

mod config;
mod macros;
mod source;

pub use config::{ResolverConfig, DEFAULT_SYSINFO_PATH};
pub use macros::{MacroContext, MacroTable};
pub use source::{ConfigLoader, ConfigSource, RawConfig};
