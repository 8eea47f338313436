//! Configuration file parsing for `strata.toml`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::error::{SchemaError, SchemaResult};

/// Main configuration structure for `strata.toml`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StrataConfig {
    /// Resolver limits.
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// Backing store settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Debug/logging settings.
    #[serde(default)]
    pub debug: DebugConfig,

    /// Environment-specific overrides.
    #[serde(default)]
    pub environments: HashMap<String, EnvironmentOverride>,
}

impl StrataConfig {
    /// Load configuration from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> SchemaResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| SchemaError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> SchemaResult<Self> {
        let expanded = expand_env_vars(content);
        let config: Self =
            toml::from_str(&expanded).map_err(|e| SchemaError::TomlError { source: e })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the resolver cannot work with.
    pub fn validate(&self) -> SchemaResult<()> {
        if self.resolver.max_depth == 0 {
            return Err(SchemaError::config("resolver.max_depth must be at least 1"));
        }
        if self.resolver.max_concurrency == 0 {
            return Err(SchemaError::config(
                "resolver.max_concurrency must be at least 1",
            ));
        }
        Ok(())
    }

    /// Apply environment-specific overrides.
    pub fn with_environment(mut self, env: &str) -> Self {
        if let Some(overrides) = self.environments.remove(env) {
            if let Some(resolver) = overrides.resolver {
                if let Some(max_depth) = resolver.max_depth {
                    self.resolver.max_depth = max_depth;
                }
                if let Some(max_concurrency) = resolver.max_concurrency {
                    self.resolver.max_concurrency = max_concurrency;
                }
            }
            if let Some(db) = overrides.database {
                if let Some(path) = db.path {
                    self.database.path = path;
                }
            }
            if let Some(debug) = overrides.debug {
                if let Some(level) = debug.log_level {
                    self.debug.log_level = level;
                }
                if let Some(log_batches) = debug.log_batches {
                    self.debug.log_batches = log_batches;
                }
            }
        }
        self
    }
}

/// Resolver limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ResolverConfig {
    /// Deepest selection nesting accepted before any fetch is issued.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Batch requests of one level dispatched at the same time.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_concurrency: default_max_concurrency(),
        }
    }
}

fn default_max_depth() -> usize { 12 }
fn default_max_concurrency() -> usize { 8 }

/// Backing store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Database path, or `:memory:` (supports `${ENV_VAR}` interpolation).
    #[serde(default = "default_path")]
    pub path: String,

    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u32,

    /// Enforce foreign keys.
    #[serde(default = "default_true")]
    pub foreign_keys: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            busy_timeout_ms: default_busy_timeout(),
            foreign_keys: true,
        }
    }
}

fn default_path() -> String { ":memory:".to_string() }
fn default_busy_timeout() -> u32 { 5000 }
fn default_true() -> bool { true }

/// Debug/logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DebugConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Output format (json, pretty, compact).
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log every dispatched batch request.
    #[serde(default)]
    pub log_batches: bool,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            log_batches: false,
        }
    }
}

fn default_log_level() -> String { "warn".to_string() }
fn default_log_format() -> String { "json".to_string() }

/// Environment-specific configuration overrides.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EnvironmentOverride {
    /// Resolver overrides.
    pub resolver: Option<ResolverOverride>,

    /// Database overrides.
    pub database: Option<DatabaseOverride>,

    /// Debug overrides.
    pub debug: Option<DebugOverride>,
}

/// Resolver configuration overrides.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ResolverOverride {
    /// Override max depth.
    pub max_depth: Option<usize>,
    /// Override max concurrency.
    pub max_concurrency: Option<usize>,
}

/// Database configuration overrides.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseOverride {
    /// Override database path.
    pub path: Option<String>,
}

/// Debug configuration overrides.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DebugOverride {
    /// Override log level.
    pub log_level: Option<String>,
    /// Override batch logging.
    pub log_batches: Option<bool>,
}

/// Expand `${VAR}` references to environment variables.
///
/// Unknown variables are left untouched.
fn expand_env_vars(content: &str) -> String {
    let Ok(re) = regex_lite::Regex::new(r"\$\{([^}]+)\}") else {
        return content.to_string();
    };

    let mut result = content.to_string();
    for cap in re.captures_iter(content) {
        let var_name = &cap[1];
        let full_match = &cap[0];

        if let Ok(value) = std::env::var(var_name) {
            result = result.replace(full_match, &value);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StrataConfig::default();
        assert_eq!(config.resolver.max_depth, 12);
        assert_eq!(config.resolver.max_concurrency, 8);
        assert_eq!(config.database.path, ":memory:");
        assert_eq!(config.debug.log_format, "json");
    }

    #[test]
    fn test_parse_minimal_config() {
        let toml = r#"
            [resolver]
            max_depth = 4

            [database]
            path = "social.db"
        "#;

        let config = StrataConfig::from_str(toml).unwrap();
        assert_eq!(config.resolver.max_depth, 4);
        assert_eq!(config.resolver.max_concurrency, 8);
        assert_eq!(config.database.path, "social.db");
        assert!(config.database.foreign_keys);
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let err = StrataConfig::from_str("[resolver]\nmax_dept = 3\n").unwrap_err();
        assert!(matches!(err, SchemaError::TomlError { .. }));
    }

    #[test]
    fn test_zero_depth_is_rejected() {
        let err = StrataConfig::from_str("[resolver]\nmax_depth = 0\n").unwrap_err();
        assert!(matches!(err, SchemaError::ConfigError { .. }));
    }

    #[test]
    fn test_environment_override() {
        let toml = r#"
            [resolver]
            max_depth = 6

            [environments.test.resolver]
            max_depth = 3

            [environments.test.debug]
            log_batches = true
        "#;

        let config = StrataConfig::from_str(toml).unwrap().with_environment("test");
        assert_eq!(config.resolver.max_depth, 3);
        assert!(config.debug.log_batches);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("strata.toml");
        std::fs::write(&path, "[debug]\nlog_level = \"debug\"\n").unwrap();

        let config = StrataConfig::from_file(&path).unwrap();
        assert_eq!(config.debug.log_level, "debug");
    }

    #[test]
    fn test_env_var_expansion() {
        // SAFETY: This test runs single-threaded and we clean up after
        unsafe {
            std::env::set_var("STRATA_TEST_DB_PATH", "/tmp/strata.db");
        }
        let expanded = expand_env_vars("path = \"${STRATA_TEST_DB_PATH}\"");
        assert_eq!(expanded, "path = \"/tmp/strata.db\"");
        unsafe {
            std::env::remove_var("STRATA_TEST_DB_PATH");
        }
    }
}
