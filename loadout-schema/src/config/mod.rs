//! Configuration file parsing for `loadout.toml`.

use std::path::Path;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use crate::error::{SchemaError, SchemaResult};

/// Default bound on association recursion depth.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Main configuration structure for `loadout.toml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoadoutConfig {
    /// Selection handling.
    #[serde(default)]
    pub selection: SelectionConfig,

    /// Association loader settings.
    #[serde(default)]
    pub loader: LoaderConfig,

    /// Debug/logging settings.
    #[serde(default)]
    pub debug: DebugConfig,
}

impl LoadoutConfig {
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

    /// Configuration rejecting undeclared names.
    pub fn strict() -> Self {
        let mut config = Self::default();
        config.selection.strict = true;
        config
    }

    /// Set the association recursion bound.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.loader.max_depth = max_depth;
        self
    }

    /// Check the configured values.
    pub fn validate(&self) -> SchemaResult<()> {
        if self.loader.max_depth == 0 {
            return Err(SchemaError::config("loader.max_depth must be at least 1"));
        }
        Ok(())
    }
}

/// Selection handling.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SelectionConfig {
    /// Fail on names the schema does not declare instead of dropping them.
    #[serde(default)]
    pub strict: bool,

    /// Always fetch every declared column attribute.
    #[serde(default)]
    pub simple_mode: bool,
}

/// Association loader settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoaderConfig {
    /// Maximum association nesting depth.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

/// Debug settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DebugConfig {
    /// Log the rendered query text of every fetch.
    #[serde(default)]
    pub log_queries: bool,
}

static ENV_VAR: LazyLock<regex_lite::Regex> = LazyLock::new(|| {
    regex_lite::Regex::new(r"\$\{([^}]+)\}").expect("static pattern is valid")
});

/// Expand `${VAR}` references; unset variables are left as written.
fn expand_env_vars(content: &str) -> String {
    ENV_VAR
        .replace_all(content, |caps: &regex_lite::Captures<'_>| {
            std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LoadoutConfig::default();
        assert!(!config.selection.strict);
        assert!(!config.selection.simple_mode);
        assert_eq!(config.loader.max_depth, 32);
        assert!(!config.debug.log_queries);
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
            [selection]
            strict = true

            [loader]
            max_depth = 4
        "#;

        let config = LoadoutConfig::from_str(toml).unwrap();
        assert!(config.selection.strict);
        assert!(!config.selection.simple_mode);
        assert_eq!(config.loader.max_depth, 4);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("loadout.toml");
        std::fs::write(&path, "[debug]\nlog_queries = true\n").unwrap();

        let config = LoadoutConfig::from_file(&path).unwrap();
        assert!(config.debug.log_queries);

        let missing = LoadoutConfig::from_file(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(missing, SchemaError::IoError { .. }));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = LoadoutConfig::from_str("[selection]\nlenient = true\n").unwrap_err();
        assert!(matches!(err, SchemaError::TomlError { .. }));
    }

    #[test]
    fn test_zero_depth_rejected() {
        let err = LoadoutConfig::from_str("[loader]\nmax_depth = 0\n").unwrap_err();
        assert!(matches!(err, SchemaError::ConfigError { .. }));
    }

    #[test]
    fn test_env_var_expansion() {
        // SAFETY: the variable name is unique to this test
        unsafe {
            std::env::set_var("LOADOUT_TEST_MAX_DEPTH", "7");
        }
        let expanded = expand_env_vars("max_depth = ${LOADOUT_TEST_MAX_DEPTH}");
        assert_eq!(expanded, "max_depth = 7");
        assert_eq!(expand_env_vars("x = ${LOADOUT_UNSET_VAR}"), "x = ${LOADOUT_UNSET_VAR}");
        unsafe {
            std::env::remove_var("LOADOUT_TEST_MAX_DEPTH");
        }
    }
}
