use std::collections::BTreeMap;

use anyhow::{Context, Result};
use camino::Utf8Path;
use diffpack_model::TokenBudget;
use diffpack_utils::error::ConfigError;
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};

use crate::languages::{default_bad_extensions, default_language_extension_map};
use crate::model_tokens::known_model_max_tokens;

/// Default model when none is configured
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// What to do with a single patch that alone exceeds a call's budget in
/// multi-call mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LargePatchPolicy {
    /// Leave the file out (default)
    #[default]
    Skip,
    /// Clip the patch to the budget, dropping the trailing partial line
    Clip,
}

impl std::fmt::Display for LargePatchPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Skip => write!(f, "skip"),
            Self::Clip => write!(f, "clip"),
        }
    }
}

/// Configuration for packing runs.
///
/// Read from the `[config]` table of a TOML file. A top-level
/// `[language_extension_map]` table, when present, replaces the built-in
/// language map.
///
/// ```toml
/// [config]
/// model = "claude-3-5-sonnet"
/// custom_model_max_tokens = 200000
/// patch_extra_lines_before = 3
/// ignore_globs = ["**/generated/**"]
///
/// [language_extension_map]
/// Rust = [".rs"]
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PackConfig {
    /// Model id used for tokenizer selection and the token budget
    pub model: String,
    /// Upper cap on the model budget, applied even to known models
    pub max_model_tokens: Option<usize>,
    /// Budget for models missing from the built-in table
    pub custom_model_max_tokens: Option<usize>,
    /// Context lines added before each hunk (capped at 10 by the packer)
    pub patch_extra_lines_before: usize,
    /// Context lines added after each hunk (capped at 10 by the packer)
    pub patch_extra_lines_after: usize,
    /// Extend backwards to the hunk's enclosing section header when found
    pub allow_dynamic_context: bool,
    /// Ceiling for dynamic backward extension
    pub max_extra_lines_before_dynamic_context: usize,
    /// Over-estimation added for models without an exact tokenizer
    pub model_token_count_estimate_factor: f64,
    /// Compression starts when fewer than this many tokens would be left
    pub output_buffer_tokens_soft_threshold: usize,
    /// No packed call may leave fewer than this many tokens
    pub output_buffer_tokens_hard_threshold: usize,
    /// Maximum number of calls produced in large-PR mode
    pub large_pr_max_calls: usize,
    pub large_patch_policy: LargePatchPolicy,
    /// Show each file's `ai_file_summary` under its heading in uncompressed
    /// and multi-call payloads
    pub enable_ai_metadata: bool,
    /// Files ending with one of these are never extended with context
    pub patch_extension_skip_types: Vec<String>,
    /// Glob patterns of files left out of packing entirely
    pub ignore_globs: Vec<String>,
    /// Extensions treated as binary or generated and never packed
    pub bad_extensions: Vec<String>,
    /// Language name to file extensions (with leading dot)
    #[serde(skip)]
    pub language_extension_map: BTreeMap<String, Vec<String>>,
}

impl Default for PackConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_model_tokens: None,
            custom_model_max_tokens: None,
            patch_extra_lines_before: 5,
            patch_extra_lines_after: 1,
            allow_dynamic_context: true,
            max_extra_lines_before_dynamic_context: 10,
            model_token_count_estimate_factor: 0.3,
            output_buffer_tokens_soft_threshold: 1500,
            output_buffer_tokens_hard_threshold: 1000,
            large_pr_max_calls: 3,
            large_patch_policy: LargePatchPolicy::Skip,
            enable_ai_metadata: false,
            patch_extension_skip_types: vec![".md".to_string(), ".txt".to_string()],
            ignore_globs: Vec::new(),
            bad_extensions: default_bad_extensions(),
            language_extension_map: default_language_extension_map(),
        }
    }
}

/// On-disk layout of a config file
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    config: PackConfig,
    #[serde(default)]
    language_extension_map: Option<BTreeMap<String, Vec<String>>>,
}

impl PackConfig {
    /// Parse and validate configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidFile` for malformed TOML and
    /// `ConfigError::InvalidValue` when validation fails.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile =
            toml::from_str(content).map_err(|e| ConfigError::InvalidFile(e.to_string()))?;

        let mut config = file.config;
        if let Some(map) = file.language_extension_map {
            config.language_extension_map = map;
        }
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file. A missing file yields defaults.
    pub fn from_file(path: &Utf8Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_toml_str(&content)
                .with_context(|| format!("Failed to parse TOML config file: {path}")),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path, "Config file not found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!("Failed to read config file {path}: {e}")),
        }
    }

    /// Context size of `model` after the optional `max_model_tokens` cap.
    ///
    /// Known models come from the built-in table; anything else needs
    /// `custom_model_max_tokens`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnknownModel` when neither source applies.
    pub fn max_tokens_for_model(&self, model: &str) -> Result<usize, ConfigError> {
        let max_tokens = match known_model_max_tokens(model) {
            Some(tokens) => tokens,
            None => match self.custom_model_max_tokens {
                Some(tokens) if tokens > 0 => tokens,
                _ => {
                    tracing::error!(
                        model = %model,
                        "Model has no known context size and no custom_model_max_tokens is set"
                    );
                    return Err(ConfigError::UnknownModel {
                        model: model.to_string(),
                    });
                }
            },
        };

        Ok(match self.max_model_tokens {
            Some(cap) if cap > 0 => max_tokens.min(cap),
            _ => max_tokens,
        })
    }

    /// Token budget for `model` with the configured safety margins.
    ///
    /// # Errors
    ///
    /// Propagates [`Self::max_tokens_for_model`] failures.
    pub fn token_budget(&self, model: &str) -> Result<TokenBudget, ConfigError> {
        Ok(TokenBudget::new(
            self.max_tokens_for_model(model)?,
            self.output_buffer_tokens_soft_threshold,
            self.output_buffer_tokens_hard_threshold,
        ))
    }

    /// Compile `ignore_globs` into a matcher.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for a malformed pattern.
    pub fn ignore_matcher(&self) -> Result<GlobSet, ConfigError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.ignore_globs {
            let glob = Glob::new(pattern).map_err(|e| ConfigError::InvalidValue {
                key: "ignore_globs".to_string(),
                value: format!("'{pattern}': {e}"),
            })?;
            builder.add(glob);
        }
        builder.build().map_err(|e| ConfigError::InvalidValue {
            key: "ignore_globs".to_string(),
            value: e.to_string(),
        })
    }

    /// Extension (with dot) to language name, built from the language map.
    /// The first language listing an extension wins.
    #[must_use]
    pub fn extension_to_language(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        for (language, extensions) in &self.language_extension_map {
            for ext in extensions {
                map.entry(ext.to_lowercase())
                    .or_insert_with(|| language.clone());
            }
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = PackConfig::default();
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.patch_extra_lines_before, 5);
        assert_eq!(config.patch_extra_lines_after, 1);
        assert_eq!(config.output_buffer_tokens_soft_threshold, 1500);
        assert_eq!(config.output_buffer_tokens_hard_threshold, 1000);
        assert_eq!(config.large_patch_policy, LargePatchPolicy::Skip);
        assert!(!config.enable_ai_metadata);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml_str_overrides_and_language_map() {
        let config = PackConfig::from_toml_str(
            r#"
[config]
model = "my-local-llm"
custom_model_max_tokens = 32000
patch_extra_lines_before = 3
large_patch_policy = "clip"
enable_ai_metadata = true
ignore_globs = ["**/generated/**"]

[language_extension_map]
Rust = [".rs"]
"#,
        )
        .unwrap();

        assert_eq!(config.model, "my-local-llm");
        assert_eq!(config.patch_extra_lines_before, 3);
        assert_eq!(config.patch_extra_lines_after, 1);
        assert_eq!(config.large_patch_policy, LargePatchPolicy::Clip);
        assert!(config.enable_ai_metadata);
        assert_eq!(config.language_extension_map.len(), 1);
        assert_eq!(config.max_tokens_for_model("my-local-llm").unwrap(), 32000);
    }

    #[test]
    fn test_from_toml_str_rejects_unknown_keys() {
        let err = PackConfig::from_toml_str("[config]\nmodle = \"gpt-4\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidFile(_)));
    }

    #[test]
    fn test_max_tokens_for_model_applies_cap() {
        let config = PackConfig {
            max_model_tokens: Some(32000),
            ..PackConfig::default()
        };
        assert_eq!(config.max_tokens_for_model("gpt-4o").unwrap(), 32000);
        assert_eq!(config.max_tokens_for_model("gpt-4").unwrap(), 8000);
    }

    #[test]
    fn test_unknown_model_without_custom_size_is_an_error() {
        let config = PackConfig::default();
        let err = config.max_tokens_for_model("my-local-llm").unwrap_err();
        assert_eq!(
            err,
            ConfigError::UnknownModel {
                model: "my-local-llm".to_string()
            }
        );
    }

    #[test]
    fn test_token_budget_uses_thresholds() {
        let budget = PackConfig::default().token_budget("gpt-4").unwrap();
        assert_eq!(budget.max_tokens, 8000);
        assert_eq!(budget.hard_limit(), 7000);
        assert_eq!(budget.soft_limit(), 6500);
    }

    #[test]
    fn test_ignore_matcher() {
        let config = PackConfig {
            ignore_globs: vec!["**/vendor/**".to_string(), "*.snap".to_string()],
            ..PackConfig::default()
        };
        let matcher = config.ignore_matcher().unwrap();
        assert!(matcher.is_match("third_party/vendor/lib.c"));
        assert!(matcher.is_match("tests/output.snap"));
        assert!(!matcher.is_match("src/main.rs"));
    }

    #[test]
    fn test_extension_to_language() {
        let map = PackConfig::default().extension_to_language();
        assert_eq!(map.get(".rs").map(String::as_str), Some("Rust"));
        assert_eq!(map.get(".py").map(String::as_str), Some("Python"));
    }

    #[test]
    fn test_from_file_missing_yields_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = Utf8PathBuf::from_path_buf(temp_dir.path().join("missing.toml")).unwrap();
        let config = PackConfig::from_file(&path).unwrap();
        assert_eq!(config, PackConfig::default());
    }

    #[test]
    fn test_from_file_reports_path_on_parse_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = Utf8PathBuf::from_path_buf(temp_dir.path().join("bad.toml")).unwrap();
        std::fs::write(&path, "[config\nmodel = ").unwrap();

        let err = PackConfig::from_file(&path).unwrap_err();
        assert!(format!("{err:#}").contains("bad.toml"));
    }
}
