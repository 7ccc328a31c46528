use std::collections::BTreeMap;

use diffpack_utils::error::ConfigError;

use crate::model::{LargePatchPolicy, PackConfig};

impl PackConfig {
    /// Create a builder starting from default values.
    ///
    /// # Example
    ///
    /// ```
    /// use diffpack_config::PackConfig;
    ///
    /// let config = PackConfig::builder()
    ///     .model("gpt-4")
    ///     .patch_extra_lines(3, 1)
    ///     .build()
    ///     .expect("valid config");
    /// assert_eq!(config.patch_extra_lines_before, 3);
    /// ```
    #[must_use]
    pub fn builder() -> PackConfigBuilder {
        PackConfigBuilder::new()
    }
}

/// Builder for programmatic [`PackConfig`] construction.
///
/// Values not set keep their defaults. `build` runs the same validation as
/// file loading.
#[derive(Debug, Clone, Default)]
pub struct PackConfigBuilder {
    config: PackConfig,
}

impl PackConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the model id used for the tokenizer and token budget.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    /// Cap every model's budget at `tokens`.
    #[must_use]
    pub fn max_model_tokens(mut self, tokens: usize) -> Self {
        self.config.max_model_tokens = Some(tokens);
        self
    }

    /// Budget used for models missing from the built-in table.
    #[must_use]
    pub fn custom_model_max_tokens(mut self, tokens: usize) -> Self {
        self.config.custom_model_max_tokens = Some(tokens);
        self
    }

    /// Set context lines added before and after each hunk.
    #[must_use]
    pub fn patch_extra_lines(mut self, before: usize, after: usize) -> Self {
        self.config.patch_extra_lines_before = before;
        self.config.patch_extra_lines_after = after;
        self
    }

    #[must_use]
    pub fn allow_dynamic_context(mut self, allow: bool) -> Self {
        self.config.allow_dynamic_context = allow;
        self
    }

    #[must_use]
    pub fn max_extra_lines_before_dynamic_context(mut self, lines: usize) -> Self {
        self.config.max_extra_lines_before_dynamic_context = lines;
        self
    }

    /// Over-estimation factor for models without an exact tokenizer.
    #[must_use]
    pub fn model_token_count_estimate_factor(mut self, factor: f64) -> Self {
        self.config.model_token_count_estimate_factor = factor;
        self
    }

    /// Set the soft and hard output buffers.
    ///
    /// # Arguments
    ///
    /// * `soft` - Remaining tokens below which compression starts
    /// * `hard` - Remaining tokens no packed call may go below (must be <= `soft`)
    #[must_use]
    pub fn output_buffer_tokens(mut self, soft: usize, hard: usize) -> Self {
        self.config.output_buffer_tokens_soft_threshold = soft;
        self.config.output_buffer_tokens_hard_threshold = hard;
        self
    }

    #[must_use]
    pub fn large_pr_max_calls(mut self, calls: usize) -> Self {
        self.config.large_pr_max_calls = calls;
        self
    }

    #[must_use]
    pub fn large_patch_policy(mut self, policy: LargePatchPolicy) -> Self {
        self.config.large_patch_policy = policy;
        self
    }

    #[must_use]
    pub fn enable_ai_metadata(mut self, enable: bool) -> Self {
        self.config.enable_ai_metadata = enable;
        self
    }

    #[must_use]
    pub fn patch_extension_skip_types(mut self, extensions: Vec<String>) -> Self {
        self.config.patch_extension_skip_types = extensions;
        self
    }

    /// Add one glob pattern of files to leave out.
    #[must_use]
    pub fn add_ignore_glob(mut self, pattern: impl Into<String>) -> Self {
        self.config.ignore_globs.push(pattern.into());
        self
    }

    #[must_use]
    pub fn bad_extensions(mut self, extensions: Vec<String>) -> Self {
        self.config.bad_extensions = extensions;
        self
    }

    /// Replace the language to extensions map.
    #[must_use]
    pub fn language_extension_map(mut self, map: BTreeMap<String, Vec<String>>) -> Self {
        self.config.language_extension_map = map;
        self
    }

    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` when any value is out of range.
    pub fn build(self) -> Result<PackConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
