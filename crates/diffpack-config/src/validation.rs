use diffpack_utils::error::ConfigError;

use crate::model::PackConfig;

fn invalid(key: &str, value: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.into(),
    }
}

impl PackConfig {
    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` naming the first offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.trim().is_empty() {
            return Err(invalid("model", "must not be empty"));
        }

        if self.max_model_tokens == Some(0) {
            return Err(invalid("max_model_tokens", "must be greater than 0"));
        }

        if self.custom_model_max_tokens == Some(0) {
            return Err(invalid("custom_model_max_tokens", "must be greater than 0"));
        }

        if !self.model_token_count_estimate_factor.is_finite()
            || self.model_token_count_estimate_factor < 0.0
        {
            return Err(invalid(
                "model_token_count_estimate_factor",
                format!(
                    "{} must be a non-negative number",
                    self.model_token_count_estimate_factor
                ),
            ));
        }

        // Compression starts at the soft buffer; packing stops at the hard one.
        if self.output_buffer_tokens_hard_threshold > self.output_buffer_tokens_soft_threshold {
            return Err(invalid(
                "output_buffer_tokens_hard_threshold",
                format!(
                    "{} exceeds output_buffer_tokens_soft_threshold ({})",
                    self.output_buffer_tokens_hard_threshold,
                    self.output_buffer_tokens_soft_threshold
                ),
            ));
        }

        if self.large_pr_max_calls == 0 {
            return Err(invalid("large_pr_max_calls", "must be greater than 0"));
        }

        for ext in self
            .patch_extension_skip_types
            .iter()
            .chain(self.bad_extensions.iter())
        {
            if ext.is_empty() {
                return Err(invalid("extensions", "extension entries must not be empty"));
            }
        }

        self.ignore_matcher()?;

        Ok(())
    }
}
