use thiserror::Error;

/// Library-level error type for a packing run.
///
/// `PackError` is deliberately narrow. Most soft failures in diffpack are not
/// errors at all:
///
/// | Situation | Outcome |
/// |-----------|---------|
/// | Tokenizer cannot be built | Fallback encoder, warning logged |
/// | Patch has no hunk headers | Patch passed through unchanged |
/// | File too large for the budget | Recorded in `remaining_files` |
/// | File fails to render | Recorded in `skipped_files`, run continues |
/// | LLM output cannot be repaired | `None` from the repair loader |
///
/// What remains are failures the caller must act on: the diff source failing
/// (rate limiting is propagated unchanged, retry policy belongs to the
/// caller) and configuration that cannot describe a budget.
#[derive(Error, Debug)]
pub enum PackError {
    #[error("Diff source error: {0}")]
    Source(#[from] SourceError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Trait for providing user-friendly error reporting with context and suggestions
pub trait UserFriendlyError {
    /// Get a user-friendly error message
    fn user_message(&self) -> String;

    /// Get contextual information about the error
    fn context(&self) -> Option<String>;

    /// Get actionable suggestions for resolving the error
    fn suggestions(&self) -> Vec<String>;
}

impl UserFriendlyError for PackError {
    fn user_message(&self) -> String {
        match self {
            Self::Source(err) => err.user_message(),
            Self::Config(err) => err.user_message(),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::Source(err) => err.context(),
            Self::Config(err) => err.context(),
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Source(err) => err.suggestions(),
            Self::Config(err) => err.suggestions(),
        }
    }
}

/// Failures reported by the collaborator that supplies changed files.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("Rate limit exceeded for git provider API: {message}")]
    RateLimited { message: String },

    #[error("Git provider unavailable: {reason}")]
    Unavailable { reason: String },
}

impl SourceError {
    /// Whether the failure is a rate limit that the caller may retry later.
    #[must_use]
    pub const fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

impl UserFriendlyError for SourceError {
    fn user_message(&self) -> String {
        match self {
            Self::RateLimited { message } => {
                format!("The git provider rejected the request due to rate limiting: {message}")
            }
            Self::Unavailable { reason } => {
                format!("Could not fetch the pull request diff: {reason}")
            }
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::RateLimited { .. } => Some(
                "diffpack does not retry provider calls; the caller owns retry policy.".to_string(),
            ),
            Self::Unavailable { .. } => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::RateLimited { .. } => vec![
                "Wait for the rate limit window to reset and retry".to_string(),
                "Use an authenticated token with a higher quota".to_string(),
            ],
            Self::Unavailable { .. } => vec!["Check network access to the git provider".to_string()],
        }
    }
}

/// Configuration errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid configuration file: {0}")]
    InvalidFile(String),

    #[error("Invalid configuration value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Model {model} has no known context size and custom_model_max_tokens is not set")]
    UnknownModel { model: String },
}

impl UserFriendlyError for ConfigError {
    fn user_message(&self) -> String {
        match self {
            Self::InvalidFile(reason) => {
                format!("Configuration file has invalid format: {reason}")
            }
            Self::InvalidValue { key, value } => {
                format!("Configuration '{key}' has invalid value: {value}")
            }
            Self::UnknownModel { model } => {
                format!("Cannot determine the token budget for model '{model}'")
            }
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::InvalidFile(_) => {
                Some("Configuration files must be valid TOML with a [config] section.".to_string())
            }
            Self::InvalidValue { .. } => None,
            Self::UnknownModel { .. } => Some(
                "Only models listed in the built-in token table have a known context size."
                    .to_string(),
            ),
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::InvalidFile(_) => vec!["Validate the TOML syntax of the config file".to_string()],
            Self::InvalidValue { key, .. } => vec![format!("Fix the value of '{key}'")],
            Self::UnknownModel { .. } => vec![
                "Set config.custom_model_max_tokens to the model's context size".to_string(),
            ],
        }
    }
}

/// Tokenizer construction or encoding failure.
///
/// Never escapes the token counter: it is converted into a fallback estimate
/// and a warning.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenizerError {
    #[error("Failed to load tokenizer {name}: {reason}")]
    Load { name: String, reason: String },

    #[error("Failed to encode text with {name}: {reason}")]
    Encode { name: String, reason: String },
}

/// Errors while reading unified diff text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatchError {
    #[error("Invalid hunk header '{header}': {reason}")]
    InvalidHunkHeader { header: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_is_propagated_through_pack_error() {
        let err: PackError = SourceError::RateLimited {
            message: "403 API rate limit exceeded".to_string(),
        }
        .into();

        match &err {
            PackError::Source(source) => assert!(source.is_rate_limited()),
            PackError::Config(_) => panic!("expected a source error"),
        }
        assert!(err.to_string().contains("403 API rate limit exceeded"));
    }

    #[test]
    fn test_user_friendly_messages() {
        let err = ConfigError::UnknownModel {
            model: "my-local-llm".to_string(),
        };
        assert!(err.user_message().contains("my-local-llm"));
        assert!(err.context().is_some());
        assert!(
            err.suggestions()
                .iter()
                .any(|s| s.contains("custom_model_max_tokens"))
        );
    }
}
