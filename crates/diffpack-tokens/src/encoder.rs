use std::sync::Arc;

use diffpack_utils::error::TokenizerError;
use tiktoken_rs::CoreBPE;

/// Something that can turn text into a token count.
pub trait TokenEncoder: Send + Sync {
    /// Encoder name for logs
    fn name(&self) -> &str;

    /// Number of tokens in `text`.
    ///
    /// # Errors
    ///
    /// Returns `TokenizerError::Encode` when the text cannot be encoded.
    fn count(&self, text: &str) -> Result<usize, TokenizerError>;
}

/// BPE tokenizer backed by `tiktoken-rs`.
pub struct TiktokenEncoder {
    name: String,
    bpe: CoreBPE,
}

impl TiktokenEncoder {
    /// Tokenizer registered for `model`.
    ///
    /// # Errors
    ///
    /// Returns `TokenizerError::Load` when `tiktoken-rs` has no encoding for
    /// the model.
    pub fn for_model(model: &str) -> Result<Self, TokenizerError> {
        let bpe = tiktoken_rs::get_bpe_from_model(model).map_err(|e| TokenizerError::Load {
            name: model.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            name: model.to_string(),
            bpe,
        })
    }

    /// The general purpose `o200k_base` encoding.
    ///
    /// # Errors
    ///
    /// Returns `TokenizerError::Load` if the encoding data cannot be loaded.
    pub fn o200k_base() -> Result<Self, TokenizerError> {
        let bpe = tiktoken_rs::o200k_base().map_err(|e| TokenizerError::Load {
            name: "o200k_base".to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            name: "o200k_base".to_string(),
            bpe,
        })
    }
}

impl std::fmt::Debug for TiktokenEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TiktokenEncoder")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl TokenEncoder for TiktokenEncoder {
    fn name(&self) -> &str {
        &self.name
    }

    fn count(&self, text: &str) -> Result<usize, TokenizerError> {
        // Special-token markup in diffs is ordinary text.
        Ok(self.bpe.encode_ordinary(text).len())
    }
}

/// Default estimate: one token per four characters, rounded up.
#[derive(Debug, Clone, Copy, Default)]
pub struct CharEstimateEncoder;

impl CharEstimateEncoder {
    #[must_use]
    pub fn estimate(text: &str) -> usize {
        text.chars().count().div_ceil(4)
    }
}

impl TokenEncoder for CharEstimateEncoder {
    fn name(&self) -> &str {
        "char-estimate"
    }

    fn count(&self, text: &str) -> Result<usize, TokenizerError> {
        Ok(Self::estimate(text))
    }
}

/// Build the encoder for `model`.
///
/// OpenAI models get their registered BPE. Every other model, and any model
/// whose BPE fails to load, uses `o200k_base`. If even that fails the char
/// estimate is used. Never fails.
#[must_use]
pub fn build_encoder(model: &str) -> Arc<dyn TokenEncoder> {
    if model.contains("gpt") {
        match TiktokenEncoder::for_model(model) {
            Ok(encoder) => return Arc::new(encoder),
            Err(e) => {
                tracing::warn!(model = %model, error = %e, "Falling back to o200k_base tokenizer");
            }
        }
    }

    match TiktokenEncoder::o200k_base() {
        Ok(encoder) => Arc::new(encoder),
        Err(e) => {
            tracing::warn!(model = %model, error = %e, "Falling back to character estimate");
            Arc::new(CharEstimateEncoder)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_char_estimate_rounds_up() {
        assert_eq!(CharEstimateEncoder::estimate(""), 0);
        assert_eq!(CharEstimateEncoder::estimate("abc"), 1);
        assert_eq!(CharEstimateEncoder::estimate("abcd"), 1);
        assert_eq!(CharEstimateEncoder::estimate("abcde"), 2);
        // counts characters, not bytes
        assert_eq!(CharEstimateEncoder::estimate("ééé"), 1);
    }

    #[test]
    fn test_tiktoken_counts_ordinary_text() {
        let encoder = TiktokenEncoder::o200k_base().unwrap();
        assert_eq!(encoder.count("").unwrap(), 0);
        let hello = encoder.count("hello world").unwrap();
        assert!(hello > 0 && hello <= 3);
        // special token markup does not panic and is counted as text
        assert!(encoder.count("<|endoftext|>").unwrap() > 1);
    }

    #[test]
    fn test_build_encoder_never_fails() {
        assert_eq!(build_encoder("gpt-4o").name(), "gpt-4o");
        assert_eq!(build_encoder("claude-2").name(), "o200k_base");
    }
}
