use std::sync::Arc;

use crate::clip::{ClipOptions, clip_tokens};
use crate::counter::TokenCounter;

/// A token counter bound to one model and one prompt.
///
/// `prompt_tokens` is the cost of the rendered system and user prompt,
/// measured once; packing starts its running total from it.
#[derive(Debug, Clone)]
pub struct TokenHandler {
    counter: Arc<TokenCounter>,
    model: String,
    prompt_tokens: usize,
}

impl TokenHandler {
    #[must_use]
    pub fn new(counter: Arc<TokenCounter>, model: impl Into<String>, system: &str, user: &str) -> Self {
        let model = model.into();
        let prompt_tokens = counter.count(system, &model) + counter.count(user, &model);
        tracing::debug!(model = %model, prompt_tokens, "Measured prompt tokens");
        Self {
            counter,
            model,
            prompt_tokens,
        }
    }

    /// Handler with no prompt overhead.
    #[must_use]
    pub fn without_prompt(counter: Arc<TokenCounter>, model: impl Into<String>) -> Self {
        Self::new(counter, model, "", "")
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    #[must_use]
    pub const fn prompt_tokens(&self) -> usize {
        self.prompt_tokens
    }

    #[must_use]
    pub fn counter(&self) -> &Arc<TokenCounter> {
        &self.counter
    }

    pub fn count_tokens(&self, text: &str) -> usize {
        self.counter.count(text, &self.model)
    }

    /// Clip `text` to `max_tokens` as counted for this handler's model.
    pub fn clip(&self, text: &str, max_tokens: i64, options: &ClipOptions) -> String {
        let options = ClipOptions {
            num_input_tokens: options
                .num_input_tokens
                .or_else(|| Some(self.count_tokens(text))),
            ..*options
        };
        let encoder = self.counter.encoder_for(&self.model);
        clip_tokens(text, max_tokens, encoder.as_ref(), &options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::CharEstimateEncoder;

    fn counter(factor: f64) -> Arc<TokenCounter> {
        Arc::new(TokenCounter::with_encoder(factor, Arc::new(CharEstimateEncoder)))
    }

    #[test]
    fn test_prompt_tokens_measured_once() {
        let handler = TokenHandler::new(counter(0.0), "gpt-4o", "system text!", "user");
        assert_eq!(handler.prompt_tokens(), 3 + 1);
        assert_eq!(handler.model(), "gpt-4o");
    }

    #[test]
    fn test_count_tokens_uses_model_inflation() {
        let handler = TokenHandler::without_prompt(counter(0.5), "claude-2");
        assert_eq!(handler.prompt_tokens(), 0);
        assert_eq!(handler.count_tokens(&"x".repeat(40)), 15);
    }

    #[test]
    fn test_clip_uses_handler_count() {
        let handler = TokenHandler::without_prompt(counter(0.0), "gpt-4o");
        let text = "a".repeat(400);
        let clipped = handler.clip(&text, 10, &ClipOptions::default());
        assert!(clipped.ends_with("\n...(truncated)"));
        assert!(handler.count_tokens(&clipped) <= 15);
        assert_eq!(handler.clip("short", 10, &ClipOptions::default()), "short");
    }
}
