//! Context sizes of known models.

/// Known model ids and their context size in tokens.
const MODEL_MAX_TOKENS: &[(&str, usize)] = &[
    ("gpt-3.5-turbo", 16_000),
    ("gpt-3.5-turbo-16k", 16_000),
    ("gpt-4", 8_000),
    ("gpt-4-32k", 32_000),
    ("gpt-4-turbo", 128_000),
    ("gpt-4-turbo-preview", 128_000),
    ("gpt-4o", 128_000),
    ("gpt-4o-2024-08-06", 128_000),
    ("gpt-4o-2024-11-20", 128_000),
    ("gpt-4o-mini", 128_000),
    ("gpt-4.1", 1_047_576),
    ("gpt-4.1-mini", 1_047_576),
    ("gpt-4.1-nano", 1_047_576),
    ("gpt-5", 200_000),
    ("gpt-5-mini", 200_000),
    ("gpt-5-nano", 200_000),
    ("o1-mini", 128_000),
    ("o1-preview", 128_000),
    ("o1", 204_800),
    ("o3-mini", 204_800),
    ("o3", 200_000),
    ("o4-mini", 200_000),
    ("claude-instant-1", 100_000),
    ("claude-2", 100_000),
    ("claude-3-5-sonnet", 100_000),
    ("claude-3-7-sonnet-20250219", 200_000),
    ("anthropic/claude-3-5-sonnet-20241022", 100_000),
    ("anthropic/claude-3-7-sonnet-20250219", 200_000),
    ("anthropic/claude-sonnet-4-20250514", 200_000),
    ("anthropic/claude-opus-4-20250514", 200_000),
    ("deepseek/deepseek-chat", 128_000),
    ("deepseek/deepseek-reasoner", 64_000),
    ("gemini/gemini-1.5-pro", 1_048_576),
    ("gemini/gemini-2.0-flash", 1_048_576),
    ("gemini/gemini-2.5-pro", 1_048_576),
    ("gemini/gemini-2.5-flash", 1_048_576),
    ("groq/llama-3.3-70b-versatile", 128_000),
    ("groq/mixtral-8x7b-32768", 32_768),
    ("xai/grok-3", 131_072),
    ("ollama/llama3", 4_096),
    ("command-nightly", 4_096),
];

/// Context size of a known model, or `None` when the model is not listed.
#[must_use]
pub fn known_model_max_tokens(model: &str) -> Option<usize> {
    MODEL_MAX_TOKENS
        .iter()
        .find(|(name, _)| *name == model)
        .map(|(_, tokens)| *tokens)
}
