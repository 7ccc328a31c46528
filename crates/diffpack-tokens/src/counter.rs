use std::collections::HashMap;
use std::sync::{Arc, LazyLock, OnceLock, PoisonError, RwLock};

use diffpack_config::PackConfig;
use regex::Regex;

use crate::encoder::{CharEstimateEncoder, TokenEncoder, build_encoder};

static OPENAI_REASONING_MODEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^o[1-9](-mini|-preview)?$").expect("valid model pattern"));

/// Whether `model` has an exact local tokenizer (the OpenAI family).
#[must_use]
pub fn is_exact_model(model: &str) -> bool {
    let model = model.to_lowercase();
    model.contains("gpt") || OPENAI_REASONING_MODEL.is_match(&model)
}

type EncoderFactory = Box<dyn Fn(&str) -> Arc<dyn TokenEncoder> + Send + Sync>;

/// Per-model slot, filled once.
type EncoderSlot = Arc<OnceLock<Arc<dyn TokenEncoder>>>;

/// Counts tokens per model, caching one encoder per model id.
///
/// The cache is the only state shared between concurrent packing runs.
/// The map lock only guards slot lookup and insertion; an encoder is built
/// inside its model's slot, so at most one encoder is ever built for a
/// given model id and building it does not block other models.
pub struct TokenCounter {
    encoders: RwLock<HashMap<String, EncoderSlot>>,
    estimate_factor: f64,
    factory: EncoderFactory,
}

impl std::fmt::Debug for TokenCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCounter")
            .field("estimate_factor", &self.estimate_factor)
            .field("cached_models", &self.cached_models())
            .finish_non_exhaustive()
    }
}

impl TokenCounter {
    /// Counter using the `tiktoken-rs` encoders.
    ///
    /// `estimate_factor` is the over-estimation applied to models without an
    /// exact tokenizer; negative values are treated as zero.
    #[must_use]
    pub fn new(estimate_factor: f64) -> Self {
        Self::with_factory(estimate_factor, build_encoder)
    }

    #[must_use]
    pub fn from_config(config: &PackConfig) -> Self {
        Self::new(config.model_token_count_estimate_factor)
    }

    /// Counter that builds encoders through `factory`.
    #[must_use]
    pub fn with_factory<F>(estimate_factor: f64, factory: F) -> Self
    where
        F: Fn(&str) -> Arc<dyn TokenEncoder> + Send + Sync + 'static,
    {
        Self {
            encoders: RwLock::new(HashMap::new()),
            estimate_factor: estimate_factor.max(0.0),
            factory: Box::new(factory),
        }
    }

    /// Counter that uses one encoder for every model.
    #[must_use]
    pub fn with_encoder(estimate_factor: f64, encoder: Arc<dyn TokenEncoder>) -> Self {
        Self::with_factory(estimate_factor, move |_| Arc::clone(&encoder))
    }

    #[must_use]
    pub const fn estimate_factor(&self) -> f64 {
        self.estimate_factor
    }

    /// The cached encoder for `model`, building it on first use.
    pub fn encoder_for(&self, model: &str) -> Arc<dyn TokenEncoder> {
        let slot = self.slot(model);
        let encoder = slot.get_or_init(|| {
            let encoder = (self.factory)(model);
            tracing::debug!(model = %model, encoder = encoder.name(), "Built token encoder");
            encoder
        });
        Arc::clone(encoder)
    }

    fn slot(&self, model: &str) -> EncoderSlot {
        {
            let encoders = self.encoders.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(slot) = encoders.get(model) {
                return Arc::clone(slot);
            }
        }

        let mut encoders = self
            .encoders
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        // Another thread may have inserted it while we waited for the lock.
        Arc::clone(encoders.entry(model.to_string()).or_default())
    }

    /// Model ids with a cached encoder, sorted.
    #[must_use]
    pub fn cached_models(&self) -> Vec<String> {
        let encoders = self.encoders.read().unwrap_or_else(PoisonError::into_inner);
        let mut models: Vec<String> = encoders
            .iter()
            .filter(|(_, slot)| slot.get().is_some())
            .map(|(model, _)| model.clone())
            .collect();
        models.sort();
        models
    }

    /// Encoder count for `text` without any over-estimation.
    ///
    /// An encoder failure is logged and replaced by the character estimate.
    pub fn count_raw(&self, text: &str, model: &str) -> usize {
        let encoder = self.encoder_for(model);
        match encoder.count(text) {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(
                    model = %model,
                    encoder = encoder.name(),
                    error = %e,
                    "Token encoding failed, using character estimate"
                );
                CharEstimateEncoder::estimate(text)
            }
        }
    }

    /// Token count of `text` for `model`.
    ///
    /// Exact models return the encoder count. Every other model is inflated
    /// by `1 + estimate_factor` and rounded up, so budgets are never
    /// under-counted.
    pub fn count(&self, text: &str, model: &str) -> usize {
        let raw = self.count_raw(text, model);
        if is_exact_model(model) || self.estimate_factor == 0.0 {
            return raw;
        }
        inflate(raw, self.estimate_factor)
    }
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn inflate(raw: usize, factor: f64) -> usize {
    ((1.0 + factor) * raw as f64).ceil() as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Mutex, mpsc};
    use std::thread;

    #[test]
    fn test_exact_models() {
        assert!(is_exact_model("gpt-4o"));
        assert!(is_exact_model("azure/gpt-4"));
        assert!(is_exact_model("o1"));
        assert!(is_exact_model("o3-mini"));
        assert!(is_exact_model("o1-preview"));
        assert!(!is_exact_model("o3-pro"));
        assert!(!is_exact_model("claude-3-5-sonnet"));
        assert!(!is_exact_model("deepseek/deepseek-chat"));
    }

    #[test]
    fn test_inexact_models_are_inflated() {
        let counter = TokenCounter::with_encoder(0.3, Arc::new(CharEstimateEncoder));
        // 40 chars -> 10 raw tokens
        let text = "a".repeat(40);
        assert_eq!(counter.count(&text, "gpt-4o"), 10);
        assert_eq!(counter.count(&text, "claude-2"), 13);
        assert_eq!(counter.count_raw(&text, "claude-2"), 10);

        // 1 raw token * 1.3 rounds up to 2
        assert_eq!(counter.count("a", "claude-2"), 2);
    }

    #[test]
    fn test_negative_factor_is_clamped() {
        let counter = TokenCounter::with_encoder(-1.0, Arc::new(CharEstimateEncoder));
        assert_eq!(counter.count(&"a".repeat(40), "claude-2"), 10);
    }

    #[test]
    fn test_encoder_is_cached_per_model() {
        let built = Arc::new(AtomicUsize::new(0));
        let built_in_factory = Arc::clone(&built);
        let counter = TokenCounter::with_factory(0.0, move |_| {
            built_in_factory.fetch_add(1, Ordering::SeqCst);
            Arc::new(CharEstimateEncoder) as Arc<dyn TokenEncoder>
        });

        counter.count("one", "gpt-4o");
        counter.count("two", "gpt-4o");
        counter.count("three", "claude-2");

        assert_eq!(built.load(Ordering::SeqCst), 2);
        assert_eq!(counter.cached_models(), vec!["claude-2", "gpt-4o"]);
    }

    #[test]
    fn test_concurrent_first_use_builds_one_encoder() {
        let built = Arc::new(AtomicUsize::new(0));
        let built_in_factory = Arc::clone(&built);
        let counter = Arc::new(TokenCounter::with_factory(0.0, move |_| {
            built_in_factory.fetch_add(1, Ordering::SeqCst);
            thread::sleep(std::time::Duration::from_millis(5));
            Arc::new(CharEstimateEncoder) as Arc<dyn TokenEncoder>
        }));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let counter = Arc::clone(&counter);
                thread::spawn(move || counter.count("shared text", "gpt-4o"))
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), 3);
        }

        assert_eq!(built.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_slow_build_does_not_block_other_models() {
        let (started_tx, started_rx) = mpsc::channel::<()>();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let started_tx = Mutex::new(started_tx);
        let release_rx = Mutex::new(release_rx);
        let counter = Arc::new(TokenCounter::with_factory(0.0, move |model| {
            if model == "slow-model" {
                started_tx.lock().unwrap().send(()).unwrap();
                release_rx.lock().unwrap().recv().unwrap();
            }
            Arc::new(CharEstimateEncoder) as Arc<dyn TokenEncoder>
        }));

        let slow = {
            let counter = Arc::clone(&counter);
            thread::spawn(move || counter.count_raw("abcdefgh", "slow-model"))
        };
        started_rx.recv().unwrap();

        // the slow build is still running here
        assert_eq!(counter.count_raw("abcd", "fast-model"), 1);
        assert_eq!(counter.cached_models(), vec!["fast-model"]);

        release_tx.send(()).unwrap();
        assert_eq!(slow.join().unwrap(), 2);
        assert_eq!(counter.cached_models(), vec!["fast-model", "slow-model"]);
    }

    struct FailingEncoder;

    impl TokenEncoder for FailingEncoder {
        fn name(&self) -> &str {
            "failing"
        }

        fn count(&self, _text: &str) -> Result<usize, diffpack_utils::error::TokenizerError> {
            Err(diffpack_utils::error::TokenizerError::Encode {
                name: "failing".to_string(),
                reason: "boom".to_string(),
            })
        }
    }

    #[test]
    fn test_encode_failure_falls_back_to_estimate() {
        let counter = TokenCounter::with_encoder(0.0, Arc::new(FailingEncoder));
        assert_eq!(counter.count("abcdefgh", "gpt-4o"), 2);
    }
}
