use crate::encoder::TokenEncoder;

/// Appended to clipped text so readers can tell content was cut.
pub const TRUNCATION_MARKER: &str = "\n...(truncated)";

/// Share of the estimated character budget actually kept.
const SAFETY_FACTOR: f64 = 0.9;

/// Options for [`clip_tokens`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipOptions {
    /// Append [`TRUNCATION_MARKER`] after clipping
    pub add_truncation_marker: bool,
    /// Drop the trailing partial line after slicing
    pub delete_last_line: bool,
    /// Token count of the input when already known
    pub num_input_tokens: Option<usize>,
}

impl Default for ClipOptions {
    fn default() -> Self {
        Self {
            add_truncation_marker: true,
            delete_last_line: false,
            num_input_tokens: None,
        }
    }
}

/// Clip `text` to roughly `max_tokens` tokens.
///
/// The cut point is estimated from the text's average characters per token,
/// scaled by 0.9. Slicing is by characters, never inside a UTF-8 sequence.
///
/// - empty text is returned unchanged
/// - `max_tokens <= 0` yields `""`
/// - text already within budget is returned unchanged
/// - a tokenizer failure logs a warning and returns the text unchanged
#[must_use]
pub fn clip_tokens(
    text: &str,
    max_tokens: i64,
    encoder: &dyn TokenEncoder,
    options: &ClipOptions,
) -> String {
    if text.is_empty() {
        return String::new();
    }
    if max_tokens <= 0 {
        return String::new();
    }

    let num_input_tokens = match options.num_input_tokens {
        Some(tokens) => tokens,
        None => match encoder.count(text) {
            Ok(tokens) => tokens,
            Err(e) => {
                tracing::warn!(encoder = encoder.name(), error = %e, "Failed to clip tokens");
                return text.to_string();
            }
        },
    };

    let max = usize::try_from(max_tokens).unwrap_or(usize::MAX);
    if num_input_tokens <= max {
        return text.to_string();
    }

    let num_chars = text.chars().count();
    let num_output_chars = output_chars(num_chars, num_input_tokens, max);
    if num_output_chars == 0 {
        return String::new();
    }

    let mut clipped = match text.char_indices().nth(num_output_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    };
    if options.delete_last_line
        && let Some((head, _)) = clipped.rsplit_once('\n')
    {
        clipped = head;
    }

    let mut out = clipped.to_string();
    if options.add_truncation_marker {
        out.push_str(TRUNCATION_MARKER);
    }
    out
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn output_chars(num_chars: usize, num_tokens: usize, max_tokens: usize) -> usize {
    let chars_per_token = num_chars as f64 / num_tokens as f64;
    (SAFETY_FACTOR * chars_per_token * max_tokens as f64).floor() as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::CharEstimateEncoder;
    use proptest::prelude::*;

    const SIX_LINES: &str = "line1\nline2\nline3\nline4\nline5\nline6";

    #[test]
    fn test_clip_six_lines_to_ten_tokens() {
        let options = ClipOptions {
            num_input_tokens: Some(17),
            ..ClipOptions::default()
        };
        assert_eq!(
            clip_tokens(SIX_LINES, 10, &CharEstimateEncoder, &options),
            "line1\nline2\nline3\n\n...(truncated)"
        );
    }

    #[test]
    fn test_non_positive_budget_is_empty() {
        let options = ClipOptions::default();
        assert_eq!(clip_tokens(SIX_LINES, 0, &CharEstimateEncoder, &options), "");
        assert_eq!(clip_tokens(SIX_LINES, -1, &CharEstimateEncoder, &options), "");
    }

    #[test]
    fn test_empty_text_is_unchanged() {
        assert_eq!(clip_tokens("", 5, &CharEstimateEncoder, &ClipOptions::default()), "");
    }

    #[test]
    fn test_within_budget_is_unchanged() {
        assert_eq!(
            clip_tokens(SIX_LINES, 9, &CharEstimateEncoder, &ClipOptions::default()),
            SIX_LINES
        );
    }

    #[test]
    fn test_delete_last_line_without_marker() {
        let options = ClipOptions {
            add_truncation_marker: false,
            delete_last_line: true,
            num_input_tokens: Some(17),
        };
        // 18 chars "line1\nline2\nline3\n" minus everything after the last newline
        assert_eq!(
            clip_tokens(SIX_LINES, 10, &CharEstimateEncoder, &options),
            "line1\nline2\nline3"
        );
    }

    #[test]
    fn test_tiny_budget_rounds_to_empty() {
        let options = ClipOptions {
            num_input_tokens: Some(1000),
            ..ClipOptions::default()
        };
        assert_eq!(clip_tokens("short text", 1, &CharEstimateEncoder, &options), "");
    }

    #[test]
    fn test_multibyte_text_is_sliced_on_char_boundaries() {
        let text = "é".repeat(100);
        let clipped = clip_tokens(&text, 5, &CharEstimateEncoder, &ClipOptions::default());
        // 100 chars / 25 tokens * 5 * 0.9 = 18 chars
        assert_eq!(clipped, format!("{}{TRUNCATION_MARKER}", "é".repeat(18)));
    }

    proptest! {
        #[test]
        fn prop_clip_is_noop_under_budget(text in ".{0,200}", extra in 0i64..50) {
            let tokens = CharEstimateEncoder::estimate(&text) as i64;
            let clipped = clip_tokens(&text, tokens + extra.max(1), &CharEstimateEncoder, &ClipOptions::default());
            prop_assert_eq!(clipped, text);
        }

        #[test]
        fn prop_clip_is_monotonic(text in "[a-z \n]{50,400}", a in 1i64..100, b in 1i64..100) {
            let (small, large) = if a <= b { (a, b) } else { (b, a) };
            let options = ClipOptions { add_truncation_marker: false, ..ClipOptions::default() };
            let clipped_small = clip_tokens(&text, small, &CharEstimateEncoder, &options);
            let clipped_large = clip_tokens(&text, large, &CharEstimateEncoder, &options);
            prop_assert!(clipped_small.chars().count() <= clipped_large.chars().count());
        }

        #[test]
        fn prop_clipped_body_fits_budget(text in "[a-z]{20,400}", max in 1i64..50) {
            let options = ClipOptions { add_truncation_marker: false, ..ClipOptions::default() };
            let clipped = clip_tokens(&text, max, &CharEstimateEncoder, &options);
            prop_assert!(CharEstimateEncoder::estimate(&clipped) as i64 <= max);
        }
    }
}
