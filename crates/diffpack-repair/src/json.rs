use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use serde_json::error::Category;

/// End of one complete array element: a closing brace followed by a comma.
static ELEMENT_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\}\s*,").expect("valid element end regex"));

const SUGGESTION_KEYS: &[&str] = &[
    "'Code feedback': [",
    "\"Code feedback\": [",
    "'Code suggestions': [",
    "\"Code suggestions\": [",
];

/// Byte offset of a 1-based `line` / `column` position, snapped back to a
/// character boundary.
fn offset_of(text: &str, line: usize, column: usize) -> Option<usize> {
    let line_start = if line <= 1 {
        0
    } else {
        text.match_indices('\n').nth(line - 2).map(|(idx, _)| idx + 1)?
    };
    let mut offset = line_start + column.checked_sub(1)?;
    if offset >= text.len() {
        return None;
    }
    while !text.is_char_boundary(offset) {
        offset -= 1;
    }
    Some(offset)
}

/// Parse `message` as JSON, blanking the character at each reported syntax
/// error until it parses.
///
/// Stops with `None` when an error is not a syntax error (for example a
/// truncated document), points past the end, or lands on a character that
/// is already a space.
///
/// ```
/// use diffpack_repair::fix_json_escape_char;
///
/// let value = fix_json_escape_char("{\"msg\": \"hel\u{1}lo\"}").unwrap();
/// assert_eq!(value, serde_json::json!({"msg": "hel lo"}));
/// ```
#[must_use]
pub fn fix_json_escape_char(message: &str) -> Option<Value> {
    let mut message = message.to_string();

    // every round turns one non-space character into a space
    for _ in 0..=message.chars().count() {
        let err = match serde_json::from_str::<Value>(&message) {
            Ok(value) => return Some(value),
            Err(err) => err,
        };
        if err.classify() != Category::Syntax {
            tracing::debug!(error = %err, "JSON error is not repairable");
            return None;
        }

        let offset = offset_of(&message, err.line(), err.column())?;
        let ch = message[offset..].chars().next()?;
        if ch == ' ' {
            return None;
        }
        tracing::debug!(offset, character = ?ch, "Blanking offending JSON character");
        message.replace_range(offset..offset + ch.len_utf8(), " ");
    }

    None
}

/// Recover a possibly truncated JSON review.
///
/// Text ending in `}` goes straight to [`fix_json_escape_char`]. Otherwise,
/// when it holds a code feedback or suggestions array, the array is cut back
/// to its last complete element and closed, dropping one more element per
/// attempt for up to `max_iter` attempts.
#[must_use]
pub fn try_fix_json(review: &str, max_iter: usize, code_suggestions: bool) -> Option<Value> {
    if review.ends_with('}') {
        return fix_json_escape_char(review);
    }

    let has_suggestions = SUGGESTION_KEYS
        .iter()
        .any(|key| review.rfind(key).is_some_and(|idx| idx > 0));
    if !has_suggestions {
        return None;
    }

    let closing = if code_suggestions { "]}" } else { "]}}" };
    let last_element_end =
        |text: &str| ELEMENT_END.find_iter(text).last().map(|m| m.end() - 1);

    let mut review = review;
    let mut cut = last_element_end(review);
    for _ in 0..max_iter {
        let Some(idx) = cut.filter(|idx| *idx > 0) else {
            break;
        };
        let candidate = format!("{}{closing}", &review[..idx]);
        if let Ok(value) = serde_json::from_str::<Value>(&candidate) {
            tracing::info!("Recovered truncated JSON response");
            return Some(value);
        }
        review = &review[..idx];
        cut = last_element_end(review);
    }

    tracing::error!("Unable to decode JSON response from AI");
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_control_character_is_blanked() {
        assert_eq!(
            fix_json_escape_char("{\"msg\": \"hel\u{1}lo\"}"),
            Some(json!({"msg": "hel lo"}))
        );
    }

    #[test]
    fn test_several_bad_characters() {
        let message = "{\"a\": \"x\u{1}y\",\n \"b\": \"\u{2}z\u{3}\"}";
        assert_eq!(
            fix_json_escape_char(message),
            Some(json!({"a": "x y", "b": " z "}))
        );
    }

    #[test]
    fn test_valid_json_is_parsed() {
        assert_eq!(fix_json_escape_char("[1, 2]"), Some(json!([1, 2])));
    }

    #[test]
    fn test_truncated_json_gives_up() {
        assert_eq!(fix_json_escape_char("{\"a\": "), None);
        assert_eq!(fix_json_escape_char(""), None);
    }

    #[test]
    fn test_truncated_suggestions_are_trimmed() {
        let review = "{\"Code suggestions\": [{\"a\": 1}, {\"b\": 2}, {\"c\": \"unfinished";
        assert_eq!(
            try_fix_json(review, 10, true),
            Some(json!({"Code suggestions": [{"a": 1}, {"b": 2}]}))
        );
    }

    #[test]
    fn test_nested_review_uses_double_closing() {
        let review = "{\"review\": {\"Code feedback\": [{\"a\": 1}, {\"b\": 2}, {\"c";
        assert_eq!(
            try_fix_json(review, 10, false),
            Some(json!({"review": {"Code feedback": [{"a": 1}, {"b": 2}]}}))
        );
    }

    #[test]
    fn test_try_fix_json_without_suggestions() {
        assert_eq!(try_fix_json("{\"summary\": \"cut off", 10, false), None);
        assert_eq!(try_fix_json("{\"ok\": true}", 10, false), Some(json!({"ok": true})));
    }

    proptest! {
        #[test]
        fn prop_escape_fix_terminates(text in "\\PC{0,120}") {
            let _ = fix_json_escape_char(&text);
        }

        #[test]
        fn prop_try_fix_json_terminates(text in "\\PC{0,120}", max_iter in 0usize..20) {
            let _ = try_fix_json(&text, max_iter, false);
        }
    }
}
