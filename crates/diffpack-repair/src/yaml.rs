use serde_yaml::Value;
use strum::Display;
use tracing::{error, info, warn};

/// Keys whose values are usually raw code or prose and break plain scalars.
pub const DEFAULT_BLOCK_KEYS: &[&str] = &[
    "relevant line:",
    "suggestion content:",
    "relevant file:",
    "existing code:",
    "improved code:",
    "label:",
];

const FENCE_OPEN: &str = "```yaml";
const FENCE: &str = "```";

/// Block keys whose following lines are indented by [`RepairStrategy::CodeBlockIndent`].
const CODE_BLOCK_KEYS: &[&str] = &["existing_code:", "improved_code:"];

/// Caller hints for the repair chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairOptions {
    /// Extra keys treated like [`DEFAULT_BLOCK_KEYS`], e.g. `"summary:"`
    pub keys_fix_yaml: Vec<String>,
    /// First top-level key of the expected document, without the colon
    pub first_key: String,
    /// A key near the end of the expected document, without the colon
    pub last_key: String,
}

/// One rewrite of the raw text, tried in [`RepairStrategy::ALL`] order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum RepairStrategy {
    /// `key: value` becomes `key: |` with the value on an indented line
    BlockScalarKeys,
    /// `|` becomes `|2`, then under-indented lines with `}` are pushed in
    IndentIndicator,
    /// Text between a `` ```yaml `` fence and its closing fence
    FencedSnippet,
    /// One leading `{` and trailing `}` removed
    StripBraces,
    /// From `first_key:` to the blank line after `last_key:`
    KeyRange,
    /// A leading `+` on any line becomes a space
    LeadingPlus,
    /// Tabs become four spaces
    Tabs,
    /// Lines after `existing_code:` / `improved_code:` indented by four
    CodeBlockIndent,
}

impl RepairStrategy {
    pub const ALL: [Self; 8] = [
        Self::BlockScalarKeys,
        Self::IndentIndicator,
        Self::FencedSnippet,
        Self::StripBraces,
        Self::KeyRange,
        Self::LeadingPlus,
        Self::Tabs,
        Self::CodeBlockIndent,
    ];

    /// Rewritten texts to try, in order. Empty when the strategy does not
    /// apply to `text`.
    ///
    /// `original` is the response before fence stripping.
    #[must_use]
    pub fn candidates(self, text: &str, original: &str, options: &RepairOptions) -> Vec<String> {
        match self {
            Self::BlockScalarKeys => vec![block_scalar_keys(text, &options.keys_fix_yaml)],
            Self::IndentIndicator => {
                let with_hint = text.replace("|\n", "|2\n");
                let reindented = reindent_closing_braces(&with_hint);
                vec![with_hint, reindented]
            }
            Self::FencedSnippet => fenced_snippet(text)
                .or_else(|| fenced_snippet(original))
                .map(|s| vec![s.to_string()])
                .unwrap_or_default(),
            Self::StripBraces => {
                let trimmed = text.trim();
                let trimmed = trimmed.strip_prefix('{').unwrap_or(trimmed);
                let trimmed = trimmed.strip_suffix('}').unwrap_or(trimmed);
                vec![trimmed.trim_end_matches([':', '\n']).to_string()]
            }
            Self::KeyRange => key_range(text, &options.first_key, &options.last_key)
                .map(|s| vec![s])
                .unwrap_or_default(),
            Self::LeadingPlus => vec![map_lines(text, |line| match line.strip_prefix('+') {
                Some(rest) => format!(" {rest}"),
                None => line.to_string(),
            })],
            Self::Tabs => {
                if text.contains('\t') {
                    vec![text.replace('\t', "    ")]
                } else {
                    Vec::new()
                }
            }
            Self::CodeBlockIndent => vec![indent_code_blocks(text)],
        }
    }
}

fn map_lines(text: &str, f: impl FnMut(&str) -> String) -> String {
    text.split('\n').map(f).collect::<Vec<_>>().join("\n")
}

fn block_scalar_keys(text: &str, extra_keys: &[String]) -> String {
    let keys: Vec<&str> = DEFAULT_BLOCK_KEYS
        .iter()
        .copied()
        .chain(extra_keys.iter().map(String::as_str))
        .filter(|k| !k.is_empty())
        .collect();

    map_lines(text, |line| {
        let mut line = line.to_string();
        for &key in &keys {
            if line.contains(key) && !line.contains('|') {
                line = line.replace(key, &format!("{key} |\n        "));
            }
        }
        line
    })
}

fn reindent_closing_braces(text: &str) -> String {
    map_lines(text, |line| {
        let body = line.trim_start();
        let indent = line.len() - body.len();
        if indent == 2 && !line.contains("|2") && line.contains('}') {
            format!("    {body}")
        } else {
            line.to_string()
        }
    })
}

/// Body of the first `` ```yaml `` fence whose closing fence is followed by
/// nothing but whitespace, or directly by a `"`.
fn fenced_snippet(text: &str) -> Option<&str> {
    let open = text.find(FENCE_OPEN)?;
    let body_start = open + FENCE_OPEN.len();
    let body = &text[body_start..];

    let mut search_from = 0;
    while let Some(pos) = body[search_from..].find(FENCE) {
        let close = search_from + pos;
        let after = &body[close + FENCE.len()..];
        if after.trim().is_empty() || after.starts_with('"') {
            return Some(&body[..close]);
        }
        search_from = close + 1;
    }
    None
}

fn key_range(text: &str, first_key: &str, last_key: &str) -> Option<String> {
    if first_key.is_empty() || last_key.is_empty() {
        return None;
    }

    let start = text
        .find(&format!("\n{first_key}:"))
        .or_else(|| text.find(&format!("{first_key}:")))?;
    let last = text.rfind(&format!("{last_key}:"))?;
    let end = text[last..]
        .find("\n\n")
        .map_or(text.len(), |offset| last + offset);
    if end <= start {
        return None;
    }

    let snippet = text[start..end].trim();
    let snippet = snippet.strip_prefix(FENCE_OPEN).unwrap_or(snippet);
    Some(snippet.trim_matches('`').trim().to_string())
}

fn indent_code_blocks(text: &str) -> String {
    let mut in_block = false;
    map_lines(text, |line| {
        if CODE_BLOCK_KEYS.iter().any(|key| line.contains(key)) {
            in_block = true;
            line.to_string()
        } else if [": |", ": |-", ": |2", ":"]
            .iter()
            .any(|suffix| line.ends_with(suffix))
        {
            in_block = false;
            line.to_string()
        } else if in_block {
            format!("    {line}")
        } else {
            line.to_string()
        }
    })
}

/// Parse `text`, keeping only mappings and sequences.
fn parse_structured(text: &str) -> Result<Option<Value>, serde_yaml::Error> {
    let value: Value = serde_yaml::from_str(text)?;
    Ok((value.is_mapping() || value.is_sequence()).then_some(value))
}

/// Remove one surrounding `` ```yaml `` ... `` ``` `` fence.
fn strip_fence(text: &str) -> &str {
    let text = text.trim_matches('\n');
    let text = text.strip_prefix(FENCE_OPEN).unwrap_or(text).trim_end();
    text.strip_suffix(FENCE).unwrap_or(text)
}

/// Try every [`RepairStrategy`] in order on `text`.
///
/// `original` is the response before any fence stripping; the fenced
/// snippet strategy falls back to it.
#[must_use]
pub fn try_fix_yaml(text: &str, original: &str, options: &RepairOptions) -> Option<Value> {
    for strategy in RepairStrategy::ALL {
        for candidate in strategy.candidates(text, original, options) {
            if let Ok(Some(value)) = parse_structured(&candidate) {
                info!(strategy = %strategy, "Parsed AI prediction after repair");
                return Some(value);
            }
        }
    }
    None
}

/// Parse a model response as YAML, repairing it if needed.
///
/// Returns `None` when neither the strict parse nor any repair yields a
/// mapping or sequence.
///
/// # Example
///
/// ```
/// use diffpack_repair::{RepairOptions, load_yaml};
///
/// let text = "```yaml\nreview:\n  relevant line: if a: b\n```";
/// let value = load_yaml(text, &RepairOptions::default()).unwrap();
/// assert_eq!(value["review"]["relevant line"].as_str(), Some("if a: b\n"));
/// ```
#[must_use]
pub fn load_yaml(text: &str, options: &RepairOptions) -> Option<Value> {
    let stripped = strip_fence(text);
    match parse_structured(stripped) {
        Ok(Some(value)) => return Some(value),
        Ok(None) => warn!("AI prediction is not a mapping or sequence"),
        Err(e) => warn!(error = %e, "Initial failure to parse AI prediction"),
    }

    let repaired = try_fix_yaml(stripped, text, options);
    if repaired.is_none() {
        error!(response_text = %stripped, "Failed to parse AI prediction after fallbacks");
    }
    repaired
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn opts() -> RepairOptions {
        RepairOptions::default()
    }

    #[test]
    fn test_valid_yaml_parses_strictly() {
        let value = load_yaml("key: value\nlist:\n  - 1\n  - 2", &opts()).unwrap();
        assert_eq!(value["key"].as_str(), Some("value"));
        assert_eq!(value["list"].as_sequence().map(Vec::len), Some(2));
    }

    #[test]
    fn test_fence_is_stripped() {
        let value = load_yaml("\n```yaml\na: 1\n```\n", &opts()).unwrap();
        assert_eq!(value["a"].as_i64(), Some(1));
    }

    #[test]
    fn test_colon_in_relevant_line_is_repaired() {
        let text = "review:\n  relevant line: let x = map[\"a\"]: 3\n  label: bug";
        let value = load_yaml(text, &opts()).unwrap();
        assert_eq!(
            value["review"]["relevant line"].as_str(),
            Some("let x = map[\"a\"]: 3\n")
        );
    }

    #[test]
    fn test_extra_block_keys() {
        let text = "summary: a: b";
        assert!(load_yaml(text, &opts()).is_none());

        let options = RepairOptions {
            keys_fix_yaml: vec!["summary:".to_string()],
            ..opts()
        };
        let value = load_yaml(text, &options).unwrap();
        assert_eq!(value["summary"].as_str(), Some("a: b\n"));
    }

    #[test]
    fn test_fenced_snippet_after_prose() {
        let text = "Here is my review:\n```yaml\nscore: 7\n```\nThanks!";
        assert_eq!(RepairStrategy::FencedSnippet.candidates(text, text, &opts()), Vec::<String>::new());

        let text = "Here is my review:\n```yaml\nscore: 7\n```\n";
        let value = load_yaml(text, &opts()).unwrap();
        assert_eq!(value["score"].as_i64(), Some(7));
    }

    #[test]
    fn test_fenced_snippet_closed_before_quote() {
        let text = "prefix ```yaml\nscore: 7\n```\" trailing";
        assert_eq!(
            RepairStrategy::FencedSnippet.candidates(text, text, &opts()),
            vec!["\nscore: 7\n".to_string()]
        );
    }

    #[test]
    fn test_strip_braces() {
        let candidates = RepairStrategy::StripBraces.candidates("{\na: 1\nb: [2]\n}", "", &opts());
        assert_eq!(candidates, vec!["\na: 1\nb: [2]".to_string()]);
    }

    #[test]
    fn test_key_range_salvages_inner_section() {
        let text = "garbage: [\nreview:\n  score: 3\n  effort: 2\n\ntrailing } junk";
        let options = RepairOptions {
            first_key: "review".to_string(),
            last_key: "effort".to_string(),
            ..opts()
        };
        let value = load_yaml(text, &options).unwrap();
        assert_eq!(value["review"]["effort"].as_i64(), Some(2));
    }

    #[test]
    fn test_key_range_needs_both_keys() {
        let options = RepairOptions {
            first_key: "review".to_string(),
            ..opts()
        };
        assert!(RepairStrategy::KeyRange.candidates("review:\n  a: 1", "", &options).is_empty());
    }

    #[test]
    fn test_leading_plus_is_replaced() {
        let candidates = RepairStrategy::LeadingPlus.candidates("code: |\n+  let a = 1;\n+  a", "", &opts());
        assert_eq!(candidates, vec!["code: |\n   let a = 1;\n   a".to_string()]);
    }

    #[test]
    fn test_tabs_become_spaces() {
        let value = load_yaml("root:\n\tchild: 1", &opts()).unwrap();
        assert_eq!(value["root"]["child"].as_i64(), Some(1));
        assert!(RepairStrategy::Tabs.candidates("no tabs", "", &opts()).is_empty());
    }

    #[test]
    fn test_code_block_indent() {
        let text = "existing_code:\nfn a() {}\nimproved_code: |\nfn b() {}";
        let candidates = RepairStrategy::CodeBlockIndent.candidates(text, "", &opts());
        assert_eq!(
            candidates,
            vec!["existing_code:\n    fn a() {}\nimproved_code: |\n    fn b() {}".to_string()]
        );
    }

    #[test]
    fn test_indent_indicator_candidates() {
        let text = "a: |\n    x\n  }";
        let candidates = RepairStrategy::IndentIndicator.candidates(text, "", &opts());
        assert_eq!(candidates[0], "a: |2\n    x\n  }");
        assert_eq!(candidates[1], "a: |2\n    x\n    }");
    }

    #[test]
    fn test_scalar_and_garbage_are_failures() {
        assert!(load_yaml("just a sentence", &opts()).is_none());
        assert!(load_yaml("", &opts()).is_none());
        assert!(load_yaml("[unclosed: {", &opts()).is_none());
    }

    #[test]
    fn test_strategy_names() {
        assert_eq!(RepairStrategy::BlockScalarKeys.to_string(), "block_scalar_keys");
        assert_eq!(RepairStrategy::ALL.len(), 8);
    }

    proptest! {
        #[test]
        fn prop_load_yaml_terminates(text in "\\PC{0,200}") {
            if let Some(value) = load_yaml(&text, &opts()) {
                prop_assert!(value.is_mapping() || value.is_sequence());
            }
        }
    }
}
