use std::sync::LazyLock;

use diffpack_utils::error::PatchError;
use regex::{Captures, Regex};

/// Matches `@@ -a,b +c,d @@ section`, lengths optional.
static HUNK_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@[ ]?(.*)").expect("valid hunk header regex")
});

/// A parsed hunk header.
///
/// Omitted lengths read as `0`, so `@@ -0,0 +1 @@` yields `size2 == 0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HunkHeader {
    pub start1: i64,
    pub size1: i64,
    pub start2: i64,
    pub size2: i64,
    /// Text after the closing `@@`, usually the enclosing function
    pub section: String,
}

impl HunkHeader {
    /// Parse `line` as a hunk header.
    ///
    /// Returns `Ok(None)` when the line is not a hunk header.
    ///
    /// # Errors
    ///
    /// Returns `PatchError::InvalidHunkHeader` when a number does not fit.
    pub fn parse(line: &str) -> Result<Option<Self>, PatchError> {
        let Some(captures) = HUNK_HEADER.captures(line) else {
            return Ok(None);
        };

        Ok(Some(Self {
            start1: number(&captures, 1, line)?,
            size1: number(&captures, 2, line)?,
            start2: number(&captures, 3, line)?,
            size2: number(&captures, 4, line)?,
            section: captures
                .get(5)
                .map_or_else(String::new, |m| m.as_str().to_string()),
        }))
    }

    /// Like [`Self::parse`] but a non-header line is an error.
    ///
    /// # Errors
    ///
    /// Returns `PatchError::InvalidHunkHeader` when `line` is not a valid header.
    pub fn parse_required(line: &str) -> Result<Self, PatchError> {
        Self::parse(line)?.ok_or_else(|| PatchError::InvalidHunkHeader {
            header: line.to_string(),
            reason: "not a unified diff hunk header".to_string(),
        })
    }

    /// Whether any line of `patch` is a recognised hunk header.
    #[must_use]
    pub fn any_in(patch: &str) -> bool {
        patch
            .lines()
            .any(|line| line.starts_with("@@") && HUNK_HEADER.is_match(line))
    }
}

fn number(captures: &Captures<'_>, group: usize, line: &str) -> Result<i64, PatchError> {
    match captures.get(group) {
        None => Ok(0),
        Some(m) => m.as_str().parse().map_err(|e| PatchError::InvalidHunkHeader {
            header: line.to_string(),
            reason: format!("group {group}: {e}"),
        }),
    }
}

/// Lines `start..end` of `lines`, clamped to the slice bounds.
pub(crate) fn window<'a>(lines: &'a [&'a str], start: i64, end: i64) -> &'a [&'a str] {
    let clamp = |idx: i64| usize::try_from(idx.max(0)).unwrap_or(usize::MAX).min(lines.len());
    let (start, end) = (clamp(start), clamp(end));
    if start >= end { &[] } else { &lines[start..end] }
}
