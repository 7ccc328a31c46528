use diffpack_config::PackConfig;
use diffpack_utils::error::PatchError;

use crate::hunk::{HunkHeader, window};

/// Per-file settings for [`extend_patch`].
#[derive(Debug, Clone, Copy)]
pub struct ExtendOptions<'a> {
    /// Used to match `skip_extensions`
    pub filename: &'a str,
    /// Full content after the change; enables dynamic context and the
    /// base/new consistency check of leading context
    pub new_file: Option<&'a str>,
    pub allow_dynamic_context: bool,
    pub max_extra_lines_before_dynamic_context: usize,
    /// Filename suffixes that are never extended
    pub skip_extensions: &'a [String],
}

impl Default for ExtendOptions<'_> {
    fn default() -> Self {
        Self {
            filename: "",
            new_file: None,
            allow_dynamic_context: true,
            max_extra_lines_before_dynamic_context: 10,
            skip_extensions: &[],
        }
    }
}

impl<'a> ExtendOptions<'a> {
    #[must_use]
    pub fn from_config(config: &'a PackConfig, filename: &'a str, new_file: Option<&'a str>) -> Self {
        Self {
            filename,
            new_file,
            allow_dynamic_context: config.allow_dynamic_context,
            max_extra_lines_before_dynamic_context: config.max_extra_lines_before_dynamic_context,
            skip_extensions: &config.patch_extension_skip_types,
        }
    }

    fn should_skip(&self) -> bool {
        !self.filename.is_empty()
            && self
                .skip_extensions
                .iter()
                .any(|ext| self.filename.ends_with(ext.as_str()))
    }
}

/// Extend every hunk of `patch` with up to `before` lines of leading and
/// `after` lines of trailing context taken from `base`.
///
/// Each rewritten hunk is preceded by an empty line, so the returned text
/// starts with `\n` and hunks are separated by a blank line.
///
/// The patch is returned unchanged when it is empty, when both counts are
/// zero, when `base` is empty, when the filename is in
/// `options.skip_extensions`, or when no line is a hunk header.
///
/// # Example
///
/// ```
/// use diffpack_patch::{ExtendOptions, extend_patch};
///
/// let base = "line1\nline2\nline3\nline4\nline5";
/// let patch = "@@ -2,2 +2,2 @@ init()\n-line2\n+new_line2\n line3";
/// let extended = extend_patch(base, patch, 1, 1, &ExtendOptions::default());
/// assert_eq!(
///     extended,
///     "\n@@ -1,4 +1,4 @@ init()\n line1\n-line2\n+new_line2\n line3\n line4"
/// );
/// ```
#[must_use]
pub fn extend_patch(
    base: &str,
    patch: &str,
    before: usize,
    after: usize,
    options: &ExtendOptions<'_>,
) -> String {
    if patch.is_empty() || (before == 0 && after == 0) || base.is_empty() {
        return patch.to_string();
    }
    if options.should_skip() {
        tracing::debug!(file = options.filename, "Extension skipped for file type");
        return patch.to_string();
    }
    if !HunkHeader::any_in(patch) {
        return patch.to_string();
    }

    match extend_hunks(base, patch, to_i64(before), to_i64(after), options) {
        Ok(extended) => extended,
        Err(e) => {
            tracing::warn!(file = options.filename, error = %e, "Failed to extend patch");
            patch.to_string()
        }
    }
}

fn to_i64(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Extended range of one hunk: start and length on both sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Range {
    start1: i64,
    size1: i64,
    start2: i64,
    size2: i64,
}

impl Range {
    const fn unchanged(header: &HunkHeader) -> Self {
        Self {
            start1: header.start1,
            size1: header.size1,
            start2: header.start2,
            size2: header.size2,
        }
    }

    const fn shift(&mut self, by: i64) {
        self.start1 += by;
        self.start2 += by;
        self.size1 -= by;
        self.size2 -= by;
    }
}

/// Extend `header` by `lines_before` leading lines and `after` trailing
/// lines, never past the end of the base file and never below the hunk's
/// own size.
fn context_limits(header: &HunkHeader, lines_before: i64, after: i64, base_len: i64) -> Range {
    // insertion before the first line has no base context on either side
    if header.start1 == 0 {
        return Range::unchanged(header);
    }

    let start1 = 1.max(header.start1.saturating_sub(lines_before));
    let start2 = 1.max(header.start2.saturating_sub(lines_before));
    let mut size1 = header.size1 + (header.start1 - start1) + after;
    let mut size2 = header.size2 + (header.start2 - start2) + after;

    let overflow = start1 - 1 + size1 - base_len;
    if overflow > 0 {
        size1 = (size1 - overflow).max(header.size1);
        size2 = (size2 - overflow).max(header.size2);
    }

    Range {
        start1,
        size1,
        start2,
        size2,
    }
}

fn as_context(lines: &[&str]) -> Vec<String> {
    lines.iter().map(|line| format!(" {line}")).collect()
}

/// A hunk is only extended when its first context line matches the base
/// file at `start1`.
fn hunk_matches_file(header_idx: usize, patch_lines: &[&str], base_lines: &[&str], start1: i64) -> bool {
    let Some(first) = patch_lines.get(header_idx + 1) else {
        return true;
    };
    if !first.starts_with(' ') {
        return true;
    }
    let Some(base_line) = usize::try_from(start1 - 1)
        .ok()
        .and_then(|idx| base_lines.get(idx))
    else {
        return true;
    };

    if first.trim() == base_line.trim() {
        true
    } else {
        tracing::info!(
            line = start1,
            "Invalid hunk, line in hunk header doesn't match the original file content"
        );
        false
    }
}

fn trailing_context(base_lines: &[&str], header: &HunkHeader, after: i64) -> Vec<String> {
    let end_of_hunk = header.start1 + header.size1;
    if end_of_hunk == 0 {
        return Vec::new();
    }
    as_context(window(base_lines, end_of_hunk - 1, end_of_hunk - 1 + after))
}

struct Extender<'a> {
    base_lines: Vec<&'a str>,
    new_lines: Vec<&'a str>,
    before: i64,
    after: i64,
    allow_dynamic_context: bool,
    max_dynamic_before: i64,
}

impl Extender<'_> {
    fn base_len(&self) -> i64 {
        to_i64(self.base_lines.len())
    }

    /// Leading context and rewritten header for one valid hunk.
    fn extend(&self, header: &HunkHeader) -> (Range, Vec<String>, String) {
        let mut section = header.section.clone();

        let mut range = if self.allow_dynamic_context && !self.new_lines.is_empty() {
            match self.dynamic_range(header) {
                Some(range) => {
                    section.clear();
                    range
                }
                None => context_limits(header, self.before, self.after, self.base_len()),
            }
        } else {
            context_limits(header, self.before, self.after, self.base_len())
        };

        let mut leading = as_context(window(&self.base_lines, range.start1 - 1, header.start1 - 1));

        if !self.new_lines.is_empty() {
            let leading_new = as_context(window(&self.new_lines, range.start2 - 1, header.start2 - 1));
            if leading != leading_new {
                // keep the longest common tail of the two context blocks
                let matched = (0..leading.len())
                    .find(|&i| leading[i..] == *leading_new.get(i..).unwrap_or(&[]));
                match matched {
                    Some(i) => {
                        leading.drain(..i);
                        range.shift(to_i64(i));
                    }
                    None => {
                        range = context_limits(header, 0, self.after, self.base_len());
                        leading.clear();
                    }
                }
            }
        }

        if !section.is_empty()
            && !self.allow_dynamic_context
            && leading.iter().any(|line| line.contains(section.as_str()))
        {
            section.clear();
        }

        (range, leading, section)
    }

    /// Range starting at the hunk's section header when it is found within
    /// the dynamic window and the base and new files agree from there on.
    fn dynamic_range(&self, header: &HunkHeader) -> Option<Range> {
        if header.section.trim().is_empty() {
            return None;
        }

        let mut range = context_limits(header, self.max_dynamic_before, self.after, self.base_len());
        let before_base = window(&self.base_lines, range.start1 - 1, header.start1 - 1);
        let before_new = window(&self.new_lines, range.start2 - 1, header.start2 - 1);

        let idx = before_base
            .iter()
            .position(|line| line.contains(header.section.as_str()))?;
        if before_base[idx..] != *before_new.get(idx..).unwrap_or(&[]) {
            return None;
        }

        range.shift(to_i64(idx));
        Some(range)
    }
}

fn extend_hunks(
    base: &str,
    patch: &str,
    before: i64,
    after: i64,
    options: &ExtendOptions<'_>,
) -> Result<String, PatchError> {
    let extender = Extender {
        base_lines: base.lines().collect(),
        new_lines: options.new_file.map(|s| s.lines().collect()).unwrap_or_default(),
        before,
        after,
        allow_dynamic_context: options.allow_dynamic_context,
        max_dynamic_before: to_i64(options.max_extra_lines_before_dynamic_context),
    };
    let patch_lines: Vec<&str> = patch.lines().collect();

    let mut out: Vec<String> = Vec::with_capacity(patch_lines.len() * 2);
    let mut current: Option<HunkHeader> = None;
    let mut is_valid_hunk = true;

    for (idx, line) in patch_lines.iter().enumerate() {
        if line.starts_with("@@")
            && let Some(header) = HunkHeader::parse(line)?
        {
            if is_valid_hunk
                && after > 0
                && let Some(prev) = &current
            {
                out.extend(trailing_context(&extender.base_lines, prev, after));
            }

            is_valid_hunk = hunk_matches_file(idx, &patch_lines, &extender.base_lines, header.start1);

            let (range, leading, section) = if is_valid_hunk {
                extender.extend(&header)
            } else {
                (Range::unchanged(&header), Vec::new(), header.section.clone())
            };

            out.push(String::new());
            out.push(format!(
                "@@ -{},{} +{},{} @@ {}",
                range.start1, range.size1, range.start2, range.size2, section
            ));
            out.extend(leading);
            current = Some(header);
            continue;
        }
        out.push((*line).to_string());
    }

    if is_valid_hunk
        && after > 0
        && let Some(prev) = &current
    {
        out.extend(trailing_context(&extender.base_lines, prev, after));
    }

    Ok(out.join("\n"))
}
