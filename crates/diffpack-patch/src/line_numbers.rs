use std::fmt::Write as _;

use diffpack_model::{EditType, FileDiff};
use diffpack_utils::error::PatchError;

use crate::hunk::HunkHeader;

fn is_no_newline_marker(line: &str) -> bool {
    line.to_lowercase().contains("no newline at end of file")
}

/// Append the numbered `__new hunk__` and, when lines were removed, the
/// `__old hunk__` block of one hunk.
fn push_hunk(out: &mut String, new_lines: &[&str], old_lines: &[&str], start2: i64) {
    let has_plus = new_lines.iter().any(|l| l.starts_with('+'));
    let has_minus = old_lines.iter().any(|l| l.starts_with('-'));

    if has_plus || has_minus {
        out.truncate(out.trim_end().len());
        out.push_str("\n__new hunk__\n");
        for (line_no, line) in (start2..).zip(new_lines) {
            let _ = writeln!(out, "{line_no} {line}");
        }
    }
    if has_minus {
        out.truncate(out.trim_end().len());
        out.push_str("\n__old hunk__\n");
        for line in old_lines {
            let _ = writeln!(out, "{line}");
        }
    }
}

/// Render `patch` as line-numbered hunks.
///
/// Each hunk becomes its header, a `__new hunk__` block whose lines carry
/// new-file line numbers, and an `__old hunk__` block when the hunk removes
/// lines. With a `file`, the output starts with a `## File: '<name>'`
/// heading; a deleted file renders as a one-line note.
///
/// ```text
/// ## File: 'src/file.ts'
///
/// @@ -10,4 +10,4 @@ fn render
/// __new hunk__
/// 10  line1
/// 11 +line2
/// 12  line3
/// __old hunk__
///  line1
/// -old2
///  line3
/// ```
///
/// # Errors
///
/// Returns `PatchError::InvalidHunkHeader` when a header number overflows.
pub fn hunks_with_line_numbers(patch: &str, file: Option<&FileDiff>) -> Result<String, PatchError> {
    let mut out = match file {
        Some(file) if file.edit_type == EditType::Deleted => {
            return Ok(format!("\n\n## File '{}' was deleted\n", file.filename.trim()));
        }
        Some(file) => format!("\n\n## File: '{}'\n", file.filename.trim()),
        None => String::new(),
    };

    let patch_lines: Vec<&str> = patch.lines().collect();
    let mut new_lines: Vec<&str> = Vec::new();
    let mut old_lines: Vec<&str> = Vec::new();
    let mut prev_header: Option<&str> = None;
    let mut header_line = "";
    let mut last_header_matched = false;
    let mut start2 = -1;

    for (idx, line) in patch_lines.iter().copied().enumerate() {
        if is_no_newline_marker(line) {
            continue;
        }

        if line.starts_with("@@") {
            header_line = line;
            let parsed = HunkHeader::parse(line)?;
            if parsed.is_some() && (!new_lines.is_empty() || !old_lines.is_empty()) {
                if let Some(prev) = prev_header {
                    let _ = write!(out, "\n{prev}\n");
                }
                push_hunk(&mut out, &new_lines, &old_lines, start2);
                new_lines.clear();
                old_lines.clear();
            }
            last_header_matched = parsed.is_some();
            if let Some(header) = parsed {
                prev_header = Some(header_line);
                start2 = header.start2;
            }
        } else if line.starts_with('+') {
            new_lines.push(line);
        } else if line.starts_with('-') {
            old_lines.push(line);
        } else {
            // blank separators before a header or at the very end are layout
            if line.is_empty() && idx > 0 {
                let next_is_header = patch_lines
                    .get(idx + 1)
                    .is_some_and(|next| next.starts_with("@@"));
                if next_is_header || idx + 1 == patch_lines.len() {
                    continue;
                }
            }
            new_lines.push(line);
            old_lines.push(line);
        }
    }

    if last_header_matched && !new_lines.is_empty() {
        let _ = write!(out, "\n{header_line}\n");
        push_hunk(&mut out, &new_lines, &old_lines, start2);
    }

    out.truncate(out.trim_end().len());
    Ok(out)
}

/// Side of a patch a line range refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Old file numbering
    Left,
    /// New file numbering
    Right,
}

/// Select lines `line_start..=line_end` of one side of `patch`.
///
/// Returns the hunks that contain `line_start` under a `## File:` heading,
/// and the selected lines themselves. Lines that only exist on the other
/// side do not advance the line counter, and added lines are never selected
/// on the left side.
///
/// # Errors
///
/// Returns `PatchError::InvalidHunkHeader` for a malformed `@@` line.
pub fn extract_hunk_lines(
    patch: &str,
    file_name: &str,
    line_start: i64,
    line_end: i64,
    side: Side,
) -> Result<(String, String), PatchError> {
    let mut hunks = format!("\n\n## File: '{}'\n\n", file_name.trim());
    let mut selected = String::new();
    let mut skip_hunk = false;
    let mut offset = 0;
    let mut first_line = 0;

    for line in patch.lines() {
        if is_no_newline_marker(line) {
            continue;
        }

        if line.starts_with("@@") {
            let header = HunkHeader::parse_required(line)?;
            offset = 0;
            let (start, size) = match side {
                Side::Left => (header.start1, header.size1),
                Side::Right => (header.start2, header.size2),
            };
            skip_hunk = !(start..=start + size).contains(&line_start);
            if skip_hunk {
                continue;
            }
            first_line = start;
            let _ = write!(hunks, "\n{line}\n");
        } else if !skip_hunk {
            let other_side = match side {
                Side::Left => line.starts_with('+'),
                Side::Right => line.starts_with('-'),
            };
            let added_on_left = side == Side::Left && other_side;
            if !added_on_left && (line_start..=line_end).contains(&(first_line + offset)) {
                selected.push_str(line);
                selected.push('\n');
            }
            hunks.push_str(line);
            hunks.push('\n');
            if !other_side {
                offset += 1;
            }
        }
    }

    hunks.truncate(hunks.trim_end().len());
    selected.truncate(selected.trim_end().len());
    Ok((hunks, selected))
}
