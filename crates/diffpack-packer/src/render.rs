use diffpack_model::FileDiff;
use diffpack_patch::hunks_with_line_numbers;
use diffpack_utils::error::PatchError;

/// Put a blank line before every hunk header that does not already have one.
fn separate_hunks(patch: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    for line in patch.lines() {
        if line.starts_with("@@ ") && out.last().is_some_and(|prev| !prev.is_empty()) {
            out.push("");
        }
        out.push(line);
    }
    out.join("\n")
}

/// Render one file's patch under its `## File:` heading.
///
/// With `line_numbers` the hunks become numbered `__new hunk__` /
/// `__old hunk__` blocks.
pub(crate) fn render_file(
    file: &FileDiff,
    patch: &str,
    line_numbers: bool,
) -> Result<String, PatchError> {
    if line_numbers {
        let numbered = hunks_with_line_numbers(patch, Some(file))?;
        return Ok(format!("\n\n{}\n", numbered.trim()));
    }
    Ok(format!(
        "\n\n## File: '{}'\n\n{}\n",
        file.filename.trim(),
        separate_hunks(patch).trim()
    ))
}
