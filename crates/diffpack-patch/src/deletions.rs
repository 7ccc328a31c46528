use diffpack_model::EditType;

use crate::hunk::HunkHeader;

/// Drop hunks that add nothing.
///
/// A hunk survives only if at least one of its lines starts with `+`.
/// Lines before the first hunk header travel with the first hunk.
#[must_use]
pub fn omit_deletion_hunks(patch: &str) -> String {
    let mut kept: Vec<&str> = Vec::new();
    let mut hunk: Vec<&str> = Vec::new();
    let mut has_additions = false;
    let mut inside_hunk = false;

    for line in patch.lines() {
        if line.starts_with("@@") {
            if matches!(HunkHeader::parse(line), Ok(Some(_))) {
                if inside_hunk {
                    if has_additions {
                        kept.append(&mut hunk);
                    } else {
                        hunk.clear();
                    }
                }
                has_additions = false;
                hunk.push(line);
                inside_hunk = true;
            }
        } else {
            hunk.push(line);
            if line.starts_with('+') {
                has_additions = true;
            }
        }
    }
    if inside_hunk && has_additions {
        kept.append(&mut hunk);
    }

    kept.join("\n")
}

/// Shrink a patch for compression.
///
/// Returns `None` when the file was deleted outright (no new content and an
/// edit type of `Deleted` or `Unknown`); the caller lists it by name only.
/// Otherwise delete-only hunks are dropped.
#[must_use]
pub fn handle_patch_deletions(
    patch: &str,
    head_content: Option<&str>,
    filename: &str,
    edit_type: EditType,
) -> Option<String> {
    let has_new_content = head_content.is_some_and(|c| !c.is_empty());
    if !has_new_content && matches!(edit_type, EditType::Deleted | EditType::Unknown) {
        tracing::debug!(file = filename, "Minimizing deleted file");
        return None;
    }

    let shrunk = omit_deletion_hunks(patch);
    if shrunk != patch {
        tracing::debug!(file = filename, "Deletion hunks were omitted");
    }
    Some(shrunk)
}
