use std::collections::BTreeMap;

use diffpack_model::FileDiff;
use tracing::{error, warn};

pub const AI_SUMMARY_HEADER: &str = "### AI-generated changes summary:";

/// Copy per-file change summaries onto the matching diffs.
///
/// `summaries` maps a file path to its long summary; paths are compared
/// after trimming. Returns how many files received a summary.
pub fn attach_ai_summaries(files: &mut [FileDiff], summaries: &BTreeMap<String, String>) -> usize {
    if summaries.is_empty() {
        warn!("No file summaries to attach");
        return 0;
    }

    let by_name: BTreeMap<&str, &String> = summaries
        .iter()
        .map(|(name, summary)| (name.trim(), summary))
        .collect();

    let mut matched = 0;
    for file in files.iter_mut() {
        if let Some(summary) = by_name.get(file.filename.trim()) {
            file.ai_file_summary = Some((*summary).clone());
            matched += 1;
        }
    }

    if matched == 0 {
        error!(
            summaries = summaries.len(),
            files = files.len(),
            "No file summary matches a diff file"
        );
    }
    matched
}

/// Insert `summary` below the first `## File:` heading of `rendered`.
/// Text without such a heading is returned as is.
pub(crate) fn insert_ai_summary(rendered: &str, summary: &str) -> String {
    let block = format!("{AI_SUMMARY_HEADER}\n{summary}");
    let mut lines: Vec<&str> = rendered.split('\n').collect();
    let Some(idx) = lines
        .iter()
        .position(|line| line.starts_with("## File:") || line.starts_with("## file:"))
    else {
        return rendered.to_string();
    };

    lines.insert(idx + 1, block.as_str());
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use diffpack_model::EditType;

    #[test]
    fn test_summary_goes_below_heading() {
        let rendered = "\n\n## File: 'a.rs'\n\n@@ -1 +1 @@\n-a\n+b\n";
        assert_eq!(
            insert_ai_summary(rendered, "Renames a to b."),
            "\n\n## File: 'a.rs'\n### AI-generated changes summary:\nRenames a to b.\n\n@@ -1 +1 @@\n-a\n+b\n"
        );
    }

    #[test]
    fn test_no_heading_no_summary() {
        let rendered = "\n\n## File 'gone.rs' was deleted\n";
        assert_eq!(insert_ai_summary(rendered, "gone"), rendered);
    }

    #[test]
    fn test_attach_matches_trimmed_names() {
        let mut files = vec![
            FileDiff::new("src/a.rs", None, None, None, EditType::Modified),
            FileDiff::new("src/b.rs", None, None, None, EditType::Added),
        ];
        let summaries = BTreeMap::from([(" src/a.rs ".to_string(), "Adds a".to_string())]);

        assert_eq!(attach_ai_summaries(&mut files, &summaries), 1);
        assert_eq!(files[0].ai_file_summary.as_deref(), Some("Adds a"));
        assert_eq!(files[1].ai_file_summary, None);
        assert_eq!(attach_ai_summaries(&mut files, &BTreeMap::new()), 0);
    }
}
