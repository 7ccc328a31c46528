use diffpack_config::PackConfig;
use diffpack_model::FileDiff;
use globset::GlobSet;

/// Files split into those to pack and those left out by policy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterResult {
    pub kept: Vec<FileDiff>,
    /// Names of files matched by an ignore glob or a bad extension
    pub skipped: Vec<String>,
}

/// Drop files matched by `ignore` or carrying one of the configured bad
/// extensions. Order of the kept files is preserved.
#[must_use]
pub fn filter_files(files: Vec<FileDiff>, ignore: &GlobSet, config: &PackConfig) -> FilterResult {
    let mut result = FilterResult::default();

    for file in files {
        let lowered = file.filename.to_lowercase();
        let bad_extension = config
            .bad_extensions
            .iter()
            .any(|ext| lowered.ends_with(&ext.to_lowercase()));

        if bad_extension || ignore.is_match(&file.filename) {
            tracing::debug!(file = %file.filename, bad_extension, "File filtered out");
            result.skipped.push(file.filename);
        } else {
            result.kept.push(file);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use diffpack_model::EditType;

    fn file(name: &str) -> FileDiff {
        FileDiff::new(name, None, None, Some("@@ -1 +1 @@\n+x".to_string()), EditType::Modified)
    }

    #[test]
    fn test_filters_bad_extensions_and_globs() {
        let config = PackConfig {
            ignore_globs: vec!["docs/**".to_string()],
            ..PackConfig::default()
        };
        let matcher = config.ignore_matcher().unwrap();
        let result = filter_files(
            vec![
                file("src/main.rs"),
                file("Cargo.lock"),
                file("docs/guide.rs"),
                file("assets/LOGO.PNG"),
                file("src/lib.rs"),
            ],
            &matcher,
            &config,
        );

        let kept: Vec<&str> = result.kept.iter().map(|f| f.filename.as_str()).collect();
        assert_eq!(kept, vec!["src/main.rs", "src/lib.rs"]);
        assert_eq!(result.skipped, vec!["Cargo.lock", "docs/guide.rs", "assets/LOGO.PNG"]);
    }
}
