use std::collections::BTreeMap;

use diffpack_config::PackConfig;
use diffpack_model::{FileDiff, LanguageGroup, OTHER_LANGUAGE};

/// Group `files` by language, main languages first.
///
/// `languages` maps a language name to its share of the repository (bytes,
/// as reported by the hosting provider). Groups are ordered by descending
/// weight, ties by name. A file joins the group of the language its
/// extension maps to; files without a matching group end up in a trailing
/// "Other" group. Within a group files keep their input order.
#[must_use]
pub fn sort_files_by_main_languages(
    languages: &BTreeMap<String, u64>,
    files: Vec<FileDiff>,
    config: &PackConfig,
) -> Vec<LanguageGroup> {
    let mut ranked: Vec<(&String, u64)> = languages.iter().map(|(name, w)| (name, *w)).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    let mut groups: Vec<LanguageGroup> = ranked
        .iter()
        .filter(|(name, _)| !name.eq_ignore_ascii_case(OTHER_LANGUAGE))
        .map(|(name, weight)| LanguageGroup {
            language: (*name).clone(),
            weight: *weight,
            files: Vec::new(),
        })
        .collect();
    let mut other = LanguageGroup {
        language: OTHER_LANGUAGE.to_string(),
        weight: 0,
        files: Vec::new(),
    };

    let extension_to_language = config.extension_to_language();

    for mut file in files {
        let language = file
            .extension()
            .and_then(|ext| extension_to_language.get(&ext.to_lowercase()))
            .cloned();

        let group = language.as_deref().and_then(|lang| {
            groups
                .iter_mut()
                .find(|g| g.language.eq_ignore_ascii_case(lang))
        });

        if file.language.is_none() {
            file.language.clone_from(&language);
        }
        match group {
            Some(group) => group.files.push(file),
            None => other.files.push(file),
        }
    }

    groups.retain(|g| !g.files.is_empty());
    if !other.files.is_empty() {
        groups.push(other);
    }

    if let Some(main) = groups.first() {
        tracing::info!(language = %main.language, "PR main language");
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use diffpack_model::EditType;

    fn file(name: &str) -> FileDiff {
        FileDiff::new(name, None, None, Some("@@ -1 +1 @@\n+x".to_string()), EditType::Modified)
    }

    fn names(group: &LanguageGroup) -> Vec<&str> {
        group.files.iter().map(|f| f.filename.as_str()).collect()
    }

    #[test]
    fn test_groups_follow_language_weight() {
        let languages = BTreeMap::from([
            ("Python".to_string(), 500),
            ("Rust".to_string(), 9000),
            ("Go".to_string(), 10),
        ]);
        let groups = sort_files_by_main_languages(
            &languages,
            vec![
                file("a.py"),
                file("README"),
                file("src/lib.rs"),
                file("b.py"),
                file("main.go"),
                file("style.css"),
            ],
            &PackConfig::default(),
        );

        let order: Vec<&str> = groups.iter().map(|g| g.language.as_str()).collect();
        assert_eq!(order, vec!["Rust", "Python", "Go", "Other"]);
        assert_eq!(names(&groups[1]), vec!["a.py", "b.py"]);
        assert_eq!(names(&groups[3]), vec!["README", "style.css"]);
        assert_eq!(groups[3].weight, 0);
        assert_eq!(groups[0].files[0].language.as_deref(), Some("Rust"));
        // CSS is known but not a repository language, so it lands in Other
        assert_eq!(groups[3].files[1].language.as_deref(), Some("CSS"));
    }

    #[test]
    fn test_no_languages_means_single_other_group() {
        let groups = sort_files_by_main_languages(
            &BTreeMap::new(),
            vec![file("a.rs"), file("b.py")],
            &PackConfig::default(),
        );
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].language, OTHER_LANGUAGE);
        assert_eq!(names(&groups[0]), vec!["a.rs", "b.py"]);
    }

    #[test]
    fn test_empty_input() {
        let languages = BTreeMap::from([("Rust".to_string(), 1)]);
        assert!(sort_files_by_main_languages(&languages, Vec::new(), &PackConfig::default()).is_empty());
    }
}
