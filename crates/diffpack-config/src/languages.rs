use std::collections::BTreeMap;

const LANGUAGE_EXTENSIONS: &[(&str, &[&str])] = &[
    ("C", &[".c", ".h"]),
    ("C#", &[".cs"]),
    ("C++", &[".cc", ".cpp", ".cxx", ".hh", ".hpp", ".hxx"]),
    ("CSS", &[".css", ".scss", ".sass", ".less"]),
    ("Dart", &[".dart"]),
    ("Dockerfile", &[".dockerfile"]),
    ("Elixir", &[".ex", ".exs"]),
    ("Go", &[".go"]),
    ("HTML", &[".html", ".htm"]),
    ("Java", &[".java"]),
    ("JavaScript", &[".js", ".jsx", ".mjs", ".cjs"]),
    ("Kotlin", &[".kt", ".kts"]),
    ("Lua", &[".lua"]),
    ("PHP", &[".php"]),
    ("Perl", &[".pl", ".pm"]),
    ("Python", &[".py", ".pyi"]),
    ("R", &[".r"]),
    ("Ruby", &[".rb", ".rake"]),
    ("Rust", &[".rs"]),
    ("SQL", &[".sql"]),
    ("Scala", &[".scala", ".sc"]),
    ("Shell", &[".sh", ".bash", ".zsh"]),
    ("Swift", &[".swift"]),
    ("TypeScript", &[".ts", ".tsx"]),
    ("Vue", &[".vue"]),
];

const BAD_EXTENSIONS: &[&str] = &[
    // archives and binaries
    ".7z", ".a", ".bin", ".class", ".dll", ".dylib", ".exe", ".gz", ".jar", ".o", ".pyc",
    ".so", ".tar", ".zip",
    // media
    ".bmp", ".gif", ".ico", ".jpeg", ".jpg", ".mp3", ".mp4", ".pdf", ".png", ".svg", ".wav",
    ".webp", ".woff", ".woff2", ".ttf",
    // generated
    ".lock", ".map", ".min.js", ".snap",
];

/// Built-in language name to extensions map
#[must_use]
pub fn default_language_extension_map() -> BTreeMap<String, Vec<String>> {
    LANGUAGE_EXTENSIONS
        .iter()
        .map(|(language, extensions)| {
            (
                (*language).to_string(),
                extensions.iter().map(|e| (*e).to_string()).collect(),
            )
        })
        .collect()
}

/// Extensions of binary, media and generated files that are never packed
#[must_use]
pub fn default_bad_extensions() -> Vec<String> {
    BAD_EXTENSIONS.iter().map(|e| (*e).to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extensions_carry_leading_dot() {
        for extensions in default_language_extension_map().values() {
            assert!(extensions.iter().all(|e| e.starts_with('.')));
        }
        assert!(default_bad_extensions().iter().all(|e| e.starts_with('.')));
    }

    #[test]
    fn test_lock_files_are_bad() {
        assert!(default_bad_extensions().contains(&".lock".to_string()));
    }
}
