//! Data model shared by the diffpack crates
//!
//! These are the records a git hosting collaborator hands in (`FileDiff`),
//! the grouping used to order them (`LanguageGroup`), and what a packing run
//! hands back (`PackedCall`, `PackOutcome`) under a `TokenBudget`.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// How a file changed in the change-set.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum EditType {
    Added,
    Modified,
    Deleted,
    Renamed,
    /// Provider did not report a status
    #[default]
    Unknown,
}

/// One changed file of a pull request.
///
/// Built once per fetch. During a packing run only `tokens` (and `language`,
/// when grouping assigns one) are written.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FileDiff {
    /// Path of the file after the change
    pub filename: String,
    /// Full content before the change
    #[serde(default)]
    pub base_content: Option<String>,
    /// Full content after the change
    #[serde(default)]
    pub head_content: Option<String>,
    /// Unified diff text; absent for binary files
    #[serde(default)]
    pub patch: Option<String>,
    #[serde(default)]
    pub edit_type: EditType,
    /// Previous path for renames
    #[serde(default)]
    pub old_filename: Option<String>,
    /// Language assigned during grouping
    #[serde(default)]
    pub language: Option<String>,
    /// Token cost of the rendered patch, cached once measured
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<usize>,
    /// Long change summary shown under the file heading when AI metadata
    /// is enabled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_file_summary: Option<String>,
}

impl FileDiff {
    /// Create a diff record with a patch and both file versions.
    #[must_use]
    pub fn new(
        filename: impl Into<String>,
        base_content: Option<String>,
        head_content: Option<String>,
        patch: Option<String>,
        edit_type: EditType,
    ) -> Self {
        Self {
            filename: filename.into(),
            base_content,
            head_content,
            patch,
            edit_type,
            ..Self::default()
        }
    }

    /// The patch text, if present and not empty.
    #[must_use]
    pub fn patch_text(&self) -> Option<&str> {
        self.patch.as_deref().filter(|p| !p.is_empty())
    }

    /// Extension including the leading dot (`.rs`), taken after the last dot.
    #[must_use]
    pub fn extension(&self) -> Option<&str> {
        let name = self.filename.rsplit('/').next().unwrap_or(&self.filename);
        name.rfind('.').map(|idx| &name[idx..])
    }
}

/// Files of one language, ordered by how much of the repository that
/// language makes up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageGroup {
    pub language: String,
    /// Relative ordering weight (bytes reported by the provider, `0` for "Other")
    pub weight: u64,
    pub files: Vec<FileDiff>,
}

/// Name of the catch-all group that always comes last.
pub const OTHER_LANGUAGE: &str = "Other";

/// One prompt-sized payload of concatenated per-file diff text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackedCall {
    pub content: String,
    /// Running token total, prompt tokens included
    pub token_count: usize,
    /// Included filenames in the order they appear in `content`
    pub files: Vec<String>,
    /// BLAKE3 hex digest of `content`
    pub content_hash: String,
}

impl PackedCall {
    #[must_use]
    pub fn new(content: String, token_count: usize, files: Vec<String>) -> Self {
        let content_hash = blake3::hash(content.as_bytes()).to_hex().to_string();
        Self {
            content,
            token_count,
            files,
            content_hash,
        }
    }

    /// Whether `filename` was packed into this call.
    #[must_use]
    pub fn contains(&self, filename: &str) -> bool {
        self.files.iter().any(|f| f == filename)
    }
}

/// Token limits for one model.
///
/// `soft_margin` decides whether compression is needed at all;
/// `hard_margin` is the floor no packed call may cross.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBudget {
    pub max_tokens: usize,
    pub soft_margin: usize,
    pub hard_margin: usize,
}

impl TokenBudget {
    #[must_use]
    pub const fn new(max_tokens: usize, soft_margin: usize, hard_margin: usize) -> Self {
        Self {
            max_tokens,
            soft_margin,
            hard_margin,
        }
    }

    /// Tokens kept free for the model's answer.
    #[must_use]
    pub const fn reserved_output_tokens(&self) -> usize {
        self.hard_margin
    }

    /// Largest total any packed call may reach.
    #[must_use]
    pub const fn hard_limit(&self) -> usize {
        self.max_tokens.saturating_sub(self.hard_margin)
    }

    #[must_use]
    pub const fn soft_limit(&self) -> usize {
        self.max_tokens.saturating_sub(self.soft_margin)
    }

    /// True when the naive, uncompressed diff can be used as is.
    #[must_use]
    pub const fn fits_without_compression(&self, total_tokens: usize) -> bool {
        total_tokens.saturating_add(self.soft_margin) < self.max_tokens
    }
}

/// Result of one packing run.
///
/// Every file with a non-empty patch ends up in exactly one call or in one
/// of the three lists.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PackOutcome {
    pub calls: Vec<PackedCall>,
    /// Files whose patch did not fit into any call
    pub remaining_files: Vec<String>,
    /// Files reduced to a "was deleted" note during compression
    pub deleted_files: Vec<String>,
    /// Files filtered out by policy or that failed to render
    pub skipped_files: Vec<String>,
    /// Whether the compression path ran
    pub compressed: bool,
}

impl PackOutcome {
    /// True when nothing could be packed; callers report that the diff
    /// could not be prepared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// The first call's content, or `""` when nothing was packed.
    #[must_use]
    pub fn primary_content(&self) -> &str {
        self.calls.first().map_or("", |c| c.content.as_str())
    }

    /// Whether `filename` appears in any packed call.
    #[must_use]
    pub fn is_packed(&self, filename: &str) -> bool {
        self.calls.iter().any(|c| c.contains(filename))
    }
}
