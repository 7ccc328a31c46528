//! Packing of pull request diffs into token-budgeted prompt payloads.
//!
//! A packing run first tries the naive path: every patch extended with
//! context, all in one call. When that does not fit under the soft margin it
//! compresses: delete-only hunks are dropped, files are packed greedily by
//! descending size under the hard margin, and whatever does not fit is
//! reported by name.
//!
//! [`DiffPacker`] holds the synchronous algorithm; [`get_pr_diff`] and
//! [`get_pr_multi_diffs`] fetch input from a [`DiffSource`] first.

mod filter;
mod language;
mod metadata;
mod packer;
mod render;
mod source;
mod usage;

pub use filter::{FilterResult, filter_files};
pub use language::sort_files_by_main_languages;
pub use metadata::{AI_SUMMARY_HEADER, attach_ai_summaries};
pub use packer::{
    ADDED_FILES_HEADER, CompressedDiff, CompressedEntry, DELETED_FILES_HEADER, DiffPacker,
    ExtendedDiff, MAX_EXTRA_LINES, MODIFIED_FILES_HEADER, PackOptions,
};
pub use source::{DiffSource, get_pr_diff, get_pr_multi_diffs};
pub use usage::TokenUsage;
