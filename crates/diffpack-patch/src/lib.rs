//! Unified diff processing for diffpack
//!
//! - [`extend_patch`] widens hunks with context taken from the full file
//! - [`handle_patch_deletions`] and [`omit_deletion_hunks`] shrink patches
//!   during compression
//! - [`hunks_with_line_numbers`] renders hunks as numbered `__new hunk__` /
//!   `__old hunk__` blocks
//! - [`extract_hunk_lines`] selects a line range from one side of a patch

mod deletions;
mod extend;
mod hunk;
mod line_numbers;

pub use deletions::{handle_patch_deletions, omit_deletion_hunks};
pub use extend::{ExtendOptions, extend_patch};
pub use hunk::HunkHeader;
pub use line_numbers::{Side, extract_hunk_lines, hunks_with_line_numbers};
