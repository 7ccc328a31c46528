//! diffpack - token-budgeted diff packing for pull request review
//!
//! This crate turns the changed files of a pull request into one or more
//! prompt payloads that fit a model's context window, and recovers
//! structured data from the model's near-miss YAML or JSON answer.
//!
//! # Quick Start
//!
//! ```
//! use std::collections::BTreeMap;
//! use std::sync::Arc;
//!
//! use diffpack::{
//!     CharEstimateEncoder, DiffPacker, EditType, FileDiff, PackConfig, PackOptions,
//!     TokenCounter, TokenHandler,
//! };
//!
//! let counter = Arc::new(TokenCounter::with_encoder(0.0, Arc::new(CharEstimateEncoder)));
//! let handler = TokenHandler::new(counter, "gpt-4", "You review code.", "Review this diff.");
//! let packer = DiffPacker::new(PackConfig::default(), handler).unwrap();
//!
//! let file = FileDiff::new(
//!     "src/lib.rs",
//!     Some("fn a() {}\n".to_string()),
//!     Some("fn a() {}\nfn b() {}\n".to_string()),
//!     Some("@@ -1,1 +1,2 @@\n fn a() {}\n+fn b() {}".to_string()),
//!     EditType::Modified,
//! );
//! let outcome = packer.pack(vec![file], &BTreeMap::new(), &PackOptions::default());
//!
//! assert_eq!(outcome.calls.len(), 1);
//! assert!(outcome.primary_content().contains("## File: 'src/lib.rs'"));
//! ```
//!
//! # Crates
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`config`] | `PackConfig`, TOML loading, builder, model token table |
//! | [`model`] | `FileDiff`, `PackedCall`, `TokenBudget`, `PackOutcome` |
//! | [`tokens`] | `TokenCounter`, `TokenHandler`, `clip_tokens` |
//! | [`patch`] | `extend_patch`, deletion hunk omission, line-numbered hunks |
//! | [`packer`] | `DiffPacker`, `DiffSource`, `get_pr_diff`, `get_pr_multi_diffs` |
//! | [`repair`] | `load_yaml`, `try_fix_json`, `fix_json_escape_char` |
//!
//! # Logging
//!
//! Every crate logs through `tracing`. Binaries embedding diffpack can call
//! [`init_tracing`] or install their own subscriber.

pub use diffpack_config as config;
pub use diffpack_model as model;
pub use diffpack_packer as packer;
pub use diffpack_patch as patch;
pub use diffpack_repair as repair;
pub use diffpack_tokens as tokens;

pub use diffpack_config::{LargePatchPolicy, PackConfig, PackConfigBuilder};
pub use diffpack_model::{EditType, FileDiff, LanguageGroup, PackOutcome, PackedCall, TokenBudget};
pub use diffpack_packer::{
    DiffPacker, DiffSource, PackOptions, attach_ai_summaries, get_pr_diff, get_pr_multi_diffs,
    sort_files_by_main_languages,
};
pub use diffpack_patch::{ExtendOptions, extend_patch, hunks_with_line_numbers};
pub use diffpack_repair::{RepairOptions, fix_json_escape_char, load_yaml, try_fix_json};
pub use diffpack_tokens::{
    CharEstimateEncoder, ClipOptions, TokenCounter, TokenEncoder, TokenHandler, clip_tokens,
};
pub use diffpack_utils::error::{
    ConfigError, PackError, PatchError, SourceError, TokenizerError, UserFriendlyError,
};
pub use diffpack_utils::logging::init_tracing;
