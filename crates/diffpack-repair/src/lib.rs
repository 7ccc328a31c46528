//! Best-effort recovery of structured data from language model output.
//!
//! Model answers are asked for as YAML (occasionally JSON) but often arrive
//! slightly broken: unquoted code after a key, wrong block indentation,
//! prose around a fenced snippet, tabs. [`load_yaml`] parses strictly first
//! and then walks an ordered list of [`RepairStrategy`] rewrites, returning
//! the first mapping or sequence that parses. Failure is `None`, never an
//! error.
//!
//! [`fix_json_escape_char`] and [`try_fix_json`] do the same for JSON.

mod json;
mod yaml;

pub use json::{fix_json_escape_char, try_fix_json};
pub use yaml::{DEFAULT_BLOCK_KEYS, RepairOptions, RepairStrategy, load_yaml, try_fix_yaml};
