//! Token counting for diffpack.
//!
//! [`TokenCounter`] selects and caches one [`TokenEncoder`] per model id and
//! inflates counts for models without an exact tokenizer. [`TokenHandler`]
//! binds a counter to one model and the measured prompt size, and
//! [`clip_tokens`] truncates text to a token budget.

mod clip;
mod counter;
mod encoder;
mod handler;

pub use clip::{ClipOptions, TRUNCATION_MARKER, clip_tokens};
pub use counter::{TokenCounter, is_exact_model};
pub use encoder::{CharEstimateEncoder, TiktokenEncoder, TokenEncoder, build_encoder};
pub use handler::TokenHandler;
