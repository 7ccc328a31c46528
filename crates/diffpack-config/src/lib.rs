//! Configuration for diffpack packing runs.
//!
//! Every threshold the packer, patch extender and token counter consult is a
//! named field on [`PackConfig`], so a packing run is a pure function of its
//! inputs. Configuration comes from a TOML file, the builder, or defaults.

mod builder;
mod languages;
mod model;
mod model_tokens;
mod validation;

pub use builder::PackConfigBuilder;
pub use languages::{default_bad_extensions, default_language_extension_map};
pub use model::{LargePatchPolicy, PackConfig};
pub use model_tokens::known_model_max_tokens;
