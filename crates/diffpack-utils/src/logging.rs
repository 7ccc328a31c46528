//! Logging infrastructure for diffpack
//!
//! Library code logs through `tracing` macros only. Binaries and tests that
//! want to see those events call [`init_tracing`] once.

use tracing::{Level, span};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Initialize a tracing subscriber for structured logging
///
/// `RUST_LOG` wins when set. Otherwise verbose mode logs diffpack at debug
/// level with span close events, and the default logs info and above.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing(verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| {
            if verbose {
                EnvFilter::try_new("diffpack=debug,info")
            } else {
                EnvFilter::try_new("diffpack=info,warn")
            }
        })
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if verbose {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_thread_names(false)
                    .with_line_number(false)
                    .with_file(false)
                    .with_span_events(FmtSpan::CLOSE)
                    .compact(),
            )
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_thread_names(false)
                    .with_line_number(false)
                    .with_file(false)
                    .compact(),
            )
            .try_init()?;
    }

    Ok(())
}

/// Span covering one packing run
#[must_use]
pub fn pack_span(model: &str, file_count: usize, max_tokens: usize) -> tracing::Span {
    span!(
        Level::INFO,
        "pack_run",
        model = %model,
        file_count = file_count,
        max_tokens = max_tokens,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_span_can_be_entered_without_subscriber() {
        let span = pack_span("gpt-4o", 3, 128_000);
        let _guard = span.enter();
    }
}
