use std::collections::BTreeMap;

use async_trait::async_trait;
use diffpack_model::{FileDiff, PackOutcome};
use diffpack_utils::error::{PackError, SourceError};

use crate::packer::{DiffPacker, PackOptions};

/// Supplies the changed files of a pull request.
///
/// Implemented by git provider clients. Rate limiting must be reported as
/// [`SourceError::RateLimited`] so callers can tell it apart.
#[async_trait]
pub trait DiffSource: Send + Sync {
    /// Changed files with patches and, where available, both file versions.
    async fn diff_files(&self) -> Result<Vec<FileDiff>, SourceError>;

    /// Bytes of code per language in the repository.
    async fn languages(&self) -> Result<BTreeMap<String, u64>, SourceError>;
}

fn log_source_error(err: &SourceError) {
    if err.is_rate_limited() {
        tracing::error!(error = %err, "Rate limit exceeded for git provider API");
    } else {
        tracing::warn!(error = %err, "Failed to fetch diff from git provider");
    }
}

async fn fetch(source: &dyn DiffSource) -> Result<(Vec<FileDiff>, BTreeMap<String, u64>), PackError> {
    let files = source.diff_files().await.inspect_err(log_source_error)?;
    let languages = source.languages().await.inspect_err(log_source_error)?;
    tracing::debug!(files = files.len(), languages = languages.len(), "Fetched diff");
    Ok((files, languages))
}

/// Fetch the diff from `source` and pack it with [`DiffPacker::pack`].
///
/// # Errors
///
/// Returns `PackError::Source` when the source fails; a rate limit is
/// passed through unchanged.
pub async fn get_pr_diff(
    source: &dyn DiffSource,
    packer: &DiffPacker,
    options: &PackOptions,
) -> Result<PackOutcome, PackError> {
    let (files, languages) = fetch(source).await?;
    Ok(packer.pack(files, &languages, options))
}

/// Fetch the diff from `source` and split it with
/// [`DiffPacker::pack_multi`] into at most `max_calls` calls.
///
/// # Errors
///
/// Returns `PackError::Source` when the source fails.
pub async fn get_pr_multi_diffs(
    source: &dyn DiffSource,
    packer: &DiffPacker,
    max_calls: usize,
    options: &PackOptions,
) -> Result<PackOutcome, PackError> {
    let (files, languages) = fetch(source).await?;
    Ok(packer.pack_multi(files, &languages, max_calls, options))
}
