use std::collections::BTreeMap;

use diffpack_config::{LargePatchPolicy, PackConfig};
use diffpack_model::{EditType, FileDiff, LanguageGroup, PackOutcome, PackedCall, TokenBudget};
use diffpack_patch::{ExtendOptions, extend_patch, handle_patch_deletions};
use diffpack_tokens::{ClipOptions, TokenHandler};
use diffpack_utils::error::PackError;
use diffpack_utils::logging::pack_span;
use globset::GlobSet;
use tracing::{debug, info, warn};

use crate::filter::filter_files;
use crate::language::sort_files_by_main_languages;
use crate::metadata::insert_ai_summary;
use crate::render::render_file;
use crate::usage::TokenUsage;

/// Upper bound for configured context lines around each hunk.
pub const MAX_EXTRA_LINES: usize = 10;

pub const ADDED_FILES_HEADER: &str = "Additional added files (insufficient token budget to process):\n";
pub const MODIFIED_FILES_HEADER: &str =
    "Additional modified files (insufficient token budget to process):\n";
pub const DELETED_FILES_HEADER: &str = "Deleted files:\n";

/// Name lists are only appended while more than this many tokens are left.
const TOP_UP_MIN_TOKENS: usize = 10;

/// Per-run switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PackOptions {
    /// Render hunks as numbered `__new hunk__` / `__old hunk__` blocks
    pub add_line_numbers_to_hunks: bool,
    /// Do not extend hunks with context lines
    pub disable_extra_lines: bool,
    /// Allow compression to spill into up to `large_pr_max_calls` calls
    pub large_pr_handling: bool,
}

/// Every patch extended with context and rendered, before any budget check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtendedDiff {
    /// Rendered per-file patches, in group order
    pub patches: Vec<String>,
    pub files: Vec<String>,
    /// Prompt tokens plus every rendered patch
    pub total_tokens: usize,
    /// Files that failed to render
    pub skipped_files: Vec<String>,
}

impl ExtendedDiff {
    fn into_call(self) -> Option<PackedCall> {
        if self.files.is_empty() {
            return None;
        }
        Some(PackedCall::new(
            self.patches.join("\n"),
            self.total_tokens,
            self.files,
        ))
    }
}

/// One file prepared for compressed packing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedEntry {
    pub filename: String,
    pub edit_type: EditType,
    /// Rendered patch with delete-only hunks removed
    pub rendered: String,
    pub tokens: usize,
}

/// Output of the compression pre-pass, ready for greedy packing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompressedDiff {
    /// Largest files first within each language group
    pub entries: Vec<CompressedEntry>,
    /// Files deleted outright, listed by name only
    pub deleted_files: Vec<String>,
    /// Files whose patch had nothing left after dropping deletions
    pub emptied_files: Vec<(String, EditType)>,
    /// Files that failed to render
    pub skipped_files: Vec<String>,
}

/// Packs per-file diffs into prompt payloads that fit a model's budget.
///
/// A packer is bound to one configuration and one [`TokenHandler`]; the
/// budget is resolved once from the handler's model.
#[derive(Debug, Clone)]
pub struct DiffPacker {
    config: PackConfig,
    handler: TokenHandler,
    budget: TokenBudget,
    ignore: GlobSet,
}

impl DiffPacker {
    /// Create a packer for the handler's model.
    ///
    /// # Errors
    ///
    /// Returns `PackError::Config` when the configuration is invalid or the
    /// model has no known context size.
    pub fn new(config: PackConfig, handler: TokenHandler) -> Result<Self, PackError> {
        config.validate()?;
        let budget = config.token_budget(handler.model())?;
        let ignore = config.ignore_matcher()?;
        debug!(
            model = handler.model(),
            max_tokens = budget.max_tokens,
            hard_limit = budget.hard_limit(),
            soft_limit = budget.soft_limit(),
            "Resolved token budget"
        );
        Ok(Self {
            config,
            handler,
            budget,
            ignore,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &PackConfig {
        &self.config
    }

    #[must_use]
    pub const fn budget(&self) -> &TokenBudget {
        &self.budget
    }

    #[must_use]
    pub const fn handler(&self) -> &TokenHandler {
        &self.handler
    }

    /// Context lines before and after each hunk, capped at
    /// [`MAX_EXTRA_LINES`].
    #[must_use]
    pub fn extra_lines(&self, options: &PackOptions) -> (usize, usize) {
        if options.disable_extra_lines {
            return (0, 0);
        }
        let cap = |name: &str, lines: usize| {
            if lines > MAX_EXTRA_LINES {
                warn!(setting = name, lines, cap = MAX_EXTRA_LINES, "Extra lines capped");
                MAX_EXTRA_LINES
            } else {
                lines
            }
        };
        (
            cap("patch_extra_lines_before", self.config.patch_extra_lines_before),
            cap("patch_extra_lines_after", self.config.patch_extra_lines_after),
        )
    }

    /// Pack `files` into one call, or into up to `large_pr_max_calls` calls
    /// when `options.large_pr_handling` is set.
    ///
    /// `languages` maps language names to their byte share of the
    /// repository and decides the order files are considered in.
    #[must_use]
    pub fn pack(
        &self,
        files: Vec<FileDiff>,
        languages: &BTreeMap<String, u64>,
        options: &PackOptions,
    ) -> PackOutcome {
        let span = pack_span(self.handler.model(), files.len(), self.budget.max_tokens);
        let _enter = span.enter();

        let (mut groups, mut outcome) = self.prepare(files, languages);
        let (before, after) = self.extra_lines(options);
        let extended = self.extended_diff(&mut groups, options, before, after);
        outcome.skipped_files.extend(extended.skipped_files.iter().cloned());

        if self.budget.fits_without_compression(extended.total_tokens) {
            info!(
                total_tokens = extended.total_tokens,
                files = extended.files.len(),
                "Diff fits without compression"
            );
            outcome.calls.extend(extended.into_call());
            return outcome;
        }

        info!(
            total_tokens = extended.total_tokens,
            soft_limit = self.budget.soft_limit(),
            "Tokens exceed the soft limit, compressing diff"
        );
        outcome.compressed = true;

        let compressed = self.compressed_diff(&mut groups, options);
        merge_skipped(&mut outcome.skipped_files, &compressed);
        outcome.deleted_files = compressed.deleted_files;

        let mut remaining = compressed.emptied_files;
        let mut pending = compressed.entries;
        let passes = if options.large_pr_handling {
            self.config.large_pr_max_calls
        } else {
            1
        };

        for pass in 0..passes {
            if pending.is_empty() {
                break;
            }
            let (call, rest) = self.greedy_call(pending);
            pending = rest;
            match call {
                Some(call) => {
                    debug!(pass, files = call.files.len(), tokens = call.token_count, "Packed call");
                    outcome.calls.push(call);
                }
                None => break,
            }
        }
        remaining.extend(pending.into_iter().map(|e| (e.filename, e.edit_type)));

        if outcome.calls.len() == 1
            && let Some(call) = outcome.calls.pop()
        {
            outcome
                .calls
                .push(self.append_file_lists(call, &remaining, &outcome.deleted_files));
        }

        outcome.remaining_files = remaining.into_iter().map(|(name, _)| name).collect();
        if !outcome.remaining_files.is_empty() {
            info!(count = outcome.remaining_files.len(), "Files left out for lack of budget");
        }
        outcome
    }

    /// Pack `files` into at most `max_calls` calls of up to the soft limit
    /// each.
    ///
    /// The naive single call is used when it fits. Otherwise files are
    /// compressed and assigned to calls in order; a file too large for a
    /// call on its own is skipped or clipped per `large_patch_policy`. Once
    /// `max_calls` calls are full every later file is left out. A
    /// `max_calls` of zero is treated as one.
    #[must_use]
    pub fn pack_multi(
        &self,
        files: Vec<FileDiff>,
        languages: &BTreeMap<String, u64>,
        max_calls: usize,
        options: &PackOptions,
    ) -> PackOutcome {
        let span = pack_span(self.handler.model(), files.len(), self.budget.max_tokens);
        let _enter = span.enter();
        let max_calls = max_calls.max(1);

        let (mut groups, mut outcome) = self.prepare(files, languages);
        let (before, after) = self.extra_lines(options);
        let extended = self.extended_diff(&mut groups, options, before, after);
        outcome.skipped_files.extend(extended.skipped_files.iter().cloned());

        if self.budget.fits_without_compression(extended.total_tokens) {
            info!(total_tokens = extended.total_tokens, "Diff fits in a single call");
            outcome.calls.extend(extended.into_call());
            return outcome;
        }

        outcome.compressed = true;
        let compressed = self.compress(&mut groups, options, self.config.enable_ai_metadata);
        merge_skipped(&mut outcome.skipped_files, &compressed);
        outcome.deleted_files = compressed.deleted_files;
        outcome
            .remaining_files
            .extend(compressed.emptied_files.into_iter().map(|(name, _)| name));

        let prompt_tokens = self.handler.prompt_tokens();
        let soft_limit = self.budget.soft_limit();
        let mut usage = TokenUsage::new(prompt_tokens, soft_limit);
        let mut patches: Vec<String> = Vec::new();
        let mut call_files: Vec<String> = Vec::new();

        let mut entries = compressed.entries.into_iter();
        while let Some(entry) = entries.next() {
            let entry = if prompt_tokens.saturating_add(entry.tokens) > soft_limit {
                match self.fit_oversized(entry) {
                    Ok(entry) => entry,
                    Err(filename) => {
                        outcome.remaining_files.push(filename);
                        continue;
                    }
                }
            } else {
                entry
            };

            if usage.would_exceed(entry.tokens) {
                if !call_files.is_empty() {
                    outcome.calls.push(PackedCall::new(
                        patches.join("\n"),
                        usage.used,
                        std::mem::take(&mut call_files),
                    ));
                    patches.clear();
                    usage = TokenUsage::new(prompt_tokens, soft_limit);
                }
                if outcome.calls.len() >= max_calls {
                    warn!(max_calls, "Reached the maximum number of calls, leaving out the rest");
                    outcome.remaining_files.push(entry.filename);
                    outcome
                        .remaining_files
                        .extend(entries.by_ref().map(|e| e.filename));
                    break;
                }
            }

            usage.add(entry.tokens);
            patches.push(entry.rendered);
            call_files.push(entry.filename);
        }

        if !call_files.is_empty() {
            outcome
                .calls
                .push(PackedCall::new(patches.join("\n"), usage.used, call_files));
        }

        info!(
            calls = outcome.calls.len(),
            remaining = outcome.remaining_files.len(),
            "Split diff into calls"
        );
        outcome
    }

    /// Filter out ignored files and group the rest by language.
    fn prepare(
        &self,
        files: Vec<FileDiff>,
        languages: &BTreeMap<String, u64>,
    ) -> (Vec<LanguageGroup>, PackOutcome) {
        let filtered = filter_files(files, &self.ignore, &self.config);
        let groups = sort_files_by_main_languages(languages, filtered.kept, &self.config);
        let outcome = PackOutcome {
            skipped_files: filtered.skipped,
            ..PackOutcome::default()
        };
        (groups, outcome)
    }

    /// Extend and render every patch, caching each file's token count.
    pub fn extended_diff(
        &self,
        groups: &mut [LanguageGroup],
        options: &PackOptions,
        before: usize,
        after: usize,
    ) -> ExtendedDiff {
        let mut diff = ExtendedDiff {
            total_tokens: self.handler.prompt_tokens(),
            ..ExtendedDiff::default()
        };

        for file in groups.iter_mut().flat_map(|g| g.files.iter_mut()) {
            let Some(patch) = file.patch_text() else {
                continue;
            };

            let extend_options =
                ExtendOptions::from_config(&self.config, &file.filename, file.head_content.as_deref());
            let extended = extend_patch(
                file.base_content.as_deref().unwrap_or(""),
                patch,
                before,
                after,
                &extend_options,
            );

            let rendered = match render_file(file, &extended, options.add_line_numbers_to_hunks) {
                Ok(rendered) => rendered,
                Err(e) => {
                    warn!(file = %file.filename, error = %e, "Failed to render patch, skipping file");
                    diff.skipped_files.push(file.filename.clone());
                    continue;
                }
            };

            let rendered = with_ai_summary(file, rendered, self.config.enable_ai_metadata);
            let tokens = self.handler.count_tokens(&rendered);
            debug!(file = %file.filename, tokens, "Extended patch");
            file.tokens = Some(tokens);
            diff.total_tokens = diff.total_tokens.saturating_add(tokens);
            diff.patches.push(rendered);
            diff.files.push(file.filename.clone());
        }

        diff
    }

    /// Drop deletion-only hunks, re-render without extra lines and order
    /// files by size, largest first within each language group. File
    /// summaries are not added here.
    pub fn compressed_diff(
        &self,
        groups: &mut [LanguageGroup],
        options: &PackOptions,
    ) -> CompressedDiff {
        self.compress(groups, options, false)
    }

    fn compress(
        &self,
        groups: &mut [LanguageGroup],
        options: &PackOptions,
        ai_metadata: bool,
    ) -> CompressedDiff {
        let mut diff = CompressedDiff::default();

        for group in groups.iter_mut() {
            group
                .files
                .sort_by(|a, b| b.tokens.unwrap_or(0).cmp(&a.tokens.unwrap_or(0)));

            for file in &group.files {
                let Some(patch) = file.patch_text() else {
                    continue;
                };

                let Some(shrunk) = handle_patch_deletions(
                    patch,
                    file.head_content.as_deref(),
                    &file.filename,
                    file.edit_type,
                ) else {
                    if !diff.deleted_files.contains(&file.filename) {
                        diff.deleted_files.push(file.filename.clone());
                    }
                    continue;
                };

                if shrunk.trim().is_empty() {
                    debug!(file = %file.filename, "Nothing left after omitting deletions");
                    diff.emptied_files.push((file.filename.clone(), file.edit_type));
                    continue;
                }

                match render_file(file, &shrunk, options.add_line_numbers_to_hunks) {
                    Ok(rendered) => {
                        let rendered = with_ai_summary(file, rendered, ai_metadata);
                        let tokens = self.handler.count_tokens(&rendered);
                        diff.entries.push(CompressedEntry {
                            filename: file.filename.clone(),
                            edit_type: file.edit_type,
                            rendered,
                            tokens,
                        });
                    }
                    Err(e) => {
                        warn!(file = %file.filename, error = %e, "Failed to render patch, skipping file");
                        diff.skipped_files.push(file.filename.clone());
                    }
                }
            }
        }

        diff
    }

    /// Fill one call under the hard limit, whole files only. Entries that do
    /// not fit are returned in their original order.
    fn greedy_call(
        &self,
        entries: Vec<CompressedEntry>,
    ) -> (Option<PackedCall>, Vec<CompressedEntry>) {
        let mut usage = TokenUsage::new(self.handler.prompt_tokens(), self.budget.hard_limit());
        let mut patches = Vec::new();
        let mut files = Vec::new();
        let mut rest = Vec::new();

        for entry in entries {
            if usage.would_exceed(entry.tokens) {
                debug!(file = %entry.filename, tokens = entry.tokens, "File does not fit the call");
                rest.push(entry);
                continue;
            }
            usage.add(entry.tokens);
            patches.push(entry.rendered);
            files.push(entry.filename);
        }

        if files.is_empty() {
            return (None, rest);
        }
        (Some(PackedCall::new(patches.join("\n"), usage.used, files)), rest)
    }

    /// Apply `large_patch_policy` to a file too large for a call of its own.
    /// Returns the filename when the file has to be left out.
    fn fit_oversized(&self, entry: CompressedEntry) -> Result<CompressedEntry, String> {
        match self.config.large_patch_policy {
            LargePatchPolicy::Skip => {
                warn!(file = %entry.filename, tokens = entry.tokens, "Patch too large, skipping");
                Err(entry.filename)
            }
            LargePatchPolicy::Clip => {
                let prompt_tokens = self.handler.prompt_tokens();
                let soft_limit = self.budget.soft_limit();
                let delta = i64::try_from(soft_limit.saturating_sub(prompt_tokens)).unwrap_or(i64::MAX);
                let clipped = self.handler.clip(
                    &entry.rendered,
                    delta,
                    &ClipOptions {
                        add_truncation_marker: true,
                        delete_last_line: true,
                        num_input_tokens: Some(entry.tokens),
                    },
                );
                let tokens = self.handler.count_tokens(&clipped);
                if clipped.trim().is_empty() || prompt_tokens.saturating_add(tokens) > soft_limit {
                    warn!(file = %entry.filename, "Patch too large even after clipping, skipping");
                    return Err(entry.filename);
                }
                warn!(file = %entry.filename, from = entry.tokens, to = tokens, "Patch clipped to fit");
                Ok(CompressedEntry {
                    rendered: clipped,
                    tokens,
                    ..entry
                })
            }
        }
    }

    /// Append the names of files that did not make it into the only call,
    /// as far as the hard limit allows.
    fn append_file_lists(
        &self,
        call: PackedCall,
        remaining: &[(String, EditType)],
        deleted_files: &[String],
    ) -> PackedCall {
        let mut added = Vec::new();
        let mut modified = Vec::new();
        let mut deleted: Vec<&str> = deleted_files.iter().map(String::as_str).collect();
        for (name, edit_type) in remaining {
            match edit_type {
                EditType::Added => added.push(name.as_str()),
                EditType::Modified | EditType::Renamed => modified.push(name.as_str()),
                EditType::Deleted if !deleted.contains(&name.as_str()) => deleted.push(name.as_str()),
                EditType::Deleted | EditType::Unknown => {}
            }
        }

        let hard_limit = self.budget.hard_limit();
        let PackedCall {
            mut content,
            token_count: mut used,
            files,
            ..
        } = call;

        for (header, names) in [
            (ADDED_FILES_HEADER, added),
            (MODIFIED_FILES_HEADER, modified),
            (DELETED_FILES_HEADER, deleted),
        ] {
            if names.is_empty() || hard_limit.saturating_sub(used) <= TOP_UP_MIN_TOKENS {
                continue;
            }
            let list = format!("{header}{}", names.join("\n"));
            let budget = i64::try_from(hard_limit - used).unwrap_or(i64::MAX);
            let clipped = self.handler.clip(&list, budget, &ClipOptions::default());
            if clipped.is_empty() {
                continue;
            }
            let tokens = self.handler.count_tokens(&clipped);
            if used + tokens + 2 <= hard_limit {
                content.push_str("\n\n");
                content.push_str(&clipped);
                used += tokens + 2;
            }
        }

        PackedCall::new(content, used, files)
    }
}

fn with_ai_summary(file: &FileDiff, rendered: String, enabled: bool) -> String {
    match &file.ai_file_summary {
        Some(summary) if enabled => insert_ai_summary(&rendered, summary),
        _ => rendered,
    }
}

/// Fold the compression pass's render failures into `skipped`, and drop
/// earlier failures for files the compression pass did place.
fn merge_skipped(skipped: &mut Vec<String>, compressed: &CompressedDiff) {
    skipped.retain(|name| {
        !compressed.entries.iter().any(|e| &e.filename == name)
            && !compressed.deleted_files.contains(name)
            && !compressed.emptied_files.iter().any(|(n, _)| n == name)
    });
    for name in &compressed.skipped_files {
        if !skipped.contains(name) {
            skipped.push(name.clone());
        }
    }
}
