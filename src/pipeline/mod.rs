//! Resumable enrichment loop.
//!
//! A pass walks the base list in order. Entries whose normalized name is
//! already in the store are skipped without contacting the LM, so a pass
//! restarted after a crash only requests what is still missing. Each success
//! is appended and synced before the next request; each failure is counted
//! and the pass moves on.
use crate::config::{ResolvedSettings, RetryPolicy};
use crate::lm::{EnrichError, Enricher};
use crate::record::{BaseRecord, EnrichedRecord};
use crate::store::{load_base_list, RecordStore};
use anyhow::Result;
use serde::Serialize;
use std::time::Duration;

/// Blocking pause used for rate limiting and retry backoff.
pub trait Pacer {
    fn pause(&self, duration: Duration);
}

/// Sleeps the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadPacer;

impl Pacer for ThreadPacer {
    fn pause(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// Loop tuning.
#[derive(Debug, Clone, Copy)]
pub struct PipelineOptions {
    pub request_delay: Duration,
    pub progress_every: usize,
    pub retry: RetryPolicy,
}

impl PipelineOptions {
    pub fn from_settings(resolved: &ResolvedSettings) -> Self {
        Self {
            request_delay: resolved.request_delay(),
            progress_every: resolved.settings.progress_every,
            retry: resolved.settings.retry,
        }
    }
}

/// Counters for one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub success: usize,
    pub errors: usize,
    pub skipped: usize,
}

/// Load inputs and run one pass over the configured base list.
pub fn run_pass<S, E>(
    resolved: &ResolvedSettings,
    store: &mut S,
    enricher: &E,
    pacer: &dyn Pacer,
) -> Result<RunSummary>
where
    S: RecordStore + ?Sized,
    E: Enricher + ?Sized,
{
    let options = PipelineOptions::from_settings(resolved);
    let base = load_base_list(&resolved.base_list_path())?;
    Ok(run_enrichment(&base, store, enricher, pacer, &options))
}

/// Enrich every base entry that the store does not already hold.
pub fn run_enrichment<S, E>(
    base: &[BaseRecord],
    store: &mut S,
    enricher: &E,
    pacer: &dyn Pacer,
    options: &PipelineOptions,
) -> RunSummary
where
    S: RecordStore + ?Sized,
    E: Enricher + ?Sized,
{
    let mut progress = store.load_progress();
    let total = base.len();
    tracing::info!(
        base_total = total,
        already_processed = progress.len(),
        remaining = total.saturating_sub(progress.len()),
        "starting enrichment pass"
    );
    let mut summary = RunSummary {
        total,
        ..RunSummary::default()
    };

    for (index, entry) in base.iter().enumerate() {
        let position = index + 1;
        let key = entry.key();
        if key.is_empty() || progress.contains(&key) {
            summary.skipped += 1;
            continue;
        }

        tracing::info!(position, total, name = %entry.name, "enriching");
        match enrich_with_retry(enricher, entry, &options.retry, pacer) {
            Ok(record) => match store.append_record(&record) {
                Ok(()) => {
                    progress.insert(key);
                    summary.success += 1;
                }
                Err(err) => {
                    tracing::error!(
                        name = %entry.name,
                        error = %format!("{err:#}"),
                        "could not persist enriched record"
                    );
                    summary.errors += 1;
                }
            },
            Err(err) => {
                tracing::warn!(name = %entry.name, error = %err, "skipping institution");
                summary.errors += 1;
            }
        }

        if position < total {
            pacer.pause(options.request_delay);
        }

        if position % options.progress_every.max(1) == 0 {
            tracing::info!(
                position,
                total,
                success = summary.success,
                errors = summary.errors,
                skipped = summary.skipped,
                "enrichment progress"
            );
        }
    }

    tracing::info!(
        total = summary.total,
        success = summary.success,
        errors = summary.errors,
        skipped = summary.skipped,
        "enrichment pass complete"
    );
    summary
}

fn enrich_with_retry<E>(
    enricher: &E,
    entry: &BaseRecord,
    retry: &RetryPolicy,
    pacer: &dyn Pacer,
) -> Result<EnrichedRecord, EnrichError>
where
    E: Enricher + ?Sized,
{
    let max_attempts = retry.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match enricher.enrich(entry) {
            Ok(record) => return Ok(record),
            Err(err) if err.is_retryable() && attempt < max_attempts => {
                tracing::warn!(
                    name = %entry.name,
                    attempt,
                    max_attempts,
                    error = %err,
                    "retrying enrichment request"
                );
                pacer.pause(retry.backoff());
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
