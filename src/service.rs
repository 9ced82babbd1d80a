//! Long-running service: store reconciliation, background enrichment, and
//! the query endpoint.
//!
//! Startup makes sure the enriched store holds data before anything reads
//! it. The enrichment worker then runs on its own thread; a failure or panic
//! there is logged and never reaches the endpoint. The endpoint runs in the
//! foreground and its failure ends the process.
use crate::config::ResolvedSettings;
use crate::lm::Enricher;
use crate::pipeline::{run_pass, Pacer, ThreadPacer};
use crate::server::{self, AppState};
use crate::store::{count_data_rows, encode_header, replace_contents, CsvRecordStore};
use anyhow::{Context, Result};
use std::any::Any;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

/// Name of the enrichment worker thread.
pub const WORKER_THREAD: &str = "enrichment-worker";

/// Populates an enriched store that has no data rows.
pub trait StoreInitializer {
    fn initialize(&self, store_path: &Path) -> Result<()>;
}

/// Copies a seed store into place, or writes a header-only store when no
/// seed is available.
#[derive(Debug, Clone, Default)]
pub struct SeedInitializer {
    seed: Option<PathBuf>,
}

impl SeedInitializer {
    pub fn new(seed: Option<PathBuf>) -> Self {
        Self { seed }
    }
}

impl StoreInitializer for SeedInitializer {
    fn initialize(&self, store_path: &Path) -> Result<()> {
        match self.seed.as_deref() {
            Some(seed) if seed.is_file() => {
                let bytes = fs::read(seed).with_context(|| format!("read seed {}", seed.display()))?;
                replace_contents(store_path, &bytes)?;
                tracing::info!(
                    seed = %seed.display(),
                    store = %store_path.display(),
                    "copied seed store"
                );
            }
            seed => {
                if let Some(seed) = seed {
                    tracing::warn!(seed = %seed.display(), "seed store not found; starting empty");
                }
                replace_contents(store_path, &encode_header()?)?;
                tracing::info!(store = %store_path.display(), "created empty store");
            }
        }
        Ok(())
    }
}

/// Why reconciliation ran the initializer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitReason {
    Missing,
    HeaderOnly,
    Unreadable,
}

/// Store state after startup reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The store already held data rows and was left alone.
    Ready { data_rows: usize },
    Initialized(InitReason),
}

/// Ensure the store holds data, running `initializer` at most once.
///
/// A store that cannot be read is treated as uninitialized.
pub fn reconcile_store(
    store_path: &Path,
    initializer: &dyn StoreInitializer,
) -> Result<ReconcileOutcome> {
    let reason = if !store_path.exists() {
        InitReason::Missing
    } else {
        match count_data_rows(store_path) {
            Ok(0) => InitReason::HeaderOnly,
            Ok(data_rows) => {
                tracing::info!(store = %store_path.display(), data_rows, "store ready");
                return Ok(ReconcileOutcome::Ready { data_rows });
            }
            Err(err) => {
                tracing::warn!(
                    store = %store_path.display(),
                    error = %format!("{err:#}"),
                    "store unreadable; reinitializing"
                );
                InitReason::Unreadable
            }
        }
    };
    tracing::info!(store = %store_path.display(), ?reason, "initializing store");
    initializer
        .initialize(store_path)
        .with_context(|| format!("initialize {}", store_path.display()))?;
    Ok(ReconcileOutcome::Initialized(reason))
}

/// Run `task` on a named thread, logging its error or panic instead of
/// propagating it.
pub fn spawn_background<F>(name: &str, task: F) -> std::io::Result<JoinHandle<()>>
where
    F: FnOnce() -> Result<()> + Send + 'static,
{
    let label = name.to_string();
    thread::Builder::new().name(label.clone()).spawn(move || {
        tracing::info!(task = %label, "background task started");
        match panic::catch_unwind(AssertUnwindSafe(task)) {
            Ok(Ok(())) => tracing::info!(task = %label, "background task finished"),
            Ok(Err(err)) => tracing::error!(
                task = %label,
                error = %format!("{err:#}"),
                "background task failed"
            ),
            Err(payload) => tracing::error!(
                task = %label,
                panic = %panic_message(payload.as_ref()),
                "background task panicked"
            ),
        }
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Repeat enrichment passes forever, pausing `rescan_interval` between them.
///
/// A failed pass is logged and the next one runs on schedule.
pub fn worker_loop<E>(resolved: &ResolvedSettings, enricher: &E, pacer: &dyn Pacer) -> Result<()>
where
    E: Enricher + ?Sized,
{
    let mut store = CsvRecordStore::new(resolved.enriched_store_path());
    let mut pass = 0u64;
    loop {
        pass += 1;
        match run_pass(resolved, &mut store, enricher, pacer) {
            Ok(summary) => tracing::info!(
                pass,
                success = summary.success,
                errors = summary.errors,
                skipped = summary.skipped,
                "worker pass finished"
            ),
            Err(err) => tracing::error!(
                pass,
                error = %format!("{err:#}"),
                "worker pass failed"
            ),
        }
        tracing::info!(
            next_pass_in_secs = resolved.rescan_interval().as_secs(),
            "worker idle"
        );
        pacer.pause(resolved.rescan_interval());
    }
}

/// Reconcile the store, start the worker, and serve until shutdown.
pub async fn run_service(resolved: ResolvedSettings) -> Result<()> {
    let store_path = resolved.enriched_store_path();
    let initializer = SeedInitializer::new(resolved.seed_store_path());
    let outcome = reconcile_store(&store_path, &initializer)?;
    tracing::debug!(?outcome, "store reconciled");

    let endpoint_key = resolved.endpoint_key();
    if endpoint_key.is_none() {
        tracing::warn!(
            env_var = %resolved.settings.endpoint_key_env,
            "no endpoint key configured; data queries will be refused"
        );
    }

    let client = resolved.enrichment_client()?;
    tracing::info!(backend = %client.backend_label(), "enrichment client ready");
    let worker_settings = resolved.clone();
    spawn_background(WORKER_THREAD, move || {
        worker_loop(&worker_settings, &client, &ThreadPacer)
    })
    .context("spawn enrichment worker")?;

    let state = AppState::new(store_path, endpoint_key);
    server::serve(&resolved.settings.listen_addr, state).await?;
    Ok(())
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
