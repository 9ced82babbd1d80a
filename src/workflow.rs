//! Command handlers behind the CLI.
use crate::cli::{CommonArgs, EnrichArgs, FillMissingArgs, ServeArgs, StatusArgs};
use crate::config::{load_settings, validate_settings, ResolvedSettings};
use crate::pipeline::{run_pass, ThreadPacer};
use crate::service::run_service;
use crate::store::{load_base_list, CsvRecordStore, MergeOutcome, RecordStore};
use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Load the settings file and anchor it to the data directory.
pub(crate) fn load_resolved(common: &CommonArgs) -> Result<ResolvedSettings> {
    let settings = load_settings(common.config.as_deref())?;
    Ok(ResolvedSettings::new(common.data_dir.clone(), settings))
}

pub fn run_serve(args: ServeArgs) -> Result<()> {
    let mut resolved = load_resolved(&args.common)?;
    if let Some(listen) = args.listen {
        resolved.settings.listen_addr = listen;
        validate_settings(&resolved.settings)?;
    }
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("build async runtime")?;
    runtime.block_on(run_service(resolved))
}

pub fn run_enrich(args: EnrichArgs) -> Result<()> {
    let resolved = load_resolved(&args.common)?;
    let client = resolved.enrichment_client()?;
    let store_path = resolved.enriched_store_path();
    let mut store = CsvRecordStore::new(&store_path);
    let summary = run_pass(&resolved, &mut store, &client, &ThreadPacer)?;

    if args.json {
        let text = serde_json::to_string_pretty(&summary).context("serialize summary")?;
        println!("{text}");
    } else {
        println!("Processing complete.");
        println!("  success: {}", summary.success);
        println!("  errors:  {}", summary.errors);
        println!("  skipped: {}", summary.skipped);
        println!("  output:  {}", store_path.display());
    }
    Ok(())
}

pub fn run_fill_missing(args: FillMissingArgs) -> Result<()> {
    let resolved = load_resolved(&args.common)?;
    let base_path = resolved.base_list_path();
    let store_path = resolved.enriched_store_path();
    let base = load_base_list(&base_path)?;
    let mut store = CsvRecordStore::new(&store_path);

    match store.merge_missing(&base)? {
        MergeOutcome::NothingToDo => {
            println!("No rows found in {}; nothing to do.", base_path.display());
        }
        MergeOutcome::NoEnrichedRows => {
            println!(
                "No rows found in {}; nothing to merge into.",
                store_path.display()
            );
        }
        MergeOutcome::Merged { added, total_rows } => {
            tracing::info!(added, total_rows, "merge complete");
            println!(
                "Completed. Added {added} missing entries from {} into {}.",
                base_path.display(),
                store_path.display()
            );
        }
    }
    Ok(())
}

/// Progress snapshot printed by `status`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StatusReport {
    pub base_list: PathBuf,
    pub enriched_store: PathBuf,
    pub base_total: usize,
    pub enriched: usize,
    pub remaining: usize,
}

/// Count distinct base names and how many of them the store already holds.
pub(crate) fn build_status(resolved: &ResolvedSettings) -> Result<StatusReport> {
    let base_list = resolved.base_list_path();
    let enriched_store = resolved.enriched_store_path();
    let base_keys: BTreeSet<String> = load_base_list(&base_list)?
        .iter()
        .map(|entry| entry.key())
        .filter(|key| !key.is_empty())
        .collect();
    let progress = CsvRecordStore::new(&enriched_store).load_progress();
    let enriched = base_keys.intersection(&progress).count();
    Ok(StatusReport {
        base_list,
        enriched_store,
        base_total: base_keys.len(),
        enriched,
        remaining: base_keys.len() - enriched,
    })
}

pub fn run_status(args: StatusArgs) -> Result<()> {
    let resolved = load_resolved(&args.common)?;
    let report = build_status(&resolved)?;
    if args.json {
        let text = serde_json::to_string_pretty(&report).context("serialize status")?;
        println!("{text}");
        return Ok(());
    }
    println!("base list:  {}", report.base_list.display());
    println!("store:      {}", report.enriched_store.display());
    println!("total:      {}", report.base_total);
    println!("enriched:   {}", report.enriched);
    println!("remaining:  {}", report.remaining);
    Ok(())
}
