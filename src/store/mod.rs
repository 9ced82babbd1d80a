//! Flat-file record store.
//!
//! The store is a CSV file with one row per institution. The enrichment loop
//! only ever appends to it; the backfill merge rewrites it whole. Both paths
//! keep at most one row per normalized name.
use crate::record::{BaseRecord, EnrichedRecord};
use anyhow::Result;
use std::collections::BTreeSet;
use thiserror::Error;

mod base;
mod csv_store;
mod merge;

pub use base::load_base_list;
pub use csv_store::{load_records, CsvRecordStore};
pub(crate) use csv_store::{count_data_rows, encode_header, read_rows, replace_contents};

/// Normalized names already present in the store.
pub type ProgressSet = BTreeSet<String>;

/// Structural store problems that abort an operation without writing.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("enriched store appears malformed ({columns} columns, need at least 2)")]
    Malformed { columns: usize },
}

/// Result of a backfill merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The base list was empty.
    NothingToDo,
    /// The enriched store had no rows to infer a width from.
    NoEnrichedRows,
    /// The store was rewritten with `added` new rows.
    Merged { added: usize, total_rows: usize },
}

/// Storage seam used by the enrichment loop and the backfill command.
pub trait RecordStore {
    /// Names already recorded. Read problems yield an empty set.
    fn load_progress(&self) -> ProgressSet;

    /// Persist one record; it must be durable when this returns `Ok`.
    fn append_record(&mut self, record: &EnrichedRecord) -> Result<()>;

    /// Add blank rows for base entries the store does not mention yet.
    fn merge_missing(&mut self, base: &[BaseRecord]) -> Result<MergeOutcome>;
}
