//! CSV-backed record store.
//!
//! Appends are single `write_all` calls followed by `sync_data`, so a reader
//! sees either a complete row or nothing. The merge path replaces the whole
//! file through a sibling temp file.
use super::merge::merge_rows;
use super::{MergeOutcome, ProgressSet, RecordStore};
use crate::record::{is_header_cell, normalized_key, BaseRecord, EnrichedRecord, ENRICHED_COLUMNS};
use anyhow::{anyhow, Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Record store persisted as a single CSV file.
#[derive(Debug, Clone)]
pub struct CsvRecordStore {
    path: PathBuf,
}

impl CsvRecordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn try_load_progress(&self) -> Result<ProgressSet> {
        let rows = read_rows(&self.path)?;
        let mut progress = ProgressSet::new();
        for (index, row) in rows.iter().enumerate() {
            let Some(name) = row.first() else {
                continue;
            };
            if index == 0 && is_header_cell(name) {
                continue;
            }
            let key = normalized_key(name);
            if !key.is_empty() {
                progress.insert(key);
            }
        }
        Ok(progress)
    }

    fn write_rows(&self, rows: &[Vec<String>]) -> Result<()> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_writer(Vec::new());
        for row in rows {
            writer
                .write_record(row)
                .with_context(|| format!("encode {}", self.path.display()))?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|err| anyhow!("encode {}: {}", self.path.display(), err.error()))?;
        replace_contents(&self.path, &bytes)
    }
}

impl RecordStore for CsvRecordStore {
    fn load_progress(&self) -> ProgressSet {
        match self.try_load_progress() {
            Ok(progress) => progress,
            Err(err) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %format!("{err:#}"),
                    "could not read existing progress; treating store as empty"
                );
                ProgressSet::new()
            }
        }
    }

    fn append_record(&mut self, record: &EnrichedRecord) -> Result<()> {
        let line = encode_row(record)?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("create {}", parent.display()))?;
            }
        }
        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&self.path)
            .with_context(|| format!("open {}", self.path.display()))?;

        let mut chunk = Vec::with_capacity(line.len() + 256);
        if needs_header(&file)? {
            chunk.extend_from_slice(&encode_header()?);
        } else if !ends_with_newline(&mut file)? {
            chunk.push(b'\n');
        }
        chunk.extend_from_slice(&line);

        file.write_all(&chunk)
            .with_context(|| format!("append {}", self.path.display()))?;
        file.flush()
            .with_context(|| format!("flush {}", self.path.display()))?;
        file.sync_data()
            .with_context(|| format!("sync {}", self.path.display()))?;
        Ok(())
    }

    fn merge_missing(&mut self, base: &[BaseRecord]) -> Result<MergeOutcome> {
        if base.is_empty() {
            return Ok(MergeOutcome::NothingToDo);
        }
        let mut rows = read_rows(&self.path)?;
        if rows.is_empty() {
            return Ok(MergeOutcome::NoEnrichedRows);
        }
        let added = merge_rows(base, &mut rows)?;
        self.write_rows(&rows)?;
        Ok(MergeOutcome::Merged {
            added,
            total_rows: rows.len(),
        })
    }
}

/// Read every row of a CSV file as raw cells. A missing file has no rows.
pub(crate) fn read_rows(path: &Path) -> Result<Vec<Vec<String>>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("open {}", path.display()))?;
    let mut rows = Vec::new();
    for row in reader.records() {
        let row = row.with_context(|| format!("read {}", path.display()))?;
        rows.push(row.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

/// Count rows that are not the header.
pub(crate) fn count_data_rows(path: &Path) -> Result<usize> {
    let rows = read_rows(path)?;
    let header = rows
        .first()
        .and_then(|row| row.first())
        .is_some_and(|cell| is_header_cell(cell));
    Ok(rows.len() - usize::from(header))
}

/// Load typed records, tolerating header-less and short legacy rows.
///
/// Rows that do not fit the schema are logged and skipped.
pub fn load_records(path: &Path) -> Result<Vec<EnrichedRecord>> {
    let rows = read_rows(path)?;
    let mut records = Vec::with_capacity(rows.len());
    for (index, mut row) in rows.into_iter().enumerate() {
        if index == 0 && row.first().is_some_and(|cell| is_header_cell(cell)) {
            continue;
        }
        row.resize(ENRICHED_COLUMNS.len(), String::new());
        let record = csv::StringRecord::from(row);
        match record.deserialize::<EnrichedRecord>(None) {
            Ok(parsed) => records.push(parsed),
            Err(err) => {
                tracing::warn!(row = index + 1, error = %err, "skipping unreadable store row");
            }
        }
    }
    Ok(records)
}

fn encode_row(record: &EnrichedRecord) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer
        .serialize(record)
        .with_context(|| format!("encode row for {}", record.name))?;
    writer
        .into_inner()
        .map_err(|err| anyhow!("encode row for {}: {}", record.name, err.error()))
}

/// Header row of a freshly created store.
pub(crate) fn encode_header() -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());
    writer
        .write_record(ENRICHED_COLUMNS)
        .context("encode store header")?;
    writer
        .into_inner()
        .map_err(|err| anyhow!("encode store header: {}", err.error()))
}

/// Replace a file's contents through a synced sibling temp file.
pub(crate) fn replace_contents(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    let mut staged = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("stage rewrite of {}", path.display()))?;
    staged
        .write_all(bytes)
        .with_context(|| format!("write {}", path.display()))?;
    staged
        .as_file()
        .sync_all()
        .with_context(|| format!("sync {}", path.display()))?;
    staged
        .persist(path)
        .map_err(|err| anyhow!("replace {}: {}", path.display(), err.error))?;
    Ok(())
}

fn needs_header(file: &File) -> Result<bool> {
    let len = file.metadata().context("stat store")?.len();
    Ok(len == 0)
}

fn ends_with_newline(file: &mut File) -> Result<bool> {
    let len = file.metadata().context("stat store")?.len();
    if len == 0 {
        return Ok(true);
    }
    file.seek(SeekFrom::Start(len - 1))
        .context("seek store tail")?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last).context("read store tail")?;
    Ok(last[0] == b'\n')
}
