//! Backfill merge of base entries into raw store rows.
use super::{ProgressSet, StoreError};
use crate::record::{normalized_key, BaseRecord};

/// Append a blank row for every base entry whose name is not yet present.
///
/// Rows take the widest existing row's width so the file stays rectangular.
/// Existing rows are never modified. Returns the number of rows added.
pub(crate) fn merge_rows(base: &[BaseRecord], rows: &mut Vec<Vec<String>>) -> Result<usize, StoreError> {
    let mut seen: ProgressSet = rows
        .iter()
        .filter_map(|row| row.first())
        .map(|name| normalized_key(name))
        .filter(|key| !key.is_empty())
        .collect();

    let columns = rows
        .iter()
        .filter(|row| !row.is_empty())
        .map(Vec::len)
        .max()
        .unwrap_or(0);
    if columns < 2 {
        return Err(StoreError::Malformed { columns });
    }

    let mut added = 0;
    for record in base {
        let name = record.name.trim();
        if name.is_empty() {
            continue;
        }
        if !seen.insert(normalized_key(name)) {
            continue;
        }
        let mut row = vec![String::new(); columns];
        row[0] = name.to_string();
        row[1] = record.url.trim().to_string();
        rows.push(row);
        added += 1;
    }
    Ok(added)
}

#[cfg(test)]
#[path = "merge_tests.rs"]
mod tests;
