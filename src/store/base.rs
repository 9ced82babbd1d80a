use crate::record::{is_header_cell, BaseRecord};
use anyhow::{Context, Result};
use std::path::Path;

/// Load the `[name, url]` base list, dropping a leading `name` header row.
pub fn load_base_list(path: &Path) -> Result<Vec<BaseRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("open base list {}", path.display()))?;

    let mut records = Vec::new();
    for (index, row) in reader.records().enumerate() {
        let row = row.with_context(|| format!("read base list {}", path.display()))?;
        let name = row.get(0).unwrap_or("").trim();
        if index == 0 && is_header_cell(name) {
            continue;
        }
        let url = row.get(1).unwrap_or("").trim();
        records.push(BaseRecord::new(name, url));
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_base(contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("base.csv");
        std::fs::write(&path, contents).expect("write base list");
        (dir, path)
    }

    #[test]
    fn drops_header_and_trims_fields() {
        let (_dir, path) = write_base("Name,URL\n MIT , mit.edu \nReed College,reed.edu\n");
        let records = load_base_list(&path).expect("load base list");
        assert_eq!(
            records,
            vec![
                BaseRecord::new("MIT", "mit.edu"),
                BaseRecord::new("Reed College", "reed.edu"),
            ]
        );
    }

    #[test]
    fn headerless_list_keeps_first_row() {
        let (_dir, path) = write_base("Oberlin College,oberlin.edu\n");
        let records = load_base_list(&path).expect("load base list");
        assert_eq!(records, vec![BaseRecord::new("Oberlin College", "oberlin.edu")]);
    }

    #[test]
    fn empty_file_is_empty_list() {
        let (_dir, path) = write_base("");
        assert!(load_base_list(&path).expect("load base list").is_empty());
    }

    #[test]
    fn missing_url_column_becomes_empty() {
        let (_dir, path) = write_base("name,url\nCarleton College\n");
        let records = load_base_list(&path).expect("load base list");
        assert_eq!(records, vec![BaseRecord::new("Carleton College", "")]);
    }
}
