//! Shared test infrastructure for integration tests.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

/// A scratch data directory with a base list and optional settings file.
pub struct DataDir {
    pub dir: TempDir,
}

impl DataDir {
    pub fn new(base_list: &str) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        fs::write(dir.path().join("us_universities.csv"), base_list).expect("write base list");
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn store_path(&self) -> PathBuf {
        self.path().join("us_universities_enriched.csv")
    }

    pub fn write_store(&self, contents: &str) {
        fs::write(self.store_path(), contents).expect("write store");
    }

    pub fn read_store(&self) -> String {
        fs::read_to_string(self.store_path()).expect("read store")
    }

    /// Write `settings.json` and return its path.
    pub fn write_settings(&self, json: &serde_json::Value) -> PathBuf {
        let path = self.path().join("settings.json");
        let text = serde_json::to_string_pretty(json).expect("serialize settings");
        fs::write(&path, text).expect("write settings");
        path
    }

    /// Run `cenrich <command> --data-dir <dir> [extra..]`.
    pub fn run(&self, command: &str, extra: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_cenrich"))
            .arg(command)
            .arg("--data-dir")
            .arg(self.path())
            .args(extra)
            .env("RUST_LOG", "warn")
            .env_remove("GPT_API_KEY")
            .env_remove("ENDPOINT_KEY")
            .output()
            .expect("run cenrich")
    }
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}
