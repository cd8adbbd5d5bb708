#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use bulk_onboard::{
    FormStore, SqliteStore,
    schema::{QuestionDefinition, Schema},
};
use tempfile::{TempDir, tempdir};

pub const FORM: &str = "cohort";

/// Returns the absolute path to a fixture under `tests/data`.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

/// Schema with only the identity question.
pub fn email_only_schema() -> Schema {
    Schema::new(vec![QuestionDefinition::text("q_email", "Best email", true)])
        .expect("email-only schema")
}

/// In-memory store holding one form with `schema`.
pub fn store_with(schema: &Schema) -> SqliteStore {
    let mut store = SqliteStore::open_in_memory().expect("open store");
    store.create_form(FORM, schema).expect("create form");
    store
}

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn db(&self) -> PathBuf {
        self.temp_dir.path().join("forms.db")
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }
}
