//! Form storage boundary.
//!
//! The pipeline needs four operations from storage: read the schema, write
//! the extended schema, read the identity keys already stored for a form,
//! and insert records. The last three are only reachable through a
//! [`FormTransaction`]; dropping a transaction without calling
//! [`FormTransaction::commit`] must roll it back.

pub mod sqlite;

use std::collections::HashSet;

use thiserror::Error;

use crate::{record::StoredRecord, schema::Schema};

pub use sqlite::SqliteStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("could not encode stored data: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("form '{0}' does not exist")]
    UnknownForm(String),
    #[error("form '{0}' already exists")]
    FormExists(String),
    #[error("schema of form '{0}' changed while the import was running")]
    SchemaConflict(String),
    #[error("invalid schema: {0}")]
    InvalidSchema(String),
    #[error("corrupt stored value: {0}")]
    Corrupt(String),
}

impl StoreError {
    /// Failures of the transaction itself, which a rerun of the same import
    /// may not hit again. Missing forms, bad schemas and corrupt rows are
    /// not transient.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Sqlite(_) | StoreError::SchemaConflict(_))
    }
}

pub trait FormStore {
    type Transaction<'a>: FormTransaction
    where
        Self: 'a;

    fn create_form(&mut self, form: &str, schema: &Schema) -> Result<(), StoreError>;

    fn load_schema(&self, form: &str) -> Result<Schema, StoreError>;

    fn records(&self, form: &str) -> Result<Vec<StoredRecord>, StoreError>;

    /// Opens a write transaction. Reads made through it must be consistent
    /// with its writes until commit.
    fn begin(&mut self) -> Result<Self::Transaction<'_>, StoreError>;
}

pub trait FormTransaction {
    fn load_schema(&self, form: &str) -> Result<Schema, StoreError>;

    fn save_schema(&mut self, form: &str, schema: &Schema) -> Result<(), StoreError>;

    /// Identity keys (see [`crate::record::identity_key`]) stored for `form`.
    fn existing_identities(&self, form: &str) -> Result<HashSet<String>, StoreError>;

    fn insert_record(&mut self, record: &StoredRecord) -> Result<(), StoreError>;

    fn commit(self) -> Result<(), StoreError>;

    fn rollback(self) -> Result<(), StoreError>;
}
