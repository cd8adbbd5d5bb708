use std::{collections::HashSet, path::Path};

use chrono::{DateTime, Utc};
use log::debug;
use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior, params};

use super::{FormStore, FormTransaction, StoreError};
use crate::{
    record::{Decision, StoredRecord, identity_key},
    schema::Schema,
};

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS forms (
    id TEXT PRIMARY KEY,
    schema_json TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS records (
    id TEXT PRIMARY KEY,
    form_id TEXT NOT NULL REFERENCES forms(id),
    row_number INTEGER NOT NULL,
    answers_json TEXT NOT NULL,
    decision TEXT NOT NULL CHECK (decision IN ('pending', 'accepted', 'denied')),
    identity TEXT,
    identity_key TEXT,
    imported_at TEXT NOT NULL
);

-- backstop for the pipeline's duplicate check; NULL keys never collide
CREATE UNIQUE INDEX IF NOT EXISTS records_form_identity
    ON records (form_id, identity_key);
"#;

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        debug!("Opening form store {path:?}");
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl FormStore for SqliteStore {
    type Transaction<'a> = SqliteTransaction<'a>;

    fn create_form(&mut self, form: &str, schema: &Schema) -> Result<(), StoreError> {
        schema
            .validate()
            .map_err(|err| StoreError::InvalidSchema(format!("{err:#}")))?;
        if form_exists(&self.conn, form)? {
            return Err(StoreError::FormExists(form.to_string()));
        }
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO forms (id, schema_json, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
            params![form, serde_json::to_string(schema)?, now],
        )?;
        Ok(())
    }

    fn load_schema(&self, form: &str) -> Result<Schema, StoreError> {
        load_schema(&self.conn, form)
    }

    fn records(&self, form: &str) -> Result<Vec<StoredRecord>, StoreError> {
        if !form_exists(&self.conn, form)? {
            return Err(StoreError::UnknownForm(form.to_string()));
        }
        let mut stmt = self.conn.prepare(
            "SELECT id, row_number, answers_json, decision, identity, imported_at
             FROM records WHERE form_id = ?1 ORDER BY imported_at, row_number",
        )?;
        let rows = stmt
            .query_map(params![form], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, row, answers, decision, identity, imported_at)| -> Result<StoredRecord, StoreError> {
                Ok(StoredRecord {
                    id,
                    form_id: form.to_string(),
                    row: usize::try_from(row)
                        .map_err(|_| StoreError::Corrupt(format!("row number {row}")))?,
                    answers: serde_json::from_str(&answers)?,
                    decision: decision
                        .parse::<Decision>()
                        .map_err(|err| StoreError::Corrupt(err.to_string()))?,
                    identity,
                    imported_at: DateTime::parse_from_rfc3339(&imported_at)
                        .map_err(|err| StoreError::Corrupt(format!("timestamp {imported_at}: {err}")))?
                        .with_timezone(&Utc),
                })
            })
            .collect()
    }

    fn begin(&mut self) -> Result<SqliteTransaction<'_>, StoreError> {
        // IMMEDIATE takes the write lock before the duplicate check reads
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        Ok(SqliteTransaction { tx })
    }
}

pub struct SqliteTransaction<'a> {
    tx: Transaction<'a>,
}

impl FormTransaction for SqliteTransaction<'_> {
    fn load_schema(&self, form: &str) -> Result<Schema, StoreError> {
        load_schema(&self.tx, form)
    }

    fn save_schema(&mut self, form: &str, schema: &Schema) -> Result<(), StoreError> {
        let current = load_schema(&self.tx, form)?;
        schema
            .validate()
            .and_then(|()| schema.ensure_extends(&current))
            .map_err(|err| StoreError::InvalidSchema(format!("{err:#}")))?;
        let updated = self.tx.execute(
            "UPDATE forms SET schema_json = ?1, updated_at = ?2 WHERE id = ?3",
            params![serde_json::to_string(schema)?, Utc::now().to_rfc3339(), form],
        )?;
        if updated == 0 {
            return Err(StoreError::UnknownForm(form.to_string()));
        }
        Ok(())
    }

    fn existing_identities(&self, form: &str) -> Result<HashSet<String>, StoreError> {
        let mut stmt = self.tx.prepare(
            "SELECT identity_key FROM records WHERE form_id = ?1 AND identity_key IS NOT NULL",
        )?;
        let keys = stmt
            .query_map(params![form], |row| row.get::<_, String>(0))?
            .collect::<Result<HashSet<_>, _>>()?;
        Ok(keys)
    }

    fn insert_record(&mut self, record: &StoredRecord) -> Result<(), StoreError> {
        let row = i64::try_from(record.row)
            .map_err(|_| StoreError::Corrupt(format!("row number {}", record.row)))?;
        self.tx.execute(
            "INSERT INTO records
                (id, form_id, row_number, answers_json, decision, identity, identity_key, imported_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.id,
                record.form_id,
                row,
                serde_json::to_string(&record.answers)?,
                record.decision.as_str(),
                record.identity,
                record.identity.as_deref().map(identity_key),
                record.imported_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn commit(self) -> Result<(), StoreError> {
        self.tx.commit()?;
        Ok(())
    }

    fn rollback(self) -> Result<(), StoreError> {
        self.tx.rollback()?;
        Ok(())
    }
}

fn form_exists(conn: &Connection, form: &str) -> Result<bool, StoreError> {
    Ok(conn
        .query_row("SELECT 1 FROM forms WHERE id = ?1", params![form], |row| {
            row.get::<_, i64>(0)
        })
        .optional()?
        .is_some())
}

fn load_schema(conn: &Connection, form: &str) -> Result<Schema, StoreError> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT schema_json FROM forms WHERE id = ?1",
            params![form],
            |row| row.get(0),
        )
        .optional()?;
    let raw = raw.ok_or_else(|| StoreError::UnknownForm(form.to_string()))?;
    let schema: Schema = serde_json::from_str(&raw)?;
    schema
        .validate()
        .map_err(|err| StoreError::Corrupt(format!("schema of form '{form}': {err:#}")))?;
    Ok(schema)
}
