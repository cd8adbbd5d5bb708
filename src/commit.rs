//! Transactional batch commit.
//!
//! Everything that reads or writes storage happens inside one transaction:
//! the schema check against the caller's snapshot, the duplicate read, the
//! schema extension and the record inserts. Any failure drops the
//! transaction, which rolls it back.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    dedup::{self, Partition},
    error::ImportError,
    extend::SchemaExtension,
    record::{AnswerKey, CandidateRecord, StoredRecord},
    schema::Schema,
    store::{FormStore, FormTransaction, StoreError},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub imported: usize,
    pub duplicates: usize,
    pub duplicate_identities: Vec<String>,
    pub new_fields_created: usize,
    pub new_fields: Vec<String>,
    pub total: usize,
    pub message: String,
    /// Rows stored without an identity value; they cannot be deduplicated.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub needs_manual_identity: Vec<usize>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub dry_run: bool,
}

impl ImportSummary {
    fn new(partition: &Partition, extension: &SchemaExtension, dry_run: bool) -> Self {
        let imported = partition.to_create.len();
        let duplicates = partition.duplicates.len();
        let new_fields = extension.labels();
        let mut message = format!(
            "Imported {imported} record(s), skipped {duplicates} duplicate(s), created {} new field(s).",
            new_fields.len()
        );
        if dry_run {
            message = format!("Dry run: {message} Nothing was saved.");
        }
        Self {
            imported,
            duplicates,
            duplicate_identities: partition.duplicate_identities(),
            new_fields_created: new_fields.len(),
            new_fields,
            total: imported + duplicates,
            message,
            needs_manual_identity: partition.unidentified_rows(),
            dry_run,
        }
    }
}

/// Commits admitted candidates for `form`.
///
/// `snapshot` is the schema the mapping and extension were planned against;
/// if storage holds anything else the batch fails as a retryable conflict.
pub fn commit<S: FormStore>(
    store: &mut S,
    form: &str,
    snapshot: &Schema,
    extension: &SchemaExtension,
    candidates: Vec<CandidateRecord>,
    dry_run: bool,
) -> Result<ImportSummary, ImportError> {
    let mut tx = store.begin()?;

    let current = tx.load_schema(form)?;
    if current != *snapshot {
        return Err(StoreError::SchemaConflict(form.to_string()).into());
    }

    let existing = tx.existing_identities(form)?;
    let partition = dedup::partition(candidates, &existing);
    debug!(
        "{} to create, {} duplicate(s) against {} stored identities",
        partition.to_create.len(),
        partition.duplicates.len(),
        existing.len()
    );

    if !extension.is_empty() {
        let extended = snapshot
            .extended(&extension.questions)
            .map_err(|err| StoreError::InvalidSchema(format!("{err:#}")))?;
        tx.save_schema(form, &extended)?;
        debug!("Schema extended with {:?}", extension.labels());
    }

    let imported_at = Utc::now();
    for candidate in &partition.to_create {
        let record = stored_record(form, candidate, extension, imported_at)?;
        tx.insert_record(&record)?;
    }

    let summary = ImportSummary::new(&partition, extension, dry_run);
    if dry_run {
        tx.rollback()?;
    } else {
        tx.commit()?;
    }
    info!("{}", summary.message);
    Ok(summary)
}

fn stored_record(
    form: &str,
    candidate: &CandidateRecord,
    extension: &SchemaExtension,
    imported_at: DateTime<Utc>,
) -> Result<StoredRecord, ImportError> {
    let mut answers = BTreeMap::new();
    for (key, value) in &candidate.answers {
        let id = match key {
            AnswerKey::Question(id) => id.clone(),
            AnswerKey::Pending(label) => extension
                .resolve(label)
                .map(str::to_string)
                .ok_or_else(|| {
                    ImportError::InvalidMapping(format!(
                        "row {} answers new field '{label}' that was never planned",
                        candidate.row
                    ))
                })?,
        };
        answers.insert(id, value.clone());
    }
    Ok(StoredRecord {
        id: Uuid::new_v4().to_string(),
        form_id: form.to_string(),
        row: candidate.row,
        answers,
        decision: candidate.decision,
        identity: candidate.identity.clone(),
        imported_at,
    })
}
