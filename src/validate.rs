//! Per-row answer materialization and batch admission.
//!
//! A row is invalid when any required question has no non-empty mapped
//! value. One invalid selected row rejects the whole batch.

use std::collections::HashSet;

use log::debug;

use crate::{
    dedup,
    error::{ImportError, RowViolation},
    extend::SchemaExtension,
    mapping::{FieldMapping, MappingTarget},
    record::{AnswerKey, Answers, CandidateRecord, Decision},
    schema::Schema,
    tabular::{RawRow, Table},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowCheck {
    pub answers: Answers,
    /// Labels of required questions left unanswered.
    pub missing: Vec<String>,
}

impl RowCheck {
    pub fn is_valid(&self) -> bool {
        self.missing.is_empty()
    }
}

pub fn check_row(
    row: &RawRow,
    mapping: &FieldMapping,
    schema: &Schema,
    extension: &SchemaExtension,
) -> RowCheck {
    let mut answers = Answers::new();
    for (column, target) in mapping.iter() {
        let Some(key) = answer_key(target, schema, extension) else {
            continue;
        };
        let value = row.get(column).map(|v| v.trim()).unwrap_or_default();
        if value.is_empty() {
            continue;
        }
        answers.entry(key).or_insert_with(|| value.to_string());
    }

    let missing = schema
        .required()
        .filter(|question| !answers.contains_key(&AnswerKey::question(question.id.as_str())))
        .map(|question| question.label.clone())
        .collect();
    RowCheck { answers, missing }
}

fn answer_key(
    target: &MappingTarget,
    schema: &Schema,
    extension: &SchemaExtension,
) -> Option<AnswerKey> {
    match target {
        MappingTarget::Skip => None,
        MappingTarget::Existing { question } => Some(AnswerKey::question(question.as_str())),
        // a label reused from the schema answers that question directly
        MappingTarget::CreateNew { label } => match extension.resolve(label) {
            Some(id) if schema.contains_id(id) => Some(AnswerKey::question(id)),
            _ => Some(AnswerKey::pending(label)),
        },
    }
}

/// Builds a candidate per data row, or rejects the batch.
///
/// `excluded` holds 1-based row numbers the caller deselected; those rows come
/// back with `selected: false` and are never validated.
pub fn admit(
    table: &Table,
    mapping: &FieldMapping,
    schema: &Schema,
    extension: &SchemaExtension,
    excluded: &HashSet<usize>,
    decision: Decision,
) -> Result<Vec<CandidateRecord>, ImportError> {
    let mut candidates = Vec::with_capacity(table.row_count());
    let mut violations = Vec::new();

    for idx in 0..table.row_count() {
        let row_number = idx + 1;
        let Some(raw) = table.raw_row(idx) else {
            continue;
        };
        let check = check_row(&raw, mapping, schema, extension);
        let selected = !excluded.contains(&row_number);
        if !selected {
            debug!("Row {row_number} deselected");
        } else if !check.is_valid() {
            violations.push(RowViolation {
                row: row_number,
                missing_labels: check.missing,
            });
            continue;
        }
        let identity = dedup::resolve_identity(&check.answers, mapping, schema);
        candidates.push(CandidateRecord {
            row: row_number,
            answers: check.answers,
            identity,
            is_duplicate: false,
            decision,
            selected,
        });
    }

    if !violations.is_empty() {
        return Err(ImportError::Validation {
            invalid_rows: violations.iter().map(|v| v.row).collect(),
            missing: violations,
        });
    }
    Ok(candidates)
}
