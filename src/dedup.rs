//! Identity resolution and duplicate partitioning.
//!
//! Identity comes from the schema's identity question when it is mapped,
//! otherwise from a new field whose source column mentions `email`. Rows
//! without an identity are never duplicates. Matching is case-insensitive and
//! scoped to one form; within a batch the first row carrying an identity
//! wins.

use std::collections::HashSet;

use crate::{
    mapping::{FieldMapping, MappingTarget},
    record::{AnswerKey, Answers, CandidateRecord},
    schema::Schema,
};

pub const IDENTITY_KEYWORD: &str = "email";

pub fn resolve_identity(answers: &Answers, mapping: &FieldMapping, schema: &Schema) -> Option<String> {
    let stored = schema
        .identity()
        .and_then(|question| answers.get(&AnswerKey::question(question.id.as_str())));
    if let Some(value) = stored {
        return Some(value.clone());
    }
    mapping
        .iter()
        .filter(|(column, _)| column.to_lowercase().contains(IDENTITY_KEYWORD))
        .find_map(|(_, target)| match target {
            MappingTarget::CreateNew { label } => answers.get(&AnswerKey::pending(label)).cloned(),
            _ => None,
        })
}

#[derive(Debug, Clone, Default)]
pub struct Partition {
    pub to_create: Vec<CandidateRecord>,
    pub duplicates: Vec<CandidateRecord>,
}

impl Partition {
    pub fn duplicate_identities(&self) -> Vec<String> {
        self.duplicates
            .iter()
            .filter_map(|record| record.identity.clone())
            .collect()
    }

    /// Rows that will be stored without an identity value.
    pub fn unidentified_rows(&self) -> Vec<usize> {
        self.to_create
            .iter()
            .filter(|record| record.identity.is_none())
            .map(|record| record.row)
            .collect()
    }
}

/// Splits selected candidates against identity keys already stored for the
/// form. Deselected candidates are dropped.
///
/// `existing` must hold keys as produced by [`crate::record::identity_key`].
pub fn partition(candidates: Vec<CandidateRecord>, existing: &HashSet<String>) -> Partition {
    let mut seen = HashSet::new();
    let mut result = Partition::default();
    for mut candidate in candidates.into_iter().filter(|c| c.selected) {
        candidate.is_duplicate = match candidate.identity_key() {
            Some(key) => existing.contains(&key) || !seen.insert(key),
            None => false,
        };
        if candidate.is_duplicate {
            result.duplicates.push(candidate);
        } else {
            result.to_create.push(candidate);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        mapping::ColumnMapping,
        record::Decision,
        schema::QuestionDefinition,
    };

    fn candidate(row: usize, identity: Option<&str>) -> CandidateRecord {
        CandidateRecord {
            row,
            answers: Answers::new(),
            identity: identity.map(str::to_string),
            is_duplicate: false,
            decision: Decision::Pending,
            selected: true,
        }
    }

    fn schema() -> Schema {
        Schema::new(vec![QuestionDefinition::text("q_email", "Best email", true)]).expect("schema")
    }

    #[test]
    fn existing_identities_match_case_insensitively() {
        let existing = HashSet::from(["jane@x.com".to_string()]);
        let result = partition(
            vec![candidate(1, Some("JANE@x.com")), candidate(2, Some("bob@x.com"))],
            &existing,
        );
        assert_eq!(result.duplicate_identities(), vec!["JANE@x.com"]);
        assert!(result.duplicates[0].is_duplicate);
        assert_eq!(result.to_create.len(), 1);
        assert_eq!(result.to_create[0].row, 2);
    }

    #[test]
    fn repeats_within_batch_keep_first_occurrence() {
        let result = partition(
            vec![
                candidate(1, Some("a@x.com")),
                candidate(2, Some("A@X.COM")),
                candidate(3, None),
                candidate(4, None),
            ],
            &HashSet::new(),
        );
        assert_eq!(
            result.to_create.iter().map(|c| c.row).collect::<Vec<_>>(),
            vec![1, 3, 4]
        );
        assert_eq!(result.duplicates[0].row, 2);
        assert_eq!(result.unidentified_rows(), vec![3, 4]);
    }

    #[test]
    fn deselected_candidates_are_neither_created_nor_duplicates() {
        let mut skipped = candidate(1, Some("a@x.com"));
        skipped.selected = false;
        let result = partition(
            vec![skipped, candidate(2, Some("A@x.com"))],
            &HashSet::new(),
        );
        assert!(result.duplicates.is_empty());
        assert_eq!(
            result.to_create.iter().map(|c| c.row).collect::<Vec<_>>(),
            vec![2]
        );
    }

    #[test]
    fn identity_prefers_canonical_question() {
        let mapping = FieldMapping {
            columns: vec![
                ColumnMapping {
                    column: "email".to_string(),
                    target: MappingTarget::existing("q_email"),
                },
                ColumnMapping {
                    column: "work email".to_string(),
                    target: MappingTarget::create_new("Work email"),
                },
            ],
        };
        let mut answers = Answers::new();
        answers.insert(AnswerKey::pending("Work email"), "work@x.com".to_string());
        assert_eq!(
            resolve_identity(&answers, &mapping, &schema()).as_deref(),
            Some("work@x.com")
        );
        answers.insert(AnswerKey::question("q_email"), "me@x.com".to_string());
        assert_eq!(
            resolve_identity(&answers, &mapping, &schema()).as_deref(),
            Some("me@x.com")
        );
    }

    #[test]
    fn new_field_without_email_column_is_not_identity() {
        let mapping = FieldMapping {
            columns: vec![ColumnMapping {
                column: "contact".to_string(),
                target: MappingTarget::create_new("Contact"),
            }],
        };
        let mut answers = Answers::new();
        answers.insert(AnswerKey::pending("Contact"), "c@x.com".to_string());
        assert_eq!(resolve_identity(&answers, &mapping, &schema()), None);
    }
}
