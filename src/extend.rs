//! New-field synthesis for columns mapped to [`MappingTarget::CreateNew`].
//!
//! Labels are the dedup key: any number of columns asking for the same label
//! share one new question. Ids are derived from the label so that replaying
//! an import after a rollback mints the same ids.

use std::collections::{BTreeMap, HashSet};

use heck::ToSnakeCase;
use log::debug;

use crate::{
    error::ImportError,
    mapping::{FieldMapping, MappingTarget},
    schema::{QuestionDefinition, QuestionType, Schema, normalize_label},
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaExtension {
    /// Questions to append, in first-mention order.
    pub questions: Vec<QuestionDefinition>,
    /// Normalized label to the question id that answers it.
    resolved: BTreeMap<String, String>,
}

impl SchemaExtension {
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    /// Question id for a `CreateNew` label, new or reused.
    pub fn resolve(&self, label: &str) -> Option<&str> {
        self.resolved.get(&normalize_label(label)).map(String::as_str)
    }

    pub fn labels(&self) -> Vec<String> {
        self.questions.iter().map(|q| q.label.clone()).collect()
    }
}

/// Plans the questions needed by every `CreateNew` entry of the final mapping.
///
/// `used_labels` holds normalized labels that are already taken; a request
/// for one of them resolves to the schema question carrying that label.
/// Choice questions are never reused this way since new-field values are
/// free text.
pub fn plan(
    mapping: &FieldMapping,
    schema: &Schema,
    used_labels: &HashSet<String>,
) -> Result<SchemaExtension, ImportError> {
    let mut extension = SchemaExtension::default();
    let mut taken_ids = schema
        .ids()
        .into_iter()
        .map(str::to_string)
        .collect::<HashSet<_>>();

    for (column, target) in mapping.iter() {
        let MappingTarget::CreateNew { label } = target else {
            continue;
        };
        let label = label.trim();
        let key = normalize_label(label);
        if extension.resolved.contains_key(&key) {
            debug!("Column '{column}' shares new field '{label}'");
            continue;
        }
        if used_labels.contains(&key) {
            let existing = schema
                .questions
                .iter()
                .find(|q| normalize_label(&q.label) == key)
                .ok_or_else(|| {
                    ImportError::InvalidMapping(format!(
                        "label '{label}' requested by column '{column}' is already in use"
                    ))
                })?;
            if existing.question_type.is_choice() {
                return Err(ImportError::InvalidMapping(format!(
                    "column '{column}' asks for new field '{label}', but that label belongs to {} question '{}'",
                    existing.question_type, existing.id
                )));
            }
            debug!(
                "Column '{column}' asks for '{label}', reusing question '{}'",
                existing.id
            );
            extension.resolved.insert(key, existing.id.clone());
            continue;
        }

        let id = mint_id(label, &taken_ids);
        taken_ids.insert(id.clone());
        debug!("New field '{label}' -> {id} (from column '{column}')");
        extension.questions.push(new_question(id.clone(), label));
        extension.resolved.insert(key, id);
    }
    Ok(extension)
}

fn new_question(id: String, label: &str) -> QuestionDefinition {
    QuestionDefinition {
        id,
        label: label.to_string(),
        question_type: QuestionType::Text,
        required: false,
        placeholder: Some(format!("Enter {}", label.to_lowercase())),
        options: None,
    }
}

fn mint_id(label: &str, taken: &HashSet<String>) -> String {
    let slug = label.to_snake_case();
    let base = if slug.is_empty() {
        "q_field".to_string()
    } else {
        format!("q_{slug}")
    };
    if !taken.contains(&base) {
        return base;
    }
    let mut suffix = 2;
    loop {
        let candidate = format!("{base}_{suffix}");
        if !taken.contains(&candidate) {
            return candidate;
        }
        suffix += 1;
    }
}
