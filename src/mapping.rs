//! Column-to-question mapping.
//!
//! [`propose`] is a pure function of the upload headers and the form schema.
//! A column matches a question when one lowercased name contains the other,
//! or when both mention the same canonical keyword. The first matching
//! question in schema order wins; unmatched columns default to
//! [`MappingTarget::Skip`]. Callers override entries before the import runs,
//! and only an override can request [`MappingTarget::CreateNew`].

use std::{fmt, fs::File, io::BufReader, path::Path, str::FromStr};

use anyhow::{Context, Result, anyhow};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{error::ImportError, schema::Schema};

pub const CANONICAL_KEYWORDS: &[&str] = &["email", "name", "phone", "linkedin"];

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum MappingTarget {
    Existing { question: String },
    CreateNew { label: String },
    Skip,
}

impl MappingTarget {
    pub fn existing(id: impl Into<String>) -> Self {
        MappingTarget::Existing { question: id.into() }
    }

    pub fn create_new(label: impl Into<String>) -> Self {
        MappingTarget::CreateNew { label: label.into() }
    }

    pub fn is_skip(&self) -> bool {
        matches!(self, MappingTarget::Skip)
    }
}

impl fmt::Display for MappingTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MappingTarget::Existing { question } => write!(f, "{question}"),
            MappingTarget::CreateNew { label } => write!(f, "new field '{label}'"),
            MappingTarget::Skip => f.write_str("skip"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub column: String,
    #[serde(flatten)]
    pub target: MappingTarget,
}

/// Mapping for every upload column, in upload order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMapping {
    pub columns: Vec<ColumnMapping>,
}

impl FieldMapping {
    pub fn target(&self, column: &str) -> Option<&MappingTarget> {
        self.columns
            .iter()
            .find(|entry| entry.column == column)
            .map(|entry| &entry.target)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MappingTarget)> {
        self.columns
            .iter()
            .map(|entry| (entry.column.as_str(), &entry.target))
    }

    /// Replaces the target of an existing column.
    pub fn set(&mut self, column: &str, target: MappingTarget) -> Result<(), ImportError> {
        let entry = self
            .columns
            .iter_mut()
            .find(|entry| entry.column == column)
            .ok_or_else(|| {
                ImportError::InvalidMapping(format!("column '{column}' is not in the upload"))
            })?;
        debug!("Override: '{column}' -> {target}");
        entry.target = target;
        Ok(())
    }

    pub fn apply_overrides(&mut self, overrides: &[ColumnMapping]) -> Result<(), ImportError> {
        for entry in overrides {
            self.set(&entry.column, entry.target.clone())?;
        }
        Ok(())
    }

    /// Rejects targets that name questions missing from `schema` or blank labels.
    pub fn check(&self, schema: &Schema) -> Result<(), ImportError> {
        for (column, target) in self.iter() {
            match target {
                MappingTarget::Existing { question } if !schema.contains_id(question) => {
                    return Err(ImportError::InvalidMapping(format!(
                        "column '{column}' targets unknown question '{question}'"
                    )));
                }
                MappingTarget::CreateNew { label } if label.trim().is_empty() => {
                    return Err(ImportError::InvalidMapping(format!(
                        "column '{column}' requests a new field with a blank label"
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file =
            File::open(path).with_context(|| format!("Opening mapping plan {path:?}"))?;
        serde_yaml::from_reader(BufReader::new(file))
            .with_context(|| format!("Parsing mapping plan {path:?}"))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file =
            File::create(path).with_context(|| format!("Creating mapping plan {path:?}"))?;
        serde_yaml::to_writer(file, self).context("Writing mapping plan YAML")
    }
}

pub fn propose(headers: &[String], schema: &Schema) -> FieldMapping {
    let columns = headers
        .iter()
        .map(|header| {
            let target = match best_match(header, schema) {
                Some(id) => MappingTarget::existing(id),
                None => MappingTarget::Skip,
            };
            debug!("Proposed '{header}' -> {target}");
            ColumnMapping {
                column: header.clone(),
                target,
            }
        })
        .collect();
    FieldMapping { columns }
}

fn best_match<'a>(header: &str, schema: &'a Schema) -> Option<&'a str> {
    let column = header.to_lowercase();
    schema
        .questions
        .iter()
        .find(|question| labels_match(&column, &question.label.to_lowercase()))
        .map(|question| question.id.as_str())
}

fn labels_match(column: &str, label: &str) -> bool {
    if column.is_empty() || label.is_empty() {
        return false;
    }
    column.contains(label)
        || label.contains(column)
        || CANONICAL_KEYWORDS
            .iter()
            .any(|keyword| column.contains(keyword) && label.contains(keyword))
}

/// Parses a `column=target` override as given on the command line.
///
/// Targets: `skip`, `new`, `new:<label>`, `existing:<id>` or a bare question id.
impl FromStr for ColumnMapping {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (column, target) = value
            .split_once('=')
            .ok_or_else(|| anyhow!("Mapping override '{value}' must use the form column=target"))?;
        let column = column.trim();
        let target = target.trim();
        if column.is_empty() {
            return Err(anyhow!("Mapping override '{value}' is missing a column name"));
        }
        let target = if target.eq_ignore_ascii_case("skip") {
            MappingTarget::Skip
        } else if target.eq_ignore_ascii_case("new") {
            MappingTarget::create_new(column)
        } else if let Some(label) = strip_prefix_ignore_case(target, "new:") {
            MappingTarget::create_new(label.trim())
        } else if let Some(id) = strip_prefix_ignore_case(target, "existing:") {
            MappingTarget::existing(id.trim())
        } else if target.is_empty() {
            return Err(anyhow!("Mapping override '{value}' is missing a target"));
        } else {
            MappingTarget::existing(target)
        };
        Ok(ColumnMapping {
            column: column.to_string(),
            target,
        })
    }
}

fn strip_prefix_ignore_case<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    let head = value.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &value[prefix.len()..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::QuestionDefinition;
    use proptest::prelude::*;

    fn schema() -> Schema {
        Schema::new(vec![
            QuestionDefinition::text("q_email", "Best email", true),
            QuestionDefinition::text("q_name", "Full name", true),
            QuestionDefinition::text("q_linkedin", "LinkedIn profile URL", false),
            QuestionDefinition::text("q_city", "City", false),
        ])
        .expect("schema")
    }

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn keywords_and_containment_drive_matches() {
        let mapping = propose(
            &headers(&["Email Address", "first_name", "LinkedIn", "city", "Favourite colour"]),
            &schema(),
        );
        assert_eq!(mapping.target("Email Address"), Some(&MappingTarget::existing("q_email")));
        assert_eq!(mapping.target("first_name"), Some(&MappingTarget::existing("q_name")));
        assert_eq!(mapping.target("LinkedIn"), Some(&MappingTarget::existing("q_linkedin")));
        assert_eq!(mapping.target("city"), Some(&MappingTarget::existing("q_city")));
        assert_eq!(mapping.target("Favourite colour"), Some(&MappingTarget::Skip));
    }

    #[test]
    fn first_question_in_schema_order_wins() {
        // "email name" mentions both keywords; the identity question comes first
        let mapping = propose(&headers(&["email name"]), &schema());
        assert_eq!(mapping.target("email name"), Some(&MappingTarget::existing("q_email")));
    }

    #[test]
    fn upload_with_single_question_maps_only_email() {
        let schema = Schema::new(vec![QuestionDefinition::text("q_email", "Best email", true)])
            .expect("schema");
        let mapping = propose(&headers(&["name", "email", "phone"]), &schema);
        assert_eq!(mapping.target("email"), Some(&MappingTarget::existing("q_email")));
        assert_eq!(mapping.target("name"), Some(&MappingTarget::Skip));
        assert_eq!(mapping.target("phone"), Some(&MappingTarget::Skip));
    }

    #[test]
    fn overrides_replace_entries_and_reject_unknown_columns() {
        let mut mapping = propose(&headers(&["name", "email"]), &schema());
        mapping
            .apply_overrides(&["name=new:Preferred name".parse::<ColumnMapping>().unwrap()])
            .expect("override");
        assert_eq!(
            mapping.target("name"),
            Some(&MappingTarget::create_new("Preferred name"))
        );
        let err = mapping
            .set("missing", MappingTarget::Skip)
            .unwrap_err();
        assert!(matches!(err, ImportError::InvalidMapping(_)));
    }

    #[test]
    fn check_rejects_unknown_question_ids() {
        let mut mapping = propose(&headers(&["email"]), &schema());
        assert!(mapping.check(&schema()).is_ok());
        mapping.set("email", MappingTarget::existing("q_nope")).unwrap();
        let err = mapping.check(&schema()).unwrap_err();
        assert!(err.to_string().contains("q_nope"));
    }

    #[test]
    fn override_syntax_parses_all_forms() {
        let parsed: ColumnMapping = "phone=skip".parse().unwrap();
        assert_eq!(parsed.target, MappingTarget::Skip);
        let parsed: ColumnMapping = "Phone Number=new".parse().unwrap();
        assert_eq!(parsed.target, MappingTarget::create_new("Phone Number"));
        let parsed: ColumnMapping = "mail=existing:q_email".parse().unwrap();
        assert_eq!(parsed.target, MappingTarget::existing("q_email"));
        let parsed: ColumnMapping = "mail=q_email".parse().unwrap();
        assert_eq!(parsed.target, MappingTarget::existing("q_email"));
        assert!("no-target".parse::<ColumnMapping>().is_err());
        assert!("=skip".parse::<ColumnMapping>().is_err());
    }

    #[test]
    fn plan_yaml_is_tagged() {
        let mapping = FieldMapping {
            columns: vec![
                ColumnMapping {
                    column: "email".to_string(),
                    target: MappingTarget::existing("q_email"),
                },
                ColumnMapping {
                    column: "phone".to_string(),
                    target: MappingTarget::create_new("Phone"),
                },
                ColumnMapping {
                    column: "notes".to_string(),
                    target: MappingTarget::Skip,
                },
            ],
        };
        let yaml = serde_yaml::to_string(&mapping).expect("serialize");
        assert!(yaml.contains("action: create_new"));
        let parsed: FieldMapping = serde_yaml::from_str(&yaml).expect("parse");
        assert_eq!(parsed, mapping);
    }

    proptest! {
        #[test]
        fn proposal_never_creates_fields(
            names in proptest::collection::vec("[A-Za-z _]{1,16}", 1..8)
        ) {
            let mapping = propose(&names, &schema());
            prop_assert_eq!(mapping.columns.len(), names.len());
            for (_, target) in mapping.iter() {
                let is_create = matches!(target, MappingTarget::CreateNew { .. });
                prop_assert!(!is_create);
            }
        }
    }
}
