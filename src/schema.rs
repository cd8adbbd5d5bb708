//! Form schema model and YAML persistence.
//!
//! A [`Schema`] is the ordered list of [`QuestionDefinition`]s owned by one
//! form. Element 0 is the identity question (usually an email field): it must
//! be required, and it can never be removed or retyped. The import pipeline
//! only ever appends to a schema.

use std::{
    collections::HashSet,
    fmt,
    fs::File,
    io::BufReader,
    path::Path,
    str::FromStr,
};

use anyhow::{Context, Result, anyhow, ensure};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionType {
    Text,
    SingleChoice,
    MultiChoice,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::Text => "text",
            QuestionType::SingleChoice => "single-choice",
            QuestionType::MultiChoice => "multi-choice",
        }
    }

    pub fn is_choice(&self) -> bool {
        !matches!(self, QuestionType::Text)
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuestionType {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(QuestionType::Text),
            "single-choice" | "single_choice" | "select" => Ok(QuestionType::SingleChoice),
            "multi-choice" | "multi_choice" | "multiselect" => Ok(QuestionType::MultiChoice),
            other => Err(anyhow!(
                "Unknown question type '{other}'. Supported types: text, single-choice, multi-choice"
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionDefinition {
    pub id: String,
    pub label: String,
    #[serde(rename = "type", default = "QuestionDefinition::default_type")]
    pub question_type: QuestionType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}

impl QuestionDefinition {
    pub fn text(id: impl Into<String>, label: impl Into<String>, required: bool) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            question_type: QuestionType::Text,
            required,
            placeholder: None,
            options: None,
        }
    }

    const fn default_type() -> QuestionType {
        QuestionType::Text
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Schema {
    pub questions: Vec<QuestionDefinition>,
}

impl Schema {
    pub fn new(questions: Vec<QuestionDefinition>) -> Result<Self> {
        let schema = Self { questions };
        schema.validate()?;
        Ok(schema)
    }

    /// Checks the structural invariants every stored schema must satisfy.
    pub fn validate(&self) -> Result<()> {
        let identity = self
            .questions
            .first()
            .ok_or_else(|| anyhow!("Schema must define at least the identity question"))?;
        ensure!(
            identity.required,
            "Identity question '{}' must be required",
            identity.id
        );
        let mut ids = HashSet::new();
        for question in &self.questions {
            ensure!(!question.id.trim().is_empty(), "Question ids cannot be blank");
            ensure!(
                !question.label.trim().is_empty(),
                "Question '{}' has a blank label",
                question.id
            );
            ensure!(
                ids.insert(question.id.as_str()),
                "Duplicate question id '{}'",
                question.id
            );
            if question.question_type.is_choice() {
                ensure!(
                    question.options.as_ref().is_some_and(|opts| !opts.is_empty()),
                    "Choice question '{}' must list its options",
                    question.id
                );
            }
        }
        Ok(())
    }

    /// The identity question; `None` only for a schema that fails [`Schema::validate`].
    pub fn identity(&self) -> Option<&QuestionDefinition> {
        self.questions.first()
    }

    pub fn question(&self, id: &str) -> Option<&QuestionDefinition> {
        self.questions.iter().find(|q| q.id == id)
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.question(id).is_some()
    }

    pub fn ids(&self) -> HashSet<&str> {
        self.questions.iter().map(|q| q.id.as_str()).collect()
    }

    /// Labels in use, normalized for comparison.
    pub fn used_labels(&self) -> HashSet<String> {
        self.questions
            .iter()
            .map(|q| normalize_label(&q.label))
            .collect()
    }

    pub fn required(&self) -> impl Iterator<Item = &QuestionDefinition> {
        self.questions.iter().filter(|q| q.required)
    }

    /// Returns a copy of this schema with `additions` appended.
    pub fn extended(&self, additions: &[QuestionDefinition]) -> Result<Schema> {
        let mut questions = self.questions.clone();
        questions.extend(additions.iter().cloned());
        Schema::new(questions)
    }

    /// Verifies that `self` only appends to `previous`.
    pub fn ensure_extends(&self, previous: &Schema) -> Result<()> {
        ensure!(
            self.questions.len() >= previous.questions.len(),
            "Schema update would remove {} question(s)",
            previous.questions.len() - self.questions.len()
        );
        for (idx, (before, after)) in previous.questions.iter().zip(&self.questions).enumerate() {
            ensure!(
                before == after,
                "Schema update would modify question '{}' at position {}",
                before.id,
                idx + 1
            );
        }
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening schema file {path:?}"))?;
        let schema: Schema = serde_yaml::from_reader(BufReader::new(file))
            .with_context(|| format!("Parsing schema YAML {path:?}"))?;
        schema
            .validate()
            .with_context(|| format!("Validating schema {path:?}"))?;
        Ok(schema)
    }
}

pub fn normalize_label(label: &str) -> String {
    label.trim().to_lowercase()
}
