//! Candidate and stored record types.

use std::{collections::BTreeMap, fmt, str::FromStr};

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::schema::normalize_label;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "kebab-case")]
pub enum Decision {
    #[default]
    Pending,
    Accepted,
    Denied,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Pending => "pending",
            Decision::Accepted => "accepted",
            Decision::Denied => "denied",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Decision {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Decision::Pending),
            "accepted" => Ok(Decision::Accepted),
            "denied" => Ok(Decision::Denied),
            other => Err(anyhow!("Unknown decision '{other}'")),
        }
    }
}

/// Key of one answer before the commit.
///
/// `Pending` carries the normalized label of a field that does not exist yet;
/// the committer rewrites it to the minted question id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AnswerKey {
    Question(String),
    Pending(String),
}

impl AnswerKey {
    pub fn question(id: impl Into<String>) -> Self {
        AnswerKey::Question(id.into())
    }

    pub fn pending(label: &str) -> Self {
        AnswerKey::Pending(normalize_label(label))
    }
}

pub type Answers = BTreeMap<AnswerKey, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateRecord {
    /// 1-based data row in the upload.
    pub row: usize,
    pub answers: Answers,
    pub identity: Option<String>,
    pub is_duplicate: bool,
    pub decision: Decision,
    pub selected: bool,
}

impl CandidateRecord {
    pub fn identity_key(&self) -> Option<String> {
        self.identity.as_deref().map(identity_key)
    }
}

/// Comparison form of an identity value.
pub fn identity_key(value: &str) -> String {
    value.trim().to_lowercase()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: String,
    pub form_id: String,
    pub row: usize,
    pub answers: BTreeMap<String, String>,
    pub decision: Decision,
    pub identity: Option<String>,
    pub imported_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_keys_are_normalized() {
        assert_eq!(AnswerKey::pending(" Phone "), AnswerKey::pending("phone"));
        assert_ne!(AnswerKey::pending("phone"), AnswerKey::question("phone"));
    }

    #[test]
    fn decision_round_trips_through_text() {
        for decision in [Decision::Pending, Decision::Accepted, Decision::Denied] {
            assert_eq!(decision.as_str().parse::<Decision>().unwrap(), decision);
        }
        assert!("maybe".parse::<Decision>().is_err());
    }
}
