//! Error taxonomy for the import pipeline.
//!
//! Every stage before the commit is pure, so [`ImportError::Parse`],
//! [`ImportError::InvalidMapping`] and [`ImportError::Validation`] are always
//! raised before anything touches storage. [`ImportError::Persistence`] means
//! the transaction was rolled back and the request can be retried as-is;
//! [`ImportError::Store`] covers storage problems a retry will not fix, such
//! as a missing form.

use itertools::Itertools;
use serde::Serialize;
use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Could not parse upload: {0}")]
    Parse(String),
    #[error("Invalid column mapping: {0}")]
    InvalidMapping(String),
    #[error("{} row(s) are missing required answers: {}", .invalid_rows.len(), describe_rows(.invalid_rows))]
    Validation {
        invalid_rows: Vec<usize>,
        missing: Vec<RowViolation>,
    },
    #[error("Import failed and was rolled back: {0}")]
    Persistence(StoreError),
    #[error("{0}")]
    Store(StoreError),
}

impl From<StoreError> for ImportError {
    fn from(err: StoreError) -> Self {
        if err.is_transient() {
            ImportError::Persistence(err)
        } else {
            ImportError::Store(err)
        }
    }
}

/// Required questions left unanswered in one data row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowViolation {
    pub row: usize,
    pub missing_labels: Vec<String>,
}

/// Wire shape of a failed import.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invalid_rows: Option<Vec<usize>>,
}

impl ImportError {
    pub fn invalid_rows(&self) -> Option<&[usize]> {
        match self {
            ImportError::Validation { invalid_rows, .. } => Some(invalid_rows),
            _ => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, ImportError::Persistence(_))
    }

    pub fn response(&self) -> ErrorResponse {
        let error = match self {
            ImportError::Persistence(_) => "Import failed; no records were saved. Please retry.".to_string(),
            other => other.to_string(),
        };
        ErrorResponse {
            error,
            invalid_rows: self.invalid_rows().map(<[usize]>::to_vec),
        }
    }
}

fn describe_rows(rows: &[usize]) -> String {
    const SHOWN: usize = 20;
    let mut listed = rows.iter().take(SHOWN).join(", ");
    if rows.len() > SHOWN {
        listed.push_str(&format!(" (+{} more)", rows.len() - SHOWN));
    }
    listed
}
