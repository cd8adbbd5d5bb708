//! Upload tokenizer.
//!
//! The text is split into physical lines first and each line is then
//! tokenized with quote awareness: commas inside a quoted field are literal
//! and `""` stands for one quote character. Because lines are split before
//! tokenizing, a quoted field cannot contain an embedded newline; such a
//! field ends at the line break and the remainder becomes a new row.

use std::collections::{BTreeMap, HashSet};

use log::debug;

use crate::error::ImportError;

const DELIMITER: char = ',';
const QUOTE: char = '"';

/// One data row keyed by column name.
pub type RawRow = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Cell lookup by column name for a 0-based row index.
    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let idx = self.headers.iter().position(|h| h == column)?;
        self.rows.get(row)?.get(idx).map(String::as_str)
    }

    pub fn raw_row(&self, row: usize) -> Option<RawRow> {
        let values = self.rows.get(row)?;
        Some(
            self.headers
                .iter()
                .cloned()
                .zip(values.iter().cloned())
                .collect(),
        )
    }
}

pub fn parse(text: &str) -> Result<Table, ImportError> {
    let mut lines = text
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .filter(|line| !line.trim().is_empty());

    let header_line = lines
        .next()
        .ok_or_else(|| ImportError::Parse("the file is empty".to_string()))?;
    let headers = normalize_headers(tokenize_line(header_line))?;
    let width = headers.len();

    let mut rows = Vec::new();
    let mut dropped = 0usize;
    for line in lines {
        let mut fields = tokenize_line(line);
        if fields.iter().all(|field| field.is_empty()) {
            dropped += 1;
            continue;
        }
        if fields.len() > width {
            debug!(
                "Ignoring {} trailing field(s) beyond the {} header column(s)",
                fields.len() - width,
                width
            );
        }
        fields.resize(width, String::new());
        rows.push(fields);
    }
    if dropped > 0 {
        debug!("Dropped {dropped} row(s) consisting only of blank fields");
    }
    if rows.is_empty() {
        return Err(ImportError::Parse(
            "expected a header line and at least one data row".to_string(),
        ));
    }
    Ok(Table { headers, rows })
}

/// Splits one physical line into trimmed field values.
pub fn tokenize_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            QUOTE if in_quotes && chars.peek() == Some(&QUOTE) => {
                current.push(QUOTE);
                chars.next();
            }
            QUOTE => in_quotes = !in_quotes,
            DELIMITER if !in_quotes => {
                fields.push(current.trim().to_string());
                current.clear();
            }
            other => current.push(other),
        }
    }
    fields.push(current.trim().to_string());
    fields
}

fn normalize_headers(raw: Vec<String>) -> Result<Vec<String>, ImportError> {
    let headers = raw
        .into_iter()
        .enumerate()
        .map(|(idx, name)| {
            if name.is_empty() {
                format!("column_{}", idx + 1)
            } else {
                name
            }
        })
        .collect::<Vec<_>>();

    let mut seen = HashSet::new();
    for header in &headers {
        if !seen.insert(header.as_str()) {
            return Err(ImportError::Parse(format!(
                "column '{header}' appears more than once in the header row"
            )));
        }
    }
    Ok(headers)
}
