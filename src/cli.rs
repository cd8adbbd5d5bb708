use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::{mapping::ColumnMapping, record::Decision};

#[derive(Debug, Parser)]
#[command(author, version, about = "Bulk-onboard members into an application form", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create or inspect application forms
    #[command(subcommand)]
    Form(FormCommand),
    /// Propose a column mapping for an upload and optionally save it as a plan
    Mapping(MappingArgs),
    /// Validate, deduplicate and commit an upload into a form
    Import(ImportArgs),
    /// List stored records of a form or export them as CSV
    Records(RecordsArgs),
}

#[derive(Debug, Subcommand)]
pub enum FormCommand {
    /// Create a form from a YAML question list
    Init(FormInitArgs),
    /// Print the questions of a form
    Show(FormShowArgs),
}

#[derive(Debug, Args)]
pub struct StoreArgs {
    /// SQLite database holding forms and records (created if missing)
    #[arg(long)]
    pub db: PathBuf,
    /// Form identifier
    #[arg(long)]
    pub form: String,
}

#[derive(Debug, Args)]
pub struct UploadArgs {
    /// Uploaded CSV file (`-` reads stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Character encoding of the upload (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Override one column's target: `col=skip`, `col=new[:label]`, `col=<question id>`
    #[arg(long = "map", value_parser = parse_override, action = clap::ArgAction::Append)]
    pub overrides: Vec<ColumnMapping>,
}

#[derive(Debug, Args)]
pub struct FormInitArgs {
    #[command(flatten)]
    pub store: StoreArgs,
    /// YAML schema file with a `questions` list; the first question is the identity
    #[arg(short, long)]
    pub schema: PathBuf,
}

#[derive(Debug, Args)]
pub struct FormShowArgs {
    #[command(flatten)]
    pub store: StoreArgs,
}

#[derive(Debug, Args)]
pub struct MappingArgs {
    #[command(flatten)]
    pub store: StoreArgs,
    #[command(flatten)]
    pub upload: UploadArgs,
    /// Saved mapping plan to start from
    #[arg(long = "mapping")]
    pub plan: Option<PathBuf>,
    /// Write the resolved mapping to this YAML plan file
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ImportArgs {
    #[command(flatten)]
    pub store: StoreArgs,
    #[command(flatten)]
    pub upload: UploadArgs,
    /// Mapping plan produced by the `mapping` command
    #[arg(long = "mapping")]
    pub plan: Option<PathBuf>,
    /// Decision state given to every imported record
    #[arg(long, value_enum, default_value_t = Decision::Pending)]
    pub decision: Decision,
    /// Leave a data row (1-based) out of the import; repeatable
    #[arg(long = "exclude-row", action = clap::ArgAction::Append)]
    pub exclude_rows: Vec<usize>,
    /// Run every stage and roll the transaction back
    #[arg(long)]
    pub dry_run: bool,
    /// Print the result as JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct RecordsArgs {
    #[command(flatten)]
    pub store: StoreArgs,
    /// Export records to this CSV file (`-` writes stdout) instead of printing a table
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the export (defaults to utf-8)
    #[arg(long = "output-encoding")]
    pub output_encoding: Option<String>,
}

pub fn parse_override(value: &str) -> Result<ColumnMapping, String> {
    value.parse::<ColumnMapping>().map_err(|err| err.to_string())
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
