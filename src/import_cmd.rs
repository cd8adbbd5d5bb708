use anyhow::{Context, Result};
use log::{info, warn};

use crate::{
    cli::ImportArgs,
    commit::ImportSummary,
    error::ImportError,
    io_utils,
    mapping::FieldMapping,
    pipeline::{ImportRequest, Importer},
    store::SqliteStore,
    table::TextTable,
};

pub fn execute(args: &ImportArgs) -> Result<()> {
    let encoding = io_utils::resolve_encoding(args.upload.input_encoding.as_deref())?;
    let text = io_utils::read_input_text(&args.upload.input, encoding)?;
    let plan = args.plan.as_deref().map(FieldMapping::load).transpose()?;
    let mut store = SqliteStore::open(&args.store.db)
        .with_context(|| format!("Opening database {:?}", args.store.db))?;

    let request = ImportRequest {
        form: args.store.form.clone(),
        text,
        plan,
        overrides: args.upload.overrides.clone(),
        excluded_rows: args.exclude_rows.iter().copied().collect(),
        decision: args.decision,
        dry_run: args.dry_run,
    };
    info!(
        "Importing {:?} into form '{}'",
        args.upload.input, args.store.form
    );

    match Importer::new(&mut store).run(&request) {
        Ok(summary) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                summary_table(&summary).print();
                println!("{}", summary.message);
            }
            if !summary.needs_manual_identity.is_empty() {
                warn!(
                    "Row(s) {:?} have no identity value and cannot be deduplicated later",
                    summary.needs_manual_identity
                );
            }
            Ok(())
        }
        Err(err) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&err.response())?);
            } else if let ImportError::Validation { missing, .. } = &err {
                let mut table = TextTable::new(["row", "missing"]);
                for violation in missing {
                    table.push_row([violation.row.to_string(), violation.missing_labels.join(", ")]);
                }
                table.print();
            }
            if err.is_retryable() {
                warn!("Nothing was saved; the import can be retried unchanged");
            }
            Err(err.into())
        }
    }
}

pub(crate) fn summary_table(summary: &ImportSummary) -> TextTable {
    let mut table = TextTable::new(["result", "value"]);
    table.push_row(["total".to_string(), summary.total.to_string()]);
    table.push_row(["imported".to_string(), summary.imported.to_string()]);
    table.push_row(["duplicates".to_string(), summary.duplicates.to_string()]);
    if !summary.duplicate_identities.is_empty() {
        table.push_row([
            "duplicate identities".to_string(),
            summary.duplicate_identities.join(", "),
        ]);
    }
    table.push_row([
        "new fields".to_string(),
        if summary.new_fields.is_empty() {
            "0".to_string()
        } else {
            format!("{} ({})", summary.new_fields_created, summary.new_fields.join(", "))
        },
    ]);
    if !summary.needs_manual_identity.is_empty() {
        let rows = summary
            .needs_manual_identity
            .iter()
            .map(|row| row.to_string())
            .collect::<Vec<_>>();
        table.push_row(["missing identity".to_string(), rows.join(", ")]);
    }
    table
}
