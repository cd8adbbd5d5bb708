use anyhow::{Context, Result, anyhow};
use log::info;

use crate::{
    cli::RecordsArgs,
    io_utils,
    record::StoredRecord,
    schema::Schema,
    store::{FormStore, SqliteStore},
    table::TextTable,
};

const FIXED_COLUMNS: [&str; 5] = ["id", "row", "identity", "decision", "imported_at"];

pub fn execute(args: &RecordsArgs) -> Result<()> {
    let store = SqliteStore::open(&args.store.db)
        .with_context(|| format!("Opening database {:?}", args.store.db))?;
    let schema = store
        .load_schema(&args.store.form)
        .with_context(|| format!("Loading form '{}'", args.store.form))?;
    let records = store
        .records(&args.store.form)
        .with_context(|| format!("Reading records of form '{}'", args.store.form))?;

    let headers = headers(&schema);
    match &args.output {
        Some(path) => {
            let delimiter = io_utils::resolve_output_delimiter(Some(path), args.delimiter);
            let encoding = io_utils::resolve_encoding(args.output_encoding.as_deref())?;
            let mut writer = io_utils::csv_buffer(delimiter);
            writer.write_record(&headers)?;
            for record in &records {
                writer.write_record(record_cells(record, &schema))?;
            }
            let buffer = writer
                .into_inner()
                .map_err(|err| anyhow!("Finishing record export: {}", err.error()))?;
            let text = String::from_utf8(buffer).context("Record export is not UTF-8")?;
            io_utils::write_encoded(path, &text, encoding)?;
            info!("Exported {} record(s) to {path:?}", records.len());
        }
        None => {
            let mut table = TextTable::new(headers);
            for record in &records {
                table.push_row(record_cells(record, &schema));
            }
            table.print();
            info!(
                "Form '{}' holds {} record(s)",
                args.store.form,
                records.len()
            );
        }
    }
    Ok(())
}

fn headers(schema: &Schema) -> Vec<String> {
    FIXED_COLUMNS
        .iter()
        .map(|name| name.to_string())
        .chain(schema.questions.iter().map(|q| q.label.clone()))
        .collect()
}

/// One output row: fixed columns, then one answer per question in schema order.
fn record_cells(record: &StoredRecord, schema: &Schema) -> Vec<String> {
    let mut cells = vec![
        record.id.clone(),
        record.row.to_string(),
        record.identity.clone().unwrap_or_default(),
        record.decision.to_string(),
        record.imported_at.to_rfc3339(),
    ];
    cells.extend(
        schema
            .questions
            .iter()
            .map(|q| record.answers.get(&q.id).cloned().unwrap_or_default()),
    );
    cells
}
