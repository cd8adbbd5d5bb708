use anyhow::{Context, Result};
use log::info;

use crate::{
    cli::MappingArgs,
    io_utils,
    mapping::{FieldMapping, MappingTarget},
    pipeline::{Importer, Preview},
    store::SqliteStore,
    table::TextTable,
};

pub fn execute(args: &MappingArgs) -> Result<()> {
    let encoding = io_utils::resolve_encoding(args.upload.input_encoding.as_deref())?;
    let text = io_utils::read_input_text(&args.upload.input, encoding)?;
    let plan = args.plan.as_deref().map(FieldMapping::load).transpose()?;
    let mut store = SqliteStore::open(&args.store.db)
        .with_context(|| format!("Opening database {:?}", args.store.db))?;

    let preview = Importer::new(&mut store).preview(
        &args.store.form,
        &text,
        plan.as_ref(),
        &args.upload.overrides,
    )?;
    mapping_table(&preview).print();

    let mapped = preview
        .mapping
        .iter()
        .filter(|(_, target)| !target.is_skip())
        .count();
    info!(
        "Mapped {mapped} of {} column(s); {} new field(s) would be created",
        preview.mapping.columns.len(),
        preview.extension.len()
    );

    if let Some(path) = &args.output {
        preview
            .mapping
            .save(path)
            .with_context(|| format!("Writing mapping plan to {path:?}"))?;
        info!("Mapping plan written to {path:?}");
    }
    Ok(())
}

pub(crate) fn mapping_table(preview: &Preview) -> TextTable {
    let mut table = TextTable::new(["column", "target", "question", "sample"]);
    for (column, target) in preview.mapping.iter() {
        let question = match target {
            MappingTarget::Existing { question } => preview
                .schema
                .question(question)
                .map(|q| q.label.clone())
                .unwrap_or_default(),
            MappingTarget::CreateNew { label } => match preview.extension.resolve(label) {
                Some(id) => format!("{label} ({id})"),
                None => label.clone(),
            },
            MappingTarget::Skip => String::new(),
        };
        let sample = preview.table.cell(0, column).unwrap_or_default().to_string();
        table.push_row([column.to_string(), target.to_string(), question, sample]);
    }
    table
}
