use anyhow::{Context, Result};
use log::info;

use crate::{
    cli::{FormInitArgs, FormShowArgs},
    schema::Schema,
    store::{FormStore, SqliteStore},
    table::TextTable,
};

pub fn init(args: &FormInitArgs) -> Result<()> {
    let schema = Schema::load(&args.schema)?;
    let mut store = SqliteStore::open(&args.store.db)
        .with_context(|| format!("Opening database {:?}", args.store.db))?;
    store
        .create_form(&args.store.form, &schema)
        .with_context(|| format!("Creating form '{}'", args.store.form))?;
    info!(
        "Form '{}' created with {} question(s); identity question is '{}'",
        args.store.form,
        schema.questions.len(),
        schema.identity().map_or("-", |question| question.id.as_str())
    );
    Ok(())
}

pub fn show(args: &FormShowArgs) -> Result<()> {
    let store = SqliteStore::open(&args.store.db)
        .with_context(|| format!("Opening database {:?}", args.store.db))?;
    let schema = store
        .load_schema(&args.store.form)
        .with_context(|| format!("Loading form '{}'", args.store.form))?;
    schema_table(&schema).print();
    Ok(())
}

pub(crate) fn schema_table(schema: &Schema) -> TextTable {
    let mut table = TextTable::new(["#", "id", "label", "type", "required", "options"]);
    for (idx, question) in schema.questions.iter().enumerate() {
        table.push_row([
            (idx + 1).to_string(),
            question.id.clone(),
            question.label.clone(),
            question.question_type.to_string(),
            if question.required { "yes" } else { "no" }.to_string(),
            question.options.as_deref().unwrap_or_default().join(" | "),
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::QuestionDefinition;

    #[test]
    fn schema_table_lists_questions_in_order() {
        let schema = Schema::new(vec![
            QuestionDefinition::text("q_email", "Best email", true),
            QuestionDefinition::text("q_city", "City", false),
        ])
        .unwrap();
        let rendered = schema_table(&schema).render();
        let lines = rendered.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 4);
        assert!(lines[2].starts_with('1'));
        assert!(lines[2].contains("q_email"));
        assert!(lines[3].contains("City"));
        assert!(lines[3].contains("no"));
    }
}
