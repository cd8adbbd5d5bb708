//! End-to-end import orchestration.
//!
//! Stages run in a fixed order: parse, map, plan new fields, admit, commit.
//! Only the commit touches storage beyond the initial schema read, so a
//! request that fails earlier leaves no trace.

use std::collections::HashSet;

use log::{debug, info};

use crate::{
    commit::{self, ImportSummary},
    error::ImportError,
    extend::{self, SchemaExtension},
    mapping::{self, ColumnMapping, FieldMapping},
    record::Decision,
    schema::Schema,
    store::FormStore,
    tabular::{self, Table},
    validate,
};

#[derive(Debug, Clone, Default)]
pub struct ImportRequest {
    pub form: String,
    pub text: String,
    /// Saved mapping applied on top of the proposal, before `overrides`.
    pub plan: Option<FieldMapping>,
    pub overrides: Vec<ColumnMapping>,
    /// 1-based data rows left out of the import.
    pub excluded_rows: HashSet<usize>,
    pub decision: Decision,
    pub dry_run: bool,
}

impl ImportRequest {
    pub fn new(form: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            form: form.into(),
            text: text.into(),
            ..Self::default()
        }
    }
}

/// Parsed upload with its final mapping, before anything is admitted.
#[derive(Debug, Clone)]
pub struct Preview {
    pub schema: Schema,
    pub table: Table,
    pub mapping: FieldMapping,
    pub extension: SchemaExtension,
}

pub struct Importer<'s, S: FormStore> {
    store: &'s mut S,
}

impl<'s, S: FormStore> Importer<'s, S> {
    pub fn new(store: &'s mut S) -> Self {
        Self { store }
    }

    /// Parses the upload and resolves the mapping the import would use.
    pub fn preview(
        &self,
        form: &str,
        text: &str,
        plan: Option<&FieldMapping>,
        overrides: &[ColumnMapping],
    ) -> Result<Preview, ImportError> {
        let schema = self.store.load_schema(form)?;
        let table = tabular::parse(text)?;
        debug!(
            "Parsed {} column(s) and {} row(s)",
            table.headers.len(),
            table.row_count()
        );

        let mut mapping = mapping::propose(&table.headers, &schema);
        if let Some(plan) = plan {
            mapping.apply_overrides(&plan.columns)?;
        }
        mapping.apply_overrides(overrides)?;
        mapping.check(&schema)?;

        let extension = extend::plan(&mapping, &schema, &schema.used_labels())?;
        Ok(Preview {
            schema,
            table,
            mapping,
            extension,
        })
    }

    pub fn run(&mut self, request: &ImportRequest) -> Result<ImportSummary, ImportError> {
        let Preview {
            schema,
            table,
            mapping,
            extension,
        } = self.preview(
            &request.form,
            &request.text,
            request.plan.as_ref(),
            &request.overrides,
        )?;

        let candidates = validate::admit(
            &table,
            &mapping,
            &schema,
            &extension,
            &request.excluded_rows,
            request.decision,
        )?;
        info!(
            "Admitted {} of {} row(s) for form '{}'",
            candidates.iter().filter(|c| c.selected).count(),
            table.row_count(),
            request.form
        );

        commit::commit(
            &mut *self.store,
            &request.form,
            &schema,
            &extension,
            candidates,
            request.dry_run,
        )
    }
}
