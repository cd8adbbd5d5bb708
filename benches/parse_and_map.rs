use std::collections::HashSet;
use std::fmt::Write;

use bulk_onboard::extend;
use bulk_onboard::mapping::{self, ColumnMapping};
use bulk_onboard::record::Decision;
use bulk_onboard::schema::{QuestionDefinition, Schema};
use bulk_onboard::{tabular, validate};
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};

fn schema() -> Schema {
    Schema::new(vec![
        QuestionDefinition::text("q_email", "Best email", true),
        QuestionDefinition::text("q_name", "Full name", true),
        QuestionDefinition::text("q_linkedin", "LinkedIn profile URL", false),
        QuestionDefinition::text("q_city", "City", false),
    ])
    .expect("schema")
}

fn generate_upload(rows: usize) -> String {
    let mut text = String::from("Full Name,Email Address,LinkedIn,City,Phone,Notes\n");
    for i in 0..rows {
        let city = match i % 3 {
            0 => "Lisbon",
            1 => "\"Portland, OR\"",
            _ => "",
        };
        writeln!(
            text,
            "Member {i},member{i}@example.com,https://linkedin.com/in/m{i},{city},555-{i:04},note {i}"
        )
        .expect("row");
    }
    text
}

fn parse_map_validate(c: &mut Criterion) {
    let schema = schema();
    let overrides = vec!["Phone=new:Phone".parse::<ColumnMapping>().expect("override")];
    let mut group = c.benchmark_group("parse_map_validate");
    for rows in [100usize, 1_000, 10_000] {
        let upload = generate_upload(rows);
        group.throughput(Throughput::Elements(rows as u64));
        group.bench_with_input(BenchmarkId::from_parameter(rows), &upload, |b, upload| {
            b.iter(|| {
                let table = tabular::parse(upload).expect("parse");
                let mut mapping = mapping::propose(&table.headers, &schema);
                mapping.apply_overrides(&overrides).expect("overrides");
                let extension =
                    extend::plan(&mapping, &schema, &schema.used_labels()).expect("plan");
                validate::admit(
                    &table,
                    &mapping,
                    &schema,
                    &extension,
                    &HashSet::new(),
                    Decision::Pending,
                )
                .expect("admit")
            })
        });
    }
    group.finish();
}

criterion_group!(benches, parse_map_validate);
criterion_main!(benches);
