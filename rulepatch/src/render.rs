//! Plain-text rendering of questionnaires and query results

use std::fmt::Write;

use serde_json::{Map, Value};

use rulepatch_core::{FieldDescriptor, FieldGroup, FieldInput, FormState};

/// Human-readable questionnaire, one block per element
pub fn questionnaire_text(form: &FormState) -> String {
    let mut out = String::new();
    for group in form.groups() {
        let _ = writeln!(out, "== {} ==", group.legend);
        for field in &group.fields {
            render_field(&mut out, field, 1, None);
        }
        out.push('\n');
    }
    out
}

fn render_field(out: &mut String, field: &FieldDescriptor, depth: usize, gate: Option<&str>) {
    let indent = "  ".repeat(depth);
    match gate {
        Some(gate) => {
            let _ = writeln!(out, "{}[when \"{}\"] {}", indent, gate, field.statement);
        }
        None => {
            let _ = writeln!(out, "{}{}", indent, field.statement);
        }
    }
    let _ = writeln!(out, "{}  key: {}", indent, field.key);

    if let Some(hint) = field.hint.as_ref().filter(|h| !h.text.is_empty()) {
        let _ = writeln!(out, "{}  {}:", indent, hint.header);
        for line in hint.text.lines() {
            let _ = writeln!(out, "{}    {}", indent, line);
        }
    }

    match &field.input {
        FieldInput::Select { options } => {
            let _ = writeln!(out, "{}  choose: {} (default {})", indent, options.join(" | "), field.initial);
        }
        FieldInput::Number { min, step } => {
            let _ = writeln!(out, "{}  number >= {}, step {} (default {})", indent, min, step, field.initial);
        }
        FieldInput::TextArea | FieldInput::Text => {
            if !field.initial.is_empty() {
                let _ = writeln!(out, "{}  current: {}", indent, field.initial);
            }
        }
        FieldInput::Table(table) => {
            let titles: Vec<&str> = table.columns.iter().map(|c| c.title.as_str()).collect();
            let _ = writeln!(out, "{}  table: {}", indent, titles.join(" | "));
            for row in &table.rows {
                let cells: Vec<String> = table
                    .columns
                    .iter()
                    .map(|c| row.get(&c.name).and_then(Value::as_str).unwrap_or_default().to_string())
                    .collect();
                let _ = writeln!(out, "{}    {}", indent, cells.join(" | "));
            }
        }
    }

    if let Some(nested) = &field.nested {
        render_field(out, &nested.field, depth + 1, Some(&nested.gate));
    }
}

/// Answers template: every field with its starting value, nested ones included.
///
/// Nested fields only take effect when their gate is answered, so they are
/// listed even while hidden.
pub fn answers_template(groups: &[FieldGroup]) -> Value {
    let mut answers = Map::new();
    for group in groups {
        for field in &group.fields {
            for f in field.chain() {
                let value = match &f.input {
                    FieldInput::Table(table) => Value::Array(table.rows.iter().cloned().map(Value::Object).collect()),
                    _ => Value::String(f.initial.clone()),
                };
                answers.insert(f.key.clone(), value);
            }
        }
    }
    Value::Object(answers)
}
