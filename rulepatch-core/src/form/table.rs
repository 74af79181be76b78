//! Parameters tables: column layout, derived rows and the editable draft

use std::collections::HashMap;

use serde_json::Value;

use super::{FormError, TableColumn, TableField, TableRow};
use crate::labels::capitalize_word;
use crate::rules::ParametersTableSpec;

/// Build the column list of a table. Row keys are the lowercased headers.
pub(crate) fn columns(spec: &ParametersTableSpec) -> Vec<TableColumn> {
    spec.headers
        .iter()
        .map(|header| TableColumn {
            name: header.to_lowercase(),
            title: capitalize_word(header),
            dropdown: spec.dropdown_for(header).map(<[String]>::to_vec),
            sequence_seed: spec.sequence_seed(header),
        })
        .collect()
}

/// Parse a derived-rows attribute into rows over `columns`.
///
/// Missing or empty text gives no rows. Anything that is not a JSON array is
/// logged and treated as empty; non-object entries are skipped.
pub(crate) fn derived_rows(table_id: &str, text: Option<&str>, columns: &[TableColumn]) -> Vec<TableRow> {
    let Some(text) = text.map(str::trim).filter(|t| !t.is_empty()) else {
        return Vec::new();
    };
    let entries = match serde_json::from_str::<Value>(text) {
        Ok(Value::Array(entries)) => entries,
        Ok(Value::Null) => return Vec::new(),
        Ok(other) => {
            tracing::warn!("table {}: derived rows are not a JSON array ({}), starting empty", table_id, kind_of(&other));
            return Vec::new();
        }
        Err(e) => {
            tracing::warn!("table {}: derived rows are not valid JSON ({}), starting empty", table_id, e);
            return Vec::new();
        }
    };

    entries
        .into_iter()
        .filter_map(|entry| match entry {
            Value::Object(object) => Some(
                columns
                    .iter()
                    .map(|column| {
                        let cell = object
                            .get(&column.name)
                            .or_else(|| {
                                object
                                    .iter()
                                    .find(|(key, _)| key.to_lowercase() == column.name)
                                    .map(|(_, value)| value)
                            })
                            .map(cell_text)
                            .unwrap_or_default();
                        (column.name.clone(), Value::String(cell))
                    })
                    .collect(),
            ),
            _ => None,
        })
        .collect()
}

/// Stringify a scalar cell; null reads as ""
pub(crate) fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Rows of one table being edited
#[derive(Debug, Clone, PartialEq)]
pub struct TableDraft {
    id: String,
    columns: Vec<TableColumn>,
    rows: Vec<TableRow>,
    /// Next sequence value per column
    counters: HashMap<String, i64>,
}

impl TableDraft {
    pub fn new(field: &TableField) -> Self {
        let counters = field
            .columns
            .iter()
            .filter_map(|column| column.sequence_seed.map(|seed| (column.name.clone(), seed)))
            .collect();
        TableDraft {
            id: field.id.clone(),
            columns: field.columns.clone(),
            rows: field.rows.clone(),
            counters,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn columns(&self) -> &[TableColumn] {
        &self.columns
    }

    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    /// Append a row with column defaults and return its index.
    ///
    /// Sequence columns take the next counter value, dropdown columns their
    /// first option, everything else "".
    pub fn add_row(&mut self) -> usize {
        let mut row = TableRow::new();
        for column in &self.columns {
            let value = if let Some(counter) = self.counters.get_mut(&column.name) {
                let value = *counter;
                *counter += 1;
                value.to_string()
            } else if let Some(first) = column.dropdown.as_ref().and_then(|options| options.first()) {
                first.clone()
            } else {
                String::new()
            };
            row.insert(column.name.clone(), Value::String(value));
        }
        self.rows.push(row);
        self.rows.len() - 1
    }

    pub fn remove_row(&mut self, row: usize) -> Result<TableRow, FormError> {
        if row >= self.rows.len() {
            return Err(FormError::RowOutOfRange { table: self.id.clone(), row });
        }
        Ok(self.rows.remove(row))
    }

    pub fn set_cell(&mut self, row: usize, column: &str, value: &str) -> Result<(), FormError> {
        if !self.columns.iter().any(|c| c.name == column) {
            return Err(FormError::UnknownColumn {
                table: self.id.clone(),
                column: column.to_string(),
            });
        }
        let Some(target) = self.rows.get_mut(row) else {
            return Err(FormError::RowOutOfRange { table: self.id.clone(), row });
        };
        target.insert(column.to_string(), Value::String(value.to_string()));
        Ok(())
    }
}
