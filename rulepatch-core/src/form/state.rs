//! Live answers for a compiled form

use std::collections::HashMap;

use super::{FieldDescriptor, FieldGroup, FieldInput, FormError, TableDraft};
use crate::binder::{Submission, SubmittedValue};

/// Answers held against a set of field groups.
///
/// Nested fields are visible exactly while every enclosing field's value
/// equals the corresponding gate.
#[derive(Debug, Clone)]
pub struct FormState {
    groups: Vec<FieldGroup>,
    values: HashMap<String, String>,
    tables: HashMap<String, TableDraft>,
    /// Nested field key to (enclosing field key, gate value)
    gates: HashMap<String, (String, String)>,
}

impl FormState {
    pub fn new(groups: Vec<FieldGroup>) -> Self {
        let mut values = HashMap::new();
        let mut tables = HashMap::new();
        let mut gates = HashMap::new();

        for group in &groups {
            for field in &group.fields {
                let mut parent: Option<&FieldDescriptor> = None;
                for f in field.chain() {
                    match &f.input {
                        FieldInput::Table(table) => {
                            tables.insert(f.key.clone(), TableDraft::new(table));
                        }
                        _ => {
                            values.insert(f.key.clone(), f.initial.clone());
                        }
                    }
                    if let Some(p) = parent {
                        if let Some(nested) = &p.nested {
                            gates.insert(f.key.clone(), (p.key.clone(), nested.gate.clone()));
                        }
                    }
                    parent = Some(f);
                }
            }
        }

        FormState {
            groups,
            values,
            tables,
            gates,
        }
    }

    pub fn groups(&self) -> &[FieldGroup] {
        &self.groups
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Current text value of a field
    pub fn value(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn set_value(&mut self, key: &str, value: &str) -> Result<(), FormError> {
        if self.tables.contains_key(key) {
            return Err(FormError::NotATextField(key.to_string()));
        }
        match self.values.get_mut(key) {
            Some(slot) => {
                *slot = value.to_string();
                Ok(())
            }
            None => Err(FormError::UnknownField(key.to_string())),
        }
    }

    pub fn table(&self, id: &str) -> Result<&TableDraft, FormError> {
        self.tables.get(id).ok_or_else(|| self.missing_table(id))
    }

    pub fn table_mut(&mut self, id: &str) -> Result<&mut TableDraft, FormError> {
        if !self.tables.contains_key(id) {
            return Err(self.missing_table(id));
        }
        self.tables
            .get_mut(id)
            .ok_or_else(|| FormError::UnknownField(id.to_string()))
    }

    fn missing_table(&self, id: &str) -> FormError {
        if self.values.contains_key(id) {
            FormError::NotATableField(id.to_string())
        } else {
            FormError::UnknownField(id.to_string())
        }
    }

    pub fn is_visible(&self, key: &str) -> Result<bool, FormError> {
        if !self.values.contains_key(key) && !self.tables.contains_key(key) {
            return Err(FormError::UnknownField(key.to_string()));
        }
        let mut current = key;
        while let Some((parent, gate)) = self.gates.get(current) {
            match self.values.get(parent) {
                Some(value) if !value.is_empty() && value == gate => {}
                _ => return Ok(false),
            }
            current = parent;
        }
        Ok(true)
    }

    /// Fields currently shown, in form order
    pub fn visible_fields(&self) -> Vec<&FieldDescriptor> {
        let mut visible = Vec::new();
        for group in &self.groups {
            for field in &group.fields {
                for f in field.chain() {
                    if !self.is_visible(&f.key).unwrap_or(false) {
                        break;
                    }
                    visible.push(f);
                }
            }
        }
        visible
    }

    /// Flat submission of every visible field
    pub fn submission(&self) -> Submission {
        let mut submission = Submission::new();
        for field in self.visible_fields() {
            if let Some(draft) = self.tables.get(&field.key) {
                submission.insert(&field.key, SubmittedValue::Rows(draft.rows().to_vec()));
            } else if let Some(value) = self.values.get(&field.key) {
                submission.insert(&field.key, SubmittedValue::Text(value.clone()));
            }
        }
        submission
    }
}
