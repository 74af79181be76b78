//! Questionnaire forms compiled from rules
//!
//! [`FormCompiler`] turns a document plus a [`RuleSet`] into [`FieldGroup`]s,
//! one per matched element. [`FormState`] holds the user's answers against
//! those groups and produces the flat [`Submission`](crate::Submission) the
//! binder consumes.

mod compiler;
mod state;
pub(crate) mod table;

pub use compiler::FormCompiler;
pub use state::FormState;
pub use table::TableDraft;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use xot::Node as XotNode;

use crate::ancestry::AncestryError;
use crate::document::Document;
use crate::rules::RuleSet;
use crate::xpath::{DocumentSnapshot, XPathError};

/// Minimum, step and starting value of number inputs
pub const NUMBER_MIN: i64 = 0;
pub const NUMBER_STEP: i64 = 10;
pub const NUMBER_INITIAL: &str = "200";

/// One table row: column name to cell text, in column order
pub type TableRow = serde_json::Map<String, Value>;

#[derive(Error, Debug)]
pub enum FormError {
    #[error("rule {rule_index}: invalid path expression `{expression}`: {source}")]
    InvalidPathExpression {
        rule_index: usize,
        expression: String,
        #[source]
        source: XPathError,
    },
    #[error("could not query document: {0}")]
    Query(#[source] XPathError),
    #[error("field key `{0}` is produced by more than one attribute")]
    FieldKeyCollision(String),
    #[error(transparent)]
    Ancestry(#[from] AncestryError),
    #[error("unknown field `{0}`")]
    UnknownField(String),
    #[error("field `{0}` is not a table")]
    NotATableField(String),
    #[error("field `{0}` is a table; edit its rows instead")]
    NotATextField(String),
    #[error("table `{table}` has no row {row}")]
    RowOutOfRange { table: String, row: usize },
    #[error("table `{table}` has no column `{column}`")]
    UnknownColumn { table: String, column: String },
    #[error("field `{key}`: cannot encode rows: {message}")]
    InvalidRows { key: String, message: String },
}

/// All fields offered for one matched element
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldGroup {
    pub rule_index: usize,
    pub element_index: usize,
    /// Key prefix shared by every field of the group
    pub key: String,
    pub legend: String,
    pub type_label: String,
    pub element_label: String,
    pub context_label: String,
    pub fields: Vec<FieldDescriptor>,
}

/// One rendered question
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDescriptor {
    pub key: String,
    pub attribute: String,
    pub statement: String,
    pub hint: Option<RenderedHint>,
    /// The element's value for this attribute when the form was compiled
    pub current_value: Option<String>,
    /// Value the form starts with (empty for tables)
    pub initial: String,
    pub input: FieldInput,
    pub nested: Option<NestedField>,
}

/// Field shown only while the enclosing field's value equals `gate`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NestedField {
    pub gate: String,
    pub field: Box<FieldDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedHint {
    pub header: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldInput {
    Select { options: Vec<String> },
    TextArea,
    Number { min: i64, step: i64 },
    Text,
    Table(TableField),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableField {
    /// Same as the field key
    pub id: String,
    pub columns: Vec<TableColumn>,
    pub rows: Vec<TableRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableColumn {
    pub name: String,
    pub title: String,
    pub dropdown: Option<Vec<String>>,
    pub sequence_seed: Option<i64>,
}

impl FieldDescriptor {
    /// This field followed by its nested fields, outermost first
    pub fn chain(&self) -> Vec<&FieldDescriptor> {
        let mut fields = vec![self];
        let mut current = self;
        while let Some(nested) = &current.nested {
            current = &nested.field;
            fields.push(current);
        }
        fields
    }
}

/// Key prefix of the group for element `element_index` of rule `rule_index`
pub fn group_key(rule_index: usize, element_index: usize) -> String {
    format!("modification_{}_element_{}", rule_index, element_index)
}

/// Key of a field directly below a group or enclosing field
pub fn field_key(parent: &str, attribute: &str) -> String {
    format!("{}_{}", parent, attribute)
}

/// Elements matched by one rule, resolved on the live document
pub(crate) struct RuleMatches {
    pub rule_index: usize,
    pub elements: Vec<XotNode>,
}

/// Evaluate every rule against one snapshot of the document.
///
/// Compiler and binder share this traversal so their field keys line up.
pub(crate) fn match_rules(document: &Document, rules: &RuleSet) -> Result<Vec<RuleMatches>, FormError> {
    if rules.is_empty() {
        return Ok(Vec::new());
    }
    let mut snapshot = DocumentSnapshot::capture(document).map_err(FormError::Query)?;
    rules
        .rules
        .iter()
        .enumerate()
        .map(|(rule_index, rule)| {
            let elements = snapshot
                .select(document, &rule.path_expression)
                .map_err(|source| match source {
                    XPathError::Compile(_) | XPathError::Execute(_) => FormError::InvalidPathExpression {
                        rule_index,
                        expression: rule.path_expression.clone(),
                        source,
                    },
                    XPathError::XmlLoad(_) => FormError::Query(source),
                })?;
            tracing::debug!(
                "rule {} `{}` matched {} element(s)",
                rule_index,
                rule.path_expression,
                elements.len()
            );
            Ok(RuleMatches { rule_index, elements })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys() {
        let group = group_key(0, 2);
        assert_eq!(group, "modification_0_element_2");
        let field = field_key(&group, "unit");
        assert_eq!(field, "modification_0_element_2_unit");
        assert_eq!(field_key(&field, "scale"), "modification_0_element_2_unit_scale");
    }

    #[test]
    fn test_invalid_rule_expression_names_rule() {
        let doc = Document::parse("<root/>").unwrap();
        let rules = RuleSet::from_json(
            r#"{"modifications": [{"xpath": "//root", "attributes": []}, {"xpath": "//[", "attributes": []}]}"#,
        )
        .unwrap();
        match match_rules(&doc, &rules) {
            Err(FormError::InvalidPathExpression { rule_index, expression, .. }) => {
                assert_eq!(rule_index, 1);
                assert_eq!(expression, "//[");
            }
            other => panic!("expected invalid path, got {:?}", other.map(|m| m.len())),
        }
    }
}
