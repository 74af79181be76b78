//! Writing submitted answers back onto the document
//!
//! The binder walks rules and matched elements exactly like the form
//! compiler, so a field key names the same (element, attribute) pair on both
//! sides. All writes are planned against the unmodified document and only
//! committed once planning has succeeded.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use xot::Node as XotNode;

use crate::document::Document;
use crate::form::table::cell_text;
use crate::form::{field_key, group_key, match_rules, FormError, TableRow};
use crate::rules::{AttributeSpec, RuleSet};

/// A submitted answer: text, or the rows of a table
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SubmittedValue {
    Text(String),
    Rows(Vec<TableRow>),
}

#[derive(Error, Debug)]
pub enum SubmissionError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("answers must be a JSON object of field keys")]
    NotAnObject,
    #[error("field `{key}`: {message}")]
    InvalidValue { key: String, message: String },
}

/// Field key to submitted value
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Submission(BTreeMap<String, SubmittedValue>);

impl Submission {
    pub fn new() -> Self {
        Submission::default()
    }

    pub fn insert(&mut self, key: &str, value: SubmittedValue) {
        self.0.insert(key.to_string(), value);
    }

    pub fn text(mut self, key: &str, value: &str) -> Self {
        self.insert(key, SubmittedValue::Text(value.to_string()));
        self
    }

    pub fn rows(mut self, key: &str, rows: Vec<TableRow>) -> Self {
        self.insert(key, SubmittedValue::Rows(rows));
        self
    }

    pub fn get(&self, key: &str) -> Option<&SubmittedValue> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Parse an answers file.
    ///
    /// Strings are taken as is, numbers and booleans are stringified, arrays
    /// must hold row objects and `null` entries are ignored.
    pub fn from_json(text: &str) -> Result<Self, SubmissionError> {
        let Value::Object(entries) = serde_json::from_str::<Value>(text)? else {
            return Err(SubmissionError::NotAnObject);
        };
        let mut submission = Submission::new();
        for (key, value) in entries {
            let value = match value {
                Value::Null => continue,
                Value::String(s) => SubmittedValue::Text(s),
                Value::Bool(b) => SubmittedValue::Text(b.to_string()),
                Value::Number(n) => SubmittedValue::Text(n.to_string()),
                Value::Array(items) => {
                    let mut rows = Vec::with_capacity(items.len());
                    for (index, item) in items.into_iter().enumerate() {
                        let Value::Object(object) = item else {
                            return Err(SubmissionError::InvalidValue {
                                key,
                                message: format!("row {} is not an object", index),
                            });
                        };
                        rows.push(
                            object
                                .into_iter()
                                .map(|(column, cell)| {
                                    let text = cell_text(&cell);
                                    (column, Value::String(text))
                                })
                                .collect(),
                        );
                    }
                    SubmittedValue::Rows(rows)
                }
                Value::Object(_) => {
                    return Err(SubmissionError::InvalidValue {
                        key,
                        message: "expected a string or an array of rows".to_string(),
                    })
                }
            };
            submission.0.insert(key, value);
        }
        Ok(submission)
    }
}

/// One committed attribute change
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttributeWrite {
    pub element: String,
    pub attribute: String,
    pub value: String,
}

/// What a call to [`apply`] did
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ApplyReport {
    pub elements_matched: usize,
    pub writes: Vec<AttributeWrite>,
    /// Planned writes that matched the value already present
    pub unchanged: usize,
    /// Submission keys no field consumed
    pub unused_keys: Vec<String>,
}

impl ApplyReport {
    pub fn is_noop(&self) -> bool {
        self.writes.is_empty()
    }
}

struct PlannedWrite {
    node: XotNode,
    attribute: String,
    value: String,
}

/// Apply `submission` to `document` according to `rules`.
///
/// Missing or empty answers leave attributes untouched and nothing is ever
/// removed. On error the document is unchanged.
pub fn apply(document: &mut Document, rules: &RuleSet, submission: &Submission) -> Result<ApplyReport, FormError> {
    let mut planner = Planner {
        document: &*document,
        submission,
        writes: Vec::new(),
        keys: HashSet::new(),
        consumed: HashSet::new(),
    };
    let mut report = ApplyReport::default();

    for rule_matches in match_rules(planner.document, rules)? {
        let rule = &rules.rules[rule_matches.rule_index];
        report.elements_matched += rule_matches.elements.len();
        for (element_index, &node) in rule_matches.elements.iter().enumerate() {
            let key = group_key(rule_matches.rule_index, element_index);
            for spec in &rule.attributes {
                planner.plan(node, spec, &key)?;
            }
        }
    }

    let Planner { writes, consumed, .. } = planner;
    report.unused_keys = submission
        .keys()
        .filter(|key| !consumed.contains(*key))
        .map(str::to_string)
        .collect();
    for key in &report.unused_keys {
        tracing::warn!("answer `{}` does not match any field", key);
    }

    for write in writes {
        if document.attribute(write.node, &write.attribute).as_deref() == Some(write.value.as_str()) {
            report.unchanged += 1;
            continue;
        }
        tracing::debug!("{}: {} = {:?}", document.describe(write.node), write.attribute, write.value);
        document.set_attribute(write.node, &write.attribute, &write.value);
        report.writes.push(AttributeWrite {
            element: document.describe(write.node),
            attribute: write.attribute,
            value: write.value,
        });
    }
    Ok(report)
}

struct Planner<'a> {
    document: &'a Document,
    submission: &'a Submission,
    writes: Vec<PlannedWrite>,
    keys: HashSet<String>,
    consumed: HashSet<String>,
}

impl Planner<'_> {
    fn plan(&mut self, node: XotNode, spec: &AttributeSpec, parent_key: &str) -> Result<(), FormError> {
        if let Some(condition) = &spec.conditional {
            if self.document.attribute_or_empty(node, &condition.attribute) != condition.expected {
                return Ok(());
            }
        }

        let key = field_key(parent_key, &spec.name);
        if !self.keys.insert(key.clone()) {
            return Err(FormError::FieldKeyCollision(key));
        }
        let submitted = self.submission.get(&key);
        if submitted.is_some() {
            self.consumed.insert(key.clone());
        }

        if spec.is_table() {
            match submitted {
                Some(SubmittedValue::Rows(rows)) => {
                    let value = serde_json::to_string(rows).map_err(|e| FormError::InvalidRows {
                        key: key.clone(),
                        message: e.to_string(),
                    })?;
                    self.push(node, &spec.name, value);
                }
                Some(SubmittedValue::Text(_)) => {
                    tracing::warn!("answer `{}` is text but the field is a table, ignoring", key);
                }
                None => {}
            }
            return Ok(());
        }

        let text = match submitted {
            Some(SubmittedValue::Text(text)) => Some(text.as_str()),
            Some(SubmittedValue::Rows(_)) => {
                tracing::warn!("answer `{}` is a table but the field is not, ignoring", key);
                None
            }
            None => None,
        };
        if let Some(text) = text.filter(|t| !t.is_empty()) {
            self.push(node, &spec.name, text.to_string());
        }

        if let Some(additional) = &spec.additional {
            // An empty answer never opens a nested field, even for an empty gate
            if text.is_some_and(|t| !t.is_empty() && t == additional.gate) {
                self.plan(node, &additional.attribute, &key)?;
            }
        }
        Ok(())
    }

    fn push(&mut self, node: XotNode, attribute: &str, value: String) {
        self.writes.push(PlannedWrite {
            node,
            attribute: attribute.to_string(),
            value,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Rule;
    use serde_json::json;

    const RULES: &str = r#"{"modifications": [{"xpath": "//item", "attributes": [
        {"name": "main", "statement": "M?", "options": ["no", "yes"],
         "additionalAttribute": {"conditional": "yes", "attribute": {"name": "extra", "statement": "E?"}}},
        {"name": "params", "statement": "P", "parametersTable": {"headers": ["a"]}},
        {"name": "gated", "statement": "G?", "conditional": {"mode": "on"}}
    ]}]}"#;

    fn setup(xml: &str) -> (Document, RuleSet) {
        (Document::parse(xml).unwrap(), RuleSet::from_json(RULES).unwrap())
    }

    #[test]
    fn test_nested_written_when_gate_matches() {
        let (mut doc, rules) = setup("<root><item/></root>");
        let submission = Submission::new()
            .text("modification_0_element_0_main", "yes")
            .text("modification_0_element_0_main_extra", "5");
        let report = apply(&mut doc, &rules, &submission).unwrap();
        assert_eq!(report.writes.len(), 2);
        let item = doc.first_descendant_named(doc.root_element().unwrap(), "item").unwrap();
        assert_eq!(doc.attribute(item, "main").as_deref(), Some("yes"));
        assert_eq!(doc.attribute(item, "extra").as_deref(), Some("5"));
    }

    #[test]
    fn test_nested_skipped_when_gate_differs() {
        let (mut doc, rules) = setup(r#"<root><item extra="old"/></root>"#);
        let submission = Submission::new()
            .text("modification_0_element_0_main", "no")
            .text("modification_0_element_0_main_extra", "5");
        let report = apply(&mut doc, &rules, &submission).unwrap();
        let item = doc.first_descendant_named(doc.root_element().unwrap(), "item").unwrap();
        assert_eq!(doc.attribute(item, "main").as_deref(), Some("no"));
        assert_eq!(doc.attribute(item, "extra").as_deref(), Some("old"));
        assert_eq!(report.unused_keys, vec!["modification_0_element_0_main_extra"]);
    }

    #[test]
    fn test_empty_answer_never_opens_empty_gate() {
        let mut doc = Document::parse("<root><item/></root>").unwrap();
        let rules = RuleSet {
            rules: vec![Rule {
                path_expression: "//item".to_string(),
                attributes: vec![AttributeSpec::text("main", "M?")
                    .with_additional("", AttributeSpec::text("extra", "E?"))],
            }],
        };
        let submission = Submission::new()
            .text("modification_0_element_0_main", "")
            .text("modification_0_element_0_main_extra", "leak");
        let report = apply(&mut doc, &rules, &submission).unwrap();
        assert!(report.writes.is_empty());
        assert_eq!(report.unused_keys, vec!["modification_0_element_0_main_extra"]);
        let item = doc.first_descendant_named(doc.root_element().unwrap(), "item").unwrap();
        assert_eq!(doc.attribute(item, "extra"), None);
    }

    #[test]
    fn test_table_rows_serialized() {
        let (mut doc, rules) = setup("<root><item/><item/></root>");
        let row = |v: &str| json!({"a": v}).as_object().cloned().unwrap();
        let submission = Submission::new()
            .rows("modification_0_element_0_params", vec![row("1"), row("2")])
            .rows("modification_0_element_1_params", vec![]);
        apply(&mut doc, &rules, &submission).unwrap();
        let items = doc.descendants_named(doc.root_element().unwrap(), "item");
        assert_eq!(doc.attribute(items[0], "params").as_deref(), Some(r#"[{"a":"1"},{"a":"2"}]"#));
        assert_eq!(doc.attribute(items[1], "params").as_deref(), Some("[]"));
    }

    #[test]
    fn test_empty_and_missing_values_leave_document_alone() {
        let (mut doc, rules) = setup(r#"<root><item main="yes"/></root>"#);
        let before = doc.to_xml_string().unwrap();
        let submission = Submission::new().text("modification_0_element_0_main", "");
        let report = apply(&mut doc, &rules, &submission).unwrap();
        assert!(report.is_noop());
        assert_eq!(doc.to_xml_string().unwrap(), before);
    }

    #[test]
    fn test_conditional_read_from_pre_state() {
        let (mut doc, rules) = setup(r#"<root><item mode="off"/></root>"#);
        let submission = Submission::new().text("modification_0_element_0_gated", "x");
        apply(&mut doc, &rules, &submission).unwrap();
        let item = doc.first_descendant_named(doc.root_element().unwrap(), "item").unwrap();
        assert_eq!(doc.attribute(item, "gated"), None);
    }

    #[test]
    fn test_unmatched_rules_and_empty_rules_are_noops() {
        let mut doc = Document::parse("<root><other/></root>").unwrap();
        let before = doc.to_xml_string().unwrap();
        let rules = RuleSet::from_json(RULES).unwrap();
        let submission = Submission::new().text("modification_0_element_0_main", "yes");
        let report = apply(&mut doc, &rules, &submission).unwrap();
        assert_eq!(report.elements_matched, 0);
        assert!(report.is_noop());
        assert!(apply(&mut doc, &RuleSet::default(), &submission).unwrap().is_noop());
        assert_eq!(doc.to_xml_string().unwrap(), before);
    }

    #[test]
    fn test_invalid_expression_commits_nothing() {
        let mut doc = Document::parse("<root><item/></root>").unwrap();
        let before = doc.to_xml_string().unwrap();
        let rules = RuleSet::from_json(
            r#"{"modifications": [
                {"xpath": "//item", "attributes": [{"name": "a", "statement": "A"}]},
                {"xpath": "//item[", "attributes": [{"name": "b", "statement": "B"}]}
            ]}"#,
        )
        .unwrap();
        let submission = Submission::new().text("modification_0_element_0_a", "1");
        assert!(matches!(
            apply(&mut doc, &rules, &submission),
            Err(FormError::InvalidPathExpression { rule_index: 1, .. })
        ));
        assert_eq!(doc.to_xml_string().unwrap(), before);
    }

    #[test]
    fn test_submission_from_json() {
        let submission = Submission::from_json(
            r#"{"a": "x", "b": 5, "c": true, "d": null, "e": [{"n": 1, "m": "two"}]}"#,
        )
        .unwrap();
        assert_eq!(submission.len(), 4);
        assert_eq!(submission.get("b"), Some(&SubmittedValue::Text("5".into())));
        assert_eq!(submission.get("c"), Some(&SubmittedValue::Text("true".into())));
        let Some(SubmittedValue::Rows(rows)) = submission.get("e") else {
            panic!("expected rows");
        };
        assert_eq!(rows[0]["n"], "1");

        assert!(matches!(Submission::from_json("[]"), Err(SubmissionError::NotAnObject)));
        assert!(matches!(
            Submission::from_json(r#"{"e": [1]}"#),
            Err(SubmissionError::InvalidValue { .. })
        ));
    }
}
