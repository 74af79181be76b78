//! Rule-driven form compilation

use std::collections::HashSet;

use xot::Node as XotNode;

use super::table::{columns, derived_rows};
use super::{
    field_key, group_key, match_rules, FieldDescriptor, FieldGroup, FieldInput, FormError, NestedField,
    RenderedHint, TableField, NUMBER_INITIAL, NUMBER_MIN, NUMBER_STEP,
};
use crate::ancestry::{AncestryConfig, AncestryResolver};
use crate::document::Document;
use crate::labels::{legend, TypeLabels, UNKNOWN_TYPE};
use crate::rules::{AttributeSpec, Condition, Hint, InputKind, RuleSet};

/// Compiles rules against a document into field groups.
///
/// Compilation is pure: the document is only read.
#[derive(Debug, Clone, Default)]
pub struct FormCompiler {
    pub type_labels: TypeLabels,
    pub ancestry: AncestryConfig,
}

impl FormCompiler {
    pub fn new(type_labels: TypeLabels, ancestry: AncestryConfig) -> Self {
        FormCompiler { type_labels, ancestry }
    }

    pub fn compile(&self, document: &Document, rules: &RuleSet) -> Result<Vec<FieldGroup>, FormError> {
        let matches = match_rules(document, rules)?;
        let resolver = AncestryResolver::new(document, &self.ancestry);
        let mut keys = HashSet::new();
        let mut groups = Vec::new();

        for rule_matches in matches {
            let rule = &rules.rules[rule_matches.rule_index];
            for (element_index, &node) in rule_matches.elements.iter().enumerate() {
                let key = group_key(rule_matches.rule_index, element_index);
                let mut fields = Vec::new();
                for spec in &rule.attributes {
                    if !condition_met(document, node, spec.conditional.as_ref()) {
                        tracing::debug!("{}: `{}` gated off", key, spec.name);
                        continue;
                    }
                    let field = self.render(document, node, spec, &key);
                    claim_keys(&mut keys, &field)?;
                    fields.push(field);
                }
                if fields.is_empty() {
                    continue;
                }

                let raw_type = document
                    .attribute(node, &self.ancestry.type_attribute)
                    .unwrap_or_else(|| UNKNOWN_TYPE.to_string());
                let type_label = self.type_labels.display(&raw_type);
                let element_label = document
                    .attribute(node, &self.ancestry.label_attribute)
                    .filter(|label| !label.is_empty())
                    .unwrap_or_else(|| format!("Element {}", element_index + 1));
                let context_label = resolver.resolve_label(node)?;

                groups.push(FieldGroup {
                    rule_index: rule_matches.rule_index,
                    element_index,
                    legend: legend(&context_label, &type_label, &element_label),
                    key,
                    type_label,
                    element_label,
                    context_label,
                    fields,
                });
            }
        }
        Ok(groups)
    }

    fn render(&self, document: &Document, node: XotNode, spec: &AttributeSpec, parent_key: &str) -> FieldDescriptor {
        let key = field_key(parent_key, &spec.name);
        let current_value = document.attribute(node, &spec.name);
        let existing = current_value.clone().filter(|v| !v.is_empty());

        let (input, initial) = match &spec.kind {
            InputKind::Options { options } => {
                let initial = existing
                    .filter(|v| options.contains(v))
                    .or_else(|| options.first().cloned())
                    .unwrap_or_default();
                (FieldInput::Select { options: options.clone() }, initial)
            }
            InputKind::FreeText => (FieldInput::TextArea, existing.unwrap_or_default()),
            InputKind::Number => (
                FieldInput::Number { min: NUMBER_MIN, step: NUMBER_STEP },
                existing.unwrap_or_else(|| NUMBER_INITIAL.to_string()),
            ),
            InputKind::Text => (FieldInput::Text, existing.unwrap_or_default()),
            InputKind::ParametersTable(table) => {
                let columns = columns(table);
                let source = spec.derive_from.as_ref().and_then(|attr| document.attribute(node, attr));
                let rows = derived_rows(&key, source.as_deref(), &columns);
                let field = TableField { id: key.clone(), columns, rows };
                (FieldInput::Table(field), String::new())
            }
        };

        let nested = spec.additional.as_ref().and_then(|additional| {
            if !condition_met(document, node, additional.attribute.conditional.as_ref()) {
                return None;
            }
            Some(NestedField {
                gate: additional.gate.clone(),
                field: Box::new(self.render(document, node, &additional.attribute, &key)),
            })
        });

        FieldDescriptor {
            hint: spec.hint.as_ref().map(|hint| render_hint(document, node, hint)),
            attribute: spec.name.clone(),
            statement: spec.statement.clone(),
            key,
            current_value,
            initial,
            input,
            nested,
        }
    }
}

/// A spec without a condition is always offered; a missing attribute reads as ""
pub(crate) fn condition_met(document: &Document, node: XotNode, condition: Option<&Condition>) -> bool {
    match condition {
        None => true,
        Some(condition) => document.attribute_or_empty(node, &condition.attribute) == condition.expected,
    }
}

fn render_hint(document: &Document, node: XotNode, hint: &Hint) -> RenderedHint {
    let text = hint
        .source_attributes
        .iter()
        .filter_map(|name| document.attribute(node, name))
        .filter(|value| !value.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    RenderedHint {
        header: hint.header.clone(),
        text,
    }
}

fn claim_keys(keys: &mut HashSet<String>, field: &FieldDescriptor) -> Result<(), FormError> {
    for f in field.chain() {
        if !keys.insert(f.key.clone()) {
            return Err(FormError::FieldKeyCollision(f.key.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODEL: &str = r#"<mxfile><root>
      <object id="10" type="cps_component" label="Engine"><mxCell parent="1"/></object>
      <object id="11" type="comm_thread: MQTT out" label="Publisher" description="Sends data" protocol="http">
        <mxCell parent="10"/>
      </object>
      <object id="12" type="sensor" mode="on" params='[{"a":"1"},{"a":"2"}]'><mxCell parent="1"/></object>
    </root></mxfile>"#;

    fn compile(rules: &str) -> Result<Vec<FieldGroup>, FormError> {
        let doc = Document::parse(MODEL).unwrap();
        let rules = RuleSet::from_json(rules).unwrap();
        FormCompiler::default().compile(&doc, &rules)
    }

    #[test]
    fn test_group_legend_and_fields() {
        let groups = compile(
            r#"{"modifications": [{"xpath": "//object[@id='11']", "attributes": [
                {"name": "protocol", "statement": "Protocol?", "options": ["mqtt", "http"],
                 "hint": {"header": "About", "elements": ["description", "missing", "label"]}},
                {"name": "rate", "statement": "Rate?", "number": true},
                {"name": "notes", "statement": "Notes?", "freeTextArea": true}
            ]}]}"#,
        )
        .unwrap();

        assert_eq!(groups.len(), 1);
        let group = &groups[0];
        assert_eq!(group.key, "modification_0_element_0");
        assert_eq!(group.legend, "Engine > message sender: Publisher");

        let protocol = &group.fields[0];
        assert_eq!(protocol.key, "modification_0_element_0_protocol");
        assert_eq!(protocol.initial, "http");
        assert_eq!(protocol.current_value.as_deref(), Some("http"));
        assert_eq!(protocol.hint.as_ref().unwrap().text, "Sends data\nPublisher");

        let rate = &group.fields[1];
        assert_eq!(rate.input, FieldInput::Number { min: 0, step: 10 });
        assert_eq!(rate.initial, "200");
        assert_eq!(group.fields[2].input, FieldInput::TextArea);
    }

    #[test]
    fn test_unmatched_rule_produces_no_group() {
        let groups = compile(
            r#"{"modifications": [{"xpath": "//object[@type='actuator']", "attributes": [
                {"name": "x", "statement": "X?"}
            ]}]}"#,
        )
        .unwrap();
        assert!(groups.is_empty());
    }

    #[test]
    fn test_conditional_gates_fields_and_groups() {
        let groups = compile(
            r#"{"modifications": [{"xpath": "//object[@type]", "attributes": [
                {"name": "threshold", "statement": "T?", "conditional": {"mode": "on"}}
            ]}]}"#,
        )
        .unwrap();
        // Only the sensor has mode="on"; the other groups are empty and dropped
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].element_index, 2);
        assert_eq!(groups[0].legend, "sensor: Element 3");
    }

    #[test]
    fn test_table_prefilled_from_derived_attribute() {
        let groups = compile(
            r#"{"modifications": [{"xpath": "//object[@id='12']", "attributes": [
                {"name": "params", "statement": "P", "derivate_from": "params",
                 "parametersTable": {"headers": ["a"]}}
            ]}]}"#,
        )
        .unwrap();
        let FieldInput::Table(table) = &groups[0].fields[0].input else {
            panic!("expected table");
        };
        assert_eq!(table.id, "modification_0_element_0_params");
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0]["a"], "1");
        assert_eq!(table.rows[1]["a"], "2");
    }

    #[test]
    fn test_nested_field_keys() {
        let groups = compile(
            r#"{"modifications": [{"xpath": "//object[@id='12']", "attributes": [
                {"name": "wireless", "statement": "W?", "options": ["no", "yes"],
                 "additionalAttribute": {"conditional": "yes",
                    "attribute": {"name": "band", "statement": "B?", "number": true}}}
            ]}]}"#,
        )
        .unwrap();
        let field = &groups[0].fields[0];
        let nested = field.nested.as_ref().unwrap();
        assert_eq!(nested.gate, "yes");
        assert_eq!(nested.field.key, "modification_0_element_0_wireless_band");
        assert_eq!(field.chain().len(), 2);
    }

    #[test]
    fn test_field_key_collision() {
        let result = compile(
            r#"{"modifications": [{"xpath": "//object[@id='12']", "attributes": [
                {"name": "a", "statement": "A", "additionalAttribute": {"conditional": "y",
                    "attribute": {"name": "b", "statement": "B"}}},
                {"name": "a_b", "statement": "AB"}
            ]}]}"#,
        );
        assert!(matches!(result, Err(FormError::FieldKeyCollision(key)) if key == "modification_0_element_0_a_b"));
    }

    #[test]
    fn test_unknown_type_label() {
        let doc = Document::parse(r#"<root><item label="Thing"/></root>"#).unwrap();
        let rules = RuleSet::from_json(r#"{"modifications": [{"xpath": "//item", "attributes": [{"name": "x", "statement": "X"}]}]}"#).unwrap();
        let groups = FormCompiler::default().compile(&doc, &rules).unwrap();
        assert_eq!(groups[0].legend, "unknown type: Thing");
    }
}
