//! Modification rule files
//!
//! A rule file is a JSON object whose `modifications` array lists the rules:
//!
//! ```json
//! {
//!   "modifications": [
//!     {
//!       "xpath": "//object[@type='sensor']",
//!       "attributes": [
//!         { "name": "unit", "statement": "Measurement unit?", "options": ["C", "F"] },
//!         {
//!           "name": "wireless", "statement": "Wireless link?", "options": ["no", "yes"],
//!           "additionalAttribute": {
//!             "conditional": "yes",
//!             "attribute": { "name": "band", "statement": "Band (MHz)?", "number": true }
//!           }
//!         }
//!       ]
//!     }
//!   ]
//! }
//! ```
//!
//! The wire shape is parsed into `Raw*` structs and then normalized into the
//! public types, where every attribute carries exactly one [`InputKind`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use thiserror::Error;

/// Errors raised while loading a rule file
#[derive(Error, Debug)]
pub enum RuleError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("rule file must be a JSON object")]
    NotAnObject,
    #[error("rule {rule}: attribute `{name}` is declared more than once")]
    DuplicateAttribute { rule: usize, name: String },
    #[error("rule {rule}: attribute name must not be empty")]
    EmptyName { rule: usize },
    #[error("rule {rule}: attribute `{name}` has a conditional with {entries} entries, expected exactly one")]
    InvalidConditional { rule: usize, name: String, entries: usize },
}

/// Parsed rule file: the ordered list of rules
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RuleSet {
    pub rules: Vec<Rule>,
}

/// A path expression plus the attributes it lets the user edit on each match
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rule {
    pub path_expression: String,
    pub attributes: Vec<AttributeSpec>,
}

/// One editable attribute
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttributeSpec {
    /// Output attribute name
    pub name: String,
    /// Question shown to the user
    pub statement: String,
    pub kind: InputKind,
    pub hint: Option<Hint>,
    /// Gate on a sibling attribute already present on the element
    pub conditional: Option<Condition>,
    /// Nested attribute offered when the answer equals its gate value
    pub additional: Option<Box<AdditionalAttribute>>,
    /// Attribute holding a JSON array of rows to pre-fill a table
    pub derive_from: Option<String>,
}

/// The input widget an attribute is answered with
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InputKind {
    Options { options: Vec<String> },
    FreeText,
    Number,
    ParametersTable(ParametersTableSpec),
    Text,
}

/// Column layout and defaults of a parameters table
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParametersTableSpec {
    pub headers: Vec<String>,
    pub dropdown_values: BTreeMap<String, Vec<String>>,
    pub sequence_values: BTreeMap<String, i64>,
}

impl ParametersTableSpec {
    /// Dropdown options for a column, if any
    pub fn dropdown_for(&self, header: &str) -> Option<&[String]> {
        self.dropdown_values.get(header).map(Vec::as_slice)
    }

    /// Sequence seed for a column. Keys match headers case-insensitively.
    pub fn sequence_seed(&self, header: &str) -> Option<i64> {
        let wanted = header.to_lowercase();
        self.sequence_values
            .iter()
            .find(|(key, _)| key.to_lowercase() == wanted)
            .map(|(_, &seed)| seed)
    }
}

/// Read-only context built from the element's current attributes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hint {
    pub header: String,
    pub source_attributes: Vec<String>,
}

/// `attribute == expected` on the element's pre-submission state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Condition {
    pub attribute: String,
    pub expected: String,
}

/// Nested attribute gated on the parent's answer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdditionalAttribute {
    pub gate: String,
    pub attribute: AttributeSpec,
}

/// Result of loading a rule file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RulesStatus {
    /// Rules were found; carries how many
    Loaded(usize),
    /// The file has no (or an empty) `modifications` list
    NoRules,
}

impl RuleSet {
    /// Parse a rule file from JSON text
    pub fn from_json(text: &str) -> Result<Self, RuleError> {
        let value: Value = serde_json::from_str(text)?;
        if !value.is_object() {
            return Err(RuleError::NotAnObject);
        }
        let raw: RawRuleFile = serde_json::from_value(value)?;
        let rules = raw
            .modifications
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(index, rule)| rule.normalize(index))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(RuleSet { rules })
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn status(&self) -> RulesStatus {
        if self.rules.is_empty() {
            RulesStatus::NoRules
        } else {
            RulesStatus::Loaded(self.rules.len())
        }
    }
}

impl AttributeSpec {
    /// Plain text attribute with no extras
    pub fn text(name: &str, statement: &str) -> Self {
        AttributeSpec {
            name: name.to_string(),
            statement: statement.to_string(),
            kind: InputKind::Text,
            hint: None,
            conditional: None,
            additional: None,
            derive_from: None,
        }
    }

    pub fn with_kind(mut self, kind: InputKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_conditional(mut self, attribute: &str, expected: &str) -> Self {
        self.conditional = Some(Condition {
            attribute: attribute.to_string(),
            expected: expected.to_string(),
        });
        self
    }

    pub fn with_additional(mut self, gate: &str, attribute: AttributeSpec) -> Self {
        self.additional = Some(Box::new(AdditionalAttribute {
            gate: gate.to_string(),
            attribute,
        }));
        self
    }

    pub fn is_table(&self) -> bool {
        matches!(self.kind, InputKind::ParametersTable(_))
    }
}

// =============================================================================
// WIRE FORMAT
// =============================================================================

#[derive(Deserialize)]
struct RawRuleFile {
    #[serde(default)]
    modifications: Option<Vec<RawRule>>,
}

#[derive(Deserialize)]
struct RawRule {
    #[serde(alias = "pathExpression")]
    xpath: String,
    #[serde(default)]
    attributes: Vec<RawAttributeSpec>,
}

#[derive(Deserialize)]
struct RawAttributeSpec {
    name: String,
    #[serde(default)]
    statement: String,
    #[serde(default)]
    options: Option<Vec<String>>,
    #[serde(default, rename = "freeTextArea", alias = "freeText")]
    free_text: bool,
    #[serde(default)]
    number: bool,
    #[serde(default, rename = "parametersTable")]
    parameters_table: Option<RawTable>,
    #[serde(default)]
    hint: Option<RawHint>,
    #[serde(default)]
    conditional: Option<RawConditional>,
    #[serde(default, rename = "additionalAttribute")]
    additional_attribute: Option<Box<RawAdditional>>,
    #[serde(default, rename = "derivate_from", alias = "derivateFrom")]
    derivate_from: Option<String>,
}

#[derive(Deserialize)]
struct RawTable {
    #[serde(default)]
    headers: Vec<String>,
    #[serde(default, rename = "dropdown_box_values", alias = "dropdownValues")]
    dropdown_values: BTreeMap<String, Vec<String>>,
    #[serde(default, rename = "sequence_values", alias = "sequenceValues")]
    sequence_values: BTreeMap<String, i64>,
}

#[derive(Deserialize)]
struct RawHint {
    #[serde(default)]
    header: String,
    #[serde(default, alias = "sourceAttributeNames")]
    elements: Vec<String>,
}

/// `{"attributeName": .., "expectedValue": ..}` or the `{"<attr>": "<value>"}` shorthand
#[derive(Deserialize)]
#[serde(untagged)]
enum RawConditional {
    Explicit {
        #[serde(rename = "attributeName")]
        attribute_name: String,
        #[serde(rename = "expectedValue")]
        expected_value: String,
    },
    Shorthand(HashMap<String, String>),
}

#[derive(Deserialize)]
struct RawAdditional {
    conditional: String,
    attribute: RawAttributeSpec,
}

impl RawRule {
    fn normalize(self, index: usize) -> Result<Rule, RuleError> {
        let mut seen = HashSet::new();
        let mut attributes = Vec::with_capacity(self.attributes.len());
        for raw in self.attributes {
            if !seen.insert(raw.name.clone()) {
                return Err(RuleError::DuplicateAttribute {
                    rule: index,
                    name: raw.name,
                });
            }
            attributes.push(raw.normalize(index)?);
        }
        Ok(Rule {
            path_expression: self.xpath,
            attributes,
        })
    }
}

impl RawAttributeSpec {
    fn normalize(self, rule: usize) -> Result<AttributeSpec, RuleError> {
        if self.name.is_empty() {
            return Err(RuleError::EmptyName { rule });
        }

        let declared = [
            self.options.is_some(),
            self.parameters_table.is_some(),
            self.free_text,
            self.number,
        ]
        .iter()
        .filter(|&&set| set)
        .count();
        if declared > 1 {
            tracing::warn!(
                "rule {}: attribute `{}` declares {} input kinds; using the first of options, parametersTable, freeTextArea, number",
                rule,
                self.name,
                declared
            );
        }

        let kind = if let Some(options) = self.options {
            InputKind::Options { options }
        } else if let Some(table) = self.parameters_table {
            InputKind::ParametersTable(ParametersTableSpec {
                headers: table.headers,
                dropdown_values: table.dropdown_values,
                sequence_values: table.sequence_values,
            })
        } else if self.free_text {
            InputKind::FreeText
        } else if self.number {
            InputKind::Number
        } else {
            InputKind::Text
        };

        let conditional = match self.conditional {
            None => None,
            Some(RawConditional::Explicit {
                attribute_name,
                expected_value,
            }) => Some(Condition {
                attribute: attribute_name,
                expected: expected_value,
            }),
            Some(RawConditional::Shorthand(map)) => {
                if map.len() != 1 {
                    return Err(RuleError::InvalidConditional {
                        rule,
                        name: self.name,
                        entries: map.len(),
                    });
                }
                map.into_iter().next().map(|(attribute, expected)| Condition { attribute, expected })
            }
        };

        let additional = match self.additional_attribute {
            Some(raw) => Some(Box::new(AdditionalAttribute {
                gate: raw.conditional,
                attribute: raw.attribute.normalize(rule)?,
            })),
            None => None,
        };

        Ok(AttributeSpec {
            name: self.name,
            statement: self.statement,
            kind,
            hint: self.hint.map(|hint| Hint {
                header: hint.header,
                source_attributes: hint.elements,
            }),
            conditional,
            additional,
            derive_from: self.derivate_from,
        })
    }
}
