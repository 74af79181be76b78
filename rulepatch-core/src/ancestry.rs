//! Contextual ancestry labels for diagram models
//!
//! Diagram exports keep layout and semantics apart: a container element
//! (`object`) carries `type`, `label` and `id`, while its first `mxCell`
//! descendant carries the structural `parent`, and for edges the `source` and
//! `target` references. The resolver follows those references upward until it
//! reaches a component and returns that component's label.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use xot::Node as XotNode;

use crate::document::Document;
use crate::labels::normalize_type;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AncestryError {
    #[error("ancestry walk from {element} did not terminate after {hops} hops")]
    CycleDetected { element: String, hops: usize },
}

/// Element and attribute vocabulary of the model format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct AncestryConfig {
    pub container_tag: String,
    pub position_tag: String,
    pub id_attribute: String,
    pub type_attribute: String,
    pub label_attribute: String,
    pub parent_attribute: String,
    pub source_attribute: String,
    pub target_attribute: String,
    pub component_type: String,
    pub boundary_type: String,
    pub owns_type: String,
    pub root_parent_ids: Vec<String>,
}

impl Default for AncestryConfig {
    fn default() -> Self {
        AncestryConfig {
            container_tag: "object".to_string(),
            position_tag: "mxCell".to_string(),
            id_attribute: "id".to_string(),
            type_attribute: "type".to_string(),
            label_attribute: "label".to_string(),
            parent_attribute: "parent".to_string(),
            source_attribute: "source".to_string(),
            target_attribute: "target".to_string(),
            component_type: "cps_component".to_string(),
            boundary_type: "boundary".to_string(),
            owns_type: "owns".to_string(),
            root_parent_ids: vec!["0".to_string(), "1".to_string()],
        }
    }
}

/// Resolves the contextual label of elements in one document.
///
/// Indexes are built once in [`AncestryResolver::new`]; the resolver borrows
/// the document, so it cannot outlive an edit.
pub struct AncestryResolver<'a> {
    document: &'a Document,
    config: &'a AncestryConfig,
    /// Container id to container element (first occurrence wins)
    containers: HashMap<String, XotNode>,
    /// Boundary id to the source id of the first owns edge targeting it
    owners: HashMap<String, Option<String>>,
    max_hops: usize,
}

impl<'a> AncestryResolver<'a> {
    pub fn new(document: &'a Document, config: &'a AncestryConfig) -> Self {
        let owns_type = normalize_type(&config.owns_type);
        let mut containers = HashMap::new();
        let mut owners = HashMap::new();
        let elements = document.elements();

        for &node in &elements {
            if document.element_name(node).as_deref() != Some(config.container_tag.as_str()) {
                continue;
            }
            if let Some(id) = document.attribute(node, &config.id_attribute) {
                containers.entry(id).or_insert(node);
            }

            let node_type = normalize_type(&document.attribute_or_empty(node, &config.type_attribute));
            if node_type != owns_type {
                continue;
            }
            // Any position record of the edge may name the target; the source
            // always comes from the first one.
            let source = document
                .first_descendant_named(node, &config.position_tag)
                .and_then(|cell| document.attribute(cell, &config.source_attribute));
            for cell in document.descendants_named(node, &config.position_tag) {
                if let Some(target) = document.attribute(cell, &config.target_attribute) {
                    owners.entry(target).or_insert_with(|| source.clone());
                }
            }
        }

        tracing::debug!(
            "ancestry index: {} containers, {} owned boundaries",
            containers.len(),
            owners.len()
        );

        AncestryResolver {
            document,
            config,
            containers,
            owners,
            max_hops: elements.len().max(1),
        }
    }

    /// Label of the nearest component above `element`, or "" when the walk
    /// ends without reaching one.
    pub fn resolve_label(&self, element: XotNode) -> Result<String, AncestryError> {
        let doc = self.document;
        let config = self.config;

        let Some(mut current) = self.structural_parent(element) else {
            return Ok(String::new());
        };

        let component = normalize_type(&config.component_type);
        let boundary = normalize_type(&config.boundary_type);
        let mut visited = HashSet::new();
        let mut hops = 0;

        loop {
            if !visited.insert(current) || hops >= self.max_hops {
                return Err(AncestryError::CycleDetected {
                    element: doc.describe(element),
                    hops,
                });
            }
            hops += 1;

            let current_type = normalize_type(&doc.attribute_or_empty(current, &config.type_attribute));
            if current_type == component {
                return Ok(doc.attribute_or_empty(current, &config.label_attribute));
            }
            if current_type != boundary {
                return Ok(String::new());
            }

            let boundary_id = doc.attribute_or_empty(current, &config.id_attribute);
            let next = self
                .owners
                .get(&boundary_id)
                .and_then(|source| source.as_ref())
                .and_then(|source| self.containers.get(source))
                .copied();
            match next {
                Some(node) => {
                    tracing::debug!("boundary {} owned by {}", boundary_id, doc.describe(node));
                    current = node;
                }
                None => return Ok(String::new()),
            }
        }
    }

    /// Container named by the `parent` reference of the first position record
    fn structural_parent(&self, element: XotNode) -> Option<XotNode> {
        let doc = self.document;
        let cell = doc.first_descendant_named(element, &self.config.position_tag)?;
        let parent_id = doc.attribute(cell, &self.config.parent_attribute)?;
        if parent_id.is_empty() || self.config.root_parent_ids.contains(&parent_id) {
            return None;
        }
        self.containers.get(&parent_id).copied()
    }
}
