//! Mutable XML document backed by xot
//!
//! The document owns its `Xot` arena and the document node. Elements are
//! addressed by plain `xot::Node` handles, which stay valid across attribute
//! edits (the binder never changes the tree shape).

use std::collections::HashMap;

use thiserror::Error;
use xot::{NameId, Node as XotNode, Xot};

/// Errors raised while parsing or serializing a document
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("failed to parse XML: {0}")]
    Parse(String),
    #[error("document has no root element")]
    NoRootElement,
    #[error("failed to serialize XML: {0}")]
    Serialize(String),
}

/// An XML document open for editing
pub struct Document {
    xot: Xot,
    root: XotNode,
    /// Cache of attribute name strings to NameIds
    name_cache: HashMap<String, NameId>,
}

impl Document {
    /// Parse XML text into a new document
    pub fn parse(text: &str) -> Result<Self, DocumentError> {
        let mut xot = Xot::new();
        let root = xot
            .parse(text)
            .map_err(|e| DocumentError::Parse(e.to_string()))?;
        if xot.document_element(root).is_err() {
            return Err(DocumentError::NoRootElement);
        }
        Ok(Document {
            xot,
            root,
            name_cache: HashMap::new(),
        })
    }

    /// The underlying xot arena
    pub fn xot(&self) -> &Xot {
        &self.xot
    }

    /// The document node (parent of the root element)
    pub fn document_node(&self) -> XotNode {
        self.root
    }

    /// The outermost element
    pub fn root_element(&self) -> Result<XotNode, DocumentError> {
        self.xot
            .document_element(self.root)
            .map_err(|_| DocumentError::NoRootElement)
    }

    /// Serialize the whole document back to text
    pub fn to_xml_string(&self) -> Result<String, DocumentError> {
        self.xot
            .to_string(self.root)
            .map_err(|e| DocumentError::Serialize(e.to_string()))
    }

    /// Serialize a single node (element and its subtree)
    pub fn node_to_string(&self, node: XotNode) -> Result<String, DocumentError> {
        self.xot
            .to_string(node)
            .map_err(|e| DocumentError::Serialize(e.to_string()))
    }

    /// Get the local name of an element node
    pub fn element_name(&self, node: XotNode) -> Option<String> {
        self.xot
            .element(node)
            .map(|element| self.xot.local_name_str(element.name()).to_string())
    }

    /// Get an attribute value by local name
    pub fn attribute(&self, node: XotNode, name: &str) -> Option<String> {
        let attrs = self.xot.attributes(node);
        for (name_id, value) in attrs.iter() {
            if self.xot.local_name_str(name_id) == name {
                return Some(value.to_string());
            }
        }
        None
    }

    /// Get an attribute value, treating a missing attribute as ""
    pub fn attribute_or_empty(&self, node: XotNode, name: &str) -> String {
        self.attribute(node, name).unwrap_or_default()
    }

    /// Set (insert or overwrite) an attribute on an element
    pub fn set_attribute(&mut self, node: XotNode, name: &str, value: &str) {
        let name_id = self.attribute_name(name);
        self.xot
            .attributes_mut(node)
            .insert(name_id, value.to_string());
    }

    /// Get or create a NameId for a (namespace-less) attribute name
    fn attribute_name(&mut self, name: &str) -> NameId {
        if let Some(&id) = self.name_cache.get(name) {
            return id;
        }
        let id = self.xot.add_name(name);
        self.name_cache.insert(name.to_string(), id);
        id
    }

    /// All elements in document order
    pub fn elements(&self) -> Vec<XotNode> {
        self.xot
            .descendants(self.root)
            .filter(|&node| self.xot.element(node).is_some())
            .collect()
    }

    /// Number of elements in the document
    pub fn element_count(&self) -> usize {
        self.elements().len()
    }

    /// First element below `node` (excluding `node` itself) with the given
    /// local name, in document order
    pub fn first_descendant_named(&self, node: XotNode, tag: &str) -> Option<XotNode> {
        self.xot
            .descendants(node)
            .skip(1)
            .find(|&child| self.element_name(child).as_deref() == Some(tag))
    }

    /// All elements below `node` (excluding `node` itself) with the given
    /// local name, in document order
    pub fn descendants_named(&self, node: XotNode, tag: &str) -> Vec<XotNode> {
        self.xot
            .descendants(node)
            .skip(1)
            .filter(|&child| self.element_name(child).as_deref() == Some(tag))
            .collect()
    }

    /// Short human description of an element for diagnostics: `tag#id`
    pub fn describe(&self, node: XotNode) -> String {
        let tag = self.element_name(node).unwrap_or_else(|| "node".to_string());
        match self.attribute(node, "id") {
            Some(id) => format!("{}#{}", tag, id),
            None => tag,
        }
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("elements", &self.element_count())
            .finish()
    }
}
