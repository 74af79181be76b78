//! Structural addresses for nodes
//!
//! A `NodePath` is the chain of child positions from the document node down
//! to a node. Two arenas parsed from the same text share the same paths, which
//! is how query results in the xee-xpath snapshot are mapped back onto the
//! editable document.

use xot::{Node as XotNode, Xot};

/// Child-index path from the document node to a node
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodePath(Vec<usize>);

impl NodePath {
    /// Compute the path of `node` within its tree.
    ///
    /// Returns `None` for nodes that are not reachable through `children()`
    /// (attributes and namespace nodes).
    pub fn of(xot: &Xot, node: XotNode) -> Option<Self> {
        let mut steps = Vec::new();
        let mut current = node;
        while let Some(parent) = xot.parent(current) {
            let index = xot.children(parent).position(|child| child == current)?;
            steps.push(index);
            current = parent;
        }
        steps.reverse();
        Some(NodePath(steps))
    }

    /// Follow the path from `document` and return the node it ends at
    pub fn resolve(&self, xot: &Xot, document: XotNode) -> Option<XotNode> {
        let mut current = document;
        for &index in &self.0 {
            current = xot.children(current).nth(index)?;
        }
        Some(current)
    }

    /// Number of steps below the document node
    pub fn depth(&self) -> usize {
        self.0.len()
    }
}
