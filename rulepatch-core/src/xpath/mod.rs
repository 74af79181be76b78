//! XPath 3.1 element selection using xee-xpath
//!
//! Queries run against a frozen snapshot of a [`Document`](crate::Document)
//! and resolve back to the live document's element handles.

mod engine;
mod node_path;

pub use engine::{DocumentSnapshot, PathQuery};
pub use node_path::NodePath;

use thiserror::Error;

/// Errors that can occur during XPath evaluation
#[derive(Error, Debug)]
pub enum XPathError {
    #[error("Failed to compile XPath: {0}")]
    Compile(String),
    #[error("Failed to execute XPath: {0}")]
    Execute(String),
    #[error("Failed to load XML: {0}")]
    XmlLoad(String),
}
