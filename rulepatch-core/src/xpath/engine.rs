//! XPath 3.1 query engine implementation

use super::{NodePath, XPathError};
use crate::document::Document;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use xee_xpath::{query::SequenceQuery, DocumentHandle, Documents, Queries, Query};
use xot::Node as XotNode;

// Thread-local cache for compiled XPath queries.
// Rule files reuse a handful of expressions, so every compiled query is kept.
thread_local! {
    static QUERY_CACHE: RefCell<HashMap<String, SequenceQuery>> = RefCell::new(HashMap::new());
}

/// A frozen copy of a document loaded into xee-xpath.
///
/// Results are fixed at capture time: later edits to the live document do not
/// change what a snapshot selects, as long as the tree shape is unchanged.
pub struct DocumentSnapshot {
    documents: Documents,
    handle: DocumentHandle,
}

impl DocumentSnapshot {
    /// Serialize the document and load the text into a fresh xee-xpath store
    pub fn capture(document: &Document) -> Result<Self, XPathError> {
        let xml = document
            .to_xml_string()
            .map_err(|e| XPathError::XmlLoad(e.to_string()))?;
        Self::from_xml(&xml)
    }

    /// Load XML text directly into a snapshot
    pub fn from_xml(xml: &str) -> Result<Self, XPathError> {
        let mut documents = Documents::new();
        let uri = "file:///snapshot"
            .try_into()
            .map_err(|_| XPathError::XmlLoad("invalid snapshot URI".to_string()))?;
        let handle = documents
            .add_string(uri, xml)
            .map_err(|e| XPathError::XmlLoad(e.to_string()))?;
        Ok(DocumentSnapshot { documents, handle })
    }

    /// Evaluate an expression and resolve the matches onto `document`.
    ///
    /// `document` must have the same tree shape as the captured one. A path
    /// that no longer resolves to an element of the same name is reported as
    /// an execution error rather than silently dropped.
    pub fn select(&mut self, document: &Document, xpath: &str) -> Result<Vec<XotNode>, XPathError> {
        let matches = self.run(xpath)?;
        let mut nodes = Vec::with_capacity(matches.len());
        for (path, tag) in matches {
            let node = path
                .resolve(document.xot(), document.document_node())
                .filter(|&node| document.element_name(node).as_deref() == Some(tag.as_str()))
                .ok_or_else(|| XPathError::Execute("snapshot no longer matches document".to_string()))?;
            nodes.push(node);
        }
        Ok(nodes)
    }

    /// Run a (cached) query and collect matched elements as (path, tag) pairs
    fn run(&mut self, xpath: &str) -> Result<Vec<(NodePath, String)>, XPathError> {
        let documents = &mut self.documents;
        let handle = self.handle;

        QUERY_CACHE.with(|cache| {
            let mut cache = cache.borrow_mut();
            if !cache.contains_key(xpath) {
                let query = Queries::default()
                    .sequence(xpath)
                    .map_err(|e| XPathError::Compile(e.to_string()))?;
                cache.insert(xpath.to_string(), query);
            }
            let Some(query) = cache.get(xpath) else {
                return Err(XPathError::Compile(format!("query cache lost `{}`", xpath)));
            };

            let results = query
                .execute(&mut *documents, handle)
                .map_err(|e: xee_xpath::error::Error| XPathError::Execute(e.to_string()))?;

            let xot = documents.xot();
            let mut seen = HashSet::new();
            let mut matches = Vec::new();
            for item in results.iter() {
                match item {
                    xee_xpath::Item::Node(node) => {
                        let Some(element) = xot.element(node) else {
                            continue;
                        };
                        let tag = xot.local_name_str(element.name()).to_string();
                        if let Some(path) = NodePath::of(xot, node) {
                            if seen.insert(path.clone()) {
                                matches.push((path, tag));
                            }
                        }
                    }
                    xee_xpath::Item::Atomic(_) | xee_xpath::Item::Function(_) => {}
                }
            }
            Ok(matches)
        })
    }
}

/// Element selection over a [`Document`]
///
/// Each call captures its own snapshot. Use [`DocumentSnapshot`] directly to
/// run several expressions against one frozen state.
pub struct PathQuery;

impl PathQuery {
    /// Evaluate `xpath` against `document` and return the matched elements in
    /// document order. No match is an empty vector, never an error.
    pub fn evaluate(document: &Document, xpath: &str) -> Result<Vec<XotNode>, XPathError> {
        let mut snapshot = DocumentSnapshot::capture(document)?;
        snapshot.select(document, xpath)
    }

    /// Check that an expression compiles, without running it
    pub fn validate(xpath: &str) -> Result<(), XPathError> {
        QUERY_CACHE.with(|cache| {
            let mut cache = cache.borrow_mut();
            if cache.contains_key(xpath) {
                return Ok(());
            }
            let query = Queries::default()
                .sequence(xpath)
                .map_err(|e| XPathError::Compile(e.to_string()))?;
            cache.insert(xpath.to_string(), query);
            Ok(())
        })
    }
}
