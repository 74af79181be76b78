//! rulepatch-core: Rule-driven questionnaires for XML models
//!
//! This library provides:
//! - XPath 3.1 element selection over an editable document
//! - Rule files describing which attributes to ask about, and how
//! - Form compilation with contextual legends and nested conditional fields
//! - Binding of submitted answers back onto the document
//! - A sequential remote XSLT transformation chain
//! - An editing session tying it all together

pub mod ancestry;
pub mod binder;
pub mod config;
pub mod document;
pub mod error;
pub mod form;
pub mod labels;
pub mod rules;
pub mod session;
pub mod transform;
pub mod xpath;

pub use ancestry::{AncestryConfig, AncestryError, AncestryResolver};
pub use binder::{apply, ApplyReport, AttributeWrite, Submission, SubmissionError, SubmittedValue};
pub use config::{ConfigError, EditorConfig, PresetConfig};
pub use document::{Document, DocumentError};
pub use error::EditorError;
pub use form::{
    FieldDescriptor, FieldGroup, FieldInput, FormCompiler, FormError, FormState, TableDraft, TableRow,
};
pub use labels::TypeLabels;
pub use rules::{AttributeSpec, InputKind, Rule, RuleError, RuleSet, RulesStatus};
pub use session::{EditorSession, ExportedDocument, Questionnaire, CUSTOM_PRESET};
pub use transform::{run_chain, ChainOutcome, HttpTransformService, TransformError, TransformService, XsltStep};
pub use xpath::{DocumentSnapshot, PathQuery, XPathError};
