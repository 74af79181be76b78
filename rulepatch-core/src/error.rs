//! Session-level errors

use std::path::PathBuf;

use thiserror::Error;

use crate::ancestry::AncestryError;
use crate::binder::SubmissionError;
use crate::config::ConfigError;
use crate::document::DocumentError;
use crate::form::FormError;
use crate::rules::RuleError;
use crate::transform::TransformError;

/// Everything an editor operation can fail with
#[derive(Error, Debug)]
pub enum EditorError {
    #[error("malformed {what}: {message}")]
    MalformedInput { what: &'static str, message: String },

    #[error("rule {rule_index}: invalid path expression `{expression}`: {message}")]
    InvalidPathExpression {
        rule_index: usize,
        expression: String,
        message: String,
    },

    #[error("transform step {} ({name}) failed: {source}", .step + 1)]
    RemoteTransformFailure {
        step: usize,
        name: String,
        #[source]
        source: TransformError,
    },

    #[error("ancestry of {element} loops (stopped after {hops} hops)")]
    AncestryCycleDetected { element: String, hops: usize },

    #[error("field key `{0}` is produced by more than one attribute")]
    FieldKeyCollision(String),

    #[error("no document loaded")]
    NoDocument,

    #[error("no XSLT files to apply")]
    NoTransformSteps,

    #[error("unknown preset `{0}`")]
    UnknownPreset(String),

    #[error("unknown field `{0}`")]
    UnknownField(String),

    #[error("field `{0}` is not a table")]
    NotATableField(String),

    #[error("field `{0}` is a table")]
    NotATextField(String),

    #[error("table `{table}`: {message}")]
    TableEdit { table: String, message: String },

    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl EditorError {
    pub fn malformed(what: &'static str, error: impl std::fmt::Display) -> Self {
        EditorError::MalformedInput {
            what,
            message: error.to_string(),
        }
    }
}

impl From<DocumentError> for EditorError {
    fn from(error: DocumentError) -> Self {
        EditorError::malformed("document", error)
    }
}

impl From<RuleError> for EditorError {
    fn from(error: RuleError) -> Self {
        EditorError::malformed("rule file", error)
    }
}

impl From<SubmissionError> for EditorError {
    fn from(error: SubmissionError) -> Self {
        EditorError::malformed("answers", error)
    }
}

impl From<ConfigError> for EditorError {
    fn from(error: ConfigError) -> Self {
        match error {
            ConfigError::Io { path, source } => EditorError::Io { path, source },
            other => EditorError::malformed("config", other),
        }
    }
}

impl From<AncestryError> for EditorError {
    fn from(error: AncestryError) -> Self {
        match error {
            AncestryError::CycleDetected { element, hops } => EditorError::AncestryCycleDetected { element, hops },
        }
    }
}

impl From<FormError> for EditorError {
    fn from(error: FormError) -> Self {
        match error {
            FormError::InvalidPathExpression {
                rule_index,
                expression,
                source,
            } => EditorError::InvalidPathExpression {
                rule_index,
                expression,
                message: source.to_string(),
            },
            FormError::Query(source) => EditorError::malformed("document", source),
            FormError::FieldKeyCollision(key) => EditorError::FieldKeyCollision(key),
            FormError::Ancestry(error) => error.into(),
            FormError::UnknownField(key) => EditorError::UnknownField(key),
            FormError::NotATableField(key) => EditorError::NotATableField(key),
            FormError::NotATextField(key) => EditorError::NotATextField(key),
            FormError::RowOutOfRange { table, row } => EditorError::TableEdit {
                table,
                message: format!("no row {}", row),
            },
            FormError::UnknownColumn { table, column } => EditorError::TableEdit {
                table,
                message: format!("no column `{}`", column),
            },
            FormError::InvalidRows { key, message } => EditorError::TableEdit { table: key, message },
        }
    }
}
