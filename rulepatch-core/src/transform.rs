//! Remote XSLT transformation chain
//!
//! Each step posts the current XML and one stylesheet to a transform service
//! and takes the returned XML as input for the next step. Steps never run in
//! parallel, and the first failure ends the chain.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::document::Document;

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("request failed: {0}")]
    Http(String),
    #[error("service answered with HTTP status {0}")]
    Status(u16),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("step output is not well-formed XML: {0}")]
    MalformedOutput(String),
}

/// One stylesheet in the chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XsltStep {
    pub name: String,
    pub content: String,
}

impl XsltStep {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        XsltStep {
            name: name.into(),
            content: content.into(),
        }
    }
}

/// Applies a single stylesheet to an XML text
pub trait TransformService {
    fn transform(&self, input_xml: &str, step: &XsltStep) -> Result<String, TransformError>;
}

#[derive(Serialize)]
struct TransformRequest<'a> {
    #[serde(rename = "inputXML")]
    input_xml: &'a str,
    #[serde(rename = "xsltContent")]
    xslt_content: &'a str,
}

#[derive(Deserialize)]
struct TransformResponse {
    output: String,
}

/// Transform service reached over HTTP with a JSON body
pub struct HttpTransformService {
    agent: ureq::Agent,
    url: String,
}

impl HttpTransformService {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        HttpTransformService { agent, url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl TransformService for HttpTransformService {
    fn transform(&self, input_xml: &str, step: &XsltStep) -> Result<String, TransformError> {
        let body = TransformRequest {
            input_xml,
            xslt_content: &step.content,
        };
        let response = self
            .agent
            .post(&self.url)
            .header("content-type", "application/json")
            .send_json(&body)
            .map_err(|e| match e {
                ureq::Error::StatusCode(code) => TransformError::Status(code),
                other => TransformError::Http(other.to_string()),
            })?;

        let parsed: TransformResponse = response
            .into_body()
            .read_json()
            .map_err(|e| TransformError::MalformedResponse(e.to_string()))?;
        Ok(parsed.output)
    }
}

/// Where and why a chain stopped
#[derive(Debug)]
pub struct ChainFailure {
    /// Zero-based index of the failing step
    pub step: usize,
    pub name: String,
    pub error: TransformError,
}

/// Result of running a chain
#[derive(Debug)]
pub struct ChainOutcome {
    /// Output of the last successful step, or the input when none succeeded
    pub output: Document,
    pub completed: usize,
    pub failure: Option<ChainFailure>,
}

impl ChainOutcome {
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

/// Run `steps` in order starting from `input`.
///
/// Every step's output must parse as XML before it is handed to the next
/// step; output that does not parse fails that step.
pub fn run_chain(service: &dyn TransformService, input: Document, steps: &[XsltStep]) -> ChainOutcome {
    let mut current = input;
    for (index, step) in steps.iter().enumerate() {
        tracing::info!("transform step {}/{}: {}", index + 1, steps.len(), step.name);
        let result = current
            .to_xml_string()
            .map_err(|e| TransformError::MalformedOutput(e.to_string()))
            .and_then(|xml| service.transform(&xml, step))
            .and_then(|output| Document::parse(&output).map_err(|e| TransformError::MalformedOutput(e.to_string())));

        match result {
            Ok(next) => current = next,
            Err(error) => {
                tracing::warn!("transform step {} ({}) failed: {}", index + 1, step.name, error);
                return ChainOutcome {
                    output: current,
                    completed: index,
                    failure: Some(ChainFailure {
                        step: index,
                        name: step.name.clone(),
                        error,
                    }),
                };
            }
        }
    }
    ChainOutcome {
        output: current,
        completed: steps.len(),
        failure: None,
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::cell::RefCell;

    /// Scripted service: wraps the input root in an element named after the
    /// stylesheet content, unless the content is `fail` or `garbage`.
    #[derive(Default)]
    pub struct FakeService {
        pub inputs: RefCell<Vec<String>>,
    }

    impl TransformService for FakeService {
        fn transform(&self, input_xml: &str, step: &XsltStep) -> Result<String, TransformError> {
            self.inputs.borrow_mut().push(input_xml.to_string());
            match step.content.as_str() {
                "fail" => Err(TransformError::Status(500)),
                "garbage" => Ok("<unclosed>".to_string()),
                wrapper => Ok(format!("<{}>{}</{}>", wrapper, input_xml, wrapper)),
            }
        }
    }
}
