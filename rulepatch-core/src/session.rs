//! Editing session: the document, stylesheets and rules a user works with
//!
//! All state lives in [`EditorSession`]; every mutating operation takes
//! `&mut self`. Failed operations leave the session as it was, except for a
//! failed transform chain, which keeps the output of the last good step.

use std::path::Path;

use serde::Serialize;

use crate::binder::{self, ApplyReport, Submission};
use crate::config::EditorConfig;
use crate::document::Document;
use crate::error::EditorError;
use crate::form::{FormCompiler, FormState};
use crate::rules::{RuleSet, RulesStatus};
use crate::transform::{run_chain, TransformService, XsltStep};

/// Preset name that clears the stylesheet and rule lists
pub const CUSTOM_PRESET: &str = "custom";

/// Target platform stamped on the root element after a transform
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlatformSelection {
    pub platform: String,
    pub comm_tech: String,
}

/// The rule file currently loaded
#[derive(Debug, Clone)]
pub struct RulesFile {
    pub name: String,
    pub rules: RuleSet,
}

/// What the questionnaire step has to offer
#[derive(Debug)]
pub enum Questionnaire {
    Ready(FormState),
    NoRules,
}

/// Serialized document ready to be saved
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportedDocument {
    pub file_name: String,
    pub content: String,
}

#[derive(Debug, Default)]
pub struct EditorSession {
    config: EditorConfig,
    preset: Option<String>,
    xslt: Vec<XsltStep>,
    rules: Option<RulesFile>,
    document: Option<Document>,
    platform: Option<PlatformSelection>,
}

impl EditorSession {
    pub fn new(config: EditorConfig) -> Self {
        EditorSession {
            config,
            ..Default::default()
        }
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    pub fn preset(&self) -> Option<&str> {
        self.preset.as_deref()
    }

    pub fn xslt_steps(&self) -> &[XsltStep] {
        &self.xslt
    }

    pub fn rules(&self) -> Option<&RulesFile> {
        self.rules.as_ref()
    }

    /// Replace the current document. Malformed text keeps the old one.
    pub fn load_document(&mut self, text: &str) -> Result<(), EditorError> {
        let document = Document::parse(text)?;
        tracing::info!("loaded document with {} elements", document.element_count());
        self.document = Some(document);
        Ok(())
    }

    pub fn add_xslt(&mut self, name: &str, content: &str) {
        self.xslt.push(XsltStep::new(name, content));
    }

    pub fn remove_xslt(&mut self, index: usize) -> Option<XsltStep> {
        if index < self.xslt.len() {
            Some(self.xslt.remove(index))
        } else {
            None
        }
    }

    /// Replace the rule file. Only one is held at a time.
    pub fn load_rules(&mut self, name: &str, text: &str) -> Result<RulesStatus, EditorError> {
        let rules = RuleSet::from_json(text)?;
        let status = rules.status();
        match status {
            RulesStatus::Loaded(count) => tracing::info!("{}: {} rule(s)", name, count),
            RulesStatus::NoRules => tracing::info!("{}: no modification rules", name),
        }
        self.rules = Some(RulesFile {
            name: name.to_string(),
            rules,
        });
        Ok(status)
    }

    /// Load the stylesheets and rules of a configured preset.
    ///
    /// [`CUSTOM_PRESET`] clears both lists instead. Nothing changes if any
    /// preset file cannot be read or parsed.
    pub fn select_preset(&mut self, name: &str) -> Result<(), EditorError> {
        if name == CUSTOM_PRESET {
            self.xslt.clear();
            self.rules = None;
            self.preset = Some(name.to_string());
            return Ok(());
        }

        let preset = self
            .config
            .preset(name)
            .ok_or_else(|| EditorError::UnknownPreset(name.to_string()))?;

        let mut steps = Vec::with_capacity(preset.xslt.len());
        for path in &preset.xslt {
            let path = self.config.resolve(path);
            steps.push(XsltStep::new(file_name(&path), read(&path)?));
        }
        let rules = match &preset.rules {
            Some(path) => {
                let path = self.config.resolve(path);
                let rules = RuleSet::from_json(&read(&path)?)?;
                Some(RulesFile {
                    name: file_name(&path),
                    rules,
                })
            }
            None => None,
        };

        tracing::info!("preset {}: {} stylesheet(s)", name, steps.len());
        self.xslt = steps;
        self.rules = rules;
        self.preset = Some(name.to_string());
        Ok(())
    }

    pub fn set_platform(&mut self, platform: &str, comm_tech: &str) {
        self.platform = Some(PlatformSelection {
            platform: platform.to_string(),
            comm_tech: comm_tech.to_string(),
        });
    }

    fn platform_selection_enabled(&self) -> bool {
        self.preset
            .as_deref()
            .and_then(|name| self.config.preset(name))
            .is_some_and(|preset| preset.platform_selection)
    }

    /// Run the stylesheet list over the current document.
    ///
    /// Returns the number of steps applied. On failure the document holds the
    /// output of the last step that succeeded.
    pub fn run_transformations(&mut self, service: &dyn TransformService) -> Result<usize, EditorError> {
        if self.xslt.is_empty() {
            return Err(EditorError::NoTransformSteps);
        }
        let input = self.document.take().ok_or(EditorError::NoDocument)?;
        let outcome = run_chain(service, input, &self.xslt);
        let mut output = outcome.output;

        if let Some(failure) = outcome.failure {
            self.document = Some(output);
            return Err(EditorError::RemoteTransformFailure {
                step: failure.step,
                name: failure.name,
                source: failure.error,
            });
        }

        if self.platform_selection_enabled() {
            match (&self.platform, output.root_element()) {
                (Some(selection), Ok(root)) => {
                    output.set_attribute(root, "platform", &selection.platform);
                    output.set_attribute(root, "comm_tech", &selection.comm_tech);
                }
                (None, _) => tracing::warn!("preset expects a platform selection but none was made"),
                (_, Err(e)) => tracing::warn!("cannot stamp platform: {}", e),
            }
        }

        self.document = Some(output);
        Ok(outcome.completed)
    }

    /// Compile the questionnaire for the current document and rules
    pub fn questionnaire(&self) -> Result<Questionnaire, EditorError> {
        let document = self.document.as_ref().ok_or(EditorError::NoDocument)?;
        let Some(rules) = self.rules.as_ref().filter(|file| !file.rules.is_empty()) else {
            return Ok(Questionnaire::NoRules);
        };
        let compiler = FormCompiler::new(self.config.type_labels.clone(), self.config.ancestry.clone());
        let groups = compiler.compile(document, &rules.rules)?;
        Ok(Questionnaire::Ready(FormState::new(groups)))
    }

    /// Write answers onto the current document
    pub fn submit(&mut self, submission: &Submission) -> Result<ApplyReport, EditorError> {
        let document = self.document.as_mut().ok_or(EditorError::NoDocument)?;
        let Some(rules) = self.rules.as_ref() else {
            return Ok(ApplyReport::default());
        };
        let report = binder::apply(document, &rules.rules, submission)?;
        tracing::info!(
            "applied {} change(s) to {} element(s)",
            report.writes.len(),
            report.elements_matched
        );
        Ok(report)
    }

    pub fn export(&self) -> Result<ExportedDocument, EditorError> {
        let document = self.document.as_ref().ok_or(EditorError::NoDocument)?;
        Ok(ExportedDocument {
            file_name: self.config.export_file_name.clone(),
            content: document.to_xml_string()?,
        })
    }
}

fn read(path: &Path) -> Result<String, EditorError> {
    std::fs::read_to_string(path).map_err(|source| EditorError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
