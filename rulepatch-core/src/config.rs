//! Editor configuration
//!
//! Loaded from TOML. Every key is optional:
//!
//! ```toml
//! service_url = "http://localhost:8080/transform"
//! service_timeout_secs = 30
//! export_file_name = "output.xml"
//!
//! [type_labels]
//! operational_goal = "on interval action"
//!
//! [ancestry]
//! component_type = "cps_component"
//!
//! [presets.pim-psm]
//! xslt = ["PIM-PSM.xsl"]
//! rules = "PIM-PSM-Rules.json"
//! platform_selection = true
//! ```
//!
//! Relative preset paths resolve against the directory of the config file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ancestry::AncestryConfig;
use crate::labels::TypeLabels;

pub const DEFAULT_SERVICE_URL: &str = "http://localhost:8080/transform";
pub const DEFAULT_EXPORT_FILE_NAME: &str = "output.xml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Toml(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EditorConfig {
    pub service_url: String,
    pub service_timeout_secs: u64,
    pub export_file_name: String,
    pub type_labels: TypeLabels,
    pub ancestry: AncestryConfig,
    pub presets: BTreeMap<String, PresetConfig>,
    /// Directory preset paths are resolved against
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// A named pairing of stylesheets and a rule file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PresetConfig {
    pub xslt: Vec<PathBuf>,
    pub rules: Option<PathBuf>,
    /// Whether the preset asks for a target platform and communication technology
    pub platform_selection: bool,
}

impl Default for EditorConfig {
    fn default() -> Self {
        EditorConfig {
            service_url: DEFAULT_SERVICE_URL.to_string(),
            service_timeout_secs: 30,
            export_file_name: DEFAULT_EXPORT_FILE_NAME.to_string(),
            type_labels: TypeLabels::default(),
            ancestry: AncestryConfig::default(),
            presets: BTreeMap::new(),
            base_dir: PathBuf::from("."),
        }
    }
}

impl EditorConfig {
    /// Read a config file; its directory becomes the preset base directory
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&text)?;
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            config.base_dir = dir.to_path_buf();
        }
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn service_timeout(&self) -> Duration {
        Duration::from_secs(self.service_timeout_secs)
    }

    pub fn preset(&self, name: &str) -> Option<&PresetConfig> {
        self.presets.get(name)
    }

    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = EditorConfig::from_toml_str("").unwrap();
        assert_eq!(config, EditorConfig::default());
        assert_eq!(config.export_file_name, "output.xml");
        assert_eq!(config.ancestry.container_tag, "object");
        assert_eq!(config.type_labels.display("action"), "on demand action");
    }

    #[test]
    fn test_partial_sections() {
        let config = EditorConfig::from_toml_str(
            r#"
            service_url = "http://xslt.local/run"

            [type_labels]
            sensor = "measuring device"

            [ancestry]
            component_type = "component"

            [presets.cim-pim]
            xslt = ["CIM-PIM.xsl", "CIM-PIM-Aux.xsl"]
            rules = "CIM-PIM-Rules.json"
            "#,
        )
        .unwrap();
        assert_eq!(config.service_url, "http://xslt.local/run");
        assert_eq!(config.type_labels.display("sensor"), "measuring device");
        // Replacing the table drops the built-in entries
        assert_eq!(config.type_labels.display("action"), "action");
        assert_eq!(config.ancestry.component_type, "component");
        assert_eq!(config.ancestry.boundary_type, "boundary");

        let preset = config.preset("cim-pim").unwrap();
        assert_eq!(preset.xslt.len(), 2);
        assert!(!preset.platform_selection);
    }

    #[test]
    fn test_unknown_keys_rejected() {
        assert!(matches!(
            EditorConfig::from_toml_str("sevice_url = \"x\""),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn test_load_sets_base_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rulepatch.toml");
        std::fs::write(&path, "export_file_name = \"model.xml\"\n").unwrap();

        let config = EditorConfig::load(&path).unwrap();
        assert_eq!(config.export_file_name, "model.xml");
        assert_eq!(config.resolve(Path::new("a.xsl")), dir.path().join("a.xsl"));
        assert!(matches!(
            EditorConfig::load(&dir.path().join("missing.toml")),
            Err(ConfigError::Io { .. })
        ));
    }
}
