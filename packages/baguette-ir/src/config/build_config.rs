use serde::{Deserialize, Serialize};
use std::path::Path;

use super::error::{ConfigError, ConfigResult};

pub const SUPPORTED_VERSIONS: &[u32] = &[1];

/// Upper bound of the Data vertex preview
pub const MAX_DATA_PREVIEW: usize = 4096;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Directory bare module names (`kernel32.dll`) resolve under
    pub system_directory: String,

    /// Platform assumed when the trace does not name one
    pub default_platform: String,

    /// Add `NextSignificantCall` shortcuts after process attribution
    pub skip_linking: bool,

    /// Run the finalizer rounds reserved by type packages
    pub finalizers: bool,

    /// Characters of a written buffer kept on its Data vertex
    pub data_preview_len: usize,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            system_directory: "C:\\Windows\\System32".to_string(),
            default_platform: "windows".to_string(),
            skip_linking: true,
            finalizers: true,
            data_preview_len: 64,
        }
    }
}

/// YAML schema v1
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfigV1 {
    pub version: u32,
    #[serde(flatten)]
    pub build: BuildConfig,
}

impl BuildConfig {
    pub fn from_yaml(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> ConfigResult<Self> {
        let raw: serde_yaml::Value = serde_yaml::from_str(content)?;
        let version = raw
            .get("version")
            .ok_or(ConfigError::MissingVersion)?
            .as_u64()
            .ok_or(ConfigError::MissingVersion)? as u32;
        if !SUPPORTED_VERSIONS.contains(&version) {
            return Err(ConfigError::UnsupportedVersion {
                found: version,
                supported: SUPPORTED_VERSIONS.to_vec(),
            });
        }

        let mut mapping = match raw {
            serde_yaml::Value::Mapping(mapping) => mapping,
            _ => return Err(ConfigError::MissingVersion),
        };
        mapping.remove("version");
        let config: BuildConfig = serde_yaml::from_value(serde_yaml::Value::Mapping(mapping))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> ConfigResult<String> {
        let export = BuildConfigV1 {
            version: 1,
            build: self.clone(),
        };
        Ok(serde_yaml::to_string(&export)?)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.system_directory.trim().is_empty() {
            return Err(ConfigError::Empty {
                field: "system_directory".to_string(),
            });
        }
        if self.default_platform.trim().is_empty() {
            return Err(ConfigError::Empty {
                field: "default_platform".to_string(),
            });
        }
        if self.data_preview_len > MAX_DATA_PREVIEW {
            return Err(ConfigError::range_with_hint(
                "data_preview_len",
                self.data_preview_len,
                0,
                MAX_DATA_PREVIEW,
                "Data vertices keep a digest of the full buffer; the preview is for display only",
            ));
        }
        Ok(())
    }

    pub fn with_system_directory(mut self, dir: impl Into<String>) -> Self {
        self.system_directory = dir.into();
        self
    }

    pub fn with_skip_linking(mut self, enabled: bool) -> Self {
        self.skip_linking = enabled;
        self
    }

    pub fn with_finalizers(mut self, enabled: bool) -> Self {
        self.finalizers = enabled;
        self
    }
}
