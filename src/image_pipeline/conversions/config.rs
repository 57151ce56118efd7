//! End-to-end pipeline configuration

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::image_pipeline::common::error::{FusionError, Result};
use crate::image_pipeline::merging::MergeConfig;
use crate::image_pipeline::registration::RegistrationConfig;
use crate::image_pipeline::shadow::ShadowConfig;
use crate::image_pipeline::tiff::OutputConfig;

/// Post-registration stages to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum OperationMode {
    /// Detail fusion only
    SkinSmoothing,
    /// Shadow mask only
    ShadowDetection,
    /// Both stages, run concurrently
    #[default]
    All,
}

impl OperationMode {
    pub fn runs_merge(self) -> bool {
        matches!(self, OperationMode::SkinSmoothing | OperationMode::All)
    }

    pub fn runs_shadow(self) -> bool {
        matches!(self, OperationMode::ShadowDetection | OperationMode::All)
    }
}

/// Accepts the positioning tool's tokens (`OP_SKIN_SMOOTHING`,
/// `OP_SHADOW_DETECTION`) as well as kebab-case names, case-insensitively.
impl FromStr for OperationMode {
    type Err = FusionError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "op-skin-smoothing" | "skin-smoothing" | "merge" => Ok(OperationMode::SkinSmoothing),
            "op-shadow-detection" | "shadow-detection" | "shadow" => {
                Ok(OperationMode::ShadowDetection)
            }
            "all" | "op-all" => Ok(OperationMode::All),
            other => Err(FusionError::ConfigError(format!(
                "unknown operation mode '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for OperationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationMode::SkinSmoothing => "skin-smoothing",
            OperationMode::ShadowDetection => "shadow-detection",
            OperationMode::All => "all",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PipelineConfig {
    pub mode: OperationMode,
    /// Treat the inputs as already aligned and skip registration
    pub assume_aligned: bool,
    pub registration: RegistrationConfig,
    pub merge: MergeConfig,
    pub shadow: ShadowConfig,
    pub output: OutputConfig,
}

impl PipelineConfig {
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Loads a JSON configuration; missing fields keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            FusionError::InputReadError(format!("{}: {}", path.display(), e))
        })?;
        let config: PipelineConfig = serde_json::from_str(&text).map_err(|e| {
            FusionError::ConfigError(format!("{}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.registration.validate()?;
        self.merge.validate()?;
        self.shadow.validate()?;
        self.output.validate()
    }
}

/// Builder for PipelineConfig
#[derive(Default)]
pub struct PipelineConfigBuilder {
    mode: Option<OperationMode>,
    assume_aligned: Option<bool>,
    registration: Option<RegistrationConfig>,
    merge: Option<MergeConfig>,
    shadow: Option<ShadowConfig>,
    output: Option<OutputConfig>,
}

impl PipelineConfigBuilder {
    pub fn mode(mut self, mode: OperationMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn assume_aligned(mut self, aligned: bool) -> Self {
        self.assume_aligned = Some(aligned);
        self
    }

    pub fn registration(mut self, registration: RegistrationConfig) -> Self {
        self.registration = Some(registration);
        self
    }

    pub fn merge(mut self, merge: MergeConfig) -> Self {
        self.merge = Some(merge);
        self
    }

    pub fn shadow(mut self, shadow: ShadowConfig) -> Self {
        self.shadow = Some(shadow);
        self
    }

    pub fn output(mut self, output: OutputConfig) -> Self {
        self.output = Some(output);
        self
    }

    pub fn build(self) -> PipelineConfig {
        PipelineConfig {
            mode: self.mode.unwrap_or_default(),
            assume_aligned: self.assume_aligned.unwrap_or_default(),
            registration: self.registration.unwrap_or_default(),
            merge: self.merge.unwrap_or_default(),
            shadow: self.shadow.unwrap_or_default(),
            output: self.output.unwrap_or_default(),
        }
    }
}
