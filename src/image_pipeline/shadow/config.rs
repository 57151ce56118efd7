//! Shadow detection configuration

use serde::{Deserialize, Serialize};

use crate::image_pipeline::common::error::{FusionError, Result};

/// Which valley a histogram scan settles on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ValleySelection {
    /// Stop at the first valley, scanning from the dark end
    #[default]
    First,
    /// Keep scanning, each further valley must be lower than the last one kept
    Deepest,
}

/// Threshold used when no histogram valley turns up within the iteration cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ValleyFallback {
    /// Otsu's split of the score map, the median when it cannot be split
    #[default]
    Otsu,
    Median,
    /// Report `ShadowValleyNotFound`
    Fail,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowConfig {
    /// Gamma applied to brightness and NIR before the darkness mapping
    pub gamma: f32,
    /// Steepness of the darkness sigmoid
    pub alpha: f32,
    /// Inflection point of the darkness sigmoid
    pub beta: f32,
    /// Upper bound of the colour-to-NIR ratio
    pub tao: f32,
    /// Scales the initial histogram bin count
    pub nabla: f32,
    /// Added to NIR before dividing by it
    pub epsilon: f32,
    /// Histograms built while searching for a valley, one more bin each time
    pub max_valley_iterations: usize,
    pub valley_selection: ValleySelection,
    pub fallback: ValleyFallback,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            gamma: 2.2,
            alpha: 14.0,
            beta: 0.5,
            tao: 10.0,
            nabla: 1.6,
            epsilon: 1e-6,
            max_valley_iterations: 1024,
            valley_selection: ValleySelection::First,
            fallback: ValleyFallback::Otsu,
        }
    }
}

impl ShadowConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("gamma", self.gamma),
            ("tao", self.tao),
            ("nabla", self.nabla),
            ("epsilon", self.epsilon),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(FusionError::ConfigError(format!(
                    "shadow {} must be positive, got {}",
                    name, value
                )));
            }
        }
        if !self.alpha.is_finite() || !self.beta.is_finite() {
            return Err(FusionError::ConfigError(
                "shadow alpha and beta must be finite".to_string(),
            ));
        }
        if self.max_valley_iterations == 0 {
            return Err(FusionError::ConfigError(
                "max_valley_iterations must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(ShadowConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_iterations_and_bad_gamma() {
        let config = ShadowConfig {
            max_valley_iterations: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        let config = ShadowConfig {
            gamma: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_enum_fields_deserialize() {
        let json = r#"{ "valley_selection": "Deepest", "fallback": "Fail" }"#;
        let config: ShadowConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.valley_selection, ValleySelection::Deepest);
        assert_eq!(config.fallback, ValleyFallback::Fail);
        assert_eq!(config.alpha, 14.0);
    }
}
