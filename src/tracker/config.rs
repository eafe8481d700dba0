//! Immutable tracker configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::TrackError;

/// Configuration for the SiamRPN tracker.
///
/// Read-only after construction; every component takes it by reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Anchor stride in search-crop pixels.
    pub stride: u32,
    /// Anchor aspect ratios (h / w).
    pub ratios: Vec<f32>,
    /// Anchor scales, multiplied onto the stride-sized base anchor.
    pub scales: Vec<f32>,
    /// Side of the template crop fed to the evaluator.
    pub exemplar_size: u32,
    /// Side of the search crop fed to the evaluator.
    pub instance_size: u32,
    /// Extra score-grid cells produced by the evaluator head.
    pub base_size: u32,
    /// Context padding as a fraction of `w + h`.
    pub context_amount: f32,
    pub penalty_k: f32,
    pub window_influence: f32,
    pub lr: f32,
    pub use_classifier: bool,
    /// Enables the short-term template. Only effective with `use_classifier`.
    pub template_update: bool,
    /// Blend weight of the classifier confidence map.
    pub coee_class: f32,
    pub target_update_threshold: f32,
    pub target_update_skipping: u32,
    pub short_term_drift: bool,
    pub tau_regression: f32,
    pub tau_classification: f32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            stride: 8,
            ratios: vec![0.33, 0.5, 1.0, 2.0, 3.0],
            scales: vec![8.0],
            exemplar_size: 127,
            instance_size: 255,
            base_size: 8,
            context_amount: 0.5,
            penalty_k: 0.04,
            window_influence: 0.44,
            lr: 0.4,
            use_classifier: false,
            template_update: false,
            coee_class: 0.8,
            target_update_threshold: 0.6,
            target_update_skipping: 5,
            short_term_drift: false,
            tau_regression: 0.8,
            tau_classification: 0.5,
        }
    }
}

impl TrackerConfig {
    /// Parse a YAML document. Missing keys take their default value.
    pub fn from_yaml_str(contents: &str) -> Result<Self, TrackError> {
        let config: TrackerConfig =
            serde_yaml::from_str(contents).map_err(|e| TrackError::ConfigLoad(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, TrackError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| TrackError::ConfigLoad(format!("{}: {}", path.display(), e)))?;
        Self::from_yaml_str(&contents)
    }

    /// Side length of the square score grid.
    pub fn score_size(&self) -> usize {
        let diff = self.instance_size.saturating_sub(self.exemplar_size);
        (diff / self.stride.max(1) + 1 + self.base_size) as usize
    }

    /// Number of anchor variants per grid cell.
    pub fn anchor_num(&self) -> usize {
        self.ratios.len() * self.scales.len()
    }

    /// True when the classifier-gated short-term template path is active.
    pub fn short_term_enabled(&self) -> bool {
        self.use_classifier && self.template_update
    }

    pub fn validate(&self) -> Result<(), TrackError> {
        let fail = |msg: &str| Err(TrackError::Configuration(msg.to_string()));

        if self.stride == 0 {
            return fail("stride must be positive");
        }
        if self.ratios.is_empty() || self.scales.is_empty() {
            return fail("anchor ratios and scales must not be empty");
        }
        if self.ratios.iter().chain(&self.scales).any(|v| !v.is_finite() || *v <= 0.0) {
            return fail("anchor ratios and scales must be positive");
        }
        if self.exemplar_size == 0 || self.instance_size < self.exemplar_size {
            return fail("instance_size must be at least exemplar_size > 0");
        }
        if self.context_amount < 0.0 {
            return fail("context_amount must not be negative");
        }
        for (name, value) in [
            ("window_influence", self.window_influence),
            ("coee_class", self.coee_class),
            ("lr", self.lr),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(TrackError::Configuration(format!(
                    "{name} must lie in [0, 1], got {value}"
                )));
            }
        }
        if self.short_term_enabled() && self.target_update_skipping == 0 {
            return fail("target_update_skipping must be positive when template_update is on");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_score_size() {
        let config = TrackerConfig::default();
        assert_eq!(config.score_size(), 25);
        assert_eq!(config.anchor_num(), 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_yaml_partial_override() {
        let config = TrackerConfig::from_yaml_str(
            "use_classifier: true\ntemplate_update: true\ntarget_update_skipping: 3\n",
        )
        .unwrap();
        assert!(config.short_term_enabled());
        assert_eq!(config.target_update_skipping, 3);
        assert_eq!(config.stride, 8);
    }

    #[test]
    fn test_rejects_empty_ratios() {
        let config = TrackerConfig {
            ratios: vec![],
            ..TrackerConfig::default()
        };
        assert!(matches!(config.validate(), Err(TrackError::Configuration(_))));
    }

    #[test]
    fn test_rejects_zero_skipping_only_when_refresh_active() {
        let mut config = TrackerConfig {
            target_update_skipping: 0,
            template_update: true,
            ..TrackerConfig::default()
        };
        assert!(config.validate().is_ok());

        config.use_classifier = true;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_yaml() {
        let err = TrackerConfig::from_yaml_str("stride: [1, 2]").unwrap_err();
        assert!(matches!(err, TrackError::ConfigLoad(_)));
    }
}
