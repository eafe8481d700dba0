//! Contract of the online appearance classifier used for re-detection.

use std::fmt;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::tracker::Rect;

/// Verdict of the appearance classifier for the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierFlag {
    Normal,
    NotFound,
    HardNegative,
    Uncertain,
}

impl ClassifierFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::NotFound => "not_found",
            Self::HardNegative => "hard_negative",
            Self::Uncertain => "uncertain",
        }
    }
}

impl fmt::Display for ClassifierFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Flag plus dense confidence over the search region. Consumed once.
#[derive(Debug, Clone)]
pub struct ClassifierResult {
    pub flag: ClassifierFlag,
    pub confidence: Array2<f32>,
}

impl ClassifierResult {
    /// Peak confidence, or zero for an empty map.
    pub fn max_confidence(&self) -> f32 {
        self.confidence
            .iter()
            .copied()
            .fold(None, |m: Option<f32>, v| Some(m.map_or(v, |m| m.max(v))))
            .unwrap_or(0.0)
    }
}

/// Trait for online appearance classifiers.
///
/// The classifier reads the current search features from wherever the
/// evaluator left them; `track` therefore takes no input.
pub trait AppearanceClassifier<Crop> {
    fn initialize(&mut self, search: &Crop, init_box: Rect);

    fn track(&mut self) -> ClassifierResult;

    /// Feed back the committed box, the crop scale of this frame and the
    /// flag reported by `track`.
    fn update(&mut self, bbox: Rect, scale: f32, flag: ClassifierFlag);
}

/// Classifier slot of a tracker running without re-detection.
///
/// Never consulted: the tracker only calls a classifier when built with
/// `use_classifier`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullClassifier;

impl<Crop> AppearanceClassifier<Crop> for NullClassifier {
    fn initialize(&mut self, _search: &Crop, _init_box: Rect) {}

    fn track(&mut self) -> ClassifierResult {
        ClassifierResult {
            flag: ClassifierFlag::Normal,
            confidence: Array2::zeros((0, 0)),
        }
    }

    fn update(&mut self, _bbox: Rect, _scale: f32, _flag: ClassifierFlag) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_strings() {
        assert_eq!(ClassifierFlag::NotFound.to_string(), "not_found");
        assert_eq!(ClassifierFlag::HardNegative.as_str(), "hard_negative");
    }

    #[test]
    fn test_max_confidence() {
        let result = ClassifierResult {
            flag: ClassifierFlag::Normal,
            confidence: Array2::from_shape_vec((2, 2), vec![-1.0, 0.2, 0.9, 0.1]).unwrap(),
        };
        assert_eq!(result.max_confidence(), 0.9);

        let mut null = NullClassifier;
        let empty = AppearanceClassifier::<()>::track(&mut null);
        assert_eq!(empty.max_confidence(), 0.0);
    }
}
