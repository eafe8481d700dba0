//! Collaborator contracts and adapters around the tracking core.
//!
//! This module defines the traits the tracker drives every frame (the
//! Siamese evaluator, the appearance classifier and video frames) plus
//! ready-made pieces: an ndarray frame, feature-layer fusion and a
//! sequence pipeline. The Burn backend is behind `burn-backend`.

mod classifier;
mod evaluator;
mod frame;
mod fusion;
mod pipeline;

pub use classifier::{AppearanceClassifier, ClassifierFlag, ClassifierResult, NullClassifier};
pub use evaluator::{Evaluator, EvaluatorOutput, HeadOutput};
pub use frame::{Frame, ImageFrame};
pub use fusion::FusionMode;
pub use pipeline::TrackerPipeline;

#[cfg(feature = "burn-backend")]
mod burn_backend;

#[cfg(feature = "burn-backend")]
pub use burn_backend::{BurnEvaluator, BurnEvaluatorError, SiameseModel};
