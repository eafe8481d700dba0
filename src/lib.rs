//! Online decision loop of a SiamRPN++ style single-object tracker.
//!
//! The [`tracker`] module holds the core: anchor generation, box decoding,
//! penalty and classifier score fusion, the template refresh policy and the
//! per-frame state machine. The [`integration`] module defines the
//! collaborators it drives (evaluator network, appearance classifier,
//! frames) and adapters for them.

pub mod error;
pub mod integration;
pub mod tracker;

pub use error::TrackError;
pub use integration::{
    AppearanceClassifier, ClassifierFlag, ClassifierResult, Evaluator, EvaluatorOutput, Frame,
    FusionMode, HeadOutput, ImageFrame, NullClassifier, TrackerPipeline,
};
pub use tracker::{Rect, SiamRpnTracker, TrackOutput, TrackState, TrackerConfig};
