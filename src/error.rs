use thiserror::Error;

/// Errors surfaced by the tracker and its collaborator adapters.
///
/// Every variant is fatal for the session it occurs in; degenerate geometry
/// is clamped locally and never reported.
#[derive(Debug, Clone, Error)]
pub enum TrackError {
    #[error("invalid configuration: {0}")]
    Configuration(String),
    #[error("{what} shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        what: &'static str,
        expected: Vec<usize>,
        got: Vec<usize>,
    },
    #[error("invalid initial box: {0}")]
    InvalidBox(String),
    #[error("track() called before init()")]
    NotInitialized,
    #[error("evaluator failed: {0}")]
    Evaluator(String),
    #[error("failed to load config: {0}")]
    ConfigLoad(String),
}
