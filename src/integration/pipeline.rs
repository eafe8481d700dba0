//! TrackerPipeline for running a tracker over a frame sequence.

use crate::error::TrackError;
use crate::tracker::{Rect, SiamRpnTracker, TrackOutput};

use super::{AppearanceClassifier, Evaluator, Frame};

/// Drives a [`SiamRpnTracker`] over a video.
///
/// The first frame initializes the session on the given box; every later
/// frame is tracked.
pub struct TrackerPipeline<E: Evaluator, C> {
    tracker: SiamRpnTracker<E, C>,
    init_box: Rect,
    frames_seen: u64,
}

impl<E, C> TrackerPipeline<E, C>
where
    E: Evaluator,
    C: AppearanceClassifier<E::Crop>,
{
    pub fn new(tracker: SiamRpnTracker<E, C>, init_box: Rect) -> Self {
        Self {
            tracker,
            init_box,
            frames_seen: 0,
        }
    }

    /// Process a single frame.
    ///
    /// On the first frame the output is the initial box with score 1.
    pub fn process_frame<F>(&mut self, frame: &F) -> Result<TrackOutput, TrackError>
    where
        F: Frame<Crop = E::Crop>,
    {
        self.frames_seen += 1;
        if self.frames_seen == 1 {
            self.tracker.init(frame, self.init_box)?;
            return Ok(TrackOutput {
                bbox: self.init_box,
                best_score: 1.0,
                flag: None,
            });
        }
        self.tracker.track(frame)
    }

    /// Process every frame in order, stopping at the first error.
    pub fn run<F, I>(&mut self, frames: I) -> Result<Vec<TrackOutput>, TrackError>
    where
        F: Frame<Crop = E::Crop>,
        I: IntoIterator<Item = F>,
    {
        frames
            .into_iter()
            .map(|frame| self.process_frame(&frame))
            .collect()
    }

    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }

    /// Get a reference to the underlying tracker.
    pub fn tracker(&self) -> &SiamRpnTracker<E, C> {
        &self.tracker
    }

    /// Get a mutable reference to the underlying tracker.
    pub fn tracker_mut(&mut self) -> &mut SiamRpnTracker<E, C> {
        &mut self.tracker
    }
}
