//! SiamRPN tracking loop with classifier-assisted re-detection.

use nalgebra::Vector2;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::TrackError;
use crate::integration::{
    AppearanceClassifier, ClassifierFlag, Evaluator, Frame, HeadOutput, NullClassifier,
};
use crate::tracker::anchor::AnchorGrid;
use crate::tracker::box_codec::{decode_boxes, decode_scores};
use crate::tracker::config::TrackerConfig;
use crate::tracker::rect::{Rect, clip_center_box};
use crate::tracker::score_fusion::{Candidate, CandidateBatch, ScoreFusion, normalize_confidence};
use crate::tracker::target_state::TargetState;
use crate::tracker::template::TemplateManager;
use crate::tracker::track_state::TrackState;

/// Consecutive `not_found` frames after which drift recovery engages.
const DRIFT_LOST_FRAMES: u32 = 8;
/// Offset divisor applied while drift recovery is engaged.
const DRIFT_STEP_DIVISOR: f32 = 4.0;

/// Result of one tracked frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrackOutput {
    pub bbox: Rect,
    pub best_score: f32,
    /// Present only when the appearance classifier is active.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flag: Option<ClassifierFlag>,
}

struct Session<C> {
    target: TargetState,
    templates: TemplateManager<C>,
}

/// Candidate resolved into image space.
#[derive(Debug, Clone, Copy)]
struct Placement {
    cx: f32,
    cy: f32,
    width: f32,
    height: f32,
    score: f32,
}

impl Placement {
    fn rect(&self) -> Rect {
        Rect::from_center(self.cx, self.cy, self.width, self.height)
    }
}

pub struct SiamRpnTracker<E: Evaluator, C = NullClassifier> {
    config: TrackerConfig,
    anchors: AnchorGrid,
    fusion: ScoreFusion,
    evaluator: E,
    classifier: Option<C>,
    session: Option<Session<E::Crop>>,
}

impl<E: Evaluator> SiamRpnTracker<E, NullClassifier> {
    /// Tracker without an appearance classifier.
    pub fn new(config: TrackerConfig, evaluator: E) -> Result<Self, TrackError> {
        if config.use_classifier {
            return Err(TrackError::Configuration(
                "use_classifier is set but no classifier was supplied".to_string(),
            ));
        }
        Self::with_classifier(config, evaluator, NullClassifier)
    }
}

impl<E, C> SiamRpnTracker<E, C>
where
    E: Evaluator,
    C: AppearanceClassifier<E::Crop>,
{
    /// Build a tracker; the classifier is only kept when `use_classifier` is on.
    pub fn with_classifier(
        config: TrackerConfig,
        evaluator: E,
        classifier: C,
    ) -> Result<Self, TrackError> {
        config.validate()?;
        let anchors = AnchorGrid::new(&config)?;
        let fusion = ScoreFusion::new(&config, &anchors);
        let classifier = config.use_classifier.then_some(classifier);

        Ok(Self {
            config,
            anchors,
            fusion,
            evaluator,
            classifier,
            session: None,
        })
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn anchors(&self) -> &AnchorGrid {
        &self.anchors
    }

    pub fn evaluator(&self) -> &E {
        &self.evaluator
    }

    pub fn classifier(&self) -> Option<&C> {
        self.classifier.as_ref()
    }

    pub fn state(&self) -> TrackState {
        if self.session.is_some() {
            TrackState::Tracking
        } else {
            TrackState::Uninitialized
        }
    }

    pub fn target(&self) -> Option<&TargetState> {
        self.session.as_ref().map(|s| &s.target)
    }

    pub fn templates(&self) -> Option<&TemplateManager<E::Crop>> {
        self.session.as_ref().map(|s| &s.templates)
    }

    /// Start a session on `frame` with the target at `bbox` (TLWH).
    ///
    /// Calling it again restarts the session.
    pub fn init<F>(&mut self, frame: &F, bbox: Rect) -> Result<(), TrackError>
    where
        F: Frame<Crop = E::Crop>,
    {
        if !(bbox.width.is_finite() && bbox.height.is_finite())
            || bbox.width <= 0.0
            || bbox.height <= 0.0
        {
            return Err(TrackError::InvalidBox(format!(
                "{}x{} box at ({}, {})",
                bbox.width, bbox.height, bbox.x, bbox.y
            )));
        }

        let target = TargetState::from_init_box(&bbox, frame.channel_average());
        let s_z = target.context_size(self.config.context_amount).round();
        let z_crop = frame.subwindow(
            target.center,
            self.config.exemplar_size,
            s_z,
            target.channel_average,
        );

        self.evaluator.encode_template(&z_crop).map_err(evaluator_error)?;

        if let Some(classifier) = self.classifier.as_mut() {
            if self.config.template_update {
                self.evaluator
                    .encode_short_term_template(&z_crop)
                    .map_err(evaluator_error)?;
            }

            let s_xx = s_z * (self.config.instance_size * 2) as f32 / self.config.exemplar_size as f32;
            let x_crop = frame.subwindow(
                target.center,
                self.config.instance_size * 2,
                s_xx.round(),
                target.channel_average,
            );
            classifier.initialize(&x_crop, bbox);
        }

        info!(
            x = bbox.x,
            y = bbox.y,
            width = bbox.width,
            height = bbox.height,
            classifier = self.classifier.is_some(),
            "Tracking session initialized"
        );

        self.session = Some(Session {
            templates: TemplateManager::new(z_crop, &self.config),
            target,
        });
        Ok(())
    }

    /// Advance the session by one frame.
    pub fn track<F>(&mut self, frame: &F) -> Result<TrackOutput, TrackError>
    where
        F: Frame<Crop = E::Crop>,
    {
        let config = &self.config;
        let Session { target, templates } =
            self.session.as_mut().ok_or(TrackError::NotInitialized)?;
        target.advance_frame();

        let s_z = target.context_size(config.context_amount);
        let scale_z = config.exemplar_size as f32 / s_z;
        let s_x = s_z * config.instance_size as f32 / config.exemplar_size as f32;
        let x_crop = frame.subwindow(
            target.center,
            config.instance_size,
            s_x.round(),
            target.channel_average,
        );

        let output = self.evaluator.evaluate(&x_crop).map_err(evaluator_error)?;
        let prior = (target.size.x, target.size.y);
        let mut long_term = candidates(&self.anchors, &self.fusion, &output.long_term, prior, scale_z)?;

        let short_term_active = self.classifier.is_some() && config.template_update;
        let mut short_term = match (short_term_active, output.short_term.as_ref()) {
            (true, Some(head)) => Some(candidates(&self.anchors, &self.fusion, head, prior, scale_z)?),
            (true, None) => {
                return Err(TrackError::ShapeMismatch {
                    what: "short-term head output",
                    expected: vec![2 * self.anchors.len(), 4 * self.anchors.len()],
                    got: vec![],
                });
            }
            (false, _) => None,
        };

        let classified = match self.classifier.as_mut() {
            Some(classifier) => {
                let result = classifier.track();
                target.record_lost(result.flag == ClassifierFlag::NotFound);

                let confidence = normalize_confidence(&result.confidence, self.anchors.score_size());
                self.fusion.fuse_confidence(&mut long_term, &confidence);
                if let Some(batch) = short_term.as_mut() {
                    self.fusion.fuse_confidence(batch, &confidence);
                }
                Some(result)
            }
            None => None,
        };

        let drift = self.classifier.is_some()
            && config.short_term_drift
            && target.lost_count >= DRIFT_LOST_FRAMES;
        if drift && target.lost_count == DRIFT_LOST_FRAMES {
            warn!(frame = target.frame_num, "Target lost, damping motion until re-detected");
        }

        let boundary = frame.dims();
        let mut chosen = place(&self.fusion.select(&long_term), target, scale_z, drift, boundary);

        if let Some(batch) = short_term.as_ref() {
            let alternative = place(&self.fusion.select(batch), target, scale_z, drift, boundary);
            let iou = alternative.rect().iou(&chosen.rect());
            if iou >= config.tau_regression
                && alternative.score - chosen.score >= config.tau_classification
            {
                debug!(
                    frame = target.frame_num,
                    iou,
                    long_term = chosen.score,
                    short_term = alternative.score,
                    "Short-term template overrides long-term prediction"
                );
                chosen = alternative;
            }
        }

        target.center = Vector2::new(chosen.cx, chosen.cy);
        target.size = Vector2::new(chosen.width, chosen.height);
        let bbox = chosen.rect();

        if let (Some(classifier), Some(result)) = (self.classifier.as_mut(), classified.as_ref()) {
            classifier.update(bbox, scale_z, result.flag);

            if config.template_update {
                let max_confidence = result.max_confidence();
                if templates.is_refresh_candidate(max_confidence, result.flag) {
                    target.channel_average = frame.channel_average();
                    let z_crop = frame.subwindow(
                        target.center,
                        config.exemplar_size,
                        s_z,
                        target.channel_average,
                    );
                    templates.record_candidate(z_crop, max_confidence);
                }

                if templates.due_for_commit(target.frame_num) {
                    let crop = templates.commit();
                    self.evaluator
                        .encode_short_term_template(crop)
                        .map_err(evaluator_error)?;
                    info!(
                        frame = target.frame_num,
                        commits = templates.commits(),
                        "Short-term template refreshed"
                    );
                }
            }
        }

        debug!(
            frame = target.frame_num,
            score = chosen.score,
            lost = target.lost_count,
            cx = chosen.cx,
            cy = chosen.cy,
            "Frame tracked"
        );

        Ok(TrackOutput {
            bbox,
            best_score: chosen.score,
            flag: classified.map(|r| r.flag),
        })
    }
}

fn evaluator_error<D: std::fmt::Display>(err: D) -> TrackError {
    TrackError::Evaluator(err.to_string())
}

fn candidates(
    anchors: &AnchorGrid,
    fusion: &ScoreFusion,
    head: &HeadOutput,
    prior: (f32, f32),
    scale_z: f32,
) -> Result<CandidateBatch, TrackError> {
    if !head.cls.iter().chain(head.loc.iter()).all(|v| v.is_finite()) {
        return Err(TrackError::Evaluator(
            "head output contains non-finite values".to_string(),
        ));
    }
    let scores = decode_scores(&head.cls, anchors)?;
    let boxes = decode_boxes(&head.loc, anchors)?;
    Ok(fusion.penalize(boxes, scores, prior, scale_z))
}

/// Map a crop-space candidate back to the image, smooth its size and clip.
fn place(
    candidate: &Candidate,
    target: &TargetState,
    scale_z: f32,
    drift: bool,
    boundary: (usize, usize),
) -> Placement {
    let [dx, dy, w, h] = candidate.bbox.map(|v| v / scale_z);
    let step = if drift { DRIFT_STEP_DIVISOR } else { 1.0 };
    let lr = candidate.lr;

    let (cx, cy, width, height) = clip_center_box(
        dx / step + target.center.x,
        dy / step + target.center.y,
        target.size.x * (1.0 - lr) + w * lr,
        target.size.y * (1.0 - lr) + h * lr,
        boundary,
    );
    Placement {
        cx,
        cy,
        width,
        height,
        score: candidate.score,
    }
}
