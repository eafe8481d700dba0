mod anchor;
mod box_codec;
mod config;
mod rect;
mod score_fusion;
mod siamrpn_tracker;
mod target_state;
mod template;
mod track_state;

pub use anchor::{Anchor, AnchorGrid, base_anchors, generate as generate_anchors};
pub use box_codec::{decode_boxes, decode_scores};
pub use config::TrackerConfig;
pub use rect::{MIN_BOX_SIDE, Rect, clip_center_box};
pub use score_fusion::{
    Candidate, CandidateBatch, ScoreFusion, hanning, normalize_confidence, scale_change,
    size_penalty,
};
pub use siamrpn_tracker::{SiamRpnTracker, TrackOutput};
pub use target_state::TargetState;
pub use template::TemplateManager;
pub use track_state::TrackState;
