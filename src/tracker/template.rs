//! Long-term / short-term template bookkeeping and refresh cadence.

use crate::integration::ClassifierFlag;
use crate::tracker::config::TrackerConfig;

/// Owns the template crops of one session.
///
/// The long-term crop is fixed at init. The short-term slot is replaced
/// wholesale on commit frames with the best refresh candidate seen since the
/// previous commit.
#[derive(Debug, Clone)]
pub struct TemplateManager<C> {
    long_term: C,
    short_term: C,
    candidate: C,
    temp_max: f32,
    threshold: f32,
    skipping: u32,
    commits: u32,
}

impl<C: Clone> TemplateManager<C> {
    pub fn new(long_term: C, config: &TrackerConfig) -> Self {
        Self {
            short_term: long_term.clone(),
            candidate: long_term.clone(),
            long_term,
            temp_max: 0.0,
            threshold: config.target_update_threshold,
            skipping: config.target_update_skipping.max(1),
            commits: 0,
        }
    }

    pub fn long_term(&self) -> &C {
        &self.long_term
    }

    pub fn short_term(&self) -> &C {
        &self.short_term
    }

    /// Best classifier confidence seen since the last commit.
    pub fn temp_max(&self) -> f32 {
        self.temp_max
    }

    pub fn commits(&self) -> u32 {
        self.commits
    }

    /// Whether a frame with this classifier outcome should become the next
    /// refresh candidate.
    pub fn is_refresh_candidate(&self, max_confidence: f32, flag: ClassifierFlag) -> bool {
        max_confidence >= self.threshold
            && flag != ClassifierFlag::HardNegative
            && max_confidence > self.temp_max
    }

    pub fn record_candidate(&mut self, crop: C, max_confidence: f32) {
        self.candidate = crop;
        self.temp_max = max_confidence;
    }

    /// Commit frames satisfy `(frame_num - 1) % skipping == 0`.
    pub fn due_for_commit(&self, frame_num: u32) -> bool {
        frame_num.saturating_sub(1) % self.skipping == 0
    }

    /// Promote the candidate to the short-term slot and reset `temp_max`.
    /// Returns the crop the evaluator must re-encode.
    pub fn commit(&mut self) -> &C {
        self.short_term = self.candidate.clone();
        self.temp_max = 0.0;
        self.commits += 1;
        &self.short_term
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> TemplateManager<&'static str> {
        let config = TrackerConfig {
            target_update_threshold: 0.6,
            target_update_skipping: 5,
            ..TrackerConfig::default()
        };
        TemplateManager::new("init", &config)
    }

    #[test]
    fn test_candidate_rules() {
        let mut templates = manager();
        assert!(!templates.is_refresh_candidate(0.5, ClassifierFlag::Normal));
        assert!(!templates.is_refresh_candidate(0.9, ClassifierFlag::HardNegative));
        assert!(templates.is_refresh_candidate(0.7, ClassifierFlag::Uncertain));

        templates.record_candidate("a", 0.7);
        assert!(!templates.is_refresh_candidate(0.65, ClassifierFlag::Normal));
        assert!(templates.is_refresh_candidate(0.8, ClassifierFlag::Normal));
    }

    #[test]
    fn test_cadence() {
        let templates = manager();
        let due: Vec<u32> = (1..=16).filter(|&f| templates.due_for_commit(f)).collect();
        assert_eq!(due, vec![1, 6, 11, 16]);
    }

    #[test]
    fn test_commit_promotes_candidate() {
        let mut templates = manager();
        templates.record_candidate("fresh", 0.9);
        assert_eq!(*templates.commit(), "fresh");
        assert_eq!(templates.temp_max(), 0.0);
        assert_eq!(*templates.long_term(), "init");
        assert_eq!(*templates.short_term(), "fresh");
        assert_eq!(templates.commits(), 1);

        // without a new candidate the previous crop is re-committed
        assert_eq!(*templates.commit(), "fresh");
    }
}
