/// Lifecycle of a single-object tracking session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackState {
    /// No target yet; `init` must be called first
    #[default]
    Uninitialized,
    /// Following a target frame by frame
    Tracking,
}
