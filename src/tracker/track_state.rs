/// Track state enumeration for the identity lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackState {
    /// Newly spawned track, not yet backed by enough consecutive hits
    #[default]
    Tentative,
    /// Established identity, counted while recently updated
    Confirmed,
    /// Dead track, pruned at the end of the frame
    Deleted,
}
