mod deep_sort;
mod kalman_filter;
mod matching;
mod nms;
mod rect;
mod track;
mod track_state;

pub use deep_sort::{ActiveTrack, DeepSortTracker, TrackerConfig};
pub use matching::{AssignmentResult, Detection};
pub use nms::non_max_suppression;
pub use rect::Rect;
pub use track::Track;
pub use track_state::TrackState;
