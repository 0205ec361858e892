//! # trackcount-rs
//!
//! Multi-object tracking and unique-object counting for video streams.
//!
//! Given per-frame candidate detections (bounding boxes + confidence) and the
//! frame image, the crate suppresses redundant detections, extracts an
//! appearance signature per surviving box, associates detections to persistent
//! track identities using motion gating plus appearance similarity, manages
//! each identity's tentative/confirmed/deleted lifecycle, and counts each
//! physical object exactly once per video.
//!
//! ## Example
//!
//! ```ignore
//! use trackcount_rs::{DeepSortTracker, Detection, TrackerConfig};
//!
//! let mut tracker = DeepSortTracker::new(TrackerConfig::default())?;
//! // Per frame: advance motion state, then feed associated detections.
//! tracker.predict();
//! let active = tracker.update(&detections);
//! ```
//!
//! The object detector and the appearance-embedding model are external
//! collaborators consumed through the narrow traits in [`integration`]:
//! [`DetectionSource`] and [`AppearanceModel`].

pub mod counting;
pub mod integration;
pub mod tracker;

pub use counting::{BatchSummary, IdentityCounter, VideoOutcome};
pub use integration::{
    AppearanceExtractor, AppearanceModel, CropResult, DetectionBuilder, DetectionSource,
    FrameView, PipelineConfig, RawDetection, VideoPipeline, VideoReport, VideoSource,
};
pub use tracker::{
    ActiveTrack, DeepSortTracker, Detection, Rect, Track, TrackState, TrackerConfig,
};

pub use crate::error::{Error, Result};

mod error {
    use thiserror::Error;

    /// Errors surfaced by the tracking and counting engine.
    #[derive(Error, Debug)]
    pub enum Error {
        #[error("invalid configuration: {0}")]
        InvalidConfig(String),

        #[error("invalid detection: {0}")]
        InvalidDetection(String),

        #[error("appearance extraction failed: {0}")]
        ExtractionError(String),

        #[error("video source failed: {0}")]
        SourceError(String),

        #[error("io error: {0}")]
        IoError(#[from] std::io::Error),

        #[error("serialization error: {0}")]
        SerializeError(#[from] serde_json::Error),
    }

    /// Result type for trackcount operations.
    pub type Result<T> = std::result::Result<T, Error>;
}
