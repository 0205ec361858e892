//! Integration module connecting external detectors and appearance models
//! to the tracking and counting core.
//!
//! The detector and the embedding network are black boxes behind the
//! [`DetectionSource`] and [`AppearanceModel`] traits; the pipeline and
//! batch runner own the per-frame and per-video control flow.

mod appearance;
mod batch;
mod builder;
mod detector;
mod pipeline;

pub use appearance::{AppearanceExtractor, AppearanceModel, CropResult, FrameView};
pub use batch::{BatchConfig, BatchJob, Frame, VideoSource, run_batch};
pub use builder::DetectionBuilder;
pub use detector::{DetectionSource, IntoCandidates, RawDetection};
pub use pipeline::{PipelineConfig, VideoPipeline, VideoReport};
