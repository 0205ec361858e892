//! Batch processing of independent videos on worker threads.

use rayon::prelude::*;
use tracing::{info, warn};

use crate::counting::{BatchSummary, VideoOutcome};
use crate::error::Result;
use crate::integration::appearance::{AppearanceModel, FrameView};
use crate::integration::detector::DetectionSource;
use crate::integration::pipeline::{PipelineConfig, VideoPipeline};

/// One decoded frame with owned pixels, as handed over by a video source.
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl Frame {
    pub fn view(&self) -> FrameView<'_> {
        FrameView::new(&self.data, self.width, self.height)
    }
}

/// Pull-based frame feed for one video. Decoding is external; the runner
/// only consumes frames until the source reports end of stream or fails.
pub trait VideoSource {
    type Error: std::fmt::Display;

    /// Next frame, or `Ok(None)` at end of stream.
    fn next_frame(&mut self) -> std::result::Result<Option<Frame>, Self::Error>;
}

/// One unit of batch work: a video identifier plus its frame source.
pub struct BatchJob<S> {
    pub video_id: String,
    pub source: S,
}

impl<S> BatchJob<S> {
    pub fn new(video_id: impl Into<String>, source: S) -> Self {
        Self {
            video_id: video_id.into(),
            source,
        }
    }
}

/// Batch-level configuration.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub pipeline: PipelineConfig,
    /// Process every Nth input frame. The tracker itself is stride-agnostic;
    /// each processed frame is one logical step.
    pub frame_stride: u32,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            frame_stride: 5,
        }
    }
}

impl BatchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.frame_stride == 0 {
            return Err(crate::error::Error::InvalidConfig(
                "frame_stride must be at least 1".into(),
            ));
        }
        self.pipeline.validate()
    }
}

/// Process a batch of independent videos in parallel.
///
/// Every job owns an isolated tracker, identity counter and detector;
/// only the appearance model is shared, read-only. A job that fails
/// mid-video reports its partial count with the failure indicator set and
/// leaves the other jobs untouched.
pub fn run_batch<S, D, M, FD>(
    jobs: Vec<BatchJob<S>>,
    make_detector: FD,
    model: &M,
    config: &BatchConfig,
) -> Result<BatchSummary>
where
    S: VideoSource + Send,
    D: DetectionSource,
    D::Error: std::fmt::Display,
    M: AppearanceModel + Sync,
    FD: Fn(&str) -> D + Sync,
{
    config.validate()?;

    let outcomes: Vec<(String, VideoOutcome)> = jobs
        .into_par_iter()
        .map(|job| {
            info!(video = %job.video_id, "processing video");
            let detector = make_detector(&job.video_id);
            let outcome = run_job(job.source, detector, model, config);
            if let Some(err) = &outcome.error {
                warn!(video = %job.video_id, %err, "video aborted with partial count");
            } else {
                info!(
                    video = %job.video_id,
                    unique_count = outcome.count,
                    frames = outcome.frames_processed,
                    "video complete"
                );
            }
            (job.video_id, outcome)
        })
        .collect();

    let mut summary = BatchSummary::new();
    for (video_id, outcome) in outcomes {
        summary.record(video_id, outcome);
    }
    Ok(summary)
}

fn run_job<S, D, M>(mut source: S, detector: D, model: &M, config: &BatchConfig) -> VideoOutcome
where
    S: VideoSource,
    D: DetectionSource,
    D::Error: std::fmt::Display,
    M: AppearanceModel,
{
    let mut pipeline = match VideoPipeline::new(detector, model, config.pipeline.clone()) {
        Ok(pipeline) => pipeline,
        Err(err) => {
            return VideoOutcome {
                count: 0,
                frames_processed: 0,
                error: Some(err.to_string()),
            };
        }
    };

    let mut frame_index: u64 = 0;

    loop {
        match source.next_frame() {
            Ok(Some(frame)) => {
                frame_index += 1;
                if frame_index % config.frame_stride as u64 != 0 {
                    continue;
                }
                if let Err(err) = pipeline.process_frame(&frame.view()) {
                    return failed(&pipeline, err);
                }
            }
            Ok(None) => break,
            Err(err) => return failed(&pipeline, err),
        }
    }

    let report = pipeline.finish();
    VideoOutcome {
        count: report.unique_count,
        frames_processed: report.frames_processed,
        error: None,
    }
}

fn failed<D, M>(pipeline: &VideoPipeline<D, M>, err: impl std::fmt::Display) -> VideoOutcome
where
    D: DetectionSource,
    M: AppearanceModel,
{
    let report = pipeline.report();
    VideoOutcome {
        count: report.unique_count,
        frames_processed: report.frames_processed,
        error: Some(err.to_string()),
    }
}
