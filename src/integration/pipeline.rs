//! Per-video pipeline: NMS, appearance extraction, tracking, counting.

use tracing::debug;

use crate::counting::IdentityCounter;
use crate::error::Result;
use crate::integration::appearance::{AppearanceExtractor, AppearanceModel, CropResult, FrameView};
use crate::integration::detector::{DetectionSource, RawDetection};
use crate::tracker::{ActiveTrack, DeepSortTracker, Detection, TrackerConfig, non_max_suppression};

/// Configuration for the per-video pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// IoU above which a lower-confidence detection is suppressed
    pub nms_iou_threshold: f32,
    pub tracker: TrackerConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            nms_iou_threshold: 0.7,
            tracker: TrackerConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.nms_iou_threshold) || !self.nms_iou_threshold.is_finite() {
            return Err(crate::error::Error::InvalidConfig(format!(
                "nms_iou_threshold must be within [0, 1], got {}",
                self.nms_iou_threshold
            )));
        }
        self.tracker.validate()
    }
}

/// End-of-video result: the unique count and how many logical steps fed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoReport {
    pub unique_count: u64,
    pub frames_processed: u64,
}

/// Processes one video: each call to [`VideoPipeline::process_frame`] is one
/// logical time step (frame-sampling stride is the caller's concern).
///
/// Owns an isolated tracker and identity counter, so independent videos can
/// run concurrently with no shared mutable state; the appearance model may
/// be shared read-only across pipelines.
pub struct VideoPipeline<D: DetectionSource, M: AppearanceModel> {
    detector: D,
    extractor: AppearanceExtractor<M>,
    tracker: DeepSortTracker,
    counter: IdentityCounter,
    config: PipelineConfig,
    frames_processed: u64,
}

impl<D: DetectionSource, M: AppearanceModel> VideoPipeline<D, M> {
    pub fn new(detector: D, model: M, config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let tracker = DeepSortTracker::new(config.tracker.clone())?;
        Ok(Self {
            detector,
            extractor: AppearanceExtractor::new(model),
            tracker,
            counter: IdentityCounter::new(),
            config,
            frames_processed: 0,
        })
    }

    /// Run detection on the frame, then advance the tracker one step.
    ///
    /// Detector failures propagate; appearance failures degrade (the frame
    /// is still tracked on motion alone).
    pub fn process_frame(&mut self, frame: &FrameView<'_>) -> std::result::Result<Vec<ActiveTrack>, D::Error> {
        let candidates = self.detector.detect(frame)?;
        Ok(self.process_detections(frame, &candidates))
    }

    /// Advance one step with externally supplied detections.
    pub fn process_detections(
        &mut self,
        frame: &FrameView<'_>,
        candidates: &[RawDetection],
    ) -> Vec<ActiveTrack> {
        self.frames_processed += 1;

        let detections = self.build_detections(frame, candidates);

        // Predict runs every frame for every live track; an empty detection
        // list still ages and eventually deletes unobserved tracks.
        self.tracker.predict();
        let active = self.tracker.update(&detections);

        self.counter.observe(&active);
        active
    }

    /// NMS, then appearance extraction on the survivors. Degenerate crops
    /// drop their detection entirely.
    fn build_detections(
        &self,
        frame: &FrameView<'_>,
        candidates: &[RawDetection],
    ) -> Vec<Detection> {
        if candidates.is_empty() {
            return vec![];
        }

        let boxes: Vec<_> = candidates.iter().map(|c| c.bbox).collect();
        let confidences: Vec<_> = candidates.iter().map(|c| c.confidence).collect();
        let keep = non_max_suppression(&boxes, &confidences, self.config.nms_iou_threshold);

        let mut detections = Vec::with_capacity(keep.len());
        for idx in keep {
            let candidate = &candidates[idx];
            match self.extractor.extract(frame, candidate.bbox) {
                CropResult::Degenerate => {
                    debug!(?candidate.bbox, "dropping degenerate crop");
                }
                CropResult::Unavailable => {
                    detections.push(Detection::new(candidate.bbox, candidate.confidence));
                }
                CropResult::Embedded(feature) => {
                    detections.push(Detection::with_feature(
                        candidate.bbox,
                        candidate.confidence,
                        feature,
                    ));
                }
            }
        }
        detections
    }

    /// Current count and step total; valid at any point in the stream.
    pub fn report(&self) -> VideoReport {
        VideoReport {
            unique_count: self.counter.count() as u64,
            frames_processed: self.frames_processed,
        }
    }

    /// Consume the pipeline at end of stream.
    pub fn finish(self) -> VideoReport {
        self.report()
    }

    pub fn tracker(&self) -> &DeepSortTracker {
        &self.tracker
    }

    pub fn detector_mut(&mut self) -> &mut D {
        &mut self.detector
    }
}
