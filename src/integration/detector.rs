//! Trait for object detection inference backends.

use crate::integration::appearance::FrameView;
use crate::tracker::Rect;

/// One candidate observation from the external detector: a box in pixel
/// TLWH coordinates plus a confidence score.
#[derive(Debug, Clone, Copy)]
pub struct RawDetection {
    pub bbox: Rect,
    pub confidence: f32,
}

/// Trait for object detection inference backends.
///
/// Implement this trait to feed any single-class detection model into the
/// tracking pipeline.
///
/// # Example
///
/// ```ignore
/// use trackcount_rs::{DetectionSource, FrameView, RawDetection};
///
/// struct MyDetector {
///     // Your model here
/// }
///
/// impl DetectionSource for MyDetector {
///     type Error = std::io::Error;
///
///     fn detect(&mut self, frame: &FrameView<'_>) -> Result<Vec<RawDetection>, Self::Error> {
///         // Run inference and return target-class candidates
///         Ok(vec![])
///     }
/// }
/// ```
pub trait DetectionSource {
    /// Error type for detection failures.
    type Error;

    /// Run inference on one frame and return target-class candidates.
    fn detect(&mut self, frame: &FrameView<'_>) -> Result<Vec<RawDetection>, Self::Error>;
}

/// Helper trait for converting model-specific outputs to [`RawDetection`].
pub trait IntoCandidates {
    /// Convert the output into a vector of candidates.
    fn into_candidates(self) -> Vec<RawDetection>;
}

impl IntoCandidates for Vec<RawDetection> {
    fn into_candidates(self) -> Vec<RawDetection> {
        self
    }
}

/// `[x, y, w, h, confidence]` rows, the wire format most detector
/// integrations already produce.
impl IntoCandidates for Vec<[f32; 5]> {
    fn into_candidates(self) -> Vec<RawDetection> {
        self.into_iter()
            .map(|row| RawDetection {
                bbox: Rect::new(row[0], row[1], row[2], row[3]),
                confidence: row[4],
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_into_candidates() {
        let rows: Vec<[f32; 5]> = vec![[10.0, 20.0, 30.0, 40.0, 0.9]];
        let candidates = rows.into_candidates();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].bbox.to_tlwh(), [10.0, 20.0, 30.0, 40.0]);
        assert_eq!(candidates[0].confidence, 0.9);
    }
}
