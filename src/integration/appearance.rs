//! Appearance-embedding boundary: capability trait plus the crop adapter.

use ndarray::Array1;
use tracing::warn;

use crate::tracker::Rect;

/// Borrowed view of one decoded video frame.
///
/// Interleaved 8-bit RGB, row-major; `data.len() == width * height * 3`.
#[derive(Debug, Clone, Copy)]
pub struct FrameView<'a> {
    pub data: &'a [u8],
    pub width: u32,
    pub height: u32,
}

impl<'a> FrameView<'a> {
    pub fn new(data: &'a [u8], width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
        }
    }
}

/// Capability interface for the external appearance-embedding model:
/// given an image and a crop region, return a fixed-length vector, or
/// `None` when the model cannot embed that crop.
///
/// Implementations hold read-only weights and must be shareable across
/// video workers; the pipeline never assumes anything beyond this call.
pub trait AppearanceModel: Send + Sync {
    type Error: std::fmt::Display;

    /// Embed one crop of the frame. The region is already clamped to the
    /// frame bounds and non-empty.
    fn embed(&self, frame: &FrameView<'_>, region: Rect)
    -> Result<Option<Array1<f32>>, Self::Error>;
}

impl<M: AppearanceModel + ?Sized> AppearanceModel for &M {
    type Error = M::Error;

    fn embed(
        &self,
        frame: &FrameView<'_>,
        region: Rect,
    ) -> Result<Option<Array1<f32>>, Self::Error> {
        (**self).embed(frame, region)
    }
}

impl<M: AppearanceModel + ?Sized> AppearanceModel for std::sync::Arc<M> {
    type Error = M::Error;

    fn embed(
        &self,
        frame: &FrameView<'_>,
        region: Rect,
    ) -> Result<Option<Array1<f32>>, Self::Error> {
        (**self).embed(frame, region)
    }
}

/// Outcome of embedding one detection crop.
#[derive(Debug, Clone)]
pub enum CropResult {
    /// Crop has no pixels after clamping to the frame; the detection is
    /// dropped before it reaches association.
    Degenerate,
    /// Model could not embed a valid crop; the detection keeps no
    /// appearance signature.
    Unavailable,
    /// L2-normalised embedding.
    Embedded(Array1<f32>),
}

/// Adapter between raw detection boxes and the appearance model.
///
/// Clamps each box to the frame, rejects degenerate crops, and normalises
/// returned embeddings. Model failures are logged and degrade to
/// appearance-less detections, never aborting the frame.
pub struct AppearanceExtractor<M> {
    model: M,
}

impl<M: AppearanceModel> AppearanceExtractor<M> {
    pub fn new(model: M) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Embed one detection box against the frame.
    pub fn extract(&self, frame: &FrameView<'_>, bbox: Rect) -> CropResult {
        let region = bbox.clip_to(frame.width, frame.height);
        if region.is_empty() {
            return CropResult::Degenerate;
        }

        match self.model.embed(frame, region) {
            Ok(Some(embedding)) => CropResult::Embedded(normalize(embedding)),
            Ok(None) => CropResult::Unavailable,
            Err(err) => {
                warn!(%err, "appearance extraction failed");
                CropResult::Unavailable
            }
        }
    }
}

fn normalize(mut v: Array1<f32>) -> Array1<f32> {
    let norm = v.dot(&v).sqrt();
    if norm > 0.0 {
        v /= norm;
    }
    v
}
