//! Single tracked identity with Kalman state and appearance gallery.

use std::collections::VecDeque;

use ndarray::{Array1, Array2};

use crate::tracker::kalman_filter::KalmanFilter;
use crate::tracker::matching::Detection;
use crate::tracker::rect::Rect;
use crate::tracker::track_state::TrackState;

/// A persistent hypothesis for one physical object.
///
/// State space is `(cx, cy, aspect, height)` plus velocities, filtered by
/// the shared [`KalmanFilter`]. A bounded gallery of recent appearance
/// embeddings keeps re-identification robust to single-frame noise.
#[derive(Debug, Clone)]
pub struct Track {
    track_id: u64,
    state: TrackState,
    mean: Array1<f64>,
    covariance: Array2<f64>,
    gallery: VecDeque<Array1<f32>>,
    hits: u32,
    age: u32,
    time_since_update: u32,
    n_init: u32,
    max_age: u32,
    gallery_budget: usize,
}

impl Track {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        mean: Array1<f64>,
        covariance: Array2<f64>,
        track_id: u64,
        n_init: u32,
        max_age: u32,
        gallery_budget: usize,
        feature: Option<Array1<f32>>,
    ) -> Self {
        let mut gallery = VecDeque::new();
        if let Some(feature) = feature {
            gallery.push_back(feature);
        }
        Self {
            track_id,
            state: TrackState::Tentative,
            mean,
            covariance,
            gallery,
            hits: 1,
            age: 1,
            time_since_update: 0,
            n_init,
            max_age,
            gallery_budget,
        }
    }

    /// Unique identity, never reassigned within a tracker instance.
    #[inline]
    pub fn track_id(&self) -> u64 {
        self.track_id
    }

    #[inline]
    pub fn state(&self) -> TrackState {
        self.state
    }

    /// Successful matches accumulated so far.
    #[inline]
    pub fn hits(&self) -> u32 {
        self.hits
    }

    /// Frames since creation.
    #[inline]
    pub fn age(&self) -> u32 {
        self.age
    }

    /// Frames since the last successful match.
    #[inline]
    pub fn time_since_update(&self) -> u32 {
        self.time_since_update
    }

    /// Current estimated bounding box in TLWH format.
    #[inline]
    pub fn bbox(&self) -> Rect {
        Rect::from_xyah(
            self.mean[0] as f32,
            self.mean[1] as f32,
            self.mean[2] as f32,
            self.mean[3] as f32,
        )
    }

    #[inline]
    pub(crate) fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    #[inline]
    pub(crate) fn covariance(&self) -> &Array2<f64> {
        &self.covariance
    }

    /// Recent appearance embeddings, oldest first.
    pub(crate) fn gallery(&self) -> impl Iterator<Item = &Array1<f32>> {
        self.gallery.iter()
    }

    #[inline]
    pub fn is_tentative(&self) -> bool {
        self.state == TrackState::Tentative
    }

    #[inline]
    pub fn is_confirmed(&self) -> bool {
        self.state == TrackState::Confirmed
    }

    #[inline]
    pub fn is_deleted(&self) -> bool {
        self.state == TrackState::Deleted
    }

    /// Advance the state one time step. Runs every frame for every live
    /// track, so unobserved tracks keep drifting under their own velocity.
    pub(crate) fn predict(&mut self, kf: &KalmanFilter) {
        let (mean, covariance) = kf.predict(&self.mean, &self.covariance);
        self.mean = mean;
        self.covariance = covariance;
        self.age += 1;
        self.time_since_update += 1;
    }

    /// Fold a matched detection into the state and the gallery.
    pub(crate) fn update(&mut self, kf: &KalmanFilter, detection: &Detection) {
        let xyah = detection.bbox.to_xyah();
        let measurement = [
            xyah[0] as f64,
            xyah[1] as f64,
            xyah[2] as f64,
            xyah[3] as f64,
        ];
        let (mean, covariance) = kf.update(&self.mean, &self.covariance, measurement);
        self.mean = mean;
        self.covariance = covariance;

        if let Some(feature) = &detection.feature {
            if self.gallery.len() == self.gallery_budget {
                self.gallery.pop_front();
            }
            self.gallery.push_back(feature.clone());
        }

        self.hits += 1;
        self.time_since_update = 0;

        if self.state == TrackState::Tentative && self.hits >= self.n_init {
            self.state = TrackState::Confirmed;
        }
    }

    /// Record a miss. Tentative tracks die immediately; confirmed tracks
    /// die once unobserved for longer than `max_age`.
    pub(crate) fn mark_missed(&mut self) {
        if self.state == TrackState::Tentative {
            self.state = TrackState::Deleted;
        } else if self.time_since_update > self.max_age {
            self.state = TrackState::Deleted;
        }
    }
}
