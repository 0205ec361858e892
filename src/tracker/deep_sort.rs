//! Tracking-by-detection core: association plus identity lifecycle.

use tracing::debug;

use crate::error::{Error, Result};
use crate::tracker::kalman_filter::KalmanFilter;
use crate::tracker::matching::{self, AssignmentResult, Detection};
use crate::tracker::rect::Rect;
use crate::tracker::track::Track;

/// Configuration for the tracker.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Maximum 1 - IoU for the overlap-based association stage
    pub max_iou_distance: f32,
    /// Maximum cosine distance for an appearance match
    pub max_appearance_distance: f32,
    /// Consecutive hits required to confirm a tentative track
    pub n_init: u32,
    /// Maximum consecutive misses before a confirmed track is deleted
    pub max_age: u32,
    /// Appearance embeddings retained per track, oldest evicted first
    pub gallery_budget: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_iou_distance: 0.7,
            max_appearance_distance: 0.4,
            n_init: 3,
            max_age: 30,
            gallery_budget: 100,
        }
    }
}

impl TrackerConfig {
    /// Reject invalid parameter combinations before any frame is processed.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.max_iou_distance) || !self.max_iou_distance.is_finite() {
            return Err(Error::InvalidConfig(format!(
                "max_iou_distance must be within [0, 1], got {}",
                self.max_iou_distance
            )));
        }
        if self.max_appearance_distance <= 0.0 || !self.max_appearance_distance.is_finite() {
            return Err(Error::InvalidConfig(format!(
                "max_appearance_distance must be positive, got {}",
                self.max_appearance_distance
            )));
        }
        if self.n_init == 0 {
            return Err(Error::InvalidConfig("n_init must be at least 1".into()));
        }
        if self.max_age == 0 {
            return Err(Error::InvalidConfig("max_age must be at least 1".into()));
        }
        if self.gallery_budget == 0 {
            return Err(Error::InvalidConfig(
                "gallery_budget must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// A confirmed, recently-updated identity emitted for the current frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActiveTrack {
    pub track_id: u64,
    pub bbox: Rect,
}

/// Multi-object tracker combining motion gating, appearance matching and a
/// tentative/confirmed/deleted lifecycle.
///
/// Identities are allocated from a per-instance counter, so independent
/// trackers (one per video) share no state and may run on separate threads.
pub struct DeepSortTracker {
    config: TrackerConfig,
    kalman_filter: KalmanFilter,
    tracks: Vec<Track>,
    next_id: u64,
}

impl DeepSortTracker {
    pub fn new(config: TrackerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            kalman_filter: KalmanFilter::default(),
            tracks: Vec::new(),
            next_id: 1,
        })
    }

    /// Live tracks, in creation order.
    #[inline]
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Propagate every track's state one time step forward.
    ///
    /// Call once per logical frame, before [`DeepSortTracker::update`].
    pub fn predict(&mut self) {
        for track in &mut self.tracks {
            track.predict(&self.kalman_filter);
        }
    }

    /// Associate the frame's detections, apply match/miss transitions, spawn
    /// tentative tracks for unmatched detections, and prune dead tracks.
    ///
    /// Returns the frame's active set: confirmed tracks matched this frame
    /// or the one before.
    pub fn update(&mut self, detections: &[Detection]) -> Vec<ActiveTrack> {
        let AssignmentResult {
            matches,
            unmatched_tracks,
            unmatched_detections,
        } = self.associate(detections);

        debug!(
            matched = matches.len(),
            missed = unmatched_tracks.len(),
            spawned = unmatched_detections.len(),
            "frame association"
        );

        for &(track_idx, det_idx) in &matches {
            self.tracks[track_idx].update(&self.kalman_filter, &detections[det_idx]);
        }

        for &track_idx in &unmatched_tracks {
            self.tracks[track_idx].mark_missed();
        }

        for &det_idx in &unmatched_detections {
            self.initiate_track(&detections[det_idx]);
        }

        // Rebuild the collection rather than deleting in place.
        self.tracks = std::mem::take(&mut self.tracks)
            .into_iter()
            .filter(|t| !t.is_deleted())
            .collect();

        self.active_tracks()
    }

    /// Confirmed tracks with `time_since_update <= 1`: matched this frame,
    /// or tolerating a single-frame flicker.
    pub fn active_tracks(&self) -> Vec<ActiveTrack> {
        self.tracks
            .iter()
            .filter(|t| t.is_confirmed() && t.time_since_update() <= 1)
            .map(|t| ActiveTrack {
                track_id: t.track_id(),
                bbox: t.bbox(),
            })
            .collect()
    }

    /// Two-stage association.
    ///
    /// Confirmed tracks compete first, through the recency cascade on the
    /// gated appearance metric. Tentative tracks, plus confirmed tracks
    /// missed exactly this frame, then get one IoU round over the leftovers.
    fn associate(&self, detections: &[Detection]) -> AssignmentResult {
        let confirmed: Vec<usize> = (0..self.tracks.len())
            .filter(|&i| self.tracks[i].is_confirmed())
            .collect();
        let unconfirmed: Vec<usize> = (0..self.tracks.len())
            .filter(|&i| !self.tracks[i].is_confirmed())
            .collect();

        let cascade = matching::matching_cascade(
            &self.kalman_filter,
            self.config.max_appearance_distance,
            self.config.max_age,
            &self.tracks,
            detections,
            &confirmed,
        );

        let (recent_misses, stale_misses): (Vec<usize>, Vec<usize>) = cascade
            .unmatched_tracks
            .into_iter()
            .partition(|&t| self.tracks[t].time_since_update() == 1);

        let iou_candidates: Vec<usize> =
            unconfirmed.into_iter().chain(recent_misses).collect();

        let iou_costs = matching::iou_cost(
            &self.tracks,
            detections,
            &iou_candidates,
            &cascade.unmatched_detections,
        );
        let overlap = matching::min_cost_matching(
            &iou_costs,
            self.config.max_iou_distance,
            &iou_candidates,
            &cascade.unmatched_detections,
        );

        let mut matches = cascade.matches;
        matches.extend(overlap.matches);

        let mut unmatched_tracks = stale_misses;
        unmatched_tracks.extend(overlap.unmatched_tracks);

        AssignmentResult {
            matches,
            unmatched_tracks,
            unmatched_detections: overlap.unmatched_detections,
        }
    }

    fn initiate_track(&mut self, detection: &Detection) {
        let xyah = detection.bbox.to_xyah();
        let (mean, covariance) = self.kalman_filter.initiate([
            xyah[0] as f64,
            xyah[1] as f64,
            xyah[2] as f64,
            xyah[3] as f64,
        ]);

        self.tracks.push(Track::new(
            mean,
            covariance,
            self.next_id,
            self.config.n_init,
            self.config.max_age,
            self.config.gallery_budget,
            detection.feature.clone(),
        ));
        self.next_id += 1;
    }
}
