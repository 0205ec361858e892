//! Association costs and assignment for multi-object tracking.

use ndarray::{Array1, Array2};

use crate::tracker::kalman_filter::{GATING_THRESHOLD, KalmanFilter};
use crate::tracker::rect::Rect;
use crate::tracker::track::Track;

/// Sentinel cost marking a track/detection pair as infeasible.
pub(crate) const INFEASIBLE_COST: f32 = 1e5;

/// Detection input for the tracker.
#[derive(Debug, Clone)]
pub struct Detection {
    /// Bounding box in TLWH format
    pub bbox: Rect,
    /// Detection confidence score in [0, 1]
    pub confidence: f32,
    /// Appearance embedding; absent when extraction failed for this crop
    pub feature: Option<Array1<f32>>,
}

impl Detection {
    pub fn new(bbox: Rect, confidence: f32) -> Self {
        Self {
            bbox,
            confidence,
            feature: None,
        }
    }

    pub fn with_feature(bbox: Rect, confidence: f32, feature: Array1<f32>) -> Self {
        Self {
            bbox,
            confidence,
            feature: Some(feature),
        }
    }
}

/// Cosine distance between two embeddings, in [0, 2].
///
/// Zero-norm vectors are maximally distant rather than NaN.
pub(crate) fn cosine_distance(a: &Array1<f32>, b: &Array1<f32>) -> f32 {
    let norm = a.dot(a).sqrt() * b.dot(b).sqrt();
    if norm > 0.0 {
        1.0 - a.dot(b) / norm
    } else {
        1.0
    }
}

/// Appearance cost matrix over the given track/detection index subsets.
///
/// Entry (i, j) is the minimum cosine distance between detection j's
/// embedding and any embedding in track i's gallery (nearest neighbour in
/// gallery). Detections without an embedding, and tracks with an empty
/// gallery, are infeasible on this metric.
pub(crate) fn appearance_cost(
    tracks: &[Track],
    detections: &[Detection],
    track_indices: &[usize],
    detection_indices: &[usize],
) -> Array2<f32> {
    let mut cost = Array2::from_elem((track_indices.len(), detection_indices.len()), INFEASIBLE_COST);
    for (row, &t) in track_indices.iter().enumerate() {
        for (col, &d) in detection_indices.iter().enumerate() {
            let Some(feature) = &detections[d].feature else {
                continue;
            };
            let nearest = tracks[t]
                .gallery()
                .map(|g| cosine_distance(g, feature))
                .fold(f32::INFINITY, f32::min);
            if nearest.is_finite() {
                cost[[row, col]] = nearest;
            }
        }
    }
    cost
}

/// Invalidate cost entries whose motion-implied distance is implausible.
///
/// A pair whose squared Mahalanobis distance between the track's predicted
/// state and the detection box exceeds the chi-square gate is infeasible
/// regardless of how similar it looks.
pub(crate) fn gate_cost_matrix(
    kf: &KalmanFilter,
    cost: &mut Array2<f32>,
    tracks: &[Track],
    detections: &[Detection],
    track_indices: &[usize],
    detection_indices: &[usize],
) {
    for (row, &t) in track_indices.iter().enumerate() {
        for (col, &d) in detection_indices.iter().enumerate() {
            let xyah = detections[d].bbox.to_xyah();
            let measurement = [
                xyah[0] as f64,
                xyah[1] as f64,
                xyah[2] as f64,
                xyah[3] as f64,
            ];
            let distance =
                kf.gating_distance(tracks[t].mean(), tracks[t].covariance(), measurement);
            if distance > GATING_THRESHOLD {
                cost[[row, col]] = INFEASIBLE_COST;
            }
        }
    }
}

/// IoU cost matrix (1 - IoU) over the given index subsets.
///
/// Tracks unobserved for more than one step have drifted too far for raw
/// overlap to be meaningful and are infeasible on this metric.
pub(crate) fn iou_cost(
    tracks: &[Track],
    detections: &[Detection],
    track_indices: &[usize],
    detection_indices: &[usize],
) -> Array2<f32> {
    let mut cost = Array2::zeros((track_indices.len(), detection_indices.len()));
    for (row, &t) in track_indices.iter().enumerate() {
        if tracks[t].time_since_update() > 1 {
            for col in 0..detection_indices.len() {
                cost[[row, col]] = INFEASIBLE_COST;
            }
            continue;
        }
        let track_box = tracks[t].bbox();
        for (col, &d) in detection_indices.iter().enumerate() {
            cost[[row, col]] = 1.0 - track_box.iou(&detections[d].bbox);
        }
    }
    cost
}

/// Result of one assignment round, in original index space.
#[derive(Debug, Clone, Default)]
pub struct AssignmentResult {
    pub matches: Vec<(usize, usize)>,
    pub unmatched_tracks: Vec<usize>,
    pub unmatched_detections: Vec<usize>,
}

/// Solve a bipartite minimum-cost assignment over the given subsets.
///
/// Pairs whose cost exceeds `max_distance` never match. Returned indices are
/// mapped back into the caller's track/detection index space.
pub(crate) fn min_cost_matching(
    cost_matrix: &Array2<f32>,
    max_distance: f32,
    track_indices: &[usize],
    detection_indices: &[usize],
) -> AssignmentResult {
    let (num_rows, num_cols) = cost_matrix.dim();

    if num_rows == 0 || num_cols == 0 {
        return AssignmentResult {
            matches: vec![],
            unmatched_tracks: track_indices.to_vec(),
            unmatched_detections: detection_indices.to_vec(),
        };
    }

    // lapjv wants a square matrix; pad with a cost no real pair can reach.
    let size = num_rows.max(num_cols);
    let mut padded = Array2::<f64>::from_elem((size, size), 1e6);
    for i in 0..num_rows {
        for j in 0..num_cols {
            padded[[i, j]] = cost_matrix[[i, j]].min(max_distance + 1e-5) as f64;
        }
    }

    let mut matches = vec![];
    let mut unmatched_tracks = vec![];
    let mut matched_cols = vec![false; num_cols];

    match lapjv::lapjv(&padded) {
        Ok((row_to_col, _)) => {
            for (row, &col) in row_to_col.iter().enumerate() {
                if row >= num_rows {
                    continue;
                }
                if col < num_cols && cost_matrix[[row, col]] <= max_distance {
                    matches.push((track_indices[row], detection_indices[col]));
                    matched_cols[col] = true;
                } else {
                    unmatched_tracks.push(track_indices[row]);
                }
            }
        }
        Err(_) => {
            unmatched_tracks = track_indices.to_vec();
        }
    }

    let unmatched_detections = detection_indices
        .iter()
        .enumerate()
        .filter(|(col, _)| !matched_cols[*col])
        .map(|(_, &d)| d)
        .collect();

    AssignmentResult {
        matches,
        unmatched_tracks,
        unmatched_detections,
    }
}

/// Cascade assignment ordered by track recency.
///
/// Tracks are processed in ascending `time_since_update`, one assignment per
/// recency level, each level competing only for detections the previous
/// levels left unmatched. Fresher tracks therefore claim ambiguous
/// detections before staler ones.
pub(crate) fn matching_cascade(
    kf: &KalmanFilter,
    max_appearance_distance: f32,
    max_age: u32,
    tracks: &[Track],
    detections: &[Detection],
    track_indices: &[usize],
) -> AssignmentResult {
    let mut matches = vec![];
    let mut unmatched_detections: Vec<usize> = (0..detections.len()).collect();

    for level in 0..max_age {
        if unmatched_detections.is_empty() {
            break;
        }

        let level_tracks: Vec<usize> = track_indices
            .iter()
            .copied()
            .filter(|&t| tracks[t].time_since_update() == 1 + level)
            .collect();
        if level_tracks.is_empty() {
            continue;
        }

        let mut cost = appearance_cost(tracks, detections, &level_tracks, &unmatched_detections);
        gate_cost_matrix(
            kf,
            &mut cost,
            tracks,
            detections,
            &level_tracks,
            &unmatched_detections,
        );

        let result = min_cost_matching(
            &cost,
            max_appearance_distance,
            &level_tracks,
            &unmatched_detections,
        );
        matches.extend(result.matches);
        unmatched_detections = result.unmatched_detections;
    }

    let matched_tracks: std::collections::HashSet<usize> =
        matches.iter().map(|&(t, _)| t).collect();
    let unmatched_tracks = track_indices
        .iter()
        .copied()
        .filter(|t| !matched_tracks.contains(t))
        .collect();

    AssignmentResult {
        matches,
        unmatched_tracks,
        unmatched_detections,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_cosine_distance_identical_is_zero() {
        let a = array![1.0_f32, 0.0, 0.0];
        assert!(cosine_distance(&a, &a).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_distance_orthogonal_is_one() {
        let a = array![1.0_f32, 0.0];
        let b = array![0.0_f32, 1.0];
        assert!((cosine_distance(&a, &b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_distance_zero_norm() {
        let a = array![0.0_f32, 0.0];
        let b = array![1.0_f32, 0.0];
        assert_eq!(cosine_distance(&a, &b), 1.0);
    }

    #[test]
    fn test_min_cost_matching_prefers_cheaper_pairing() {
        let cost = array![[0.1_f32, 0.9], [0.9, 0.2]];
        let result = min_cost_matching(&cost, 0.5, &[0, 1], &[0, 1]);
        let mut matches = result.matches.clone();
        matches.sort();
        assert_eq!(matches, vec![(0, 0), (1, 1)]);
    }

    #[test]
    fn test_min_cost_matching_respects_threshold() {
        let cost = array![[0.8_f32]];
        let result = min_cost_matching(&cost, 0.5, &[3], &[7]);
        assert!(result.matches.is_empty());
        assert_eq!(result.unmatched_tracks, vec![3]);
        assert_eq!(result.unmatched_detections, vec![7]);
    }

    #[test]
    fn test_min_cost_matching_rectangular() {
        let cost = array![[0.1_f32, 0.4, 0.3]];
        let result = min_cost_matching(&cost, 0.5, &[0], &[0, 1, 2]);
        assert_eq!(result.matches, vec![(0, 0)]);
        let mut unmatched = result.unmatched_detections.clone();
        unmatched.sort();
        assert_eq!(unmatched, vec![1, 2]);
    }

    #[test]
    fn test_empty_subsets() {
        let cost = Array2::<f32>::zeros((0, 0));
        let result = min_cost_matching(&cost, 0.5, &[], &[]);
        assert!(result.matches.is_empty());
    }
}
