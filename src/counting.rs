//! Unique-identity counting, per video and across a batch.

use std::collections::{BTreeMap, HashSet};
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::tracker::ActiveTrack;

/// Accumulates the set of distinct confirmed identities seen in one video.
///
/// Feed it each frame's active set; an identity counts once no matter how
/// many frames it stays visible. Identities are only meaningful within a
/// single video, so counters are never shared or merged.
#[derive(Debug, Default)]
pub struct IdentityCounter {
    seen: HashSet<u64>,
}

impl IdentityCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the identities active in the current frame.
    pub fn observe(&mut self, active: &[ActiveTrack]) {
        for track in active {
            self.seen.insert(track.track_id);
        }
    }

    /// Number of distinct identities observed so far.
    pub fn count(&self) -> usize {
        self.seen.len()
    }
}

/// Final outcome for one processed video.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VideoOutcome {
    /// Distinct confirmed identities counted. Partial if `error` is set.
    pub count: u64,
    /// Logical frames the tracker consumed.
    pub frames_processed: u64,
    /// Failure indicator: set when processing aborted mid-video.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl VideoOutcome {
    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Per-batch artifact: one outcome per video plus the summed grand total.
///
/// Totals are sums of per-video counts, never unions: identities from
/// different videos are not comparable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchSummary {
    pub videos: BTreeMap<String, VideoOutcome>,
    pub total: u64,
}

impl BatchSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one video's outcome and fold its count into the total.
    pub fn record(&mut self, video_id: impl Into<String>, outcome: VideoOutcome) {
        self.total += outcome.count;
        self.videos.insert(video_id.into(), outcome);
    }

    /// Whether any video in the batch failed.
    pub fn has_failures(&self) -> bool {
        self.videos.values().any(VideoOutcome::is_failed)
    }

    /// Persist the summary as JSON, the record consumed downstream.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let mut file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(&mut file, self)?;
        file.flush()?;
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::Rect;

    fn active(id: u64) -> ActiveTrack {
        ActiveTrack {
            track_id: id,
            bbox: Rect::new(0.0, 0.0, 10.0, 10.0),
        }
    }

    #[test]
    fn test_identity_counted_once() {
        let mut counter = IdentityCounter::new();
        for _ in 0..10 {
            counter.observe(&[active(1)]);
        }
        assert_eq!(counter.count(), 1);
    }

    #[test]
    fn test_distinct_identities_accumulate() {
        let mut counter = IdentityCounter::new();
        counter.observe(&[active(1), active(2)]);
        counter.observe(&[active(2), active(3)]);
        assert_eq!(counter.count(), 3);
    }

    #[test]
    fn test_replaying_a_trace_is_idempotent() {
        let trace: Vec<Vec<ActiveTrack>> = vec![
            vec![active(1)],
            vec![active(1), active(2)],
            vec![],
            vec![active(2)],
        ];

        let run = |trace: &[Vec<ActiveTrack>]| {
            let mut counter = IdentityCounter::new();
            for frame in trace {
                counter.observe(frame);
            }
            counter.count()
        };

        assert_eq!(run(&trace), run(&trace));
        assert_eq!(run(&trace), 2);
    }

    #[test]
    fn test_batch_totals_are_summed_not_unioned() {
        let mut summary = BatchSummary::new();
        summary.record(
            "a.mp4",
            VideoOutcome {
                count: 3,
                frames_processed: 100,
                error: None,
            },
        );
        // Same-looking ids in another video are different physical objects.
        summary.record(
            "b.mp4",
            VideoOutcome {
                count: 3,
                frames_processed: 80,
                error: None,
            },
        );
        assert_eq!(summary.total, 6);
        assert!(!summary.has_failures());
    }

    #[test]
    fn test_failed_video_reports_indicator() {
        let mut summary = BatchSummary::new();
        summary.record(
            "broken.mp4",
            VideoOutcome {
                count: 1,
                frames_processed: 12,
                error: Some("decoder gave up".into()),
            },
        );
        assert!(summary.has_failures());
        let json = summary.to_json().unwrap();
        assert!(json.contains("decoder gave up"));
    }
}
