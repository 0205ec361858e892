//! Greedy non-max suppression over candidate boxes.

use crate::tracker::rect::Rect;

/// Suppress redundant overlapping boxes, returning the indices to keep.
///
/// Candidates are visited in confidence order (descending, ties broken by
/// original input order); each kept box discards every remaining box whose
/// IoU with it exceeds `iou_threshold`.
pub fn non_max_suppression(boxes: &[Rect], confidences: &[f32], iou_threshold: f32) -> Vec<usize> {
    debug_assert_eq!(boxes.len(), confidences.len());

    let mut order: Vec<usize> = (0..boxes.len()).collect();
    // Stable sort keeps input order for equal confidences.
    order.sort_by(|&a, &b| {
        confidences[b]
            .partial_cmp(&confidences[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep = Vec::new();
    let mut suppressed = vec![false; boxes.len()];

    for (pos, &idx) in order.iter().enumerate() {
        if suppressed[idx] {
            continue;
        }
        keep.push(idx);
        for &other in &order[pos + 1..] {
            if !suppressed[other] && boxes[idx].iou(&boxes[other]) > iou_threshold {
                suppressed[other] = true;
            }
        }
    }

    keep
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input() {
        assert!(non_max_suppression(&[], &[], 0.7).is_empty());
    }

    #[test]
    fn test_single_box_kept() {
        let boxes = [Rect::new(0.0, 0.0, 10.0, 10.0)];
        assert_eq!(non_max_suppression(&boxes, &[0.9], 0.7), vec![0]);
    }

    #[test]
    fn test_overlapping_box_suppressed() {
        let boxes = [
            Rect::new(0.0, 0.0, 10.0, 10.0),
            Rect::new(1.0, 1.0, 10.0, 10.0),
            Rect::new(100.0, 100.0, 10.0, 10.0),
        ];
        let keep = non_max_suppression(&boxes, &[0.8, 0.9, 0.7], 0.7);
        // Highest-confidence box wins; near-duplicate is dropped, far box survives.
        assert_eq!(keep, vec![1, 2]);
    }

    #[test]
    fn test_highest_confidence_always_kept() {
        let boxes = [
            Rect::new(0.0, 0.0, 10.0, 10.0),
            Rect::new(0.0, 0.0, 10.0, 10.0),
        ];
        let keep = non_max_suppression(&boxes, &[0.3, 0.95], 0.5);
        assert_eq!(keep, vec![1]);
    }

    #[test]
    fn test_no_kept_pair_exceeds_threshold() {
        let boxes = [
            Rect::new(0.0, 0.0, 10.0, 10.0),
            Rect::new(2.0, 0.0, 10.0, 10.0),
            Rect::new(4.0, 0.0, 10.0, 10.0),
            Rect::new(30.0, 0.0, 10.0, 10.0),
        ];
        let conf = [0.9, 0.8, 0.85, 0.7];
        let thresh = 0.3;
        let keep = non_max_suppression(&boxes, &conf, thresh);
        for (i, &a) in keep.iter().enumerate() {
            for &b in &keep[i + 1..] {
                assert!(boxes[a].iou(&boxes[b]) <= thresh);
            }
        }
    }

    #[test]
    fn test_ties_broken_by_input_order() {
        let boxes = [
            Rect::new(0.0, 0.0, 10.0, 10.0),
            Rect::new(0.5, 0.5, 10.0, 10.0),
        ];
        let keep = non_max_suppression(&boxes, &[0.9, 0.9], 0.5);
        assert_eq!(keep, vec![0]);
    }
}
