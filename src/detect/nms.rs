use std::cmp::Ordering;

use super::result::Detection;

/// Greedy per-category NMS: sort by confidence descending, drop any box that
/// overlaps an already kept box of the same category by more than `iou_threshold`.
pub fn non_max_suppression(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
    });

    let mut kept: Vec<Detection> = Vec::with_capacity(detections.len());
    for candidate in detections {
        let suppressed = kept.iter().any(|k| {
            k.category == candidate.category && k.bbox.iou(&candidate.bbox) > iou_threshold
        });
        if !suppressed {
            kept.push(candidate);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{BBox, ObjectCategory};

    fn det(x1: f32, conf: f32, category: ObjectCategory) -> Detection {
        Detection::new(
            BBox { x1, y1: 0.0, x2: x1 + 10.0, y2: 10.0 },
            category,
            conf,
        )
    }

    #[test]
    fn keeps_strongest_of_overlapping_pair() {
        let kept = non_max_suppression(
            vec![
                det(0.0, 0.6, ObjectCategory::Person),
                det(1.0, 0.9, ObjectCategory::Person),
                det(50.0, 0.5, ObjectCategory::Person),
            ],
            0.45,
        );
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].confidence, 0.9);
        assert_eq!(kept[1].confidence, 0.5);
    }

    #[test]
    fn different_categories_do_not_suppress_each_other() {
        let kept = non_max_suppression(
            vec![
                det(0.0, 0.9, ObjectCategory::Person),
                det(0.0, 0.8, ObjectCategory::Other(56)),
            ],
            0.45,
        );
        assert_eq!(kept.len(), 2);
    }
}
