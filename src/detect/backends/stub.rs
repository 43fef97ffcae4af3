use anyhow::Result;
use image::RgbImage;

use crate::detect::backend::{DetectorParams, PersonDetector, PoseEstimator};
use crate::detect::result::{BBox, Detection, ObjectCategory};
use crate::frame::Frame;
use crate::pose::{Keypoint, KeypointIndex, Pose};

/// Score the stub assigns to every box it reports.
const STUB_CONFIDENCE: f32 = 0.9;

/// Deterministic detector for tests and `stub://` runs.
///
/// Reports a fixed list of boxes, or by default one person occupying the
/// middle third of the frame. Boxes scoring at or below the threshold are
/// dropped the same way a real backend would drop them.
pub struct StubDetector {
    fixed: Option<Vec<Detection>>,
}

impl StubDetector {
    pub fn new() -> Self {
        Self { fixed: None }
    }

    /// Always report these detections, regardless of frame content.
    pub fn with_detections(detections: Vec<Detection>) -> Self {
        Self {
            fixed: Some(detections),
        }
    }

    fn centered_person(width: u32, height: u32) -> Detection {
        let w = width as f32;
        let h = height as f32;
        Detection::new(
            BBox {
                x1: w / 3.0,
                y1: h / 6.0,
                x2: w * 2.0 / 3.0,
                y2: h * 5.0 / 6.0,
            },
            ObjectCategory::Person,
            STUB_CONFIDENCE,
        )
    }
}

impl Default for StubDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl PersonDetector for StubDetector {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, frame: &Frame, params: &DetectorParams) -> Result<Vec<Detection>> {
        let candidates = match &self.fixed {
            Some(fixed) => fixed.clone(),
            None => vec![Self::centered_person(frame.width(), frame.height())],
        };
        Ok(candidates
            .into_iter()
            .filter(|d| d.confidence > params.confidence_threshold)
            .collect())
    }
}

/// Deterministic pose estimator: returns one canned crop-local pose.
///
/// The default is a person standing upright facing the camera, which every
/// safety rule classifies as safe.
pub struct StubPoseEstimator {
    pose: Pose,
}

impl StubPoseEstimator {
    pub fn new() -> Self {
        Self {
            pose: upright_pose(),
        }
    }

    pub fn with_pose(pose: Pose) -> Self {
        Self { pose }
    }
}

impl Default for StubPoseEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl PoseEstimator for StubPoseEstimator {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn estimate(&mut self, _crop: &RgbImage) -> Result<Pose> {
        Ok(self.pose.clone())
    }
}

/// Crop-local upright skeleton with every joint at confidence 0.9.
pub fn upright_pose() -> Pose {
    use KeypointIndex::*;
    let joints = [
        (Nose, 0.50, 0.10),
        (LeftEye, 0.53, 0.08),
        (RightEye, 0.47, 0.08),
        (LeftEar, 0.56, 0.09),
        (RightEar, 0.44, 0.09),
        (LeftShoulder, 0.62, 0.22),
        (RightShoulder, 0.38, 0.22),
        (LeftElbow, 0.66, 0.36),
        (RightElbow, 0.34, 0.36),
        (LeftWrist, 0.68, 0.48),
        (RightWrist, 0.32, 0.48),
        (LeftHip, 0.58, 0.52),
        (RightHip, 0.42, 0.52),
        (LeftKnee, 0.58, 0.72),
        (RightKnee, 0.42, 0.72),
        (LeftAnkle, 0.58, 0.92),
        (RightAnkle, 0.42, 0.92),
    ];
    let mut coco = [Keypoint::default(); KeypointIndex::COCO_COUNT];
    for (index, x, y) in joints {
        coco[index.index()] = Keypoint::new(x, y, 0.9);
    }
    Pose::from_coco(coco)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_detector_reports_centered_person() {
        let frame = Frame::new(RgbImage::new(300, 600), 0);
        let mut detector = StubDetector::new();
        let found = detector.detect(&frame, &DetectorParams::default()).unwrap();
        assert_eq!(found.len(), 1);
        assert!(found[0].is_person());
        assert!((found[0].bbox.x1 - 100.0).abs() < 1e-3);
        assert!((found[0].bbox.y2 - 500.0).abs() < 1e-3);
    }

    #[test]
    fn stub_detector_applies_threshold() {
        let frame = Frame::new(RgbImage::new(64, 64), 0);
        let mut detector = StubDetector::new();
        let params = DetectorParams {
            confidence_threshold: 0.95,
            ..DetectorParams::default()
        };
        assert!(detector.detect(&frame, &params).unwrap().is_empty());
    }

    #[test]
    fn upright_pose_has_head_above_body() {
        let pose = upright_pose();
        assert!(pose.get(KeypointIndex::Nose).y < pose.get(KeypointIndex::BodyCenter).y);
        assert!(pose.get(KeypointIndex::LeftHip).y < pose.get(KeypointIndex::LeftKnee).y);
    }
}
