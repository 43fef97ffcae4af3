use anyhow::Result;
use image::RgbImage;

use crate::frame::Frame;
use crate::pose::{Pose, POSE_ASPECT};

use super::result::Detection;

/// IOU threshold used by non-maximum suppression.
pub const DEFAULT_IOU_THRESHOLD: f32 = 0.45;

/// Per-call detector parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetectorParams {
    /// Minimum detection score kept after decoding.
    pub confidence_threshold: f32,
    /// Overlap above which the weaker of two same-category boxes is dropped.
    pub iou_threshold: f32,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.4,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
        }
    }
}

/// Object detector backend.
///
/// Implementations return every category they recognize; the pipeline decides
/// which ones get a pose. Boxes are in frame pixel coordinates.
pub trait PersonDetector: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on a full frame.
    fn detect(&mut self, frame: &Frame, params: &DetectorParams) -> Result<Vec<Detection>>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Pose estimator backend.
///
/// Receives an owned crop of one person and returns keypoints normalized to
/// that crop (0..1 across the crop's width and height).
pub trait PoseEstimator: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Height / width the crop should have before it reaches `estimate`.
    fn input_aspect(&self) -> f32 {
        POSE_ASPECT
    }

    fn estimate(&mut self, crop: &RgbImage) -> Result<Pose>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
