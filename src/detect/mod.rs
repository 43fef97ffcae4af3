mod backend;
mod backends;
mod nms;
mod result;

pub use backend::{DetectorParams, PersonDetector, PoseEstimator, DEFAULT_IOU_THRESHOLD};
pub use backends::{upright_pose, StubDetector, StubPoseEstimator};
pub use nms::non_max_suppression;
pub use result::{BBox, Detection, ObjectCategory, COCO_CATEGORY};

#[cfg(feature = "backend-tract")]
pub use backends::{TractPoseResnet, TractYoloxDetector};
