pub mod crop;
pub mod keypoint;

pub use crop::{crop_for_pose, CropRegion, POSE_ASPECT};
pub use keypoint::{Keypoint, KeypointIndex, Pose};
