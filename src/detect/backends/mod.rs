pub mod stub;

#[cfg(feature = "backend-tract")]
pub mod tract;

pub use stub::{upright_pose, StubDetector, StubPoseEstimator};

#[cfg(feature = "backend-tract")]
pub use tract::{TractPoseResnet, TractYoloxDetector};
