//! Posture safety detection
//!
//! Finds people in video frames or still images, estimates their body pose,
//! and flags postures that look unsafe.
//!
//! # Pipeline
//!
//! 1. A `PersonDetector` returns bounding boxes with categories.
//! 2. Each person box is widened to the pose model's aspect ratio and cropped.
//! 3. A `PoseEstimator` returns 19 keypoints in crop-local coordinates, which
//!    are mapped back into frame coordinates.
//! 4. `SafetyRules` classifies the pose: sitting (hip below knee) and fallen
//!    (head-to-body angle outside [30°, 150°]), first match wins.
//! 5. The `Renderer` draws the box, crop, skeleton and label.
//! 6. The `FrameLoop` processes every tenth frame and feeds sinks and an
//!    optional display.
//!
//! # Module Structure
//!
//! - `pose`: keypoints, poses, crop regions and coordinate mapping
//! - `detect`: detector / pose estimator traits, stub and tract backends, NMS
//! - `safety`: posture rules and verdicts
//! - `render`: overlay drawing
//! - `pipeline`: per-frame orchestration
//! - `ingest`: frame sources (camera, video file, synthetic, images)
//! - `sink`: video, CSV and image outputs
//! - `run`: frame loop and image mode
//! - `supervisor`: cancellable background runs
//! - `config`, `models`: settings and model assets

pub mod config;
pub mod detect;
pub mod display;
pub mod frame;
pub mod ingest;
pub mod models;
pub mod pipeline;
pub mod pose;
pub mod render;
pub mod run;
pub mod safety;
pub mod sink;
pub mod supervisor;

pub use config::{InputSelection, SafetyConfig, SettingsFile};
pub use detect::{BBox, Detection, DetectorParams, ObjectCategory, PersonDetector, PoseEstimator};
pub use frame::Frame;
pub use ingest::{FrameSource, VideoInput};
pub use pipeline::{FrameAnalysis, PersonOutcome, PipelineStage};
pub use pose::{CropRegion, Keypoint, KeypointIndex, Pose};
pub use run::{FrameLoop, LoopSummary, StopReason};
pub use safety::{SafetyRules, Verdict};
pub use supervisor::{CancelToken, RunSupervisor};
