/// Keypoint indices in the order the pose backends emit them.
///
/// The first 17 entries are the COCO joints. Shoulder-center and body-center
/// are derived points appended after them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum KeypointIndex {
    Nose = 0,
    LeftEye = 1,
    RightEye = 2,
    LeftEar = 3,
    RightEar = 4,
    LeftShoulder = 5,
    RightShoulder = 6,
    LeftElbow = 7,
    RightElbow = 8,
    LeftWrist = 9,
    RightWrist = 10,
    LeftHip = 11,
    RightHip = 12,
    LeftKnee = 13,
    RightKnee = 14,
    LeftAnkle = 15,
    RightAnkle = 16,
    ShoulderCenter = 17,
    BodyCenter = 18,
}

impl KeypointIndex {
    pub const COUNT: usize = 19;

    /// Number of joints predicted directly by a COCO pose model.
    pub const COCO_COUNT: usize = 17;

    pub const ALL: [KeypointIndex; Self::COUNT] = [
        Self::Nose,
        Self::LeftEye,
        Self::RightEye,
        Self::LeftEar,
        Self::RightEar,
        Self::LeftShoulder,
        Self::RightShoulder,
        Self::LeftElbow,
        Self::RightElbow,
        Self::LeftWrist,
        Self::RightWrist,
        Self::LeftHip,
        Self::RightHip,
        Self::LeftKnee,
        Self::RightKnee,
        Self::LeftAnkle,
        Self::RightAnkle,
        Self::ShoulderCenter,
        Self::BodyCenter,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// A single keypoint in normalized coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Keypoint {
    /// Normalized X (0.0..1.0)
    pub x: f32,
    /// Normalized Y (0.0..1.0), grows downward
    pub y: f32,
    /// Confidence score (0.0..1.0)
    pub confidence: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32, confidence: f32) -> Self {
        Self { x, y, confidence }
    }

    /// Strictly above the threshold. Every geometric rule gates on this.
    pub fn exceeds(&self, threshold: f32) -> bool {
        self.confidence > threshold
    }

    /// Convert to pixel coordinates (truncating).
    pub fn to_pixel(&self, width: u32, height: u32) -> (i32, i32) {
        let px = (self.x * width as f32) as i32;
        let py = (self.y * height as f32) as i32;
        (px, py)
    }

    fn midpoint(a: &Keypoint, b: &Keypoint) -> Keypoint {
        Keypoint {
            x: (a.x + b.x) / 2.0,
            y: (a.y + b.y) / 2.0,
            confidence: a.confidence.min(b.confidence),
        }
    }
}

/// The full skeleton of one person.
#[derive(Debug, Clone, PartialEq)]
pub struct Pose {
    pub keypoints: [Keypoint; KeypointIndex::COUNT],
}

impl Pose {
    pub fn new(keypoints: [Keypoint; KeypointIndex::COUNT]) -> Self {
        Self { keypoints }
    }

    /// Build a pose from the 17 COCO joints, deriving shoulder-center (midpoint of
    /// the shoulders) and body-center (midpoint of the hips). A derived point takes
    /// the lower confidence of its two parents.
    pub fn from_coco(joints: [Keypoint; KeypointIndex::COCO_COUNT]) -> Self {
        let mut keypoints = [Keypoint::default(); KeypointIndex::COUNT];
        keypoints[..KeypointIndex::COCO_COUNT].copy_from_slice(&joints);
        keypoints[KeypointIndex::ShoulderCenter as usize] = Keypoint::midpoint(
            &joints[KeypointIndex::LeftShoulder as usize],
            &joints[KeypointIndex::RightShoulder as usize],
        );
        keypoints[KeypointIndex::BodyCenter as usize] = Keypoint::midpoint(
            &joints[KeypointIndex::LeftHip as usize],
            &joints[KeypointIndex::RightHip as usize],
        );
        Self { keypoints }
    }

    pub fn get(&self, index: KeypointIndex) -> &Keypoint {
        &self.keypoints[index as usize]
    }

    pub fn set(&mut self, index: KeypointIndex, keypoint: Keypoint) {
        self.keypoints[index as usize] = keypoint;
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            keypoints: [Keypoint::default(); KeypointIndex::COUNT],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keypoint_index_matches_table_position() {
        for (i, kp) in KeypointIndex::ALL.iter().enumerate() {
            assert_eq!(kp.index(), i);
        }
        assert_eq!(KeypointIndex::ALL.len(), KeypointIndex::COUNT);
    }

    #[test]
    fn exceeds_is_strict() {
        let kp = Keypoint::new(0.5, 0.5, 0.4);
        assert!(!kp.exceeds(0.4));
        assert!(kp.exceeds(0.39));
    }

    #[test]
    fn to_pixel_truncates() {
        let kp = Keypoint::new(0.5, 0.25, 1.0);
        assert_eq!(kp.to_pixel(640, 480), (320, 120));
    }

    #[test]
    fn from_coco_derives_centers() {
        let mut joints = [Keypoint::default(); KeypointIndex::COCO_COUNT];
        joints[KeypointIndex::LeftShoulder as usize] = Keypoint::new(0.4, 0.2, 0.9);
        joints[KeypointIndex::RightShoulder as usize] = Keypoint::new(0.6, 0.4, 0.7);
        joints[KeypointIndex::LeftHip as usize] = Keypoint::new(0.45, 0.6, 0.8);
        joints[KeypointIndex::RightHip as usize] = Keypoint::new(0.55, 0.6, 0.5);

        let pose = Pose::from_coco(joints);
        let shoulder = pose.get(KeypointIndex::ShoulderCenter);
        assert!((shoulder.x - 0.5).abs() < 1e-6);
        assert!((shoulder.y - 0.3).abs() < 1e-6);
        assert_eq!(shoulder.confidence, 0.7);

        let body = pose.get(KeypointIndex::BodyCenter);
        assert!((body.x - 0.5).abs() < 1e-6);
        assert_eq!(body.confidence, 0.5);
    }
}
