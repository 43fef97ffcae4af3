//! Posture safety rules.
//!
//! A person is judged from frame-global keypoints by two independent checks:
//!
//! - **sitting**: on either side, the hip sits lower in the image than the knee
//! - **fallen**: the head-to-body-center vector leans more than 60° away from
//!   vertical
//!
//! Checks run in that order and the first one that fails decides the verdict,
//! so at most one reason is reported.
//!
//! The fallen check gates the nose on `pose_threshold` but only requires the
//! body-center confidence to be nonzero. Body-center is derived from the hips
//! and inherits the weaker hip's confidence, so a weak hip pair still produces
//! an angle. This asymmetry is intentional and covered by tests.

use crate::pose::{KeypointIndex, Pose};

/// Default minimum keypoint confidence.
pub const DEFAULT_POSE_THRESHOLD: f32 = 0.4;

/// Head-body angles inside `[MIN_UPRIGHT_ANGLE, MAX_UPRIGHT_ANGLE]` count as upright.
pub const MIN_UPRIGHT_ANGLE: f32 = 30.0;
pub const MAX_UPRIGHT_ANGLE: f32 = 180.0 - MIN_UPRIGHT_ANGLE;

pub const SITTING_REASON: &str = "(Hip > Knee)";

/// Outcome for one person.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Verdict {
    pub safe: bool,
    /// Empty when safe.
    pub reason: String,
}

impl Verdict {
    pub fn safe() -> Self {
        Self {
            safe: true,
            reason: String::new(),
        }
    }

    pub fn unsafe_because(reason: impl Into<String>) -> Self {
        Self {
            safe: false,
            reason: reason.into(),
        }
    }

    /// Overlay text, e.g. `Not safety(Hip > Knee)`.
    pub fn label(&self) -> String {
        let head = if self.safe { "Safety" } else { "Not safety" };
        format!("{}{}", head, self.reason)
    }
}

/// Which checks are active and how confident keypoints must be.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SafetyRules {
    pub sitting: bool,
    pub fallen: bool,
    pub pose_threshold: f32,
}

impl Default for SafetyRules {
    fn default() -> Self {
        Self {
            sitting: false,
            fallen: false,
            pose_threshold: DEFAULT_POSE_THRESHOLD,
        }
    }
}

impl SafetyRules {
    pub fn classify(&self, pose: &Pose) -> Verdict {
        if self.sitting {
            if let Some(verdict) = self.check_sitting(pose) {
                return verdict;
            }
        }
        if self.fallen {
            if let Some(verdict) = self.check_fallen(pose) {
                return verdict;
            }
        }
        Verdict::safe()
    }

    fn check_sitting(&self, pose: &Pose) -> Option<Verdict> {
        let sides = [
            (KeypointIndex::LeftHip, KeypointIndex::LeftKnee),
            (KeypointIndex::RightHip, KeypointIndex::RightKnee),
        ];
        for (hip, knee) in sides {
            let hip = pose.get(hip);
            let knee = pose.get(knee);
            if hip.exceeds(self.pose_threshold)
                && knee.exceeds(self.pose_threshold)
                && hip.y > knee.y
            {
                return Some(Verdict::unsafe_because(SITTING_REASON));
            }
        }
        None
    }

    fn check_fallen(&self, pose: &Pose) -> Option<Verdict> {
        let nose = pose.get(KeypointIndex::Nose);
        let center = pose.get(KeypointIndex::BodyCenter);
        if !nose.exceeds(self.pose_threshold) || center.confidence == 0.0 {
            return None;
        }
        let theta = head_body_angle(pose);
        if theta < MIN_UPRIGHT_ANGLE || theta > MAX_UPRIGHT_ANGLE {
            return Some(Verdict::unsafe_because(format!(
                "(Head Body angle {})",
                theta.round() as i32
            )));
        }
        None
    }
}

/// Angle in degrees of the body-center → nose vector, measured
/// counter-clockwise from the +x axis with y pointing up. Range `(-180, 180]`;
/// 90 means the head is straight above the body.
pub fn head_body_angle(pose: &Pose) -> f32 {
    let nose = pose.get(KeypointIndex::Nose);
    let center = pose.get(KeypointIndex::BodyCenter);
    (-(nose.y - center.y)).atan2(nose.x - center.x).to_degrees()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::Keypoint;

    fn rules(sitting: bool, fallen: bool) -> SafetyRules {
        SafetyRules {
            sitting,
            fallen,
            pose_threshold: DEFAULT_POSE_THRESHOLD,
        }
    }

    fn pose_with(points: &[(KeypointIndex, f32, f32, f32)]) -> Pose {
        let mut pose = Pose::default();
        for &(index, x, y, c) in points {
            pose.set(index, Keypoint::new(x, y, c));
        }
        pose
    }

    #[test]
    fn head_above_body_is_safe() {
        let pose = pose_with(&[
            (KeypointIndex::Nose, 0.5, 0.2, 0.9),
            (KeypointIndex::BodyCenter, 0.5, 0.6, 0.9),
        ]);
        assert!((head_body_angle(&pose) - 90.0).abs() < 1e-4);
        assert_eq!(rules(false, true).classify(&pose), Verdict::safe());
    }

    #[test]
    fn head_beside_body_is_fallen() {
        let pose = pose_with(&[
            (KeypointIndex::Nose, 0.8, 0.5, 0.9),
            (KeypointIndex::BodyCenter, 0.5, 0.5, 0.9),
        ]);
        let verdict = rules(false, true).classify(&pose);
        assert!(!verdict.safe);
        assert_eq!(verdict.reason, "(Head Body angle 0)");
        assert_eq!(verdict.label(), "Not safety(Head Body angle 0)");
    }

    #[test]
    fn hip_below_knee_is_sitting() {
        let pose = pose_with(&[
            (KeypointIndex::LeftHip, 0.4, 0.7, 0.9),
            (KeypointIndex::LeftKnee, 0.4, 0.6, 0.9),
        ]);
        let verdict = rules(true, false).classify(&pose);
        assert_eq!(verdict, Verdict::unsafe_because("(Hip > Knee)"));
    }

    #[test]
    fn sitting_check_is_symmetric() {
        let left = pose_with(&[
            (KeypointIndex::LeftHip, 0.4, 0.7, 0.9),
            (KeypointIndex::LeftKnee, 0.4, 0.6, 0.9),
        ]);
        let right = pose_with(&[
            (KeypointIndex::RightHip, 0.4, 0.7, 0.9),
            (KeypointIndex::RightKnee, 0.4, 0.6, 0.9),
        ]);
        let r = rules(true, false);
        assert_eq!(r.classify(&left), r.classify(&right));
    }

    #[test]
    fn sitting_needs_both_hip_and_knee_confident() {
        for (hip_c, knee_c) in [(0.9, 0.4), (0.4, 0.9), (0.1, 0.1)] {
            let pose = pose_with(&[
                (KeypointIndex::RightHip, 0.4, 0.7, hip_c),
                (KeypointIndex::RightKnee, 0.4, 0.6, knee_c),
            ]);
            assert!(rules(true, false).classify(&pose).safe);
        }
    }

    #[test]
    fn disabled_checks_never_fire() {
        let pose = pose_with(&[
            (KeypointIndex::Nose, 0.9, 0.5, 0.9),
            (KeypointIndex::BodyCenter, 0.5, 0.5, 0.9),
            (KeypointIndex::LeftHip, 0.4, 0.7, 0.9),
            (KeypointIndex::LeftKnee, 0.4, 0.6, 0.9),
        ]);
        assert!(rules(false, false).classify(&pose).safe);
    }

    #[test]
    fn sitting_wins_over_fallen() {
        let pose = pose_with(&[
            (KeypointIndex::Nose, 0.9, 0.5, 0.9),
            (KeypointIndex::BodyCenter, 0.5, 0.5, 0.9),
            (KeypointIndex::LeftHip, 0.4, 0.7, 0.9),
            (KeypointIndex::LeftKnee, 0.4, 0.6, 0.9),
        ]);
        assert_eq!(rules(true, true).classify(&pose).reason, SITTING_REASON);
    }

    #[test]
    fn fallen_gate_uses_threshold_for_nose_but_truthiness_for_body_center() {
        let weak_nose = pose_with(&[
            (KeypointIndex::Nose, 0.9, 0.5, 0.4),
            (KeypointIndex::BodyCenter, 0.5, 0.5, 0.9),
        ]);
        assert!(rules(false, true).classify(&weak_nose).safe);

        let weak_center = pose_with(&[
            (KeypointIndex::Nose, 0.9, 0.5, 0.9),
            (KeypointIndex::BodyCenter, 0.5, 0.5, 0.05),
        ]);
        assert!(!rules(false, true).classify(&weak_center).safe);

        let zero_center = pose_with(&[
            (KeypointIndex::Nose, 0.9, 0.5, 0.9),
            (KeypointIndex::BodyCenter, 0.5, 0.5, 0.0),
        ]);
        assert!(rules(false, true).classify(&zero_center).safe);
    }

    #[test]
    fn fallen_boundary_angles_are_inclusive() {
        let r = rules(false, true);
        let at = |deg: f32| {
            let rad = deg.to_radians();
            pose_with(&[
                (KeypointIndex::Nose, 0.5 + 0.2 * rad.cos(), 0.5 - 0.2 * rad.sin(), 0.9),
                (KeypointIndex::BodyCenter, 0.5, 0.5, 0.9),
            ])
        };
        assert!(r.classify(&at(31.0)).safe);
        assert!(r.classify(&at(149.0)).safe);
        assert!(!r.classify(&at(29.0)).safe);
        assert!(!r.classify(&at(151.0)).safe);
        assert!(!r.classify(&at(-90.0)).safe);

        let upside_down = r.classify(&at(-90.0));
        assert_eq!(upside_down.reason, "(Head Body angle -90)");
    }

    #[test]
    fn angle_stays_in_half_open_range() {
        for deg in [-179.0f32, -90.0, 0.0, 45.0, 90.0, 135.0, 179.0] {
            let rad = deg.to_radians();
            let pose = pose_with(&[
                (KeypointIndex::Nose, 0.5 + 0.3 * rad.cos(), 0.5 - 0.3 * rad.sin(), 0.9),
                (KeypointIndex::BodyCenter, 0.5, 0.5, 0.9),
            ]);
            let theta = head_body_angle(&pose);
            assert!(theta > -180.0 && theta <= 180.0);
            assert!((theta - deg).abs() < 0.01, "{} vs {}", theta, deg);
        }
    }
}
