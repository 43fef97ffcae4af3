use crate::detect::BBox;

use super::keypoint::{Keypoint, KeypointIndex, Pose};

/// Height / width of the pose model input (256x192).
pub const POSE_ASPECT: f32 = 256.0 / 192.0;

/// Pixel rectangle fed to the pose estimator, plus the affine pair that maps
/// crop-local normalized coordinates back into frame-global ones.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropRegion {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
    /// (left / frame_width, top / frame_height)
    pub offset: (f32, f32),
    /// (width / frame_width, height / frame_height)
    pub scale: (f32, f32),
}

impl CropRegion {
    pub fn from_pixels(
        left: u32,
        top: u32,
        width: u32,
        height: u32,
        frame_w: u32,
        frame_h: u32,
    ) -> Self {
        let fw = frame_w.max(1) as f32;
        let fh = frame_h.max(1) as f32;
        Self {
            left,
            top,
            width,
            height,
            offset: (left as f32 / fw, top as f32 / fh),
            scale: (width as f32 / fw, height as f32 / fh),
        }
    }

    pub fn right(&self) -> u32 {
        self.left + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.top + self.height
    }

    /// Zero-area crops carry no pixels; the detection gets no pose.
    pub fn is_degenerate(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// `offset + local * scale`, per axis.
    pub fn map_point(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.offset.0 + x * self.scale.0,
            self.offset.1 + y * self.scale.1,
        )
    }

    /// Map every keypoint of a crop-local pose into frame-global coordinates.
    /// Confidences are carried over unchanged.
    pub fn map_pose(&self, local: &Pose) -> Pose {
        let mut keypoints = [Keypoint::default(); KeypointIndex::COUNT];
        for (dst, src) in keypoints.iter_mut().zip(local.keypoints.iter()) {
            let (x, y) = self.map_point(src.x, src.y);
            *dst = Keypoint::new(x, y, src.confidence);
        }
        Pose::new(keypoints)
    }
}

/// Compute the crop window for a detection.
///
/// - The bbox is clamped to the frame and snapped outward to whole pixels
/// - The window grows around the bbox center until height / width == `aspect`
/// - The window is shifted back inside the frame; if it is still larger than
///   the frame along an axis it is shrunk to the frame on that axis
///
/// The result always contains the clamped bbox and never leaves the frame.
pub fn crop_for_pose(bbox: &BBox, frame_w: u32, frame_h: u32, aspect: f32) -> CropRegion {
    let fw = frame_w as f32;
    let fh = frame_h as f32;

    let x1 = bbox.x1.clamp(0.0, fw);
    let y1 = bbox.y1.clamp(0.0, fh);
    let x2 = bbox.x2.clamp(0.0, fw);
    let y2 = bbox.y2.clamp(0.0, fh);

    let left = x1.floor() as u32;
    let top = y1.floor() as u32;
    if !(x2 > x1) || !(y2 > y1) {
        return CropRegion::from_pixels(left, top, 0, 0, frame_w, frame_h);
    }
    let right = (x2.ceil() as u32).min(frame_w);
    let bottom = (y2.ceil() as u32).min(frame_h);

    let w = right - left;
    let h = bottom - top;

    // grow one side to hit the target aspect
    let (mut cw, mut ch) = if (h as f32) < w as f32 * aspect {
        (w, (w as f32 * aspect).round() as u32)
    } else {
        ((h as f32 / aspect).round() as u32, h)
    };
    cw = cw.clamp(w, frame_w);
    ch = ch.clamp(h, frame_h);

    let crop_left = place(left, right, cw, frame_w);
    let crop_top = place(top, bottom, ch, frame_h);

    CropRegion::from_pixels(crop_left, crop_top, cw, ch, frame_w, frame_h)
}

/// Start coordinate for a span of `size` centered on `[lo, hi)` that still
/// covers it and fits in `[0, limit]`.
fn place(lo: u32, hi: u32, size: u32, limit: u32) -> u32 {
    let center = (lo + hi) as f32 / 2.0;
    let ideal = (center - size as f32 / 2.0).round().max(0.0) as u32;
    let min_start = hi.saturating_sub(size);
    let max_start = lo.min(limit - size);
    ideal.clamp(min_start, max_start)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(x1: f32, y1: f32, x2: f32, y2: f32) -> BBox {
        BBox { x1, y1, x2, y2 }
    }

    fn assert_contains(crop: &CropRegion, b: &BBox, frame_w: u32, frame_h: u32) {
        let fw = frame_w as f32;
        let fh = frame_h as f32;
        assert!(crop.left as f32 <= b.x1.clamp(0.0, fw), "{:?} vs {:?}", crop, b);
        assert!(crop.top as f32 <= b.y1.clamp(0.0, fh), "{:?} vs {:?}", crop, b);
        assert!(crop.right() as f32 >= b.x2.clamp(0.0, fw), "{:?} vs {:?}", crop, b);
        assert!(crop.bottom() as f32 >= b.y2.clamp(0.0, fh), "{:?} vs {:?}", crop, b);
        assert!(crop.right() <= frame_w && crop.bottom() <= frame_h, "{:?}", crop);
    }

    #[test]
    fn tall_box_widens_to_aspect() {
        let b = bbox(300.0, 100.0, 340.0, 420.0);
        let crop = crop_for_pose(&b, 640, 480, POSE_ASPECT);
        assert_eq!(crop.height, 320);
        assert_eq!(crop.width, 240);
        assert_contains(&crop, &b, 640, 480);
    }

    #[test]
    fn wide_box_grows_taller() {
        let b = bbox(100.0, 200.0, 250.0, 260.0);
        let crop = crop_for_pose(&b, 640, 480, POSE_ASPECT);
        assert_eq!(crop.width, 150);
        assert_eq!(crop.height, 200);
        assert_contains(&crop, &b, 640, 480);
    }

    #[test]
    fn crop_is_shifted_inside_frame_at_edges() {
        let b = bbox(0.0, 0.0, 30.0, 200.0);
        let crop = crop_for_pose(&b, 640, 480, POSE_ASPECT);
        assert_eq!(crop.left, 0);
        assert_eq!(crop.top, 0);
        assert_eq!(crop.width, 150);
        assert_contains(&crop, &b, 640, 480);

        let b = bbox(620.0, 400.0, 640.0, 480.0);
        let crop = crop_for_pose(&b, 640, 480, POSE_ASPECT);
        assert_eq!(crop.right(), 640);
        assert_eq!(crop.bottom(), 480);
        assert_contains(&crop, &b, 640, 480);
    }

    #[test]
    fn crop_properties_hold_across_boxes() {
        let frames = [(640u32, 480u32), (1920, 1080), (200, 600)];
        let boxes = [
            bbox(10.0, 10.0, 50.0, 300.0),
            bbox(-20.0, 40.0, 120.0, 90.0),
            bbox(150.0, 150.0, 151.0, 152.0),
            bbox(0.0, 0.0, 5000.0, 5000.0),
            bbox(33.3, 12.7, 97.9, 401.2),
            bbox(500.5, 300.25, 630.0, 470.0),
        ];
        for &(fw, fh) in &frames {
            for b in &boxes {
                let crop = crop_for_pose(b, fw, fh, POSE_ASPECT);
                if crop.is_degenerate() {
                    continue;
                }
                assert_contains(&crop, b, fw, fh);
                // aspect holds whenever neither axis had to be shrunk to the frame
                if crop.width < fw && crop.height < fh {
                    let expected_h = crop.width as f32 * POSE_ASPECT;
                    assert!(
                        (crop.height as f32 - expected_h).abs() <= 1.5,
                        "aspect off: {:?} in {}x{}",
                        crop,
                        fw,
                        fh
                    );
                }
            }
        }
    }

    #[test]
    fn zero_size_box_is_degenerate() {
        let crop = crop_for_pose(&bbox(100.0, 100.0, 100.0, 200.0), 640, 480, POSE_ASPECT);
        assert!(crop.is_degenerate());

        let outside = crop_for_pose(&bbox(700.0, 10.0, 800.0, 90.0), 640, 480, POSE_ASPECT);
        assert!(outside.is_degenerate());
    }

    #[test]
    fn offset_and_scale_follow_crop_rect() {
        let crop = CropRegion::from_pixels(160, 48, 320, 384, 640, 480);
        assert!((crop.offset.0 - 0.25).abs() < 1e-6);
        assert!((crop.offset.1 - 0.1).abs() < 1e-6);
        assert!((crop.scale.0 - 0.5).abs() < 1e-6);
        assert!((crop.scale.1 - 0.8).abs() < 1e-6);
    }

    #[test]
    fn map_pose_is_offset_plus_scaled_local() {
        let crop = CropRegion::from_pixels(160, 48, 320, 384, 640, 480);

        let mut local = Pose::default();
        local.set(KeypointIndex::Nose, Keypoint::new(0.5, 0.5, 0.9));
        local.set(KeypointIndex::RightAnkle, Keypoint::new(1.0, 1.0, 0.3));

        let global = crop.map_pose(&local);
        let nose = global.get(KeypointIndex::Nose);
        assert!((nose.x - 0.5).abs() < 1e-6);
        assert!((nose.y - 0.5).abs() < 1e-6);
        assert_eq!(nose.confidence, 0.9);

        let ankle = global.get(KeypointIndex::RightAnkle);
        assert!((ankle.x - 0.75).abs() < 1e-6);
        assert!((ankle.y - 0.9).abs() < 1e-6);

        // untouched keypoints land on the crop origin
        let eye = global.get(KeypointIndex::LeftEye);
        assert!((eye.x - 0.25).abs() < 1e-6);
        assert!((eye.y - 0.1).abs() < 1e-6);
    }

    #[test]
    fn map_point_matches_formula() {
        let crop = CropRegion::from_pixels(37, 11, 101, 203, 333, 517);
        for &(x, y) in &[(0.0f32, 0.0f32), (0.13, 0.87), (1.0, 1.0), (0.5, 0.25)] {
            let (gx, gy) = crop.map_point(x, y);
            assert_eq!(gx, crop.offset.0 + x * crop.scale.0);
            assert_eq!(gy, crop.offset.1 + y * crop.scale.1);
        }
    }
}
