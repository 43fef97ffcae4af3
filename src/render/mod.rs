//! Frame annotation.
//!
//! - Detection box (4 px) and crop outline (1 px), green when safe, red when not
//! - Skeleton lines (5 px) for edges whose endpoints both clear the threshold
//! - Verdict label at the bottom-left of the box, scaled with frame width,
//!   set in the bundled DejaVu Sans

mod draw;
mod label;
mod skeleton;

use image::Rgb;

use crate::detect::Detection;
use crate::frame::Frame;
use crate::pose::{CropRegion, Pose};
use crate::safety::{Verdict, DEFAULT_POSE_THRESHOLD};

pub use draw::{draw_rect, draw_thick_line};
pub use label::{draw_label, LABEL_PX_HEIGHT};
pub use skeleton::{edge_color, hsv8_to_rgb, SKELETON_EDGES};

pub const SAFE_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
pub const UNSAFE_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

pub const BOX_THICKNESS: u32 = 4;
pub const CROP_THICKNESS: u32 = 1;
pub const LIMB_THICKNESS: u32 = 5;

/// Frame width at which the label font scale is 1.0.
const FONT_REFERENCE_WIDTH: f32 = 1024.0;

#[derive(Clone, Copy, Debug)]
pub struct Renderer {
    pub pose_threshold: f32,
}

impl Default for Renderer {
    fn default() -> Self {
        Self {
            pose_threshold: DEFAULT_POSE_THRESHOLD,
        }
    }
}

impl Renderer {
    pub fn new(pose_threshold: f32) -> Self {
        Self { pose_threshold }
    }

    /// Annotate one classified person.
    pub fn draw_person<'a>(
        &self,
        frame: &'a mut Frame,
        detection: &Detection,
        crop: &CropRegion,
        verdict: &Verdict,
        pose: &Pose,
    ) -> &'a mut Frame {
        let color = if verdict.safe { SAFE_COLOR } else { UNSAFE_COLOR };
        let font_scale = frame.width() as f32 / FONT_REFERENCE_WIDTH;

        let x1 = detection.bbox.x1 as i32;
        let y1 = detection.bbox.y1 as i32;
        let x2 = detection.bbox.x2 as i32;
        let y2 = detection.bbox.y2 as i32;

        let img = frame.image_mut();
        draw_rect(img, x1, y1, x2, y2, BOX_THICKNESS, color);
        draw_rect(
            img,
            crop.left as i32,
            crop.top as i32,
            crop.right() as i32,
            crop.bottom() as i32,
            CROP_THICKNESS,
            color,
        );

        self.draw_skeleton(frame, pose);

        let label = verdict.label();
        draw_label(frame.image_mut(), (x1 + 4, y2 - 8), &label, font_scale, color);
        frame
    }

    /// Draw every skeleton edge whose endpoints both exceed the threshold.
    pub fn draw_skeleton<'a>(&self, frame: &'a mut Frame, pose: &Pose) -> &'a mut Frame {
        let (w, h) = (frame.width(), frame.height());
        let img = frame.image_mut();
        for &(a, b) in SKELETON_EDGES.iter() {
            let pa = pose.get(a);
            let pb = pose.get(b);
            if !pa.exceeds(self.pose_threshold) || !pb.exceeds(self.pose_threshold) {
                continue;
            }
            draw_thick_line(img, pa.to_pixel(w, h), pb.to_pixel(w, h), LIMB_THICKNESS, edge_color(a));
        }
        frame
    }
}
