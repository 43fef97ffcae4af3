use image::Rgb;

use crate::pose::KeypointIndex;

use KeypointIndex::*;

/// Skeleton edges. The first endpoint of each pair picks the edge color.
pub const SKELETON_EDGES: [(KeypointIndex, KeypointIndex); 18] = [
    (Nose, ShoulderCenter),
    (LeftShoulder, ShoulderCenter),
    (RightShoulder, ShoulderCenter),
    (LeftEye, Nose),
    (RightEye, Nose),
    (LeftEar, LeftEye),
    (RightEar, RightEye),
    (LeftElbow, LeftShoulder),
    (RightElbow, RightShoulder),
    (LeftWrist, LeftElbow),
    (RightWrist, RightElbow),
    (BodyCenter, ShoulderCenter),
    (LeftHip, BodyCenter),
    (RightHip, BodyCenter),
    (LeftKnee, LeftHip),
    (LeftAnkle, LeftKnee),
    (RightKnee, RightHip),
    (RightAnkle, RightKnee),
];

/// Edge color: hue `255 * index / COUNT` at full saturation and value, in the
/// 8-bit HSV convention where hue bytes cover 0..180 and wrap above it.
pub fn edge_color(first: KeypointIndex) -> Rgb<u8> {
    let hue = (255 * first.index() / KeypointIndex::COUNT) as u8;
    hsv8_to_rgb(hue, 255, 255)
}

/// Convert an 8-bit HSV triple (hue byte = degrees / 2) to RGB.
pub fn hsv8_to_rgb(h: u8, s: u8, v: u8) -> Rgb<u8> {
    let degrees = (h as f32 * 2.0) % 360.0;
    let s = s as f32 / 255.0;
    let v = v as f32 / 255.0;

    let c = v * s;
    let sector = degrees / 60.0;
    let x = c * (1.0 - (sector % 2.0 - 1.0).abs());
    let (r, g, b) = match sector as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = v - c;
    let to_byte = |ch: f32| ((ch + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    Rgb([to_byte(r), to_byte(g), to_byte(b)])
}
