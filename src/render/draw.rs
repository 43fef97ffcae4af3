use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;

/// Rectangle outline `thickness` pixels wide, growing inward from
/// `(x1, y1)`-`(x2, y2)`. Parts outside the image are clipped.
pub fn draw_rect(img: &mut RgbImage, x1: i32, y1: i32, x2: i32, y2: i32, thickness: u32, color: Rgb<u8>) {
    for inset in 0..thickness as i32 {
        let w = x2 - x1 - 2 * inset;
        let h = y2 - y1 - 2 * inset;
        if w <= 0 || h <= 0 {
            break;
        }
        let rect = Rect::at(x1 + inset, y1 + inset).of_size(w as u32, h as u32);
        draw_hollow_rect_mut(img, rect, color);
    }
}

/// Line segment with a round brush of diameter `thickness`.
pub fn draw_thick_line(img: &mut RgbImage, from: (i32, i32), to: (i32, i32), thickness: u32, color: Rgb<u8>) {
    let radius = (thickness as i32 / 2).max(0);
    let (mut x0, mut y0) = from;
    let (x1, y1) = to;
    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    loop {
        if radius == 0 {
            put_pixel_clipped(img, x0, y0, color);
        } else {
            draw_filled_circle_mut(img, (x0, y0), radius, color);
        }
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

fn put_pixel_clipped(img: &mut RgbImage, x: i32, y: i32, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < img.width() && (y as u32) < img.height() {
        img.put_pixel(x as u32, y as u32, color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgb<u8> = Rgb([255, 0, 0]);

    #[test]
    fn rect_outline_is_thick_and_hollow() {
        let mut img = RgbImage::new(40, 40);
        draw_rect(&mut img, 5, 5, 35, 35, 4, RED);
        assert_eq!(img.get_pixel(5, 20), &RED);
        assert_eq!(img.get_pixel(8, 20), &RED);
        assert_eq!(img.get_pixel(9, 20), &Rgb([0, 0, 0]));
        assert_eq!(img.get_pixel(20, 20), &Rgb([0, 0, 0]));
    }

    #[test]
    fn rect_partially_outside_is_clipped() {
        let mut img = RgbImage::new(10, 10);
        draw_rect(&mut img, -5, -5, 20, 20, 2, RED);
        draw_rect(&mut img, 3, 3, 3, 8, 2, RED);
    }

    #[test]
    fn thick_line_covers_neighbors() {
        let mut img = RgbImage::new(50, 50);
        draw_thick_line(&mut img, (5, 25), (45, 25), 5, RED);
        assert_eq!(img.get_pixel(25, 25), &RED);
        assert_eq!(img.get_pixel(25, 23), &RED);
        assert_eq!(img.get_pixel(25, 27), &RED);
        assert_eq!(img.get_pixel(25, 30), &Rgb([0, 0, 0]));
    }

    #[test]
    fn line_off_canvas_does_not_panic() {
        let mut img = RgbImage::new(10, 10);
        draw_thick_line(&mut img, (-20, -20), (30, 30), 5, RED);
        draw_thick_line(&mut img, (-20, 5), (-10, 5), 1, RED);
        assert_eq!(img.get_pixel(5, 5), &RED);
    }
}
