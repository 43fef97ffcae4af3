use std::sync::OnceLock;

use ab_glyph::{Font, FontRef, PxScale, ScaleFont};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_text_mut, text_size};

/// DejaVu Sans, see `assets/fonts/LICENSE-DejaVu.txt`.
static FONT_BYTES: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans.ttf");

/// Pixel height of the label glyphs at font scale 1.0.
pub const LABEL_PX_HEIGHT: f32 = 30.0;

fn label_font() -> Option<&'static FontRef<'static>> {
    static FONT: OnceLock<Option<FontRef<'static>>> = OnceLock::new();
    FONT.get_or_init(|| match FontRef::try_from_slice(FONT_BYTES) {
        Ok(font) => Some(font),
        Err(e) => {
            log::warn!("label font unusable, labels disabled: {}", e);
            None
        }
    })
    .as_ref()
}

fn px_scale(font_scale: f32) -> PxScale {
    PxScale::from((LABEL_PX_HEIGHT * font_scale).max(1.0))
}

/// Draw `text` with its baseline starting at `baseline`. Returns the
/// advance width in pixels, or 0 when nothing was drawn.
pub fn draw_label(img: &mut RgbImage, baseline: (i32, i32), text: &str, font_scale: f32, color: Rgb<u8>) -> u32 {
    let Some(font) = label_font() else {
        return 0;
    };
    let scale = px_scale(font_scale);
    let ascent = font.as_scaled(scale).ascent().round() as i32;
    draw_text_mut(img, color, baseline.0, baseline.1 - ascent, scale, font, text);
    text_size(scale, font, text).0
}
