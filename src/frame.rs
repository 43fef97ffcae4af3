//! Frame container.
//!
//! - `Frame`: an owned RGB pixel buffer plus the raw sequence index assigned by
//!   the source that produced it.
//!
//! A frame is owned by the frame loop for the duration of one iteration. The
//! renderer borrows it mutably to draw the overlay; the pose estimator only
//! ever sees an owned copy of a cropped sub-image.

use anyhow::{anyhow, Result};
use image::RgbImage;

use crate::pose::CropRegion;

// ----------------------------------------------------------------------------
// Frame
// ----------------------------------------------------------------------------

/// One decoded RGB frame.
pub struct Frame {
    image: RgbImage,

    /// Raw sequence index from the source (0-based, counts every decoded frame).
    pub index: u64,
}

impl Frame {
    pub fn new(image: RgbImage, index: u64) -> Self {
        Self { image, index }
    }

    /// Build a frame from packed RGB24 bytes.
    pub fn from_rgb(pixels: Vec<u8>, width: u32, height: u32, index: u64) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if pixels.len() != expected {
            return Err(anyhow!(
                "RGB frame length mismatch: expected {}, got {}",
                expected,
                pixels.len()
            ));
        }
        let image = RgbImage::from_raw(width, height, pixels)
            .ok_or_else(|| anyhow!("invalid {}x{} RGB buffer", width, height))?;
        Ok(Self { image, index })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn image_mut(&mut self) -> &mut RgbImage {
        &mut self.image
    }

    /// Flip rows in place (top row becomes bottom row).
    pub fn flip_vertical(&mut self) {
        image::imageops::flip_vertical_in_place(&mut self.image);
    }

    /// Copy out the pixels covered by `region`.
    ///
    /// Returns `None` for a zero-area region or one that does not lie inside the
    /// frame; callers treat that detection as having no pose.
    pub fn crop(&self, region: &CropRegion) -> Option<RgbImage> {
        if region.is_degenerate()
            || region.right() > self.width()
            || region.bottom() > self.height()
        {
            return None;
        }
        let view = image::imageops::crop_imm(
            &self.image,
            region.left,
            region.top,
            region.width,
            region.height,
        );
        Some(view.to_image())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
