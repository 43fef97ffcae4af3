use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::FrameSource;
use crate::frame::Frame;

/// Still images read in order, one frame each.
pub struct ImageListSource {
    paths: Vec<PathBuf>,
    position: usize,
}

impl ImageListSource {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths, position: 0 }
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Next image together with the path it came from.
    pub fn next_image(&mut self) -> Result<Option<(PathBuf, Frame)>> {
        let Some(path) = self.paths.get(self.position).cloned() else {
            return Ok(None);
        };
        let frame = load_frame(&path, self.position as u64)?;
        self.position += 1;
        Ok(Some((path, frame)))
    }
}

impl FrameSource for ImageListSource {
    fn describe(&self) -> String {
        format!("{} image(s)", self.paths.len())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        Ok(self.next_image()?.map(|(_, frame)| frame))
    }
}

pub fn load_frame(path: &Path, index: u64) -> Result<Frame> {
    let image = image::open(path)
        .with_context(|| format!("failed to read image {}", path.display()))?
        .to_rgb8();
    Ok(Frame::new(image, index))
}
