use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::FrameSink;
use crate::frame::Frame;
use crate::pipeline::FrameAnalysis;

/// Output file used in image mode when no save path is configured.
pub const DEFAULT_IMAGE_SAVEPATH: &str = "output.png";

/// Suffix appended to the input stem when the save path is a directory.
const RESULT_SUFFIX: &str = "_res";

/// Resolve where the annotated copy of `input` is written in image mode.
///
/// A save path with an extension is used verbatim. One without is a
/// directory (created on demand) and receives `<stem>_res.<input ext>`.
pub fn image_output_path(savepath: Option<&Path>, input: &Path) -> Result<PathBuf> {
    let savepath = savepath.unwrap_or_else(|| Path::new(DEFAULT_IMAGE_SAVEPATH));
    if savepath.extension().is_some() {
        return Ok(savepath.to_path_buf());
    }

    fs::create_dir_all(savepath)
        .with_context(|| format!("failed to create output directory {}", savepath.display()))?;
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    let mut name = format!("{}{}", stem, RESULT_SUFFIX);
    if let Some(ext) = input.extension() {
        name.push('.');
        name.push_str(&ext.to_string_lossy());
    }
    Ok(savepath.join(name))
}

/// Writes each processed video frame to `<dir>/frame_<index>.png`.
pub struct ImageSink {
    dir: PathBuf,
    written: u64,
}

impl ImageSink {
    pub fn create(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create image directory {}", dir.display()))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            written: 0,
        })
    }

    pub fn path_for(&self, frame: &Frame) -> PathBuf {
        self.dir.join(format!("frame_{:06}.png", frame.index))
    }
}

impl FrameSink for ImageSink {
    fn name(&self) -> &'static str {
        "images"
    }

    fn write(&mut self, frame: &Frame, _analysis: &FrameAnalysis) -> Result<()> {
        let path = self.path_for(frame);
        frame
            .image()
            .save(&path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        log::info!("wrote {} image(s) to {}", self.written, self.dir.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    #[test]
    fn savepath_with_extension_is_used_verbatim() -> Result<()> {
        let out = image_output_path(Some(Path::new("results/out.jpg")), Path::new("in/person.png"))?;
        assert_eq!(out, PathBuf::from("results/out.jpg"));
        Ok(())
    }

    #[test]
    fn savepath_directory_gets_suffixed_name() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let target = dir.path().join("annotated");
        let out = image_output_path(Some(&target), Path::new("in/person.jpg"))?;
        assert_eq!(out, target.join("person_res.jpg"));
        assert!(target.is_dir());
        Ok(())
    }

    #[test]
    fn default_savepath() -> Result<()> {
        let out = image_output_path(None, Path::new("a.jpg"))?;
        assert_eq!(out, PathBuf::from(DEFAULT_IMAGE_SAVEPATH));
        Ok(())
    }

    #[test]
    fn frames_are_named_by_index() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut sink = ImageSink::create(&dir.path().join("frames"))?;
        let frame = Frame::new(RgbImage::new(4, 4), 20);
        sink.write(&frame, &FrameAnalysis::default())?;
        assert!(dir.path().join("frames/frame_000020.png").is_file());
        Ok(())
    }
}
