use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};

use super::FrameSink;
use crate::frame::Frame;
use crate::pipeline::FrameAnalysis;

#[cfg(feature = "ingest-file-ffmpeg")]
use super::video_ffmpeg::FfmpegVideoOutput;

/// True when this build can encode video files.
pub fn video_output_available() -> bool {
    cfg!(feature = "ingest-file-ffmpeg")
}

/// Annotated video file. The container is chosen from the file extension
/// (`.mp4`, `.mkv`, `.avi`, ...) and the encoder from the container's default.
///
/// The stream size is taken from the first frame; later frames of a
/// different size are rejected.
pub struct VideoWriter {
    path: PathBuf,
    size: Option<(u32, u32)>,
    frames_written: u64,
    #[cfg(feature = "ingest-file-ffmpeg")]
    output: FfmpegVideoOutput,
}

impl VideoWriter {
    #[cfg(feature = "ingest-file-ffmpeg")]
    pub fn create(path: &Path, fps: u32) -> Result<Self> {
        let output = FfmpegVideoOutput::create(path, fps.max(1))?;
        Ok(Self {
            path: path.to_path_buf(),
            size: None,
            frames_written: 0,
            output,
        })
    }

    #[cfg(not(feature = "ingest-file-ffmpeg"))]
    pub fn create(path: &Path, _fps: u32) -> Result<Self> {
        Err(anyhow!(
            "cannot write {}: video output requires the ingest-file-ffmpeg feature",
            path.display()
        ))
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        let dims = (frame.width(), frame.height());
        match self.size {
            Some(size) if size != dims => {
                return Err(anyhow!(
                    "video output {} is {}x{}, got a {}x{} frame",
                    self.path.display(),
                    size.0,
                    size.1,
                    dims.0,
                    dims.1
                ));
            }
            Some(_) => {}
            None => self.size = Some(dims),
        }

        #[cfg(feature = "ingest-file-ffmpeg")]
        self.output.encode(frame)?;
        self.frames_written += 1;
        Ok(())
    }
}

impl FrameSink for VideoWriter {
    fn name(&self) -> &'static str {
        "video"
    }

    fn write(&mut self, frame: &Frame, _analysis: &FrameAnalysis) -> Result<()> {
        self.write_frame(frame)
    }

    fn finish(&mut self) -> Result<()> {
        #[cfg(feature = "ingest-file-ffmpeg")]
        self.output.finish()?;
        log::info!(
            "wrote {} frame(s) to {}",
            self.frames_written,
            self.path.display()
        );
        Ok(())
    }
}
