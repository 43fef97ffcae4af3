//! Frame ingestion sources.
//!
//! - Camera index (V4L2 `/dev/videoN`, feature: ingest-v4l2)
//! - Local video files (feature: ingest-file-ffmpeg)
//! - `stub://` synthetic stream (tests and demos)
//! - A list of still images (`ImageListSource`)
//!
//! Every source yields frames in decode order and reports end of stream as
//! `Ok(None)`. Frame indices count every decoded frame, starting at 0; the
//! frame loop decides which of them are processed.

#[cfg(feature = "ingest-file-ffmpeg")]
mod file_ffmpeg;
pub mod images;
#[cfg(feature = "ingest-v4l2")]
mod normalize;
pub mod synthetic;
#[cfg(feature = "ingest-v4l2")]
pub mod v4l2;

use std::fmt;
use std::path::PathBuf;

use anyhow::{anyhow, Result};

use crate::frame::Frame;

#[cfg(feature = "ingest-file-ffmpeg")]
pub use file_ffmpeg::FfmpegFileSource;
pub use images::ImageListSource;
pub use synthetic::{SyntheticConfig, SyntheticSource};
#[cfg(feature = "ingest-v4l2")]
pub use v4l2::V4l2Source;

/// Frame rate assumed when a source cannot report one.
pub const DEFAULT_FRAME_RATE: u32 = 30;

/// A pull-based producer of frames.
pub trait FrameSource {
    /// Short human-readable description for logs.
    fn describe(&self) -> String;

    /// Capture the next frame, `Ok(None)` at end of stream.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Nominal frames per second, when known.
    fn frame_rate(&self) -> Option<u32> {
        None
    }
}

/// Where video frames come from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VideoInput {
    /// Camera device index.
    Camera(u32),
    /// Local video file.
    File(PathBuf),
    /// `stub://...` synthetic stream.
    Synthetic(String),
}

impl VideoInput {
    /// A bare integer is a camera index, `stub://` is synthetic, anything else
    /// is a local file path. Other URL schemes are rejected.
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        if value.is_empty() {
            return Err(anyhow!("video input must not be empty"));
        }
        if value.starts_with("stub://") {
            return Ok(Self::Synthetic(value.to_string()));
        }
        if let Ok(index) = value.parse::<u32>() {
            return Ok(Self::Camera(index));
        }
        if value.contains("://") {
            return Err(anyhow!(
                "video input '{}' must be a local path, camera index or stub://",
                value
            ));
        }
        Ok(Self::File(PathBuf::from(value)))
    }
}

impl fmt::Display for VideoInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Camera(index) => write!(f, "camera {}", index),
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Synthetic(url) => write!(f, "{}", url),
        }
    }
}

/// Open a video source. Fails before any frame is produced when the source
/// cannot be opened.
pub fn open_video(input: &VideoInput) -> Result<Box<dyn FrameSource>> {
    let source: Box<dyn FrameSource> = match input {
        VideoInput::Synthetic(url) => Box::new(SyntheticSource::new(SyntheticConfig::parse(url)?)),
        VideoInput::File(path) => open_file(path)?,
        VideoInput::Camera(index) => open_camera(*index)?,
    };
    log::info!("opened video source: {}", source.describe());
    Ok(source)
}

#[cfg(feature = "ingest-file-ffmpeg")]
fn open_file(path: &std::path::Path) -> Result<Box<dyn FrameSource>> {
    Ok(Box::new(FfmpegFileSource::open(path)?))
}

#[cfg(not(feature = "ingest-file-ffmpeg"))]
fn open_file(path: &std::path::Path) -> Result<Box<dyn FrameSource>> {
    Err(anyhow!(
        "cannot open {}: video file input requires the ingest-file-ffmpeg feature",
        path.display()
    ))
}

#[cfg(feature = "ingest-v4l2")]
fn open_camera(index: u32) -> Result<Box<dyn FrameSource>> {
    let mut source = V4l2Source::new(v4l2::V4l2Config::for_index(index));
    source.connect()?;
    Ok(Box::new(source))
}

#[cfg(not(feature = "ingest-v4l2"))]
fn open_camera(index: u32) -> Result<Box<dyn FrameSource>> {
    Err(anyhow!(
        "cannot open camera {}: camera input requires the ingest-v4l2 feature",
        index
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_video_input_kinds() {
        assert_eq!(VideoInput::parse("0").unwrap(), VideoInput::Camera(0));
        assert_eq!(VideoInput::parse(" 2 ").unwrap(), VideoInput::Camera(2));
        assert_eq!(
            VideoInput::parse("stub://walk?frames=5").unwrap(),
            VideoInput::Synthetic("stub://walk?frames=5".to_string())
        );
        assert_eq!(
            VideoInput::parse("clips/fall.mp4").unwrap(),
            VideoInput::File(PathBuf::from("clips/fall.mp4"))
        );
        assert!(VideoInput::parse("rtsp://camera/stream").is_err());
        assert!(VideoInput::parse("   ").is_err());
    }

    #[test]
    fn open_synthetic_source() {
        let input = VideoInput::parse("stub://test?frames=2").unwrap();
        let mut source = open_video(&input).unwrap();
        assert!(source.next_frame().unwrap().is_some());
        assert!(source.next_frame().unwrap().is_some());
        assert!(source.next_frame().unwrap().is_none());
    }

    #[cfg(not(feature = "ingest-file-ffmpeg"))]
    #[test]
    fn file_input_without_decoder_fails_at_open() {
        let input = VideoInput::File(PathBuf::from("missing.mp4"));
        assert!(open_video(&input).is_err());
    }
}
