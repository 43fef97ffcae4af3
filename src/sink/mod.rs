//! Output sinks for annotated frames.
//!
//! - `VideoWriter`: encoded video via FFmpeg, container from the extension,
//!   frame size fixed by the first frame
//! - `ImageSink`: one PNG per processed frame in a directory
//! - `CsvSink`: one row per detected person with its verdict

mod csv;
mod image_dir;
mod video;
#[cfg(feature = "ingest-file-ffmpeg")]
mod video_ffmpeg;

use anyhow::Result;

use crate::frame::Frame;
use crate::pipeline::FrameAnalysis;

pub use self::csv::{CsvSink, CSV_HEADER};
pub use self::image_dir::{image_output_path, ImageSink};
pub use self::video::{video_output_available, VideoWriter};

/// Receives every processed frame after it has been annotated.
pub trait FrameSink {
    fn name(&self) -> &'static str;

    fn write(&mut self, frame: &Frame, analysis: &FrameAnalysis) -> Result<()>;

    /// Flush buffered output. Called once after the last frame.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}
