//! FFmpeg encoder and muxer behind `VideoWriter`.
//!
//! The output context is opened on create so an unknown container fails
//! early. The video stream and encoder are added with the first frame,
//! once its size is known. RGB24 frames go through the software scaler to
//! YUV420P; odd sizes are rounded down to even for the chroma planes.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use ffmpeg_next as ffmpeg;
use ffmpeg::util::format::pixel::Pixel;
use ffmpeg::{codec, encoder, format, frame, media, software, Packet, Rational};

use crate::frame::Frame;

pub(super) struct FfmpegVideoOutput {
    path: PathBuf,
    output: format::context::Output,
    fps: u32,
    stream: Option<EncodedStream>,
}

struct EncodedStream {
    encoder: encoder::video::Encoder,
    scaler: software::scaling::Context,
    rgb: frame::Video,
    yuv: frame::Video,
    time_base: Rational,
    stream_time_base: Rational,
    next_pts: i64,
}

impl FfmpegVideoOutput {
    pub fn create(path: &Path, fps: u32) -> Result<Self> {
        ffmpeg::init().context("initialize ffmpeg")?;
        let output = format::output(&path)
            .with_context(|| format!("failed to create video output '{}'", path.display()))?;
        log::debug!("video output {} as {}", path.display(), output.format().name());
        Ok(Self {
            path: path.to_path_buf(),
            output,
            fps,
            stream: None,
        })
    }

    pub fn encode(&mut self, frame: &Frame) -> Result<()> {
        if self.stream.is_none() {
            let stream = self.open_stream(frame.width(), frame.height())?;
            self.stream = Some(stream);
        }
        let Some(stream) = self.stream.as_mut() else {
            return Ok(());
        };

        fill_rgb(&mut stream.rgb, frame)?;
        stream
            .scaler
            .run(&stream.rgb, &mut stream.yuv)
            .context("scale frame to YUV420P")?;
        stream.yuv.set_pts(Some(stream.next_pts));
        stream.next_pts += 1;
        stream
            .encoder
            .send_frame(&stream.yuv)
            .context("send frame to ffmpeg encoder")?;
        write_packets(stream, &mut self.output)
    }

    pub fn finish(&mut self) -> Result<()> {
        let Some(stream) = self.stream.as_mut() else {
            log::warn!("no frames for {}, leaving it empty", self.path.display());
            return Ok(());
        };
        stream.encoder.send_eof().context("flush ffmpeg encoder")?;
        write_packets(stream, &mut self.output)?;
        self.output
            .write_trailer()
            .with_context(|| format!("failed to finalize {}", self.path.display()))?;
        self.stream = None;
        Ok(())
    }

    fn open_stream(&mut self, width: u32, height: u32) -> Result<EncodedStream> {
        let (enc_width, enc_height) = (width & !1, height & !1);
        if enc_width == 0 || enc_height == 0 {
            return Err(anyhow!("{}x{} frames are too small to encode", width, height));
        }

        let codec_id = self.output.format().codec(&self.path, media::Type::Video);
        let codec = encoder::find(codec_id)
            .ok_or_else(|| anyhow!("no video encoder for {:?} ({})", codec_id, self.path.display()))?;
        let global_header = self
            .output
            .format()
            .flags()
            .contains(format::Flags::GLOBAL_HEADER);

        let time_base = Rational::new(1, self.fps as i32);
        let mut video = codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()
            .context("create ffmpeg video encoder")?;
        video.set_width(enc_width);
        video.set_height(enc_height);
        video.set_format(Pixel::YUV420P);
        video.set_time_base(time_base);
        video.set_frame_rate(Some(Rational::new(self.fps as i32, 1)));
        if global_header {
            video.set_flags(codec::Flags::GLOBAL_HEADER);
        }
        let encoder = video
            .open_as(codec)
            .with_context(|| format!("open {:?} encoder", codec_id))?;

        {
            let mut ost = self.output.add_stream(codec).context("add video stream")?;
            ost.set_parameters(&encoder);
            ost.set_time_base(time_base);
        }
        self.output
            .write_header()
            .with_context(|| format!("failed to write header of {}", self.path.display()))?;
        let stream_time_base = self
            .output
            .stream(0)
            .map(|s| s.time_base())
            .unwrap_or(time_base);

        let scaler = software::scaling::Context::get(
            Pixel::RGB24,
            width,
            height,
            Pixel::YUV420P,
            enc_width,
            enc_height,
            software::scaling::Flags::BILINEAR,
        )
        .context("create ffmpeg scaler")?;

        log::info!(
            "encoding {} with {:?} at {}x{} {} fps",
            self.path.display(),
            codec_id,
            enc_width,
            enc_height,
            self.fps
        );

        Ok(EncodedStream {
            encoder,
            scaler,
            rgb: frame::Video::new(Pixel::RGB24, width, height),
            yuv: frame::Video::empty(),
            time_base,
            stream_time_base,
            next_pts: 0,
        })
    }
}

fn fill_rgb(target: &mut frame::Video, frame: &Frame) -> Result<()> {
    let row_bytes = frame.width() as usize * 3;
    let stride = target.stride(0);
    let pixels = frame.image().as_raw();
    let data = target.data_mut(0);
    for (row, src) in pixels.chunks_exact(row_bytes).enumerate() {
        let start = row * stride;
        data.get_mut(start..start + row_bytes)
            .context("ffmpeg frame row is out of bounds")?
            .copy_from_slice(src);
    }
    Ok(())
}

fn write_packets(stream: &mut EncodedStream, output: &mut format::context::Output) -> Result<()> {
    let mut packet = Packet::empty();
    while stream.encoder.receive_packet(&mut packet).is_ok() {
        packet.set_stream(0);
        packet.rescale_ts(stream.time_base, stream.stream_time_base);
        packet
            .write_interleaved(output)
            .context("write video packet")?;
    }
    Ok(())
}
