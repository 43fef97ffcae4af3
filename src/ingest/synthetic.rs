//! Synthetic `stub://` source.
//!
//! URL form: `stub://<name>?frames=N&width=W&height=H&fps=F`. Every parameter
//! is optional. Frames are a shifting gradient so consecutive frames differ.

use anyhow::{anyhow, Context, Result};

use super::{FrameSource, DEFAULT_FRAME_RATE};
use crate::frame::Frame;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyntheticConfig {
    pub name: String,
    /// Total frames before end of stream.
    pub frames: u64,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            name: "synthetic".to_string(),
            frames: 100,
            width: 640,
            height: 480,
            fps: DEFAULT_FRAME_RATE,
        }
    }
}

impl SyntheticConfig {
    pub fn parse(url: &str) -> Result<Self> {
        let rest = url
            .strip_prefix("stub://")
            .ok_or_else(|| anyhow!("synthetic source URL must start with stub://"))?;
        let (name, query) = match rest.split_once('?') {
            Some((name, query)) => (name, Some(query)),
            None => (rest, None),
        };

        let mut config = Self::default();
        if !name.is_empty() {
            config.name = name.to_string();
        }
        for pair in query.into_iter().flat_map(|q| q.split('&')).filter(|p| !p.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| anyhow!("malformed stub parameter '{}'", pair))?;
            match key {
                "frames" => config.frames = parse_param(key, value)?,
                "width" => config.width = parse_param(key, value)?,
                "height" => config.height = parse_param(key, value)?,
                "fps" => config.fps = parse_param(key, value)?,
                other => return Err(anyhow!("unknown stub parameter '{}'", other)),
            }
        }
        if config.width == 0 || config.height == 0 {
            return Err(anyhow!(
                "stub frame size must be non-zero, got {}x{}",
                config.width,
                config.height
            ));
        }
        Ok(config)
    }
}

fn parse_param<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .parse()
        .with_context(|| format!("invalid value '{}' for stub parameter '{}'", value, key))
}

pub struct SyntheticSource {
    config: SyntheticConfig,
    frame_count: u64,
}

impl SyntheticSource {
    pub fn new(config: SyntheticConfig) -> Self {
        Self {
            config,
            frame_count: 0,
        }
    }

    fn generate_synthetic_pixels(&self) -> Vec<u8> {
        let pixel_count = (self.config.width as usize) * (self.config.height as usize) * 3;
        let mut pixels = vec![0u8; pixel_count];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 / 3 + self.frame_count) % 256) as u8;
        }
        pixels
    }
}

impl FrameSource for SyntheticSource {
    fn describe(&self) -> String {
        format!(
            "stub://{} ({}x{}, {} frames)",
            self.config.name, self.config.width, self.config.height, self.config.frames
        )
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.frame_count >= self.config.frames {
            return Ok(None);
        }
        let pixels = self.generate_synthetic_pixels();
        let frame = Frame::from_rgb(pixels, self.config.width, self.config.height, self.frame_count)?;
        self.frame_count += 1;
        Ok(Some(frame))
    }

    fn frame_rate(&self) -> Option<u32> {
        Some(self.config.fps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_defaults_and_overrides() {
        let config = SyntheticConfig::parse("stub://").unwrap();
        assert_eq!(config, SyntheticConfig::default());

        let config = SyntheticConfig::parse("stub://hall?frames=12&width=64&height=48&fps=5").unwrap();
        assert_eq!(config.name, "hall");
        assert_eq!(config.frames, 12);
        assert_eq!((config.width, config.height), (64, 48));
        assert_eq!(config.fps, 5);
    }

    #[test]
    fn parse_rejects_bad_parameters() {
        assert!(SyntheticConfig::parse("stub://x?frames=many").is_err());
        assert!(SyntheticConfig::parse("stub://x?colour=red").is_err());
        assert!(SyntheticConfig::parse("stub://x?width=0").is_err());
        assert!(SyntheticConfig::parse("file://x").is_err());
    }

    #[test]
    fn yields_indexed_frames_then_ends() -> Result<()> {
        let config = SyntheticConfig::parse("stub://t?frames=3&width=8&height=4")?;
        let mut source = SyntheticSource::new(config);
        for expected in 0..3u64 {
            let frame = source.next_frame()?.expect("frame");
            assert_eq!(frame.index, expected);
            assert_eq!((frame.width(), frame.height()), (8, 4));
        }
        assert!(source.next_frame()?.is_none());
        assert!(source.next_frame()?.is_none());
        Ok(())
    }
}
