//! Live preview of annotated frames.

use anyhow::Result;

use crate::frame::Frame;

/// What the viewer did while the last frame was on screen.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisplayEvent {
    Continue,
    /// The quit key was pressed.
    Quit,
    /// The window was closed.
    Closed,
}

pub trait Display {
    fn present(&mut self, frame: &Frame) -> Result<DisplayEvent>;
}

#[cfg(feature = "display")]
pub use self::window::MinifbDisplay;

#[cfg(feature = "display")]
mod window {
    use anyhow::{Context, Result};
    use minifb::{Key, Window, WindowOptions};

    use super::{Display, DisplayEvent};
    use crate::frame::Frame;

    /// minifb window. Created on the first frame so it takes the stream's size.
    pub struct MinifbDisplay {
        title: String,
        window: Option<Window>,
        buffer: Vec<u32>,
        width: usize,
        height: usize,
    }

    impl MinifbDisplay {
        pub fn new(title: &str) -> Self {
            Self {
                title: title.to_string(),
                window: None,
                buffer: Vec::new(),
                width: 0,
                height: 0,
            }
        }

        fn ensure_window(&mut self, width: usize, height: usize) -> Result<&mut Window> {
            if self.window.is_none() || self.width != width || self.height != height {
                let window = Window::new(
                    &self.title,
                    width,
                    height,
                    WindowOptions {
                        resize: false,
                        ..WindowOptions::default()
                    },
                )
                .context("failed to open preview window")?;
                self.window = Some(window);
                self.width = width;
                self.height = height;
                self.buffer = vec![0u32; width * height];
            }
            self.window
                .as_mut()
                .context("preview window missing after creation")
        }
    }

    impl Display for MinifbDisplay {
        fn present(&mut self, frame: &Frame) -> Result<DisplayEvent> {
            let (w, h) = (frame.width() as usize, frame.height() as usize);
            self.ensure_window(w, h)?;

            for (dst, px) in self.buffer.iter_mut().zip(frame.image().pixels()) {
                let [r, g, b] = px.0;
                *dst = ((r as u32) << 16) | ((g as u32) << 8) | b as u32;
            }

            let window = self
                .window
                .as_mut()
                .context("preview window missing")?;
            if !window.is_open() {
                return Ok(DisplayEvent::Closed);
            }
            window
                .update_with_buffer(&self.buffer, w, h)
                .context("failed to update preview window")?;
            if !window.is_open() {
                return Ok(DisplayEvent::Closed);
            }
            if window.is_key_down(Key::Q) {
                return Ok(DisplayEvent::Quit);
            }
            Ok(DisplayEvent::Continue)
        }
    }
}

/// Scripted display for tests: replays a fixed event sequence, then `Continue`.
///
/// Indices of presented frames are recorded in a shared log so they can be
/// inspected after the display has been handed to a frame loop.
#[derive(Debug, Default)]
pub struct ScriptedDisplay {
    events: std::collections::VecDeque<DisplayEvent>,
    presented: std::sync::Arc<std::sync::Mutex<Vec<u64>>>,
}

impl ScriptedDisplay {
    pub fn new(events: impl IntoIterator<Item = DisplayEvent>) -> Self {
        Self {
            events: events.into_iter().collect(),
            presented: Default::default(),
        }
    }

    pub fn presented_log(&self) -> std::sync::Arc<std::sync::Mutex<Vec<u64>>> {
        self.presented.clone()
    }
}

impl Display for ScriptedDisplay {
    fn present(&mut self, frame: &Frame) -> Result<DisplayEvent> {
        if let Ok(mut log) = self.presented.lock() {
            log.push(frame.index);
        }
        Ok(self.events.pop_front().unwrap_or(DisplayEvent::Continue))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    #[test]
    fn scripted_display_replays_events() -> Result<()> {
        let mut display = ScriptedDisplay::new([DisplayEvent::Continue, DisplayEvent::Quit]);
        let frame = Frame::new(RgbImage::new(2, 2), 7);
        assert_eq!(display.present(&frame)?, DisplayEvent::Continue);
        assert_eq!(display.present(&frame)?, DisplayEvent::Quit);
        assert_eq!(display.present(&frame)?, DisplayEvent::Continue);
        assert_eq!(*display.presented_log().lock().unwrap(), vec![7, 7, 7]);
        Ok(())
    }
}
