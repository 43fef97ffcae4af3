//! Frame loop over a video source, and the one-shot image mode.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::display::{Display, DisplayEvent};
use crate::ingest::{FrameSource, ImageListSource};
use crate::pipeline::{FrameAnalysis, PipelineStage};
use crate::sink::{image_output_path, FrameSink};
use crate::supervisor::CancelToken;

/// Only every N-th frame read from a video source is processed.
pub const DECIMATION_INTERVAL: u64 = 10;

/// Analysis passes timed per image when benchmarking.
pub const BENCHMARK_PASSES: u32 = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    EndOfStream,
    QuitRequested,
    WindowClosed,
    Cancelled,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Stopped(StopReason),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoopSummary {
    pub frames_read: u64,
    pub frames_processed: u64,
    pub unsafe_persons: u64,
    pub stop_reason: StopReason,
}

pub struct FrameLoop {
    source: Box<dyn FrameSource>,
    stage: PipelineStage,
    sinks: Vec<Box<dyn FrameSink>>,
    display: Option<Box<dyn Display>>,
    reverse: bool,
    counter: u64,
    processed: u64,
    unsafe_persons: u64,
    state: LoopState,
}

impl FrameLoop {
    pub fn new(source: Box<dyn FrameSource>, stage: PipelineStage) -> Self {
        Self {
            source,
            stage,
            sinks: Vec::new(),
            display: None,
            reverse: false,
            counter: 0,
            processed: 0,
            unsafe_persons: 0,
            state: LoopState::Running,
        }
    }

    pub fn with_sink(mut self, sink: Box<dyn FrameSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn with_display(mut self, display: Box<dyn Display>) -> Self {
        self.display = Some(display);
        self
    }

    /// Flip processed frames upside down before detection.
    pub fn reverse(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Advance by one frame read.
    pub fn step(&mut self, cancel: &CancelToken) -> Result<LoopState> {
        if let LoopState::Stopped(_) = self.state {
            return Ok(self.state);
        }
        if cancel.is_cancelled() {
            return Ok(self.stop(StopReason::Cancelled));
        }
        let Some(mut frame) = self.source.next_frame()? else {
            return Ok(self.stop(StopReason::EndOfStream));
        };

        let skip = self.counter % DECIMATION_INTERVAL != 0;
        self.counter += 1;
        if skip {
            return Ok(self.state);
        }

        if self.reverse {
            frame.flip_vertical();
        }
        let analysis = self.stage.process(&mut frame)?;
        self.processed += 1;
        self.unsafe_persons += analysis.unsafe_count() as u64;

        for sink in self.sinks.iter_mut() {
            sink.write(&frame, &analysis)
                .with_context(|| format!("{} sink failed on frame {}", sink.name(), frame.index))?;
        }

        if let Some(display) = self.display.as_mut() {
            match display.present(&frame)? {
                DisplayEvent::Continue => {}
                DisplayEvent::Quit => return Ok(self.stop(StopReason::QuitRequested)),
                DisplayEvent::Closed => return Ok(self.stop(StopReason::WindowClosed)),
            }
        }
        Ok(self.state)
    }

    fn stop(&mut self, reason: StopReason) -> LoopState {
        self.state = LoopState::Stopped(reason);
        self.state
    }

    /// Step until stopped, then finish every sink.
    pub fn run(mut self, cancel: &CancelToken) -> Result<LoopSummary> {
        let (detector, estimator) = self.stage.backend_names();
        log::info!(
            "run started: source={} detector={} pose={} sinks={}",
            self.source.describe(),
            detector,
            estimator,
            self.sinks.len()
        );

        let stop_reason = loop {
            match self.step(cancel) {
                Ok(LoopState::Running) => continue,
                Ok(LoopState::Stopped(reason)) => break reason,
                Err(err) => {
                    self.finish_sinks();
                    return Err(err);
                }
            }
        };

        for sink in self.sinks.iter_mut() {
            sink.finish()
                .with_context(|| format!("failed to finish {} sink", sink.name()))?;
        }
        let summary = LoopSummary {
            frames_read: self.counter,
            frames_processed: self.processed,
            unsafe_persons: self.unsafe_persons,
            stop_reason,
        };
        log::info!(
            "run ended ({:?}): {} frames read, {} processed, {} not-safe persons",
            summary.stop_reason,
            summary.frames_read,
            summary.frames_processed,
            summary.unsafe_persons
        );
        Ok(summary)
    }

    fn finish_sinks(&mut self) {
        for sink in self.sinks.iter_mut() {
            if let Err(err) = sink.finish() {
                log::warn!("{} sink did not finish cleanly: {:#}", sink.name(), err);
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Image mode
// ----------------------------------------------------------------------------

#[derive(Clone, Debug, Default)]
pub struct ImageRunOptions {
    /// Output file, or directory receiving `<stem>_res.<ext>`.
    pub savepath: Option<PathBuf>,
    /// Time `BENCHMARK_PASSES` analysis passes per image before the real one.
    pub benchmark: bool,
}

#[derive(Clone, Debug)]
pub struct ImageReport {
    pub input: PathBuf,
    pub output: PathBuf,
    pub analysis: FrameAnalysis,
}

/// Process every image once: no decimation, no display.
///
/// `on_image` is called after each image has been written.
pub fn run_images(
    stage: &mut PipelineStage,
    paths: Vec<PathBuf>,
    options: &ImageRunOptions,
    sinks: &mut [Box<dyn FrameSink>],
    cancel: &CancelToken,
    mut on_image: impl FnMut(&ImageReport),
) -> Result<Vec<ImageReport>> {
    let mut source = ImageListSource::new(paths);
    log::info!("image mode: {}", source.describe());
    let mut reports = Vec::with_capacity(source.len());

    loop {
        if cancel.is_cancelled() {
            log::info!("image mode cancelled after {} image(s)", reports.len());
            break;
        }
        let Some((input, mut frame)) = source.next_image()? else {
            break;
        };
        if options.benchmark {
            benchmark(stage, &frame, &input)?;
        }

        let analysis = stage.process(&mut frame)?;
        let output = image_output_path(options.savepath.as_deref(), &input)?;
        frame
            .image()
            .save(&output)
            .with_context(|| format!("failed to write {}", output.display()))?;
        log::info!(
            "{} -> {} ({} persons, {} not safe)",
            input.display(),
            output.display(),
            analysis.classified().count(),
            analysis.unsafe_count()
        );
        for sink in sinks.iter_mut() {
            sink.write(&frame, &analysis)
                .with_context(|| format!("{} sink failed on {}", sink.name(), input.display()))?;
        }

        let report = ImageReport {
            input,
            output,
            analysis,
        };
        on_image(&report);
        reports.push(report);
    }

    for sink in sinks.iter_mut() {
        sink.finish()
            .with_context(|| format!("failed to finish {} sink", sink.name()))?;
    }
    Ok(reports)
}

fn benchmark(stage: &mut PipelineStage, frame: &crate::frame::Frame, input: &Path) -> Result<()> {
    for pass in 1..=BENCHMARK_PASSES {
        let start = Instant::now();
        stage.analyze(frame)?;
        log::info!(
            "{} pass {}/{}: {} ms",
            input.display(),
            pass,
            BENCHMARK_PASSES,
            start.elapsed().as_millis()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{DetectorParams, StubDetector, StubPoseEstimator};
    use crate::display::ScriptedDisplay;
    use crate::ingest::{SyntheticConfig, SyntheticSource};
    use crate::safety::SafetyRules;

    fn synthetic(frames: u64) -> Box<dyn FrameSource> {
        Box::new(SyntheticSource::new(SyntheticConfig {
            frames,
            width: 64,
            height: 48,
            ..SyntheticConfig::default()
        }))
    }

    fn stage() -> PipelineStage {
        PipelineStage::new(
            Box::new(StubDetector::new()),
            Box::new(StubPoseEstimator::new()),
            SafetyRules::default(),
            DetectorParams::default(),
        )
    }

    #[test]
    fn processes_every_tenth_frame() -> Result<()> {
        let summary = FrameLoop::new(synthetic(25), stage()).run(&CancelToken::new())?;
        assert_eq!(summary.frames_read, 25);
        assert_eq!(summary.frames_processed, 3);
        assert_eq!(summary.stop_reason, StopReason::EndOfStream);
        Ok(())
    }

    #[test]
    fn cancelled_before_first_frame() -> Result<()> {
        let token = CancelToken::new();
        token.cancel();
        let summary = FrameLoop::new(synthetic(25), stage()).run(&token)?;
        assert_eq!(summary.frames_read, 0);
        assert_eq!(summary.stop_reason, StopReason::Cancelled);
        Ok(())
    }

    #[test]
    fn stopped_loop_stays_stopped() -> Result<()> {
        let token = CancelToken::new();
        let mut frame_loop = FrameLoop::new(synthetic(1), stage());
        assert_eq!(frame_loop.step(&token)?, LoopState::Running);
        assert_eq!(
            frame_loop.step(&token)?,
            LoopState::Stopped(StopReason::EndOfStream)
        );
        assert_eq!(
            frame_loop.step(&token)?,
            LoopState::Stopped(StopReason::EndOfStream)
        );
        Ok(())
    }

    #[test]
    fn window_close_stops_the_loop() -> Result<()> {
        let display = ScriptedDisplay::new([DisplayEvent::Continue, DisplayEvent::Closed]);
        let presented = display.presented_log();
        let summary = FrameLoop::new(synthetic(100), stage())
            .with_display(Box::new(display))
            .run(&CancelToken::new())?;
        assert_eq!(summary.stop_reason, StopReason::WindowClosed);
        assert_eq!(summary.frames_processed, 2);
        assert_eq!(*presented.lock().unwrap(), vec![0, 10]);
        Ok(())
    }
}
