//! safety_detection - Flag unsafe postures in video or still images.
//!
//! This tool:
//! 1. Resolves settings (file, environment, flags)
//! 2. Makes sure the detector and pose models are available
//! 3. Runs detection + pose + safety rules on a supervised thread
//! 4. Writes annotated video / images / CSV and optionally shows a preview
//!
//! Ctrl-C cancels the run at the next frame boundary.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};

use safety_detection::config::{ConfigOverrides, InputSelection, SafetyConfig};
use safety_detection::detect::{PersonDetector, PoseEstimator, StubDetector, StubPoseEstimator};
use safety_detection::ingest::{open_video, VideoInput, DEFAULT_FRAME_RATE};
use safety_detection::models::{model_pair, DEFAULT_MODEL_DIR};
use safety_detection::run::{run_images, FrameLoop, ImageRunOptions};
use safety_detection::sink::{video_output_available, CsvSink, FrameSink, ImageSink, VideoWriter};
use safety_detection::{CancelToken, PipelineStage, RunSupervisor};

#[path = "../ui.rs"]
mod ui;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Backend {
    /// YOLOX-S + PoseResNet-50 ONNX models via tract
    Tract,
    /// Scripted detector and pose (no models needed)
    Stub,
}

#[derive(Parser, Debug)]
#[command(
    name = "safety_detection",
    version,
    about = "Detect fallen or sitting people with person detection and pose estimation"
)]
struct Args {
    /// Video file, camera index, or stub://name for a synthetic stream
    #[arg(short, long, value_name = "PATH|INDEX")]
    video: Option<String>,

    /// Input image(s); used when --video is not given
    #[arg(short, long, value_name = "PATH", num_args = 1..)]
    input: Vec<PathBuf>,

    /// Annotated output (video file, or image file/directory in image mode)
    #[arg(short, long, value_name = "PATH")]
    savepath: Option<PathBuf>,

    /// CSV file receiving one row per classified person
    #[arg(long, value_name = "PATH")]
    csvpath: Option<PathBuf>,

    /// Directory receiving every processed frame as PNG
    #[arg(long, value_name = "DIR")]
    imgpath: Option<PathBuf>,

    /// Person detection confidence threshold
    #[arg(long = "detection_threshold", visible_alias = "th", value_name = "T")]
    detection_threshold: Option<f32>,

    /// Keypoint confidence threshold for rules and skeleton drawing
    #[arg(short, long = "pose_threshold", value_name = "T")]
    pose_threshold: Option<f32>,

    /// Flag people whose head-to-body angle looks fallen
    #[arg(long = "category_fallen")]
    category_fallen: bool,

    /// Flag people whose hips are below their knees
    #[arg(long = "category_sitting")]
    category_sitting: bool,

    /// Flip frames upside down before detection
    #[arg(long)]
    reverse: bool,

    /// Accelerator selector forwarded to the inference backend
    #[arg(long = "env_id", value_name = "ID")]
    env_id: Option<u32>,

    /// Detector + pose model pair
    #[arg(long = "model_type", value_name = "NAME")]
    model_type: Option<String>,

    /// Settings file (JSON, or TOML with a .toml extension)
    #[arg(long, env = "SAFETY_CONFIG", value_name = "PATH")]
    settings: Option<PathBuf>,

    /// Write the resolved settings to this file
    #[arg(long = "save-settings", value_name = "PATH")]
    save_settings: Option<PathBuf>,

    /// Directory holding (or receiving) the model files
    #[arg(long = "model-dir", default_value = DEFAULT_MODEL_DIR, value_name = "DIR")]
    model_dir: PathBuf,

    /// Inference backend
    #[arg(long, value_enum, default_value = "tract")]
    backend: Backend,

    /// Do not open a preview window
    #[arg(long = "no-display")]
    no_display: bool,

    /// Image mode: time repeated analysis passes per image
    #[arg(long)]
    benchmark: bool,

    /// stderr progress style
    #[arg(long, value_enum, default_value_t = ui::UiMode::Auto)]
    ui: ui::UiMode,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let ui = ui::Ui::new(args.ui);

    let cfg = {
        let _stage = ui.stage("Resolve settings");
        resolve_config(&args)?
    };
    if let Some(path) = &args.save_settings {
        cfg.to_settings().save(path)?;
    }

    let models = match args.backend {
        Backend::Tract => {
            let _stage = ui.stage("Load models");
            let (detector, pose) = model_pair(&cfg.model_type)?;
            Some((
                detector.ensure_available(&args.model_dir)?,
                pose.ensure_available(&args.model_dir)?,
            ))
        }
        Backend::Stub => None,
    };

    let job = Job {
        cfg,
        backend: args.backend,
        models,
        display: !args.no_display,
        benchmark: args.benchmark,
        ui: ui.clone(),
    };

    let mut supervisor = RunSupervisor::new();
    let token = supervisor.start("safety-run", move |token| job.run(&token))?;
    ctrlc::set_handler(move || {
        log::info!("interrupt received, stopping run...");
        token.cancel();
    })
    .expect("error setting Ctrl-C handler");

    supervisor.wait()?;
    Ok(())
}

fn resolve_config(args: &Args) -> Result<SafetyConfig> {
    let mut cfg = SafetyConfig::load_layers(args.settings.as_deref())?;
    let input = match (&args.video, args.input.is_empty()) {
        (Some(video), _) => Some(InputSelection::Video(VideoInput::parse(video)?)),
        (None, false) => Some(InputSelection::Images(args.input.clone())),
        (None, true) => None,
    };
    cfg.apply_overrides(ConfigOverrides {
        model_type: args.model_type.clone(),
        detection_threshold: args.detection_threshold,
        pose_threshold: args.pose_threshold,
        category_fallen: args.category_fallen,
        category_sitting: args.category_sitting,
        reverse: args.reverse,
        env_id: args.env_id,
        input,
        savepath: args.savepath.clone(),
        csvpath: args.csvpath.clone(),
        imgpath: args.imgpath.clone(),
    });
    cfg.validate()?;
    if let (InputSelection::Video(_), Some(path)) = (&cfg.input, &cfg.outputs.savepath) {
        if !video_output_available() {
            return Err(anyhow!(
                "cannot save video to {}: rebuild with --features ingest-file-ffmpeg",
                path.display()
            ));
        }
    }
    log::info!(
        "model_type={} detection_threshold={} pose_threshold={} fallen={} sitting={}",
        cfg.model_type,
        cfg.detection_threshold,
        cfg.pose_threshold,
        cfg.category_fallen,
        cfg.category_sitting
    );
    Ok(cfg)
}

/// Everything the run thread needs; sources and windows are opened there.
struct Job {
    cfg: SafetyConfig,
    backend: Backend,
    models: Option<(PathBuf, PathBuf)>,
    display: bool,
    benchmark: bool,
    ui: ui::Ui,
}

impl Job {
    fn run(self, token: &CancelToken) -> Result<()> {
        let mut stage = {
            let _stage = self.ui.stage("Prepare backends");
            let mut stage = PipelineStage::new(
                self.detector()?,
                self.estimator()?,
                self.cfg.rules(),
                self.cfg.detector_params(),
            );
            stage.warm_up()?;
            stage
        };

        match &self.cfg.input {
            InputSelection::Video(input) => self.run_video(input, stage, token),
            InputSelection::Images(paths) => {
                let mut sinks: Vec<Box<dyn FrameSink>> = Vec::new();
                if let Some(path) = &self.cfg.outputs.csvpath {
                    sinks.push(Box::new(CsvSink::create(path)?));
                }
                let options = ImageRunOptions {
                    savepath: self.cfg.outputs.savepath.clone(),
                    benchmark: self.benchmark,
                };
                let bar = self.ui.images(paths.len());
                let reports = run_images(&mut stage, paths.clone(), &options, &mut sinks, token, |r| {
                    bar.set_message(r.output.display().to_string());
                    bar.inc(1);
                })?;
                bar.finish_and_clear();
                let flagged = reports.iter().map(|r| r.analysis.unsafe_count()).sum::<usize>();
                log::info!("{} image(s) written, {} not-safe persons", reports.len(), flagged);
                Ok(())
            }
        }
    }

    fn run_video(&self, input: &VideoInput, stage: PipelineStage, token: &CancelToken) -> Result<()> {
        let source = {
            let _stage = self.ui.stage("Open source");
            open_video(input).with_context(|| format!("failed to open video input {}", input))?
        };
        let fps = source.frame_rate().unwrap_or(DEFAULT_FRAME_RATE);

        let mut frame_loop = FrameLoop::new(source, stage).reverse(self.cfg.reverse);
        let outputs = &self.cfg.outputs;
        if let Some(path) = &outputs.savepath {
            frame_loop = frame_loop.with_sink(Box::new(VideoWriter::create(path, fps)?));
        }
        if let Some(path) = &outputs.csvpath {
            frame_loop = frame_loop.with_sink(Box::new(CsvSink::create(path)?));
        }
        if let Some(dir) = &outputs.imgpath {
            frame_loop = frame_loop.with_sink(Box::new(ImageSink::create(dir)?));
        }
        if self.display {
            frame_loop = with_preview(frame_loop);
        }

        let summary = frame_loop.run(token)?;
        eprintln!(
            "{:?}: {} frames read, {} processed, {} not-safe persons",
            summary.stop_reason,
            summary.frames_read,
            summary.frames_processed,
            summary.unsafe_persons
        );
        Ok(())
    }

    fn detector(&self) -> Result<Box<dyn PersonDetector>> {
        match self.backend {
            Backend::Stub => Ok(Box::new(StubDetector::new())),
            Backend::Tract => {
                let (path, _) = self.model_paths()?;
                tract_detector(path, self.cfg.env_id)
            }
        }
    }

    fn estimator(&self) -> Result<Box<dyn PoseEstimator>> {
        match self.backend {
            Backend::Stub => Ok(Box::new(StubPoseEstimator::new())),
            Backend::Tract => {
                let (_, path) = self.model_paths()?;
                tract_estimator(path)
            }
        }
    }

    fn model_paths(&self) -> Result<(&Path, &Path)> {
        self.models
            .as_ref()
            .map(|(d, p)| (d.as_path(), p.as_path()))
            .ok_or_else(|| anyhow!("model paths not resolved"))
    }
}

#[cfg(feature = "backend-tract")]
fn tract_detector(path: &Path, env_id: Option<u32>) -> Result<Box<dyn PersonDetector>> {
    if let Some(id) = env_id {
        log::info!("env_id {} requested; tract runs on the CPU", id);
    }
    Ok(Box::new(safety_detection::detect::TractYoloxDetector::new(path)?))
}

#[cfg(not(feature = "backend-tract"))]
fn tract_detector(_path: &Path, _env_id: Option<u32>) -> Result<Box<dyn PersonDetector>> {
    Err(anyhow!(
        "tract backend not built; rebuild with --features backend-tract or pass --backend stub"
    ))
}

#[cfg(feature = "backend-tract")]
fn tract_estimator(path: &Path) -> Result<Box<dyn PoseEstimator>> {
    Ok(Box::new(safety_detection::detect::TractPoseResnet::new(path)?))
}

#[cfg(not(feature = "backend-tract"))]
fn tract_estimator(_path: &Path) -> Result<Box<dyn PoseEstimator>> {
    Err(anyhow!(
        "tract backend not built; rebuild with --features backend-tract or pass --backend stub"
    ))
}

#[cfg(feature = "display")]
fn with_preview(frame_loop: FrameLoop) -> FrameLoop {
    frame_loop.with_display(Box::new(safety_detection::display::MinifbDisplay::new(
        "safety detection (q to quit)",
    )))
}

#[cfg(not(feature = "display"))]
fn with_preview(frame_loop: FrameLoop) -> FrameLoop {
    log::warn!("preview requested but this build has no display support; continuing headless");
    frame_loop
}
