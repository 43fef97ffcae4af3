//! Per-frame orchestration.
//!
//! For each detection on a frame: person detections are cropped around their
//! box, passed to the pose estimator, mapped back to frame coordinates and
//! classified. Every other detection keeps its slot as `None` so that
//! `FrameAnalysis::persons[i]` always describes `FrameAnalysis::detections[i]`.

use anyhow::{Context, Result};

use crate::detect::{Detection, DetectorParams, PersonDetector, PoseEstimator};
use crate::frame::Frame;
use crate::pose::{crop_for_pose, CropRegion, Pose};
use crate::render::Renderer;
use crate::safety::{SafetyRules, Verdict};

/// Result of running pose + rules on one person detection.
#[derive(Clone, Debug, PartialEq)]
pub struct PersonOutcome {
    pub crop: CropRegion,
    /// Frame-global normalized keypoints.
    pub pose: Pose,
    pub verdict: Verdict,
}

/// Everything derived from one frame, index-aligned.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameAnalysis {
    pub detections: Vec<Detection>,
    pub persons: Vec<Option<PersonOutcome>>,
}

impl FrameAnalysis {
    /// Pairs of detection and outcome for every posed person.
    pub fn classified(&self) -> impl Iterator<Item = (&Detection, &PersonOutcome)> {
        self.detections
            .iter()
            .zip(self.persons.iter())
            .filter_map(|(d, p)| p.as_ref().map(|p| (d, p)))
    }

    pub fn unsafe_count(&self) -> usize {
        self.classified().filter(|(_, p)| !p.verdict.safe).count()
    }
}

pub struct PipelineStage {
    detector: Box<dyn PersonDetector>,
    estimator: Box<dyn PoseEstimator>,
    rules: SafetyRules,
    params: DetectorParams,
    renderer: Renderer,
}

impl PipelineStage {
    pub fn new(
        detector: Box<dyn PersonDetector>,
        estimator: Box<dyn PoseEstimator>,
        rules: SafetyRules,
        params: DetectorParams,
    ) -> Self {
        Self {
            detector,
            estimator,
            renderer: Renderer::new(rules.pose_threshold),
            rules,
            params,
        }
    }

    pub fn rules(&self) -> &SafetyRules {
        &self.rules
    }

    pub fn backend_names(&self) -> (&'static str, &'static str) {
        (self.detector.name(), self.estimator.name())
    }

    pub fn warm_up(&mut self) -> Result<()> {
        self.detector.warm_up().context("detector warm-up failed")?;
        self.estimator.warm_up().context("pose estimator warm-up failed")?;
        Ok(())
    }

    /// Run the detector, then pose + rules on every person.
    pub fn analyze(&mut self, frame: &Frame) -> Result<FrameAnalysis> {
        let detections = self
            .detector
            .detect(frame, &self.params)
            .with_context(|| format!("detection failed on frame {}", frame.index))?;
        let persons = self.estimate_poses(frame, &detections)?;
        Ok(FrameAnalysis {
            detections,
            persons,
        })
    }

    /// Pose + rules for each detection, `None` for non-persons and degenerate crops.
    pub fn estimate_poses(
        &mut self,
        frame: &Frame,
        detections: &[Detection],
    ) -> Result<Vec<Option<PersonOutcome>>> {
        let aspect = self.estimator.input_aspect();
        let mut persons = Vec::with_capacity(detections.len());
        for (i, detection) in detections.iter().enumerate() {
            if !detection.is_person() {
                log::trace!(
                    "frame {}: detection {} is a {}, no pose",
                    frame.index,
                    i,
                    detection.category.name()
                );
                persons.push(None);
                continue;
            }
            let crop = crop_for_pose(&detection.bbox, frame.width(), frame.height(), aspect);
            let Some(pixels) = frame.crop(&crop) else {
                log::warn!(
                    "frame {}: skipping detection {} with degenerate crop {:?}",
                    frame.index,
                    i,
                    detection.bbox
                );
                persons.push(None);
                continue;
            };
            let local = self
                .estimator
                .estimate(&pixels)
                .with_context(|| format!("pose estimation failed on frame {}", frame.index))?;
            let pose = crop.map_pose(&local);
            let verdict = self.rules.classify(&pose);
            persons.push(Some(PersonOutcome {
                crop,
                pose,
                verdict,
            }));
        }
        Ok(persons)
    }

    /// Draw every classified person onto the frame.
    pub fn render<'a>(&self, frame: &'a mut Frame, analysis: &FrameAnalysis) -> &'a mut Frame {
        for (detection, person) in analysis.classified() {
            self.renderer
                .draw_person(frame, detection, &person.crop, &person.verdict, &person.pose);
        }
        frame
    }

    /// `analyze` followed by `render`.
    pub fn process(&mut self, frame: &mut Frame) -> Result<FrameAnalysis> {
        let analysis = self.analyze(frame)?;
        self.render(frame, &analysis);
        log::debug!(
            "frame {}: {} detections, {} persons, {} not safe",
            frame.index,
            analysis.detections.len(),
            analysis.classified().count(),
            analysis.unsafe_count()
        );
        Ok(analysis)
    }
}
