#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use tract_onnx::prelude::*;

use crate::detect::backend::{DetectorParams, PersonDetector, PoseEstimator};
use crate::detect::nms::non_max_suppression;
use crate::detect::result::{BBox, Detection, ObjectCategory, COCO_CATEGORY};
use crate::frame::Frame;
use crate::pose::{Keypoint, KeypointIndex, Pose};

type Plan = SimplePlan<TypedFact, Box<dyn TypedOp>>;

fn load_plan(model_path: &Path, width: usize, height: usize) -> Result<Plan> {
    tract_onnx::onnx()
        .model_for_path(model_path)
        .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
        .with_input_fact(
            0,
            InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, height, width)),
        )
        .context("failed to set input fact")?
        .into_optimized()
        .context("failed to optimize ONNX model")?
        .into_runnable()
        .context("failed to build runnable ONNX model")
}

fn first_output(outputs: &TVec<TValue>) -> Result<tract_ndarray::ArrayViewD<'_, f32>> {
    outputs
        .first()
        .ok_or_else(|| anyhow!("model produced no outputs"))?
        .to_array_view::<f32>()
        .context("model output tensor was not f32")
}

// ----------------------------------------------------------------------------
// YOLOX person detector
// ----------------------------------------------------------------------------

const YOLOX_INPUT: u32 = 640;
const YOLOX_STRIDES: [u32; 3] = [8, 16, 32];
const YOLOX_PAD_VALUE: u8 = 114;

/// YOLOX-S detector over tract.
///
/// Frames are letterboxed into a 640x640 canvas (top-left aligned, gray
/// padding), fed as BGR 0..255 NCHW. Raw grid outputs are decoded here.
pub struct TractYoloxDetector {
    model: Plan,
}

impl TractYoloxDetector {
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        let size = YOLOX_INPUT as usize;
        let model = load_plan(model_path.as_ref(), size, size)?;
        Ok(Self { model })
    }

    /// Returns the input tensor and the resize ratio applied to the frame.
    fn build_input(&self, frame: &Frame) -> Result<(Tensor, f32)> {
        let (w, h) = (frame.width(), frame.height());
        if w == 0 || h == 0 {
            return Err(anyhow!("cannot detect on an empty {}x{} frame", w, h));
        }
        let ratio = (YOLOX_INPUT as f32 / w as f32).min(YOLOX_INPUT as f32 / h as f32);
        let rw = ((w as f32 * ratio) as u32).clamp(1, YOLOX_INPUT);
        let rh = ((h as f32 * ratio) as u32).clamp(1, YOLOX_INPUT);
        let resized = imageops::resize(frame.image(), rw, rh, FilterType::Triangle);

        let mut canvas = RgbImage::from_pixel(
            YOLOX_INPUT,
            YOLOX_INPUT,
            Rgb([YOLOX_PAD_VALUE; 3]),
        );
        imageops::replace(&mut canvas, &resized, 0, 0);

        let size = YOLOX_INPUT as usize;
        let input = tract_ndarray::Array4::from_shape_fn((1, 3, size, size), |(_, c, y, x)| {
            // BGR channel order
            canvas.get_pixel(x as u32, y as u32)[2 - c] as f32
        });
        Ok((input.into_tensor(), ratio))
    }

    fn decode(
        &self,
        outputs: &TVec<TValue>,
        ratio: f32,
        frame_w: u32,
        frame_h: u32,
        params: &DetectorParams,
    ) -> Result<Vec<Detection>> {
        let view = first_output(outputs)?;
        let classes = COCO_CATEGORY.len();
        let stride_len = 5 + classes;
        let flat: Vec<f32> = view.iter().copied().collect();
        if flat.len() % stride_len != 0 {
            return Err(anyhow!(
                "unexpected YOLOX output length {} (row width {})",
                flat.len(),
                stride_len
            ));
        }

        let mut grid = Vec::with_capacity(flat.len() / stride_len);
        for stride in YOLOX_STRIDES {
            let cells = YOLOX_INPUT / stride;
            for gy in 0..cells {
                for gx in 0..cells {
                    grid.push((gx as f32, gy as f32, stride as f32));
                }
            }
        }
        if grid.len() != flat.len() / stride_len {
            return Err(anyhow!(
                "YOLOX output has {} anchors, expected {}",
                flat.len() / stride_len,
                grid.len()
            ));
        }

        let mut candidates = Vec::new();
        for (row, &(gx, gy, stride)) in flat.chunks_exact(stride_len).zip(grid.iter()) {
            let objectness = row[4];
            let (class_id, class_score) = row[5..]
                .iter()
                .copied()
                .enumerate()
                .fold((0usize, f32::NEG_INFINITY), |best, (i, s)| {
                    if s > best.1 {
                        (i, s)
                    } else {
                        best
                    }
                });
            let score = objectness * class_score;
            if !(score > params.confidence_threshold) {
                continue;
            }

            let cx = (row[0] + gx) * stride;
            let cy = (row[1] + gy) * stride;
            let bw = row[2].exp() * stride;
            let bh = row[3].exp() * stride;
            let bbox = BBox {
                x1: (cx - bw / 2.0) / ratio,
                y1: (cy - bh / 2.0) / ratio,
                x2: (cx + bw / 2.0) / ratio,
                y2: (cy + bh / 2.0) / ratio,
            }
            .clamp_to(frame_w, frame_h);

            candidates.push(Detection::new(
                bbox,
                ObjectCategory::from_coco_index(class_id),
                score,
            ));
        }

        Ok(non_max_suppression(candidates, params.iou_threshold))
    }
}

impl PersonDetector for TractYoloxDetector {
    fn name(&self) -> &'static str {
        "tract-yolox"
    }

    fn detect(&mut self, frame: &Frame, params: &DetectorParams) -> Result<Vec<Detection>> {
        let (input, ratio) = self.build_input(frame)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("YOLOX inference failed")?;
        self.decode(&outputs, ratio, frame.width(), frame.height(), params)
    }

    fn warm_up(&mut self) -> Result<()> {
        let blank = Frame::new(RgbImage::new(YOLOX_INPUT, YOLOX_INPUT), 0);
        self.detect(&blank, &DetectorParams::default()).map(|_| ())
    }
}

// ----------------------------------------------------------------------------
// Pose ResNet estimator
// ----------------------------------------------------------------------------

const POSE_INPUT_W: u32 = 192;
const POSE_INPUT_H: u32 = 256;
const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// pose_resnet_50_256x192 over tract.
///
/// Output heatmaps are `[1, 17, 64, 48]`. Each joint takes the heatmap argmax,
/// nudged a quarter cell toward the higher neighbor, normalized by the
/// heatmap size. The heatmap peak is the joint confidence.
pub struct TractPoseResnet {
    model: Plan,
}

impl TractPoseResnet {
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        let model = load_plan(
            model_path.as_ref(),
            POSE_INPUT_W as usize,
            POSE_INPUT_H as usize,
        )?;
        Ok(Self { model })
    }

    fn build_input(&self, crop: &RgbImage) -> Result<Tensor> {
        if crop.width() == 0 || crop.height() == 0 {
            return Err(anyhow!("empty pose crop"));
        }
        let resized = imageops::resize(crop, POSE_INPUT_W, POSE_INPUT_H, FilterType::Triangle);
        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, POSE_INPUT_H as usize, POSE_INPUT_W as usize),
            |(_, c, y, x)| {
                let v = resized.get_pixel(x as u32, y as u32)[c] as f32 / 255.0;
                (v - IMAGENET_MEAN[c]) / IMAGENET_STD[c]
            },
        );
        Ok(input.into_tensor())
    }
}

/// Decode `[1, joints, h, w]` heatmaps into normalized joints.
fn decode_heatmaps(view: &tract_ndarray::ArrayViewD<'_, f32>) -> Result<Pose> {
    let shape = view.shape();
    if shape.len() != 4 || shape[1] < KeypointIndex::COCO_COUNT {
        return Err(anyhow!("unexpected heatmap shape {:?}", shape));
    }
    let (hh, hw) = (shape[2], shape[3]);
    if hh == 0 || hw == 0 {
        return Err(anyhow!("empty heatmap {:?}", shape));
    }

    let mut joints = [Keypoint::default(); KeypointIndex::COCO_COUNT];
    for (j, joint) in joints.iter_mut().enumerate() {
        let at = |y: usize, x: usize| view[&[0, j, y, x][..]];

        let mut best = (0usize, 0usize, f32::NEG_INFINITY);
        for y in 0..hh {
            for x in 0..hw {
                let v = at(y, x);
                if v > best.2 {
                    best = (x, y, v);
                }
            }
        }
        let (bx, by, peak) = best;

        let mut px = bx as f32;
        let mut py = by as f32;
        if bx > 0 && bx + 1 < hw {
            px += 0.25 * sign(at(by, bx + 1) - at(by, bx - 1));
        }
        if by > 0 && by + 1 < hh {
            py += 0.25 * sign(at(by + 1, bx) - at(by - 1, bx));
        }

        *joint = Keypoint::new(px / hw as f32, py / hh as f32, peak.max(0.0));
    }
    Ok(Pose::from_coco(joints))
}

/// -1, 0 or 1. Unlike `f32::signum`, zero maps to zero.
fn sign(v: f32) -> f32 {
    if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else {
        0.0
    }
}

impl PoseEstimator for TractPoseResnet {
    fn name(&self) -> &'static str {
        "tract-pose-resnet"
    }

    fn estimate(&mut self, crop: &RgbImage) -> Result<Pose> {
        let input = self.build_input(crop)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("pose inference failed")?;
        let view = first_output(&outputs)?;
        decode_heatmaps(&view)
    }

    fn warm_up(&mut self) -> Result<()> {
        self.estimate(&RgbImage::new(POSE_INPUT_W, POSE_INPUT_H))
            .map(|_| ())
    }
}
