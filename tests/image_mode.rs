use std::path::{Path, PathBuf};

use anyhow::Result;
use image::{Rgb, RgbImage};

use safety_detection::detect::{upright_pose, StubDetector, StubPoseEstimator};
use safety_detection::run::{run_images, ImageRunOptions};
use safety_detection::sink::{CsvSink, FrameSink};
use safety_detection::{
    CancelToken, DetectorParams, Keypoint, KeypointIndex, PipelineStage, SafetyRules,
};

fn write_image(dir: &Path, name: &str) -> Result<PathBuf> {
    let path = dir.join(name);
    RgbImage::from_pixel(96, 72, Rgb([40, 40, 40])).save(&path)?;
    Ok(path)
}

fn sitting_stage() -> PipelineStage {
    let mut pose = upright_pose();
    pose.set(KeypointIndex::LeftHip, Keypoint::new(0.58, 0.80, 0.9));
    PipelineStage::new(
        Box::new(StubDetector::new()),
        Box::new(StubPoseEstimator::with_pose(pose)),
        SafetyRules {
            sitting: true,
            fallen: true,
            ..SafetyRules::default()
        },
        DetectorParams::default(),
    )
}

#[test]
fn every_image_is_processed_and_saved() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let inputs: Vec<PathBuf> = (0..3)
        .map(|i| write_image(dir.path(), &format!("person{}.png", i)))
        .collect::<Result<_>>()?;
    let out_dir = dir.path().join("annotated");
    let csv = dir.path().join("persons.csv");

    let mut sinks: Vec<Box<dyn FrameSink>> = vec![Box::new(CsvSink::create(&csv)?)];
    let mut written = Vec::new();
    let reports = run_images(
        &mut sitting_stage(),
        inputs.clone(),
        &ImageRunOptions {
            savepath: Some(out_dir.clone()),
            benchmark: false,
        },
        &mut sinks,
        &CancelToken::new(),
        |report| written.push(report.output.clone()),
    )?;

    assert_eq!(reports.len(), 3);
    for (i, report) in reports.iter().enumerate() {
        assert_eq!(report.input, inputs[i]);
        assert_eq!(report.output, out_dir.join(format!("person{}_res.png", i)));
        assert!(report.output.is_file());
        assert_eq!(report.analysis.unsafe_count(), 1);
        let (_, person) = report.analysis.classified().next().expect("classified person");
        assert_eq!(person.verdict.reason, "(Hip > Knee)");
    }
    assert_eq!(written.len(), 3);

    let rows = std::fs::read_to_string(&csv)?;
    assert_eq!(rows.lines().count(), 4);
    assert!(rows.lines().skip(1).all(|l| l.ends_with(",0,(Hip > Knee)")));
    Ok(())
}

#[test]
fn annotated_output_differs_from_input() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let input = write_image(dir.path(), "scene.png")?;
    let output = dir.path().join("result.png");

    run_images(
        &mut sitting_stage(),
        vec![input.clone()],
        &ImageRunOptions {
            savepath: Some(output.clone()),
            benchmark: true,
        },
        &mut [],
        &CancelToken::new(),
        |_| {},
    )?;

    let before = image::open(&input)?.to_rgb8();
    let after = image::open(&output)?.to_rgb8();
    assert_eq!(before.dimensions(), after.dimensions());
    assert!(after.pixels().any(|p| *p == Rgb([255, 0, 0])));
    assert_ne!(before, after);
    Ok(())
}

#[test]
fn missing_input_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = run_images(
        &mut sitting_stage(),
        vec![dir.path().join("nope.png")],
        &ImageRunOptions::default(),
        &mut [],
        &CancelToken::new(),
        |_| {},
    );
    assert!(result.is_err());
}

#[test]
fn cancelled_run_writes_nothing() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let input = write_image(dir.path(), "scene.png")?;
    let output = dir.path().join("result.png");
    let token = CancelToken::new();
    token.cancel();

    let reports = run_images(
        &mut sitting_stage(),
        vec![input],
        &ImageRunOptions {
            savepath: Some(output.clone()),
            benchmark: false,
        },
        &mut [],
        &token,
        |_| {},
    )?;
    assert!(reports.is_empty());
    assert!(!output.exists());
    Ok(())
}

#[test]
fn cancel_is_seen_before_the_next_image_is_read() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let first = write_image(dir.path(), "first.png")?;
    let missing = dir.path().join("never-written.png");
    let token = CancelToken::new();
    let callback_token = token.clone();

    let reports = run_images(
        &mut sitting_stage(),
        vec![first, missing],
        &ImageRunOptions {
            savepath: Some(dir.path().join("out")),
            benchmark: false,
        },
        &mut [],
        &token,
        |_| callback_token.cancel(),
    )?;
    assert_eq!(reports.len(), 1);
    assert!(dir.path().join("out").join("first_res.png").is_file());
    Ok(())
}
