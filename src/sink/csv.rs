use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::FrameSink;
use crate::frame::Frame;
use crate::pipeline::FrameAnalysis;

pub const CSV_HEADER: &str = "frame,detection,confidence,x1,y1,x2,y2,safe,reason";

/// One row per classified person. Detections without a pose produce no row.
pub struct CsvSink {
    path: PathBuf,
    out: BufWriter<File>,
    rows: u64,
}

impl CsvSink {
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("failed to create CSV output {}", path.display()))?;
        let mut out = BufWriter::new(file);
        writeln!(out, "{}", CSV_HEADER)?;
        Ok(Self {
            path: path.to_path_buf(),
            out,
            rows: 0,
        })
    }
}

impl FrameSink for CsvSink {
    fn name(&self) -> &'static str {
        "csv"
    }

    fn write(&mut self, frame: &Frame, analysis: &FrameAnalysis) -> Result<()> {
        for (i, (detection, person)) in analysis
            .detections
            .iter()
            .zip(analysis.persons.iter())
            .enumerate()
        {
            let Some(person) = person else {
                continue;
            };
            let b = &detection.bbox;
            writeln!(
                self.out,
                "{},{},{:.3},{:.1},{:.1},{:.1},{:.1},{},{}",
                frame.index,
                i,
                detection.confidence,
                b.x1,
                b.y1,
                b.x2,
                b.y2,
                person.verdict.safe as u8,
                quote(&person.verdict.reason)
            )?;
            self.rows += 1;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.out
            .flush()
            .with_context(|| format!("failed to flush {}", self.path.display()))?;
        log::info!("wrote {} row(s) to {}", self.rows, self.path.display());
        Ok(())
    }
}

fn quote(field: &str) -> String {
    if field.contains([',', '"', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{BBox, Detection, ObjectCategory};
    use crate::pipeline::PersonOutcome;
    use crate::pose::{CropRegion, Pose};
    use crate::safety::Verdict;
    use image::RgbImage;

    #[test]
    fn rows_for_posed_persons_only() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("out.csv");
        let mut sink = CsvSink::create(&path)?;

        let bbox = BBox { x1: 10.0, y1: 20.0, x2: 30.0, y2: 60.0 };
        let analysis = FrameAnalysis {
            detections: vec![
                Detection::new(bbox, ObjectCategory::Other(2), 0.7),
                Detection::new(bbox, ObjectCategory::Person, 0.9),
            ],
            persons: vec![
                None,
                Some(PersonOutcome {
                    crop: CropRegion::from_pixels(10, 20, 30, 40, 100, 100),
                    pose: Pose::default(),
                    verdict: Verdict::unsafe_because("(Hip > Knee)"),
                }),
            ],
        };
        sink.write(&Frame::new(RgbImage::new(100, 100), 30), &analysis)?;
        sink.finish()?;

        let text = std::fs::read_to_string(&path)?;
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], CSV_HEADER);
        assert_eq!(lines[1], "30,1,0.900,10.0,20.0,30.0,60.0,0,(Hip > Knee)");
        assert_eq!(lines.len(), 2);
        Ok(())
    }

    #[test]
    fn quoting() {
        assert_eq!(quote("plain"), "plain");
        assert_eq!(quote("a,b"), "\"a,b\"");
        assert_eq!(quote("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
