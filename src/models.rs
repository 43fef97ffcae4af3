//! Detector and pose weights: where they live remotely and where they are
//! cached locally.

use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};

/// A model file and the base URL it is published under.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModelAsset {
    pub file_name: &'static str,
    pub remote_base: &'static str,
}

pub const YOLOX_S: ModelAsset = ModelAsset {
    file_name: "yolox_s.opt.onnx",
    remote_base: "https://storage.googleapis.com/ailia-models/yolox/",
};

pub const POSE_RESNET_50: ModelAsset = ModelAsset {
    file_name: "pose_resnet_50_256x192.onnx",
    remote_base: "https://storage.googleapis.com/ailia-models/pose_resnet/",
};

pub const DEFAULT_MODEL_DIR: &str = "models";

/// Detector and pose assets for a `model_type`.
pub fn model_pair(model_type: &str) -> Result<(ModelAsset, ModelAsset)> {
    match model_type {
        "yolox_poseresnet" => Ok((YOLOX_S, POSE_RESNET_50)),
        other => Err(anyhow!("unknown model_type '{}'", other)),
    }
}

impl ModelAsset {
    pub fn url(&self) -> String {
        format!("{}{}", self.remote_base, self.file_name)
    }

    pub fn local_path(&self, dir: &Path) -> PathBuf {
        dir.join(self.file_name)
    }

    /// Return the cached file, downloading it first when the build allows.
    pub fn ensure_available(&self, dir: &Path) -> Result<PathBuf> {
        let path = self.local_path(dir);
        if path.is_file() {
            log::debug!("model {} found at {}", self.file_name, path.display());
            return Ok(path);
        }
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create model directory {}", dir.display()))?;
        self.download(&path)?;
        Ok(path)
    }

    #[cfg(feature = "model-download")]
    fn download(&self, dest: &Path) -> Result<()> {
        let url = self.url();
        log::info!("downloading {} to {}", url, dest.display());
        let response = ureq::get(&url)
            .call()
            .with_context(|| format!("fetch model from {}", url))?;

        let partial = dest.with_extension("part");
        let mut file = std::fs::File::create(&partial)
            .with_context(|| format!("failed to create {}", partial.display()))?;
        let written = std::io::copy(&mut response.into_reader(), &mut file)
            .with_context(|| format!("download {}", url))?;
        if written == 0 {
            let _ = std::fs::remove_file(&partial);
            return Err(anyhow!("empty model download from {}", url));
        }
        file.sync_all()
            .with_context(|| format!("failed to sync {}", partial.display()))?;
        std::fs::rename(&partial, dest)
            .with_context(|| format!("failed to move model into {}", dest.display()))?;
        log::info!("downloaded {} ({} bytes)", self.file_name, written);
        Ok(())
    }

    #[cfg(not(feature = "model-download"))]
    fn download(&self, dest: &Path) -> Result<()> {
        Err(anyhow!(
            "model {} not found at {}; fetch it from {} or rebuild with --features model-download",
            self.file_name,
            dest.display(),
            self.url()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_for_known_model_type() {
        let (det, pose) = model_pair("yolox_poseresnet").unwrap();
        assert_eq!(det, YOLOX_S);
        assert_eq!(
            pose.url(),
            "https://storage.googleapis.com/ailia-models/pose_resnet/pose_resnet_50_256x192.onnx"
        );
        assert!(model_pair("openpose").is_err());
    }

    #[test]
    fn cached_file_is_returned_without_download() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let cached = dir.path().join(YOLOX_S.file_name);
        std::fs::write(&cached, b"onnx")?;
        assert_eq!(YOLOX_S.ensure_available(dir.path())?, cached);
        Ok(())
    }

    #[cfg(not(feature = "model-download"))]
    #[test]
    fn missing_file_fails_without_download_feature() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let err = POSE_RESNET_50.ensure_available(dir.path()).unwrap_err();
        assert!(err.to_string().contains("pose_resnet_50_256x192.onnx"));
        Ok(())
    }
}
