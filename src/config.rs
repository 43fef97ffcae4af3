use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::detect::{DetectorParams, DEFAULT_IOU_THRESHOLD};
use crate::ingest::VideoInput;
use crate::safety::SafetyRules;

const DEFAULT_DETECTION_THRESHOLD: f32 = 0.4;
const DEFAULT_POSE_THRESHOLD: f32 = 0.4;
const DEFAULT_IMAGE_INPUT: &str = "input.jpg";

/// Detector + pose model pairs this build knows how to run.
pub const MODEL_TYPES: [&str; 1] = ["yolox_poseresnet"];
pub const DEFAULT_MODEL_TYPE: &str = MODEL_TYPES[0];

/// Environment variable naming the settings file.
pub const CONFIG_ENV: &str = "SAFETY_CONFIG";

/// Saved settings, as written by "Save settings" and read by "Load settings".
///
/// Thresholds may be stored as numbers or as the text of an entry field;
/// empty path strings mean "not set".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detection_threshold: Option<Threshold>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pose_threshold: Option<Threshold>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_fallen: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_sitting: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub savepath: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csvpath: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imgpath: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Threshold {
    Number(f32),
    Text(String),
}

impl Threshold {
    pub fn value(&self, key: &str) -> Result<f32> {
        match self {
            Self::Number(value) => Ok(*value),
            Self::Text(text) => text
                .trim()
                .parse()
                .map_err(|_| anyhow!("{} must be a number, got '{}'", key, text)),
        }
    }
}

impl SettingsFile {
    /// Read JSON settings, or TOML when the file ends in `.toml`.
    pub fn read(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("failed to read settings file {}: {}", path.display(), e))?;
        let settings = if is_toml(path) {
            toml::from_str(&raw)
                .map_err(|e| anyhow!("invalid settings file {}: {}", path.display(), e))?
        } else {
            serde_json::from_str(&raw)
                .map_err(|e| anyhow!("invalid settings file {}: {}", path.display(), e))?
        };
        Ok(settings)
    }

    /// Write the settings in the format implied by the extension.
    pub fn save(&self, path: &Path) -> Result<()> {
        let raw = if is_toml(path) {
            toml::to_string_pretty(self).context("serialize settings as TOML")?
        } else {
            serde_json::to_string_pretty(self).context("serialize settings as JSON")?
        };
        std::fs::write(path, raw)
            .with_context(|| format!("failed to write settings file {}", path.display()))?;
        log::info!("saved settings to {}", path.display());
        Ok(())
    }
}

fn is_toml(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("toml"))
        .unwrap_or(false)
}

/// What the run reads frames from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSelection {
    Video(VideoInput),
    /// Still images, processed one by one without decimation.
    Images(Vec<PathBuf>),
}

impl Default for InputSelection {
    fn default() -> Self {
        Self::Images(vec![PathBuf::from(DEFAULT_IMAGE_INPUT)])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputPaths {
    /// Video file in video mode, file or directory in image mode.
    pub savepath: Option<PathBuf>,
    pub csvpath: Option<PathBuf>,
    /// Directory receiving one image per processed frame.
    pub imgpath: Option<PathBuf>,
}

/// Fully resolved run configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SafetyConfig {
    pub model_type: String,
    pub detection_threshold: f32,
    pub pose_threshold: f32,
    pub category_fallen: bool,
    pub category_sitting: bool,
    /// Flip processed frames upside down before detection.
    pub reverse: bool,
    /// Accelerator selector, forwarded to backends that understand it.
    pub env_id: Option<u32>,
    pub input: InputSelection,
    pub outputs: OutputPaths,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            model_type: DEFAULT_MODEL_TYPE.to_string(),
            detection_threshold: DEFAULT_DETECTION_THRESHOLD,
            pose_threshold: DEFAULT_POSE_THRESHOLD,
            category_fallen: false,
            category_sitting: false,
            reverse: false,
            env_id: None,
            input: InputSelection::default(),
            outputs: OutputPaths::default(),
        }
    }
}

/// Command-line level overrides; `None` leaves the lower layer in place.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub model_type: Option<String>,
    pub detection_threshold: Option<f32>,
    pub pose_threshold: Option<f32>,
    pub category_fallen: bool,
    pub category_sitting: bool,
    pub reverse: bool,
    pub env_id: Option<u32>,
    pub input: Option<InputSelection>,
    pub savepath: Option<PathBuf>,
    pub csvpath: Option<PathBuf>,
    pub imgpath: Option<PathBuf>,
}

impl SafetyConfig {
    /// Defaults, then the settings file (`settings` or `$SAFETY_CONFIG`), then
    /// environment overrides, then validation.
    pub fn load(settings: Option<&Path>) -> Result<Self> {
        let cfg = Self::load_layers(settings)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// File and environment layers without validation, so a caller can stack
    /// its own overrides before calling `validate`.
    pub fn load_layers(settings: Option<&Path>) -> Result<Self> {
        let path = settings
            .map(Path::to_path_buf)
            .or_else(|| env_path(CONFIG_ENV));
        let file_cfg = match path.as_deref() {
            Some(path) => Some(SettingsFile::read(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        Ok(cfg)
    }

    pub fn from_file(file: SettingsFile) -> Result<Self> {
        let defaults = Self::default();
        let detection_threshold = match &file.detection_threshold {
            Some(t) => t.value("detection_threshold")?,
            None => defaults.detection_threshold,
        };
        let pose_threshold = match &file.pose_threshold {
            Some(t) => t.value("pose_threshold")?,
            None => defaults.pose_threshold,
        };
        Ok(Self {
            model_type: file.model_type.unwrap_or(defaults.model_type),
            detection_threshold,
            pose_threshold,
            category_fallen: file.category_fallen.unwrap_or(defaults.category_fallen),
            category_sitting: file.category_sitting.unwrap_or(defaults.category_sitting),
            outputs: OutputPaths {
                savepath: non_empty_path(file.savepath),
                csvpath: non_empty_path(file.csvpath),
                imgpath: non_empty_path(file.imgpath),
            },
            ..defaults
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(value) = std::env::var("SAFETY_DETECTION_THRESHOLD") {
            self.detection_threshold = value.trim().parse().map_err(|_| {
                anyhow!("SAFETY_DETECTION_THRESHOLD must be a number, got '{}'", value)
            })?;
        }
        if let Ok(value) = std::env::var("SAFETY_POSE_THRESHOLD") {
            self.pose_threshold = value
                .trim()
                .parse()
                .map_err(|_| anyhow!("SAFETY_POSE_THRESHOLD must be a number, got '{}'", value))?;
        }
        if let Ok(value) = std::env::var("SAFETY_ENV_ID") {
            if !value.trim().is_empty() {
                let id = value
                    .trim()
                    .parse()
                    .map_err(|_| anyhow!("SAFETY_ENV_ID must be a non-negative integer"))?;
                self.env_id = Some(id);
            }
        }
        if let Some(path) = env_path("SAFETY_SAVEPATH") {
            self.outputs.savepath = Some(path);
        }
        if let Some(path) = env_path("SAFETY_CSVPATH") {
            self.outputs.csvpath = Some(path);
        }
        if let Some(path) = env_path("SAFETY_IMGPATH") {
            self.outputs.imgpath = Some(path);
        }
        Ok(())
    }

    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(model_type) = overrides.model_type {
            self.model_type = model_type;
        }
        if let Some(value) = overrides.detection_threshold {
            self.detection_threshold = value;
        }
        if let Some(value) = overrides.pose_threshold {
            self.pose_threshold = value;
        }
        self.category_fallen |= overrides.category_fallen;
        self.category_sitting |= overrides.category_sitting;
        self.reverse |= overrides.reverse;
        if overrides.env_id.is_some() {
            self.env_id = overrides.env_id;
        }
        if let Some(input) = overrides.input {
            self.input = input;
        }
        if overrides.savepath.is_some() {
            self.outputs.savepath = overrides.savepath;
        }
        if overrides.csvpath.is_some() {
            self.outputs.csvpath = overrides.csvpath;
        }
        if overrides.imgpath.is_some() {
            self.outputs.imgpath = overrides.imgpath;
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (key, value) in [
            ("detection_threshold", self.detection_threshold),
            ("pose_threshold", self.pose_threshold),
        ] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(anyhow!("{} must be within [0, 1], got {}", key, value));
            }
        }
        if !MODEL_TYPES.contains(&self.model_type.as_str()) {
            return Err(anyhow!(
                "unknown model_type '{}' (known: {})",
                self.model_type,
                MODEL_TYPES.join(", ")
            ));
        }
        if let InputSelection::Images(paths) = &self.input {
            if paths.is_empty() {
                return Err(anyhow!("image mode needs at least one input path"));
            }
        }
        Ok(())
    }

    pub fn rules(&self) -> SafetyRules {
        SafetyRules {
            sitting: self.category_sitting,
            fallen: self.category_fallen,
            pose_threshold: self.pose_threshold,
        }
    }

    pub fn detector_params(&self) -> DetectorParams {
        DetectorParams {
            confidence_threshold: self.detection_threshold,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
        }
    }

    /// The persisted subset, with unset paths written as empty strings.
    pub fn to_settings(&self) -> SettingsFile {
        let path_text = |p: &Option<PathBuf>| {
            Some(
                p.as_ref()
                    .map(|p| p.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            )
        };
        SettingsFile {
            model_type: Some(self.model_type.clone()),
            detection_threshold: Some(Threshold::Number(self.detection_threshold)),
            pose_threshold: Some(Threshold::Number(self.pose_threshold)),
            category_fallen: Some(self.category_fallen),
            category_sitting: Some(self.category_sitting),
            savepath: path_text(&self.outputs.savepath),
            csvpath: path_text(&self.outputs.csvpath),
            imgpath: path_text(&self.outputs.imgpath),
        }
    }
}

fn non_empty_path(value: Option<String>) -> Option<PathBuf> {
    value
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
}
