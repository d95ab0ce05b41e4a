use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::classifier::Classifier;
use emolens_vision::PipelineOptions;

pub static CONFIG_PATH: Lazy<&'static Path> = Lazy::new(|| {
    Path::new(option_env!("EMOLENS_CONFIG_PATH").unwrap_or("/usr/local/etc/emolens/config.toml"))
});

pub static MODEL_PREFIX: Lazy<&'static Path> = Lazy::new(|| {
    Path::new(option_env!("EMOLENS_MODEL_PREFIX").unwrap_or("/usr/local/share/emolens"))
});

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("classifier threshold {name} = {value} is outside [0, 1]")]
    ThresholdRange { name: &'static str, value: f32 },
    #[error("sad_below ({sad_below}) must not exceed happy_above ({happy_above})")]
    ThresholdOrder { sad_below: f32, happy_above: f32 },
    #[error("{name} = {value} is outside [0, 1]")]
    DetectorThreshold { name: &'static str, value: f32 },
    #[error("attribute_input_size must be positive")]
    ZeroInputSize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Policy {
    /// Strict 0.5 split on smile, eyes only decide at exactly 0.5.
    #[default]
    Exact,
    /// Neutral band between `sad_below` and `happy_above`.
    Banded,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ClassifierConfig {
    pub policy: Policy,
    pub happy_above: Option<f32>,
    pub sad_below: Option<f32>,
    pub eyes_closed_below: Option<f32>,
}

impl ClassifierConfig {
    pub fn build(&self) -> Result<Classifier, ConfigError> {
        let base = match self.policy {
            Policy::Exact => Classifier::exact(),
            Policy::Banded => Classifier::banded(),
        };
        let classifier = Classifier {
            happy_above: self.happy_above.unwrap_or(base.happy_above),
            sad_below: self.sad_below.unwrap_or(base.sad_below),
            eyes_closed_below: self.eyes_closed_below.unwrap_or(base.eyes_closed_below),
        };
        for (name, value) in [
            ("happy_above", classifier.happy_above),
            ("sad_below", classifier.sad_below),
            ("eyes_closed_below", classifier.eyes_closed_below),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::ThresholdRange { name, value });
            }
        }
        if classifier.sad_below > classifier.happy_above {
            return Err(ConfigError::ThresholdOrder {
                sad_below: classifier.sad_below,
                happy_above: classifier.happy_above,
            });
        }
        Ok(classifier)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct OverlayConfig {
    pub enabled: bool,
    /// PNG written with the overlay painted over the latest frame.
    pub snapshot: Option<PathBuf>,
    /// TrueType font for labels; boxes only when unset.
    pub font: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub camera: String,
    pub detector_model: PathBuf,
    pub attribute_model: PathBuf,
    pub attribute_input_size: u32,
    pub attribute_logits: bool,
    pub score_threshold: f32,
    pub nms_threshold: f32,
    pub classifier: ClassifierConfig,
    pub overlay: OverlayConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            camera: "/dev/video0".to_string(),
            detector_model: MODEL_PREFIX.join("face_detection_yunet_2023mar.onnx"),
            attribute_model: MODEL_PREFIX.join("face_attributes.onnx"),
            attribute_input_size: 64,
            attribute_logits: false,
            score_threshold: 0.6,
            nms_threshold: 0.3,
            classifier: ClassifierConfig::default(),
            overlay: OverlayConfig::default(),
        }
    }
}

impl Config {
    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            detector_model: self.detector_model.clone(),
            attribute_model: self.attribute_model.clone(),
            attribute_input_size: self.attribute_input_size,
            attribute_logits: self.attribute_logits,
            score_threshold: self.score_threshold,
            nms_threshold: self.nms_threshold,
        }
    }

    /// Reject settings that would only fail once inference runs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.attribute_input_size == 0 {
            return Err(ConfigError::ZeroInputSize);
        }
        for (name, value) in [
            ("score_threshold", self.score_threshold),
            ("nms_threshold", self.nms_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::DetectorThreshold { name, value });
            }
        }
        self.classifier.build()?;
        Ok(())
    }
}

pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = path.unwrap_or(&CONFIG_PATH);
    if !path.exists() {
        return Ok(Config::default());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config at {}", path.display()))?;
    let cfg: Config =
        toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validating config {}", path.display()))?;
    Ok(cfg)
}

pub fn save_config(cfg: &Config, path: Option<&Path>) -> Result<()> {
    let path = path.unwrap_or(&CONFIG_PATH);
    let data = toml::to_string_pretty(cfg)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, data)?;
    Ok(())
}
