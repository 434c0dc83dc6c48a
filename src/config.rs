use std::{
    env, fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use thiserror::Error;

use crate::{
    model_download::{default_handpose_estimator_model_path, default_palm_detector_model_path},
    types::NUM_KEYPOINTS,
};

pub const CONFIG_ENV: &str = "HAND_CURSOR_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to parse config: {0}")]
    Toml(#[source] toml::de::Error),
    #[error("keypoint_index {0} is outside the hand topology (0..={max})", max = NUM_KEYPOINTS - 1)]
    KeypointIndex(usize),
    #[error("trail_capacity must be at least 1")]
    TrailCapacity,
    #[error("depth calibration needs near_depth != far_depth (both {0})")]
    DepthRange(f32),
    #[error("size clamp is inverted: min_size {min} > max_size {max}")]
    SizeClamp { min: f32, max: f32 },
    #[error("detector.max_hands must be at least 1")]
    MaxHands,
}

/// Which detected hand the cursor follows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
pub enum SelectionPolicy {
    #[default]
    Left,
    Right,
    First,
}

impl SelectionPolicy {
    pub fn label(&self) -> &'static str {
        match self {
            SelectionPolicy::Left => "左手",
            SelectionPolicy::Right => "右手",
            SelectionPolicy::First => "首个",
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TrackingConfig {
    #[serde(default)]
    pub hand: SelectionPolicy,
    /// Landmark followed by the cursor; 8 is the index fingertip.
    #[serde(default = "default_keypoint_index")]
    pub keypoint_index: usize,
    #[serde(default = "default_trail_capacity")]
    pub trail_capacity: usize,
    #[serde(default)]
    pub depth: DepthCalibration,
}

/// Linear depth-to-size map followed by a clamp.
///
/// `near_depth` maps to `near_size` and `far_depth` to `far_size`; the result
/// is then clamped to `[min_size, max_size]` because real depths routinely
/// leave the calibrated range.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct DepthCalibration {
    #[serde(default = "default_near_depth")]
    pub near_depth: f32,
    #[serde(default = "default_far_depth")]
    pub far_depth: f32,
    #[serde(default = "default_near_size")]
    pub near_size: f32,
    #[serde(default = "default_far_size")]
    pub far_size: f32,
    #[serde(default = "default_min_size")]
    pub min_size: f32,
    #[serde(default = "default_max_size")]
    pub max_size: f32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CameraConfig {
    #[serde(default)]
    pub index: usize,
    #[serde(default = "default_mirror")]
    pub mirror: bool,
}

#[derive(Clone, Debug, Deserialize)]
pub struct DetectorConfig {
    #[serde(default = "default_max_hands")]
    pub max_hands: usize,
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,
    #[serde(default = "default_palm_detector_model_path")]
    pub palm_model: PathBuf,
    #[serde(default = "default_handpose_estimator_model_path")]
    pub handpose_model: PathBuf,
}

fn default_keypoint_index() -> usize {
    8
}

fn default_trail_capacity() -> usize {
    20
}

fn default_near_depth() -> f32 {
    -0.1
}

fn default_far_depth() -> f32 {
    0.1
}

fn default_near_size() -> f32 {
    50.0
}

fn default_far_size() -> f32 {
    20.0
}

fn default_min_size() -> f32 {
    15.0
}

fn default_max_size() -> f32 {
    60.0
}

fn default_mirror() -> bool {
    true
}

fn default_max_hands() -> usize {
    2
}

fn default_min_confidence() -> f32 {
    0.5
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            hand: SelectionPolicy::default(),
            keypoint_index: default_keypoint_index(),
            trail_capacity: default_trail_capacity(),
            depth: DepthCalibration::default(),
        }
    }
}

impl Default for DepthCalibration {
    fn default() -> Self {
        Self {
            near_depth: default_near_depth(),
            far_depth: default_far_depth(),
            near_size: default_near_size(),
            far_size: default_far_size(),
            min_size: default_min_size(),
            max_size: default_max_size(),
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            index: 0,
            mirror: default_mirror(),
        }
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            max_hands: default_max_hands(),
            min_confidence: default_min_confidence(),
            palm_model: default_palm_detector_model_path(),
            handpose_model: default_handpose_estimator_model_path(),
        }
    }
}

impl DepthCalibration {
    pub fn size_for_depth(&self, z: f32) -> f32 {
        let t = (z - self.near_depth) / (self.far_depth - self.near_depth);
        let size = self.near_size + t * (self.far_size - self.near_size);
        size.clamp(self.min_size, self.max_size)
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Parses an in-memory TOML document and validates it.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content).map_err(ConfigError::Toml)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `$HAND_CURSOR_CONFIG`, else `config.toml` when present, else defaults.
    pub fn load_from_env() -> Result<Self, ConfigError> {
        if let Some(path) = env::var_os(CONFIG_ENV) {
            return Self::load(PathBuf::from(path));
        }
        let fallback = Path::new(DEFAULT_CONFIG_PATH);
        if fallback.exists() {
            return Self::load(fallback);
        }
        log::info!("no config file found, using built-in defaults");
        Ok(Self::default())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let tracking = &self.tracking;
        if tracking.keypoint_index >= NUM_KEYPOINTS {
            return Err(ConfigError::KeypointIndex(tracking.keypoint_index));
        }
        if tracking.trail_capacity == 0 {
            return Err(ConfigError::TrailCapacity);
        }
        let depth = &tracking.depth;
        if (depth.far_depth - depth.near_depth).abs() <= f32::EPSILON {
            return Err(ConfigError::DepthRange(depth.near_depth));
        }
        if depth.min_size > depth.max_size {
            return Err(ConfigError::SizeClamp {
                min: depth.min_size,
                max: depth.max_size,
            });
        }
        if self.detector.max_hands == 0 {
            return Err(ConfigError::MaxHands);
        }
        Ok(())
    }
}
