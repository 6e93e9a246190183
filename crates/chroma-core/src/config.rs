//! Engine configuration. Every field has a default, so partial config files
//! deserialize cleanly.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DARK_BOOST_THRESHOLD, DARK_COLOR_BOOST, DEFAULT_COLOR_DEPTH, DEFAULT_MAX_COLORS,
    DEFAULT_MAX_ITER, DEFAULT_RADIUS, DEFAULT_RESOLUTIONS, DEFAULT_SEED, DEFAULT_TOLERANCE,
    GRAYSCALE_DISTANCE_SCALE, GRAYSCALE_THRESHOLD,
};
use crate::error::ConfigError;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuantizeConfig {
    /// Bits kept per channel. Fractional depths are honored exactly.
    pub depth: f64,
}

impl Default for QuantizeConfig {
    fn default() -> Self {
        Self {
            depth: DEFAULT_COLOR_DEPTH,
        }
    }
}

impl QuantizeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.depth.is_finite() || self.depth <= 0.0 || self.depth > 8.0 {
            return Err(ConfigError::InvalidDepth(self.depth));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionConfig {
    pub radius: f64,
    pub grayscale_threshold: f64,
    pub dark_boost_threshold: f64,
    pub dark_color_boost: f64,
    pub grayscale_distance_scale: f64,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            radius: DEFAULT_RADIUS,
            grayscale_threshold: GRAYSCALE_THRESHOLD,
            dark_boost_threshold: DARK_BOOST_THRESHOLD,
            dark_color_boost: DARK_COLOR_BOOST,
            grayscale_distance_scale: GRAYSCALE_DISTANCE_SCALE,
        }
    }
}

impl ProjectionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.radius.is_finite() || self.radius <= 0.0 {
            return Err(ConfigError::InvalidRadius(self.radius));
        }
        let thresholds = [
            ("grayscale_threshold", self.grayscale_threshold),
            ("dark_boost_threshold", self.dark_boost_threshold),
            ("dark_color_boost", self.dark_color_boost),
            ("grayscale_distance_scale", self.grayscale_distance_scale),
        ];
        for (name, value) in thresholds {
            if !value.is_finite() {
                return Err(ConfigError::InvalidThreshold { name, value });
            }
        }
        Ok(())
    }
}

/// How repeated observations of one color weigh in clustering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PopulationMode {
    /// Every observed sample counts; a color seen n times has weight n.
    #[default]
    Weighted,
    /// Each distinct color counts once.
    Distinct,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub resolutions: BTreeSet<usize>,
    pub max_iter: usize,
    pub tolerance: f64,
    pub seed: u64,
    pub population: PopulationMode,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            resolutions: DEFAULT_RESOLUTIONS.into_iter().collect(),
            max_iter: DEFAULT_MAX_ITER,
            tolerance: DEFAULT_TOLERANCE,
            seed: DEFAULT_SEED,
            population: PopulationMode::default(),
        }
    }
}

impl ClusterConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.resolutions.is_empty() {
            return Err(ConfigError::EmptyResolutions);
        }
        if let Some(&k) = self.resolutions.iter().find(|&&k| k == 0) {
            return Err(ConfigError::InvalidResolution(k));
        }
        if self.max_iter == 0 {
            return Err(ConfigError::InvalidIterationCap(self.max_iter));
        }
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(ConfigError::InvalidTolerance(self.tolerance));
        }
        Ok(())
    }
}

/// Full configuration surface of the engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub quantize: QuantizeConfig,
    pub projection: ProjectionConfig,
    pub cluster: ClusterConfig,
    /// Hard cap on distinct colors retained. `None` means unbounded.
    pub max_colors: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            quantize: QuantizeConfig::default(),
            projection: ProjectionConfig::default(),
            cluster: ClusterConfig::default(),
            max_colors: Some(DEFAULT_MAX_COLORS),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.quantize.validate()?;
        self.projection.validate()?;
        self.cluster.validate()
    }
}
