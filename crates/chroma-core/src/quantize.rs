//! The shared quantization formula.
//!
//! Every stage that turns a color into a [`ColorKey`] goes through
//! [`Quantizer`]. Novelty and clustering only agree with each other because
//! they bucket colors identically.

use serde::{Deserialize, Serialize};

use crate::color::{ColorKey, ColorSample, Rgb};
use crate::config::QuantizeConfig;
use crate::constants::QUANTIZER_VERSION;
use crate::error::{ColorError, ConfigError};

/// Deterministic bit-depth reduction.
///
/// `factor = 2^(8 - depth)` with real-valued `depth`; each channel becomes
/// `trunc(floor(c / factor) * factor)`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quantizer {
    depth: f64,
    factor: f64,
}

impl Quantizer {
    pub fn new(depth: f64) -> Result<Self, ConfigError> {
        QuantizeConfig { depth }.validate()?;
        Ok(Self {
            depth,
            factor: 2f64.powf(8.0 - depth),
        })
    }

    pub fn from_config(config: &QuantizeConfig) -> Result<Self, ConfigError> {
        Self::new(config.depth)
    }

    pub fn depth(&self) -> f64 {
        self.depth
    }

    pub fn factor(&self) -> f64 {
        self.factor
    }

    pub fn version(&self) -> u32 {
        QUANTIZER_VERSION
    }

    fn bucket(&self, channel: u8) -> u8 {
        // Float-to-int `as` truncates; the product never exceeds the input channel.
        ((channel as f64 / self.factor).floor() * self.factor) as u8
    }

    /// Reduce a color to its bucket representative.
    pub fn quantize(&self, c: Rgb) -> Rgb {
        Rgb::new(self.bucket(c.r), self.bucket(c.g), self.bucket(c.b))
    }

    /// Quantize and pack.
    pub fn key(&self, c: Rgb) -> ColorKey {
        ColorKey::pack(self.quantize(c))
    }

    /// Re-derive a key from a previously packed color.
    pub fn requantize(&self, key: ColorKey) -> ColorKey {
        self.key(key.unpack())
    }

    /// Derive the key for one raw input sample. Out-of-range values are rejected.
    pub fn key_for_sample(&self, sample: &ColorSample) -> Result<ColorKey, ColorError> {
        match sample {
            ColorSample::Rgb([r, g, b]) => Ok(self.key(Rgb::from_channels(*r, *g, *b)?)),
            ColorSample::Packed(raw) => Ok(self.requantize(ColorKey::from_raw(*raw)?)),
            ColorSample::Malformed(raw) => Err(ColorError::Malformed(raw.to_string())),
        }
    }
}

impl Default for Quantizer {
    fn default() -> Self {
        Self {
            depth: crate::constants::DEFAULT_COLOR_DEPTH,
            factor: 2f64.powf(8.0 - crate::constants::DEFAULT_COLOR_DEPTH),
        }
    }
}
