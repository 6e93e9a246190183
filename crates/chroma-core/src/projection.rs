//! Polar color-wheel layout.
//!
//! Angle comes from hue, distance from lightness. Near-gray colors have no
//! meaningful hue, so their angle is a fixed hash of the channels instead.

use std::f64::consts::TAU;

use serde::{Deserialize, Serialize};

use crate::color::Rgb;
use crate::config::ProjectionConfig;
use crate::constants::GRAY_HASH_WEIGHTS;
use crate::error::ConfigError;

/// Hue, saturation, lightness, each in [0, 1].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Hsl {
    pub h: f64,
    pub s: f64,
    pub l: f64,
}

impl From<Rgb> for Hsl {
    fn from(c: Rgb) -> Self {
        let r = c.r as f64 / 255.0;
        let g = c.g as f64 / 255.0;
        let b = c.b as f64 / 255.0;
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let l = (max + min) / 2.0;
        if max == min {
            return Hsl { h: 0.0, s: 0.0, l };
        }

        let range = max - min;
        let s = if l <= 0.5 {
            range / (max + min)
        } else {
            range / (2.0 - max - min)
        };
        let rc = (max - r) / range;
        let gc = (max - g) / range;
        let bc = (max - b) / range;
        let h = if r == max {
            bc - gc
        } else if g == max {
            2.0 + rc - bc
        } else {
            4.0 + gc - rc
        };
        Hsl {
            h: (h / 6.0).rem_euclid(1.0),
            s,
            l,
        }
    }
}

/// A color's position on the wheel, with the HSL it was derived from.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProjectedPoint {
    pub x: f64,
    pub y: f64,
    pub rgb: Rgb,
    pub angle: f64,
    #[serde(alias = "dist")]
    pub distance: f64,
    pub h: f64,
    pub s: f64,
    pub l: f64,
}

/// Stable angle in [0, 2π) for colors without a usable hue.
pub fn gray_angle(c: Rgb) -> f64 {
    let [wr, wg, wb] = GRAY_HASH_WEIGHTS;
    let hash = (c.r as u32 * wr + c.g as u32 * wg + c.b as u32 * wb) % 360;
    hash as f64 / 360.0 * TAU
}

/// Project one color onto a wheel of the given radius.
pub fn project(color: Rgb, radius: f64, config: &ProjectionConfig) -> ProjectedPoint {
    let Hsl { h, s, l } = Hsl::from(color);
    let gray = s < config.grayscale_threshold;

    let angle = if gray { gray_angle(color) } else { TAU * h };

    let mut distance = (1.0 - l) * radius;
    if l < config.dark_boost_threshold {
        distance = radius.min(distance * config.dark_color_boost);
    }
    if gray {
        distance *= config.grayscale_distance_scale;
    }

    ProjectedPoint {
        x: distance * angle.cos(),
        y: distance * angle.sin(),
        rgb: color,
        angle,
        distance,
        h,
        s,
        l,
    }
}

/// [`project`] bound to a validated configuration.
#[derive(Clone, Debug)]
pub struct Projector {
    config: ProjectionConfig,
}

impl Projector {
    pub fn new(config: ProjectionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ProjectionConfig {
        &self.config
    }

    /// Project onto the configured radius.
    pub fn project(&self, color: Rgb) -> ProjectedPoint {
        project(color, self.config.radius, &self.config)
    }

    pub fn project_with_radius(&self, color: Rgb, radius: f64) -> ProjectedPoint {
        project(color, radius, &self.config)
    }
}
