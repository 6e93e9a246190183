use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::MAX_COLOR_KEY;
use crate::error::ColorError;

/// 24-bit RGB color. Serialized as a bare `[r, g, b]` array.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "[u8; 3]", into = "[u8; 3]")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Build from unchecked integer channels, rejecting anything outside [0, 255].
    pub fn from_channels(r: i64, g: i64, b: i64) -> Result<Self, ColorError> {
        fn channel(name: char, value: i64) -> Result<u8, ColorError> {
            u8::try_from(value).map_err(|_| ColorError::ChannelOutOfRange {
                channel: name,
                value,
            })
        }
        Ok(Self {
            r: channel('r', r)?,
            g: channel('g', g)?,
            b: channel('b', b)?,
        })
    }

    pub fn channels(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }

    /// Channels as f64 coordinates in RGB space.
    pub fn to_point(self) -> [f64; 3] {
        [self.r as f64, self.g as f64, self.b as f64]
    }
}

impl From<[u8; 3]> for Rgb {
    fn from([r, g, b]: [u8; 3]) -> Self {
        Self { r, g, b }
    }
}

impl From<Rgb> for [u8; 3] {
    fn from(c: Rgb) -> Self {
        c.channels()
    }
}

/// Packed quantized color: `(r << 16) | (g << 8) | b`.
///
/// Only meaningful when produced by [`crate::Quantizer::key`]; two keys are
/// equal iff the source colors share a quantization bucket on every channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColorKey(pub u32);

impl ColorKey {
    pub fn pack(c: Rgb) -> Self {
        Self(((c.r as u32) << 16) | ((c.g as u32) << 8) | c.b as u32)
    }

    pub fn unpack(self) -> Rgb {
        Rgb {
            r: ((self.0 >> 16) & 0xFF) as u8,
            g: ((self.0 >> 8) & 0xFF) as u8,
            b: (self.0 & 0xFF) as u8,
        }
    }

    /// Accept a raw integer from input data as a packed color.
    pub fn from_raw(value: i64) -> Result<Self, ColorError> {
        if (0..=MAX_COLOR_KEY as i64).contains(&value) {
            Ok(Self(value as u32))
        } else {
            Err(ColorError::KeyOutOfRange(value))
        }
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ColorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:06x}", self.0)
    }
}

/// One raw color as it arrives from the pixel sampler: either an `[r, g, b]`
/// triplet or an already packed integer. Channels are unchecked until quantized.
///
/// Anything else (short triplets, float channels, strings) lands in
/// `Malformed` so a single bad sample is rejected without failing the file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColorSample {
    Rgb([i64; 3]),
    Packed(i64),
    Malformed(serde_json::Value),
}

impl From<Rgb> for ColorSample {
    fn from(c: Rgb) -> Self {
        ColorSample::Rgb([c.r as i64, c.g as i64, c.b as i64])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_layout() {
        assert_eq!(ColorKey::pack(Rgb::new(0x12, 0x34, 0x56)).0, 0x123456);
        assert_eq!(ColorKey::pack(Rgb::new(255, 255, 255)).0, MAX_COLOR_KEY);
    }

    #[test]
    fn test_unpack_inverts_pack() {
        let c = Rgb::new(200, 16, 7);
        assert_eq!(ColorKey::pack(c).unpack(), c);
    }

    #[test]
    fn test_from_channels_rejects_out_of_range() {
        assert_eq!(
            Rgb::from_channels(0, 256, 0),
            Err(ColorError::ChannelOutOfRange {
                channel: 'g',
                value: 256
            })
        );
        assert!(Rgb::from_channels(-1, 0, 0).is_err());
        assert_eq!(Rgb::from_channels(1, 2, 3), Ok(Rgb::new(1, 2, 3)));
    }

    #[test]
    fn test_key_from_raw_bounds() {
        assert!(ColorKey::from_raw(0).is_ok());
        assert!(ColorKey::from_raw(MAX_COLOR_KEY as i64).is_ok());
        assert_eq!(
            ColorKey::from_raw(MAX_COLOR_KEY as i64 + 1),
            Err(ColorError::KeyOutOfRange(0x0100_0000))
        );
        assert!(ColorKey::from_raw(-5).is_err());
    }

    #[test]
    fn test_rgb_serializes_as_array() {
        let json = serde_json::to_string(&Rgb::new(1, 2, 3)).unwrap();
        assert_eq!(json, "[1,2,3]");
        let back: Rgb = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Rgb::new(1, 2, 3));
    }

    #[test]
    fn test_sample_accepts_both_forms() {
        let samples: Vec<ColorSample> =
            serde_json::from_str("[[1, 2, 3], 66051, [0, 999, 0]]").unwrap();
        assert_eq!(samples[0], ColorSample::Rgb([1, 2, 3]));
        assert_eq!(samples[1], ColorSample::Packed(66051));
        assert_eq!(samples[2], ColorSample::Rgb([0, 999, 0]));
    }

    #[test]
    fn test_bad_sample_shapes_are_kept_as_malformed() {
        let samples: Vec<ColorSample> =
            serde_json::from_str(r#"[[1, 2], [12.5, 3, 4], "red", [1, 2, 3, 4], 7.5]"#).unwrap();
        assert_eq!(samples.len(), 5);
        assert_eq!(samples[0], ColorSample::Malformed(serde_json::json!([1, 2])));
        assert_eq!(samples[1], ColorSample::Malformed(serde_json::json!([12.5, 3, 4])));
        assert!(samples.iter().all(|s| matches!(s, ColorSample::Malformed(_))));
    }

    #[test]
    fn test_display_hex() {
        assert_eq!(ColorKey(0x00ff10).to_string(), "#00ff10");
    }
}
