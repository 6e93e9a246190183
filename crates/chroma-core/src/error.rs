use std::fmt;

/// Invalid engine configuration. Always raised before any state is touched.
#[derive(Clone, Debug, PartialEq)]
pub enum ConfigError {
    InvalidDepth(f64),
    EmptyResolutions,
    InvalidResolution(usize),
    InvalidIterationCap(usize),
    InvalidTolerance(f64),
    InvalidRadius(f64),
    InvalidThreshold { name: &'static str, value: f64 },
    NonChronological { previous: i64, next: i64 },
    QuantizerMismatch { stored_version: u32, stored_depth: f64, depth: f64 },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidDepth(d) => write!(f, "color depth must be in (0, 8], got {d}"),
            ConfigError::EmptyResolutions => {
                write!(f, "at least one clustering resolution is required")
            }
            ConfigError::InvalidResolution(k) => {
                write!(f, "clustering resolution must be >= 1, got {k}")
            }
            ConfigError::InvalidIterationCap(n) => write!(f, "iteration cap must be >= 1, got {n}"),
            ConfigError::InvalidTolerance(t) => {
                write!(f, "convergence tolerance must be finite and >= 0, got {t}")
            }
            ConfigError::InvalidRadius(r) => {
                write!(f, "projection radius must be finite and > 0, got {r}")
            }
            ConfigError::InvalidThreshold { name, value } => {
                write!(f, "{name} must be finite, got {value}")
            }
            ConfigError::NonChronological { previous, next } => {
                write!(f, "epoch {next} does not come after epoch {previous}")
            }
            ConfigError::QuantizerMismatch {
                stored_version,
                stored_depth,
                depth,
            } => write!(
                f,
                "timeline was quantized with v{stored_version} at depth {stored_depth}, \
                 cannot continue at v{} depth {depth}",
                crate::constants::QUANTIZER_VERSION
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

/// A single malformed color. Rejected on its own; the batch carries on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ColorError {
    ChannelOutOfRange { channel: char, value: i64 },
    KeyOutOfRange(i64),
    /// Neither a three-integer triplet nor a packed integer; holds the raw JSON.
    Malformed(String),
}

impl fmt::Display for ColorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColorError::ChannelOutOfRange { channel, value } => {
                write!(f, "channel {channel} out of range [0, 255]: {value}")
            }
            ColorError::KeyOutOfRange(v) => {
                write!(f, "color key out of range [0, 0xFFFFFF]: {v}")
            }
            ColorError::Malformed(raw) => write!(f, "malformed color: {raw}"),
        }
    }
}

impl std::error::Error for ColorError {}

/// Malformed input or artifact JSON.
#[derive(Debug)]
pub enum WireError {
    Json(serde_json::Error),
    Config(ConfigError),
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireError::Json(e) => write!(f, "invalid JSON: {e}"),
            WireError::Config(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for WireError {}

impl From<serde_json::Error> for WireError {
    fn from(e: serde_json::Error) -> Self {
        WireError::Json(e)
    }
}

impl From<ConfigError> for WireError {
    fn from(e: ConfigError) -> Self {
        WireError::Config(e)
    }
}
