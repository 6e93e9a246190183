/// Identifies the quantization formula `floor(c / 2^(8 - depth)) * 2^(8 - depth)`.
/// Bump whenever the formula changes; stored timelines and artifacts carry it.
pub const QUANTIZER_VERSION: u32 = 1;

/// Default quantization bit depth per channel.
pub const DEFAULT_COLOR_DEPTH: f64 = 4.0;

/// Largest value a packed 24-bit color key can take.
pub const MAX_COLOR_KEY: u32 = 0x00FF_FFFF;

/// HSL saturation below which a color is laid out as gray.
pub const GRAYSCALE_THRESHOLD: f64 = 0.15;

/// HSL lightness below which the dark boost applies.
pub const DARK_BOOST_THRESHOLD: f64 = 0.5;

/// Multiplier applied to the radial distance of dark colors.
pub const DARK_COLOR_BOOST: f64 = 1.0;

/// Radial scale applied to gray colors after the dark boost.
pub const GRAYSCALE_DISTANCE_SCALE: f64 = 0.8;

/// Default outer radius of the color wheel.
pub const DEFAULT_RADIUS: f64 = 100.0;

/// Channel weights of the gray angle hash: (31r + 17g + 7b) mod 360.
pub const GRAY_HASH_WEIGHTS: [u32; 3] = [31, 17, 7];

/// Default clustering resolutions (cluster counts).
pub const DEFAULT_RESOLUTIONS: [usize; 5] = [4, 8, 16, 32, 64];

/// Default per-resolution Lloyd iteration cap.
pub const DEFAULT_MAX_ITER: usize = 300;

/// Default convergence tolerance, relative to the population's mean channel variance.
pub const DEFAULT_TOLERANCE: f64 = 1e-4;

/// Default clustering seed.
pub const DEFAULT_SEED: u64 = 42;

/// Default cap on distinct colors retained across the whole timeline.
pub const DEFAULT_MAX_COLORS: usize = 10_000;
