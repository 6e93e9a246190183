//! Color history engine.
//!
//! Follows the colors of a chronologically ordered sequence of photograph
//! collections (epochs). Colors are reduced to quantization buckets, each
//! bucket is credited to the epoch it first appears in, and the cumulative
//! population is clustered at several resolutions per epoch, warm-starting
//! each resolution from the previous epoch's centroids. Novel colors are laid
//! out on a polar color wheel for rendering.
//!
//! Zero I/O: pixel sampling, persistence and rendering live elsewhere.

pub mod accumulator;
pub mod cluster;
pub mod color;
pub mod config;
pub mod constants;
pub mod epoch;
pub mod error;
pub mod projection;
pub mod quantize;
pub mod timeline;
pub mod wire;

pub use accumulator::{AccumulatorSnapshot, EpochAccumulator, NovelColors, accumulate};
pub use cluster::{
    Centroid, ClusterDiagnostics, ClusterRun, ClusterSolution, ColorPopulation,
    MultiResolutionClusterer, WarmStart, cluster,
};
pub use color::{ColorKey, ColorSample, Rgb};
pub use config::{ClusterConfig, EngineConfig, PopulationMode, ProjectionConfig, QuantizeConfig};
pub use constants::{DEFAULT_COLOR_DEPTH, DEFAULT_RESOLUTIONS, QUANTIZER_VERSION};
pub use epoch::{EpochInput, EpochKeys, ImageColors, RejectedColor, derive_epoch_keys};
pub use error::{ColorError, ConfigError, WireError};
pub use projection::{Hsl, ProjectedPoint, Projector, gray_angle, project};
pub use quantize::Quantizer;
pub use timeline::{EpochRecord, EpochReport, Timeline, TimelineSnapshot, TimelineState};
pub use wire::{
    ClusterArtifact, NoveltyArtifact, ProjectionArtifact, cluster_artifact, novelty_artifact,
    parse_epochs, projection_artifact, to_json,
};
