//! JSON wire format for epoch inputs and the three output artifacts.
//!
//! Input records are accepted in the shapes the upstream sampling scripts
//! emit: `{"year": 1950, "color": [...]}` per epoch, or
//! `{"year": 1950, "colors": {"image_name": "...", "color": [...]}}` per
//! image. Colors are `[r, g, b]` triplets or packed integers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::accumulator::NovelColors;
use crate::cluster::ClusterSolution;
use crate::color::{ColorKey, ColorSample};
use crate::constants::QUANTIZER_VERSION;
use crate::epoch::{EpochInput, ImageColors};
use crate::error::{ConfigError, WireError};
use crate::projection::ProjectedPoint;
use crate::timeline::Timeline;

#[derive(Clone, Debug, Deserialize)]
pub struct InputRecord {
    #[serde(alias = "year")]
    pub epoch: i64,
    #[serde(alias = "color")]
    pub colors: RecordColors,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum RecordColors {
    Flat(Vec<ColorSample>),
    Image(ImageRecord),
}

#[derive(Clone, Debug, Deserialize)]
pub struct ImageRecord {
    #[serde(default)]
    pub image_name: Option<String>,
    #[serde(alias = "colors")]
    pub color: Vec<ColorSample>,
}

impl From<RecordColors> for ImageColors {
    fn from(colors: RecordColors) -> Self {
        match colors {
            RecordColors::Flat(colors) => ImageColors::new(colors),
            RecordColors::Image(img) => ImageColors {
                name: img.image_name,
                colors: img.color,
            },
        }
    }
}

/// Group records into epochs. Records sharing an epoch id are merged.
///
/// Without `sort`, record ids must be non-decreasing; with it, records are
/// stably sorted by id first.
pub fn group_records(
    mut records: Vec<InputRecord>,
    sort: bool,
) -> Result<Vec<EpochInput>, ConfigError> {
    if sort {
        records.sort_by_key(|r| r.epoch);
    } else {
        for pair in records.windows(2) {
            if pair[1].epoch < pair[0].epoch {
                return Err(ConfigError::NonChronological {
                    previous: pair[0].epoch,
                    next: pair[1].epoch,
                });
            }
        }
    }

    let mut epochs: Vec<EpochInput> = Vec::new();
    for record in records {
        let image = ImageColors::from(record.colors);
        match epochs.last_mut() {
            Some(last) if last.id == record.epoch => last.images.push(image),
            _ => epochs.push(EpochInput::new(record.epoch, vec![image])),
        }
    }
    Ok(epochs)
}

/// Parse an input JSON array into ordered epochs.
pub fn parse_epochs(json: &str, sort: bool) -> Result<Vec<EpochInput>, WireError> {
    let records: Vec<InputRecord> = serde_json::from_str(json)?;
    Ok(group_records(records, sort)?)
}

/// Quantizer identity stamped on every artifact.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuantizerInfo {
    pub version: u32,
    pub depth: f64,
}

impl QuantizerInfo {
    fn of(timeline: &Timeline) -> Self {
        Self {
            version: QUANTIZER_VERSION,
            depth: timeline.quantizer().depth(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NoveltyArtifact {
    pub quantizer: QuantizerInfo,
    pub total_unique_colors: usize,
    pub max_colors_reached: bool,
    pub epochs: Vec<NovelColors>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClusterArtifact {
    pub quantizer: QuantizerInfo,
    pub total_unique_colors: usize,
    #[serde(alias = "all_years")]
    pub all_epochs: Vec<i64>,
    #[serde(alias = "year_clusters")]
    pub epoch_clusters: BTreeMap<i64, BTreeMap<usize, ClusterSolution>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProjectedEpoch {
    pub epoch: i64,
    pub colors: Vec<ProjectedPoint>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProjectionArtifact {
    pub quantizer: QuantizerInfo,
    pub radius: f64,
    pub total_unique_colors: usize,
    pub max_colors_reached: bool,
    pub epochs: Vec<ProjectedEpoch>,
}

pub fn novelty_artifact(timeline: &Timeline) -> NoveltyArtifact {
    NoveltyArtifact {
        quantizer: QuantizerInfo::of(timeline),
        total_unique_colors: timeline.unique_colors(),
        max_colors_reached: timeline.cap_reached(),
        epochs: timeline
            .records()
            .iter()
            .map(|r| NovelColors {
                epoch: r.epoch,
                colors: r.novel.clone(),
                dropped: r.dropped,
            })
            .collect(),
    }
}

pub fn cluster_artifact(timeline: &Timeline) -> ClusterArtifact {
    ClusterArtifact {
        quantizer: QuantizerInfo::of(timeline),
        total_unique_colors: timeline.unique_colors(),
        all_epochs: timeline.records().iter().map(|r| r.epoch).collect(),
        epoch_clusters: timeline
            .records()
            .iter()
            .map(|r| (r.epoch, r.solutions.clone()))
            .collect(),
    }
}

/// Layout of every epoch's novel colors. Recomputed from the records; the
/// projection is never stored as authoritative state.
pub fn projection_artifact(timeline: &Timeline) -> ProjectionArtifact {
    let projector = timeline.projector();
    ProjectionArtifact {
        quantizer: QuantizerInfo::of(timeline),
        radius: projector.config().radius,
        total_unique_colors: timeline.unique_colors(),
        max_colors_reached: timeline.cap_reached(),
        epochs: timeline
            .records()
            .iter()
            .map(|r| ProjectedEpoch {
                epoch: r.epoch,
                colors: r
                    .novel
                    .iter()
                    .map(|k: &ColorKey| projector.project(k.unpack()))
                    .collect(),
            })
            .collect(),
    }
}

pub fn to_json<T: Serialize>(artifact: &T) -> Result<String, WireError> {
    Ok(serde_json::to_string_pretty(artifact)?)
}
