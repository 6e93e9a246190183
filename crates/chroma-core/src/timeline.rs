//! Epoch-by-epoch pipeline: quantize → novelty → cumulative population →
//! multi-resolution clustering, plus layout of each epoch's novel colors.
//!
//! The accumulator's seen set is the single source of truth for both
//! downstream stages: a color dropped by the color cap is neither emitted
//! as novel nor added to the clustering population.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::accumulator::{AccumulatorSnapshot, EpochAccumulator, NovelColors};
use crate::cluster::{
    ClusterRun, ClusterSolution, ColorPopulation, MultiResolutionClusterer, WarmStart,
};
use crate::color::ColorKey;
use crate::config::EngineConfig;
use crate::constants::QUANTIZER_VERSION;
use crate::epoch::{EpochInput, RejectedColor, derive_epoch_keys};
use crate::error::ConfigError;
use crate::projection::{ProjectedPoint, Projector};
use crate::quantize::Quantizer;

/// Permanent contribution of one processed epoch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EpochRecord {
    pub epoch: i64,
    pub novel: Vec<ColorKey>,
    #[serde(default)]
    pub dropped: usize,
    pub solutions: BTreeMap<usize, ClusterSolution>,
}

/// Everything produced while advancing one epoch.
#[derive(Clone, Debug)]
pub struct EpochReport {
    pub novel: NovelColors,
    pub projected: Vec<ProjectedPoint>,
    pub clusters: ClusterRun,
    /// Samples that quantized successfully.
    pub samples: u64,
    /// Distinct keys observed this epoch, novel or not.
    pub distinct: usize,
    pub rejected: Vec<RejectedColor>,
    pub cap_reached: bool,
}

impl EpochReport {
    pub fn epoch(&self) -> i64 {
        self.novel.epoch
    }
}

/// Persistable state of a timeline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimelineState {
    pub quantizer_version: u32,
    pub color_depth: f64,
    pub seen: Vec<ColorKey>,
    pub population: ColorPopulation,
    pub warm_start: WarmStart,
    pub last_epoch: Option<i64>,
    pub records: Vec<EpochRecord>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimelineSnapshot {
    pub accumulator: AccumulatorSnapshot,
    pub population_distinct: usize,
    pub population_total: u64,
    pub warm_resolutions: Vec<usize>,
}

pub struct Timeline {
    config: EngineConfig,
    quantizer: Quantizer,
    projector: Projector,
    accumulator: EpochAccumulator,
    clusterer: MultiResolutionClusterer,
    population: ColorPopulation,
    records: Vec<EpochRecord>,
}

impl Timeline {
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            quantizer: Quantizer::from_config(&config.quantize)?,
            projector: Projector::new(config.projection.clone())?,
            accumulator: EpochAccumulator::new(config.max_colors),
            clusterer: MultiResolutionClusterer::new(config.cluster.clone())?,
            population: ColorPopulation::new(),
            records: Vec::new(),
            config,
        })
    }

    /// Resume from persisted state. The stored quantizer must match `config`.
    pub fn restore(config: EngineConfig, state: TimelineState) -> Result<Self, ConfigError> {
        if state.quantizer_version != QUANTIZER_VERSION
            || state.color_depth != config.quantize.depth
        {
            return Err(ConfigError::QuantizerMismatch {
                stored_version: state.quantizer_version,
                stored_depth: state.color_depth,
                depth: config.quantize.depth,
            });
        }
        let mut timeline = Self::new(config)?;
        timeline.accumulator = EpochAccumulator::restore(
            state.seen,
            state.last_epoch,
            state.records.len(),
            timeline.config.max_colors,
        );
        timeline.clusterer = MultiResolutionClusterer::with_warm_start(
            timeline.config.cluster.clone(),
            state.warm_start,
        )?;
        timeline.population = state.population;
        timeline.records = state.records;
        Ok(timeline)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn quantizer(&self) -> &Quantizer {
        &self.quantizer
    }

    pub fn projector(&self) -> &Projector {
        &self.projector
    }

    pub fn population(&self) -> &ColorPopulation {
        &self.population
    }

    pub fn records(&self) -> &[EpochRecord] {
        &self.records
    }

    pub fn last_epoch(&self) -> Option<i64> {
        self.accumulator.last_epoch()
    }

    pub fn cap_reached(&self) -> bool {
        self.accumulator.cap_reached()
    }

    pub fn unique_colors(&self) -> usize {
        self.accumulator.seen_len()
    }

    /// Process the next epoch. Fails only if `epoch` is out of order, in
    /// which case nothing is mutated.
    pub fn advance(&mut self, epoch: &EpochInput) -> Result<EpochReport, ConfigError> {
        self.accumulator.check_order(epoch.id)?;

        let keys = derive_epoch_keys(epoch, &self.quantizer);
        let novel = self.accumulator.advance(epoch.id, &keys.key_set())?;

        for (key, n) in &keys.counts {
            if self.accumulator.contains(*key) {
                self.population.add(*key, *n);
            }
        }

        let clusters = self.clusterer.advance(&self.population);
        let projected = novel
            .colors
            .iter()
            .map(|k| self.projector.project(k.unpack()))
            .collect();

        self.records.push(EpochRecord {
            epoch: epoch.id,
            novel: novel.colors.clone(),
            dropped: novel.dropped,
            solutions: clusters.solutions.clone(),
        });

        Ok(EpochReport {
            samples: keys.samples(),
            distinct: keys.distinct(),
            rejected: keys.rejected,
            cap_reached: self.accumulator.cap_reached(),
            novel,
            projected,
            clusters,
        })
    }

    /// Process a whole ordered sequence. Ordering is checked up front so a
    /// bad sequence fails before the first epoch is touched.
    pub fn advance_all(&mut self, epochs: &[EpochInput]) -> Result<Vec<EpochReport>, ConfigError> {
        let mut previous = self.accumulator.last_epoch();
        for epoch in epochs {
            if let Some(prev) = previous
                && epoch.id <= prev
            {
                return Err(ConfigError::NonChronological {
                    previous: prev,
                    next: epoch.id,
                });
            }
            previous = Some(epoch.id);
        }
        epochs.iter().map(|e| self.advance(e)).collect()
    }

    pub fn snapshot(&self) -> TimelineSnapshot {
        TimelineSnapshot {
            accumulator: self.accumulator.snapshot(),
            population_distinct: self.population.distinct(),
            population_total: self.population.total(),
            warm_resolutions: self.clusterer.warm_start().keys().copied().collect(),
        }
    }

    pub fn state(&self) -> TimelineState {
        TimelineState {
            quantizer_version: QUANTIZER_VERSION,
            color_depth: self.quantizer.depth(),
            seen: self.accumulator.seen_sorted(),
            population: self.population.clone(),
            warm_start: self.clusterer.warm_start().clone(),
            last_epoch: self.accumulator.last_epoch(),
            records: self.records.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::{ColorSample, Rgb};
    use crate::config::ClusterConfig;

    fn rgb(r: i64, g: i64, b: i64) -> ColorSample {
        ColorSample::Rgb([r, g, b])
    }

    fn config(resolutions: &[usize]) -> EngineConfig {
        EngineConfig {
            cluster: ClusterConfig {
                resolutions: resolutions.iter().copied().collect(),
                ..ClusterConfig::default()
            },
            ..EngineConfig::default()
        }
    }

    #[test]
    fn test_advance_emits_novel_projected_and_clusters() {
        let mut tl = Timeline::new(config(&[1, 2])).unwrap();
        let colors = vec![rgb(0, 0, 0), rgb(255, 0, 0), rgb(255, 0, 0)];
        let report = tl.advance(&EpochInput::from_colors(1900, colors)).unwrap();
        assert_eq!(report.novel.len(), 2);
        assert_eq!(report.projected.len(), 2);
        assert_eq!(report.samples, 3);
        assert_eq!(report.clusters.solutions[&2].total_colors, 3);
        assert_eq!(tl.records().len(), 1);
    }

    #[test]
    fn test_population_accumulates_weights_across_epochs() {
        let mut tl = Timeline::new(config(&[1])).unwrap();
        tl.advance(&EpochInput::from_colors(1, vec![rgb(0, 0, 0)])).unwrap();
        let colors = vec![rgb(0, 0, 0), rgb(5, 5, 5), rgb(200, 200, 200)];
        let report = tl.advance(&EpochInput::from_colors(2, colors)).unwrap();
        // (5, 5, 5) shares the black bucket at depth 4
        assert_eq!(report.novel.colors, vec![tl.quantizer().key(Rgb::new(200, 200, 200))]);
        assert_eq!(tl.population().weight(ColorKey(0)), 3);
        assert_eq!(report.clusters.solutions[&1].total_colors, 4);
    }

    #[test]
    fn test_capped_colors_stay_out_of_population() {
        let cfg = EngineConfig {
            max_colors: Some(1),
            ..config(&[1])
        };
        let mut tl = Timeline::new(cfg).unwrap();
        let report = tl
            .advance(&EpochInput::from_colors(1, vec![rgb(0, 0, 0), rgb(255, 255, 255)]))
            .unwrap();
        assert!(report.cap_reached);
        assert_eq!(report.novel.dropped, 1);
        assert_eq!(tl.population().distinct(), 1);
        assert_eq!(report.clusters.solutions[&1].total_colors, 1);
    }

    #[test]
    fn test_out_of_order_epoch_mutates_nothing() {
        let mut tl = Timeline::new(config(&[1])).unwrap();
        tl.advance(&EpochInput::from_colors(5, vec![rgb(1, 2, 3)])).unwrap();
        let before = tl.state();
        assert!(tl.advance(&EpochInput::from_colors(4, vec![rgb(99, 99, 99)])).is_err());
        assert_eq!(tl.state(), before);
    }

    #[test]
    fn test_advance_all_checks_order_up_front() {
        let mut tl = Timeline::new(config(&[1])).unwrap();
        let epochs = vec![
            EpochInput::from_colors(1, vec![rgb(1, 2, 3)]),
            EpochInput::from_colors(3, vec![rgb(50, 2, 3)]),
            EpochInput::from_colors(2, vec![rgb(100, 2, 3)]),
        ];
        assert!(tl.advance_all(&epochs).is_err());
        assert!(tl.records().is_empty());
        assert_eq!(tl.unique_colors(), 0);
    }

    #[test]
    fn test_restore_continues_identically() {
        let epochs = vec![
            EpochInput::from_colors(1, vec![rgb(0, 0, 0), rgb(250, 10, 10), rgb(10, 250, 10)]),
            EpochInput::from_colors(2, vec![rgb(10, 10, 250), rgb(128, 128, 0)]),
            EpochInput::from_colors(3, vec![rgb(0, 128, 128), rgb(255, 255, 255), rgb(64, 0, 64)]),
        ];
        let mut straight = Timeline::new(config(&[2, 3])).unwrap();
        straight.advance_all(&epochs).unwrap();

        let mut first = Timeline::new(config(&[2, 3])).unwrap();
        first.advance_all(&epochs[..2]).unwrap();
        let mut resumed = Timeline::restore(config(&[2, 3]), first.state()).unwrap();
        resumed.advance(&epochs[2]).unwrap();

        assert_eq!(resumed.state(), straight.state());
    }

    #[test]
    fn test_restore_rejects_other_depth() {
        let tl = Timeline::new(config(&[1])).unwrap();
        let state = tl.state();
        let other = EngineConfig {
            quantize: crate::config::QuantizeConfig { depth: 5.0 },
            ..config(&[1])
        };
        assert!(matches!(
            Timeline::restore(other, state),
            Err(ConfigError::QuantizerMismatch { .. })
        ));
    }

    #[test]
    fn test_snapshot_reports_warm_resolutions() {
        let mut tl = Timeline::new(config(&[1, 2, 50])).unwrap();
        tl.advance(&EpochInput::from_colors(1, vec![rgb(0, 0, 0), rgb(255, 255, 255)]))
            .unwrap();
        let snap = tl.snapshot();
        assert_eq!(snap.warm_resolutions, vec![1, 2]);
        assert_eq!(snap.population_distinct, 2);
        assert_eq!(snap.accumulator.seen, 2);
    }
}
