//! Multi-resolution k-means over the cumulative color population.
//!
//! Each resolution (cluster count) is solved independently with weighted
//! Lloyd iterations in RGB space. A resolution that was solved for the
//! previous epoch starts from that epoch's centroids; otherwise it is seeded
//! with weighted k-means++ from a fixed seed.
//!
//! Warm-start state lives in an explicit `resolution -> centroids` map. It is
//! only replaced by [`MultiResolutionClusterer::commit`], so a failed or
//! discarded run never leaks into the next epoch.

use std::collections::BTreeMap;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::color::{ColorKey, Rgb};
use crate::config::{ClusterConfig, PopulationMode};
use crate::error::ConfigError;

/// Full-precision centroid in RGB space.
pub type Centroid = [f64; 3];

/// Centroids of the last successful run, per resolution.
pub type WarmStart = BTreeMap<usize, Vec<Centroid>>;

/// Cumulative multiset of quantized colors observed so far.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorPopulation {
    weights: BTreeMap<ColorKey, u64>,
}

impl ColorPopulation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, key: ColorKey, n: u64) {
        if n > 0 {
            *self.weights.entry(key).or_insert(0) += n;
        }
    }

    pub fn distinct(&self) -> usize {
        self.weights.len()
    }

    /// Multiset size (sum of weights).
    pub fn total(&self) -> u64 {
        self.weights.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn weight(&self, key: ColorKey) -> u64 {
        self.weights.get(&key).copied().unwrap_or(0)
    }

    /// (key, weight) pairs in ascending key order.
    pub fn iter(&self) -> impl Iterator<Item = (ColorKey, u64)> + '_ {
        self.weights.iter().map(|(k, w)| (*k, *w))
    }

    /// Population size as seen by clustering under `mode`.
    pub fn size(&self, mode: PopulationMode) -> u64 {
        match mode {
            PopulationMode::Weighted => self.total(),
            PopulationMode::Distinct => self.distinct() as u64,
        }
    }

    /// Points in ascending key order with their clustering weights.
    /// Point index is the tie-break order everywhere in this module.
    fn points(&self, mode: PopulationMode) -> (Vec<Centroid>, Vec<f64>) {
        self.weights
            .iter()
            .map(|(key, w)| {
                let weight = match mode {
                    PopulationMode::Weighted => *w as f64,
                    PopulationMode::Distinct => 1.0,
                };
                (key.unpack().to_point(), weight)
            })
            .unzip()
    }
}

impl FromIterator<(ColorKey, u64)> for ColorPopulation {
    fn from_iter<T: IntoIterator<Item = (ColorKey, u64)>>(iter: T) -> Self {
        let mut pop = Self::new();
        for (key, n) in iter {
            pop.add(key, n);
        }
        pop
    }
}

/// One resolution's clustering of one epoch's cumulative population.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSolution {
    /// Centroids with channels truncated to integers.
    pub centroids: Vec<Rgb>,
    /// Population members assigned to each centroid.
    pub counts: Vec<u64>,
    pub total_colors: u64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ClusterDiagnostics {
    pub resolution: usize,
    pub iterations: usize,
    /// Weighted within-cluster sum of squared distances.
    pub inertia: f64,
    pub converged: bool,
    pub warm_started: bool,
}

/// Output of one epoch's clustering across all resolutions.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClusterRun {
    pub solutions: BTreeMap<usize, ClusterSolution>,
    /// Full-precision centroids, the warm start for the next epoch.
    pub centroids: WarmStart,
    pub diagnostics: Vec<ClusterDiagnostics>,
}

struct KMeansFit {
    centroids: Vec<Centroid>,
    labels: Vec<usize>,
    iterations: usize,
    inertia: f64,
    converged: bool,
}

fn dist2(a: &Centroid, b: &Centroid) -> f64 {
    let dr = a[0] - b[0];
    let dg = a[1] - b[1];
    let db = a[2] - b[2];
    dr * dr + dg * dg + db * db
}

/// Nearest centroid; equidistant centroids resolve to the lowest index.
fn nearest(point: &Centroid, centroids: &[Centroid]) -> (usize, f64) {
    let mut best = 0;
    let mut best_d = f64::INFINITY;
    for (i, c) in centroids.iter().enumerate() {
        let d = dist2(point, c);
        if d < best_d {
            best_d = d;
            best = i;
        }
    }
    (best, best_d)
}

fn assign(points: &[Centroid], centroids: &[Centroid]) -> Vec<(usize, f64)> {
    points.par_iter().map(|p| nearest(p, centroids)).collect()
}

/// Pick an index with probability proportional to `scores`. Index 0 when
/// every score is zero.
fn sample_index(scores: &[f64], rng: &mut impl Rng) -> usize {
    let total: f64 = scores.iter().sum();
    if total <= 0.0 || !total.is_finite() {
        return 0;
    }
    let target = rng.random::<f64>() * total;
    let mut acc = 0.0;
    let mut last_positive = 0;
    for (i, s) in scores.iter().enumerate() {
        if *s > 0.0 {
            acc += s;
            last_positive = i;
            if target < acc {
                return i;
            }
        }
    }
    last_positive
}

/// Weighted k-means++ seeding.
fn seed_plus_plus(
    points: &[Centroid],
    weights: &[f64],
    k: usize,
    rng: &mut impl Rng,
) -> Vec<Centroid> {
    let mut centroids = Vec::with_capacity(k);
    centroids.push(points[sample_index(weights, rng)]);

    let mut closest: Vec<f64> = points.iter().map(|p| dist2(p, &centroids[0])).collect();
    while centroids.len() < k {
        let scores: Vec<f64> = closest.iter().zip(weights).map(|(d, w)| d * w).collect();
        let idx = if scores.iter().any(|s| *s > 0.0) {
            sample_index(&scores, rng)
        } else {
            // Only reachable with more centroids than distinct points.
            closest.iter().position(|d| *d > 0.0).unwrap_or(0)
        };
        let c = points[idx];
        for (d, p) in closest.iter_mut().zip(points) {
            *d = d.min(dist2(p, &c));
        }
        centroids.push(c);
    }
    centroids
}

/// Mean of the per-channel weighted variances.
fn mean_variance(points: &[Centroid], weights: &[f64]) -> f64 {
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }
    let mut mean = [0.0; 3];
    for (p, w) in points.iter().zip(weights) {
        for d in 0..3 {
            mean[d] += p[d] * w;
        }
    }
    for m in &mut mean {
        *m /= total;
    }
    let mut var = 0.0;
    for (p, w) in points.iter().zip(weights) {
        for d in 0..3 {
            var += w * (p[d] - mean[d]).powi(2);
        }
    }
    var / total / 3.0
}

fn lloyd(
    points: &[Centroid],
    weights: &[f64],
    init: Vec<Centroid>,
    max_iter: usize,
    tolerance: f64,
) -> KMeansFit {
    let k = init.len();
    let tol = tolerance * mean_variance(points, weights);
    let mut centroids = init;
    let mut iterations = 0;
    let mut converged = false;

    while iterations < max_iter {
        iterations += 1;
        let assigned = assign(points, &centroids);

        let mut sums = vec![[0.0; 3]; k];
        let mut mass = vec![0.0; k];
        for ((label, _), (p, w)) in assigned.iter().zip(points.iter().zip(weights)) {
            for d in 0..3 {
                sums[*label][d] += p[d] * w;
            }
            mass[*label] += w;
        }

        let mut next: Vec<Centroid> = (0..k)
            .map(|i| {
                if mass[i] > 0.0 {
                    [sums[i][0] / mass[i], sums[i][1] / mass[i], sums[i][2] / mass[i]]
                } else {
                    centroids[i]
                }
            })
            .collect();

        // Empty clusters move onto the worst-served points, heaviest first.
        let empty: Vec<usize> = (0..k).filter(|&i| mass[i] <= 0.0).collect();
        if !empty.is_empty() {
            let mut far: Vec<usize> = (0..points.len()).collect();
            far.sort_by(|&a, &b| {
                let da = assigned[a].1 * weights[a];
                let db = assigned[b].1 * weights[b];
                db.total_cmp(&da).then(a.cmp(&b))
            });
            for (slot, &pi) in empty.iter().zip(far.iter()) {
                next[*slot] = points[pi];
            }
        }

        let shift: f64 = centroids.iter().zip(&next).map(|(a, b)| dist2(a, b)).sum();
        centroids = next;
        if empty.is_empty() && shift <= tol {
            converged = true;
            break;
        }
    }

    let assigned = assign(points, &centroids);
    let inertia: f64 = assigned
        .iter()
        .zip(weights)
        .map(|((_, d), w)| d * w)
        .sum();
    KMeansFit {
        centroids,
        labels: assigned.into_iter().map(|(l, _)| l).collect(),
        iterations,
        inertia,
        converged,
    }
}

fn usable_warm_start(prev: Option<&Vec<Centroid>>, k: usize) -> Option<Vec<Centroid>> {
    prev.filter(|c| c.len() == k && c.iter().flatten().all(|v| v.is_finite()))
        .cloned()
}

fn truncate(c: &Centroid) -> Rgb {
    // `as` truncates toward zero; clamp guards float drift past the channel range.
    Rgb::new(
        c[0].clamp(0.0, 255.0) as u8,
        c[1].clamp(0.0, 255.0) as u8,
        c[2].clamp(0.0, 255.0) as u8,
    )
}

/// Cluster `population` at every configured resolution it can support.
///
/// A resolution `k` is solved only when the population holds at least `k`
/// distinct colors; otherwise it is absent from the run. Pure: the caller
/// decides whether to commit the returned centroids as the next warm start.
pub fn cluster(
    population: &ColorPopulation,
    config: &ClusterConfig,
    warm_start: &WarmStart,
) -> ClusterRun {
    let mut run = ClusterRun::default();
    if population.is_empty() {
        return run;
    }

    let (points, weights) = population.points(config.population);
    let total = population.size(config.population);

    for &k in config.resolutions.iter().filter(|&&k| k >= 1 && k <= points.len()) {
        let warm = usable_warm_start(warm_start.get(&k), k);
        let warm_started = warm.is_some();
        let init = match warm {
            Some(c) => c,
            None => {
                let mut rng = SmallRng::seed_from_u64(config.seed);
                seed_plus_plus(&points, &weights, k, &mut rng)
            }
        };

        let fit = lloyd(&points, &weights, init, config.max_iter, config.tolerance);

        let mut counts = vec![0u64; k];
        for (label, (_, w)) in fit.labels.iter().zip(population.iter()) {
            counts[*label] += match config.population {
                PopulationMode::Weighted => w,
                PopulationMode::Distinct => 1,
            };
        }

        run.solutions.insert(
            k,
            ClusterSolution {
                centroids: fit.centroids.iter().map(truncate).collect(),
                counts,
                total_colors: total,
            },
        );
        run.diagnostics.push(ClusterDiagnostics {
            resolution: k,
            iterations: fit.iterations,
            inertia: fit.inertia,
            converged: fit.converged,
            warm_started,
        });
        run.centroids.insert(k, fit.centroids);
    }
    run
}

/// Per-resolution clustering state carried from epoch to epoch.
#[derive(Clone, Debug)]
pub struct MultiResolutionClusterer {
    config: ClusterConfig,
    warm_start: WarmStart,
}

impl MultiResolutionClusterer {
    pub fn new(config: ClusterConfig) -> Result<Self, ConfigError> {
        Self::with_warm_start(config, WarmStart::new())
    }

    pub fn with_warm_start(
        config: ClusterConfig,
        warm_start: WarmStart,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config, warm_start })
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    pub fn warm_start(&self) -> &WarmStart {
        &self.warm_start
    }

    /// Solve without touching the warm-start chain.
    pub fn cluster(&self, population: &ColorPopulation) -> ClusterRun {
        cluster(population, &self.config, &self.warm_start)
    }

    /// Adopt a run's centroids as the warm start of each solved resolution.
    /// Resolutions absent from the run keep their previous seed.
    pub fn commit(&mut self, run: &ClusterRun) {
        for (k, centroids) in &run.centroids {
            self.warm_start.insert(*k, centroids.clone());
        }
    }

    /// Cluster and commit in one step.
    pub fn advance(&mut self, population: &ColorPopulation) -> ClusterRun {
        let run = self.cluster(population);
        self.commit(&run);
        run
    }
}
