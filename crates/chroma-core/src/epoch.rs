//! Epoch inputs and per-epoch key derivation.
//!
//! Each image in an epoch is quantized independently (in parallel); the
//! per-image results are merged by multiset sum, which does not depend on
//! merge order.

use std::collections::{BTreeMap, BTreeSet};

use rayon::prelude::*;

use crate::color::{ColorKey, ColorSample};
use crate::error::ColorError;
use crate::quantize::Quantizer;

/// Raw colors sampled from one image.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ImageColors {
    pub name: Option<String>,
    pub colors: Vec<ColorSample>,
}

impl ImageColors {
    pub fn new(colors: Vec<ColorSample>) -> Self {
        Self { name: None, colors }
    }

    pub fn named(name: &str, colors: Vec<ColorSample>) -> Self {
        Self {
            name: Some(name.to_string()),
            colors,
        }
    }
}

/// One chronological unit of input (e.g. a year) and the images it covers.
#[derive(Clone, Debug, PartialEq)]
pub struct EpochInput {
    pub id: i64,
    pub images: Vec<ImageColors>,
}

impl EpochInput {
    pub fn new(id: i64, images: Vec<ImageColors>) -> Self {
        Self { id, images }
    }

    /// Single anonymous image holding every color of the epoch.
    pub fn from_colors(id: i64, colors: Vec<ColorSample>) -> Self {
        Self {
            id,
            images: vec![ImageColors::new(colors)],
        }
    }

    pub fn sample_count(&self) -> usize {
        self.images.iter().map(|i| i.colors.len()).sum()
    }
}

/// A color the quantizer refused, with where it came from.
#[derive(Clone, Debug, PartialEq)]
pub struct RejectedColor {
    pub image_index: usize,
    pub image: Option<String>,
    pub index: usize,
    pub error: ColorError,
}

/// Quantized colors of one epoch with their sample multiplicities.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EpochKeys {
    pub counts: BTreeMap<ColorKey, u64>,
    pub rejected: Vec<RejectedColor>,
}

impl EpochKeys {
    /// Distinct keys of the epoch.
    pub fn key_set(&self) -> BTreeSet<ColorKey> {
        self.counts.keys().copied().collect()
    }

    pub fn distinct(&self) -> usize {
        self.counts.len()
    }

    pub fn samples(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    fn merge(mut self, other: EpochKeys) -> EpochKeys {
        for (key, n) in other.counts {
            *self.counts.entry(key).or_insert(0) += n;
        }
        self.rejected.extend(other.rejected);
        self
    }
}

fn derive_image(image_index: usize, image: &ImageColors, quantizer: &Quantizer) -> EpochKeys {
    let mut keys = EpochKeys::default();
    for (index, sample) in image.colors.iter().enumerate() {
        match quantizer.key_for_sample(sample) {
            Ok(key) => *keys.counts.entry(key).or_insert(0) += 1,
            Err(error) => keys.rejected.push(RejectedColor {
                image_index,
                image: image.name.clone(),
                index,
                error,
            }),
        }
    }
    keys
}

/// Quantize every sample of an epoch. Images are processed in parallel.
pub fn derive_epoch_keys(epoch: &EpochInput, quantizer: &Quantizer) -> EpochKeys {
    let mut keys = epoch
        .images
        .par_iter()
        .enumerate()
        .map(|(i, image)| derive_image(i, image, quantizer))
        .reduce(EpochKeys::default, EpochKeys::merge);
    // Rejections arrive in reduction order; present them in input order.
    keys.rejected.sort_by_key(|r| (r.image_index, r.index));
    keys
}
