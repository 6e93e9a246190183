//! First-seen-epoch partition of the color universe.
//!
//! The accumulator owns the seen set. It only grows, and only at epoch
//! boundaries via [`EpochAccumulator::advance`].

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::color::ColorKey;
use crate::error::ConfigError;

/// Colors that appeared for the first time in one epoch, ascending by key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NovelColors {
    pub epoch: i64,
    pub colors: Vec<ColorKey>,
    /// Novel colors refused because the color cap was hit.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub dropped: usize,
}

fn is_zero(n: &usize) -> bool {
    *n == 0
}

impl NovelColors {
    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }
}

/// Read-only view of accumulator state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccumulatorSnapshot {
    pub seen: usize,
    pub epochs: usize,
    pub last_epoch: Option<i64>,
    pub max_colors: Option<usize>,
    pub cap_reached: bool,
}

#[derive(Clone, Debug, Default)]
pub struct EpochAccumulator {
    seen: HashSet<ColorKey>,
    last_epoch: Option<i64>,
    epochs: usize,
    max_colors: Option<usize>,
    cap_reached: bool,
}

impl EpochAccumulator {
    pub fn new(max_colors: Option<usize>) -> Self {
        Self {
            max_colors,
            ..Self::default()
        }
    }

    /// Rebuild from persisted state.
    pub fn restore(
        seen: impl IntoIterator<Item = ColorKey>,
        last_epoch: Option<i64>,
        epochs: usize,
        max_colors: Option<usize>,
    ) -> Self {
        let seen: HashSet<ColorKey> = seen.into_iter().collect();
        let cap_reached = max_colors.is_some_and(|max| seen.len() >= max);
        Self {
            seen,
            last_epoch,
            epochs,
            max_colors,
            cap_reached,
        }
    }

    /// Reject an epoch id that does not come strictly after the last one.
    pub fn check_order(&self, epoch: i64) -> Result<(), ConfigError> {
        match self.last_epoch {
            Some(previous) if epoch <= previous => Err(ConfigError::NonChronological {
                previous,
                next: epoch,
            }),
            _ => Ok(()),
        }
    }

    /// Fold one epoch's distinct colors into the seen set and return the
    /// ones never seen before.
    ///
    /// Novelty depends only on set membership, never on the order of `keys`.
    /// Past the color cap, novel colors are accepted in ascending key order
    /// until the cap is full; the rest are dropped and stay unseen.
    pub fn advance(
        &mut self,
        epoch: i64,
        keys: &BTreeSet<ColorKey>,
    ) -> Result<NovelColors, ConfigError> {
        self.check_order(epoch)?;

        let novel: Vec<ColorKey> = keys
            .iter()
            .filter(|k| !self.seen.contains(k))
            .copied()
            .collect();
        let room = match self.max_colors {
            Some(max) => max.saturating_sub(self.seen.len()),
            None => usize::MAX,
        };
        let accepted = novel.len().min(room);
        let dropped = novel.len() - accepted;

        let mut colors = novel;
        colors.truncate(accepted);
        self.seen.extend(colors.iter().copied());

        self.last_epoch = Some(epoch);
        self.epochs += 1;
        if let Some(max) = self.max_colors
            && self.seen.len() >= max
        {
            self.cap_reached = true;
        }

        Ok(NovelColors {
            epoch,
            colors,
            dropped,
        })
    }

    pub fn contains(&self, key: ColorKey) -> bool {
        self.seen.contains(&key)
    }

    pub fn seen_len(&self) -> usize {
        self.seen.len()
    }

    /// Seen colors in ascending key order.
    pub fn seen_sorted(&self) -> Vec<ColorKey> {
        let mut keys: Vec<ColorKey> = self.seen.iter().copied().collect();
        keys.sort_unstable();
        keys
    }

    pub fn last_epoch(&self) -> Option<i64> {
        self.last_epoch
    }

    pub fn cap_reached(&self) -> bool {
        self.cap_reached
    }

    pub fn snapshot(&self) -> AccumulatorSnapshot {
        AccumulatorSnapshot {
            seen: self.seen.len(),
            epochs: self.epochs,
            last_epoch: self.last_epoch,
            max_colors: self.max_colors,
            cap_reached: self.cap_reached,
        }
    }
}

/// Partition an ordered epoch sequence by first appearance.
///
/// The whole sequence is checked for chronological order before any epoch
/// is processed.
pub fn accumulate<I, K>(
    epochs: I,
    max_colors: Option<usize>,
) -> Result<Vec<NovelColors>, ConfigError>
where
    I: IntoIterator<Item = (i64, K)>,
    K: IntoIterator<Item = ColorKey>,
{
    let epochs: Vec<(i64, BTreeSet<ColorKey>)> = epochs
        .into_iter()
        .map(|(id, keys)| (id, keys.into_iter().collect()))
        .collect();
    for pair in epochs.windows(2) {
        if pair[1].0 <= pair[0].0 {
            return Err(ConfigError::NonChronological {
                previous: pair[0].0,
                next: pair[1].0,
            });
        }
    }

    let mut acc = EpochAccumulator::new(max_colors);
    epochs
        .iter()
        .map(|(id, keys)| acc.advance(*id, keys))
        .collect()
}
