//! Cluster spawning: unit count, two-unit orientation and unique colours per cluster.

use crate::cluster::{Cluster, ClusterError, Color, SpawnCount, TwoUnitMode};
use log::debug;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpawnChoice {
    Fixed(SpawnCount),
    /// Uniform over One, Two and Four.
    #[default]
    Random,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnConfig {
    pub count: SpawnChoice,
    pub two_unit_mode: TwoUnitMode,
    pub palette: Vec<Color>,
}

impl SpawnConfig {
    /// Colours `0..size`.
    pub fn with_palette_size(size: u8) -> Self {
        Self {
            count: SpawnChoice::Random,
            two_unit_mode: TwoUnitMode::Auto,
            palette: (0..size).map(Color).collect(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SpawnError {
    #[error("palette is empty")]
    EmptyPalette,
    #[error(transparent)]
    Cluster(#[from] ClusterError),
}

#[derive(Debug)]
pub struct Spawner {
    config: SpawnConfig,
    rng: StdRng,
}

impl Spawner {
    /// Reproducible spawner.
    pub fn seeded(config: SpawnConfig, seed: u64) -> Self {
        Self {
            config,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn from_entropy(config: SpawnConfig) -> Self {
        Self::seeded(config, rand::rng().random())
    }

    pub fn config(&self) -> &SpawnConfig {
        &self.config
    }

    /// A fresh unplaced cluster. No colour repeats inside one cluster, so a
    /// palette smaller than the unit count caps the count.
    pub fn next_cluster(&mut self) -> Result<Cluster, SpawnError> {
        if self.config.palette.is_empty() {
            return Err(SpawnError::EmptyPalette);
        }
        let count = match self.config.count {
            SpawnChoice::Fixed(count) => count,
            SpawnChoice::Random => SpawnCount::ALL[self.rng.random_range(0..SpawnCount::ALL.len())],
        };
        let units = count.units().min(self.config.palette.len());

        let mut colors = self.config.palette.clone();
        colors.shuffle(&mut self.rng);
        colors.truncate(units);

        let mode = match (units, self.config.two_unit_mode) {
            (2, TwoUnitMode::Auto) => {
                if self.rng.random_bool(0.5) {
                    TwoUnitMode::Horizontal
                } else {
                    TwoUnitMode::Vertical
                }
            }
            (_, mode) => mode,
        };
        debug!("[Spawn] {} unit(s) {:?}, mode {:?}", units, colors, mode);
        Ok(Cluster::new(&colors, mode)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn colours_are_unique_per_cluster() {
        let mut config = SpawnConfig::with_palette_size(6);
        config.count = SpawnChoice::Fixed(SpawnCount::Four);
        let mut spawner = Spawner::seeded(config, 7);
        for _ in 0..50 {
            let cluster = spawner.next_cluster().unwrap();
            let colors: HashSet<_> = cluster.units().iter().map(|u| u.color).collect();
            assert_eq!(colors.len(), 4);
            assert!(colors.iter().all(|c| c.0 < 6));
        }
    }

    #[test]
    fn small_palette_caps_unit_count() {
        let mut config = SpawnConfig::with_palette_size(2);
        config.count = SpawnChoice::Fixed(SpawnCount::Four);
        let cluster = Spawner::seeded(config, 1).next_cluster().unwrap();
        assert_eq!(cluster.units().len(), 2);
    }

    #[test]
    fn auto_pairs_get_a_fixed_orientation() {
        let mut config = SpawnConfig::with_palette_size(4);
        config.count = SpawnChoice::Fixed(SpawnCount::Two);
        let mut spawner = Spawner::seeded(config, 3);
        let mut seen = HashSet::new();
        for _ in 0..64 {
            let mode = spawner.next_cluster().unwrap().two_unit_mode();
            assert_ne!(mode, TwoUnitMode::Auto);
            seen.insert(format!("{:?}", mode));
        }
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn explicit_mode_is_kept() {
        let mut config = SpawnConfig::with_palette_size(4);
        config.count = SpawnChoice::Fixed(SpawnCount::Two);
        config.two_unit_mode = TwoUnitMode::Vertical;
        let cluster = Spawner::seeded(config, 9).next_cluster().unwrap();
        assert_eq!(cluster.two_unit_mode(), TwoUnitMode::Vertical);
    }

    #[test]
    fn same_seed_same_sequence() {
        let config = SpawnConfig::with_palette_size(5);
        let mut a = Spawner::seeded(config.clone(), 11);
        let mut b = Spawner::seeded(config, 11);
        for _ in 0..20 {
            assert_eq!(a.next_cluster().unwrap(), b.next_cluster().unwrap());
        }
    }

    #[test]
    fn random_count_covers_all_sizes() {
        let mut spawner = Spawner::seeded(SpawnConfig::with_palette_size(6), 5);
        let sizes: HashSet<_> = (0..100)
            .map(|_| spawner.next_cluster().unwrap().units().len())
            .collect();
        assert_eq!(sizes, HashSet::from([1, 2, 4]));
    }

    #[test]
    fn empty_palette_is_an_error() {
        let config = SpawnConfig {
            count: SpawnChoice::Random,
            two_unit_mode: TwoUnitMode::Auto,
            palette: Vec::new(),
        };
        assert_eq!(
            Spawner::seeded(config, 0).next_cluster(),
            Err(SpawnError::EmptyPalette)
        );
    }
}
