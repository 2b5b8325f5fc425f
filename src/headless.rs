//! Headless autoplay: a random bot places clusters, pops resolve instantly, and a
//! summary is printed at the end.

use crate::GameConfig;
use anyhow::Result;
use log::info;
use quadmerge::{Engine, ImmediateRemoval, LEVEL_REWARD_COINS, Level, Spawner};
use rand::rngs::StdRng;
use rand::seq::IteratorRandom;
use rand::{Rng, SeedableRng};
use std::time::Duration;

/// Simulated frame length for settling.
const STEP: Duration = Duration::from_millis(16);
/// Upper bound on ticks spent settling after one placement.
const MAX_SETTLE_TICKS: usize = 10_000;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Summary {
    pub placements: usize,
    pub pops: usize,
    pub units_popped: usize,
    pub cells_freed: usize,
    pub levels_completed: u32,
    pub coins: u32,
    pub board_full: bool,
}

pub fn run(config: &GameConfig, moves: usize) -> Result<()> {
    let summary = play(config, moves)?;
    println!("placements      {}", summary.placements);
    println!("groups popped   {}", summary.pops);
    println!("units popped    {}", summary.units_popped);
    println!("cells freed     {}", summary.cells_freed);
    println!("levels cleared  {}", summary.levels_completed);
    println!("coins           {}", summary.coins);
    if summary.board_full {
        println!("stopped early: board full");
    }
    Ok(())
}

/// Play up to `moves` random placements.
pub fn play(config: &GameConfig, moves: usize) -> Result<Summary> {
    let seed = config.seed.unwrap_or_else(|| rand::rng().random());
    info!("[Headless] seed {}", seed);
    let mut bot = StdRng::seed_from_u64(seed.wrapping_add(1));

    let mut index = config.first_level;
    let mut level = config.level(index)?;
    let mut engine = Engine::new(config.engine.clone());
    engine.load_board(level.cell_coords())?;
    let mut spawner = Spawner::seeded(config.spawn_config(&level), seed);
    let mut removal = ImmediateRemoval::default();
    let mut summary = Summary::default();

    for _ in 0..moves {
        let Some(board) = engine.board() else {
            break;
        };
        let Some((x, y)) = board.free_cells().choose(&mut bot) else {
            summary.board_full = true;
            break;
        };
        let cluster = spawner.next_cluster()?;
        if let Err(rejected) = engine.place(cluster, x, y) {
            log::warn!("[Headless] placement at ({}, {}) refused: {}", x, y, rejected);
            continue;
        }
        summary.placements += 1;

        for outcome in engine.settle(&mut removal, STEP, MAX_SETTLE_TICKS) {
            summary.pops += 1;
            summary.units_popped += outcome.removed;
            summary.cells_freed += outcome.released_cells.len();
            level.record(outcome.color, u32::try_from(outcome.removed).unwrap_or(u32::MAX));
        }

        if level.is_complete() {
            summary.levels_completed += 1;
            summary.coins += LEVEL_REWARD_COINS;
            index = index.saturating_add(1);
            level = next_level(config, index)?;
            engine.load_board(level.cell_coords())?;
            spawner = Spawner::seeded(config.spawn_config(&level), seed.wrapping_add(u64::from(index)));
            info!("[Headless] advancing to '{}'", level.name);
        }
    }
    Ok(summary)
}

fn next_level(config: &GameConfig, index: u32) -> Result<Level> {
    let mut level = config.level(index)?;
    level.reset_progress();
    Ok(level)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quadmerge::{EngineConfig, SpawnChoice, SpawnCount, TwoUnitMode};

    fn config(seed: u64) -> GameConfig {
        GameConfig {
            engine: EngineConfig::default(),
            spawn_count: SpawnChoice::Random,
            two_unit_mode: TwoUnitMode::Auto,
            palette_size: None,
            level_file: None,
            first_level: 0,
            board_size: (None, None),
            pop_duration: Duration::from_millis(700),
            no_animation: true,
            tick_rate: 60.0,
            seed: Some(seed),
        }
    }

    #[test]
    fn same_seed_same_game() {
        let a = play(&config(5), 60).unwrap();
        let b = play(&config(5), 60).unwrap();
        assert_eq!(a, b);
        assert!(a.placements > 0);
    }

    #[test]
    fn single_colour_board_pops_every_pair() {
        let mut cfg = config(1);
        cfg.palette_size = Some(1);
        cfg.spawn_count = SpawnChoice::Fixed(SpawnCount::One);
        let summary = play(&cfg, 40).unwrap();
        assert!(summary.pops > 0);
        assert!(!summary.board_full);
        assert_eq!(summary.coins, summary.levels_completed * LEVEL_REWARD_COINS);
    }

    #[test]
    fn board_fills_without_matches() {
        let mut cfg = config(2);
        cfg.engine.min_group_size = 64;
        cfg.board_size = (Some(2), Some(2));
        let summary = play(&cfg, 10).unwrap();
        assert_eq!(summary.placements, 4);
        assert!(summary.board_full);
        assert_eq!(summary.pops, 0);
    }
}
