//! quadmerge: a tile-merging puzzle core.
//!
//! Each board cell holds a cluster of up to four coloured units on a 2×2 sub-grid.
//! Same-coloured units touching across the whole doubled grid pop together, and the
//! clusters left behind re-lay out, which can start the next pop.

pub mod board;
pub mod cluster;
pub mod config;
pub mod engine;
pub mod level;
pub mod matcher;
pub mod placement;
pub mod scheduler;
pub mod slot;
pub mod spawn;

pub use board::{Board, BoardError, Cell, ClusterId, UnitRef};
pub use cluster::{
    Cluster, ClusterError, Color, Orientation, SpawnCount, TwoUnitMode, Unit, UnitPose, UnitState,
};
pub use config::EngineConfig;
pub use engine::{Engine, ImmediateRemoval, RemovalOutcome, RemovalPipeline, RemovalTicket, TickReport};
pub use level::{Goal, LEVEL_REWARD_COINS, Level, LevelError};
pub use matcher::{Group, MatchEngine};
pub use placement::{PlacementError, PlacementResolver, Rejected};
pub use scheduler::{ScanScheduler, SchedulerState};
pub use slot::{Slot, SlotSet, SubCellAddress};
pub use spawn::{SpawnChoice, SpawnConfig, SpawnError, Spawner};
