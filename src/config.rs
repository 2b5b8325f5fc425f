//! Tunables for the engine. The binary folds its command line into these.

use crate::matcher::DEFAULT_MIN_GROUP_SIZE;
use crate::placement::DEFAULT_SNAP_RADIUS;
use crate::scheduler::DEFAULT_CASCADE_DELAY;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Smallest group that pops.
    pub min_group_size: usize,
    /// Scan delay after a placement.
    pub placement_delay: Duration,
    /// Scan delay after a removal finishes.
    pub cascade_delay: Duration,
    /// World size of one cell; cell centres sit at `(x * cell_size, y * cell_size)`.
    pub cell_size: f32,
    pub snap_radius: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_group_size: DEFAULT_MIN_GROUP_SIZE,
            placement_delay: Duration::ZERO,
            cascade_delay: DEFAULT_CASCADE_DELAY,
            cell_size: 1.0,
            snap_radius: DEFAULT_SNAP_RADIUS,
        }
    }
}
