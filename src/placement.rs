//! Placement: resolving a drop point to a cell and committing clusters to the board.

use crate::board::{Board, ClusterId};
use crate::cluster::Cluster;
use crate::scheduler::ScanScheduler;
use log::{debug, info};
use std::time::Duration;
use thiserror::Error;

/// Default pull radius, in world units, for drops that miss a free cell.
pub const DEFAULT_SNAP_RADIUS: f32 = 2.0;

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum PlacementError {
    #[error("cell ({x}, {y}) is outside the board")]
    OutOfBounds { x: usize, y: usize },
    #[error("cell ({x}, {y}) is already occupied")]
    Occupied { x: usize, y: usize },
    #[error("cluster has no units left")]
    EmptyCluster,
    #[error("no board is loaded")]
    NoBoard,
    #[error("no free cell near the drop point")]
    NoTarget,
}

/// A refused placement. The cluster is handed back untouched.
#[derive(Debug, Error)]
#[error("{reason}")]
pub struct Rejected {
    pub reason: PlacementError,
    pub cluster: Cluster,
}

impl Rejected {
    pub fn new(reason: PlacementError, cluster: Cluster) -> Self {
        Self { reason, cluster }
    }
}

#[derive(Debug, Clone)]
pub struct PlacementResolver {
    cell_size: f32,
    snap_radius: f32,
    delay: Duration,
}

impl Default for PlacementResolver {
    fn default() -> Self {
        Self::new(1.0, DEFAULT_SNAP_RADIUS, Duration::ZERO)
    }
}

impl PlacementResolver {
    pub fn new(cell_size: f32, snap_radius: f32, delay: Duration) -> Self {
        Self {
            cell_size: if cell_size > 0.0 { cell_size } else { 1.0 },
            snap_radius: snap_radius.max(0.0),
            delay,
        }
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    pub fn snap_radius(&self) -> f32 {
        self.snap_radius
    }

    /// Commit `cluster` to cell `(x, y)` and ask for a scan.
    pub fn place(
        &self,
        board: &mut Board,
        scheduler: &mut ScanScheduler,
        cluster: Cluster,
        x: usize,
        y: usize,
    ) -> Result<ClusterId, Rejected> {
        let units = cluster.present_count();
        let id = board.attach(cluster, x, y).inspect_err(|r| {
            debug!("[Placement] ({}, {}) refused: {}", x, y, r.reason);
        })?;
        info!("[Placement] cluster {:?} with {} unit(s) placed at ({}, {})", id, units, x, y);
        scheduler.request_scan(self.delay);
        Ok(id)
    }

    /// World-space centre of a cell.
    pub fn cell_center(&self, x: usize, y: usize) -> (f32, f32) {
        (x as f32 * self.cell_size, y as f32 * self.cell_size)
    }

    /// Cell whose square contains `point`, if it lies on the board.
    pub fn cell_at_point(&self, board: &Board, point: (f32, f32)) -> Option<(usize, usize)> {
        let to_index = |v: f32, limit: usize| {
            let i = (v / self.cell_size + 0.5).floor();
            (i >= 0.0 && i < limit as f32).then_some(i as usize)
        };
        Some((to_index(point.0, board.width())?, to_index(point.1, board.height())?))
    }

    /// Target for a drop: the cell under the point when free, else the nearest
    /// free cell whose centre lies within the snap radius.
    pub fn resolve_drop(&self, board: &Board, point: (f32, f32)) -> Option<(usize, usize)> {
        if let Some((x, y)) = self.cell_at_point(board, point) {
            if board.cell(x, y).is_some_and(|c| !c.is_occupied()) {
                return Some((x, y));
            }
        }
        let dist_sq = |(x, y): (usize, usize)| {
            let (cx, cy) = self.cell_center(x, y);
            (cx - point.0).powi(2) + (cy - point.1).powi(2)
        };
        let radius_sq = self.snap_radius * self.snap_radius;
        board
            .free_cells()
            .map(|c| (c, dist_sq(c)))
            .filter(|&(_, d)| d <= radius_sq)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(c, _)| c)
    }
}
