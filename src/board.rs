//! Board: the rectangle of cells, the clusters placed on them, and the query surface.

use crate::cluster::{Cluster, Color, Unit};
use crate::placement::{PlacementError, Rejected};
use crate::slot::{Slot, SlotSet, SubCellAddress};
use log::{debug, info, warn};
use std::collections::HashSet;
use thiserror::Error;

/// Longest board side, in cells, on either axis.
pub const MAX_BOARD_SIDE: usize = 16;

/// Handle of a cluster owned by the board. Never reused while the board lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClusterId(usize);

impl ClusterId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// One unit of one placed cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitRef {
    pub cluster: ClusterId,
    pub unit: usize,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BoardError {
    #[error("no cell coordinates supplied")]
    Empty,
    #[error("board of {width} x {height} cells exceeds the {max}-cell side limit", max = MAX_BOARD_SIDE)]
    TooLarge { width: usize, height: usize },
}

/// One tile. The matrices mirror the holder's slot assignment, indexed `[y][x]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub x: usize,
    pub y: usize,
    holder: Option<ClusterId>,
    occupancy: [[bool; 2]; 2],
    units: [[Option<UnitRef>; 2]; 2],
}

impl Cell {
    fn new(x: usize, y: usize) -> Self {
        Self {
            x,
            y,
            holder: None,
            occupancy: [[false; 2]; 2],
            units: [[None; 2]; 2],
        }
    }

    pub fn holder(&self) -> Option<ClusterId> {
        self.holder
    }

    pub fn is_occupied(&self) -> bool {
        self.holder.is_some()
    }

    pub fn occupancy_2x2(&self) -> [[bool; 2]; 2] {
        self.occupancy
    }

    pub fn unit_in_slot(&self, slot: Slot) -> Option<UnitRef> {
        self.units[slot.y() as usize][slot.x() as usize]
    }

    pub fn occupied_slots(&self) -> SlotSet {
        SlotSet::from_slots(
            Slot::ALL
                .into_iter()
                .filter(|s| self.occupancy[s.y() as usize][s.x() as usize]),
        )
    }

    /// Empty slots sharing an edge with an occupied slot of this cell.
    pub fn availability_mask(&self) -> SlotSet {
        let occupied = self.occupied_slots();
        SlotSet::from_slots(Slot::ALL.into_iter().filter(|s| {
            !occupied.contains(*s) && s.neighbours().iter().any(|n| occupied.contains(*n))
        }))
    }

    fn clear(&mut self) {
        self.holder = None;
        self.occupancy = [[false; 2]; 2];
        self.units = [[None; 2]; 2];
    }
}

/// Grid of `width × height` cells plus every placed cluster.
#[derive(Debug, Clone)]
pub struct Board {
    width: usize,
    height: usize,
    /// Row-major: index = y * width + x.
    cells: Vec<Cell>,
    /// Slab indexed by `ClusterId`. Detached slots stay `None` and ids are not
    /// reused, so a stale `UnitRef` can never reach a newer cluster. The slab
    /// lives as long as the board; loading a level starts a fresh one.
    clusters: Vec<Option<Cluster>>,
}

impl Board {
    /// Build from the set of cell coordinates supplied by a loader.
    /// Dimensions are `max + 1` on each axis; gaps are filled with plain cells.
    pub fn from_cells<I>(coords: I) -> Result<Self, BoardError>
    where
        I: IntoIterator<Item = (usize, usize)>,
    {
        let coords: HashSet<(usize, usize)> = coords.into_iter().collect();
        let (Some(max_x), Some(max_y)) = (
            coords.iter().map(|c| c.0).max(),
            coords.iter().map(|c| c.1).max(),
        ) else {
            warn!("[Board] no cells supplied, board not loaded");
            return Err(BoardError::Empty);
        };
        let side = |max: usize| max.checked_add(1).filter(|n| *n <= MAX_BOARD_SIDE);
        let (Some(width), Some(height)) = (side(max_x), side(max_y)) else {
            let err = BoardError::TooLarge {
                width: max_x.saturating_add(1),
                height: max_y.saturating_add(1),
            };
            warn!("[Board] {}, board not loaded", err);
            return Err(err);
        };
        let filled = (width * height).saturating_sub(coords.len());
        if filled > 0 {
            warn!("[Board] {} missing cell(s) filled in to complete {}x{}", filled, width, height);
        }
        info!("[Board] loaded {} x {} ({} cells)", width, height, coords.len());
        Ok(Self::rectangle(width, height))
    }

    /// Full `width × height` board.
    pub fn new(width: usize, height: usize) -> Result<Self, BoardError> {
        if width == 0 || height == 0 {
            return Err(BoardError::Empty);
        }
        if width > MAX_BOARD_SIDE || height > MAX_BOARD_SIDE {
            let err = BoardError::TooLarge { width, height };
            warn!("[Board] {}", err);
            return Err(err);
        }
        Ok(Self::rectangle(width, height))
    }

    fn rectangle(width: usize, height: usize) -> Self {
        let cells = (0..height)
            .flat_map(|y| (0..width).map(move |x| Cell::new(x, y)))
            .collect();
        Self {
            width,
            height,
            cells,
            clusters: Vec::new(),
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Dimensions of the doubled sub-cell grid.
    #[inline]
    pub fn sub_dims(&self) -> (usize, usize) {
        (self.width * 2, self.height * 2)
    }

    /// `None` when out of range.
    pub fn cell(&self, x: usize, y: usize) -> Option<&Cell> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.cells.get(y * self.width + x)
    }

    fn cell_mut(&mut self, x: usize, y: usize) -> Option<&mut Cell> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.cells.get_mut(y * self.width + x)
    }

    /// Cells in `(x, y)` order, x outer.
    pub fn cells_by_column(&self) -> impl Iterator<Item = &Cell> + '_ {
        (0..self.width).flat_map(move |x| (0..self.height).map(move |y| &self.cells[y * self.width + x]))
    }

    pub fn free_cells(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.cells
            .iter()
            .filter(|c| !c.is_occupied())
            .map(|c| (c.x, c.y))
    }

    pub fn is_full(&self) -> bool {
        self.cells.iter().all(Cell::is_occupied)
    }

    pub fn cluster(&self, id: ClusterId) -> Option<&Cluster> {
        self.clusters.get(id.0).and_then(Option::as_ref)
    }

    pub fn clusters(&self) -> impl Iterator<Item = (ClusterId, &Cluster)> + '_ {
        self.clusters
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.as_ref().map(|c| (ClusterId(i), c)))
    }

    pub fn unit(&self, r: UnitRef) -> Option<&Unit> {
        self.cluster(r.cluster).and_then(|c| c.unit(r.unit))
    }

    /// Unit occupying a global sub-cell coordinate.
    pub fn unit_at_global(&self, gx: usize, gy: usize) -> Option<UnitRef> {
        let addr = SubCellAddress::from_global(gx, gy);
        self.cell(addr.cell_x, addr.cell_y)?.unit_in_slot(addr.slot)
    }

    pub fn unit_in_slot(&self, x: usize, y: usize, slot: Slot) -> Option<&Unit> {
        self.cell(x, y)?
            .unit_in_slot(slot)
            .and_then(|r| self.unit(r))
    }

    pub fn has_color(&self, x: usize, y: usize, color: Color) -> bool {
        self.cell(x, y)
            .and_then(Cell::holder)
            .and_then(|id| self.cluster(id))
            .is_some_and(|c| c.has_color(color))
    }

    pub fn occupancy_2x2(&self, x: usize, y: usize) -> Option<[[bool; 2]; 2]> {
        self.cell(x, y).map(Cell::occupancy_2x2)
    }

    pub fn availability_mask(&self, x: usize, y: usize) -> Option<SlotSet> {
        self.cell(x, y).map(Cell::availability_mask)
    }

    /// Global sub-cells covered by a unit.
    pub fn unit_sub_cells(&self, r: UnitRef) -> Vec<(usize, usize)> {
        let Some(cluster) = self.cluster(r.cluster) else {
            return Vec::new();
        };
        let (Some((cx, cy)), Some(unit)) = (cluster.cell(), cluster.unit(r.unit)) else {
            return Vec::new();
        };
        unit.slots
            .iter()
            .map(|s| SubCellAddress::new(cx, cy, s).to_global())
            .collect()
    }

    /// Move a cluster onto a free cell and lay it out.
    pub(crate) fn attach(
        &mut self,
        mut cluster: Cluster,
        x: usize,
        y: usize,
    ) -> Result<ClusterId, Rejected> {
        match self.cell(x, y) {
            None => {
                warn!("[Board] placement at ({}, {}) is outside {}x{}", x, y, self.width, self.height);
                return Err(Rejected::new(PlacementError::OutOfBounds { x, y }, cluster));
            }
            Some(cell) if cell.is_occupied() => {
                return Err(Rejected::new(PlacementError::Occupied { x, y }, cluster));
            }
            Some(_) => {}
        }
        if cluster.is_empty() {
            return Err(Rejected::new(PlacementError::EmptyCluster, cluster));
        }
        let id = ClusterId(self.clusters.len());
        cluster.set_cell(Some((x, y)));
        cluster.relayout();
        self.clusters.push(Some(cluster));
        if let Some(cell) = self.cell_mut(x, y) {
            cell.holder = Some(id);
        }
        self.refresh_cell(x, y);
        Ok(id)
    }

    /// Take a cluster off the board, freeing its cell.
    pub fn detach(&mut self, id: ClusterId) -> Option<Cluster> {
        let mut cluster = self.clusters.get_mut(id.0)?.take()?;
        if let Some(cell) = cluster.cell().and_then(|(x, y)| self.cell_mut(x, y)) {
            cell.clear();
        }
        cluster.set_cell(None);
        Some(cluster)
    }

    /// Rebuild a cell's matrices from its holder's current slot assignment.
    fn refresh_cell(&mut self, x: usize, y: usize) {
        let Some(holder) = self.cell(x, y).and_then(Cell::holder) else {
            return;
        };
        let mut occupancy = [[false; 2]; 2];
        let mut units = [[None; 2]; 2];
        if let Some(cluster) = self.cluster(holder) {
            for (i, unit) in cluster.units().iter().enumerate() {
                if !unit.is_present() {
                    continue;
                }
                for s in unit.slots.iter() {
                    let (sx, sy) = (s.x() as usize, s.y() as usize);
                    occupancy[sy][sx] = true;
                    units[sy][sx] = Some(UnitRef {
                        cluster: holder,
                        unit: i,
                    });
                }
            }
        }
        if let Some(cell) = self.cell_mut(x, y) {
            cell.occupancy = occupancy;
            cell.units = units;
        }
    }

    /// Flag a live unit as claimed by a group.
    pub(crate) fn mark_removing(&mut self, r: UnitRef) -> bool {
        self.clusters
            .get_mut(r.cluster.0)
            .and_then(Option::as_mut)
            .is_some_and(|c| c.mark_removing(r.unit))
    }

    /// Remove a unit for good: the cluster shrinks and re-lays out, and an emptied
    /// cluster releases its cell.
    pub(crate) fn remove_unit(&mut self, r: UnitRef) -> bool {
        let Some(cluster) = self.clusters.get_mut(r.cluster.0).and_then(Option::as_mut) else {
            warn!("[Board] removal of unit in unknown cluster {:?}", r.cluster);
            return false;
        };
        if !cluster.mark_removed(r.unit) {
            return false;
        }
        let cell = cluster.cell();
        if cluster.is_empty() {
            debug!("[Board] cluster {:?} emptied, releasing {:?}", r.cluster, cell);
            self.detach(r.cluster);
        } else if let Some((x, y)) = cell {
            self.refresh_cell(x, y);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::TwoUnitMode;

    fn slot(x: u8, y: u8) -> Slot {
        Slot::new(x, y).unwrap()
    }

    #[test]
    fn dimensions_come_from_max_coordinates() {
        let board = Board::from_cells([(0, 0), (3, 1), (2, 2)]).unwrap();
        assert_eq!((board.width(), board.height()), (4, 3));
        assert_eq!(board.sub_dims(), (8, 6));
        assert!(board.cell(1, 1).is_some());
        assert!(board.cell(4, 0).is_none());
        assert!(board.cell(0, 3).is_none());
    }

    #[test]
    fn empty_load_is_rejected() {
        assert_eq!(
            Board::from_cells(std::iter::empty()).unwrap_err(),
            BoardError::Empty
        );
        assert!(Board::new(0, 3).is_err());
    }

    #[test]
    fn oversized_load_is_rejected() {
        assert_eq!(
            Board::from_cells([(usize::MAX, 0)]).unwrap_err(),
            BoardError::TooLarge {
                width: usize::MAX,
                height: 1
            }
        );
        assert!(matches!(
            Board::from_cells([(1 << 33, 1 << 33)]),
            Err(BoardError::TooLarge { .. })
        ));
        assert!(matches!(
            Board::from_cells([(0, MAX_BOARD_SIDE)]),
            Err(BoardError::TooLarge { width: 1, .. })
        ));
        assert!(Board::new(MAX_BOARD_SIDE + 1, 1).is_err());

        let widest = Board::from_cells([(MAX_BOARD_SIDE - 1, MAX_BOARD_SIDE - 1)]).unwrap();
        assert_eq!(widest.width(), MAX_BOARD_SIDE);
    }

    #[test]
    fn detached_ids_are_not_reused() {
        let mut board = Board::new(1, 1).unwrap();
        let first = board
            .attach(Cluster::new(&[Color(1)], TwoUnitMode::Auto).unwrap(), 0, 0)
            .unwrap();
        board.detach(first).unwrap();
        let second = board
            .attach(Cluster::new(&[Color(2)], TwoUnitMode::Auto).unwrap(), 0, 0)
            .unwrap();
        assert_ne!(first, second);
        assert!(board.cluster(first).is_none());
        assert!(board.unit(UnitRef { cluster: first, unit: 0 }).is_none());
    }

    #[test]
    fn attach_mirrors_slots_into_cell() {
        let mut board = Board::new(2, 2).unwrap();
        let cluster = Cluster::new(&[Color(1), Color(2)], TwoUnitMode::Auto).unwrap();
        let id = board.attach(cluster, 1, 0).unwrap();
        let cell = board.cell(1, 0).unwrap();
        assert_eq!(cell.holder(), Some(id));
        assert_eq!(cell.occupancy_2x2(), [[true, true], [true, true]]);
        assert_eq!(cell.unit_in_slot(slot(1, 0)), Some(UnitRef { cluster: id, unit: 0 }));
        assert_eq!(cell.unit_in_slot(slot(0, 1)), Some(UnitRef { cluster: id, unit: 1 }));
        assert_eq!(board.cluster(id).unwrap().cell(), Some((1, 0)));
        assert!(board.has_color(1, 0, Color(2)));
        assert!(!board.has_color(1, 0, Color(3)));
        assert!(!board.has_color(0, 0, Color(1)));
        assert_eq!(board.unit_in_slot(1, 0, slot(1, 1)).map(|u| u.color), Some(Color(2)));
    }

    #[test]
    fn attach_rejects_occupied_and_out_of_range() {
        let mut board = Board::new(1, 1).unwrap();
        let first = Cluster::new(&[Color(1)], TwoUnitMode::Auto).unwrap();
        board.attach(first, 0, 0).unwrap();

        let second = Cluster::new(&[Color(2)], TwoUnitMode::Auto).unwrap();
        let rejected = board.attach(second, 0, 0).unwrap_err();
        assert_eq!(rejected.reason, PlacementError::Occupied { x: 0, y: 0 });
        assert!(rejected.cluster.has_color(Color(2)));

        let rejected = board.attach(rejected.cluster, 5, 0).unwrap_err();
        assert_eq!(rejected.reason, PlacementError::OutOfBounds { x: 5, y: 0 });
        assert_eq!(board.clusters().count(), 1);
    }

    #[test]
    fn removal_shrinks_then_releases() {
        let mut board = Board::new(1, 1).unwrap();
        let cluster = Cluster::new(&[Color(1), Color(2)], TwoUnitMode::Auto).unwrap();
        let id = board.attach(cluster, 0, 0).unwrap();

        assert!(board.remove_unit(UnitRef { cluster: id, unit: 0 }));
        let cell = board.cell(0, 0).unwrap();
        assert_eq!(cell.occupied_slots(), SlotSet::FULL);
        assert_eq!(cell.unit_in_slot(slot(0, 0)), Some(UnitRef { cluster: id, unit: 1 }));

        assert!(board.remove_unit(UnitRef { cluster: id, unit: 1 }));
        let cell = board.cell(0, 0).unwrap();
        assert!(!cell.is_occupied());
        assert_eq!(cell.occupied_slots(), SlotSet::EMPTY);
        assert!(board.cluster(id).is_none());
        assert!(!board.remove_unit(UnitRef { cluster: id, unit: 1 }));
    }

    #[test]
    fn detach_returns_unplaced_cluster() {
        let mut board = Board::new(2, 1).unwrap();
        let cluster = Cluster::new(&[Color(4)], TwoUnitMode::Auto).unwrap();
        let id = board.attach(cluster, 1, 0).unwrap();
        let back = board.detach(id).unwrap();
        assert_eq!(back.cell(), None);
        assert!(!board.cell(1, 0).unwrap().is_occupied());
        assert!(board.detach(id).is_none());
    }

    #[test]
    fn availability_mask_lists_attach_points() {
        let mut board = Board::new(1, 1).unwrap();
        let cluster = Cluster::with_slots(&[(Color(1), SlotSet::single(slot(0, 0)))]).unwrap();
        // with_slots keeps the lone slot until the board lays it out
        assert_eq!(cluster.occupied(), SlotSet::single(slot(0, 0)));
        board.attach(cluster, 0, 0).unwrap();
        assert_eq!(board.availability_mask(0, 0), Some(SlotSet::EMPTY));

        let mut cell = Cell::new(0, 0);
        cell.occupancy = [[true, false], [false, false]];
        assert_eq!(
            cell.availability_mask(),
            SlotSet::from_slots([slot(1, 0), slot(0, 1)])
        );
        assert_eq!(Cell::new(0, 0).availability_mask(), SlotSet::EMPTY);
    }

    #[test]
    fn column_order_iteration() {
        let board = Board::new(2, 2).unwrap();
        let order: Vec<_> = board.cells_by_column().map(|c| (c.x, c.y)).collect();
        assert_eq!(order, vec![(0, 0), (0, 1), (1, 0), (1, 1)]);
    }
}
