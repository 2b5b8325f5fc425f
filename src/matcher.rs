//! Match detection: same-colour connected units over the global sub-cell grid.

use crate::board::{Board, UnitRef};
use crate::cluster::Color;
use crate::slot::{Slot, SubCellAddress};
use log::debug;
use std::collections::VecDeque;

/// 4-neighbourhood on the doubled grid.
const NEIGHBOURS_4: [(isize, isize); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

/// Default minimum number of units for a group to pop.
pub const DEFAULT_MIN_GROUP_SIZE: usize = 2;

/// A maximal connected set of same-colour units, in discovery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub color: Color,
    pub units: Vec<UnitRef>,
}

impl Group {
    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct MatchEngine {
    min_group_size: usize,
}

impl Default for MatchEngine {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_GROUP_SIZE)
    }
}

impl MatchEngine {
    pub fn new(min_group_size: usize) -> Self {
        Self {
            min_group_size: min_group_size.max(1),
        }
    }

    pub fn min_group_size(&self) -> usize {
        self.min_group_size
    }

    /// Every group at or above the minimum size, without claiming anything.
    pub fn find_groups(&self, board: &Board) -> Vec<Group> {
        let (gw, gh) = board.sub_dims();
        let mut visited = vec![false; gw * gh];
        let mut groups = Vec::new();

        for cell in board.cells_by_column() {
            for slot in Slot::ALL {
                let (gx, gy) = SubCellAddress::new(cell.x, cell.y, slot).to_global();
                if visited[gy * gw + gx] {
                    continue;
                }
                let Some(seed) = cell.unit_in_slot(slot) else {
                    visited[gy * gw + gx] = true;
                    continue;
                };
                let Some(color) = board
                    .unit(seed)
                    .filter(|u| u.is_matchable())
                    .map(|u| u.color)
                else {
                    continue;
                };
                let group = flood_fill(board, seed, color, &mut visited);
                if group.len() >= self.min_group_size {
                    groups.push(group);
                }
            }
        }
        groups
    }

    /// Find qualifying groups and flag their units as being removed, so neither a
    /// later seed in this pass nor a later scan can claim them again.
    pub fn scan(&self, board: &mut Board) -> Vec<Group> {
        let groups = self.find_groups(board);
        for group in &groups {
            debug!(
                "[Match] group of {} unit(s), colour {}",
                group.len(),
                group.color
            );
            for &unit in &group.units {
                board.mark_removing(unit);
            }
        }
        groups
    }
}

/// BFS from `seed`. Entering a unit marks all of its sub-cells visited and queues
/// them, so multi-slot units are collected once and fan out from every slot.
fn flood_fill(board: &Board, seed: UnitRef, color: Color, visited: &mut [bool]) -> Group {
    let (gw, gh) = board.sub_dims();
    let mut units = Vec::new();
    let mut queue = VecDeque::new();
    enter(board, seed, gw, visited, &mut units, &mut queue);

    while let Some((x, y)) = queue.pop_front() {
        for (dx, dy) in NEIGHBOURS_4 {
            let (Some(nx), Some(ny)) = (x.checked_add_signed(dx), y.checked_add_signed(dy)) else {
                continue;
            };
            if nx >= gw || ny >= gh || visited[ny * gw + nx] {
                continue;
            }
            let Some(next) = board.unit_at_global(nx, ny) else {
                continue;
            };
            let joins = board
                .unit(next)
                .is_some_and(|u| u.is_matchable() && u.color == color);
            if joins {
                enter(board, next, gw, visited, &mut units, &mut queue);
            }
        }
    }
    Group { color, units }
}

fn enter(
    board: &Board,
    unit: UnitRef,
    gw: usize,
    visited: &mut [bool],
    units: &mut Vec<UnitRef>,
    queue: &mut VecDeque<(usize, usize)>,
) {
    units.push(unit);
    for (x, y) in board.unit_sub_cells(unit) {
        visited[y * gw + x] = true;
        queue.push_back((x, y));
    }
}
