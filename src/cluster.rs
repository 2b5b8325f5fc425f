//! Cluster: the 1–4 coloured units placed together in one cell, and their layout rules.

use crate::slot::{Slot, SlotSet};
use std::fmt;
use thiserror::Error;

/// Base size of a one-slot unit, as a fraction of the cell size.
const UNIT_SCALE: f32 = 0.45;
/// Cap for a unit stretched across two slots.
const PAIR_SCALE_CAP: f32 = 0.9;
/// Cap for a unit filling the whole cell.
const FULL_SCALE_CAP: f32 = 0.95;
/// Distance from the cell centre to a quadrant centre, as a fraction of the cell size.
const QUADRANT_OFFSET: f32 = 0.25;

/// Opaque colour identifier; only equality matters to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Color(pub u8);

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitState {
    Live,
    /// Claimed by a group; its pop animation is in flight.
    Removing,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unit {
    pub color: Color,
    pub slots: SlotSet,
    pub state: UnitState,
}

impl Unit {
    fn new(color: Color) -> Self {
        Self {
            color,
            slots: SlotSet::EMPTY,
            state: UnitState::Live,
        }
    }

    /// Still holds slots (live or popping).
    #[inline]
    pub fn is_present(&self) -> bool {
        self.state != UnitState::Removed
    }

    /// Can take part in a match.
    #[inline]
    pub fn is_matchable(&self) -> bool {
        self.state == UnitState::Live
    }
}

/// How many units a freshly spawned cluster carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpawnCount {
    #[default]
    One,
    Two,
    Four,
}

impl SpawnCount {
    pub const ALL: [Self; 3] = [Self::One, Self::Two, Self::Four];

    pub const fn units(self) -> usize {
        match self {
            Self::One => 1,
            Self::Two => 2,
            Self::Four => 4,
        }
    }

    fn for_units(n: usize) -> Self {
        match n {
            0 | 1 => Self::One,
            2 => Self::Two,
            _ => Self::Four,
        }
    }
}

/// Fixed orientation for two-unit layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TwoUnitMode {
    #[default]
    Auto,
    Horizontal,
    Vertical,
}

/// Resolved split of a two-unit cluster: each unit takes a full row or a full column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

/// Position (relative to the cell centre) and size of a unit, in world units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitPose {
    pub offset: (f32, f32),
    pub scale: (f32, f32),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClusterError {
    #[error("a cluster needs at least one unit")]
    Empty,
    #[error("a cluster holds at most 4 units, got {0}")]
    TooManyUnits(usize),
    #[error("unit {0} has no slots")]
    NoSlots(usize),
    #[error("unit {0} overlaps slots already claimed by an earlier unit")]
    OverlappingSlots(usize),
}

/// Units sharing one cell. Removed units stay in the list so unit indices never shift.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    units: Vec<Unit>,
    cell: Option<(usize, usize)>,
    spawn_count: SpawnCount,
    two_unit_mode: TwoUnitMode,
}

impl Cluster {
    /// New unplaced cluster, one unit per colour, laid out by unit count.
    pub fn new(colors: &[Color], two_unit_mode: TwoUnitMode) -> Result<Self, ClusterError> {
        check_count(colors.len())?;
        let mut cluster = Self {
            units: colors.iter().copied().map(Unit::new).collect(),
            cell: None,
            spawn_count: SpawnCount::for_units(colors.len()),
            two_unit_mode,
        };
        cluster.relayout();
        Ok(cluster)
    }

    /// Cluster with an explicit slot assignment. A valid assignment for the unit
    /// count is kept as is by later layout passes.
    pub fn with_slots(units: &[(Color, SlotSet)]) -> Result<Self, ClusterError> {
        check_count(units.len())?;
        let mut claimed = SlotSet::EMPTY;
        for (i, (_, slots)) in units.iter().enumerate() {
            if slots.is_empty() {
                return Err(ClusterError::NoSlots(i));
            }
            if claimed.intersects(*slots) {
                return Err(ClusterError::OverlappingSlots(i));
            }
            claimed = claimed.union(*slots);
        }
        Ok(Self {
            units: units
                .iter()
                .map(|&(color, slots)| Unit {
                    color,
                    slots,
                    state: UnitState::Live,
                })
                .collect(),
            cell: None,
            spawn_count: SpawnCount::for_units(units.len()),
            two_unit_mode: TwoUnitMode::Auto,
        })
    }

    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    pub fn unit(&self, index: usize) -> Option<&Unit> {
        self.units.get(index)
    }

    pub fn cell(&self) -> Option<(usize, usize)> {
        self.cell
    }

    pub(crate) fn set_cell(&mut self, cell: Option<(usize, usize)>) {
        self.cell = cell;
    }

    pub fn spawn_count(&self) -> SpawnCount {
        self.spawn_count
    }

    pub fn two_unit_mode(&self) -> TwoUnitMode {
        self.two_unit_mode
    }

    pub fn set_two_unit_mode(&mut self, mode: TwoUnitMode) {
        self.two_unit_mode = mode;
        self.relayout();
    }

    /// Units that still hold slots.
    pub fn present_count(&self) -> usize {
        self.units.iter().filter(|u| u.is_present()).count()
    }

    /// No unit left; the cluster is logically destroyed.
    pub fn is_empty(&self) -> bool {
        self.present_count() == 0
    }

    pub fn has_color(&self, color: Color) -> bool {
        self.units.iter().any(|u| u.is_present() && u.color == color)
    }

    /// Index of the present unit claiming `slot`.
    pub fn unit_in_slot(&self, slot: Slot) -> Option<usize> {
        self.units
            .iter()
            .position(|u| u.is_present() && u.slots.contains(slot))
    }

    /// Union of the slots held by present units.
    pub fn occupied(&self) -> SlotSet {
        self.units
            .iter()
            .filter(|u| u.is_present())
            .fold(SlotSet::EMPTY, |acc, u| acc.union(u.slots))
    }

    /// Flag a live unit as claimed by a group. Returns false if it was not live.
    pub(crate) fn mark_removing(&mut self, index: usize) -> bool {
        match self.units.get_mut(index) {
            Some(unit) if unit.state == UnitState::Live => {
                unit.state = UnitState::Removing;
                true
            }
            _ => false,
        }
    }

    /// Drop a unit from the layout and re-run the layout rules for the new count.
    /// Returns false if the unit was already gone.
    pub(crate) fn mark_removed(&mut self, index: usize) -> bool {
        match self.units.get_mut(index) {
            Some(unit) if unit.is_present() => {
                unit.state = UnitState::Removed;
                unit.slots = SlotSet::EMPTY;
                self.relayout();
                true
            }
            _ => false,
        }
    }

    /// Recompute slot assignment from the current present-unit count.
    pub fn relayout(&mut self) {
        let present: Vec<usize> = (0..self.units.len())
            .filter(|&i| self.units[i].is_present())
            .collect();
        match present.len() {
            0 => {}
            1 => self.units[present[0]].slots = SlotSet::FULL,
            2 => self.layout_pair(present[0], present[1]),
            3 => {
                if !self.is_disjoint_cover(&present, |_| true) {
                    self.split_evenly(&present);
                }
                self.expand_lonely_rows(&present);
            }
            _ => {
                if !self.is_disjoint_cover(&present, |slots| slots.len() == 1) {
                    self.split_evenly(&present);
                }
            }
        }
    }

    /// Every unit has at least one slot, no two overlap, and each satisfies `shape`.
    fn is_disjoint_cover(&self, present: &[usize], shape: impl Fn(SlotSet) -> bool) -> bool {
        let mut claimed = SlotSet::EMPTY;
        for &i in present {
            let slots = self.units[i].slots;
            if slots.is_empty() || claimed.intersects(slots) || !shape(slots) {
                return false;
            }
            claimed = claimed.union(slots);
        }
        true
    }

    /// Canonical slots split in order; earlier units take the remainder.
    fn split_evenly(&mut self, present: &[usize]) {
        let n = present.len();
        let base = Slot::ALL.len() / n;
        let remainder = Slot::ALL.len() % n;
        let mut next = 0;
        for (k, &i) in present.iter().enumerate() {
            let take = base + usize::from(k < remainder);
            self.units[i].slots = SlotSet::from_slots(Slot::ALL[next..next + take].iter().copied());
            next += take;
        }
    }

    /// A row touched by exactly one unit is handed entirely to that unit.
    fn expand_lonely_rows(&mut self, present: &[usize]) {
        for y in 0..2 {
            let row = SlotSet::row(y);
            let mut touching = present
                .iter()
                .copied()
                .filter(|&i| self.units[i].slots.intersects(row));
            if let (Some(only), None) = (touching.next(), touching.next()) {
                self.units[only].slots = self.units[only].slots.union(row);
            }
        }
    }

    fn layout_pair(&mut self, first: usize, second: usize) {
        let (a, b) = (self.units[first].slots, self.units[second].slots);
        let orientation = match self.two_unit_mode {
            TwoUnitMode::Horizontal => Orientation::Horizontal,
            TwoUnitMode::Vertical => Orientation::Vertical,
            TwoUnitMode::Auto => infer_orientation(a, b),
        };
        let (sa, sb) = match orientation {
            Orientation::Horizontal => {
                let (ra, rb) = pick_lines(single_line(a.rows()), single_line(b.rows()));
                (SlotSet::row(ra), SlotSet::row(rb))
            }
            Orientation::Vertical => {
                let (ca, cb) = pick_lines(single_line(a.columns()), single_line(b.columns()));
                (SlotSet::column(ca), SlotSet::column(cb))
            }
        };
        self.units[first].slots = sa;
        self.units[second].slots = sb;
    }

    /// Pose of every unit (`None` for removed ones), for a cell of `cell_size` world units.
    pub fn poses(&self, cell_size: f32) -> Vec<Option<UnitPose>> {
        let occupied = self.occupied();
        self.units
            .iter()
            .map(|u| {
                u.is_present().then(|| {
                    let others = SlotSet::from_slots(
                        occupied.iter().filter(|s| !u.slots.contains(*s)),
                    );
                    pose_for(u.slots, others, cell_size)
                })
            })
            .collect()
    }
}

fn check_count(n: usize) -> Result<(), ClusterError> {
    match n {
        0 => Err(ClusterError::Empty),
        1..=4 => Ok(()),
        _ => {
            log::error!("[Cluster] rejected layout input with {} units", n);
            Err(ClusterError::TooManyUnits(n))
        }
    }
}

fn infer_orientation(a: SlotSet, b: SlotSet) -> Orientation {
    if a.full_row().is_some() || b.full_row().is_some() {
        return Orientation::Horizontal;
    }
    if a.full_column().is_some() || b.full_column().is_some() {
        return Orientation::Vertical;
    }
    let share_row = a.rows() & b.rows() != 0;
    let share_col = a.columns() & b.columns() != 0;
    match (share_row, share_col) {
        (false, true) => Orientation::Vertical,
        _ => Orientation::Horizontal,
    }
}

/// `Some(i)` when the 2-bit line mask names exactly one row/column.
fn single_line(mask: u8) -> Option<u8> {
    match mask {
        0b01 => Some(0),
        0b10 => Some(1),
        _ => None,
    }
}

fn pick_lines(first: Option<u8>, second: Option<u8>) -> (u8, u8) {
    let a = first.unwrap_or(0);
    let b = match second {
        Some(line) if line != a => line,
        _ => 1 - a,
    };
    (a, b)
}

fn pose_for(slots: SlotSet, others: SlotSet, cell_size: f32) -> UnitPose {
    let n = slots.len().max(1) as f32;
    let (sx, sy) = slots.iter().fold((0.0, 0.0), |(ax, ay), s| {
        (
            ax + (f32::from(s.x()) - 0.5) * 2.0 * QUADRANT_OFFSET,
            ay + (f32::from(s.y()) - 0.5) * 2.0 * QUADRANT_OFFSET,
        )
    });
    let offset = (sx / n * cell_size, sy / n * cell_size);

    let base = UNIT_SCALE * cell_size;
    let cap = if slots.len() == 4 {
        FULL_SCALE_CAP
    } else {
        PAIR_SCALE_CAP
    } * cell_size;
    let (stretch_x, stretch_y) = match (slots.len(), slots.columns(), slots.rows()) {
        (2, 0b11, 0b11) => match diagonal_axis(slots, others) {
            Orientation::Horizontal => (true, false),
            Orientation::Vertical => (false, true),
        },
        (_, cols, rows) => (cols == 0b11, rows == 0b11),
    };
    let scale_along = |stretch: bool| {
        if stretch {
            (base * 2.0).min(cap)
        } else {
            base
        }
    };
    UnitPose {
        offset,
        scale: (scale_along(stretch_x), scale_along(stretch_y)),
    }
}

/// Stretch axis for a diagonal pair: toward the neighbours it touches, vertical on a tie.
fn diagonal_axis(slots: SlotSet, others: SlotSet) -> Orientation {
    let touches = |dx: bool| {
        slots.iter().any(|s| {
            let n = s.neighbours();
            others.contains(if dx { n[0] } else { n[1] })
        })
    };
    let horizontal = touches(true);
    let vertical = touches(false);
    if horizontal && !vertical {
        Orientation::Horizontal
    } else {
        Orientation::Vertical
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(x: u8, y: u8) -> Slot {
        Slot::new(x, y).unwrap()
    }

    fn colors(ids: &[u8]) -> Vec<Color> {
        ids.iter().copied().map(Color).collect()
    }

    fn assert_disjoint(cluster: &Cluster) {
        let mut claimed = SlotSet::EMPTY;
        for unit in cluster.units().iter().filter(|u| u.is_present()) {
            assert!(!unit.slots.is_empty());
            assert!(!claimed.intersects(unit.slots), "overlap in {:?}", cluster);
            claimed = claimed.union(unit.slots);
        }
    }

    #[test]
    fn single_unit_fills_cell() {
        let c = Cluster::new(&colors(&[3]), TwoUnitMode::Auto).unwrap();
        assert_eq!(c.units()[0].slots, SlotSet::FULL);
        assert_eq!(c.spawn_count(), SpawnCount::One);
    }

    #[test]
    fn four_units_take_canonical_slots() {
        let c = Cluster::new(&colors(&[1, 2, 3, 4]), TwoUnitMode::Auto).unwrap();
        for (i, unit) in c.units().iter().enumerate() {
            assert_eq!(unit.slots, SlotSet::single(Slot::ALL[i]));
        }
    }

    #[test]
    fn fresh_three_units_split_with_remainder_first() {
        let c = Cluster::new(&colors(&[1, 2, 3]), TwoUnitMode::Auto).unwrap();
        assert_eq!(c.units()[0].slots, SlotSet::row(0));
        assert_eq!(c.units()[1].slots, SlotSet::single(slot(0, 1)));
        assert_eq!(c.units()[2].slots, SlotSet::single(slot(1, 1)));
    }

    #[test]
    fn fresh_pair_defaults_to_rows() {
        let c = Cluster::new(&colors(&[1, 2]), TwoUnitMode::Auto).unwrap();
        assert_eq!(c.units()[0].slots, SlotSet::row(0));
        assert_eq!(c.units()[1].slots, SlotSet::row(1));

        let v = Cluster::new(&colors(&[1, 2]), TwoUnitMode::Vertical).unwrap();
        assert_eq!(v.units()[0].slots, SlotSet::column(0));
        assert_eq!(v.units()[1].slots, SlotSet::column(1));
    }

    #[test]
    fn rejects_bad_input() {
        assert_eq!(
            Cluster::new(&colors(&[1, 2, 3, 4, 5]), TwoUnitMode::Auto),
            Err(ClusterError::TooManyUnits(5))
        );
        assert_eq!(Cluster::new(&[], TwoUnitMode::Auto), Err(ClusterError::Empty));
        assert_eq!(
            Cluster::with_slots(&[
                (Color(1), SlotSet::row(0)),
                (Color(2), SlotSet::single(slot(1, 0))),
            ]),
            Err(ClusterError::OverlappingSlots(1))
        );
    }

    #[test]
    fn four_to_three_expands_lonely_row() {
        let mut c = Cluster::new(&colors(&[1, 2, 3, 4]), TwoUnitMode::Auto).unwrap();
        assert!(c.mark_removed(1));
        assert_eq!(c.units()[0].slots, SlotSet::row(0));
        assert_eq!(c.units()[2].slots, SlotSet::single(slot(0, 1)));
        assert_eq!(c.units()[3].slots, SlotSet::single(slot(1, 1)));
        assert_disjoint(&c);
    }

    #[test]
    fn four_to_two_sharing_row_goes_horizontal() {
        let mut c = Cluster::new(&colors(&[1, 2, 3, 4]), TwoUnitMode::Auto).unwrap();
        c.mark_removed(2);
        c.mark_removed(3);
        assert_eq!(c.units()[0].slots, SlotSet::row(0));
        assert_eq!(c.units()[1].slots, SlotSet::row(1));
    }

    #[test]
    fn full_row_span_beats_shared_column() {
        let mut c = Cluster::new(&colors(&[1, 2, 3, 4]), TwoUnitMode::Auto).unwrap();
        c.mark_removed(1);
        // unit 0 now spans row 0 and still shares column 0 with unit 2
        assert_eq!(c.units()[0].slots, SlotSet::row(0));
        assert_eq!(c.units()[2].slots, SlotSet::single(slot(0, 1)));
        c.mark_removed(3);
        assert_eq!(c.units()[0].slots, SlotSet::row(0));
        assert_eq!(c.units()[2].slots, SlotSet::row(1));

        let before = c.clone();
        c.relayout();
        assert_eq!(c, before);
    }

    #[test]
    fn four_to_two_sharing_column_goes_vertical() {
        let mut d = Cluster::with_slots(&[
            (Color(1), SlotSet::single(slot(0, 0))),
            (Color(2), SlotSet::single(slot(1, 0))),
            (Color(3), SlotSet::single(slot(0, 1))),
            (Color(4), SlotSet::single(slot(1, 1))),
        ])
        .unwrap();
        d.units[1].state = UnitState::Removed;
        d.units[1].slots = SlotSet::EMPTY;
        d.units[3].state = UnitState::Removed;
        d.units[3].slots = SlotSet::EMPTY;
        d.relayout();
        assert_eq!(d.units()[0].slots, SlotSet::column(0));
        assert_eq!(d.units()[2].slots, SlotSet::column(1));
    }

    #[test]
    fn diagonal_pair_defaults_horizontal() {
        let mut c = Cluster::with_slots(&[
            (Color(1), SlotSet::single(slot(0, 0))),
            (Color(2), SlotSet::single(slot(1, 1))),
        ])
        .unwrap();
        c.relayout();
        assert_eq!(c.units()[0].slots, SlotSet::row(0));
        assert_eq!(c.units()[1].slots, SlotSet::row(1));
    }

    #[test]
    fn explicit_mode_overrides_inference() {
        let mut c = Cluster::new(&colors(&[1, 2]), TwoUnitMode::Auto).unwrap();
        c.set_two_unit_mode(TwoUnitMode::Vertical);
        assert_eq!(c.units()[0].slots, SlotSet::column(0));
        assert_eq!(c.units()[1].slots, SlotSet::column(1));
    }

    #[test]
    fn layout_is_idempotent_for_every_shrink_path() {
        for first in 0..4 {
            for second in 0..4 {
                let mut c = Cluster::new(&colors(&[1, 2, 3, 4]), TwoUnitMode::Auto).unwrap();
                c.mark_removed(first);
                c.mark_removed(second);
                assert_disjoint(&c);
                let before = c.clone();
                c.relayout();
                assert_eq!(c, before);
                c.relayout();
                assert_eq!(c, before);
            }
        }
    }

    #[test]
    fn last_unit_takes_whole_cell() {
        let mut c = Cluster::new(&colors(&[1, 2, 3, 4]), TwoUnitMode::Auto).unwrap();
        c.mark_removed(0);
        c.mark_removed(1);
        c.mark_removed(2);
        assert_eq!(c.units()[3].slots, SlotSet::FULL);
        assert!(!c.is_empty());
        c.mark_removed(3);
        assert!(c.is_empty());
        assert!(!c.mark_removed(3));
    }

    #[test]
    fn removing_units_keep_their_slots() {
        let mut c = Cluster::new(&colors(&[1, 2]), TwoUnitMode::Auto).unwrap();
        assert!(c.mark_removing(0));
        assert!(!c.mark_removing(0));
        assert_eq!(c.unit_in_slot(slot(0, 0)), Some(0));
        assert!(c.has_color(Color(1)));
        assert_eq!(c.present_count(), 2);
    }

    #[test]
    fn poses_follow_slot_shape() {
        let c = Cluster::new(&colors(&[1, 2, 3, 4]), TwoUnitMode::Auto).unwrap();
        let poses = c.poses(1.0);
        let p0 = poses[0].unwrap();
        assert_eq!(p0.offset, (-0.25, -0.25));
        assert_eq!(p0.scale, (0.45, 0.45));
        let p3 = poses[3].unwrap();
        assert_eq!(p3.offset, (0.25, 0.25));

        let pair = Cluster::new(&colors(&[1, 2]), TwoUnitMode::Auto).unwrap();
        let top = pair.poses(1.0)[1].unwrap();
        assert_eq!(top.offset, (0.0, 0.25));
        assert_eq!(top.scale, (0.9, 0.45));

        let single = Cluster::new(&colors(&[5]), TwoUnitMode::Auto).unwrap();
        let full = single.poses(2.0)[0].unwrap();
        assert_eq!(full.offset, (0.0, 0.0));
        assert_eq!(full.scale, (1.8, 1.8));
    }

    #[test]
    fn diagonal_pose_prefers_vertical_on_tie() {
        let c = Cluster::with_slots(&[
            (Color(1), SlotSet::from_slots([slot(0, 0), slot(1, 1)])),
            (Color(2), SlotSet::single(slot(1, 0))),
            (Color(3), SlotSet::single(slot(0, 1))),
        ])
        .unwrap();
        let pose = c.poses(1.0)[0].unwrap();
        assert_eq!(pose.scale, (0.45, 0.9));
    }
}
