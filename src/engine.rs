//! Engine: the board plus the matcher, scheduler and placement resolver, and the
//! hand-off of popped groups to whatever animates their removal.

use crate::board::{Board, BoardError, ClusterId};
use crate::cluster::{Cluster, Color};
use crate::config::EngineConfig;
use crate::matcher::{Group, MatchEngine};
use crate::placement::{PlacementError, PlacementResolver, Rejected};
use crate::scheduler::ScanScheduler;
use log::{debug, error, info, warn};
use std::collections::BTreeMap;
use std::time::Duration;

/// Identifies one group handed to the removal pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RemovalTicket(u64);

impl RemovalTicket {
    pub fn id(self) -> u64 {
        self.0
    }
}

/// Receives qualifying groups. The host calls [`Engine::complete_removal`] with the
/// same ticket once the group is gone (after an animation, or right away).
pub trait RemovalPipeline {
    fn remove_group(&mut self, ticket: RemovalTicket, group: &Group, board: &Board);
}

/// Pipeline that finishes every removal as soon as it is drained.
#[derive(Debug, Default)]
pub struct ImmediateRemoval {
    queued: Vec<RemovalTicket>,
}

impl ImmediateRemoval {
    pub fn drain(&mut self) -> Vec<RemovalTicket> {
        std::mem::take(&mut self.queued)
    }
}

impl RemovalPipeline for ImmediateRemoval {
    fn remove_group(&mut self, ticket: RemovalTicket, _group: &Group, _board: &Board) {
        self.queued.push(ticket);
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickReport {
    /// A scan ran this tick.
    pub scanned: bool,
    /// Removals started by that scan, in group order.
    pub started: Vec<RemovalTicket>,
}

/// What a finished removal did to the board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovalOutcome {
    pub ticket: RemovalTicket,
    pub color: Color,
    /// Units actually taken off the board.
    pub removed: usize,
    /// Cells freed because their cluster ran out of units.
    pub released_cells: Vec<(usize, usize)>,
}

#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    board: Option<Board>,
    matcher: MatchEngine,
    scheduler: ScanScheduler,
    placement: PlacementResolver,
    in_flight: BTreeMap<RemovalTicket, Group>,
    next_ticket: u64,
}

impl Engine {
    /// Engine with no board loaded.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            matcher: MatchEngine::new(config.min_group_size),
            scheduler: ScanScheduler::new(config.cascade_delay),
            placement: PlacementResolver::new(
                config.cell_size,
                config.snap_radius,
                config.placement_delay,
            ),
            config,
            board: None,
            in_flight: BTreeMap::new(),
            next_ticket: 0,
        }
    }

    pub fn with_board(config: EngineConfig, board: Board) -> Self {
        let mut engine = Self::new(config);
        engine.set_board(board);
        engine
    }

    /// Build a board from loader coordinates. On failure the engine is left unloaded.
    pub fn load_board<I>(&mut self, coords: I) -> Result<(), BoardError>
    where
        I: IntoIterator<Item = (usize, usize)>,
    {
        match Board::from_cells(coords) {
            Ok(board) => {
                self.set_board(board);
                Ok(())
            }
            Err(e) => {
                error!("[Engine] board load failed: {}", e);
                self.reset();
                self.board = None;
                Err(e)
            }
        }
    }

    /// Swap in a fresh board, dropping any removal still in flight.
    pub fn set_board(&mut self, board: Board) {
        info!("[Engine] board set to {} x {}", board.width(), board.height());
        self.reset();
        self.board = Some(board);
    }

    fn reset(&mut self) {
        if !self.in_flight.is_empty() {
            debug!("[Engine] dropping {} in-flight removal(s)", self.in_flight.len());
        }
        self.in_flight.clear();
        self.scheduler = ScanScheduler::new(self.config.cascade_delay);
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn board(&self) -> Option<&Board> {
        self.board.as_ref()
    }

    pub fn scheduler(&self) -> &ScanScheduler {
        &self.scheduler
    }

    pub fn placement(&self) -> &PlacementResolver {
        &self.placement
    }

    pub fn matcher(&self) -> &MatchEngine {
        &self.matcher
    }

    /// Groups handed out and not yet completed.
    pub fn in_flight(&self) -> impl Iterator<Item = (RemovalTicket, &Group)> + '_ {
        self.in_flight.iter().map(|(t, g)| (*t, g))
    }

    /// Place `cluster` on cell `(x, y)`.
    pub fn place(&mut self, cluster: Cluster, x: usize, y: usize) -> Result<ClusterId, Rejected> {
        let Some(board) = self.board.as_mut() else {
            return Err(Rejected::new(PlacementError::NoBoard, cluster));
        };
        self.placement
            .place(board, &mut self.scheduler, cluster, x, y)
    }

    /// Place `cluster` at the cell a world-space drop point resolves to.
    pub fn drop_at(&mut self, cluster: Cluster, point: (f32, f32)) -> Result<ClusterId, Rejected> {
        let Some(board) = self.board.as_ref() else {
            return Err(Rejected::new(PlacementError::NoBoard, cluster));
        };
        let Some((x, y)) = self.placement.resolve_drop(board, point) else {
            debug!("[Engine] drop at {:?} found no free cell", point);
            return Err(Rejected::new(PlacementError::NoTarget, cluster));
        };
        self.place(cluster, x, y)
    }

    /// Lift a placed cluster off the board and hand it back unplaced. Refused while
    /// any of its units is part of a removal in flight.
    pub fn detach(&mut self, id: ClusterId) -> Option<Cluster> {
        let board = self.board.as_mut()?;
        if self
            .in_flight
            .values()
            .any(|g| g.units.iter().any(|u| u.cluster == id))
        {
            warn!("[Engine] cluster {:?} is mid-removal, not detached", id);
            return None;
        }
        let cluster = board.detach(id)?;
        debug!("[Engine] cluster {:?} detached", id);
        self.scheduler.request_scan(self.config.placement_delay);
        Some(cluster)
    }

    pub fn request_scan(&mut self, delay: Duration) {
        self.scheduler.request_scan(delay);
    }

    /// Advance time. When a scan comes due, qualifying groups are claimed and sent
    /// to `pipeline`, one ticket each.
    pub fn tick<P>(&mut self, dt: Duration, pipeline: &mut P) -> TickReport
    where
        P: RemovalPipeline + ?Sized,
    {
        let mut report = TickReport::default();
        if !self.scheduler.tick(dt) {
            return report;
        }
        report.scanned = true;
        let Some(board) = self.board.as_mut() else {
            self.scheduler.scan_finished(0);
            return report;
        };
        let groups = self.matcher.scan(board);
        let count = groups.len();
        for group in groups {
            let ticket = RemovalTicket(self.next_ticket);
            self.next_ticket += 1;
            self.scheduler.begin_removal();
            pipeline.remove_group(ticket, &group, board);
            self.in_flight.insert(ticket, group);
            report.started.push(ticket);
        }
        if count > 0 {
            debug!("[Engine] scan started {} removal(s)", count);
        }
        self.scheduler.scan_finished(count);
        report
    }

    /// The pipeline is done with `ticket`: take the units off the board, re-lay out
    /// their clusters and schedule the cascade scan.
    pub fn complete_removal(&mut self, ticket: RemovalTicket) -> Option<RemovalOutcome> {
        let Some(group) = self.in_flight.remove(&ticket) else {
            warn!("[Engine] completion for unknown removal {:?}", ticket);
            return None;
        };
        let mut outcome = RemovalOutcome {
            ticket,
            color: group.color,
            removed: 0,
            released_cells: Vec::new(),
        };
        if let Some(board) = self.board.as_mut() {
            for unit in &group.units {
                let cell = board.cluster(unit.cluster).and_then(Cluster::cell);
                if !board.remove_unit(*unit) {
                    continue;
                }
                outcome.removed += 1;
                if board.cluster(unit.cluster).is_none() {
                    outcome.released_cells.extend(cell);
                }
            }
        }
        info!(
            "[Engine] removed {} unit(s) of colour {}, {} cell(s) freed",
            outcome.removed,
            outcome.color,
            outcome.released_cells.len()
        );
        self.scheduler.complete_removal();
        Some(outcome)
    }

    /// Nothing pending, nothing resolving, nothing in flight.
    pub fn is_settled(&self) -> bool {
        !self.scheduler.is_pending() && !self.scheduler.is_resolving() && self.in_flight.is_empty()
    }

    /// Drive ticks of `step` with instant removals until the board settles or
    /// `max_ticks` run out. Returns every removal made along the way.
    pub fn settle(
        &mut self,
        pipeline: &mut ImmediateRemoval,
        step: Duration,
        max_ticks: usize,
    ) -> Vec<RemovalOutcome> {
        let mut outcomes = Vec::new();
        for _ in 0..max_ticks {
            if self.is_settled() {
                break;
            }
            self.tick(step, pipeline);
            for ticket in pipeline.drain() {
                outcomes.extend(self.complete_removal(ticket));
            }
        }
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::TwoUnitMode;
    use crate::scheduler::SchedulerState;
    use crate::slot::{Slot, SlotSet};

    const FRAME: Duration = Duration::from_millis(16);

    fn single(color: u8) -> Cluster {
        Cluster::new(&[Color(color)], TwoUnitMode::Auto).unwrap()
    }

    fn quad(colors: [u8; 4]) -> Cluster {
        let units: Vec<_> = Slot::ALL
            .iter()
            .zip(colors)
            .map(|(s, c)| (Color(c), SlotSet::single(*s)))
            .collect();
        Cluster::with_slots(&units).unwrap()
    }

    #[test]
    fn unloaded_engine_rejects_and_scans_nothing() {
        let mut engine = Engine::new(EngineConfig::default());
        let rejected = engine.place(single(1), 0, 0).unwrap_err();
        assert_eq!(rejected.reason, PlacementError::NoBoard);

        engine.request_scan(Duration::ZERO);
        let report = engine.tick(FRAME, &mut ImmediateRemoval::default());
        assert!(report.scanned);
        assert!(report.started.is_empty());
        assert!(engine.is_settled());
    }

    #[test]
    fn failed_load_leaves_engine_unloaded() {
        let mut engine = Engine::new(EngineConfig::default());
        engine.load_board([(0, 0), (1, 0)]).unwrap();
        assert!(engine.board().is_some());
        assert_eq!(engine.load_board(std::iter::empty()), Err(BoardError::Empty));
        assert!(engine.board().is_none());
    }

    #[test]
    fn scans_wait_for_in_flight_removals() {
        let board = Board::new(4, 1).unwrap();
        let mut engine = Engine::with_board(EngineConfig::default(), board);
        let mut pipeline = ImmediateRemoval::default();
        engine.place(single(1), 0, 0).unwrap();
        engine.place(single(1), 1, 0).unwrap();

        let report = engine.tick(FRAME, &mut pipeline);
        assert_eq!(report.started.len(), 1);
        assert_eq!(engine.scheduler().state(), SchedulerState::Resolving);

        engine.place(single(2), 2, 0).unwrap();
        engine.place(single(2), 3, 0).unwrap();
        let report = engine.tick(FRAME, &mut pipeline);
        assert!(!report.scanned);

        let tickets = pipeline.drain();
        let outcome = engine.complete_removal(tickets[0]).unwrap();
        assert_eq!(outcome.removed, 2);
        assert_eq!(outcome.released_cells, vec![(0, 0), (1, 0)]);
        assert_eq!(engine.scheduler().state(), SchedulerState::Scheduled);

        // cascade delay (100ms) must pass before the held-back pair pops
        assert!(!engine.tick(FRAME, &mut pipeline).scanned);
        let outcomes = engine.settle(&mut pipeline, FRAME, 50);
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].color, Color(2));
        assert!(engine.board().unwrap().free_cells().count() == 4);
    }

    #[test]
    fn unknown_ticket_is_ignored() {
        let mut engine = Engine::with_board(EngineConfig::default(), Board::new(1, 1).unwrap());
        assert!(engine.complete_removal(RemovalTicket(42)).is_none());
        assert_eq!(engine.scheduler().active_removals(), 0);
        assert!(engine.is_settled());
    }

    #[test]
    fn cascade_relayout_ends_in_full_cell_unit() {
        let mut engine = Engine::with_board(EngineConfig::default(), Board::new(2, 1).unwrap());
        engine.place(quad([3, 1, 2, 3]), 0, 0).unwrap();
        engine.place(single(1), 1, 0).unwrap();

        let outcomes = engine.settle(&mut ImmediateRemoval::default(), FRAME, 100);
        let colors: Vec<_> = outcomes.iter().map(|o| o.color).collect();
        assert_eq!(colors, vec![Color(1), Color(3)]);
        assert_eq!(outcomes[0].released_cells, vec![(1, 0)]);
        assert!(outcomes[1].released_cells.is_empty());

        let board = engine.board().unwrap();
        let cell = board.cell(0, 0).unwrap();
        assert_eq!(cell.occupied_slots(), SlotSet::FULL);
        for slot in Slot::ALL {
            assert_eq!(board.unit_in_slot(0, 0, slot).map(|u| u.color), Some(Color(2)));
        }
        assert!(engine.is_settled());
    }

    #[test]
    fn drop_snaps_to_free_cell() {
        let mut engine = Engine::with_board(EngineConfig::default(), Board::new(2, 1).unwrap());
        engine.place(single(1), 0, 0).unwrap();
        let id = engine.drop_at(single(2), (0.1, 0.0)).unwrap();
        assert_eq!(engine.board().unwrap().cluster(id).unwrap().cell(), Some((1, 0)));
        let rejected = engine.drop_at(single(3), (0.0, 0.0)).unwrap_err();
        assert_eq!(rejected.reason, PlacementError::NoTarget);
    }
}
