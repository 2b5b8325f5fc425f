//! Pop animations: the terminal's removal pipeline. Each popped group fades out
//! (a tachyonfx effect created by the UI) and is completed on the engine once done.

use quadmerge::{Board, Color, Group, RemovalPipeline, RemovalTicket};
use std::collections::HashSet;
use std::time::Duration;
use tachyonfx::Effect;

/// One group on its way out.
pub struct Pop {
    pub ticket: RemovalTicket,
    pub color: Color,
    /// Global sub-cells covered by the group's units.
    pub sub_cells: Vec<(usize, usize)>,
    /// Created lazily by the UI, which knows where the board sits on screen.
    pub effect: Option<Effect>,
    elapsed: Duration,
}

pub struct PopQueue {
    duration: Duration,
    animate: bool,
    pops: Vec<Pop>,
}

impl PopQueue {
    pub fn new(duration: Duration, animate: bool) -> Self {
        Self {
            duration,
            animate,
            pops: Vec::new(),
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn is_empty(&self) -> bool {
        self.pops.is_empty()
    }

    pub fn pops_mut(&mut self) -> impl Iterator<Item = &mut Pop> {
        self.pops.iter_mut()
    }

    /// Sub-cells of every group still fading.
    pub fn popping_cells(&self) -> HashSet<(usize, usize)> {
        self.pops
            .iter()
            .flat_map(|p| p.sub_cells.iter().copied())
            .collect()
    }

    pub fn advance(&mut self, dt: Duration) {
        for pop in &mut self.pops {
            pop.elapsed += dt;
        }
    }

    /// Tickets whose animation ended. An effect that was never drawn falls back to
    /// the nominal duration.
    pub fn take_finished(&mut self) -> Vec<RemovalTicket> {
        let (animate, duration) = (self.animate, self.duration);
        let (done, running): (Vec<Pop>, Vec<Pop>) = std::mem::take(&mut self.pops)
            .into_iter()
            .partition(|p| {
                !animate || p.effect.as_ref().map_or(p.elapsed >= duration, Effect::done)
            });
        self.pops = running;
        done.into_iter().map(|p| p.ticket).collect()
    }

    pub fn clear(&mut self) {
        self.pops.clear();
    }
}

impl RemovalPipeline for PopQueue {
    fn remove_group(&mut self, ticket: RemovalTicket, group: &Group, board: &Board) {
        let sub_cells = group
            .units
            .iter()
            .flat_map(|u| board.unit_sub_cells(*u))
            .collect();
        log::debug!("[Pop] {:?}: {} unit(s) of {}", ticket, group.len(), group.color);
        self.pops.push(Pop {
            ticket,
            color: group.color,
            sub_cells,
            effect: None,
            elapsed: Duration::ZERO,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quadmerge::{Cluster, Engine, EngineConfig, TwoUnitMode};

    fn engine_with_pair() -> Engine {
        let mut engine = Engine::with_board(EngineConfig::default(), Board::new(2, 1).unwrap());
        for x in 0..2 {
            let cluster = Cluster::new(&[Color(4)], TwoUnitMode::Auto).unwrap();
            engine.place(cluster, x, 0).unwrap();
        }
        engine
    }

    #[test]
    fn pops_wait_for_their_duration() {
        let mut engine = engine_with_pair();
        let mut pops = PopQueue::new(Duration::from_millis(700), true);
        engine.tick(Duration::from_millis(16), &mut pops);
        assert_eq!(pops.popping_cells().len(), 8);

        pops.advance(Duration::from_millis(400));
        assert!(pops.take_finished().is_empty());
        pops.advance(Duration::from_millis(400));
        let done = pops.take_finished();
        assert_eq!(done.len(), 1);
        assert!(pops.is_empty());
        assert_eq!(engine.complete_removal(done[0]).unwrap().removed, 2);
    }

    #[test]
    fn without_animation_pops_finish_at_once() {
        let mut engine = engine_with_pair();
        let mut pops = PopQueue::new(Duration::from_millis(700), false);
        engine.tick(Duration::from_millis(16), &mut pops);
        assert_eq!(pops.take_finished().len(), 1);
    }
}
