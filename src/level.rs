//! Levels: board size, palette size and colour collection goals.
//!
//! Level files are plain `key = value` lines:
//!
//! ```text
//! # comment
//! name = Warm-up
//! board = 5x4
//! colors = 4
//! goal[2] = 6
//! ```

use crate::board::MAX_BOARD_SIDE;
use crate::cluster::Color;
use log::{info, warn};
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Coins granted for finishing a level.
pub const LEVEL_REWARD_COINS: u32 = 15;

/// Largest palette a level can ask for.
pub const MAX_COLORS: u8 = 6;

#[derive(Debug, Error)]
pub enum LevelError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("level has no board size")]
    MissingBoard,
    #[error("goal colour {0} is outside the level palette")]
    GoalOutsidePalette(u8),
}

/// Collect `required` units of `color`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Goal {
    pub color: Color,
    pub required: u32,
    pub collected: u32,
}

impl Goal {
    pub fn new(color: Color, required: u32) -> Self {
        Self {
            color,
            required,
            collected: 0,
        }
    }

    pub fn is_met(&self) -> bool {
        self.collected >= self.required
    }

    pub fn remaining(&self) -> u32 {
        self.required.saturating_sub(self.collected)
    }
}

impl fmt::Display for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}", self.color, self.collected.min(self.required), self.required)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Level {
    pub name: String,
    pub width: usize,
    pub height: usize,
    pub palette_size: u8,
    pub goals: Vec<Goal>,
}

impl Level {
    /// Generated level for `index` (0-based); boards, palettes and goals grow with it.
    pub fn builtin(index: u32) -> Self {
        let step = index as usize;
        let palette_size = (3 + index / 2).min(u32::from(MAX_COLORS)) as u8;
        let goal_count = (1 + index / 2).min(u32::from(palette_size)) as u8;
        let goals = (0..goal_count)
            .map(|c| Goal::new(Color(c), index.saturating_mul(2).saturating_add(4)))
            .collect();
        Self {
            name: format!("Level {}", u64::from(index) + 1),
            width: (4 + step / 2).min(8),
            height: (4 + step / 3).min(6),
            palette_size,
            goals,
        }
    }

    pub fn load(path: &Path) -> Result<Self, LevelError> {
        let s = std::fs::read_to_string(path)?;
        let level = Self::parse(&s)?;
        info!("[Level] loaded '{}' from {}", level.name, path.display());
        Ok(level)
    }

    pub fn parse(s: &str) -> Result<Self, LevelError> {
        let mut name = None;
        let mut board = None;
        let mut palette_size = 4u8;
        let mut goals: Vec<Goal> = Vec::new();

        for (i, raw) in s.lines().enumerate() {
            let line_no = i + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let err = |message: &str| LevelError::Parse {
                line: line_no,
                message: message.to_string(),
            };
            let Some((key, value)) = line.split_once('=') else {
                return Err(err("expected key = value"));
            };
            let (key, value) = (key.trim(), value.trim().trim_matches('"'));

            if let Some(color) = key.strip_prefix("goal[").and_then(|k| k.strip_suffix(']')) {
                let color: u8 = color.trim().parse().map_err(|_| err("bad goal colour"))?;
                let required: u32 = value.parse().map_err(|_| err("bad goal amount"))?;
                match goals.iter_mut().find(|g| g.color == Color(color)) {
                    Some(goal) => goal.required = required,
                    None => goals.push(Goal::new(Color(color), required)),
                }
                continue;
            }
            match key {
                "name" => name = Some(value.to_string()),
                "board" => {
                    let (w, h) = value
                        .split_once(['x', 'X'])
                        .ok_or_else(|| err("board must be WIDTHxHEIGHT"))?;
                    let w: usize = w.trim().parse().map_err(|_| err("bad board width"))?;
                    let h: usize = h.trim().parse().map_err(|_| err("bad board height"))?;
                    if !(1..=MAX_BOARD_SIDE).contains(&w) || !(1..=MAX_BOARD_SIDE).contains(&h) {
                        return Err(err(&format!(
                            "board side must be between 1 and {}",
                            MAX_BOARD_SIDE
                        )));
                    }
                    board = Some((w, h));
                }
                "colors" | "colours" => {
                    let n: u8 = value.parse().map_err(|_| err("bad colour count"))?;
                    if !(1..=MAX_COLORS).contains(&n) {
                        return Err(err("colour count must be between 1 and 6"));
                    }
                    palette_size = n;
                }
                other => warn!("[Level] line {}: unknown key '{}' ignored", line_no, other),
            }
        }

        let (width, height) = board.ok_or(LevelError::MissingBoard)?;
        if let Some(goal) = goals.iter().find(|g| g.color.0 >= palette_size) {
            return Err(LevelError::GoalOutsidePalette(goal.color.0));
        }
        Ok(Self {
            name: name.unwrap_or_else(|| "Custom".to_string()),
            width,
            height,
            palette_size,
            goals,
        })
    }

    pub fn palette(&self) -> Vec<Color> {
        (0..self.palette_size).map(Color).collect()
    }

    /// Every cell coordinate of the board, for the board loader.
    pub fn cell_coords(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (0..self.height).flat_map(move |y| (0..self.width).map(move |x| (x, y)))
    }

    /// Count `amount` removed units of `color` toward its goal. Returns true if a goal moved.
    pub fn record(&mut self, color: Color, amount: u32) -> bool {
        let Some(goal) = self.goals.iter_mut().find(|g| g.color == color && !g.is_met()) else {
            return false;
        };
        goal.collected = goal.collected.saturating_add(amount).min(goal.required);
        if goal.is_met() {
            info!("[Level] goal for colour {} met", color);
        }
        true
    }

    /// All goals met. A level without goals is never complete.
    pub fn is_complete(&self) -> bool {
        !self.goals.is_empty() && self.goals.iter().all(Goal::is_met)
    }

    /// Back to zero progress.
    pub fn reset_progress(&mut self) {
        for goal in &mut self.goals {
            goal.collected = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_level_file() {
        let level = Level::parse(
            "# warm-up\nname = \"Warm-up\"\nboard = 5x4\ncolors = 4\ngoal[2] = 6\ngoal[0]=3\n",
        )
        .unwrap();
        assert_eq!(level.name, "Warm-up");
        assert_eq!((level.width, level.height), (5, 4));
        assert_eq!(level.palette_size, 4);
        assert_eq!(level.goals, vec![Goal::new(Color(2), 6), Goal::new(Color(0), 3)]);
        assert_eq!(level.cell_coords().count(), 20);
    }

    #[test]
    fn parse_rejects_bad_input() {
        assert!(matches!(Level::parse("colors = 3"), Err(LevelError::MissingBoard)));
        assert!(matches!(
            Level::parse("board = 4x4\nboard"),
            Err(LevelError::Parse { line: 2, .. })
        ));
        assert!(matches!(
            Level::parse("board = 0x4"),
            Err(LevelError::Parse { line: 1, .. })
        ));
        assert!(matches!(
            Level::parse("board = 4x4\ncolors = 3\ngoal[5] = 2"),
            Err(LevelError::GoalOutsidePalette(5))
        ));
    }

    #[test]
    fn goals_progress_and_complete() {
        let mut level = Level::parse("board = 3x3\ngoal[1] = 4\ngoal[2] = 2").unwrap();
        assert!(!level.is_complete());
        assert!(level.record(Color(1), 3));
        assert!(!level.record(Color(3), 5));
        assert!(level.record(Color(2), 9));
        assert_eq!(level.goals[1].collected, 2);
        assert!(!level.is_complete());
        assert!(level.record(Color(1), 1));
        assert!(level.is_complete());
        assert!(!level.record(Color(1), 1));

        level.reset_progress();
        assert!(!level.is_complete());
        assert_eq!(level.goals[0].remaining(), 4);
    }

    #[test]
    fn builtin_levels_grow() {
        let first = Level::builtin(0);
        assert_eq!((first.width, first.height, first.palette_size), (4, 4, 3));
        assert_eq!(first.goals.len(), 1);
        let later = Level::builtin(9);
        assert!(later.width > first.width);
        assert!(later.palette_size <= MAX_COLORS);
        assert!(later.goals.iter().all(|g| g.color.0 < later.palette_size));
        assert!(!Level::builtin(0).is_complete());
    }

    #[test]
    fn builtin_levels_survive_huge_indices() {
        let last = Level::builtin(u32::MAX);
        assert_eq!(last.name, format!("Level {}", u64::from(u32::MAX) + 1));
        assert_eq!((last.width, last.height), (8, 6));
        assert_eq!(last.palette_size, MAX_COLORS);
        assert!(last.goals.iter().all(|g| g.required == u32::MAX));

        let mut level = last;
        assert!(level.record(Color(0), u32::MAX));
        assert!(level.goals[0].is_met());
    }
}
