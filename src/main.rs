//! quadmerge: tile-merging puzzle in the terminal.

mod app;
mod headless;
mod input;
mod pop;
mod theme;
mod ui;

use anyhow::{Context, Result};
use app::App;
use clap::{Parser, ValueEnum};
use quadmerge::board::MAX_BOARD_SIDE;
use quadmerge::{EngineConfig, Level, SpawnChoice, SpawnConfig, SpawnCount, TwoUnitMode};
use std::fs::File;
use std::path::PathBuf;
use std::time::Duration;

/// Options derived from the command line that shape the engine, spawning and the host.
#[derive(Debug, Clone)]
pub struct GameConfig {
    pub engine: EngineConfig,
    pub spawn_count: SpawnChoice,
    pub two_unit_mode: TwoUnitMode,
    pub palette_size: Option<u8>,
    pub level_file: Option<PathBuf>,
    pub first_level: u32,
    pub board_size: (Option<usize>, Option<usize>),
    pub pop_duration: Duration,
    pub no_animation: bool,
    pub tick_rate: f64,
    pub seed: Option<u64>,
}

impl GameConfig {
    fn from_args(args: &Args) -> Self {
        let engine = EngineConfig {
            min_group_size: args.min_group.max(1),
            cascade_delay: Duration::from_millis(args.cascade_delay_ms),
            ..EngineConfig::default()
        };
        Self {
            engine,
            spawn_count: args.spawn.into(),
            two_unit_mode: args.two_unit_mode.into(),
            palette_size: args.colors,
            level_file: args.level.clone(),
            first_level: args.start_level.saturating_sub(1),
            board_size: (args.width, args.height),
            pop_duration: Duration::from_millis(args.pop_ms),
            no_animation: args.no_animation,
            tick_rate: args.tick_rate.max(1.0),
            seed: args.seed,
        }
    }

    /// Level `index` (0-based): the level file when given, else a built-in one,
    /// with command-line overrides applied.
    pub fn level(&self, index: u32) -> Result<Level> {
        let mut level = match &self.level_file {
            Some(path) => Level::load(path)
                .with_context(|| format!("loading level file {}", path.display()))?,
            None => Level::builtin(index),
        };
        if let Some(w) = self.board_size.0 {
            level.width = w.clamp(1, MAX_BOARD_SIDE);
        }
        if let Some(h) = self.board_size.1 {
            level.height = h.clamp(1, MAX_BOARD_SIDE);
        }
        if let Some(n) = self.palette_size {
            level.palette_size = n.clamp(1, quadmerge::level::MAX_COLORS);
            level.goals.retain(|g| g.color.0 < level.palette_size);
        }
        Ok(level)
    }

    pub fn spawn_config(&self, level: &Level) -> SpawnConfig {
        SpawnConfig {
            count: self.spawn_count,
            two_unit_mode: self.two_unit_mode,
            palette: level.palette(),
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args)?;
    let config = GameConfig::from_args(&args);
    if let Some(moves) = args.headless {
        return headless::run(&config, moves);
    }
    let theme = theme::Theme::load(args.theme.as_deref(), args.palette).unwrap_or_else(|e| {
        log::warn!("[Theme] {}, using defaults", e);
        let mut theme = theme::Theme::default();
        theme.apply_palette(args.palette);
        theme
    });
    let mut app = App::new(config, theme)?;
    app.run()?;
    Ok(())
}

/// The terminal UI owns stdout, so it logs to a file; headless runs log to stderr.
fn init_logging(args: &Args) -> Result<()> {
    let default_filter = if args.headless.is_some() { "warn" } else { "info" };
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter));
    if args.headless.is_none() {
        let file = File::create(&args.log_file)
            .with_context(|| format!("creating log file {}", args.log_file.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    builder.init();
    Ok(())
}

/// Tile-merging puzzle in the terminal.
#[derive(Debug, Parser)]
#[command(
    name = "quadmerge",
    version,
    about = "Tile-merging puzzle in the terminal. Place clusters of coloured blocks; touching blocks of one colour pop together.",
    long_about = "quadmerge is a terminal tile-merging puzzle.\n\n\
        Each cell of the board holds a cluster of up to four coloured blocks. Blocks of \
        the same colour that touch, inside a cell or across cells, pop together. What is \
        left of a cluster spreads out to fill its cell, which can set off the next pop.\n\
        Collect the colours each level asks for to earn coins and move on.\n\n\
        CONTROLS (normal):\n  Arrows      Move cursor   Enter/Space Place   Tab  Flip pair\n  P           Pause         R           Restart Q / Esc Quit\n\n\
        CONTROLS (vim):\n  h/j/k/l     Move cursor   o           Flip pair\n\n\
        Use --headless N to let a random bot play N placements without a terminal UI."
)]
pub struct Args {
    /// Level file (`board = 5x4`, `colors = 4`, `goal[2] = 6`). Built-in levels if not set.
    #[arg(short = 'L', long, value_name = "FILE")]
    pub level: Option<PathBuf>,

    /// Built-in level to start from (1-based).
    #[arg(long, default_value = "1", value_name = "N")]
    pub start_level: u32,

    /// Override the board width in cells (1-16).
    #[arg(long, value_name = "COLS")]
    pub width: Option<usize>,

    /// Override the board height in cells (1-16).
    #[arg(long, value_name = "ROWS")]
    pub height: Option<usize>,

    /// Override the number of colours in play (1-6).
    #[arg(short, long, value_name = "N")]
    pub colors: Option<u8>,

    /// Smallest group of touching blocks that pops.
    #[arg(long, default_value = "2", value_name = "N")]
    pub min_group: usize,

    /// Delay before re-checking the board after a pop, in ms.
    #[arg(long, default_value = "100", value_name = "MS")]
    pub cascade_delay_ms: u64,

    /// Pop animation length in ms.
    #[arg(long, default_value = "700", value_name = "MS")]
    pub pop_ms: u64,

    /// Disable the pop animation (blocks vanish at once).
    #[arg(long)]
    pub no_animation: bool,

    /// Engine ticks per second.
    #[arg(long, default_value = "60.0", value_name = "RATE")]
    pub tick_rate: f64,

    /// How many blocks a new cluster carries.
    #[arg(short, long, default_value = "random")]
    pub spawn: SpawnArg,

    /// Orientation for two-block clusters.
    #[arg(long, default_value = "auto")]
    pub two_unit_mode: TwoUnitArg,

    /// Seed for cluster spawning and the headless bot.
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u64>,

    /// Path to theme file (btop-style theme[key]=\"value\"). Uses One Dark if not set.
    #[arg(short, long, value_name = "FILE")]
    pub theme: Option<PathBuf>,

    /// Colour palette: normal (theme), high-contrast, or colorblind.
    #[arg(long, default_value = "normal")]
    pub palette: Palette,

    /// Run without a terminal UI: a random bot makes this many placements.
    #[arg(long, value_name = "MOVES")]
    pub headless: Option<usize>,

    /// Log file for the terminal UI (RUST_LOG sets the level).
    #[arg(long, default_value = "quadmerge.log", value_name = "FILE")]
    pub log_file: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Palette {
    #[default]
    Normal,

    #[value(alias = "highcontrast", alias = "contrast")]
    HighContrast,

    #[value(alias = "colourblind")]
    Colorblind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum SpawnArg {
    One,
    Two,
    Four,
    #[default]
    Random,
}

impl From<SpawnArg> for SpawnChoice {
    fn from(arg: SpawnArg) -> Self {
        match arg {
            SpawnArg::One => Self::Fixed(SpawnCount::One),
            SpawnArg::Two => Self::Fixed(SpawnCount::Two),
            SpawnArg::Four => Self::Fixed(SpawnCount::Four),
            SpawnArg::Random => Self::Random,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum TwoUnitArg {
    #[default]
    Auto,
    #[value(alias = "h")]
    Horizontal,
    #[value(alias = "v")]
    Vertical,
}

impl From<TwoUnitArg> for TwoUnitMode {
    fn from(arg: TwoUnitArg) -> Self {
        match arg {
            TwoUnitArg::Auto => Self::Auto,
            TwoUnitArg::Horizontal => Self::Horizontal,
            TwoUnitArg::Vertical => Self::Vertical,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_fold_into_config() {
        let args = Args::parse_from([
            "quadmerge",
            "--spawn",
            "two",
            "--two-unit-mode",
            "v",
            "--colors",
            "9",
            "--width",
            "3",
            "--start-level",
            "2",
        ]);
        let config = GameConfig::from_args(&args);
        assert_eq!(config.spawn_count, SpawnChoice::Fixed(SpawnCount::Two));
        assert_eq!(config.two_unit_mode, TwoUnitMode::Vertical);
        assert_eq!(config.first_level, 1);

        let level = config.level(config.first_level).unwrap();
        assert_eq!(level.width, 3);
        assert_eq!(level.palette_size, quadmerge::level::MAX_COLORS);
        assert_eq!(config.spawn_config(&level).palette.len(), 6);
    }

    #[test]
    fn defaults_match_engine_defaults() {
        let config = GameConfig::from_args(&Args::parse_from(["quadmerge"]));
        assert_eq!(config.engine, EngineConfig::default());
        assert_eq!(config.pop_duration, Duration::from_millis(700));
    }

    #[test]
    fn extreme_overrides_stay_loadable() {
        let args = Args::parse_from([
            "quadmerge",
            "--width",
            "100000",
            "--height",
            "0",
            "--start-level",
            "4000000000",
        ]);
        let config = GameConfig::from_args(&args);
        let level = config.level(config.first_level).unwrap();
        assert_eq!((level.width, level.height), (MAX_BOARD_SIDE, 1));
        assert!(quadmerge::Board::from_cells(level.cell_coords()).is_ok());
    }
}
