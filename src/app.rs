//! App: terminal init, main loop, engine ticks and key handling.

use crate::GameConfig;
use crate::input::{Action, key_to_action};
use crate::pop::PopQueue;
use crate::theme::Theme;
use crate::ui::{self, Hud};
use anyhow::Result;
use crossterm::event::{self, Event, KeyEventKind};
use log::info;
use quadmerge::{Cluster, Engine, LEVEL_REWARD_COINS, Level, Spawner, TwoUnitMode};
use ratatui::DefaultTerminal;
use std::time::{Duration, Instant};

/// Target frame time (~60 fps).
const FRAME: Duration = Duration::from_millis(16);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Playing,
    LevelComplete,
    /// No free cell left and nothing popping.
    BoardFull,
    QuitMenu,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuitOption {
    Resume,
    Restart,
    Exit,
}

impl QuitOption {
    fn next(self) -> Self {
        match self {
            Self::Resume => Self::Restart,
            Self::Restart => Self::Exit,
            Self::Exit => Self::Resume,
        }
    }

    fn prev(self) -> Self {
        match self {
            Self::Resume => Self::Exit,
            Self::Restart => Self::Resume,
            Self::Exit => Self::Restart,
        }
    }
}

pub struct App {
    config: GameConfig,
    theme: Theme,
    engine: Engine,
    pops: PopQueue,
    spawner: Spawner,
    level: Level,
    level_index: u32,
    current: Cluster,
    upcoming: Cluster,
    cursor: (usize, usize),
    screen: Screen,
    paused: bool,
    quit_selected: QuitOption,
    coins: u32,
    popped: usize,
    placed: usize,
    last_tick: Instant,
    last_frame: Instant,
}

impl App {
    pub fn new(config: GameConfig, theme: Theme) -> Result<Self> {
        let level_index = config.first_level;
        let level = config.level(level_index)?;
        let mut engine = Engine::new(config.engine.clone());
        engine.load_board(level.cell_coords())?;
        let mut spawner = spawner_for(&config, &level, level_index);
        let current = spawner.next_cluster()?;
        let upcoming = spawner.next_cluster()?;
        let now = Instant::now();
        Ok(Self {
            pops: PopQueue::new(config.pop_duration, !config.no_animation),
            cursor: (level.width / 2, level.height / 2),
            config,
            theme,
            engine,
            spawner,
            level,
            level_index,
            current,
            upcoming,
            screen: Screen::Playing,
            paused: false,
            quit_selected: QuitOption::Resume,
            coins: 0,
            popped: 0,
            placed: 0,
            last_tick: now,
            last_frame: now,
        })
    }

    /// Fresh board for the level at `index`. Progress on the level starts over.
    fn start_level(&mut self, index: u32) -> Result<()> {
        let mut level = self.config.level(index)?;
        level.reset_progress();
        self.engine.load_board(level.cell_coords())?;
        self.pops.clear();
        self.spawner = spawner_for(&self.config, &level, index);
        self.current = self.spawner.next_cluster()?;
        self.upcoming = self.spawner.next_cluster()?;
        self.cursor = (level.width / 2, level.height / 2);
        info!("[App] starting '{}'", level.name);
        self.level = level;
        self.level_index = index;
        self.screen = Screen::Playing;
        self.paused = false;
        Ok(())
    }

    fn move_cursor(&mut self, dx: isize, dy: isize) {
        let (w, h) = (self.level.width, self.level.height);
        let step = |v: usize, d: isize, limit: usize| v.saturating_add_signed(d).min(limit - 1);
        self.cursor = (step(self.cursor.0, dx, w), step(self.cursor.1, dy, h));
    }

    fn place_current(&mut self) -> Result<()> {
        let (x, y) = self.cursor;
        let cluster = std::mem::replace(&mut self.current, self.upcoming.clone());
        match self.engine.place(cluster, x, y) {
            Ok(_) => {
                self.placed += 1;
                self.upcoming = self.spawner.next_cluster()?;
            }
            // Rejected clusters come back untouched.
            Err(rejected) => self.current = rejected.cluster,
        }
        Ok(())
    }

    fn flip_current(&mut self) {
        if self.current.present_count() != 2 {
            return;
        }
        let mode = match self.current.two_unit_mode() {
            TwoUnitMode::Horizontal => TwoUnitMode::Vertical,
            TwoUnitMode::Vertical | TwoUnitMode::Auto => TwoUnitMode::Horizontal,
        };
        self.current.set_two_unit_mode(mode);
    }

    /// Advance the engine and finish pops whose fade ended.
    fn step(&mut self, dt: Duration) {
        let tick_interval = Duration::from_secs_f64(1.0 / self.config.tick_rate);
        let since = self.last_tick.elapsed();
        if since >= tick_interval {
            self.last_tick = Instant::now();
            self.engine.tick(since, &mut self.pops);
        }
        self.pops.advance(dt);
        for ticket in self.pops.take_finished() {
            let Some(outcome) = self.engine.complete_removal(ticket) else {
                continue;
            };
            self.popped += outcome.removed;
            self.level
                .record(outcome.color, u32::try_from(outcome.removed).unwrap_or(u32::MAX));
        }

        if self.level.is_complete() {
            self.coins = self.coins.saturating_add(LEVEL_REWARD_COINS);
            self.pops.clear();
            self.screen = Screen::LevelComplete;
            info!("[App] '{}' complete, {} coins", self.level.name, self.coins);
        } else if self.engine.is_settled()
            && self.pops.is_empty()
            && self.engine.board().is_some_and(quadmerge::Board::is_full)
        {
            self.screen = Screen::BoardFull;
            info!("[App] board full on '{}'", self.level.name);
        }
    }

    pub fn run(&mut self) -> Result<()> {
        use crossterm::{
            execute,
            terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
        };

        enable_raw_mode()?;
        let mut stdout = std::io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let mut terminal =
            ratatui::DefaultTerminal::new(ratatui::backend::CrosstermBackend::new(stdout))?;

        let result = self.run_loop(&mut terminal);

        execute!(std::io::stdout(), LeaveAlternateScreen)?;
        disable_raw_mode()?;

        result
    }

    fn run_loop(&mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        loop {
            let now = Instant::now();
            let dt = now.duration_since(self.last_frame);
            self.last_frame = now;

            if self.screen == Screen::Playing && !self.paused {
                self.step(dt);
            }

            let hud = Hud {
                screen: self.screen,
                board: self.engine.board(),
                level: &self.level,
                level_number: self.level_index.saturating_add(1),
                coins: self.coins,
                popped: self.popped,
                placed: self.placed,
                cursor: self.cursor,
                current: &self.current,
                upcoming: &self.upcoming,
                scheduler: self.engine.scheduler().state(),
                in_flight: self.engine.in_flight().count(),
                paused: self.paused,
                quit_selected: self.quit_selected,
            };
            let theme = &self.theme;
            let pops = &mut self.pops;
            terminal.draw(|f| ui::draw(f, &hud, theme, pops, dt))?;

            let timeout = FRAME.saturating_sub(now.elapsed());
            if !event::poll(timeout)? {
                continue;
            }
            while event::poll(Duration::ZERO)? {
                let Event::Key(key) = event::read()? else {
                    continue;
                };
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                if !self.handle_action(key_to_action(key))? {
                    return Ok(());
                }
            }
        }
    }

    /// Returns false when the app should exit.
    fn handle_action(&mut self, action: Action) -> Result<bool> {
        match self.screen {
            Screen::Playing if self.paused => match action {
                Action::Pause => self.paused = false,
                Action::Quit => self.open_quit_menu(),
                _ => {}
            },
            Screen::Playing => match action {
                Action::MoveLeft => self.move_cursor(-1, 0),
                Action::MoveRight => self.move_cursor(1, 0),
                Action::MoveUp => self.move_cursor(0, 1),
                Action::MoveDown => self.move_cursor(0, -1),
                Action::Place => self.place_current()?,
                Action::Rotate => self.flip_current(),
                Action::Pause => self.paused = true,
                Action::Restart => self.start_level(self.level_index)?,
                Action::Quit => self.open_quit_menu(),
                Action::None => {}
            },
            Screen::LevelComplete => match action {
                Action::Place => self.start_level(self.level_index.saturating_add(1))?,
                Action::Quit => return Ok(false),
                _ => {}
            },
            Screen::BoardFull => match action {
                Action::Restart | Action::Place => self.start_level(self.level_index)?,
                Action::Quit => return Ok(false),
                _ => {}
            },
            Screen::QuitMenu => match action {
                Action::MoveDown | Action::MoveRight => self.quit_selected = self.quit_selected.next(),
                Action::MoveUp | Action::MoveLeft => self.quit_selected = self.quit_selected.prev(),
                Action::Place => match self.quit_selected {
                    QuitOption::Resume => self.screen = Screen::Playing,
                    QuitOption::Restart => self.start_level(self.level_index)?,
                    QuitOption::Exit => return Ok(false),
                },
                Action::Pause | Action::Quit => self.screen = Screen::Playing,
                _ => {}
            },
        }
        Ok(true)
    }

    fn open_quit_menu(&mut self) {
        self.screen = Screen::QuitMenu;
        self.quit_selected = QuitOption::Resume;
    }
}

fn spawner_for(config: &GameConfig, level: &Level, index: u32) -> Spawner {
    let spawn = config.spawn_config(level);
    match config.seed {
        Some(seed) => Spawner::seeded(spawn, seed.wrapping_add(u64::from(index))),
        None => Spawner::from_entropy(spawn),
    }
}
