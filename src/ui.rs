//! Layout and drawing: board, cursor ghost, sidebar, overlays and pop fades.

use crate::app::{QuitOption, Screen};
use crate::pop::PopQueue;
use crate::theme::Theme;
use quadmerge::{Board, Cluster, Level, SchedulerState, Slot, SubCellAddress};
use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Position, Rect};
use ratatui::style::{Color, Style, Stylize};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Gauge, Paragraph, Widget};
use std::collections::HashSet;
use std::time::Duration;
use tachyonfx::{
    CellFilter, Duration as TfxDuration, EffectRenderer, Interpolation, fx, ref_count,
};

/// One board cell is 4×2 terminal cells, so each slot is 2×1.
const CELL_WIDTH: u16 = 4;
const CELL_HEIGHT: u16 = 2;
const SLOT_WIDTH: u16 = 2;

const SIDEBAR_WIDTH: u16 = 26;

/// Everything the frame shows besides the pop effects.
pub struct Hud<'a> {
    pub screen: Screen,
    pub board: Option<&'a Board>,
    pub level: &'a Level,
    pub level_number: u32,
    pub coins: u32,
    pub popped: usize,
    pub placed: usize,
    pub cursor: (usize, usize),
    pub current: &'a Cluster,
    pub upcoming: &'a Cluster,
    pub scheduler: SchedulerState,
    pub in_flight: usize,
    pub paused: bool,
    pub quit_selected: QuitOption,
}

/// Board size in terminal cells, border included.
fn board_pixel_size(board: &Board) -> (u16, u16) {
    (
        board.width() as u16 * CELL_WIDTH + 2,
        board.height() as u16 * CELL_HEIGHT + 2,
    )
}

/// Top-left terminal cell of a global sub-cell. Sub-cell row 0 is the bottom of the board.
fn sub_cell_origin(inner: Rect, board: &Board, gx: usize, gy: usize) -> (u16, u16) {
    let (_, gh) = board.sub_dims();
    (
        inner.x + gx as u16 * SLOT_WIDTH,
        inner.y + (gh - 1 - gy) as u16,
    )
}

pub fn draw(frame: &mut Frame, hud: &Hud, theme: &Theme, pops: &mut PopQueue, delta: Duration) {
    let area = frame.area();
    frame
        .buffer_mut()
        .set_style(area, Style::default().bg(theme.bg));
    let Some(board) = hud.board else {
        Paragraph::new("No board loaded")
            .alignment(Alignment::Center)
            .style(Style::default().fg(theme.main_fg))
            .render(area, frame.buffer_mut());
        return;
    };

    let (pw, ph) = board_pixel_size(board);
    let total_w = pw + SIDEBAR_WIDTH;
    let horiz = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(total_w),
            Constraint::Fill(1),
        ])
        .split(area);
    let vert = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(ph.max(24)),
            Constraint::Fill(1),
        ])
        .split(horiz[1]);
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(pw), Constraint::Length(SIDEBAR_WIDTH)])
        .split(vert[1]);
    let board_area = Rect {
        height: ph.min(columns[0].height),
        ..columns[0]
    };

    let inner = draw_board(frame, hud, theme, board, board_area);
    draw_sidebar(frame, hud, theme, columns[1]);
    apply_pop_effects(frame, theme, board, inner, pops, delta);

    match hud.screen {
        Screen::Playing if hud.paused => draw_pause_overlay(frame, theme, area),
        Screen::Playing => {}
        Screen::LevelComplete => draw_level_complete(frame, hud, theme, area),
        Screen::BoardFull => draw_board_full(frame, hud, theme, area),
        Screen::QuitMenu => draw_quit_menu(frame, theme, hud.quit_selected),
    }
}

/// Draw the bordered board with the cursor ghost. Returns the inner rect.
fn draw_board(frame: &mut Frame, hud: &Hud, theme: &Theme, board: &Board, area: Rect) -> Rect {
    let title = format!(" quadmerge | {} ", hud.level.name);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.grid).bg(theme.bg))
        .title(Span::styled(title, theme.title));
    let inner = block.inner(area);
    block.render(area, frame.buffer_mut());

    let buf = frame.buffer_mut();
    let bounds = inner.intersection(buf.area);
    let mut put = |(x, y): (u16, u16), symbol: &str, style: Style| {
        if bounds.contains(Position::new(x, y)) && bounds.contains(Position::new(x + 1, y)) {
            buf.set_string(x, y, symbol, style);
        }
    };

    for cell in board.cells_by_column() {
        let shade = if (cell.x + cell.y) % 2 == 0 {
            theme.bg
        } else {
            theme.grid
        };
        let is_cursor = hud.cursor == (cell.x, cell.y);
        for slot in Slot::ALL {
            let (gx, gy) = SubCellAddress::new(cell.x, cell.y, slot).to_global();
            let pos = sub_cell_origin(inner, board, gx, gy);
            let unit = board.unit_in_slot(cell.x, cell.y, slot);
            match (unit, is_cursor) {
                (Some(_), true) => put(pos, "××", Style::default().fg(theme.cursor).bg(shade)),
                (Some(unit), false) => {
                    let c = theme.block_color(unit.color.0);
                    put(pos, "██", Style::default().fg(c).bg(shade));
                }
                (None, true) => {
                    let ghost = hud
                        .current
                        .unit_in_slot(slot)
                        .and_then(|i| hud.current.unit(i))
                        .map(|u| theme.block_color(u.color.0));
                    let style = ghost.map_or(Style::default().fg(theme.cursor).bg(shade), |c| {
                        Style::default().fg(c).bg(shade)
                    });
                    put(pos, if ghost.is_some() { "▓▓" } else { "░░" }, style);
                }
                (None, false) if cell.is_occupied() => {
                    put(pos, "··", Style::default().fg(theme.inactive_fg).bg(shade));
                }
                (None, false) => put(pos, "  ", Style::default().bg(shade)),
            }
        }
    }
    inner
}

/// Create fades for new pops and advance all of them by `delta`.
fn apply_pop_effects(
    frame: &mut Frame,
    theme: &Theme,
    board: &Board,
    inner: Rect,
    pops: &mut PopQueue,
    delta: Duration,
) {
    let delta_ms = delta.as_millis().min(u128::from(u32::MAX)) as u32;
    let fade_ms = pops.duration().as_millis().min(u128::from(u32::MAX)) as u32;
    let bg = theme.bg;
    for pop in pops.pops_mut() {
        let effect = pop.effect.get_or_insert_with(|| {
            let positions: HashSet<(u16, u16)> = pop
                .sub_cells
                .iter()
                .flat_map(|&(gx, gy)| {
                    let (x, y) = sub_cell_origin(inner, board, gx, gy);
                    [(x, y), (x + 1, y)]
                })
                .collect();
            let filter = CellFilter::PositionFn(ref_count(move |pos: Position| {
                positions.contains(&(pos.x, pos.y))
            }));
            fx::fade_to(bg, bg, (fade_ms, Interpolation::Linear))
                .with_filter(filter)
                .with_area(inner)
        });
        frame.render_effect(effect, inner, TfxDuration::from_millis(delta_ms));
    }
}

fn sidebar_block(theme: &Theme) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.grid).bg(theme.bg))
}

fn draw_sidebar(frame: &mut Frame, hud: &Hud, theme: &Theme, area: Rect) {
    let title_style = Style::default().fg(theme.title);
    let fg_style = Style::default().fg(theme.main_fg);

    let goal_rows = hud.level.goals.len().max(1) as u16;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(5),             // Next
            Constraint::Length(goal_rows + 4), // Goals + gauge
            Constraint::Length(6),             // Stats
            Constraint::Length(3),             // Engine
        ])
        .split(area);

    // --- Next ---
    let next_block = sidebar_block(theme);
    let next_inner = next_block.inner(chunks[0]);
    next_block.render(chunks[0], frame.buffer_mut());
    let next_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Length(2)])
        .split(next_inner);
    Paragraph::new(Line::from(vec![
        Span::styled("Now", title_style),
        Span::raw("        "),
        Span::styled("Next", title_style),
    ]))
    .render(next_layout[0], frame.buffer_mut());
    let previews = next_layout[1];
    draw_cluster_preview(frame, theme, hud.current, Rect { width: CELL_WIDTH, ..previews });
    draw_cluster_preview(
        frame,
        theme,
        hud.upcoming,
        Rect {
            x: previews.x + 11,
            width: CELL_WIDTH,
            ..previews
        },
    );

    // --- Goals ---
    let goals_block = sidebar_block(theme);
    let goals_inner = goals_block.inner(chunks[1]);
    goals_block.render(chunks[1], frame.buffer_mut());
    let mut lines = vec![Line::from(Span::styled("Goals", title_style))];
    if hud.level.goals.is_empty() {
        lines.push(Line::from(Span::styled("free play", fg_style)));
    }
    for goal in &hud.level.goals {
        let c = theme.block_color(goal.color.0);
        let mark = if goal.is_met() { " ✓" } else { "" };
        lines.push(Line::from(vec![
            Span::styled("██ ", Style::default().fg(c)),
            Span::styled(
                format!("{}/{}{}", goal.collected, goal.required, mark),
                fg_style,
            ),
        ]));
    }
    let text_h = goals_inner.height.saturating_sub(1);
    Paragraph::new(Text::from(lines)).render(
        Rect {
            height: text_h,
            ..goals_inner
        },
        frame.buffer_mut(),
    );
    let (collected, required) = hud
        .level
        .goals
        .iter()
        .fold((0u32, 0u32), |(c, r), g| (c + g.collected.min(g.required), r + g.required));
    let ratio = if required > 0 {
        f64::from(collected) / f64::from(required)
    } else {
        0.0
    };
    Gauge::default()
        .ratio(ratio.min(1.0))
        .gauge_style(Style::default().fg(Color::Green))
        .render(
            Rect {
                y: goals_inner.y + text_h,
                height: 1.min(goals_inner.height),
                ..goals_inner
            },
            frame.buffer_mut(),
        );

    // --- Stats ---
    let stats_block = sidebar_block(theme);
    let stats_inner = stats_block.inner(chunks[2]);
    stats_block.render(chunks[2], frame.buffer_mut());
    let stat = |label: &'static str, value: String| {
        Line::from(vec![
            Span::styled(label, title_style),
            Span::styled(value, fg_style),
        ])
    };
    Paragraph::new(Text::from(vec![
        stat("Level: ", hud.level_number.to_string()),
        stat("Coins: ", hud.coins.to_string()),
        stat("Popped: ", hud.popped.to_string()),
        stat("Placed: ", hud.placed.to_string()),
    ]))
    .render(stats_inner, frame.buffer_mut());

    // --- Engine ---
    let engine_block = sidebar_block(theme);
    let engine_inner = engine_block.inner(chunks[3]);
    engine_block.render(chunks[3], frame.buffer_mut());
    let (label, color) = match hud.scheduler {
        SchedulerState::Idle => ("idle".to_string(), theme.inactive_fg),
        SchedulerState::Scheduled => ("scan pending".to_string(), theme.title),
        SchedulerState::Resolving => (format!("popping ×{}", hud.in_flight), Color::Green),
    };
    Paragraph::new(Line::from(vec![
        Span::styled("Board: ", title_style),
        Span::styled(label, Style::default().fg(color)),
    ]))
    .render(engine_inner, frame.buffer_mut());
}

/// A cluster drawn as one board cell would show it.
fn draw_cluster_preview(frame: &mut Frame, theme: &Theme, cluster: &Cluster, area: Rect) {
    let buf = frame.buffer_mut();
    let bounds = area.intersection(buf.area);
    for slot in Slot::ALL {
        let x = area.x + u16::from(slot.x()) * SLOT_WIDTH;
        let y = area.y + u16::from(1 - slot.y());
        if !bounds.contains(Position::new(x + 1, y)) {
            continue;
        }
        let style = cluster
            .unit_in_slot(slot)
            .and_then(|i| cluster.unit(i))
            .map_or(Style::default().fg(theme.inactive_fg), |u| {
                Style::default().fg(theme.block_color(u.color.0))
            });
        buf.set_string(x, y, "██", style);
    }
}

fn popup_rect(area: Rect, width: u16, height: u16) -> Rect {
    Rect {
        x: area.x + area.width.saturating_sub(width) / 2,
        y: area.y + area.height.saturating_sub(height) / 2,
        width: width.min(area.width),
        height: height.min(area.height),
    }
}

fn draw_popup(frame: &mut Frame, theme: &Theme, rect: Rect, lines: Vec<Line<'_>>, border: Color) {
    frame
        .buffer_mut()
        .set_style(rect, Style::default().bg(theme.bg));
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(border).bg(theme.bg)),
        )
        .render(rect, frame.buffer_mut());
}

fn draw_pause_overlay(frame: &mut Frame, theme: &Theme, area: Rect) {
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            " Paused ",
            Style::default().fg(Color::Black).bg(Color::Yellow),
        )),
        Line::from(""),
        Line::from(Span::styled(
            " P: Resume    Q: Quit ",
            Style::default().fg(theme.main_fg),
        )),
    ];
    draw_popup(frame, theme, popup_rect(area, 28, 6), lines, theme.grid);
}

fn draw_level_complete(frame: &mut Frame, hud: &Hud, theme: &Theme, area: Rect) {
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            format!(" {} complete ", hud.level.name),
            Style::default().fg(theme.bg).bg(theme.title).bold(),
        )),
        Line::from(""),
        Line::from(Span::styled(
            format!("+{} coins  ({} total)", quadmerge::LEVEL_REWARD_COINS, hud.coins),
            Style::default().fg(theme.main_fg),
        )),
        Line::from(""),
        Line::from(Span::styled(
            "Enter: Next level   Q: Quit",
            Style::default().fg(theme.inactive_fg),
        )),
    ];
    draw_popup(frame, theme, popup_rect(area, 34, 8), lines, theme.title);
}

fn draw_board_full(frame: &mut Frame, hud: &Hud, theme: &Theme, area: Rect) {
    let remaining: u32 = hud.level.goals.iter().map(|g| g.remaining()).sum();
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            " Board full ",
            Style::default().fg(Color::Black).bg(Color::Red).bold(),
        )),
        Line::from(""),
        Line::from(Span::styled(
            format!("{} block(s) short of the goals", remaining),
            Style::default().fg(theme.main_fg),
        )),
        Line::from(""),
        Line::from(Span::styled(
            "R: Retry   Q: Quit",
            Style::default().fg(theme.inactive_fg),
        )),
    ];
    draw_popup(frame, theme, popup_rect(area, 34, 8), lines, Color::Red);
}

pub fn draw_quit_menu(frame: &mut Frame, theme: &Theme, selected: QuitOption) {
    let rect = popup_rect(frame.area(), 24, 8);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.title))
        .title(" Quit? ");
    frame
        .buffer_mut()
        .set_style(rect, Style::default().bg(theme.bg));
    let inner = block.inner(rect);
    block.render(rect, frame.buffer_mut());

    let options = [
        (QuitOption::Resume, " Resume "),
        (QuitOption::Restart, " Restart level "),
        (QuitOption::Exit, " Exit "),
    ];
    for (i, (opt, label)) in options.iter().enumerate() {
        let style = if *opt == selected {
            Style::default().fg(theme.bg).bg(theme.title).bold()
        } else {
            Style::default().fg(theme.title)
        };
        let rx = inner.x + (inner.width.saturating_sub(label.len() as u16)) / 2;
        let ry = inner.y + 1 + i as u16 * 2;
        if ry < inner.y + inner.height {
            frame.buffer_mut().set_string(rx, ry, label, style);
        }
    }
}
