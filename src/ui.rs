//! Layout and drawing: board, falling piece, drop slides, next preview, stats, legend,
//! pause and game over.

use crate::GameMode;
use crate::board::{BlockColor, Cell, GRID_SIZE};
use crate::game::{GameState, Phase};
use crate::piece::NextPiece;
use ratatui::Frame;
use ratatui::buffer::Buffer;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Position, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Widget};
use std::collections::HashSet;
use std::time::Instant;
use tachyonfx::{
    CellFilter, Duration as TfxDuration, Effect, EffectRenderer, Interpolation, fx, ref_count,
};

/// Each board cell is CELL_WIDTH x CELL_HEIGHT terminal cells.
const CELL_WIDTH: u16 = 4;
const CELL_HEIGHT: u16 = 2;

const SIDEBAR_WIDTH: u16 = 26;

/// Board with border, in terminal cells.
const BOARD_OUTER_WIDTH: u16 = GRID_SIZE as u16 * CELL_WIDTH + 2;
const BOARD_OUTER_HEIGHT: u16 = GRID_SIZE as u16 * CELL_HEIGHT + 2;

/// Duration of the clear flash (TachyonFX) in ms.
const CLEAR_FLASH_MS: u32 = 300;

/// Next preview: mini cells.
const NEXT_MINI_CELL_W: u16 = 2;
const NEXT_MINI_CELL_H: u16 = 1;

const LETTER_FG: Color = Color::White;

/// Board (outer, with border) and sidebar, centred in `area`.
fn game_layout(area: Rect) -> (Rect, Rect) {
    let total_w = BOARD_OUTER_WIDTH + SIDEBAR_WIDTH;
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
            Constraint::Length(BOARD_OUTER_HEIGHT),
            Constraint::Fill(1),
        ])
        .split(horiz[1]);
    let inner = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length(BOARD_OUTER_WIDTH),
            Constraint::Length(SIDEBAR_WIDTH),
        ])
        .split(vert[1]);
    (inner[0], inner[1])
}

/// Board cells only (inside the border).
fn board_rect(area: Rect) -> Rect {
    let (outer, _) = game_layout(area);
    Rect {
        x: outer.x + 1,
        y: outer.y + 1,
        width: outer.width.saturating_sub(2),
        height: outer.height.saturating_sub(2),
    }
}

/// Board cell under a terminal position (mouse click), if any.
pub fn cell_at(area: Rect, column: u16, row: u16) -> Option<(usize, usize)> {
    let board = board_rect(area);
    if !board.contains(Position::new(column, row)) {
        return None;
    }
    let x = ((column - board.x) / CELL_WIDTH) as usize;
    let y = ((row - board.y) / CELL_HEIGHT) as usize;
    (x < GRID_SIZE && y < GRID_SIZE).then_some((x, y))
}

/// Buffer positions covered by the given board cells.
fn flash_buffer_positions(board: Rect, cells: &[(usize, usize)]) -> HashSet<(u16, u16)> {
    let mut set = HashSet::new();
    for &(cx, cy) in cells {
        let x0 = board.x + cx as u16 * CELL_WIDTH;
        let y0 = board.y + cy as u16 * CELL_HEIGHT;
        for bx in x0..(x0 + CELL_WIDTH).min(board.x + board.width) {
            for by in y0..(y0 + CELL_HEIGHT).min(board.y + board.height) {
                set.insert((bx, by));
            }
        }
    }
    set
}

/// Create or update the clear flash and process it (TachyonFX: fade cleared cells to white).
fn apply_clear_flash(
    frame: &mut Frame,
    area: Rect,
    flash_cells: &[(usize, usize)],
    flash_effect: &mut Option<Effect>,
    flash_process_time: &mut Option<Instant>,
    now: Instant,
) {
    let board = board_rect(area);
    let delta = flash_process_time
        .map(|t| now.saturating_duration_since(t))
        .unwrap_or(std::time::Duration::ZERO);
    let delta_ms = delta.as_millis().min(u32::MAX as u128) as u32;
    let tfx_delta = TfxDuration::from_millis(delta_ms);
    *flash_process_time = Some(now);

    if flash_effect.is_none() {
        let positions = flash_buffer_positions(board, flash_cells);
        let filter = CellFilter::PositionFn(ref_count(move |pos: Position| {
            positions.contains(&(pos.x, pos.y))
        }));
        let effect = fx::fade_to(Color::White, Color::White, (CLEAR_FLASH_MS, Interpolation::Linear))
            .with_filter(filter)
            .with_area(board);
        *flash_effect = Some(effect);
    }

    if let Some(effect) = flash_effect {
        frame.render_effect(effect, board, tfx_delta);
    }
}

/// Draw the game, its overlays and the clear flash.
/// While `flash_cells` is non-empty the flash effect is created (if needed) and advanced.
pub fn draw(
    frame: &mut Frame,
    state: &GameState,
    paused: bool,
    flash_cells: &[(usize, usize)],
    flash_effect: &mut Option<Effect>,
    flash_process_time: &mut Option<Instant>,
    now: Instant,
) {
    let area = frame.area();
    Block::default()
        .style(Style::default().bg(state.theme.bg))
        .render(area, frame.buffer_mut());

    let (board_outer, sidebar) = game_layout(area);
    draw_board(frame, state, board_outer);
    draw_sidebar(frame, state, sidebar);

    if !flash_cells.is_empty() {
        apply_clear_flash(frame, area, flash_cells, flash_effect, flash_process_time, now);
    }
    if state.phase == Phase::GameOver {
        draw_game_over(frame, state, area);
    } else if paused {
        draw_pause_overlay(frame, state, area);
    }
}

fn draw_board(frame: &mut Frame, state: &GameState, area: Rect) {
    let title = match state.mode {
        GameMode::Falling => " Sanrio Block Party ",
        GameMode::Classic => " Sanrio Block Party: Classic ",
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(state.theme.border).bg(state.theme.bg))
        .title(Span::styled(title, Style::default().fg(state.theme.title).add_modifier(Modifier::BOLD)));
    let inner = block.inner(area);
    block.render(area, frame.buffer_mut());
    let buf = frame.buffer_mut();

    Block::default()
        .style(Style::default().bg(state.theme.board_bg))
        .render(inner, buf);

    // Terminal too small for the grid.
    if inner.width < GRID_SIZE as u16 * CELL_WIDTH || inner.height < GRID_SIZE as u16 * CELL_HEIGHT {
        return;
    }

    for y in 0..GRID_SIZE {
        for x in 0..GRID_SIZE {
            if let Some(Cell::Block(color)) = state.board.get(x as i32, y as i32) {
                // Hidden until its slide arrives.
                if !state.animations.targets(x, y) {
                    draw_block(buf, inner, state, x, (y as u16 * CELL_HEIGHT) as i32, color);
                }
            }
        }
    }

    for a in state.animations.iter() {
        let half_rows = (a.row_position() * f32::from(CELL_HEIGHT)).round() as i32;
        draw_block(buf, inner, state, a.column, half_rows, a.color);
    }

    if let Some(piece) = &state.piece {
        for (x, y, color) in piece.blocks() {
            if y >= 0 && x >= 0 {
                draw_block(buf, inner, state, x as usize, y * i32::from(CELL_HEIGHT), color);
            }
        }
    }

    if state.mode == GameMode::Classic && state.phase != Phase::GameOver {
        draw_cursor(buf, inner, state);
    }
}

/// One block at board column `x` and terminal row offset `top` (may be off the board; clipped).
fn draw_block(buf: &mut Buffer, board: Rect, state: &GameState, x: usize, top: i32, color: BlockColor) {
    let fill = state.theme.block_color(color);
    let rx = board.x + x as u16 * CELL_WIDTH;
    for dy in 0..i32::from(CELL_HEIGHT) {
        let ry = top + dy;
        if ry < 0 || ry >= i32::from(board.height) {
            continue;
        }
        let ry = board.y + ry as u16;
        let text = if dy == 0 {
            format!(" {}  ", color.initial())
        } else {
            "▁".repeat(CELL_WIDTH as usize)
        };
        let style = if dy == 0 {
            Style::default().fg(LETTER_FG).bg(fill).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(state.theme.board_bg).bg(fill)
        };
        buf.set_string(rx, ry, text, style);
    }
}

fn draw_cursor(buf: &mut Buffer, board: Rect, state: &GameState) {
    let (cx, cy) = state.cursor;
    let rx = board.x + cx as u16 * CELL_WIDTH;
    let ry = board.y + cy as u16 * CELL_HEIGHT;
    let bg = match state.board.get(cx as i32, cy as i32) {
        Some(Cell::Block(c)) => state.theme.block_color(c),
        _ => state.theme.board_bg,
    };
    let style = Style::default().fg(state.theme.main_fg).bg(bg).add_modifier(Modifier::BOLD);
    for dy in 0..CELL_HEIGHT {
        buf.set_string(rx, ry + dy, "▌", style);
        buf.set_string(rx + CELL_WIDTH - 1, ry + dy, "▐", style);
    }
}

fn sidebar_block(state: &GameState) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(state.theme.border).bg(state.theme.bg))
}

fn draw_sidebar(frame: &mut Frame, state: &GameState, area: Rect) {
    let title_style = Style::default().fg(state.theme.title).add_modifier(Modifier::BOLD);
    let fg_style = Style::default().fg(state.theme.main_fg);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(5), // Next / controls
            Constraint::Length(6), // Stats
            Constraint::Length(7), // Legend
        ])
        .split(area);

    // --- Next (or classic controls) ---
    let next_block = sidebar_block(state);
    let next_inner = next_block.inner(chunks[0]);
    next_block.render(chunks[0], frame.buffer_mut());
    let next_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(1)])
        .split(next_inner);
    match state.mode {
        GameMode::Falling => {
            Paragraph::new(Line::from(Span::styled("Next", title_style)))
                .render(next_layout[0], frame.buffer_mut());
            if let Some(next) = &state.next {
                draw_next_preview(frame, state, next_layout[1], next);
            }
        }
        GameMode::Classic => {
            Paragraph::new(vec![
                Line::from(Span::styled("Pick a block", title_style)),
                Line::from(Span::styled("Arrows + Space / click", fg_style)),
            ])
            .render(next_inner, frame.buffer_mut());
        }
    }

    // --- Stats ---
    let stats_block = sidebar_block(state);
    let stats_inner = stats_block.inner(chunks[1]);
    stats_block.render(chunks[1], frame.buffer_mut());
    let stats_lines = stats_lines(state, title_style, fg_style);
    Paragraph::new(stats_lines).render(stats_inner, frame.buffer_mut());

    // --- Legend ---
    let legend_block = sidebar_block(state);
    let legend_inner = legend_block.inner(chunks[2]);
    legend_block.render(chunks[2], frame.buffer_mut());
    let legend: Vec<Line> = BlockColor::ALL
        .iter()
        .map(|&c| {
            let swatch = state.theme.block_color(c);
            Line::from(vec![
                Span::styled("██ ", Style::default().fg(swatch)),
                Span::styled(c.name(), fg_style),
            ])
        })
        .collect();
    Paragraph::new(legend).render(legend_inner, frame.buffer_mut());
}

fn stats_lines(state: &GameState, label: Style, value: Style) -> Vec<Line<'static>> {
    let mode = match state.mode {
        GameMode::Falling => "Falling",
        GameMode::Classic => "Classic",
    };
    [
        ("Mode: ", mode.to_string()),
        ("Score: ", state.score.to_string()),
        ("Cleared: ", state.cells_cleared.to_string()),
        ("Seed: ", state.seed.to_string()),
    ]
    .into_iter()
    .map(|(name, v)| Line::from(vec![Span::styled(name, label), Span::styled(v, value)]))
    .collect()
}

/// Next shape as mini blocks, each in its own colour.
fn draw_next_preview(frame: &mut Frame, state: &GameState, area: Rect, next: &NextPiece) {
    let (dx_lo, dy_lo) = next
        .cells
        .iter()
        .fold((i32::MAX, i32::MAX), |(ax, ay), c| (ax.min(c.dx), ay.min(c.dy)));
    let (dx_hi, dy_hi) = next
        .cells
        .iter()
        .fold((i32::MIN, i32::MIN), |(ax, ay), c| (ax.max(c.dx), ay.max(c.dy)));
    let bw = (dx_hi - dx_lo + 1) as u16;
    let bh = (dy_hi - dy_lo + 1) as u16;
    let off_x = area.width.saturating_sub(bw * NEXT_MINI_CELL_W) / 2;
    let off_y = area.height.saturating_sub(bh * NEXT_MINI_CELL_H) / 2;

    for cell in &next.cells {
        let px = (cell.dx - dx_lo) as u16;
        let py = (cell.dy - dy_lo) as u16;
        let r = Rect {
            x: area.x + off_x + px * NEXT_MINI_CELL_W,
            y: area.y + off_y + py * NEXT_MINI_CELL_H,
            width: NEXT_MINI_CELL_W,
            height: NEXT_MINI_CELL_H,
        }
        .intersection(area);
        let color = state.theme.block_color(cell.color);
        Paragraph::new("██")
            .style(Style::default().fg(color).bg(color))
            .render(r, frame.buffer_mut());
    }
}

fn centered_popup(area: Rect, width: u16, height: u16) -> Rect {
    Rect {
        x: area.x + area.width.saturating_sub(width) / 2,
        y: area.y + area.height.saturating_sub(height) / 2,
        width: width.min(area.width),
        height: height.min(area.height),
    }
}

fn draw_pause_overlay(frame: &mut Frame, state: &GameState, area: Rect) {
    let popup = centered_popup(area, 28, 5);
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            " Paused ",
            Style::default().fg(Color::Black).bg(state.theme.blocks[4]),
        )),
        Line::from(""),
        Line::from(Span::styled(
            " P — Resume    Q — Quit ",
            Style::default().fg(state.theme.main_fg),
        )),
    ];
    let p = Paragraph::new(lines).alignment(Alignment::Center).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(state.theme.border))
            .style(Style::default().bg(state.theme.board_bg)),
    );
    p.render(popup, frame.buffer_mut());
}

fn draw_game_over(frame: &mut Frame, state: &GameState, area: Rect) {
    let popup = centered_popup(area, 30, 9);
    let fg = Style::default().fg(state.theme.main_fg);
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            " Game Over ",
            Style::default().fg(Color::White).bg(state.theme.title),
        )),
        Line::from(""),
        Line::from(Span::styled(format!(" Score: {} ", state.score), fg)),
        Line::from(Span::styled(format!(" Cleared: {} ", state.cells_cleared), fg)),
        Line::from(""),
        Line::from(Span::styled(" R — Restart    Q — Quit ", fg)),
    ];
    let p = Paragraph::new(lines).alignment(Alignment::Center).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(state.theme.border))
            .style(Style::default().bg(state.theme.board_bg))
            .title(Span::styled(" Block Party ", state.theme.title)),
    );
    p.render(popup, frame.buffer_mut());
}
