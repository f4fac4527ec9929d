//! Layout and drawing: playfield, sidebar, pause, quit menu, game over.

use crate::app::{QuitOption, Screen};
use crate::game::{Cell, GameState};
use crate::theme::Theme;
use ratatui::layout::{Alignment, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;
use std::time::Instant;
use tachyonfx::{fx, Duration as TfxDuration, Effect, EffectRenderer, Interpolation};

/// Each playfield cell is 2 terminal columns x 1 row (roughly square on screen).
const CELL_WIDTH: u16 = 2;
const CELL_HEIGHT: u16 = 1;

const SIDEBAR_WIDTH: u16 = 22;

/// Duration of the board fade on game over, in ms.
const GAME_OVER_FADE_MS: u32 = 600;

/// Playfield size in terminal cells (border + grid) for given grid dimensions.
fn playfield_pixel_size(width: u16, height: u16) -> (u16, u16) {
    (width * CELL_WIDTH + 2, height * CELL_HEIGHT + 2)
}

/// Max playfield size (width, height) in grid cells that fits the given
/// terminal size, so --width/--height are clamped and board + sidebar fit.
pub fn playfield_size_for_terminal(term_cols: u16, term_rows: u16) -> (u16, u16) {
    let max_pf_w = term_cols.saturating_sub(2).saturating_sub(SIDEBAR_WIDTH);
    let max_pf_h = term_rows.saturating_sub(2);
    ((max_pf_w / CELL_WIDTH).max(1), (max_pf_h / CELL_HEIGHT).max(1))
}

/// Playfield outer rect (board + border) centred in `area`, leaving room for the sidebar.
fn playfield_outer_rect(area: Rect, state: &GameState) -> Rect {
    let (pw, ph) = playfield_pixel_size(
        state.playfield.width as u16,
        state.playfield.height as u16,
    );
    let total_w = pw + SIDEBAR_WIDTH;
    let x = area.x + area.width.saturating_sub(total_w) / 2;
    let y = area.y + area.height.saturating_sub(ph) / 2;
    Rect {
        x,
        y,
        width: pw.min(area.width),
        height: ph.min(area.height),
    }
}

/// Board-only rect (inside the border).
fn playfield_board_rect(area: Rect, state: &GameState) -> Rect {
    let outer = playfield_outer_rect(area, state);
    Rect {
        x: outer.x + 1,
        y: outer.y + 1,
        width: (state.playfield.width as u16 * CELL_WIDTH).min(outer.width.saturating_sub(2)),
        height: (state.playfield.height as u16 * CELL_HEIGHT).min(outer.height.saturating_sub(2)),
    }
}

/// Colour of the absolute cell (x, y): current piece first, then the grid.
fn cell_color(state: &GameState, theme: &Theme, x: usize, y: usize) -> Option<ratatui::style::Color> {
    let piece = &state.piece;
    for (cx, cy) in piece.shape.cells() {
        if piece.x + cx as i32 == x as i32 && piece.y + cy as i32 == y as i32 {
            return Some(theme.piece_color(piece.color_index));
        }
    }
    match state.playfield.get(x, y) {
        Some(Cell::Filled(i)) => Some(theme.piece_color(i)),
        _ => None,
    }
}

fn draw_board(frame: &mut Frame, state: &GameState, theme: &Theme, area: Rect) {
    let outer = playfield_outer_rect(area, state);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.div_line))
        .title(Span::styled(" blockfall ", Style::default().fg(theme.title)));
    frame.render_widget(block, outer);

    let board = playfield_board_rect(area, state);
    let mut lines = Vec::with_capacity(state.playfield.height);
    for y in 0..state.playfield.height {
        let mut spans = Vec::with_capacity(state.playfield.width);
        for x in 0..state.playfield.width {
            let bg = cell_color(state, theme, x, y).unwrap_or(theme.bg);
            spans.push(Span::styled("  ", Style::default().bg(bg)));
        }
        lines.push(Line::from(spans));
    }
    frame.render_widget(Paragraph::new(lines), board);
}

fn draw_sidebar(frame: &mut Frame, state: &GameState, theme: &Theme, high_score: u32, area: Rect) {
    let outer = playfield_outer_rect(area, state);
    let sidebar = Rect {
        x: (outer.x + outer.width + 1).min(area.x + area.width),
        y: outer.y,
        width: SIDEBAR_WIDTH.min((area.x + area.width).saturating_sub(outer.x + outer.width + 1)),
        height: outer.height,
    };
    if sidebar.width == 0 {
        return;
    }
    let label = Style::default().fg(theme.main_fg);
    let value = Style::default().fg(theme.title).add_modifier(Modifier::BOLD);
    let help = Style::default().fg(theme.inactive_fg);
    let lines = vec![
        Line::from(Span::styled("BLOCKFALL", value)),
        Line::default(),
        Line::from(vec![
            Span::styled("Score  ", label),
            Span::styled(state.score.to_string(), value),
        ]),
        Line::from(vec![
            Span::styled("Level  ", label),
            Span::styled(state.level.to_string(), value),
        ]),
        Line::from(vec![
            Span::styled("Lines  ", label),
            Span::styled(state.lines_cleared.to_string(), value),
        ]),
        Line::from(vec![
            Span::styled("Best   ", label),
            Span::styled(high_score.to_string(), value),
        ]),
        Line::default(),
        Line::from(Span::styled("←/→ or h/l  move", help)),
        Line::from(Span::styled("↑ or k      rotate", help)),
        Line::from(Span::styled("↓ or j      soft drop", help)),
        Line::from(Span::styled("Space       hard drop", help)),
        Line::from(Span::styled("P pause  Q quit", help)),
    ];
    frame.render_widget(Paragraph::new(lines), sidebar);
}

/// Small centred box over the board for overlays.
fn overlay_rect(board: Rect, width: u16, height: u16) -> Rect {
    Rect {
        x: board.x + board.width.saturating_sub(width) / 2,
        y: board.y + board.height.saturating_sub(height) / 2,
        width: width.min(board.width),
        height: height.min(board.height),
    }
}

fn draw_overlay(frame: &mut Frame, theme: &Theme, board: Rect, lines: Vec<Line<'_>>) {
    let width = (lines
        .iter()
        .map(ratatui::text::Line::width)
        .max()
        .unwrap_or(0) as u16)
        .saturating_add(4);
    let height = lines.len() as u16 + 2;
    let rect = overlay_rect(board, width, height);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.div_line))
        .style(Style::default().bg(theme.bg));
    let para = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(block);
    frame.render_widget(ratatui::widgets::Clear, rect);
    frame.render_widget(para, rect);
}

/// Fade the board toward the background after game over (TachyonFX).
fn apply_game_over_effect(
    frame: &mut Frame,
    state: &GameState,
    theme: &Theme,
    area: Rect,
    game_over_effect: &mut Option<Effect>,
    effect_process_time: &mut Option<Instant>,
    now: Instant,
) {
    let board = playfield_board_rect(area, state);
    let delta = effect_process_time
        .map(|t| now.saturating_duration_since(t))
        .unwrap_or(std::time::Duration::ZERO);
    let delta_ms = delta.as_millis().min(u32::MAX as u128) as u32;
    *effect_process_time = Some(now);

    if game_over_effect.is_none() {
        let bg = theme.bg;
        let effect = fx::fade_to(bg, bg, (GAME_OVER_FADE_MS, Interpolation::Linear))
            .with_area(board);
        *game_over_effect = Some(effect);
    }
    if let Some(effect) = game_over_effect {
        frame.render_effect(effect, board, TfxDuration::from_millis(delta_ms));
    }
}

/// Draw the current screen: board + sidebar, with pause / quit / game-over overlays.
#[allow(clippy::too_many_arguments)]
pub fn draw(
    frame: &mut Frame,
    screen: Screen,
    state: &GameState,
    theme: &Theme,
    paused: bool,
    high_score: u32,
    quit_selected: Option<QuitOption>,
    game_over_effect: &mut Option<Effect>,
    effect_process_time: &mut Option<Instant>,
    now: Instant,
    no_animation: bool,
) {
    let area = frame.area();
    draw_board(frame, state, theme, area);
    draw_sidebar(frame, state, theme, high_score, area);
    let board = playfield_board_rect(area, state);

    match screen {
        Screen::Playing => {
            if paused {
                draw_overlay(
                    frame,
                    theme,
                    board,
                    vec![Line::from(Span::styled(
                        "PAUSED",
                        Style::default().fg(theme.title).add_modifier(Modifier::BOLD),
                    ))],
                );
            }
        }
        Screen::QuitMenu => {
            let selected = quit_selected.unwrap_or(QuitOption::Resume);
            let item = |label: &'static str, is: bool| {
                let style = if is {
                    Style::default().fg(theme.title).add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(theme.inactive_fg)
                };
                Line::from(Span::styled(
                    if is { format!("> {label}") } else { format!("  {label}") },
                    style,
                ))
            };
            draw_overlay(
                frame,
                theme,
                board,
                vec![
                    Line::from(Span::styled("Quit?", Style::default().fg(theme.main_fg))),
                    item("Resume", selected == QuitOption::Resume),
                    item("Exit", selected == QuitOption::Exit),
                ],
            );
        }
        Screen::GameOver => {
            if !no_animation {
                apply_game_over_effect(
                    frame,
                    state,
                    theme,
                    area,
                    game_over_effect,
                    effect_process_time,
                    now,
                );
            }
            draw_overlay(
                frame,
                theme,
                board,
                vec![
                    Line::from(Span::styled(
                        "GAME OVER",
                        Style::default().fg(theme.title).add_modifier(Modifier::BOLD),
                    )),
                    Line::from(Span::styled(
                        format!("Final score: {}", state.score),
                        Style::default().fg(theme.main_fg),
                    )),
                    Line::from(Span::styled(
                        "R restart   Q quit",
                        Style::default().fg(theme.inactive_fg),
                    )),
                ],
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_playfield_size_for_terminal() {
        // 80x24 terminal: sidebar 22 + border 2 leaves 56 cols -> 28 cells wide.
        assert_eq!(playfield_size_for_terminal(80, 24), (28, 22));
        // Tiny terminal still reports at least 1x1.
        assert_eq!(playfield_size_for_terminal(4, 2), (1, 1));
    }
}
