//! Layout and drawing: board, sidebar, pause and game over.

use crate::app::Screen;
use crate::block::{Block as GameBlock, CELL_SIZE, Destruction, FadePhase};
use crate::board::{COLS, ROWS};
use crate::game::{GameState, MAX_INPUT_DIGITS};
use crate::theme::{Theme, blend, shade};
use ratatui::Frame;
use ratatui::buffer::Buffer;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Style, Stylize};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Gauge, Paragraph, Widget, Wrap};
use tachyonfx::{Duration as TfxDuration, Effect, EffectRenderer, Interpolation, fx};

/// Terminal cells per grid cell.
const CELL_W: u16 = 10;
const CELL_H: u16 = 2;

const BOARD_W: u16 = COLS as u16 * CELL_W + 2;
const BOARD_H: u16 = ROWS as u16 * CELL_H + 2;
const SIDEBAR_WIDTH: u16 = 30;

/// Board flash on penalty rows and chain explosions.
const FLASH_MS: u32 = 350;

/// Board and sidebar rects, centred in `area`.
fn game_layout(area: Rect) -> (Rect, Rect) {
    let horiz = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(BOARD_W + SIDEBAR_WIDTH),
            Constraint::Fill(1),
        ])
        .split(area);
    let vert = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(BOARD_H),
            Constraint::Fill(1),
        ])
        .split(horiz[1]);
    let inner = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(BOARD_W), Constraint::Length(SIDEBAR_WIDTH)])
        .split(vert[1]);
    (inner[0], inner[1])
}

/// Board cells start at `color` and fade back to what was drawn.
pub fn board_flash(color: Color) -> Effect {
    fx::fade_from(color, color, (FLASH_MS, Interpolation::QuadOut))
}

/// Draw the current screen. `flash` is advanced by `delta` and dropped once done.
pub fn draw(
    frame: &mut Frame,
    screen: Screen,
    state: &GameState,
    theme: &Theme,
    flash: &mut Option<Effect>,
    delta: TfxDuration,
) {
    let area = frame.area();
    let (board_area, sidebar_area) = game_layout(area);
    draw_board(frame, state, theme, board_area);
    draw_sidebar(frame, state, theme, sidebar_area);

    let inner = Rect {
        x: board_area.x + 1,
        y: board_area.y + 1,
        width: board_area.width.saturating_sub(2),
        height: board_area.height.saturating_sub(2),
    };
    let done = flash.as_mut().is_some_and(|effect| {
        frame.render_effect(effect, inner, delta);
        effect.done()
    });
    if done {
        *flash = None;
    }

    match screen {
        Screen::Playing => {}
        Screen::Paused => draw_pause_overlay(frame, theme, board_area),
        Screen::GameOver => draw_game_over(frame, state, theme, board_area),
    }
}

fn draw_board(frame: &mut Frame, state: &GameState, theme: &Theme, area: Rect) {
    let title = format!(" Mathtrix  | {} ", state.board.settings().tier.label());
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.div_line).bg(theme.bg))
        .title(Span::styled(title, theme.title));
    let inner = block.inner(area);
    block.render(area, frame.buffer_mut());
    BoardWidget { state, theme }.render(inner, frame.buffer_mut());
}

/// The grid with blocks, particles, popups and the time-stop banner.
pub struct BoardWidget<'a> {
    pub state: &'a GameState,
    pub theme: &'a Theme,
}

impl Widget for BoardWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let bg = Style::default().bg(self.theme.bg);
        for y in area.top()..area.bottom() {
            for x in area.left()..area.right() {
                buf[(x, y)].set_symbol(" ").set_style(bg);
            }
        }
        for block in self.state.board.blocks() {
            self.draw_block(block, area, buf);
        }
        for block in self.state.board.blocks() {
            self.draw_particles(block, area, buf);
        }
        self.draw_popups(area, buf);
        self.draw_time_stop(area, buf);
    }
}

/// Terminal row for a logical y.
fn term_y(y: f32) -> i32 {
    (y / CELL_SIZE * f32::from(CELL_H)).round() as i32
}

fn term_x(x: f32) -> i32 {
    (x / CELL_SIZE * f32::from(CELL_W)).round() as i32
}

fn in_area(area: Rect, dx: i32, dy: i32) -> Option<(u16, u16)> {
    let x = u16::try_from(dx).ok()?;
    let y = u16::try_from(dy).ok()?;
    (x < area.width && y < area.height).then(|| (area.x + x, area.y + y))
}

impl BoardWidget<'_> {
    fn block_color(&self, block: &GameBlock) -> Option<Color> {
        let base = self.theme.tint_color(block.base_tint());
        let color = if block.is_hinted() {
            blend(base, self.theme.hint, block.hint_alpha())
        } else {
            self.theme.tint_color(block.tint)
        };
        match block.destruction() {
            Destruction::Finished => None,
            Destruction::Exploding { .. } => {
                Some(blend(color, self.theme.bg, block.destroy_progress()))
            }
            Destruction::Revealing { .. } => Some(shade(color, 1.25)),
            Destruction::Intact => Some(color),
        }
    }

    fn draw_block(&self, block: &GameBlock, area: Rect, buf: &mut Buffer) {
        let Some(color) = self.block_color(block) else {
            return;
        };
        let x0 = block.col as i32 * i32::from(CELL_W);
        let y0 = term_y(block.y);
        // Top edge lit, bottom edge in shadow.
        for dy in 0..i32::from(CELL_H) {
            let row_color = if dy == 0 { shade(color, 1.08) } else { shade(color, 0.82) };
            for dx in 0..i32::from(CELL_W) - 1 {
                if let Some(pos) = in_area(area, x0 + dx, y0 + dy) {
                    buf[pos].set_symbol(" ").set_bg(row_color);
                }
            }
        }

        let marker = match &block.kind {
            k if k.is_special() => Some("◆"),
            k if k.is_time_stop() => Some("◷"),
            _ => None,
        };
        if let (Some(marker), Some(pos)) = (marker, in_area(area, x0, y0 + 1)) {
            buf[pos]
                .set_symbol(marker)
                .set_fg(self.theme.accent)
                .set_bg(shade(color, 0.82));
        }

        let Some(label) = self.block_label(block) else {
            return;
        };
        let width = i32::from(CELL_W) - 1;
        let len = label.chars().count() as i32;
        let lx = x0 + (width - len).max(0) / 2;
        let Some((x, y)) = in_area(area, lx, y0) else {
            return;
        };
        let mut style = Style::default().fg(Color::Black).bg(shade(color, 1.08)).bold();
        if block.showing_answer() {
            style = style.fg(self.theme.title).bg(self.theme.bg);
        }
        let max = (area.right().saturating_sub(x)).min(width as u16);
        buf.set_stringn(x, y, &label, usize::from(max), style);
    }

    /// Hint text replaces the problem once the overlay is mostly opaque, if it fits.
    fn block_label(&self, block: &GameBlock) -> Option<String> {
        let label = block.label()?;
        match block.hint() {
            Some(hint)
                if block.hint_alpha() >= 0.5
                    && hint.simplified_expression.chars().count() < usize::from(CELL_W) =>
            {
                Some(hint.simplified_expression.clone())
            }
            _ => Some(label),
        }
    }

    fn draw_particles(&self, block: &GameBlock, area: Rect, buf: &mut Buffer) {
        for p in block.particles() {
            let Some(pos) = in_area(area, term_x(p.x), term_y(p.y)) else {
                continue;
            };
            let symbol = if p.life_ms > 300.0 { "*" } else { "·" };
            buf[pos]
                .set_symbol(symbol)
                .set_fg(self.theme.tint_color(p.tint));
        }
    }

    fn draw_popups(&self, area: Rect, buf: &mut Buffer) {
        for popup in &self.state.popups {
            let x = popup.col as i32 * i32::from(CELL_W);
            // One row above the block so the revealed answer stays readable.
            let Some((x, y)) = in_area(area, x, term_y(popup.y) - 1) else {
                continue;
            };
            let label = if popup.multiplier > 1 {
                format!("+{} x{}", popup.amount, popup.multiplier)
            } else {
                format!("+{}", popup.amount)
            };
            let style = Style::default().fg(self.theme.title).bg(self.theme.bg).bold();
            let max = area.right().saturating_sub(x);
            buf.set_stringn(x, y, label, usize::from(max), style);
        }
    }

    fn draw_time_stop(&self, area: Rect, buf: &mut Buffer) {
        let status = self.state.board.time_stop_status();
        if !status.active {
            return;
        }
        let text = format!(" TIME STOP {:.1}s ", status.remaining_ms / 1000.0);
        let x = area.x + area.width.saturating_sub(text.chars().count() as u16) / 2;
        let style = Style::default().fg(Color::Black).bg(self.theme.hint).bold();
        buf.set_stringn(x, area.y, text, usize::from(area.width), style);
    }
}

fn panel(theme: &Theme, title: &str) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.div_line).bg(theme.bg))
        .title(Span::styled(format!(" {} ", title), theme.title))
}

fn draw_sidebar(frame: &mut Frame, state: &GameState, theme: &Theme, area: Rect) {
    let title_style = Style::default().fg(theme.title);
    let fg_style = Style::default().fg(theme.main_fg);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(6), // Stats
            Constraint::Length(4), // Combo
            Constraint::Length(4), // Answer
            Constraint::Length(3), // Time stop
            Constraint::Fill(1),   // Hints
        ])
        .split(area);

    // --- Stats ---
    let stats = panel(theme, "Stats");
    let stats_inner = stats.inner(chunks[0]);
    stats.render(chunks[0], frame.buffer_mut());
    let row = |label: &'static str, value: String| {
        Line::from(vec![Span::styled(label, title_style), Span::styled(value, fg_style)])
    };
    Paragraph::new(Text::from(vec![
        row("Score: ", state.score.to_string()),
        row("Level: ", state.level.to_string()),
        row("Blocks: ", state.destroyed.to_string()),
        row(
            "Falling: ",
            format!("{}/{}", state.board.falling().len(), state.board.settings().max_falling),
        ),
    ]))
    .render(stats_inner, frame.buffer_mut());

    // --- Combo ---
    let combo = panel(theme, "Combo");
    let combo_inner = combo.inner(chunks[1]);
    combo.render(chunks[1], frame.buffer_mut());
    let combo_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Length(1)])
        .split(combo_inner);
    Paragraph::new(Line::from(Span::styled(
        format!("x{}", state.combo_multiplier),
        title_style,
    )))
    .render(combo_layout[0], frame.buffer_mut());
    let ratio = (f64::from(state.combo_multiplier.saturating_sub(1)) / 9.0).min(1.0);
    let bar_color = if ratio > 0.6 {
        theme.addition
    } else if ratio > 0.3 {
        theme.division
    } else {
        theme.inactive_fg
    };
    Gauge::default()
        .ratio(ratio)
        .label("")
        .gauge_style(Style::default().fg(bar_color).bg(theme.bg))
        .render(combo_layout[1], frame.buffer_mut());

    // --- Answer ---
    let answer = panel(theme, "Answer");
    let answer_inner = answer.inner(chunks[2]);
    answer.render(chunks[2], frame.buffer_mut());
    let typed = format!("{:<width$}", state.input, width = MAX_INPUT_DIGITS);
    let mut lines = vec![Line::from(vec![
        Span::styled("> ", title_style),
        Span::styled(typed, fg_style.bold().underlined()),
    ])];
    if let Some(miss) = state.last_miss {
        lines.push(Line::from(Span::styled(
            format!("{} matched nothing", miss),
            Style::default().fg(theme.alert),
        )));
    }
    Paragraph::new(lines).render(answer_inner, frame.buffer_mut());

    // --- Time stop ---
    let status = state.board.time_stop_status();
    let total = state.board.settings().time_stop_ms;
    let ratio = if status.active && total > 0.0 {
        f64::from(status.remaining_ms / total).clamp(0.0, 1.0)
    } else {
        0.0
    };
    Gauge::default()
        .block(panel(theme, "Time stop"))
        .ratio(ratio)
        .label(if status.active { "" } else { "off" })
        .gauge_style(Style::default().fg(theme.hint).bg(theme.bg))
        .render(chunks[3], frame.buffer_mut());

    // --- Hints ---
    let hints = panel(theme, "Hints");
    let hints_inner = hints.inner(chunks[4]);
    hints.render(chunks[4], frame.buffer_mut());
    let mut lines: Vec<Line> = state
        .board
        .blocks()
        .filter_map(|b| Some((b.problem()?, b.hint()?, b.hint_phase()?)))
        .flat_map(|(problem, hint, phase)| {
            let hint_color = if phase == FadePhase::FadeOut {
                theme.inactive_fg
            } else {
                theme.hint
            };
            [
                Line::from(vec![
                    Span::styled(problem.expression.clone(), fg_style),
                    Span::styled(" → ", title_style),
                    Span::styled(hint.simplified_expression.clone(), Style::default().fg(hint_color)),
                ]),
                Line::from(Span::styled(
                    hint.explanation.clone(),
                    Style::default().fg(theme.inactive_fg),
                )),
            ]
        })
        .collect();
    if lines.is_empty() {
        lines.push(Line::from(Span::styled(
            "digits: answer  enter: submit",
            Style::default().fg(theme.inactive_fg),
        )));
        lines.push(Line::from(Span::styled(
            "p: pause  q: quit",
            Style::default().fg(theme.inactive_fg),
        )));
    }
    Paragraph::new(lines)
        .wrap(Wrap { trim: true })
        .render(hints_inner, frame.buffer_mut());
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    Rect {
        x: area.x + area.width.saturating_sub(width) / 2,
        y: area.y + area.height.saturating_sub(height) / 2,
        width: width.min(area.width),
        height: height.min(area.height),
    }
}

fn draw_pause_overlay(frame: &mut Frame, theme: &Theme, area: Rect) {
    let popup = centered(area, 28, 5);
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            " Paused ",
            Style::default().fg(Color::Black).bg(theme.title),
        )),
        Line::from(""),
        Line::from(Span::styled(
            " P: Resume    Q: Quit ",
            Style::default().fg(theme.main_fg),
        )),
    ];
    let p = Paragraph::new(lines).alignment(Alignment::Center).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.div_line).bg(theme.bg)),
    );
    p.render(popup, frame.buffer_mut());
}

fn draw_game_over(frame: &mut Frame, state: &GameState, theme: &Theme, area: Rect) {
    let popup = centered(area, 32, 10);
    let fg = Style::default().fg(theme.main_fg);
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            " Game Over ",
            Style::default().fg(Color::White).bg(theme.alert),
        )),
        Line::from(""),
        Line::from(Span::styled(format!(" Score: {} ", state.score), fg)),
        Line::from(Span::styled(format!(" Level: {} ", state.level), fg)),
        Line::from(Span::styled(format!(" Blocks: {} ", state.destroyed), fg)),
        Line::from(""),
        Line::from(Span::styled(" R: Restart  D: Mode  Q: Quit ", fg)),
    ];
    let p = Paragraph::new(lines).alignment(Alignment::Center).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.div_line).bg(theme.bg))
            .title(Span::styled(" Mathtrix ", theme.title)),
    );
    p.render(popup, frame.buffer_mut());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Difficulty, Settings};

    fn render(state: &GameState) -> Buffer {
        let theme = Theme::default();
        let area = Rect::new(0, 0, BOARD_W - 2, BOARD_H - 2);
        let mut buf = Buffer::empty(area);
        BoardWidget { state, theme: &theme }.render(area, &mut buf);
        buf
    }

    fn row_text(buf: &Buffer, y: u16) -> String {
        (0..buf.area.width).map(|x| buf[(x, y)].symbol()).collect()
    }

    fn game_with_landed_block() -> (GameState, i64) {
        let mut settings = Settings::for_difficulty(Difficulty::Easy);
        settings.spawn_interval_ms = 10.0;
        settings.fall_speed = 5000.0;
        settings.hint_chance = 0.0;
        let mut state = GameState::new(settings, 11);
        state.tick(20.0).unwrap();
        state.board.set_spawn_interval(1.0e9);
        for _ in 0..20 {
            state.tick(20.0).unwrap();
        }
        let answer = state.board.landed().next().and_then(|b| b.problem()).map(|p| p.answer);
        (state, answer.unwrap())
    }

    #[test]
    fn landed_block_shows_its_expression() {
        let (state, _) = game_with_landed_block();
        let block = state.board.landed().next().unwrap();
        let buf = render(&state);
        let y = (ROWS as u16 - 1) * CELL_H;
        let expression = &block.problem().unwrap().expression;
        assert!(row_text(&buf, y).contains(expression.as_str()));
    }

    #[test]
    fn matched_block_shows_its_answer() {
        let (mut state, answer) = game_with_landed_block();
        for c in answer.to_string().bytes() {
            state.push_digit(c - b'0');
        }
        state.submit();
        let buf = render(&state);
        let y = (ROWS as u16 - 1) * CELL_H;
        assert!(row_text(&buf, y).contains(&answer.to_string()));
    }

    #[test]
    fn layout_fits_board_and_sidebar() {
        let (board, sidebar) = game_layout(Rect::new(0, 0, 120, 40));
        assert_eq!(board.width, BOARD_W);
        assert_eq!(board.height, BOARD_H);
        assert_eq!(sidebar.x, board.right());
    }
}
