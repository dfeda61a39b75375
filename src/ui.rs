use chrono::Local;
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Clear, Paragraph, Widget, Wrap},
};
use unicode_width::UnicodeWidthStr;

use crate::{
    app::{App, AppState},
    feedback::Feedback,
    game::{GameState, RoundOutcome},
    ranking::{classify_time, RankingEntry, Rankings, MAX_RANKINGS},
};

const HORIZONTAL_MARGIN: u16 = 2;
const VERTICAL_MARGIN: u16 = 1;
const RANKINGS_WIDTH: u16 = 36;

pub const FALSE_START_MESSAGE: &str = "False start! Wait for the cue.";

/// One leaderboard row as plain text
pub fn format_entry(rank: usize, entry: &RankingEntry, show_dates: bool) -> String {
    let row = format!("#{:<2} {:>6}ms", rank, entry.time_ms);
    if show_dates {
        format!(
            "{}  {}",
            row,
            entry.achieved_at.with_timezone(&Local).format("%Y-%m-%d")
        )
    } else {
        row
    }
}

/// Plain-text leaderboard for non-interactive output
pub fn rankings_table(rankings: &Rankings, show_dates: bool) -> String {
    if rankings.is_empty() {
        return "No records yet".to_string();
    }
    rankings
        .iter()
        .enumerate()
        .map(|(i, e)| format_entry(i + 1, e, show_dates))
        .collect::<Vec<_>>()
        .join("\n")
}

fn state_color(state: GameState) -> Color {
    match state {
        GameState::Idle => Color::Gray,
        GameState::Waiting => Color::Red,
        GameState::Ready => Color::Green,
        GameState::Finished => Color::Cyan,
    }
}

fn flash_color(feedback: Feedback) -> Color {
    match feedback {
        Feedback::RoundStart => Color::Yellow,
        Feedback::CueShown => Color::LightGreen,
        Feedback::Reaction(_) => Color::Magenta,
        Feedback::FalseStart => Color::LightRed,
    }
}

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let bold_style = Style::default().add_modifier(Modifier::BOLD);
        let italic_style = Style::default().add_modifier(Modifier::ITALIC);

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .vertical_margin(VERTICAL_MARGIN)
            .constraints([
                Constraint::Length(1), // title
                Constraint::Min(5),    // game + rankings
                Constraint::Length(1), // legend
            ])
            .split(area);

        Paragraph::new(Span::styled("flinch", bold_style.fg(Color::Cyan)))
            .alignment(Alignment::Center)
            .render(rows[0], buf);

        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(20), Constraint::Length(RANKINGS_WIDTH)])
            .split(rows[1]);

        render_game_area(self, columns[0], buf);
        render_rankings(self, columns[1], buf);

        let legend = match (self.state, self.game.state()) {
            (AppState::ConfirmClear, _) => "(y)es / (n)o",
            (_, GameState::Idle) => "(space) start / (c)lear / (esc)ape",
            (_, GameState::Waiting) | (_, GameState::Ready) => "(space) react / (r)eset / (esc)ape",
            (_, GameState::Finished) => "(space) retry / (r)eset / (c)lear / (esc)ape",
        };
        Paragraph::new(Span::styled(legend, italic_style)).render(rows[2], buf);

        if self.state == AppState::ConfirmClear {
            render_confirm(area, buf);
        }
    }
}

fn render_game_area(app: &App, area: Rect, buf: &mut Buffer) {
    let state = app.game.state();
    let color = app
        .feedback
        .active_flash()
        .map(flash_color)
        .unwrap_or_else(|| state_color(state));

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(color))
        .title(format!(" {} ", state));
    let inner = block.inner(area);
    block.render(area, buf);

    let bold = Style::default().add_modifier(Modifier::BOLD);
    let lines: Vec<Line> = match state {
        GameState::Idle => {
            let mut lines = vec![];
            if app.game.outcome() == Some(RoundOutcome::FalseStart) {
                lines.push(Line::from(Span::styled(
                    FALSE_START_MESSAGE,
                    bold.fg(Color::LightRed),
                )));
                lines.push(Line::default());
            }
            lines.push(Line::from("Press space when you are ready"));
            lines
        }
        GameState::Waiting => vec![
            Line::from(Span::styled("Wait for it...", bold.fg(Color::Red))),
            Line::from(Span::styled(
                "Pressing too early is a false start",
                Style::default().add_modifier(Modifier::DIM),
            )),
        ],
        GameState::Ready => vec![Line::from(Span::styled(
            "NOW! Hit space!",
            bold.fg(Color::Black).bg(Color::Green),
        ))],
        GameState::Finished => match app.game.reaction_time_ms() {
            Some(ms) => {
                let rating = classify_time(ms);
                let mut lines = vec![
                    Line::from(Span::styled(format!("{}ms", ms), bold.fg(Color::Cyan))),
                    Line::from(rating.message()),
                ];
                match app.game.current_rank() {
                    Some(1) => lines.push(Line::from(Span::styled(
                        "New best!",
                        bold.fg(Color::Yellow),
                    ))),
                    Some(rank) => lines.push(Line::from(format!("Ranked #{}", rank))),
                    None => {}
                }
                lines
            }
            None => vec![Line::from(FALSE_START_MESSAGE)],
        },
    };

    let top_pad = inner.height.saturating_sub(lines.len() as u16) / 2;
    let body = Rect {
        y: inner.y + top_pad,
        height: inner.height.saturating_sub(top_pad),
        ..inner
    };
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .render(body, buf);

    if state == GameState::Ready {
        buf.set_style(inner, Style::default().bg(Color::Green));
    }
}

fn render_rankings(app: &App, area: Rect, buf: &mut Buffer) {
    let rankings = app.game.rankings();
    let title = match rankings.best() {
        Some(best) => format!(" Top {} · best {}ms ", MAX_RANKINGS, best.time_ms),
        None => format!(" Top {} ", MAX_RANKINGS),
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .title(title);
    let inner = block.inner(area);
    block.render(area, buf);

    let lines: Vec<Line> = if rankings.is_empty() {
        vec![Line::from(Span::styled(
            "No records yet",
            Style::default().add_modifier(Modifier::DIM),
        ))]
    } else {
        rankings
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                let text = format_entry(i + 1, entry, app.config.show_dates);
                if app.game.current_rank() == Some(i + 1) {
                    Line::from(Span::styled(
                        text,
                        Style::default()
                            .fg(Color::Yellow)
                            .add_modifier(Modifier::BOLD),
                    ))
                } else {
                    Line::from(text)
                }
            })
            .collect()
    };

    Paragraph::new(lines).render(inner, buf);
}

fn render_confirm(area: Rect, buf: &mut Buffer) {
    let question = "Clear all rankings? (y/n)";
    let width = (question.width() as u16 + 4).min(area.width);
    let height = 3.min(area.height);
    let popup = Rect {
        x: area.x + area.width.saturating_sub(width) / 2,
        y: area.y + area.height.saturating_sub(height) / 2,
        width,
        height,
    };

    Clear.render(popup, buf);
    Paragraph::new(Span::styled(
        question,
        Style::default().add_modifier(Modifier::BOLD),
    ))
    .alignment(Alignment::Center)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow)),
    )
    .render(popup, buf);
}
