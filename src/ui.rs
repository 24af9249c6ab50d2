pub mod charting;

use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Axis, Chart, Dataset, GraphType, Paragraph, Widget, Wrap},
};

use crate::clock::Phase;
use crate::games::{GameKind, SwitchRule};
use crate::keymap::KeyMap;
use crate::scheduler::Millis;
use crate::session::{Completion, SessionResult, SessionSnapshot};
use crate::trial::{Stimulus, Trial, TrialOutcome, Verdict};

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 2;

/// Live screen for one running session
pub struct PlayView<'a> {
    pub game: GameKind,
    pub phase: Phase,
    pub trial: Option<&'a Trial>,
    /// Time spent in the current phase
    pub in_phase_ms: Millis,
    pub snapshot: Option<SessionSnapshot>,
    pub last: Option<&'a TrialOutcome>,
    pub keymap: &'a KeyMap,
}

/// Summary screen shown after the session ends
pub struct ResultView<'a> {
    pub result: &'a SessionResult,
}

fn bold() -> Style {
    Style::default().add_modifier(Modifier::BOLD)
}

fn dim_bold() -> Style {
    bold().add_modifier(Modifier::DIM)
}

impl Widget for &PlayView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let body = self.body();
        let body_height = body.len() as u16;
        let gap = area.height.saturating_sub(body_height + 4) / 2;

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .constraints([
                Constraint::Length(1), // hud
                Constraint::Length(gap),
                Constraint::Length(body_height),
                Constraint::Min(0),
                Constraint::Length(1), // typed answer
                Constraint::Length(1), // key help
            ])
            .split(area);

        Paragraph::new(Span::styled(self.hud(), dim_bold()))
            .alignment(Alignment::Center)
            .render(chunks[0], buf);

        Paragraph::new(body)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: false })
            .render(chunks[2], buf);

        if self.keymap.is_typed() && self.phase == Phase::AwaitingResponse {
            Paragraph::new(Line::from(vec![
                Span::styled("> ", dim_bold()),
                Span::styled(self.keymap.buffer().to_string(), bold()),
                Span::styled("_", dim_bold().add_modifier(Modifier::SLOW_BLINK)),
            ]))
            .alignment(Alignment::Center)
            .render(chunks[4], buf);
        }

        Paragraph::new(Span::styled(
            format!("{}   (esc)ape", self.keymap.help()),
            Style::default().add_modifier(Modifier::ITALIC),
        ))
        .alignment(Alignment::Center)
        .render(chunks[5], buf);
    }
}

impl PlayView<'_> {
    fn hud(&self) -> String {
        match self.snapshot {
            Some(s) => format!(
                "{}   level {}   trial {}   score {}   {:.0}% acc",
                self.game,
                s.level,
                s.trial.map_or(0, |t| t + 1),
                s.metrics.score,
                s.metrics.accuracy * 100.0
            ),
            None => self.game.to_string(),
        }
    }

    fn body(&self) -> Vec<Line<'static>> {
        let Some(trial) = self.trial else {
            return vec![Line::from("")];
        };
        match self.phase {
            Phase::Countdown => vec![Line::styled(
                "get ready",
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD | Modifier::ITALIC),
            )],
            Phase::Presenting => self.presenting(trial),
            Phase::AwaitingResponse => self.awaiting(trial),
            Phase::Feedback => feedback_lines(self.last),
            Phase::Idle | Phase::Ended => vec![Line::from("")],
        }
    }

    fn presenting(&self, trial: &Trial) -> Vec<Line<'static>> {
        match &trial.stimulus {
            Stimulus::Digits { digits, .. } => vec![Line::styled(spaced(digits), bold())],
            Stimulus::Signal { .. } => vec![Line::styled("wait for it", dim_bold())],
            Stimulus::WordStream { words, wpm, .. } => {
                let per_word = 60_000 / u64::from((*wpm).max(1));
                let idx = (self.in_phase_ms / per_word.max(1)) as usize;
                let word = words
                    .get(idx.min(words.len().saturating_sub(1)))
                    .cloned()
                    .unwrap_or_default();
                vec![Line::styled(word, bold())]
            }
            Stimulus::Pattern { size, lit } => {
                grid_lines(*size, |cell| {
                    if lit.contains(&cell) {
                        Span::styled(" ■ ", Style::default().fg(Color::Cyan))
                    } else {
                        Span::styled(" □ ", dim_bold())
                    }
                })
            }
            _ => stimulus_lines(trial),
        }
    }

    fn awaiting(&self, trial: &Trial) -> Vec<Line<'static>> {
        match &trial.stimulus {
            Stimulus::Digits { backward, .. } => vec![Line::styled(
                if *backward {
                    "type the digits backward"
                } else {
                    "type the digits"
                },
                dim_bold(),
            )],
            Stimulus::Signal { .. } => vec![Line::styled(
                "NOW",
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
            )],
            Stimulus::WordStream { choices, .. } => {
                let mut lines = vec![Line::styled("which word was shown?", dim_bold())];
                lines.extend(
                    choices
                        .iter()
                        .enumerate()
                        .map(|(i, c)| Line::styled(format!("({}) {c}", i + 1), bold())),
                );
                lines
            }
            Stimulus::Pattern { size, .. } => {
                grid_lines(*size, |cell| Span::styled(format!("{:>3}", cell + 1), dim_bold()))
            }
            _ => stimulus_lines(trial),
        }
    }
}

/// Stimuli that stay on screen while the answer window is open
fn stimulus_lines(trial: &Trial) -> Vec<Line<'static>> {
    match &trial.stimulus {
        Stimulus::Symbol { symbol, n } => vec![
            Line::styled(format!("{n}-back"), dim_bold()),
            Line::styled(symbol.to_string(), bold()),
        ],
        Stimulus::RuleDigit { digit, rule } => vec![
            Line::styled(
                match rule {
                    SwitchRule::Parity => "odd or even?",
                    SwitchRule::Magnitude => "low or high?",
                },
                dim_bold(),
            ),
            Line::styled(digit.to_string(), bold()),
        ],
        Stimulus::ColorWord { word, ink } => vec![Line::styled(
            word.to_uppercase(),
            bold().fg(ink_color(ink)),
        )],
        Stimulus::SearchGrid { size, targets } => grid_lines(*size, |cell| {
            let glyph = if targets.contains(&cell) { 'O' } else { 'Q' };
            Span::styled(format!("{:>3}{glyph}", cell + 1), bold())
        }),
        Stimulus::Digits { digits, .. } => vec![Line::styled(spaced(digits), bold())],
        Stimulus::Signal { .. } => vec![Line::styled("wait for it", dim_bold())],
        Stimulus::WordStream { words, .. } => vec![Line::styled(words.join(" "), bold())],
        Stimulus::Pattern { size, .. } => grid_lines(*size, |_| Span::styled(" □ ", dim_bold())),
    }
}

fn feedback_lines(last: Option<&TrialOutcome>) -> Vec<Line<'static>> {
    let Some(outcome) = last else {
        return vec![Line::from("")];
    };
    let (text, color) = match outcome.verdict {
        Verdict::Correct => ("correct", Color::Green),
        Verdict::Incorrect => ("wrong", Color::Red),
        Verdict::Timeout => ("too slow", Color::Yellow),
        Verdict::FalseStart => ("too early", Color::Red),
    };
    let mut lines = vec![Line::styled(text, bold().fg(color))];
    if let Some(ms) = outcome.latency_ms {
        lines.push(Line::styled(format!("{ms} ms   {:+} pts", outcome.points), dim_bold()));
    }
    lines
}

fn grid_lines(size: usize, cell: impl Fn(usize) -> Span<'static>) -> Vec<Line<'static>> {
    (0..size)
        .map(|row| Line::from((0..size).map(|col| cell(row * size + col)).collect::<Vec<_>>()))
        .collect()
}

fn spaced(digits: &[u8]) -> String {
    digits
        .iter()
        .map(u8::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Terminal color for a color name, Spanish or English
pub fn ink_color(name: &str) -> Color {
    match name.trim().to_lowercase().as_str() {
        "rojo" | "red" => Color::Red,
        "azul" | "blue" => Color::Blue,
        "verde" | "green" => Color::Green,
        "amarillo" | "yellow" => Color::Yellow,
        "morado" | "purple" | "magenta" => Color::Magenta,
        "naranja" | "orange" => Color::Rgb(255, 165, 0),
        "blanco" | "white" => Color::White,
        _ => Color::Gray,
    }
}

impl Widget for &ResultView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let result = self.result;
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .vertical_margin(VERTICAL_MARGIN)
            .constraints([
                Constraint::Min(1),    // chart
                Constraint::Length(1), // stats
                Constraint::Length(1), // completion
                Constraint::Length(1), // padding
                Constraint::Length(1), // legend
            ])
            .split(area);

        let tuples: Vec<(f64, f64)> = result
            .difficulty_trace
            .iter()
            .copied()
            .map(Into::into)
            .collect();
        let (duration, highest) =
            charting::compute_chart_params(&tuples, result.elapsed_ms as f64 / 1_000.0);
        let datasets = vec![Dataset::default()
            .marker(ratatui::symbols::Marker::Braille)
            .style(Style::default().fg(Color::Magenta))
            .graph_type(GraphType::Line)
            .data(&tuples)];
        Chart::new(datasets)
            .x_axis(
                Axis::default()
                    .title("seconds")
                    .bounds([0.0, duration])
                    .labels(vec![
                        Span::styled("0", bold()),
                        Span::styled(charting::format_label(duration), bold()),
                    ]),
            )
            .y_axis(
                Axis::default()
                    .title("level")
                    .bounds([0.0, highest])
                    .labels(vec![
                        Span::styled("0", bold()),
                        Span::styled(charting::format_label(highest), bold()),
                    ]),
            )
            .render(chunks[0], buf);

        let m = &result.metrics;
        let mut stats = format!(
            "{}/{} correct   {:.0}% acc   score {}   level {}",
            m.correct,
            m.attempted,
            m.accuracy * 100.0,
            result.score,
            result.final_level
        );
        if let Some(avg) = m.avg_response_ms {
            stats.push_str(&format!("   {avg:.0} ms avg"));
        }
        Paragraph::new(Span::styled(stats, bold()))
            .alignment(Alignment::Center)
            .render(chunks[1], buf);

        let how = match result.completion {
            Completion::Completed => "completed",
            Completion::DurationElapsed => "time up",
            Completion::Aborted => "aborted",
        };
        Paragraph::new(Span::styled(
            format!("{} · {how}", result.game),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::ITALIC),
        ))
        .alignment(Alignment::Center)
        .render(chunks[2], buf);

        Paragraph::new(Span::styled(
            "(r)etry / (esc)ape",
            Style::default().add_modifier(Modifier::ITALIC),
        ))
        .render(chunks[4], buf);
    }
}
