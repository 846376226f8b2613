//! Rendering of the session screen.
//!
//! ```text
//! ┌ Brewdoro ───────────────────────────┐
//! │ Focus · Write docs                  │
//! │ ┌ cup ────────────────────────────┐ │
//! │ │█████████████████ 16:40          │ │
//! │ └─────────────────────────────────┘ │
//! │ Pomodoro 2 of 4 · next break 5 min  │
//! │ Break for 5 min                     │
//! │ p pause  r resume  c complete  ...  │
//! └─────────────────────────────────────┘
//! ```
//!
//! The cup drains during focus and fills up again during the break.

use ratatui::{
    layout::{Constraint, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph},
    Frame,
};

use crate::runner::View;
use crate::timer::{format_clock, Phase};

const KEY_HELP: &str = "p pause  r resume  c complete  f retry finish  q quit";

fn phase_color(phase: Phase) -> Color {
    match phase {
        Phase::Focus => Color::Rgb(176, 112, 56),
        Phase::Break => Color::Green,
        Phase::Paused => Color::Yellow,
        Phase::Idle => Color::DarkGray,
    }
}

/// Draws the whole screen for `view`.
pub fn render(frame: &mut Frame, view: &View<'_>) {
    let outer = Block::default().borders(Borders::ALL).title(" Brewdoro ");
    let inner = outer.inner(frame.area());
    frame.render_widget(outer, frame.area());

    let [status, cup, cycle, notice, help] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Length(3),
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Min(1),
    ])
    .areas(inner);

    let timer = view.timer;
    let phase = timer.phase();

    let mut spans = vec![Span::styled(
        phase.to_string(),
        Style::default()
            .fg(phase_color(phase))
            .add_modifier(Modifier::BOLD),
    )];
    if !timer.task_title().is_empty() {
        spans.push(Span::raw(format!(" · {}", timer.task_title())));
    }
    if view.pending > 0 {
        spans.push(Span::styled(
            " (waiting for server)",
            Style::default().fg(Color::DarkGray),
        ));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), status);

    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title(" cup "))
        .gauge_style(Style::default().fg(phase_color(phase)))
        .ratio(timer.progress().clamp(0.0, 1.0))
        .label(format_clock(timer.remaining_seconds()));
    frame.render_widget(gauge, cup);

    if let Some(info) = view.context.last_cycle {
        let text = format!(
            "Pomodoro {} of cycle · {} total · next break {} min{}",
            info.index_in_cycle,
            info.total_pomodoros,
            info.next_break_minutes,
            if info.is_cycle_end { " · cycle done" } else { "" }
        );
        frame.render_widget(Paragraph::new(text), cycle);
    }

    if let Some(text) = view.notice {
        frame.render_widget(
            Paragraph::new(text).style(Style::default().fg(Color::Cyan)),
            notice,
        );
    }

    frame.render_widget(
        Paragraph::new(KEY_HELP).style(Style::default().fg(Color::DarkGray)),
        help,
    );
}
