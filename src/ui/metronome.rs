use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph};

use crate::scheduler::{MetronomeState, Side};
use crate::ui::Theme;

/// Render transport status bar
pub fn render_transport(frame: &mut Frame, area: Rect, state: &MetronomeState, theme: &Theme) {
    let status = if state.is_running { "RUN " } else { "STOP" };
    let status_style = if state.is_running {
        Style::default().fg(theme.running).bold()
    } else {
        Style::default().fg(theme.dimmed)
    };
    let separator = || Span::styled(" | ", Style::default().fg(theme.border));

    let measured = if state.measured_rate > 0.0 {
        format!("{:.1}", state.measured_rate)
    } else {
        "--".to_string()
    };

    let mut spans = vec![
        Span::styled(format!(" {} ", status), status_style),
        separator(),
        Span::styled(
            format!("Target: {:3} bpm", state.target_rate),
            Style::default().fg(theme.fg).bold(),
        ),
        separator(),
        Span::styled(
            format!("Measured: {}", measured),
            Style::default().fg(theme.fg),
        ),
        separator(),
        Span::styled(
            format!("Beats: {}", state.beat_count),
            Style::default().fg(theme.fg),
        ),
        separator(),
        Span::styled(
            format!("Vol: {:3}", state.volume),
            Style::default().fg(theme.fg),
        ),
    ];
    if !state.audio_ready {
        spans.push(separator());
        spans.push(Span::styled(
            "NO AUDIO (r to retry)",
            Style::default().fg(theme.warning).bold(),
        ));
    }

    let transport = Paragraph::new(Line::from(spans))
        .style(Style::default().bg(theme.bg))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme.border))
                .style(Style::default().bg(theme.bg)),
        );

    frame.render_widget(transport, area);
}

/// Render the two foot pads, lighting the side of the last beat
pub fn render_pads(frame: &mut Frame, area: Rect, state: &MetronomeState, theme: &Theme) {
    let block = Block::default()
        .title(Span::styled(" Cadence ", Style::default().fg(theme.label)))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.border))
        .style(Style::default().bg(theme.bg));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let halves = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(inner);

    for (side, half) in [(Side::A, halves[0]), (Side::B, halves[1])] {
        let lit = state.is_running && state.current_side == side;
        let style = if lit {
            Style::default().fg(theme.bg).bg(theme.pad_active).bold()
        } else {
            Style::default().fg(theme.pad_idle).bg(theme.bg)
        };
        let pad = Paragraph::new(pad_lines(side, half.height))
            .alignment(Alignment::Center)
            .style(style)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(if lit {
                        theme.highlight
                    } else {
                        theme.dimmed
                    })),
            );
        frame.render_widget(pad, half);
    }
}

/// Pad text vertically centered in a pad of `height` rows
fn pad_lines(side: Side, height: u16) -> Vec<Line<'static>> {
    let padding = height.saturating_sub(3) / 2;
    let mut lines: Vec<Line> = (0..padding).map(|_| Line::from("")).collect();
    lines.push(Line::from(side.label()));
    lines
}

/// Render the key help footer, with an optional transient status message
pub fn render_footer(frame: &mut Frame, area: Rect, status: Option<&str>, theme: &Theme) {
    let text = match status {
        Some(msg) => Line::from(Span::styled(
            format!(" {}", msg),
            Style::default().fg(theme.highlight),
        )),
        None => Line::from(Span::styled(
            " space start/stop | up/down ±1 | left/right ±5 | +/- volume | r audio | q quit",
            Style::default().fg(theme.dimmed),
        )),
    };

    let footer = Paragraph::new(text).style(Style::default().bg(theme.bg)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.border))
            .style(Style::default().bg(theme.bg)),
    );

    frame.render_widget(footer, area);
}

#[cfg(test)]
mod tests {
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;

    use super::*;

    fn rendered(state: &MetronomeState) -> String {
        let backend = TestBackend::new(100, 12);
        let mut terminal = Terminal::new(backend).unwrap();
        let theme = Theme::default();
        terminal
            .draw(|frame| {
                let area = frame.area();
                let rows = Layout::default()
                    .direction(Direction::Vertical)
                    .constraints([Constraint::Length(3), Constraint::Min(6), Constraint::Length(3)])
                    .split(area);
                render_transport(frame, rows[0], state, &theme);
                render_pads(frame, rows[1], state, &theme);
                render_footer(frame, rows[2], None, &theme);
            })
            .unwrap();
        let buffer = terminal.backend().buffer().clone();
        buffer
            .content()
            .iter()
            .map(|cell| cell.symbol().to_string())
            .collect()
    }

    #[test]
    fn transport_shows_rates_and_beats() {
        let state = MetronomeState {
            is_running: true,
            beat_count: 42,
            measured_rate: 171.4,
            audio_ready: true,
            ..MetronomeState::default()
        };
        let screen = rendered(&state);
        assert!(screen.contains("RUN"));
        assert!(screen.contains("Target: 170 bpm"));
        assert!(screen.contains("Measured: 171.4"));
        assert!(screen.contains("Beats: 42"));
        assert!(!screen.contains("NO AUDIO"));
    }

    #[test]
    fn missing_audio_is_flagged() {
        let screen = rendered(&MetronomeState::default());
        assert!(screen.contains("STOP"));
        assert!(screen.contains("Measured: --"));
        assert!(screen.contains("NO AUDIO"));
    }
}
