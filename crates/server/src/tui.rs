//! Operational console (§10 "TUI console shape"): a read-only ratatui dashboard
//! over [`ServerStats`]/[`ClientInfo`], redrawn once per tick alongside the plain
//! log output. No input routes through here beyond quit — the dashboard observes,
//! it doesn't control.

use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Gauge, Paragraph, Row, Table};

use crate::server::{ClientInfo, ServerStats};

pub fn render(frame: &mut Frame, stats: ServerStats, clients: &[ClientInfo]) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(6),
            Constraint::Length(6),
            Constraint::Length(3),
        ])
        .split(frame.area());

    render_header(frame, chunks[0], &stats);
    render_capacity(frame, chunks[1], &stats);
    render_players(frame, chunks[2], clients);
    render_anticheat(frame, chunks[3], clients);
    render_help(frame, chunks[4]);
}

fn render_header(frame: &mut Frame, area: Rect, stats: &ServerStats) {
    let uptime = format_duration(stats.uptime_secs);
    let title = format!(" Keepwatch Server — uptime {uptime} ");

    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let text = format!(
        "Tick: {}  |  Clients: {}/{}  |  Entities: {}",
        stats.tick, stats.client_count, stats.max_clients, stats.entity_count
    );

    let paragraph = Paragraph::new(text)
        .block(block)
        .style(Style::default().fg(Color::White));

    frame.render_widget(paragraph, area);
}

fn render_capacity(frame: &mut Frame, area: Rect, stats: &ServerStats) {
    let block = Block::default()
        .title(" Capacity ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Green));

    let ratio = if stats.max_clients == 0 {
        0.0
    } else {
        stats.client_count as f64 / stats.max_clients as f64
    };
    let gauge = Gauge::default()
        .block(block)
        .gauge_style(Style::default().fg(Color::Green))
        .ratio(ratio.min(1.0))
        .label(format!("{}/{} players", stats.client_count, stats.max_clients));

    frame.render_widget(gauge, area);
}

/// §4.8/§4.2: one row per connected player (id, class, level, hp) — the fields the
/// delta compressor guarantees are critical, surfaced operator-side too.
fn render_players(frame: &mut Frame, area: Rect, clients: &[ClientInfo]) {
    let block = Block::default()
        .title(" Players ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow));

    let rows = clients.iter().map(|c| {
        let class = c.class.map(|cl| cl.slug()).unwrap_or("-");
        Row::new(vec![
            c.client_id.to_string(),
            c.name.clone(),
            c.addr.clone(),
            class.to_string(),
            c.level.to_string(),
            format!("{}/{}", c.hp, c.max_hp),
        ])
    });

    let widths = [
        Constraint::Length(6),
        Constraint::Length(16),
        Constraint::Length(21),
        Constraint::Length(12),
        Constraint::Length(6),
        Constraint::Length(10),
    ];

    let table = Table::new(rows, widths)
        .header(
            Row::new(vec!["id", "name", "addr", "class", "lvl", "hp"])
                .style(Style::default().add_modifier(Modifier::BOLD)),
        )
        .block(block);

    frame.render_widget(table, area);
}

/// §4.10: violation counts per player, so an operator can spot a player approaching
/// the kick threshold without waiting for the kick itself to hit the logs.
fn render_anticheat(frame: &mut Frame, area: Rect, clients: &[ClientInfo]) {
    let block = Block::default()
        .title(" Anti-Cheat ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red));

    let lines: Vec<Line> = clients
        .iter()
        .filter(|c| c.violations > 0)
        .map(|c| {
            Line::from(vec![
                Span::styled(format!("{:>4} ", c.client_id), Style::default().fg(Color::Gray)),
                Span::styled(
                    format!("{} violations", c.violations),
                    Style::default().fg(if c.violations >= 15 { Color::Red } else { Color::Yellow }),
                ),
            ])
        })
        .collect();

    let lines = if lines.is_empty() {
        vec![Line::from(Span::styled(
            "no violations recorded",
            Style::default().fg(Color::DarkGray),
        ))]
    } else {
        lines
    };

    let paragraph = Paragraph::new(lines).block(block);
    frame.render_widget(paragraph, area);
}

fn render_help(frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .title(" Controls ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));

    let text = Paragraph::new("Press 'q' or ESC to quit")
        .block(block)
        .style(
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::ITALIC),
        );

    frame.render_widget(text, area);
}

fn format_duration(secs: u64) -> String {
    let hours = secs / 3600;
    let mins = (secs % 3600) / 60;
    let secs = secs % 60;
    format!("{hours:02}:{mins:02}:{secs:02}")
}
