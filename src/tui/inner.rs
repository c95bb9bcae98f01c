// src/tui/inner.rs  -  ratatui layout
use super::form::{Field, Form};
use crate::pedal::{ModifierKey, Slot};
use crate::serial::ReaderState;
use crate::AppState;
use anyhow::Result;
use crossterm::{execute, terminal::{self, EnterAlternateScreen, LeaveAlternateScreen}};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame, Terminal,
};
use std::io::stdout;

pub struct Tui {
    terminal: Terminal<CrosstermBackend<std::io::Stdout>>,
}

impl Tui {
    pub fn new() -> Result<Self> {
        terminal::enable_raw_mode()?;
        let mut out = stdout();
        execute!(out, EnterAlternateScreen)?;
        let backend  = CrosstermBackend::new(out);
        let terminal = Terminal::new(backend)?;
        Ok(Self { terminal })
    }

    pub fn cleanup(&mut self) {
        let _ = terminal::disable_raw_mode();
        let _ = execute!(self.terminal.backend_mut(), LeaveAlternateScreen);
    }

    pub fn draw(&mut self, s: &AppState, form: &Form) -> Result<()> {
        self.terminal.draw(|f| {
            let area = f.area();
            let port_rows = s.ports.len().max(1) as u16 + 2;
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([
                    Constraint::Length(1),          // title bar
                    Constraint::Length(port_rows),  // port selector
                    Constraint::Length(4),          // open toggle + history
                    Constraint::Min(9),             // pedal columns
                    Constraint::Length(2),          // footer hints + status
                ])
                .split(area);

            // ── Title ─────────────────────────────────────────────────────
            let link = match &s.reader {
                Some((port, state)) => format!("{port} {}", reader_label(*state)),
                None => "closed".to_string(),
            };
            let title = Paragraph::new(format!(
                " Pedal Setup  |  {link}  |  injector: {}  |  poll: {} ms",
                s.injector, s.interval_ms
            ))
            .style(Style::default().fg(Color::Black).bg(Color::Cyan).add_modifier(Modifier::BOLD));
            f.render_widget(title, chunks[0]);

            draw_ports(f, chunks[1], s, form);
            draw_link(f, chunks[2], s, form);

            // ── Pedals ────────────────────────────────────────────────────
            let cols = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
                .split(chunks[3]);
            draw_pedal(f, cols[0], Slot::Left, form);
            draw_pedal(f, cols[1], Slot::Right, form);

            // ── Footer ────────────────────────────────────────────────────
            let footer = Paragraph::new(vec![
                Line::from(Span::styled(
                    " Tab/↑↓ = field   ←→ = choose   Space/Enter = toggle/apply   Esc = quit",
                    Style::default().fg(Color::DarkGray),
                )),
                Line::from(Span::styled(format!(" {}", s.status), Style::default().fg(Color::Magenta))),
            ]);
            f.render_widget(footer, chunks[4]);

            if let Some(n) = &s.notice {
                let popup = centered(area, 56, 5);
                f.render_widget(Clear, popup);
                let body = Paragraph::new(n.message.clone())
                    .wrap(Wrap { trim: true })
                    .block(Block::default()
                        .title(format!(" {} ", n.title))
                        .borders(Borders::ALL)
                        .border_style(Style::default().fg(Color::Yellow)));
                f.render_widget(body, popup);
            }
        })?;
        Ok(())
    }
}

fn reader_label(state: ReaderState) -> &'static str {
    match state {
        ReaderState::Running => "listening",
        ReaderState::Paused  => "sending",
        ReaderState::Stopped => "stopped",
    }
}

fn focus_style(focused: bool) -> Style {
    if focused {
        Style::default().fg(Color::Black).bg(Color::Yellow)
    } else {
        Style::default().fg(Color::White)
    }
}

fn label(text: &str) -> Span<'static> {
    Span::styled(format!("{text:<10}"), Style::default().fg(Color::DarkGray))
}

fn draw_ports(f: &mut Frame, area: Rect, s: &AppState, form: &Form) {
    let focused = form.focus() == Field::Port;
    let lines: Vec<Line> = if s.ports.is_empty() {
        vec![Line::from(Span::styled("No serial ports found.", Style::default().fg(Color::Red)))]
    } else {
        s.ports.iter().enumerate().map(|(i, p)| {
            let selected = form.port() == Some(i);
            let mark = if selected { "(•) " } else { "( ) " };
            Line::from(Span::styled(format!("{mark}{}", p.label()), focus_style(focused && selected)))
        }).collect()
    };
    let block = Block::default()
        .title(" COM port ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if focused { Color::Yellow } else { Color::Green }));
    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_link(f: &mut Frame, area: Rect, s: &AppState, form: &Form) {
    let box_mark = if s.open { "[X]" } else { "[ ]" };
    let toggle_style = if form.port().is_none() {
        Style::default().fg(Color::DarkGray)
    } else {
        focus_style(form.focus() == Field::Open)
    };
    let lines = vec![
        Line::from(Span::styled(format!("{box_mark} Open connection"), toggle_style)),
        Line::from(vec![label("History:"), Span::styled(s.history_text(), Style::default().fg(Color::Cyan))]),
    ];
    let block = Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Green));
    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_pedal(f: &mut Frame, area: Rect, slot: Slot, form: &Form) {
    let focus = form.focus();
    let mods_focused = focus == Field::Modifiers(slot);
    let mut lines = vec![
        Line::from(vec![
            label("Trigger:"),
            Span::styled(form.trigger_text(slot).to_string(), focus_style(focus == Field::Trigger(slot))),
        ]),
        Line::from(label("Modifiers:")),
    ];
    for (i, m) in ModifierKey::ALL.iter().enumerate() {
        let on   = form.modifiers(slot).contains(m);
        let mark = if on { "[X]" } else { "[ ]" };
        let at_cursor = mods_focused && form.mod_cursor(slot) == i;
        lines.push(Line::from(Span::styled(
            format!("  {mark} {}", m.label().to_uppercase()),
            focus_style(at_cursor),
        )));
    }
    lines.push(Line::from(vec![
        label("Key:"),
        Span::styled(form.key_text(slot).to_string(), focus_style(focus == Field::Key(slot))),
    ]));

    let title = match slot {
        Slot::Left  => " Left pedal ",
        Slot::Right => " Right pedal ",
    };
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow));
    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let w = width.min(area.width);
    let h = height.min(area.height);
    Rect {
        x: area.x + (area.width - w) / 2,
        y: area.y + (area.height - h) / 2,
        width: w,
        height: h,
    }
}
