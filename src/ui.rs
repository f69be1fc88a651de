//! Terminal UI rendering.
//!
//! All drawing logic lives here, separated from dashboard state ([`App`])
//! and input handling ([`crate::input`]).  Rendering is a pure function of
//! the state and the current instant.
//!
//! ## Layout
//!
//! ```text
//! ┌ offline banner (only while offline) ┐
//! │ local weather card                  │
//! │ world clocks                        │
//! │ rotating weather card · countdown   │
//! │ headlines · countdown               │
//! └ status bar                          ┘
//! ```

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
    Frame,
};

use crate::app::{App, WeatherSlot};
use crate::config::ClockFormat;
use crate::pipeline::Status;

/// Draw the complete UI for one frame.
pub fn draw(app: &App, frame: &mut Frame, now: DateTime<Utc>) {
    let banner_height = u16::from(app.connectivity.is_offline());
    let [banner, local, clocks, weather, news, status] = Layout::vertical([
        Constraint::Length(banner_height),
        Constraint::Length(3),
        Constraint::Length(3),
        Constraint::Length(5),
        Constraint::Min(3),
        Constraint::Length(1),
    ])
    .areas(frame.area());

    if app.connectivity.is_offline() {
        draw_offline_banner(frame, banner);
    }
    draw_local(app, frame, local);
    draw_clocks(app, frame, clocks, now);
    draw_weather_card(app, frame, weather, now);
    draw_headlines(app, frame, news, now);
    draw_status_bar(app, frame, status);
}

fn draw_offline_banner(frame: &mut Frame, area: Rect) {
    let style = Style::default()
        .fg(Color::Black)
        .bg(Color::Yellow)
        .add_modifier(Modifier::BOLD);
    let text = " OFFLINE · showing cached data";
    frame.render_widget(Paragraph::new(text).style(style), area);
}

fn draw_local(app: &App, frame: &mut Frame, area: Rect) {
    let block = Block::default().title(" Local ").borders(Borders::ALL);
    let summary = Paragraph::new(weather_summary(&app.local)).block(block);
    frame.render_widget(summary, area);
}

/// One clock per city; the active rotating city is highlighted.
fn draw_clocks(app: &App, frame: &mut Frame, area: Rect, now: DateTime<Utc>) {
    let active = app.active_weather().map(|slot| &slot.key);

    let local_time = clock(&app.local.timezone, now, app.clock_format);
    let mut spans = vec![Span::styled(
        format!(" {} {local_time} ", app.local.label),
        Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::BOLD),
    )];
    for city in &app.cities {
        let style = if active == Some(&city.key) {
            Style::default().fg(Color::Black).bg(Color::Cyan)
        } else {
            Style::default().fg(Color::Gray)
        };
        let time = clock(&city.timezone, now, app.clock_format);
        spans.push(Span::raw(" "));
        spans.push(Span::styled(format!(" {} {time} ", city.label), style));
    }

    let block = Block::default().title(" Clocks ").borders(Borders::ALL);
    frame.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}

fn draw_weather_card(app: &App, frame: &mut Frame, area: Rect, now: DateTime<Utc>) {
    let countdown = app.weather_rotation.countdown_secs;
    let title = format!(" Weather · next in {countdown}s ");
    let block = Block::default().title(title).borders(Borders::ALL);

    let lines = match app.active_weather() {
        Some(slot) => {
            let mut lines = vec![Line::from(Span::styled(
                slot.label.clone(),
                Style::default().add_modifier(Modifier::BOLD),
            ))];
            lines.push(weather_summary(slot));
            if let Some(payload) = &slot.card.value {
                lines.push(Line::from(Span::styled(
                    format!("updated {}", ago(payload.updated_at, now)),
                    Style::default().fg(Color::DarkGray),
                )));
            }
            lines
        }
        None => vec![Line::from("No cities configured")],
    };

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_headlines(app: &App, frame: &mut Frame, area: Rect, now: DateTime<Utc>) {
    let status = app.news.status;
    let countdown = app.headline_rotation.countdown_secs;
    let title = format!(" Headlines · {status} · next in {countdown}s ");
    let block = Block::default().title(title).borders(Borders::ALL);

    if app.headlines().is_empty() {
        let placeholder = match app.news.status {
            Status::Loading => "Loading headlines…",
            _ => "Headlines unavailable",
        };
        let placeholder = Span::styled(placeholder, Style::default().fg(Color::DarkGray));
        frame.render_widget(Paragraph::new(placeholder).block(block), area);
        return;
    }

    let items: Vec<ListItem> = app
        .headlines()
        .iter()
        .map(|item| {
            let meta = match item.time {
                Some(time) => format!("{} · {}", item.source, ago(time, now)),
                None => item.source.clone(),
            };
            ListItem::new(Line::from(vec![
                Span::styled(&item.title, Style::default().fg(Color::White)),
                Span::raw("  "),
                Span::styled(meta, Style::default().fg(Color::Cyan)),
            ]))
        })
        .collect();

    let highlight = Style::default()
        .add_modifier(Modifier::BOLD)
        .bg(Color::DarkGray);
    let list = List::new(items)
        .block(block)
        .highlight_style(highlight)
        .highlight_symbol("▸ ");

    let selected = app.headline_rotation.active();
    let mut state = ListState::default().with_selected(selected);
    frame.render_stateful_widget(list, area, &mut state);
}

/// Render the bottom status bar.
fn draw_status_bar(app: &App, frame: &mut Frame, area: Rect) {
    let status = Paragraph::new(Line::from(vec![
        Span::styled(" ", Style::default()),
        Span::styled(&app.status, Style::default().fg(Color::Yellow)),
        Span::raw("  q: quit  r: refresh"),
    ]));
    frame.render_widget(status, area);
}

/// `"12°C Overcast  H 14° L 8°  [live]"`, or the bare status without data.
fn weather_summary(slot: &WeatherSlot) -> Line<'static> {
    let status = slot.card.status;
    let status = Span::styled(format!("[{status}]"), status_style(status));

    let Some(payload) = &slot.card.value else {
        return Line::from(vec![status]);
    };

    let label = payload.category().label();
    let mut text = format!("{:.0}°C {label}", payload.temperature);
    if let (Some(hi), Some(lo)) = (payload.hi, payload.lo) {
        text.push_str(&format!("  H {hi:.0}° L {lo:.0}°"));
    }
    Line::from(vec![Span::raw(text), Span::raw("  "), status])
}

fn status_style(status: Status) -> Style {
    let color = match status {
        Status::Live => Color::Green,
        Status::Cached => Color::Yellow,
        Status::Error => Color::Red,
        Status::Loading | Status::NeedsCity => Color::DarkGray,
    };
    Style::default().fg(color)
}

fn clock(timezone: &str, now: DateTime<Utc>, format: ClockFormat) -> String {
    match timezone.parse::<Tz>() {
        Ok(tz) => now.with_timezone(&tz).format(format.pattern()).to_string(),
        Err(_) => now.format(format.pattern()).to_string(),
    }
}

/// Coarse relative age: `just now`, `5m ago`, `3h ago`, `2d ago`.
pub fn ago(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let minutes = (now - then).num_minutes();
    match minutes {
        m if m < 1 => "just now".into(),
        m if m < 60 => format!("{m}m ago"),
        m if m < 24 * 60 => format!("{}h ago", m / 60),
        m => format!("{}d ago", m / (24 * 60)),
    }
}
