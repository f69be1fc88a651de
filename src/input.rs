//! Keyboard input handling.
//!
//! Terminal key events are read on a dedicated thread ([`spawn`]) and reach
//! the dashboard as [`PollMsg::Key`], so keys are handled in order with every
//! other message.  Adding a new keybinding is a single match arm in
//! [`handle_key_event`].

use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use tokio::sync::mpsc::UnboundedSender;

use crate::app::App;
use crate::poll::{Effect, PollMsg};

/// How long the reader blocks before checking whether the loop has exited.
const READ_POLL: Duration = Duration::from_millis(200);

/// Process a single key event, returning any effects it triggers.
///
/// Only reacts to key-press events (ignoring release / repeat) so that each
/// physical keypress triggers exactly one action.
pub fn handle_key_event(app: &mut App, key: KeyEvent, now: DateTime<Utc>) -> Vec<Effect> {
    if key.kind != KeyEventKind::Press {
        return Vec::new();
    }

    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => {
            app.quit = true;
            Vec::new()
        }
        KeyCode::Char('r') => app.force_refresh(now),
        _ => Vec::new(),
    }
}

/// Forward terminal key events until the receiving side is dropped.
pub fn spawn(tx: UnboundedSender<PollMsg>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        while !tx.is_closed() {
            match event::poll(READ_POLL) {
                Ok(false) => continue,
                Ok(true) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "terminal input unavailable");
                    return;
                }
            }
            match event::read() {
                Ok(Event::Key(key)) => {
                    if tx.send(PollMsg::Key(key)).is_err() {
                        return;
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "failed to read terminal event");
                    return;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheStore;
    use crate::config::AppConfig;
    use crate::poll::Sources;
    use crossterm::event::{KeyEventState, KeyModifiers};

    fn app() -> App {
        let config = AppConfig::default();
        let ids = config.cities.iter().map(|c| c.id.clone());
        let sources = Sources::new(Vec::new(), Vec::new(), ids);
        let cache = CacheStore::in_memory();
        App::new(&config, cache, sources, "UTC".into(), None)
    }

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn q_and_esc_quit() {
        for code in [KeyCode::Char('q'), KeyCode::Esc] {
            let mut app = app();
            let effects = handle_key_event(&mut app, press(code), Utc::now());
            assert!(effects.is_empty());
            assert!(app.quit);
        }
    }

    #[test]
    fn r_forces_news_refresh() {
        let mut app = app();
        let effects = handle_key_event(&mut app, press(KeyCode::Char('r')), Utc::now());
        assert!(effects.contains(&Effect::FetchNews));
        assert!(!app.quit);
    }

    #[test]
    fn release_events_are_ignored() {
        let mut app = app();
        let release = KeyEvent {
            code: KeyCode::Char('q'),
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Release,
            state: KeyEventState::NONE,
        };
        handle_key_event(&mut app, release, Utc::now());
        assert!(!app.quit);
    }

    #[test]
    fn unbound_keys_do_nothing() {
        let mut app = app();
        let effects = handle_key_event(&mut app, press(KeyCode::Char('x')), Utc::now());
        assert!(effects.is_empty());
        assert!(!app.quit);
    }
}
