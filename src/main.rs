//! ambient-dash: an always-on terminal dashboard of world clocks, rotating
//! weather and headlines, cached for offline resilience.
//!
//! ## Architecture overview
//!
//! ```text
//! ┌───────────────┐  PollMsg   ┌──────────┐  draw()  ┌──────────┐
//! │ poll.rs tasks │ ─────────► │  app.rs  │ ───────► │  ui.rs   │
//! │ rotation.rs   │  (channel) │ (state)  │          │ (render) │
//! │ connectivity  │ ◄───────── │          │          └──────────┘
//! └───────────────┘   Effect   └──────────┘
//!                                   ▲
//!                                   │ PollMsg::Key
//!                              ┌──────────┐
//!                              │ input.rs │
//!                              └──────────┘
//! ```
//!
//! * **`source/`**: the `Retriever` trait and the weather, headline and
//!   geolocation services.
//! * **`pipeline`**: stale-while-revalidate over a fallback chain.
//! * **`cache`**, **`freshness`**: persisted records and their TTLs.
//! * **`poll`**: runs effects as tasks and reports back over the channel.
//! * **`rotation`**, **`connectivity`**: timers and the online flag.
//! * **`app`**: owns all dashboard state; a reducer over messages.
//! * **`ui`**: pure rendering of `App`.
//! * **`main`**: wires everything together: load config, set up logging
//!   and the terminal, and run the event loop.

mod app;
mod cache;
mod config;
mod connectivity;
mod freshness;
mod input;
mod pipeline;
mod places;
mod poll;
mod rotation;
mod source;
mod ui;

use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use app::App;
use cache::{CacheStore, FileStorage};
use config::AppConfig;
use connectivity::TcpProbe;
use poll::{Poller, Sources};

/// Redraw cadence; clocks and countdowns only need ~1 s resolution.
const FRAME_INTERVAL: Duration = Duration::from_millis(250);

const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

// ---------------------------------------------------------------------------
// RAII terminal guard
// ---------------------------------------------------------------------------

/// Manages terminal raw-mode and alternate-screen lifetime via [`Drop`].
///
/// Constructing this struct enters raw mode + alternate screen.  When the
/// value is dropped (normally or during stack unwinding) it restores the
/// terminal.
struct TerminalGuard {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
}

impl TerminalGuard {
    fn new() -> Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;
        Ok(Self { terminal })
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(self.terminal.backend_mut(), LeaveAlternateScreen);
        let _ = self.terminal.show_cursor();
    }
}

/// Install a panic hook that restores the terminal before printing the
/// panic message.
fn install_panic_hook() {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(info);
    }));
}

/// Log to a file; the terminal belongs to the UI.
fn init_logging(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening log file {}", path.display()))?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // -- configuration -------------------------------------------------------
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = AppConfig::load(config_path.as_deref())?;

    if let Err(e) = init_logging(&config.log_path()) {
        eprintln!("ambient-dash: logging disabled: {e:#}");
    }
    install_panic_hook();

    let timezone = config.local_timezone();
    let fallback = places::city_for_timezone(&timezone);
    tracing::info!(
        %timezone,
        fallback = fallback.as_ref().map(|l| l.name.as_str()),
        cache_dir = %config.cache_dir.display(),
        "starting"
    );

    // -- sources and background work -----------------------------------------
    let cache = CacheStore::new(Arc::new(FileStorage::open(config.cache_dir.clone())));
    let client = source::http_client(&config.http).context("building HTTP client")?;
    let sources = Sources::from_config(&config, &client);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut poller = Poller::new(
        tx.clone(),
        cache.clone(),
        sources.clone(),
        Poller::ip_locator(&config, &client),
        fallback.clone(),
        timezone.clone(),
    );

    let probe_addr = config.connectivity.probe_addr.clone();
    let probe = Arc::new(TcpProbe::new(probe_addr, PROBE_TIMEOUT));
    connectivity::spawn(
        probe,
        config.connectivity.probe_interval(),
        tx.clone(),
        poller.shutdown_token(),
    );
    poller.spawn_refresh_timers();

    // -- terminal setup (RAII: Drop restores on exit or panic) ---------------
    let mut guard = TerminalGuard::new()?;
    input::spawn(tx);

    let mut app = App::new(&config, cache, sources, timezone, fallback);
    for effect in app.start(Utc::now()) {
        poller.dispatch(effect);
    }

    // -- main event loop -----------------------------------------------------
    // Each iteration handles one message (or a frame tick), then redraws.
    let mut frame = tokio::time::interval(FRAME_INTERVAL);

    loop {
        tokio::select! {
            Some(msg) = rx.recv() => {
                for effect in app.handle(msg, Utc::now()) {
                    poller.dispatch(effect);
                }
            }
            _ = frame.tick() => {}
        }

        guard.terminal.draw(|f| ui::draw(&app, f, Utc::now()))?;

        if app.quit {
            break;
        }
    }

    tracing::info!("shutting down");
    poller.shutdown();

    // `guard` is dropped here, restoring the terminal.
    Ok(())
}
