mod app;
mod config;
mod handler;
mod render;
mod tui;
mod ui;

use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use tripchat_core::ClientState;

use crate::app::App;
use crate::config::Config;
use crate::tui::{EventHandler, Tui};

/// Logs go to a daily file under the config dir; the terminal belongs to the UI.
fn init_logging() -> Result<WorkerGuard> {
    let logs_dir = Config::get_config_dir()?.join("logs");
    std::fs::create_dir_all(&logs_dir)?;

    let file_appender = tracing_appender::rolling::daily(logs_dir, "tripchat.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_ansi(false).with_writer(non_blocking))
        .init();

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    let _guard = init_logging()?;

    let config = Config::load().unwrap_or_else(|e| {
        tracing::warn!("failed to load config, using defaults: {}", e);
        let mut config = Config::new();
        config.apply_overrides(|key| std::env::var(key).ok());
        config
    });
    tracing::info!(server = %config.server_url, "starting tripchat");

    let state_path = ClientState::get_state_path()
        .map_err(|e| tracing::warn!("client state will not be saved: {}", e))
        .ok();
    let client_state = state_path
        .as_deref()
        .map(ClientState::load_from)
        .unwrap_or_default();

    let mut app = App::new(&config, client_state, state_path);

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new(tui::FRAME_INTERVAL);

    let result = run(&mut terminal, &mut app, &mut events).await;

    tui::restore()?;
    if let Err(e) = &result {
        tracing::error!("tripchat exited with error: {}", e);
    }
    result
}

async fn run(terminal: &mut Tui, app: &mut App, events: &mut EventHandler) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event).await?,
            None => break,
        }
    }
    Ok(())
}
