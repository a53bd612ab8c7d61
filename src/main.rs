mod app;
mod backend;
mod chat;
mod config;
mod handler;
mod tui;
mod ui;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use app::App;
use config::Config;

/// Log to a file under the config directory; the terminal belongs to
/// the TUI. Level via `EXPLAINER_LOG` (defaults to `info`).
fn init_tracing() -> Result<()> {
    let path = Config::log_path()?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(&path)?;

    let filter = EnvFilter::try_from_env("EXPLAINER_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::sync::Arc::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Running without a log file is fine; running without a terminal is not.
    let _ = init_tracing();

    let config = Config::load().unwrap_or_else(|err| {
        tracing::warn!(error = %err, "failed to load config, using defaults");
        Config::new()
    });
    if let Err(err) = config.save_if_missing() {
        tracing::warn!(error = %err, "could not scaffold config file");
    }
    tracing::info!(backend_url = %config.backend_url(), "starting");

    let mut app = App::new(&config);

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = tui::EventHandler::new();

    // Initial reads (counter, server history length); failures land in
    // the status banner, not on stderr.
    app.refresh_remote_state().await;

    let result = run(&mut terminal, &mut events, &mut app).await;

    tui::restore()?;
    result
}

async fn run(terminal: &mut tui::Tui, events: &mut tui::EventHandler, app: &mut App) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        // Apply any finished gateway calls before waiting on input; the
        // tick event guarantees we get here at least a few times a second.
        app.poll_tasks().await;

        match events.next().await {
            Some(event) => handler::handle_event(app, event).await?,
            None => break,
        }
    }
    Ok(())
}
