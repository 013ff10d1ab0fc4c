use anyhow::Result;
use clap::Parser;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

mod app;
mod backend;
mod badge;
mod commands;
mod composer;
mod config;
mod conversations;
mod discovery;
mod entry;
mod error;
mod formatting;
mod models;
mod poller;
mod session;
mod thread;
mod utils;

#[cfg(test)]
mod testing;

use app::App;
use backend::HttpBackend;
use config::Config;
use entry::{EntryResolver, NavigationState};
use models::PeerId;
use session::{MessagingSession, SessionOptions};

/// Terminal client for squad private messages.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Config file to use instead of the default location
    #[arg(long)]
    config: Option<PathBuf>,

    /// Server base URL, overrides the config file
    #[arg(long)]
    server: Option<String>,

    /// Open the conversation with this user id on start
    #[arg(long)]
    peer: Option<i64>,

    /// Page link carrying a ?user_id= to open on start
    #[arg(long)]
    link: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(server) = args.server {
        config.server_url = server;
    }

    utils::init_logging(&config.log_path())
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;
    crate::info_log!("=== Squad Messages Starting ===");
    crate::info_log!("server: {}", config.server_url);
    if config.token.is_none() {
        crate::warn_log!("no access token configured; requests will be anonymous");
    }

    let backend = Arc::new(HttpBackend::from_config(&config)?);
    let options = SessionOptions {
        badge_interval: config.settings.badge_interval(),
        conversation_interval: Some(config.settings.conversation_interval()),
    };
    let session = MessagingSession::create(backend, options);

    let navigation = match args.peer {
        Some(id) if id > 0 => NavigationState::with_target(PeerId(id)),
        Some(id) => {
            crate::warn_log!("ignoring --peer {}: ids are positive", id);
            NavigationState::default()
        }
        None => NavigationState::default(),
    };
    let entry = EntryResolver::new(navigation, args.link);

    // Activate BEFORE entering TUI mode so the first frame has data
    let mut app = App::new(session, entry, config.settings.clone());
    app.activate().await;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app).await;

    // Stop polling even if the loop failed
    app.session.dispose().await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(ref e) = res {
        crate::error_log!("event loop failed: {:#}", e);
    }
    crate::info_log!("=== Squad Messages Exiting ===");
    res
}

async fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> Result<()> {
    loop {
        app.sync().await;

        if app.needs_redraw {
            terminal.draw(|f| app.draw(f))?;
            app.needs_redraw = false;
        }

        if !event::poll(Duration::from_millis(250))? {
            continue;
        }

        match event::read()? {
            Event::Key(key) if key.kind == KeyEventKind::Press => match key.code {
                // Ctrl+Q: Quit
                KeyCode::Char('q') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    break;
                }
                // Ctrl+R: Refresh list and open thread
                KeyCode::Char('r') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    app.refresh();
                }
                KeyCode::Tab => app.handle_tab(),
                KeyCode::Up => app.handle_up(),
                KeyCode::Down => app.handle_down(),
                KeyCode::Esc => app.handle_esc().await,
                KeyCode::Enter => app.handle_enter().await?,
                KeyCode::Backspace => app.handle_backspace().await,
                KeyCode::Char(c) => app.handle_char(c).await,
                _ => {}
            },
            Event::Resize(_, _) => {
                app.needs_redraw = true;
            }
            _ => {}
        }
    }

    Ok(())
}
