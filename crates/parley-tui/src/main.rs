use clap::Parser;
use crossterm::{
    event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::path::PathBuf;

use parley_config::ConfigManager;
use parley_core::Route;
use parley_observability::LogManager;

mod app;
mod ui;

use app::{App, Focus};

#[derive(Parser)]
#[command(name = "parley-tui")]
#[command(about = "Terminal client for the Parley chat service")]
#[command(version)]
struct Args {
    /// Config file path
    #[arg(long, env = "PARLEY_CONFIG")]
    config: Option<PathBuf>,

    /// View to open: /, /login, /success or /cancel
    #[arg(long, default_value = "/")]
    route: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let manager = match &args.config {
        Some(path) => ConfigManager::load(path).await?,
        None => ConfigManager::load_default().await?,
    };
    let config = manager.snapshot().await;

    // Keep the guard alive so buffered log lines are flushed on exit
    let _logging = LogManager::init(&config.logging)?;
    tracing::info!(config = %manager.path().display(), "Starting parley-tui");

    let route = Route::parse(&args.route).unwrap_or_else(|| {
        tracing::warn!("Unknown route '{}', opening chat", args.route);
        Route::Chat
    });
    let session = parley_client::restore_session(&config.session).await;
    let mut app = App::new(&config, session, route)?;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    app.start().await;
    let res = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        tracing::error!("TUI error: {:?}", err);
        eprintln!("Error: {:?}", err);
    }

    Ok(())
}

async fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()> {
    let tick_rate = tokio::time::Duration::from_millis(100);

    loop {
        terminal.draw(|f| ui::draw(f, app))?;

        if crossterm::event::poll(tick_rate)? {
            if let Event::Key(key) = crossterm::event::read()? {
                if key.kind == KeyEventKind::Press && handle_key_event(app, key).await {
                    return Ok(());
                }
            }
        }

        app.process_events().await;
    }
}

/// Returns true when the user asked to quit
async fn handle_key_event(app: &mut App, key: KeyEvent) -> bool {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    if ctrl && key.code == KeyCode::Char('c') {
        return true;
    }

    if app.alert.is_some() {
        if matches!(key.code, KeyCode::Enter | KeyCode::Esc) {
            app.dismiss_alert();
        }
        return false;
    }

    match app.route {
        Route::Login => handle_login_key(app, key, ctrl),
        Route::Chat => {
            handle_chat_key(app, key, ctrl).await;
            false
        }
        Route::Success | Route::Cancel => {
            match key.code {
                KeyCode::Enter => app.return_to_chat().await,
                KeyCode::Esc => return true,
                _ => {}
            }
            false
        }
    }
}

fn handle_login_key(app: &mut App, key: KeyEvent, ctrl: bool) -> bool {
    match key.code {
        KeyCode::Esc => return true,
        KeyCode::Char('r') if ctrl => app.auth.toggle_mode(),
        KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => app.auth.toggle_focus(),
        KeyCode::Enter => app.submit_auth(),
        KeyCode::Backspace => app.auth.pop_char(),
        KeyCode::Char(c) if !ctrl => app.auth.push_char(c),
        _ => {}
    }
    false
}

async fn handle_chat_key(app: &mut App, key: KeyEvent, ctrl: bool) {
    if app.chat.registry().editing().is_some() {
        match key.code {
            KeyCode::Enter => app.commit_rename().await,
            KeyCode::Esc => app.chat.cancel_rename(),
            KeyCode::Tab => app.toggle_focus().await,
            KeyCode::Backspace => app.chat.rename_pop(),
            KeyCode::Char(c) if !ctrl => app.chat.rename_push(c),
            _ => {}
        }
        return;
    }

    match key.code {
        KeyCode::Char('n') if ctrl => app.new_conversation().await,
        KeyCode::Char('l') if ctrl => app.sign_out().await,
        KeyCode::Char('r') if ctrl => app.reload().await,
        KeyCode::Char('u') if ctrl => app.upgrade().await,
        KeyCode::Tab => app.toggle_focus().await,
        _ => match app.focus {
            Focus::Sidebar => match key.code {
                KeyCode::Up => app.cursor_up(),
                KeyCode::Down => app.cursor_down(),
                KeyCode::Enter => app.select_cursor().await,
                KeyCode::Char('e') | KeyCode::F(2) => app.begin_rename(),
                _ => {}
            },
            Focus::Input => match key.code {
                KeyCode::Enter => app.send_message().await,
                KeyCode::Backspace => app.pop_input(),
                KeyCode::Up => app.scroll_up(),
                KeyCode::Down => app.scroll_down(),
                KeyCode::PageUp => app.scroll_page_up(),
                KeyCode::PageDown => app.scroll_page_down(),
                KeyCode::Char(c) if !ctrl => app.push_input(c),
                _ => {}
            },
        },
    }
}
