mod config;
mod control;
mod plain;

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use clap::Parser;
use tokio::sync::mpsc;

use dockscope_logs::plain_line;
use dockscope_stream::{
    HttpTokenProvider, LogEntry, LogStreamManager, StaticTokenProvider, StreamEvent, TokenProvider,
};
use dockscope_tui::{
    Action, AppState, Event, EventHandler, InputMode, KeyBindings, KeyContext, LogViewerScreen, Tui,
};

use config::{FileConfig, Overrides, Settings};
use control::StreamControl;

/// Dockscope - A terminal viewer for live container logs
#[derive(Parser, Debug)]
#[command(name = "dockscope")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Container to stream (optional in the TUI, which can prompt for one)
    #[arg(value_name = "CONTAINER")]
    container: Option<String>,

    /// Dashboard API base URL (token endpoint)
    #[arg(long, env = "DOCKSCOPE_API_URL")]
    api_url: Option<String>,

    /// Streaming base URL, derived from the API URL when omitted
    #[arg(long, env = "DOCKSCOPE_STREAM_URL")]
    stream_url: Option<String>,

    /// Session cookie for the API (`name=value`)
    #[arg(long, env = "DOCKSCOPE_SESSION", hide_env_values = true)]
    session_cookie: Option<String>,

    /// Use this streaming token instead of requesting one
    #[arg(long, env = "DOCKSCOPE_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Config file (default: $XDG_CONFIG_HOME/dockscope/config.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Buffer size for log entries
    #[arg(long)]
    buffer_size: Option<usize>,

    /// Print log lines to stdout instead of starting the TUI
    #[arg(long)]
    plain: bool,

    /// Write diagnostics to this file
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_tracing(args.log_file.as_deref(), !args.plain)?;

    let result = run(args).await;

    if let Err(e) = &result {
        eprintln!("Error: {:#}", e);
    }

    result
}

/// Install the subscriber; the TUI owns the terminal, so it only logs to a file
fn init_tracing(log_file: Option<&Path>, tui: bool) -> Result<()> {
    let builder = tracing_subscriber::fmt().with_env_filter(
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into()),
    );

    match log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create log file {}", path.display()))?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None if tui => builder.with_writer(std::io::sink).init(),
        None => builder.with_writer(std::io::stderr).init(),
    }
    Ok(())
}

async fn run(args: Args) -> Result<()> {
    let file = FileConfig::load(args.config.as_deref())?;
    let settings = Settings::resolve(
        Overrides {
            api_url: args.api_url,
            stream_url: args.stream_url,
            session_cookie: args.session_cookie,
            token: args.token,
            buffer_size: args.buffer_size,
        },
        file,
    )?;

    let tokens: Arc<dyn TokenProvider> = match settings.token.clone() {
        Some(token) => Arc::new(StaticTokenProvider::new(Some(token))),
        None => Arc::new(HttpTokenProvider::new(
            settings.stream.api_url.clone(),
            settings.session_cookie.as_deref(),
        )?),
    };
    let buffer_size = settings.stream.buffer_size;
    let manager = LogStreamManager::websocket(settings.stream, tokens);

    let container = args.container.filter(|c| !c.trim().is_empty());
    if !args.plain {
        let manager = Arc::new(manager);
        let result = run_tui(Arc::clone(&manager), buffer_size, container).await;
        match Arc::try_unwrap(manager) {
            Ok(manager) => manager.shutdown().await,
            // Dropping the last handle cancels the worker
            Err(_) => tracing::debug!("stream manager still shared at exit"),
        }
        return result;
    }

    let result = match container {
        Some(container) => plain::run(&manager, container).await,
        None => Err(anyhow::anyhow!("a container name is required with --plain")),
    };
    manager.shutdown().await;
    result
}

async fn run_tui(
    manager: Arc<LogStreamManager>,
    buffer_size: usize,
    container: Option<String>,
) -> Result<()> {
    let (action_tx, mut action_rx) = mpsc::unbounded_channel::<Action>();

    let mut state = AppState::new(buffer_size, container.clone());
    state.ui.auto_scroll = manager.is_auto_scroll_enabled();

    let mut subscription = manager.subscribe();
    state.load_history(subscription.take_history());

    let control = StreamControl::spawn(Arc::clone(&manager), action_tx.clone());

    let mut tui = Tui::new()?;
    let mut events = EventHandler::new(Duration::from_millis(100));
    let keybindings = KeyBindings::new();

    match container {
        Some(container) => {
            let _ = action_tx.send(Action::StartStreaming(container));
        }
        None => state.open_input(InputMode::Container),
    }

    render(&mut tui, &mut state)?;

    loop {
        tokio::select! {
            Some(event) = events.next() => {
                match event {
                    Event::Key(key) => {
                        let action = if state.ui.input.is_some() {
                            keybindings.get_input_action(&key)
                        } else {
                            keybindings.get_action(KeyContext::LogViewer, &key)
                        };
                        if let Some(action) = action {
                            let _ = action_tx.send(action);
                        }
                    }
                    Event::Paste(text) => {
                        if state.ui.input.is_some() {
                            let _ = action_tx.send(Action::InputPaste(text));
                        }
                    }
                    Event::Tick => {
                        state.connection = manager.state();
                    }
                    Event::Resize(_, _) => {
                        let _ = action_tx.send(Action::Render);
                    }
                    Event::Error(e) => {
                        state.ui.message = Some(e);
                    }
                }
            }

            Some(event) = subscription.recv() => {
                match event {
                    StreamEvent::Entry(entry) => state.push_entry(entry),
                    StreamEvent::ConnectionStatus(connected) => {
                        state.set_connected(connected);
                        state.connection = manager.state();
                    }
                }
            }

            Some(action) = action_rx.recv() => {
                handle_action(&mut state, &manager, &control, &action_tx, action);
            }

            else => break,
        }

        if state.should_quit {
            break;
        }

        render(&mut tui, &mut state)?;
    }

    events.shutdown().await;
    tui.restore()?;
    control.shutdown().await;
    Ok(())
}

fn render(tui: &mut Tui, state: &mut AppState) -> Result<()> {
    tui.terminal()
        .draw(|frame| LogViewerScreen::render(frame, state))?;
    Ok(())
}

fn handle_action(
    state: &mut AppState,
    manager: &LogStreamManager,
    control: &StreamControl,
    action_tx: &mpsc::UnboundedSender<Action>,
    action: Action,
) {
    match action {
        Action::Quit => {
            state.should_quit = true;
        }
        Action::ToggleHelp => {
            state.ui.help_visible = !state.ui.help_visible;
        }

        Action::StartStreaming(container) => {
            if !container.is_empty() {
                state.container = Some(container.clone());
            }
            control.start(container);
        }
        Action::RestartStreaming => match state.container.clone() {
            Some(container) => {
                let _ = action_tx.send(Action::StartStreaming(container));
            }
            None => state.open_input(InputMode::Container),
        },
        Action::StopStreaming => control.stop(),
        Action::ClearLogs => {
            manager.clear_logs();
            state.clear_logs();
        }
        Action::ExportLogs => {
            let filename = export_file_name(state.container.as_deref(), Local::now());
            match export_logs_to_file(&filename, &manager.snapshot()) {
                Ok(count) => {
                    state.ui.message = Some(format!("Exported {} logs to {}", count, filename));
                }
                Err(e) => {
                    state.ui.message = Some(format!("Export failed: {:#}", e));
                }
            }
        }

        Action::ScrollUp(n) => state.scroll_up(n),
        Action::ScrollDown(n) => state.scroll_down(n),
        Action::PageUp => state.page_up(),
        Action::PageDown => state.page_down(),
        Action::ScrollToTop => state.scroll_to_top(),
        Action::ScrollToBottom => state.scroll_to_bottom(),
        Action::ToggleAutoScroll => {
            state.toggle_auto_scroll();
        }
        Action::ToggleTimestamps => {
            state.ui.show_timestamps = !state.ui.show_timestamps;
        }

        Action::OpenSearch => state.open_input(InputMode::Search),
        Action::OpenContainerPrompt => state.open_input(InputMode::Container),
        Action::InputChar(c) => state.input_char(c),
        Action::InputPaste(text) => state.input_paste(&text),
        Action::InputBackspace => state.input_backspace(),
        Action::InputClear => state.input_clear(),
        Action::InputCancel => state.cancel_input(),
        Action::InputSubmit => {
            if let Some(next) = state.submit_input() {
                let _ = action_tx.send(next);
            }
        }
        Action::ClearSearch => state.clear_search(),

        Action::ShowMessage(msg) => {
            state.ui.message = Some(msg);
        }
        Action::DismissMessage => {
            if state.ui.help_visible {
                state.ui.help_visible = false;
            } else {
                state.ui.message = None;
            }
        }
        Action::Render => {}
    }

    // Follow mode is shared with the manager's presentation flags
    if manager.is_auto_scroll_enabled() != state.ui.auto_scroll {
        manager.set_auto_scroll(state.ui.auto_scroll);
    }
}

/// `{container}_{YYYYmmdd_HHMMSS}.log`, safe for use as a file name
fn export_file_name(container: Option<&str>, now: DateTime<Local>) -> String {
    let name: String = container
        .filter(|c| !c.is_empty())
        .unwrap_or("logs")
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') { c } else { '_' })
        .collect();
    format!("{}_{}.log", name, now.format("%Y%m%d_%H%M%S"))
}

/// Write one plain line per entry, returning the number of entries written
fn export_logs_to_file(filename: impl AsRef<Path>, entries: &[Arc<LogEntry>]) -> Result<usize> {
    let path = filename.as_ref();
    let mut file = File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    for entry in entries {
        writeln!(file, "{}", plain_line(entry))?;
    }
    file.flush()?;
    Ok(entries.len())
}
