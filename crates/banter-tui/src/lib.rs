//! banter-tui: Terminal UI for the banter chat client
//!
//! This crate provides the TUI layer for banter:
//! - Chat screen with left/right aligned message bubbles
//! - Typing indicator while a reply is pending
//! - Restart and quit confirmation dialogs, help overlay

mod app;
mod event;
mod screens;
#[cfg(test)]
pub mod test_utils;
mod ui;

use screens::Screen as ScreenTrait;

pub use app::{App, Screen};
pub use banter_engine;
pub use event::{Action, Event, EventHandler};

use banter_engine::{exchange, ApiError, ChatBackend, Config, FileStore, TurnTicket};
use crossterm::{
    cursor::Show as ShowCursor,
    event::{DisableMouseCapture, EnableMouseCapture, MouseEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    buffer::Buffer,
    layout::Rect,
    Terminal,
};
use std::io::stdout;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::info;

/// A dispatched remote turn.
type TurnTask = (TurnTicket, JoinHandle<Result<String, ApiError>>);

/// RAII guard for terminal state restoration.
struct TerminalGuard;

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(stdout(), DisableMouseCapture, LeaveAlternateScreen, ShowCursor);
    }
}

/// Run the TUI application.
///
/// Sets up the terminal, restores the stored conversation from `store`,
/// runs the event loop and restores the terminal on exit.
pub async fn run_tui(
    config: &Config,
    store: FileStore,
    backend: Arc<dyn ChatBackend>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut app = App::new(
        Box::new(store),
        config.send_history,
        config.endpoint_host().to_string(),
    );
    info!(
        messages = app.conversation.messages().len(),
        stage = %app.conversation.stage(),
        "Starting TUI"
    );

    enable_raw_mode()?;
    let _guard = TerminalGuard;

    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;

    // 4 Hz drives the typing animation
    let mut events = EventHandler::new(250);

    let result = run_loop(
        &mut terminal,
        &mut app,
        &mut events,
        backend,
        config.min_reply_delay(),
    )
    .await;

    terminal.show_cursor()?;

    result
}

/// Draw the whole frame for the current screen.
pub fn draw(app: &App, area: Rect, buf: &mut Buffer) {
    match app.screen {
        Screen::Chat => screens::chat::ChatScreen.render(app, area, buf),
        Screen::RestartConfirm => screens::chat::RestartConfirmScreen.render(app, area, buf),
        Screen::QuitConfirm => screens::chat::QuitConfirmScreen.render(app, area, buf),
    }

    if app.show_help {
        screens::render_help_overlay(area, buf);
    }
}

async fn run_loop<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    events: &mut EventHandler,
    backend: Arc<dyn ChatBackend>,
    min_delay: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut turns: Vec<TurnTask> = Vec::new();

    loop {
        terminal.draw(|frame| {
            let area = frame.area();
            app.fit_scroll(area);
            draw(app, area, frame.buffer_mut());
        })?;

        if let Some(event) = events.next().await {
            match event {
                Event::Key(key) => {
                    if let Some(turn) = app.handle_key(key) {
                        let backend = Arc::clone(&backend);
                        let handle = tokio::spawn(async move {
                            exchange(backend.as_ref(), &turn.request, min_delay).await
                        });
                        turns.push((turn.ticket, handle));
                    }
                }
                Event::Mouse(mouse) => match mouse.kind {
                    MouseEventKind::ScrollUp => app.handle_action(Action::Up),
                    MouseEventKind::ScrollDown => app.handle_action(Action::Down),
                    _ => {}
                },
                Event::Tick => app.tick(),
                Event::Resize(_, _) => {
                    // Terminal will handle resize automatically
                }
            }
        }

        collect_finished(app, &mut turns).await;

        if app.should_quit {
            for (_, handle) in turns {
                handle.abort();
            }
            break;
        }
    }

    Ok(())
}

/// Apply every finished turn to `app` without waiting on the rest.
///
/// A task that panicked or was aborted completes its turn as a failure.
async fn collect_finished(app: &mut App, turns: &mut Vec<TurnTask>) -> usize {
    let mut collected = 0;
    let mut i = 0;
    while i < turns.len() {
        if turns[i].1.is_finished() {
            let (ticket, handle) = turns.remove(i);
            let outcome = handle
                .await
                .unwrap_or_else(|e| Err(ApiError::Interrupted(e.to_string())));
            app.finish_turn(ticket, outcome);
            collected += 1;
        } else {
            i += 1;
        }
    }
    collected
}

/// Get the TUI version.
pub fn tui_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
