//! Ordered start/stop requests from the TUI to the stream manager

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use dockscope_stream::{LogStreamManager, StreamError};
use dockscope_tui::Action;

/// Request for the stream manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamCommand {
    Start(String),
    Stop,
}

/// Single task that issues stream commands in the order they were queued
///
/// Errors come back to the UI as `Action::ShowMessage`.
pub struct StreamControl {
    commands: mpsc::UnboundedSender<StreamCommand>,
    task: JoinHandle<()>,
}

impl StreamControl {
    pub fn spawn(manager: Arc<LogStreamManager>, actions: mpsc::UnboundedSender<Action>) -> Self {
        let (commands, mut rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(async move {
            while let Some(command) = rx.recv().await {
                let result = match command {
                    StreamCommand::Start(container) => manager.start_logging(container).await,
                    StreamCommand::Stop => manager.stop_logging().await,
                };
                match result {
                    Ok(()) | Err(StreamError::Cancelled) => {}
                    Err(e) => {
                        tracing::debug!(error = %e, "stream command failed");
                        let _ = actions.send(Action::ShowMessage(e.to_string()));
                    }
                }
            }
        });

        Self { commands, task }
    }

    pub fn start(&self, container: String) {
        self.send(StreamCommand::Start(container));
    }

    pub fn stop(&self) {
        self.send(StreamCommand::Stop);
    }

    fn send(&self, command: StreamCommand) {
        if self.commands.send(command).is_err() {
            tracing::warn!("stream control task has exited");
        }
    }

    /// Finish the queued commands and release the manager
    pub async fn shutdown(self) {
        drop(self.commands);
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "stream control task panicked");
        }
    }
}
