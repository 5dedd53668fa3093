//! Log stream manager
//!
//! A single worker task owns the session: the socket, any in-flight token
//! fetch or handshake, and the reconnect timer. The [`LogStreamManager`]
//! handle talks to it over a command channel. Everything readers need (the
//! buffer, subscribers, connection flags) is shared behind an `Arc`.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Sleep;
use tokio_util::sync::CancellationToken;

use dockscope_logs::{KindCounts, LogBuffer, LogParser};
use dockscope_types::{ConnectionState, LogEntry};

use crate::config::StreamConfig;
use crate::error::{AuthError, StreamError, TransportError};
use crate::policy::{ReconnectPolicy, announced_seconds};
use crate::protocol::{ABNORMAL_CLOSURE, ControlMessage, NORMAL_CLOSURE};
use crate::token::TokenProvider;
use crate::transport::{Connection, Connector, TransportEvent, WsConnector, redact_token};

/// Event delivered to subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A new entry was appended to the buffer
    Entry(Arc<LogEntry>),

    /// The connection entered (`true`) or left (`false`) the open state
    ConnectionStatus(bool),
}

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    senders: HashMap<u64, mpsc::UnboundedSender<StreamEvent>>,
}

impl Subscribers {
    fn broadcast(&mut self, event: &StreamEvent) {
        self.senders.retain(|_, tx| tx.send(event.clone()).is_ok());
    }
}

/// State visible outside the worker
struct Shared {
    buffer: LogBuffer,
    subscribers: Mutex<Subscribers>,
    state: RwLock<ConnectionState>,
    container: RwLock<Option<String>>,
    connected: AtomicBool,
    auto_scroll: AtomicBool,
}

impl Shared {
    fn new(capacity: usize) -> Self {
        Self {
            buffer: LogBuffer::new(capacity),
            subscribers: Mutex::new(Subscribers::default()),
            state: RwLock::new(ConnectionState::Idle),
            container: RwLock::new(None),
            connected: AtomicBool::new(false),
            auto_scroll: AtomicBool::new(true),
        }
    }

    /// Append to the buffer and fan out, atomically with respect to `subscribe`
    fn emit(&self, entry: LogEntry) {
        let mut subscribers = self.subscribers.lock();
        let entry = self.buffer.append(entry);
        subscribers.broadcast(&StreamEvent::Entry(entry));
    }

    fn emit_error(&self, error: &StreamError) {
        tracing::warn!(%error, "stream error");
        self.emit(LogEntry::error(error.to_string()));
    }

    /// Record connectivity; subscribers only hear about real changes
    fn set_connected(&self, connected: bool) {
        let mut subscribers = self.subscribers.lock();
        if self.connected.swap(connected, Ordering::SeqCst) != connected {
            subscribers.broadcast(&StreamEvent::ConnectionStatus(connected));
        }
    }

    fn set_state(&self, state: ConnectionState) {
        let mut current = self.state.write();
        if *current != state {
            tracing::debug!(from = ?*current, to = ?state, "connection state");
            *current = state;
        }
    }

    fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    fn clear(&self) {
        let _subscribers = self.subscribers.lock();
        self.buffer.clear();
    }

    fn subscribe(self: &Arc<Self>) -> Subscription {
        let mut subscribers = self.subscribers.lock();
        let history = self.buffer.snapshot();
        let (tx, rx) = mpsc::unbounded_channel();
        let id = subscribers.next_id;
        subscribers.next_id += 1;
        subscribers.senders.insert(id, tx);

        Subscription {
            id,
            history,
            events: rx,
            shared: Arc::downgrade(self),
        }
    }
}

/// A registered listener: buffer history at registration plus live events
///
/// Dropping the subscription deregisters it.
pub struct Subscription {
    id: u64,
    history: Vec<Arc<LogEntry>>,
    events: mpsc::UnboundedReceiver<StreamEvent>,
    shared: Weak<Shared>,
}

impl Subscription {
    /// Buffer contents at the moment of subscription
    pub fn history(&self) -> &[Arc<LogEntry>] {
        &self.history
    }

    /// Take ownership of the history, leaving it empty
    pub fn take_history(&mut self) -> Vec<Arc<LogEntry>> {
        std::mem::take(&mut self.history)
    }

    /// Wait for the next event; `None` once the manager is gone
    pub async fn recv(&mut self) -> Option<StreamEvent> {
        self.events.recv().await
    }

    /// Next event if one is queued
    pub fn try_recv(&mut self) -> Option<StreamEvent> {
        self.events.try_recv().ok()
    }

    /// Stop receiving events
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.subscribers.lock().senders.remove(&self.id);
        }
    }
}

type StartReply = oneshot::Sender<Result<(), StreamError>>;

enum Command {
    Start { container: String, reply: StartReply },
    Stop { reply: oneshot::Sender<()> },
}

/// Work in flight before a connection is open
enum Pending {
    /// Fetching a token; `reply` is set when a caller awaits `start_logging`
    Token {
        future: BoxFuture<'static, Result<String, AuthError>>,
        reply: Option<StartReply>,
    },
    Handshake(BoxFuture<'static, Result<Box<dyn Connection>, TransportError>>),
}

enum Progress {
    Token(Result<String, AuthError>),
    Handshake(Result<Box<dyn Connection>, TransportError>),
}

/// Handle to the log streaming session
pub struct LogStreamManager {
    shared: Arc<Shared>,
    commands: mpsc::Sender<Command>,
    cancel: CancellationToken,
    worker: Option<JoinHandle<()>>,
}

impl LogStreamManager {
    /// Spawn the worker; must be called within a tokio runtime
    pub fn new(
        config: StreamConfig,
        tokens: Arc<dyn TokenProvider>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let shared = Arc::new(Shared::new(config.buffer_size));
        let (tx, rx) = mpsc::channel(32);
        let cancel = CancellationToken::new();

        let worker = Worker {
            shared: Arc::clone(&shared),
            policy: config.reconnect.clone(),
            config,
            tokens,
            connector,
            commands: rx,
            cancel: cancel.clone(),
            container: None,
            token: None,
            attempts: 0,
            intentional: false,
            conn: None,
            pending: None,
            timer: None,
        };

        Self {
            shared,
            commands: tx,
            cancel,
            worker: Some(tokio::spawn(worker.run())),
        }
    }

    /// Manager using the WebSocket transport
    pub fn websocket(config: StreamConfig, tokens: Arc<dyn TokenProvider>) -> Self {
        Self::new(config, tokens, Arc::new(WsConnector))
    }

    /// Start streaming `container`, replacing any current session
    ///
    /// Returns once a token is in hand and the connection attempt has begun.
    pub async fn start_logging(&self, container: impl Into<String>) -> Result<(), StreamError> {
        let (reply, rx) = oneshot::channel();
        let command = Command::Start {
            container: container.into(),
            reply,
        };
        self.commands
            .send(command)
            .await
            .map_err(|_| StreamError::ManagerClosed)?;
        rx.await.map_err(|_| StreamError::ManagerClosed)?
    }

    /// Stop streaming; safe to call in any state
    pub async fn stop_logging(&self) -> Result<(), StreamError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Stop { reply })
            .await
            .map_err(|_| StreamError::ManagerClosed)?;
        rx.await.map_err(|_| StreamError::ManagerClosed)
    }

    /// Empty the buffer without touching the connection
    pub fn clear_logs(&self) {
        self.shared.clear();
    }

    pub fn set_auto_scroll(&self, enabled: bool) {
        self.shared.auto_scroll.store(enabled, Ordering::Relaxed);
    }

    pub fn is_auto_scroll_enabled(&self) -> bool {
        self.shared.auto_scroll.load(Ordering::Relaxed)
    }

    /// Register a listener
    pub fn subscribe(&self) -> Subscription {
        self.shared.subscribe()
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.shared.subscribers.lock().senders.len()
    }

    /// Current buffer contents
    pub fn snapshot(&self) -> Vec<Arc<LogEntry>> {
        self.shared.buffer.snapshot()
    }

    pub fn kind_counts(&self) -> KindCounts {
        self.shared.buffer.kind_counts()
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    pub fn current_container(&self) -> Option<String> {
        self.shared.container.read().clone()
    }

    /// Stop streaming and wait for the worker to exit
    pub async fn shutdown(mut self) {
        if let Err(e) = self.stop_logging().await {
            tracing::debug!(error = %e, "stop during shutdown");
        }
        self.cancel.cancel();
        if let Some(worker) = self.worker.take() {
            if let Err(e) = worker.await {
                tracing::warn!(error = %e, "stream worker panicked");
            }
        }
    }
}

impl Drop for LogStreamManager {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Single writer for the session
struct Worker {
    shared: Arc<Shared>,
    config: StreamConfig,
    policy: ReconnectPolicy,
    tokens: Arc<dyn TokenProvider>,
    connector: Arc<dyn Connector>,
    commands: mpsc::Receiver<Command>,
    cancel: CancellationToken,

    container: Option<String>,
    /// Cached stream token, reused across reconnects
    token: Option<String>,
    attempts: u32,
    intentional: bool,

    conn: Option<Box<dyn Connection>>,
    pending: Option<Pending>,
    timer: Option<Pin<Box<Sleep>>>,
}

impl Worker {
    async fn run(mut self) {
        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => break,

                command = self.commands.recv() => match command {
                    Some(command) => self.on_command(command).await,
                    None => break,
                },

                progress = drive(&mut self.pending), if self.pending.is_some() => {
                    self.on_progress(progress).await;
                }

                event = next_event(&mut self.conn), if self.conn.is_some() => {
                    self.on_event(event);
                }

                _ = expire(&mut self.timer), if self.timer.is_some() => {
                    self.on_timer();
                }
            }
        }

        if let Some(mut conn) = self.conn.take() {
            conn.close(NORMAL_CLOSURE, "Client shutting down").await;
        }
        self.shared.set_connected(false);
        self.shared.set_state(ConnectionState::Idle);
        tracing::debug!("stream worker stopped");
    }

    async fn on_command(&mut self, command: Command) {
        match command {
            Command::Start { container, reply } => self.start(container, reply).await,
            Command::Stop { reply } => {
                self.stop().await;
                let _ = reply.send(());
            }
        }
    }

    async fn start(&mut self, container: String, reply: StartReply) {
        if container.trim().is_empty() {
            let _ = reply.send(Err(AuthError::MissingContainer.into()));
            return;
        }

        tracing::info!(container = %container, "starting log stream");
        self.intentional = false;
        self.timer = None;
        self.teardown("Switching container").await;
        self.attempts = 0;
        self.shared.set_state(ConnectionState::Idle);
        *self.shared.container.write() = Some(container.clone());
        self.container = Some(container);

        match self.token.clone() {
            Some(token) => {
                let _ = reply.send(Ok(()));
                self.begin_handshake(&token);
            }
            None => self.begin_token_fetch(Some(reply)),
        }
    }

    async fn stop(&mut self) {
        self.intentional = true;
        self.timer = None;

        let had_session = self.conn.is_some()
            || matches!(self.pending, Some(Pending::Handshake(_)));

        if let Some(mut conn) = self.conn.take() {
            self.shared.set_state(ConnectionState::Closing);
            match ControlMessage::StopLogs.to_json() {
                Ok(text) => {
                    if let Err(e) = conn.send_text(text).await {
                        tracing::debug!(error = %e, "failed to send stop_logs");
                    }
                }
                Err(e) => tracing::debug!(error = %e, "failed to encode stop_logs"),
            }
            conn.close(NORMAL_CLOSURE, "User stopped logging").await;
        }
        self.cancel_pending();

        self.shared.set_connected(false);
        self.shared.set_state(ConnectionState::Idle);

        if had_session {
            tracing::info!("log streaming stopped");
            self.shared.emit(LogEntry::system("Log streaming stopped"));
        }
    }

    /// Drop the socket and anything in flight without emitting entries
    async fn teardown(&mut self, reason: &str) {
        if let Some(mut conn) = self.conn.take() {
            conn.close(NORMAL_CLOSURE, reason).await;
        }
        self.cancel_pending();
        self.shared.set_connected(false);
    }

    fn cancel_pending(&mut self) {
        if let Some(Pending::Token {
            reply: Some(reply), ..
        }) = self.pending.take()
        {
            let _ = reply.send(Err(StreamError::Cancelled));
        }
    }

    fn begin_token_fetch(&mut self, reply: Option<StartReply>) {
        let tokens = Arc::clone(&self.tokens);
        self.pending = Some(Pending::Token {
            future: async move { tokens.fetch_token().await }.boxed(),
            reply,
        });
    }

    fn begin_handshake(&mut self, token: &str) {
        let Some(container) = self.container.clone() else {
            return;
        };

        self.shared.set_state(ConnectionState::Connecting);
        self.shared
            .emit(LogEntry::system(format!("Connecting to logs for {container}...")));

        let url = self.config.stream_url_for(token);
        tracing::debug!(url = %redact_token(&url), "connecting");

        let connector = Arc::clone(&self.connector);
        self.pending = Some(Pending::Handshake(
            async move { connector.connect(&url).await }.boxed(),
        ));
    }

    async fn on_progress(&mut self, progress: Progress) {
        let reply = match self.pending.take() {
            Some(Pending::Token { reply, .. }) => reply,
            _ => None,
        };

        match progress {
            Progress::Token(Ok(token)) => {
                self.token = Some(token.clone());
                if let Some(reply) = reply {
                    let _ = reply.send(Ok(()));
                }
                self.begin_handshake(&token);
            }
            Progress::Token(Err(e)) => match reply {
                // Initial start: the caller gets the error, nothing is retried
                Some(reply) => {
                    tracing::warn!(error = %e, "token fetch failed");
                    self.shared.set_state(ConnectionState::Idle);
                    let _ = reply.send(Err(e.into()));
                }
                None => {
                    self.token = None;
                    self.shared.emit_error(&StreamError::Auth(e));
                    self.on_closed(ABNORMAL_CLOSURE, "token refresh failed");
                }
            },
            Progress::Handshake(Ok(conn)) => self.on_open(conn).await,
            Progress::Handshake(Err(e)) => {
                if e.is_auth_rejection() {
                    tracing::info!("stream token rejected, discarding it");
                    self.token = None;
                }
                self.shared.emit_error(&StreamError::Connection(e));
                self.on_closed(ABNORMAL_CLOSURE, "handshake failed");
            }
        }
    }

    async fn on_open(&mut self, mut conn: Box<dyn Connection>) {
        tracing::info!("log stream connected");
        self.attempts = 0;
        self.shared.set_state(ConnectionState::Open);
        self.shared.set_connected(true);

        let container = self.container.clone().unwrap_or_default();
        let sent = match ControlMessage::start(container).to_json() {
            Ok(text) => conn.send_text(text).await,
            Err(e) => Err(TransportError::Send(e.to_string())),
        };
        if let Err(e) = sent {
            self.shared.emit_error(&StreamError::StartRequest(e));
        }
        self.conn = Some(conn);
    }

    fn on_event(&mut self, event: Option<TransportEvent>) {
        match event {
            Some(TransportEvent::Message(text)) => match LogParser::parse(&text) {
                Ok(entry) => self.shared.emit(entry),
                Err(e) => {
                    tracing::debug!(error = %e, frame = %text, "unparseable frame");
                    self.shared.emit_error(&StreamError::Protocol(e.to_string()));
                }
            },
            Some(TransportEvent::Error(e)) => self.shared.emit_error(&StreamError::Socket(e)),
            Some(TransportEvent::Closed { code, reason }) => {
                self.conn = None;
                self.on_closed(code, &reason);
            }
            None => {
                self.conn = None;
                self.on_closed(ABNORMAL_CLOSURE, "connection dropped");
            }
        }
    }

    fn on_closed(&mut self, code: u16, reason: &str) {
        tracing::info!(code, reason, "log stream closed");
        self.shared.set_connected(false);

        if !self.intentional && code != NORMAL_CLOSURE {
            self.schedule_reconnect();
        } else {
            self.shared.set_state(ConnectionState::Idle);
        }
    }

    fn schedule_reconnect(&mut self) {
        if !self.policy.allows_another(self.attempts) {
            self.shared
                .emit_error(&StreamError::RetryExhausted(self.policy.max_attempts));
            self.shared.set_state(ConnectionState::Idle);
            return;
        }

        self.attempts += 1;
        let delay = self.policy.delay_for(self.attempts);
        self.shared.set_state(ConnectionState::Reconnecting);
        self.shared.emit(LogEntry::system(format!(
            "Connection lost. Reconnecting in {} seconds... (Attempt {}/{})",
            announced_seconds(delay),
            self.attempts,
            self.policy.max_attempts
        )));
        self.timer = Some(Box::pin(tokio::time::sleep(delay)));
    }

    fn on_timer(&mut self) {
        self.timer = None;
        if self.intentional
            || self.container.is_none()
            || self.shared.state() != ConnectionState::Reconnecting
        {
            return;
        }

        match self.token.clone() {
            Some(token) => self.begin_handshake(&token),
            None => {
                self.shared.set_state(ConnectionState::Connecting);
                self.begin_token_fetch(None);
            }
        }
    }
}

async fn drive(pending: &mut Option<Pending>) -> Progress {
    match pending {
        Some(Pending::Token { future, .. }) => Progress::Token(future.await),
        Some(Pending::Handshake(future)) => Progress::Handshake(future.await),
        None => std::future::pending().await,
    }
}

async fn next_event(conn: &mut Option<Box<dyn Connection>>) -> Option<TransportEvent> {
    match conn {
        Some(conn) => conn.next_event().await,
        None => std::future::pending().await,
    }
}

async fn expire(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}
