//! Manager behaviour against a scripted in-memory transport

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use tokio::sync::mpsc;
use tokio::time::Instant;

use dockscope_stream::{
    AuthError, Connection, ConnectionState, Connector, LogEntry, LogStreamManager,
    StaticTokenProvider, StreamConfig, StreamError, StreamEvent, Subscription, TokenProvider,
    TransportError, TransportEvent,
};

const WAIT: Duration = Duration::from_secs(600);

type ServerHandle = mpsc::UnboundedSender<TransportEvent>;

/// What the next connect attempt does
enum Plan {
    Accept,
    Reject(TransportError),
    Hang,
}

#[derive(Default)]
struct Record {
    connects: Vec<(Instant, String)>,
    sent: Vec<String>,
    closes: Vec<u16>,
}

struct MockConnector {
    plans: Mutex<VecDeque<Plan>>,
    record: Arc<Mutex<Record>>,
    accepted: mpsc::UnboundedSender<ServerHandle>,
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn Connection>, TransportError> {
        self.record
            .lock()
            .connects
            .push((Instant::now(), url.to_string()));
        let plan = self
            .plans
            .lock()
            .pop_front()
            .unwrap_or(Plan::Reject(TransportError::Connect("refused".into())));

        match plan {
            Plan::Accept => {
                let (tx, rx) = mpsc::unbounded_channel();
                self.accepted.send(tx).unwrap();
                Ok(Box::new(MockConnection {
                    events: rx,
                    record: Arc::clone(&self.record),
                }))
            }
            Plan::Reject(e) => Err(e),
            Plan::Hang => std::future::pending().await,
        }
    }
}

struct MockConnection {
    events: mpsc::UnboundedReceiver<TransportEvent>,
    record: Arc<Mutex<Record>>,
}

#[async_trait]
impl Connection for MockConnection {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.record.lock().sent.push(text);
        Ok(())
    }

    async fn next_event(&mut self) -> Option<TransportEvent> {
        self.events.recv().await
    }

    async fn close(&mut self, code: u16, _reason: &str) {
        self.record.lock().closes.push(code);
    }
}

/// Token provider answering from a script, then `Unauthenticated`
#[derive(Default)]
struct ScriptedTokens {
    responses: Mutex<VecDeque<Result<String, AuthError>>>,
    calls: AtomicUsize,
}

impl ScriptedTokens {
    fn new(responses: Vec<Result<String, AuthError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl TokenProvider for ScriptedTokens {
    async fn fetch_token(&self) -> Result<String, AuthError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .pop_front()
            .unwrap_or(Err(AuthError::Unauthenticated))
    }
}

struct Harness {
    manager: LogStreamManager,
    record: Arc<Mutex<Record>>,
    accepted: mpsc::UnboundedReceiver<ServerHandle>,
    events: Subscription,
}

impl Harness {
    fn new(plans: Vec<Plan>) -> Self {
        Self::with_tokens(plans, Arc::new(StaticTokenProvider::new(Some("tok".into()))))
    }

    fn with_tokens(plans: Vec<Plan>, tokens: Arc<dyn TokenProvider>) -> Self {
        let record = Arc::new(Mutex::new(Record::default()));
        let (accepted_tx, accepted) = mpsc::unbounded_channel();
        let connector = MockConnector {
            plans: Mutex::new(plans.into()),
            record: Arc::clone(&record),
            accepted: accepted_tx,
        };
        let config = StreamConfig {
            api_url: "http://logs.test".into(),
            ..Default::default()
        };
        let manager = LogStreamManager::new(config, tokens, Arc::new(connector));
        let events = manager.subscribe();

        Self {
            manager,
            record,
            accepted,
            events,
        }
    }

    async fn server(&mut self) -> ServerHandle {
        tokio::time::timeout(WAIT, self.accepted.recv())
            .await
            .expect("timed out waiting for a connection")
            .expect("connector dropped")
    }

    fn connects(&self) -> usize {
        self.record.lock().connects.len()
    }

    fn urls(&self) -> Vec<String> {
        self.record
            .lock()
            .connects
            .iter()
            .map(|(_, url)| url.clone())
            .collect()
    }

    fn messages(&self) -> Vec<String> {
        self.manager
            .snapshot()
            .iter()
            .map(|e| e.message.clone())
            .collect()
    }

    fn announcements(&self) -> Vec<String> {
        self.messages()
            .into_iter()
            .filter(|m| m.starts_with("Connection lost."))
            .collect()
    }
}

async fn wait_for_entry(sub: &mut Subscription, pred: impl Fn(&LogEntry) -> bool) -> Arc<LogEntry> {
    tokio::time::timeout(WAIT, async {
        loop {
            match sub.recv().await {
                Some(StreamEvent::Entry(entry)) if pred(&entry) => return entry,
                Some(_) => continue,
                None => panic!("manager went away"),
            }
        }
    })
    .await
    .expect("timed out waiting for entry")
}

async fn wait_for_message(sub: &mut Subscription, text: &str) -> Arc<LogEntry> {
    wait_for_entry(sub, |e| e.message == text).await
}

async fn wait_for_status(sub: &mut Subscription, connected: bool) {
    tokio::time::timeout(WAIT, async {
        loop {
            match sub.recv().await {
                Some(StreamEvent::ConnectionStatus(c)) if c == connected => return,
                Some(_) => continue,
                None => panic!("manager went away"),
            }
        }
    })
    .await
    .expect("timed out waiting for status");
}

fn drain_statuses(sub: &mut Subscription) -> Vec<bool> {
    let mut statuses = Vec::new();
    while let Some(event) = sub.try_recv() {
        if let StreamEvent::ConnectionStatus(c) = event {
            statuses.push(c);
        }
    }
    statuses
}

fn frame(kind: &str, message: &str) -> TransportEvent {
    TransportEvent::Message(format!(r#"{{"type":"{kind}","message":"{message}"}}"#))
}

#[tokio::test(start_paused = true)]
async fn test_backoff_schedule_and_exhaustion() {
    let mut h = Harness::new(vec![]);
    h.manager.start_logging("web").await.unwrap();

    wait_for_message(&mut h.events, "Failed to reconnect after 5 attempts").await;

    let times: Vec<Instant> = h.record.lock().connects.iter().map(|(t, _)| *t).collect();
    assert_eq!(times.len(), 6);
    let gaps: Vec<u128> = times.windows(2).map(|w| (w[1] - w[0]).as_millis()).collect();
    assert_eq!(gaps, vec![2000, 3000, 4500, 6750, 10125]);

    assert_eq!(
        h.announcements(),
        vec![
            "Connection lost. Reconnecting in 2 seconds... (Attempt 1/5)",
            "Connection lost. Reconnecting in 3 seconds... (Attempt 2/5)",
            "Connection lost. Reconnecting in 5 seconds... (Attempt 3/5)",
            "Connection lost. Reconnecting in 7 seconds... (Attempt 4/5)",
            "Connection lost. Reconnecting in 10 seconds... (Attempt 5/5)",
        ]
    );
    assert_eq!(h.manager.state(), ConnectionState::Idle);

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(h.connects(), 6);
}

#[tokio::test(start_paused = true)]
async fn test_handshake_failure_reports_before_retry() {
    let mut h = Harness::new(vec![]);
    h.manager.start_logging("web").await.unwrap();
    wait_for_message(
        &mut h.events,
        "Connection lost. Reconnecting in 2 seconds... (Attempt 1/5)",
    )
    .await;

    assert_eq!(
        h.messages(),
        vec![
            "Connecting to logs for web...",
            "Failed to connect to log service: Connection failed: refused",
            "Connection lost. Reconnecting in 2 seconds... (Attempt 1/5)",
        ]
    );
    assert_eq!(h.manager.state(), ConnectionState::Reconnecting);
    assert!(h.urls()[0].ends_with("/ws/logs/tok"));
    assert!(h.urls()[0].starts_with("ws://logs.test"));
}

#[tokio::test(start_paused = true)]
async fn test_start_then_immediate_stop() {
    let mut h = Harness::new(vec![Plan::Hang]);
    h.manager.start_logging("web").await.unwrap();
    h.manager.stop_logging().await.unwrap();

    assert_eq!(h.manager.state(), ConnectionState::Idle);
    tokio::time::sleep(Duration::from_secs(120)).await;

    assert_eq!(h.connects(), 1);
    assert!(h.announcements().is_empty());
    assert_eq!(h.messages().last().unwrap(), "Log streaming stopped");
    assert!(drain_statuses(&mut h.events).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_stop_when_idle_is_noop() {
    let mut h = Harness::new(vec![]);
    h.manager.stop_logging().await.unwrap();
    h.manager.stop_logging().await.unwrap();

    assert_eq!(h.manager.state(), ConnectionState::Idle);
    assert!(h.messages().is_empty());
    assert!(h.events.try_recv().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_stream_then_stop() {
    let mut h = Harness::new(vec![Plan::Accept]);
    h.manager.start_logging("web").await.unwrap();
    let server = h.server().await;
    wait_for_status(&mut h.events, true).await;
    assert!(h.manager.is_connected());
    assert_eq!(h.manager.state(), ConnectionState::Open);

    server
        .send(frame("log_line", "2024-01-01T00:00:00 server listening on 9.9.9.9"))
        .unwrap();
    let entry = wait_for_entry(&mut h.events, |e| e.message.contains("listening")).await;
    assert_eq!(entry.timestamp.as_deref(), Some("2024-01-01T00:00:00"));

    server.send(TransportEvent::Message("not json".into())).unwrap();
    wait_for_entry(&mut h.events, |e| {
        e.message.starts_with("Failed to parse log message:")
    })
    .await;
    server.send(frame("metrics", "nope")).unwrap();
    server.send(frame("log_error", "still here")).unwrap();
    wait_for_message(&mut h.events, "still here").await;
    assert_eq!(h.manager.state(), ConnectionState::Open);

    h.manager.stop_logging().await.unwrap();
    wait_for_message(&mut h.events, "Log streaming stopped").await;

    {
        let record = h.record.lock();
        assert_eq!(
            record.sent,
            vec![
                r#"{"type":"start_logs","container_name":"web"}"#,
                r#"{"type":"stop_logs"}"#,
            ]
        );
        assert_eq!(record.closes, vec![1000]);
    }
    assert_eq!(h.manager.state(), ConnectionState::Idle);
    assert!(!h.manager.is_connected());

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(h.connects(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_status_edges_only() {
    let mut h = Harness::new(vec![Plan::Accept]);
    let mut statuses = h.manager.subscribe();

    h.manager.start_logging("web").await.unwrap();
    let server = h.server().await;
    wait_for_status(&mut h.events, true).await;
    server.send(frame("system", "hello")).unwrap();
    wait_for_message(&mut h.events, "hello").await;
    h.manager.stop_logging().await.unwrap();
    h.manager.stop_logging().await.unwrap();

    assert_eq!(drain_statuses(&mut statuses), vec![true, false]);
}

#[tokio::test(start_paused = true)]
async fn test_normal_close_does_not_reconnect() {
    let mut h = Harness::new(vec![Plan::Accept]);
    h.manager.start_logging("web").await.unwrap();
    let server = h.server().await;
    wait_for_status(&mut h.events, true).await;

    server
        .send(TransportEvent::Closed {
            code: 1000,
            reason: "done".into(),
        })
        .unwrap();
    wait_for_status(&mut h.events, false).await;

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(h.connects(), 1);
    assert!(h.announcements().is_empty());
    assert_eq!(h.manager.state(), ConnectionState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_abnormal_close_reconnects_and_open_resets_attempts() {
    let mut h = Harness::new(vec![Plan::Accept, Plan::Accept]);
    h.manager.start_logging("web").await.unwrap();
    let first = h.server().await;
    wait_for_status(&mut h.events, true).await;

    first
        .send(TransportEvent::Closed {
            code: 1005,
            reason: String::new(),
        })
        .unwrap();
    wait_for_message(
        &mut h.events,
        "Connection lost. Reconnecting in 2 seconds... (Attempt 1/5)",
    )
    .await;

    let second = h.server().await;
    wait_for_status(&mut h.events, true).await;
    assert_eq!(h.connects(), 2);

    second
        .send(TransportEvent::Closed {
            code: 1011,
            reason: "server error".into(),
        })
        .unwrap();
    wait_for_entry(&mut h.events, |e| e.message.starts_with("Connection lost.")).await;

    assert_eq!(
        h.announcements(),
        vec![
            "Connection lost. Reconnecting in 2 seconds... (Attempt 1/5)",
            "Connection lost. Reconnecting in 2 seconds... (Attempt 1/5)",
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_dropped_socket_reports_error_then_reconnects() {
    let mut h = Harness::new(vec![Plan::Accept]);
    h.manager.start_logging("web").await.unwrap();
    let server = h.server().await;
    wait_for_status(&mut h.events, true).await;

    server
        .send(TransportEvent::Error(TransportError::Socket("reset".into())))
        .unwrap();
    drop(server);

    wait_for_message(&mut h.events, "WebSocket connection error: Socket error: reset").await;
    wait_for_status(&mut h.events, false).await;
    wait_for_entry(&mut h.events, |e| e.message.starts_with("Connection lost.")).await;
}

#[tokio::test(start_paused = true)]
async fn test_empty_container_rejected() {
    let h = Harness::new(vec![Plan::Accept]);

    assert_eq!(
        h.manager.start_logging("").await,
        Err(StreamError::Auth(AuthError::MissingContainer))
    );
    assert_eq!(
        h.manager.start_logging("   ").await,
        Err(StreamError::Auth(AuthError::MissingContainer))
    );

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(h.connects(), 0);
    assert_eq!(h.manager.state(), ConnectionState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_token_failure_on_start() {
    let h = Harness::with_tokens(vec![Plan::Accept], Arc::new(StaticTokenProvider::new(None)));

    assert_eq!(
        h.manager.start_logging("web").await,
        Err(StreamError::Auth(AuthError::Unauthenticated))
    );

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(h.connects(), 0);
    assert_eq!(h.manager.state(), ConnectionState::Idle);
    assert!(!h.manager.is_connected());
}

#[tokio::test(start_paused = true)]
async fn test_rejected_token_is_refetched() {
    let tokens = Arc::new(ScriptedTokens::new(vec![Ok("t1".into()), Ok("t2".into())]));
    let mut h = Harness::with_tokens(
        vec![Plan::Reject(TransportError::Rejected(401)), Plan::Accept],
        Arc::clone(&tokens) as Arc<dyn TokenProvider>,
    );

    h.manager.start_logging("web").await.unwrap();
    wait_for_status(&mut h.events, true).await;

    let urls = h.urls();
    assert_eq!(urls.len(), 2);
    assert!(urls[0].ends_with("/ws/logs/t1"));
    assert!(urls[1].ends_with("/ws/logs/t2"));
    assert_eq!(tokens.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_transient_failure_reuses_token() {
    let tokens = Arc::new(ScriptedTokens::new(vec![Ok("t1".into())]));
    let mut h = Harness::with_tokens(
        vec![
            Plan::Reject(TransportError::Connect("refused".into())),
            Plan::Accept,
        ],
        Arc::clone(&tokens) as Arc<dyn TokenProvider>,
    );

    h.manager.start_logging("web").await.unwrap();
    wait_for_status(&mut h.events, true).await;

    assert!(h.urls().iter().all(|u| u.ends_with("/ws/logs/t1")));
    assert_eq!(tokens.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_token_refresh_failure_uses_retry_budget() {
    let tokens = Arc::new(ScriptedTokens::new(vec![Ok("t1".into())]));
    let mut h = Harness::with_tokens(
        vec![Plan::Reject(TransportError::Rejected(403))],
        Arc::clone(&tokens) as Arc<dyn TokenProvider>,
    );

    h.manager.start_logging("web").await.unwrap();
    wait_for_message(
        &mut h.events,
        "Failed to authenticate for log streaming: not authenticated for log streaming",
    )
    .await;
    wait_for_message(
        &mut h.events,
        "Connection lost. Reconnecting in 3 seconds... (Attempt 2/5)",
    )
    .await;

    assert_eq!(h.connects(), 1);
    wait_for_message(&mut h.events, "Failed to reconnect after 5 attempts").await;
    assert_eq!(h.manager.state(), ConnectionState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_subscription_history_and_unsubscribe() {
    let mut h = Harness::new(vec![Plan::Accept]);
    h.manager.start_logging("web").await.unwrap();
    let server = h.server().await;
    wait_for_status(&mut h.events, true).await;

    for n in 0..3 {
        server.send(frame("log_line", &format!("line {n}"))).unwrap();
    }
    wait_for_message(&mut h.events, "line 2").await;

    let mut late = h.manager.subscribe();
    let history: Vec<String> = late.history().iter().map(|e| e.message.clone()).collect();
    assert_eq!(
        history,
        vec!["Connecting to logs for web...", "line 0", "line 1", "line 2"]
    );
    assert!(late.try_recv().is_none());

    server.send(frame("log_line", "line 3")).unwrap();
    let entry = wait_for_message(&mut late, "line 3").await;
    assert_eq!(entry.message, "line 3");
    assert!(late.try_recv().is_none());

    assert_eq!(h.manager.subscriber_count(), 2);
    late.unsubscribe();
    assert_eq!(h.manager.subscriber_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_new_start_supersedes_pending_reconnect() {
    let mut h = Harness::new(vec![
        Plan::Reject(TransportError::Connect("refused".into())),
        Plan::Accept,
    ]);

    h.manager.start_logging("web").await.unwrap();
    wait_for_entry(&mut h.events, |e| e.message.starts_with("Connection lost.")).await;

    h.manager.start_logging("api").await.unwrap();
    let _server = h.server().await;
    wait_for_status(&mut h.events, true).await;

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(h.connects(), 2);
    assert_eq!(h.manager.state(), ConnectionState::Open);
    assert_eq!(h.manager.current_container().as_deref(), Some("api"));
    assert_eq!(
        h.record.lock().sent,
        vec![r#"{"type":"start_logs","container_name":"api"}"#]
    );
}

#[tokio::test(start_paused = true)]
async fn test_stop_cancels_scheduled_reconnect() {
    let mut h = Harness::new(vec![Plan::Reject(TransportError::Connect("refused".into()))]);

    h.manager.start_logging("web").await.unwrap();
    wait_for_entry(&mut h.events, |e| e.message.starts_with("Connection lost.")).await;
    assert_eq!(h.manager.state(), ConnectionState::Reconnecting);

    h.manager.stop_logging().await.unwrap();
    assert_eq!(h.manager.state(), ConnectionState::Idle);

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(h.connects(), 1);
    assert_eq!(h.manager.state(), ConnectionState::Idle);
    assert_eq!(h.announcements().len(), 1);
    assert!(!h.messages().iter().any(|m| m == "Log streaming stopped"));
}

#[tokio::test(start_paused = true)]
async fn test_switching_container_closes_previous_socket() {
    let mut h = Harness::new(vec![Plan::Accept, Plan::Accept]);
    h.manager.start_logging("web").await.unwrap();
    let _first = h.server().await;
    wait_for_status(&mut h.events, true).await;

    h.manager.start_logging("api").await.unwrap();
    let _second = h.server().await;
    wait_for_status(&mut h.events, true).await;

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(h.record.lock().closes, vec![1000]);
    assert!(h.announcements().is_empty());
    assert_eq!(h.connects(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_clear_keeps_connection() {
    let mut h = Harness::new(vec![Plan::Accept]);
    h.manager.start_logging("web").await.unwrap();
    let server = h.server().await;
    wait_for_status(&mut h.events, true).await;

    server.send(frame("log_line", "before")).unwrap();
    wait_for_message(&mut h.events, "before").await;

    h.manager.clear_logs();
    h.manager.clear_logs();
    assert!(h.manager.snapshot().is_empty());
    assert_eq!(h.manager.state(), ConnectionState::Open);
    assert!(h.manager.is_connected());

    server.send(frame("log_line", "after")).unwrap();
    wait_for_message(&mut h.events, "after").await;
    assert_eq!(h.messages(), vec!["after"]);
}

#[tokio::test(start_paused = true)]
async fn test_auto_scroll_flag() {
    let h = Harness::new(vec![]);
    assert!(h.manager.is_auto_scroll_enabled());
    h.manager.set_auto_scroll(false);
    assert!(!h.manager.is_auto_scroll_enabled());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_ends_subscriptions() {
    let mut h = Harness::new(vec![Plan::Accept]);
    h.manager.start_logging("web").await.unwrap();
    let _server = h.server().await;
    wait_for_status(&mut h.events, true).await;

    let Harness {
        manager,
        record,
        mut events,
        ..
    } = h;
    manager.shutdown().await;

    let ended = tokio::time::timeout(WAIT, async {
        while events.recv().await.is_some() {}
    })
    .await;
    assert!(ended.is_ok());
    assert_eq!(record.lock().closes, vec![1000]);
}
