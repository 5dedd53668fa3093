//! Duplex transport seam
//!
//! The manager only needs three things from a connection: send a text frame,
//! wait for the next inbound event, and close with a code. [`Connector`] and
//! [`Connection`] capture exactly that so tests can script the server side.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::error::TransportError;
use crate::protocol::{ABNORMAL_CLOSURE, NO_STATUS_CLOSURE};

/// Inbound event on an open connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Text frame
    Message(String),

    /// Socket level failure; a `Closed` event follows
    Error(TransportError),

    /// Connection closed by the peer or the network
    Closed { code: u16, reason: String },
}

/// Opens connections to a streaming URL
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Box<dyn Connection>, TransportError>;
}

/// An established duplex connection
#[async_trait]
pub trait Connection: Send {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    /// Next inbound event, or `None` once the connection has closed
    async fn next_event(&mut self) -> Option<TransportEvent>;

    /// Start the close handshake; errors are not reported
    async fn close(&mut self, code: u16, reason: &str);
}

/// WebSocket connector built on tokio-tungstenite
#[derive(Debug, Clone, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn Connection>, TransportError> {
        match tokio_tungstenite::connect_async(url).await {
            Ok((stream, _response)) => Ok(Box::new(WsConnection::new(stream))),
            Err(WsError::Http(response)) => Err(TransportError::Rejected(response.status().as_u16())),
            Err(e) => Err(TransportError::Connect(e.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Open,
    /// An error was reported; the abnormal close is still owed
    Failed,
    Closed,
}

/// Open WebSocket connection
pub struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    phase: Phase,
}

impl WsConnection {
    fn new(stream: WebSocketStream<MaybeTlsStream<TcpStream>>) -> Self {
        Self {
            stream,
            phase: Phase::Open,
        }
    }
}

#[async_trait]
impl Connection for WsConnection {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.stream
            .send(Message::Text(text))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn next_event(&mut self) -> Option<TransportEvent> {
        match self.phase {
            Phase::Closed => return None,
            Phase::Failed => {
                self.phase = Phase::Closed;
                return Some(TransportEvent::Closed {
                    code: ABNORMAL_CLOSURE,
                    reason: String::new(),
                });
            }
            Phase::Open => {}
        }

        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Some(TransportEvent::Message(text)),
                Some(Ok(Message::Close(frame))) => {
                    self.phase = Phase::Closed;
                    let (code, reason) = frame
                        .map(|f| (u16::from(f.code), f.reason.into_owned()))
                        .unwrap_or((NO_STATUS_CLOSURE, String::new()));
                    return Some(TransportEvent::Closed { code, reason });
                }
                Some(Ok(Message::Binary(data))) => {
                    tracing::debug!(bytes = data.len(), "ignoring binary frame");
                }
                // Pings are answered by tungstenite on the next read
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    self.phase = Phase::Failed;
                    return Some(TransportEvent::Error(TransportError::Socket(e.to_string())));
                }
                None => {
                    self.phase = Phase::Closed;
                    return Some(TransportEvent::Closed {
                        code: ABNORMAL_CLOSURE,
                        reason: "connection dropped".to_string(),
                    });
                }
            }
        }
    }

    async fn close(&mut self, code: u16, reason: &str) {
        if self.phase != Phase::Open {
            return;
        }
        self.phase = Phase::Closed;
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: reason.to_owned().into(),
        };
        if let Err(e) = self.stream.close(Some(frame)).await {
            tracing::debug!(error = %e, "error closing socket");
        }
    }
}

/// Streaming URL with the token replaced, safe for logs
pub fn redact_token(url: &str) -> String {
    match url.rfind('/') {
        Some(pos) if pos + 1 < url.len() => format!("{}/<token>", &url[..pos]),
        _ => url.to_string(),
    }
}
