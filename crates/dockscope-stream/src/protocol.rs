use serde::Serialize;

/// Close code for an orderly, intentional shutdown
pub const NORMAL_CLOSURE: u16 = 1000;

/// Close frame arrived without a status code
pub const NO_STATUS_CLOSURE: u16 = 1005;

/// Connection dropped without a close frame, or the handshake failed
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// Client → server control frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlMessage {
    StartLogs { container_name: String },
    StopLogs,
}

impl ControlMessage {
    pub fn start(container: impl Into<String>) -> Self {
        Self::StartLogs {
            container_name: container.into(),
        }
    }

    /// Serialize to the JSON text frame sent on the wire
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
