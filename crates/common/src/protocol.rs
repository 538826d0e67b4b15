//! Request/response messages exchanged through the queue and response files.
//!
//! Every message is one JSON object on its own line. Field names are
//! camelCase on the wire.

use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::BridgeError;

/// One host capability exposed by the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Service {
    #[serde(alias = "vscode")]
    Editor,
    Audio,
    Speech,
}

impl Service {
    /// Dispatch order used by the daemon for every poll cycle.
    pub const ALL: [Service; 3] = [Service::Editor, Service::Audio, Service::Speech];

    pub fn as_str(&self) -> &'static str {
        match self {
            Service::Editor => "editor",
            Service::Audio => "audio",
            Service::Speech => "speech",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Service {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "editor" | "vscode" => Ok(Service::Editor),
            "audio" => Ok(Service::Audio),
            "speech" => Ok(Service::Speech),
            other => Err(BridgeError::Malformed(format!("unknown service '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Error,
    Timeout,
    Skipped,
}

impl fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ResponseStatus::Success => "success",
            ResponseStatus::Error => "error",
            ResponseStatus::Timeout => "timeout",
            ResponseStatus::Skipped => "skipped",
        };
        f.write_str(label)
    }
}

/// A request written by the client to `requests/<service>.queue`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeRequest {
    pub id: Uuid,
    pub service: Service,
    pub action: String,
    #[serde(default)]
    pub payload: Map<String, Value>,
    /// RFC 3339. Kept verbatim so an unparsable value still reaches the handler.
    pub timestamp: String,
    #[serde(alias = "timeout")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub priority: Priority,
}

impl BridgeRequest {
    pub fn new(
        service: Service,
        action: impl Into<String>,
        payload: Map<String, Value>,
        timeout_ms: u64,
        priority: Priority,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            service,
            action: action.into(),
            payload,
            timestamp: now_rfc3339(),
            timeout_ms,
            priority,
        }
    }

    pub fn parsed_timestamp(&self) -> Option<DateTime<FixedOffset>> {
        DateTime::parse_from_rfc3339(self.timestamp.trim()).ok()
    }

    pub fn payload_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }

    pub fn payload_f64(&self, key: &str) -> Option<f64> {
        self.payload.get(key).and_then(Value::as_f64)
    }

    pub fn payload_u64(&self, key: &str) -> Option<u64> {
        self.payload.get(key).and_then(Value::as_u64)
    }

    /// Required string field; blank strings count as missing.
    pub fn require_str(&self, key: &'static str) -> Result<&str, BridgeError> {
        self.payload_str(key)
            .filter(|value| !value.trim().is_empty())
            .ok_or(BridgeError::MissingField(key))
    }
}

/// A response appended by a handler to `responses/<service>.response`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeResponse {
    pub id: Uuid,
    pub status: ResponseStatus,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Map<String, Value>>,
    pub timestamp: String,
}

impl BridgeResponse {
    pub fn new(id: Uuid, status: ResponseStatus, message: impl Into<String>) -> Self {
        Self {
            id,
            status,
            message: message.into(),
            data: None,
            timestamp: now_rfc3339(),
        }
    }

    pub fn success(id: Uuid, message: impl Into<String>) -> Self {
        Self::new(id, ResponseStatus::Success, message)
    }

    pub fn error(id: Uuid, message: impl Into<String>) -> Self {
        Self::new(id, ResponseStatus::Error, message)
    }

    pub fn skipped(id: Uuid, message: impl Into<String>) -> Self {
        Self::new(id, ResponseStatus::Skipped, message)
    }

    /// Attach a JSON object as `data`. Non-object values are ignored.
    pub fn with_data(mut self, data: Value) -> Self {
        if let Value::Object(map) = data {
            self.data = Some(map);
        }
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == ResponseStatus::Success
    }

    pub fn data_value(&self, key: &str) -> Option<&Value> {
        self.data.as_ref().and_then(|data| data.get(key))
    }
}

pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
