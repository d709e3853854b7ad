//! Domain event system for observability.
//!
//! This module provides [`EventEmitter`], a trait domain services depend on
//! rather than logging directly, so event flow stays testable (a test can
//! inject a counting emitter instead of asserting on log output).

mod emitter;

pub use emitter::{EventEmitter, LoggingEventEmitter, NoopEventEmitter};

use serde::Serialize;

/// All events a running client can emit.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "category", rename_all = "camelCase")]
pub enum DomainEvent {
    /// Events on the persistent AVS connection.
    Connection(ConnectionEvent),

    /// Events from a dialog turn (recognize → directives).
    Dialog(DialogEvent),

    /// Events from the alert scheduler.
    Alert(AlertEvent),
}

/// Events on the persistent connection to AVS.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ConnectionEvent {
    /// The HTTP/2 session was (re)established.
    Connected { timestamp: u64 },
    /// The downchannel stream ended and is being re-established.
    DownchannelReconnecting { reason: String, timestamp: u64 },
    /// A keepalive ping succeeded or failed.
    PingResult { ok: bool, timestamp: u64 },
    /// The access token was refreshed.
    TokenRefreshed { expires_in_secs: i64, timestamp: u64 },
}

/// Events from a dialog turn.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DialogEvent {
    /// A `SpeechRecognizer.Recognize` event was sent.
    RecognizeSent { dialog_request_id: String, timestamp: u64 },
    /// A directive was dispatched.
    DirectiveDispatched {
        namespace: String,
        name: String,
        timestamp: u64,
    },
    /// A directive could not be dispatched.
    DirectiveFailed {
        namespace: String,
        name: String,
        reason: String,
        timestamp: u64,
    },
}

/// Events from the alert scheduler.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum AlertEvent {
    /// An alert was armed with a `tokio::time::sleep` timer.
    Scheduled { token: String, timestamp: u64 },
    /// An alert's timer fired and it started playing.
    Fired { token: String, timestamp: u64 },
    /// An alert was deleted before it fired.
    Deleted { token: String, timestamp: u64 },
}

impl From<ConnectionEvent> for DomainEvent {
    fn from(event: ConnectionEvent) -> Self {
        Self::Connection(event)
    }
}

impl From<DialogEvent> for DomainEvent {
    fn from(event: DialogEvent) -> Self {
        Self::Dialog(event)
    }
}

impl From<AlertEvent> for DomainEvent {
    fn from(event: AlertEvent) -> Self {
        Self::Alert(event)
    }
}
