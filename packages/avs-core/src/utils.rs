//! General utilities shared across the core library.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};

use crate::protocol_constants::{DIALOG_ID_PREFIX, MESSAGE_ID_PREFIX};

// ─────────────────────────────────────────────────────────────────────────────
// Time utilities
// ─────────────────────────────────────────────────────────────────────────────

/// Returns the current Unix timestamp in milliseconds.
///
/// Returns 0 if the system clock is before the Unix epoch (shouldn't happen
/// in practice).
#[must_use]
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Parses an alert's `scheduledTime` field, which AVS sends as ISO-8601 with
/// an explicit offset (e.g. `2023-05-01T07:00:00+00:00`).
pub fn parse_iso8601(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc))
}

/// Formats a timestamp the way AVS expects it back in `Alerts.AlertsState`.
#[must_use]
pub fn format_iso8601(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

// ─────────────────────────────────────────────────────────────────────────────
// Message / dialog identifiers
// ─────────────────────────────────────────────────────────────────────────────

/// Monotonic generator for `messageId`/`dialogId` values.
///
/// AVS only requires these be unique per session; the `<prefix>-<epoch>-<seq>`
/// shape is kept for compatibility with the client this was ported from.
pub struct IdGenerator {
    epoch_secs: u64,
    counter: AtomicU64,
}

impl IdGenerator {
    /// Creates a generator stamped with the current time. All IDs it emits
    /// share that epoch; only the trailing counter increments.
    #[must_use]
    pub fn new() -> Self {
        Self {
            epoch_secs: now_millis() / 1000,
            counter: AtomicU64::new(0),
        }
    }

    fn next_suffix(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::Relaxed)
    }

    /// Generates the next unique message ID.
    #[must_use]
    pub fn next_message_id(&self) -> String {
        format!(
            "{}-{}-{}",
            MESSAGE_ID_PREFIX,
            self.epoch_secs,
            self.next_suffix()
        )
    }

    /// Generates the next unique dialog request ID.
    #[must_use]
    pub fn next_dialog_id(&self) -> String {
        format!(
            "{}-{}-{}",
            DIALOG_ID_PREFIX,
            self.epoch_secs,
            self.next_suffix()
        )
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
