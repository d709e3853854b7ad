//! Fixed protocol constants that should NOT be changed.
//!
//! These values are defined by the Alexa Voice Service API (v20160207) or by
//! wire conventions this client has always used; changing them breaks
//! protocol compliance with the service or with older config files.

// ─────────────────────────────────────────────────────────────────────────────
// AVS endpoints
// ─────────────────────────────────────────────────────────────────────────────

/// Host for the persistent HTTP/2 session to AVS.
pub const AVS_HOST: &str = "avs-alexa-na.amazon.com";

/// API version prefix prepended to every path except `/ping`.
pub const AVS_API_VERSION_PATH: &str = "/v20160207";

/// OAuth2 token refresh endpoint.
pub const TOKEN_ENDPOINT: &str = "https://api.amazon.com/auth/o2/token";

// ─────────────────────────────────────────────────────────────────────────────
// Multipart framing
// ─────────────────────────────────────────────────────────────────────────────

/// Outbound multipart boundary. Any RFC 2046 token works; this one matches
/// what the client has always sent and does not need to persist across
/// restarts.
pub const OUTBOUND_BOUNDARY: &str = "this-is-my-boundary";

// ─────────────────────────────────────────────────────────────────────────────
// Token lifecycle
// ─────────────────────────────────────────────────────────────────────────────

/// Seconds of safety margin subtracted from a token's `expires_in` before
/// it is considered due for refresh.
pub const TOKEN_REFRESH_SKEW_SECS: i64 = 30;

// ─────────────────────────────────────────────────────────────────────────────
// Keepalive
// ─────────────────────────────────────────────────────────────────────────────

/// Interval between `GET /ping` keepalive requests.
pub const PING_INTERVAL_SECS: u64 = 240;

// ─────────────────────────────────────────────────────────────────────────────
// Alerts
// ─────────────────────────────────────────────────────────────────────────────

/// Maximum duration an alert tone plays in the foreground before it is
/// treated as complete even if the player never signals completion.
pub const ALERT_FOREGROUND_MAX_SECS: u64 = 30;

// ─────────────────────────────────────────────────────────────────────────────
// SpeechRecognizer.Recognize payload
// ─────────────────────────────────────────────────────────────────────────────

pub const RECOGNIZE_PROFILE: &str = "CLOSE_TALK";
pub const RECOGNIZE_FORMAT: &str = "AUDIO_L16_RATE_16000_CHANNELS_1";

// ─────────────────────────────────────────────────────────────────────────────
// Message/dialog identifiers
// ─────────────────────────────────────────────────────────────────────────────

/// Message ID prefix segment, kept for wire compatibility with the client
/// this was ported from.
pub const MESSAGE_ID_PREFIX: &str = "njc_message_id";

/// Dialog ID prefix segment, kept for wire compatibility.
pub const DIALOG_ID_PREFIX: &str = "njc_dialog_id";
