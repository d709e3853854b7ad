//! Narrow interfaces to the external collaborators kept deliberately out of
//! the protocol engine's scope: the wake-word microphone and the audio
//! player subprocess. The engine only ever sees these traits; concrete
//! implementations (real capture hardware, a spawned decoder process) live
//! in the binary crate that wires a deployment together.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Errors a concrete [`AudioPlayer`] implementation may report.
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("failed to spawn player process: {0}")]
    Spawn(String),

    #[error("player process exited with a failure status: {0}")]
    ExitStatus(String),
}

/// Captures microphone audio. The wake-word engine and capture hardware
/// are narrow external collaborators, deliberately out of scope here.
#[async_trait]
pub trait Microphone: Send + Sync {
    /// Blocks until the wake word is detected, or the microphone is closed.
    /// Returns `false` if the microphone was closed while waiting.
    async fn wakeup(&self, keyword: &str) -> bool;

    /// Captures audio until silence or `timeout` elapses, returning raw
    /// 16-bit little-endian mono PCM at 16 kHz. An empty buffer means no
    /// speech was captured within the timeout.
    async fn listen(&self, timeout: Option<Duration>) -> Vec<u8>;
}

/// Plays decoded audio. Any decoder with equivalent stdin-streaming
/// semantics (`madplay`, `ffplay`, …) qualifies; deliberately out of scope
/// here.
#[async_trait]
pub trait AudioPlayer: Send + Sync {
    /// Plays a complete in-memory buffer to completion (an MP3
    /// `SpeechSynthesizer.Speak` attachment).
    ///
    /// # Errors
    ///
    /// Returns [`PlayerError`] if the decoder process could not be started
    /// or exited with a failure status.
    async fn play(&self, audio: Bytes) -> Result<(), PlayerError>;

    /// Plays `tone` repeatedly in the foreground until `stop` is cancelled
    /// or `max_duration` elapses, whichever comes first (an alert tone).
    /// Playback errors are logged and treated as "stop repeating" rather
    /// than propagated — a missing alert tone should not wedge the
    /// scheduler.
    async fn play_looped(&self, tone: Bytes, stop: CancellationToken, max_duration: Duration);
}
