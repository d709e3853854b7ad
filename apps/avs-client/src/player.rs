//! Concrete [`AudioPlayer`] implementation: writes the MP3 payload to a
//! scratch file and hands it to a spawned decoder process.
//!
//! Grounded directly on `alexa_audio.py`'s `play_mp3`: pick `madplay` on
//! `mips` targets (the original hardware this client ran on lacked a
//! usable `ffplay` build) and `ffplay` everywhere else, write the payload
//! to disk, and let the external process handle decoding and output.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use avs_core::collaborators::{AudioPlayer, PlayerError};
use bytes::Bytes;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// Plays MP3 audio by spawning an external decoder process against a
/// scratch file, matching the external-player collaborator contract: any
/// decoder with equivalent stdin/file-based playback semantics qualifies.
pub struct ProcessAudioPlayer {
    command: String,
    args: Vec<String>,
    scratch_dir: PathBuf,
    next_id: AtomicU64,
}

impl ProcessAudioPlayer {
    /// Picks the decoder the original hardware used: `madplay` on `mips`
    /// targets, `ffplay` everywhere else.
    #[must_use]
    pub fn new_default() -> Self {
        if std::env::consts::ARCH == "mips" {
            Self::new("madplay".to_string(), Vec::new())
        } else {
            Self::new(
                "ffplay".to_string(),
                vec!["-autoexit".into(), "-nodisp".into(), "-loglevel".into(), "quiet".into()],
            )
        }
    }

    #[must_use]
    pub fn new(command: String, args: Vec<String>) -> Self {
        Self {
            command,
            args,
            scratch_dir: std::env::temp_dir(),
            next_id: AtomicU64::new(0),
        }
    }

    fn scratch_path(&self) -> PathBuf {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.scratch_dir
            .join(format!("avs-client-{}-{id}.mp3", std::process::id()))
    }

    async fn play_file(&self, path: &PathBuf) -> Result<(), PlayerError> {
        let status = Command::new(&self.command)
            .args(&self.args)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| PlayerError::Spawn(e.to_string()))?;

        if status.success() {
            Ok(())
        } else {
            Err(PlayerError::ExitStatus(status.to_string()))
        }
    }
}

#[async_trait]
impl AudioPlayer for ProcessAudioPlayer {
    async fn play(&self, audio: Bytes) -> Result<(), PlayerError> {
        let path = self.scratch_path();
        tokio::fs::write(&path, &audio)
            .await
            .map_err(|e| PlayerError::Spawn(e.to_string()))?;

        let result = self.play_file(&path).await;
        if let Err(e) = tokio::fs::remove_file(&path).await {
            log::debug!("[ProcessAudioPlayer] failed to clean up {}: {e}", path.display());
        }
        result
    }

    async fn play_looped(&self, tone: Bytes, stop: CancellationToken, max_duration: Duration) {
        if tone.is_empty() {
            log::warn!("[ProcessAudioPlayer] no alert tone configured, sleeping silently instead");
            tokio::select! {
                () = stop.cancelled() => {}
                () = tokio::time::sleep(max_duration) => {}
            }
            return;
        }

        let deadline = tokio::time::Instant::now() + max_duration;
        loop {
            if stop.is_cancelled() || tokio::time::Instant::now() >= deadline {
                return;
            }
            tokio::select! {
                () = stop.cancelled() => return,
                result = self.play(tone.clone()) => {
                    if let Err(e) = result {
                        log::warn!("[ProcessAudioPlayer] alert tone playback failed: {e}");
                        return;
                    }
                }
            }
        }
    }
}
