//! Shared runtime state, snapshotted into the `context` array of every
//! outbound event.
//!
//! The AVS client tracks just enough locally observed state to answer
//! `AudioPlayer.PlaybackState` and `Speaker.VolumeState` without a
//! synchronous round-trip to the player or microphone collaborators on
//! every request. `speech_activity` is also tracked here (set by the
//! dispatcher around `Speak` playback) even though it isn't part of the
//! three-object context array the spec defines.

use parking_lot::RwLock;
use serde_json::{json, Value};

/// Mirrors `AudioPlayer.PlaybackState`'s `state` enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerActivity {
    Idle,
    Playing,
    Paused,
    BufferUnderrun,
    Finished,
    Stopped,
}

impl PlayerActivity {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Playing => "PLAYING",
            Self::Paused => "PAUSED",
            Self::BufferUnderrun => "BUFFER_UNDERRUN",
            Self::Finished => "FINISHED",
            Self::Stopped => "STOPPED",
        }
    }
}

impl Default for PlayerActivity {
    fn default() -> Self {
        Self::Idle
    }
}

/// Mirrors `SpeechSynthesizer.SpeechState`'s `state` enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechActivity {
    Playing,
    Finished,
}

impl SpeechActivity {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Playing => "PLAYING",
            Self::Finished => "FINISHED",
        }
    }
}

impl Default for SpeechActivity {
    fn default() -> Self {
        Self::Finished
    }
}

/// Locally observed client state, shared between the dispatcher (which
/// updates it as directives arrive) and the context assembler (which reads
/// it to build outbound event context).
#[derive(Debug, Default)]
pub struct ClientState {
    player_activity: RwLock<PlayerActivity>,
    speech_activity: RwLock<SpeechActivity>,
    volume: RwLock<u8>,
    muted: RwLock<bool>,
}

impl ClientState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            player_activity: RwLock::new(PlayerActivity::default()),
            speech_activity: RwLock::new(SpeechActivity::default()),
            volume: RwLock::new(100),
            muted: RwLock::new(false),
        }
    }

    pub fn set_player_activity(&self, activity: PlayerActivity) {
        *self.player_activity.write() = activity;
    }

    #[must_use]
    pub fn player_activity(&self) -> PlayerActivity {
        *self.player_activity.read()
    }

    pub fn set_speech_activity(&self, activity: SpeechActivity) {
        *self.speech_activity.write() = activity;
    }

    #[must_use]
    pub fn speech_activity(&self) -> SpeechActivity {
        *self.speech_activity.read()
    }

    pub fn set_volume(&self, volume: u8, muted: bool) {
        *self.volume.write() = volume;
        *self.muted.write() = muted;
    }

    #[must_use]
    pub fn volume(&self) -> (u8, bool) {
        (*self.volume.read(), *self.muted.read())
    }

    /// `AudioPlayer.PlaybackState` context object.
    #[must_use]
    pub fn playback_state_json(&self) -> Value {
        json!({
            "header": {"namespace": "AudioPlayer", "name": "PlaybackState"},
            "payload": {"state": self.player_activity().as_str()},
        })
    }

    /// `Speaker.VolumeState` context object.
    #[must_use]
    pub fn volume_state_json(&self) -> Value {
        let (volume, muted) = self.volume();
        json!({
            "header": {"namespace": "Speaker", "name": "VolumeState"},
            "payload": {"volume": volume, "muted": muted},
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_is_idle_and_unmuted() {
        let state = ClientState::new();
        assert_eq!(state.player_activity(), PlayerActivity::Idle);
        assert_eq!(state.speech_activity(), SpeechActivity::Finished);
        assert_eq!(state.volume(), (100, false));
    }

    #[test]
    fn playback_state_json_reflects_updates() {
        let state = ClientState::new();
        state.set_player_activity(PlayerActivity::Playing);
        let json = state.playback_state_json();
        assert_eq!(json["payload"]["state"], "PLAYING");
    }

    #[test]
    fn volume_state_json_reflects_updates() {
        let state = ClientState::new();
        state.set_volume(80, true);
        let json = state.volume_state_json();
        assert_eq!(json["payload"]["volume"], 80);
        assert_eq!(json["payload"]["muted"], true);
    }
}
