//! Context assembler: the `context` array attached to every outbound
//! event. A read-only snapshot assembler over live component state, never
//! itself storing anything.

use std::sync::Arc;

use serde_json::{json, Value};

use super::alerts::AlertScheduler;
use crate::state::ClientState;

/// Assembles the three context objects AVS expects on every event:
/// `AudioPlayer.PlaybackState`, `Alerts.AlertsState`, `Speaker.VolumeState`.
pub struct ContextAssembler {
    state: Arc<ClientState>,
    alerts: Arc<AlertScheduler>,
}

impl ContextAssembler {
    #[must_use]
    pub fn new(state: Arc<ClientState>, alerts: Arc<AlertScheduler>) -> Self {
        Self { state, alerts }
    }

    /// Builds the `context` array for an outbound event. Never stored —
    /// recomputed fresh from live state on every call.
    #[must_use]
    pub fn assemble(&self) -> Vec<Value> {
        vec![
            self.state.playback_state_json(),
            self.alerts_state_json(),
            self.state.volume_state_json(),
        ]
    }

    fn alerts_state_json(&self) -> Value {
        json!({
            "header": {"namespace": "Alerts", "name": "AlertsState"},
            "payload": {
                "allAlerts": self.alerts.all_alerts_json(),
                "activeAlerts": self.alerts.active_alerts_json(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NoopEventEmitter;
    use crate::runtime::TokioSpawner;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    struct SilentPlayer;

    #[async_trait]
    impl crate::collaborators::AudioPlayer for SilentPlayer {
        async fn play(&self, _audio: Bytes) -> Result<(), crate::collaborators::PlayerError> {
            Ok(())
        }
        async fn play_looped(&self, _tone: Bytes, _stop: CancellationToken, _max: Duration) {}
    }

    #[tokio::test]
    async fn assemble_returns_three_context_objects() {
        let state = Arc::new(ClientState::new());
        let (alerts, _rx) = AlertScheduler::new(
            Arc::new(SilentPlayer),
            Bytes::new(),
            Arc::new(TokioSpawner::current()),
            Arc::new(NoopEventEmitter),
        );
        let assembler = ContextAssembler::new(state, alerts);
        let context = assembler.assemble();
        assert_eq!(context.len(), 3);
        assert_eq!(context[0]["header"]["namespace"], "AudioPlayer");
        assert_eq!(context[1]["header"]["namespace"], "Alerts");
        assert_eq!(context[2]["header"]["namespace"], "Speaker");
    }

    #[tokio::test]
    async fn active_alerts_subset_of_all_alerts_in_context() {
        let state = Arc::new(ClientState::new());
        let (alerts, _rx) = AlertScheduler::new(
            Arc::new(SilentPlayer),
            Bytes::new(),
            Arc::new(TokioSpawner::current()),
            Arc::new(NoopEventEmitter),
        );
        alerts.set_alert("t1".into(), "ALARM".into(), "2030-01-01T00:00:00Z".into());
        let assembler = ContextAssembler::new(state, alerts);
        let context = assembler.assemble();
        let all = context[1]["payload"]["allAlerts"].as_array().unwrap();
        let active = context[1]["payload"]["activeAlerts"].as_array().unwrap();
        assert_eq!(all.len(), 1);
        assert!(active.is_empty());
    }
}
