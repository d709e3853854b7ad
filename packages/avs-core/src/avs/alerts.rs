//! Alert scheduler: set/cancel timed alerts, own the `alerts` map that
//! the context assembler snapshots into every outbound event.
//!
//! Structured as a pure state container guarded by a single lock, with the
//! I/O (here, arming a timer and playing a tone) driven by a sibling
//! component rather than mixed into the store itself. To avoid a cyclic
//! back-pointer into the connection, the scheduler never talks to it
//! directly — it emits [`AlertSignal`]s on a channel that the dispatcher
//! turns into outbound events.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::collaborators::AudioPlayer;
use crate::error::AlertError;
use crate::events::{AlertEvent, EventEmitter};
use crate::protocol_constants::ALERT_FOREGROUND_MAX_SECS;
use crate::runtime::TaskSpawner;
use crate::utils::{format_iso8601, now_millis, parse_iso8601};

/// A signal the scheduler emits as an alert moves through its lifecycle.
/// The dispatcher subscribes to these and turns them into `Alerts.*` events.
#[derive(Debug, Clone)]
pub enum AlertSignal {
    Started { token: String },
    EnteredForeground { token: String },
    Stopped { token: String },
}

/// One entry in the `alerts` map.
#[derive(Debug, Clone)]
pub struct Alert {
    pub alert_type: String,
    pub scheduled_time: String,
    pub is_active: bool,
}

struct AlertSlot {
    alert: Alert,
    cancel: CancellationToken,
}

/// Owns the alert map and arms/cancels timers for `SetAlert`/`DeleteAlert`.
pub struct AlertScheduler {
    alerts: Mutex<HashMap<String, AlertSlot>>,
    player: Arc<dyn AudioPlayer>,
    tone: Bytes,
    signal_tx: mpsc::UnboundedSender<AlertSignal>,
    spawner: Arc<dyn TaskSpawner>,
    emitter: Arc<dyn EventEmitter>,
}

impl AlertScheduler {
    #[must_use]
    pub fn new(
        player: Arc<dyn AudioPlayer>,
        tone: Bytes,
        spawner: Arc<dyn TaskSpawner>,
        emitter: Arc<dyn EventEmitter>,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<AlertSignal>) {
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let scheduler = Arc::new(Self {
            alerts: Mutex::new(HashMap::new()),
            player,
            tone,
            signal_tx,
            spawner,
            emitter,
        });
        (scheduler, signal_rx)
    }

    /// Parses `scheduled_time_iso`, arms a one-shot timer, and registers the
    /// alert. Returns `false` (without registering anything) if the time
    /// cannot be parsed.
    pub fn set_alert(
        self: &Arc<Self>,
        token: String,
        alert_type: String,
        scheduled_time_iso: String,
    ) -> bool {
        let scheduled_at = match parse_iso8601(&scheduled_time_iso) {
            Ok(dt) => dt,
            Err(e) => {
                log::warn!(
                    "[AlertScheduler] rejecting SetAlert for {token}: invalid scheduledTime {scheduled_time_iso:?}: {e}"
                );
                return false;
            }
        };

        let delay = (scheduled_at - Utc::now())
            .to_std()
            .unwrap_or(Duration::ZERO);
        let cancel = CancellationToken::new();

        self.alerts.lock().insert(
            token.clone(),
            AlertSlot {
                alert: Alert {
                    alert_type,
                    scheduled_time: format_iso8601(scheduled_at),
                    is_active: false,
                },
                cancel: cancel.clone(),
            },
        );

        self.emitter.emit_alert(AlertEvent::Scheduled {
            token: token.clone(),
            timestamp: now_millis(),
        });

        let scheduler = Arc::clone(self);
        self.spawner.spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    scheduler.fire(token).await;
                }
                () = cancel.cancelled() => {
                    log::debug!("[AlertScheduler] timer for {token} cancelled before firing");
                }
            }
        });

        true
    }

    /// Cancels a pending or active alert. If it was already firing, stops
    /// the foreground loop and emits `AlertStopped`. Returns `false` if the
    /// token is unknown.
    pub fn delete_alert(&self, token: &str) -> bool {
        let removed = self.alerts.lock().remove(token);
        let Some(slot) = removed else {
            return false;
        };

        slot.cancel.cancel();

        if slot.alert.is_active {
            let _ = self.signal_tx.send(AlertSignal::Stopped {
                token: token.to_string(),
            });
        }

        self.emitter.emit_alert(AlertEvent::Deleted {
            token: token.to_string(),
            timestamp: now_millis(),
        });

        true
    }

    async fn fire(self: Arc<Self>, token: String) {
        let cancel = {
            let mut alerts = self.alerts.lock();
            let Some(slot) = alerts.get_mut(&token) else {
                return;
            };
            slot.alert.is_active = true;
            slot.cancel.clone()
        };

        self.emitter.emit_alert(AlertEvent::Fired {
            token: token.clone(),
            timestamp: now_millis(),
        });
        let _ = self.signal_tx.send(AlertSignal::Started {
            token: token.clone(),
        });

        self.player
            .play_looped(
                self.tone.clone(),
                cancel,
                Duration::from_secs(ALERT_FOREGROUND_MAX_SECS),
            )
            .await;

        let _ = self.signal_tx.send(AlertSignal::EnteredForeground {
            token: token.clone(),
        });

        // `delete_alert` emits `AlertStopped`; skip if the alert was already
        // removed (e.g. deleted concurrently while playing).
        self.delete_alert(&token);
    }

    /// `Alerts.AlertsState.payload.allAlerts`: every tracked alert.
    #[must_use]
    pub fn all_alerts_json(&self) -> Vec<Value> {
        self.alerts
            .lock()
            .iter()
            .map(|(token, slot)| {
                json!({
                    "token": token,
                    "type": slot.alert.alert_type,
                    "scheduledTime": slot.alert.scheduled_time,
                })
            })
            .collect()
    }

    /// `Alerts.AlertsState.payload.activeAlerts`: the subset with
    /// `is_active`. Always a subset of [`Self::all_alerts_json`].
    #[must_use]
    pub fn active_alerts_json(&self) -> Vec<Value> {
        self.alerts
            .lock()
            .iter()
            .filter(|(_, slot)| slot.alert.is_active)
            .map(|(token, slot)| {
                json!({
                    "token": token,
                    "type": slot.alert.alert_type,
                    "scheduledTime": slot.alert.scheduled_time,
                })
            })
            .collect()
    }

    #[must_use]
    pub fn contains(&self, token: &str) -> bool {
        self.alerts.lock().contains_key(token)
    }
}

/// Validates an alert's `scheduledTime` up front. Called by the dispatcher
/// before arming the alert so a malformed timestamp surfaces as a typed
/// [`AlertError`] to log, rather than just a bare `false` from
/// [`AlertScheduler::set_alert`].
pub fn validate_scheduled_time(scheduled_time_iso: &str) -> Result<(), AlertError> {
    parse_iso8601(scheduled_time_iso)
        .map(|_| ())
        .map_err(|e| AlertError::InvalidTime(scheduled_time_iso.to_string(), e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NoopEventEmitter;
    use crate::runtime::TokioSpawner;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct SilentPlayer {
        loops: AtomicUsize,
    }

    #[async_trait]
    impl AudioPlayer for SilentPlayer {
        async fn play(&self, _audio: Bytes) -> Result<(), crate::collaborators::PlayerError> {
            Ok(())
        }

        async fn play_looped(&self, _tone: Bytes, _stop: CancellationToken, _max: Duration) {
            self.loops.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn scheduler() -> (Arc<AlertScheduler>, mpsc::UnboundedReceiver<AlertSignal>) {
        let player = Arc::new(SilentPlayer {
            loops: AtomicUsize::new(0),
        });
        AlertScheduler::new(
            player,
            Bytes::new(),
            Arc::new(TokioSpawner::current()),
            Arc::new(NoopEventEmitter),
        )
    }

    #[tokio::test]
    async fn set_alert_rejects_unparseable_time() {
        let (scheduler, _rx) = scheduler();
        assert!(!scheduler.set_alert("t1".into(), "ALARM".into(), "not-a-time".into()));
        assert!(!scheduler.contains("t1"));
    }

    #[tokio::test]
    async fn set_alert_registers_inactive_entry() {
        let (scheduler, _rx) = scheduler();
        assert!(scheduler.set_alert(
            "t1".into(),
            "ALARM".into(),
            "2030-01-01T00:00:00Z".into()
        ));
        assert!(scheduler.contains("t1"));
        let all = scheduler.all_alerts_json();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0]["token"], "t1");
        assert!(scheduler.active_alerts_json().is_empty());
    }

    #[tokio::test]
    async fn delete_before_fire_emits_no_signal() {
        let (scheduler, mut rx) = scheduler();
        scheduler.set_alert("t1".into(), "ALARM".into(), "2030-01-01T00:00:00Z".into());
        assert!(scheduler.delete_alert("t1"));
        assert!(!scheduler.contains("t1"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn delete_unknown_token_returns_false() {
        let (scheduler, _rx) = scheduler();
        assert!(!scheduler.delete_alert("missing"));
    }

    #[tokio::test]
    async fn alert_fires_and_self_cancels() {
        let (scheduler, mut rx) = scheduler();
        let past = Utc::now() - chrono::Duration::milliseconds(10);
        scheduler.set_alert("t1".into(), "ALARM".into(), format_iso8601(past));

        let started = rx.recv().await.unwrap();
        assert!(matches!(started, AlertSignal::Started { token } if token == "t1"));
        let foreground = rx.recv().await.unwrap();
        assert!(matches!(foreground, AlertSignal::EnteredForeground { token } if token == "t1"));
        let stopped = rx.recv().await.unwrap();
        assert!(matches!(stopped, AlertSignal::Stopped { token } if token == "t1"));

        assert!(!scheduler.contains("t1"));
    }

    #[test]
    fn active_alerts_is_subset_of_all_alerts() {
        let (scheduler, _rx) = scheduler();
        scheduler.set_alert("t1".into(), "ALARM".into(), "2030-01-01T00:00:00Z".into());
        scheduler.set_alert("t2".into(), "TIMER".into(), "2030-01-01T00:00:00Z".into());
        let all_tokens: Vec<String> = scheduler
            .all_alerts_json()
            .iter()
            .map(|v| v["token"].as_str().unwrap().to_string())
            .collect();
        let active_tokens: Vec<String> = scheduler
            .active_alerts_json()
            .iter()
            .map(|v| v["token"].as_str().unwrap().to_string())
            .collect();
        assert!(active_tokens.iter().all(|t| all_tokens.contains(t)));
    }
}
