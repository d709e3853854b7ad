//! Directive dispatcher: routes parsed directives to handlers and
//! drives the fused send → read → recursively-dispatch convenience the
//! source always used (`get_and_process_response`), kept here as
//! [`Dispatcher::send_and_dispatch`] per DESIGN.md.
//!
//! Uses the same namespace-keyed match-dispatch idiom as `error.rs`'s
//! `ErrorCode` impls, generalized from error-code lookup to directive
//! routing.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use super::alerts::{AlertScheduler, AlertSignal};
use super::connection::AvsResponse;
use super::event_builder::EventBuilder;
use crate::collaborators::{AudioPlayer, Microphone};
use crate::error::{AlertError, AvsError, ConnectionError, DirectiveError};
use crate::events::{DialogEvent, EventEmitter};
use crate::multipart::{self, Message};
use crate::protocol_constants::OUTBOUND_BOUNDARY;
use crate::runtime::TaskSpawner;
use crate::state::{ClientState, PlayerActivity, SpeechActivity};
use crate::utils::now_millis;

/// Routes parsed directives to their handlers and sends the resulting
/// response events, chaining into further directives as AVS's dialog-turn
/// protocol requires.
pub struct Dispatcher {
    event_builder: Arc<EventBuilder>,
    alerts: Arc<AlertScheduler>,
    microphone: Arc<dyn Microphone>,
    player: Arc<dyn AudioPlayer>,
    state: Arc<ClientState>,
    emitter: Arc<dyn EventEmitter>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(
        event_builder: Arc<EventBuilder>,
        alerts: Arc<AlertScheduler>,
        microphone: Arc<dyn Microphone>,
        player: Arc<dyn AudioPlayer>,
        state: Arc<ClientState>,
        emitter: Arc<dyn EventEmitter>,
    ) -> Self {
        Self {
            event_builder,
            alerts,
            microphone,
            player,
            state,
            emitter,
        }
    }

    /// Spawns the background task that turns [`AlertSignal`]s into
    /// `Alerts.*` events. Alert fire callbacks run independently of any
    /// in-progress dialog turn; both paths serialize only through
    /// `Connection`'s send lock.
    pub fn spawn_alert_forwarder(
        self: &Arc<Self>,
        mut signal_rx: mpsc::UnboundedReceiver<AlertSignal>,
        spawner: &dyn TaskSpawner,
    ) {
        let dispatcher = Arc::clone(self);
        spawner.spawn(async move {
            while let Some(signal) = signal_rx.recv().await {
                dispatcher.handle_alert_signal(signal).await;
            }
        });
    }

    async fn handle_alert_signal(self: &Arc<Self>, signal: AlertSignal) {
        let (name, token) = match signal {
            AlertSignal::Started { token } => ("AlertStarted", token),
            AlertSignal::EnteredForeground { token } => ("AlertEnteredForeground", token),
            AlertSignal::Stopped { token } => ("AlertStopped", token),
        };

        if let Err(e) = self
            .send_and_dispatch("Alerts", name, json!({ "token": token }), None, None)
            .await
        {
            log::error!("[Dispatcher] failed to send Alerts.{name}: {e}");
        }
    }

    /// Processes a decoded [`Message`]: at most one attachment, each JSON
    /// part routed independently so one malformed directive doesn't abort
    /// its siblings.
    ///
    /// # Errors
    ///
    /// Returns [`AvsError::Protocol`] if the message carries more than one
    /// attachment. Per-directive errors are logged and skipped, not
    /// propagated.
    pub async fn dispatch(self: &Arc<Self>, message: Message) -> Result<(), AvsError> {
        if message.attachment.len() > 1 {
            return Err(AvsError::Protocol(format!(
                "message has {} attachments, expected at most 1",
                message.attachment.len()
            )));
        }
        let attachment = message.attachment.into_iter().next();

        for content in message.content {
            if let Err(e) = self.dispatch_directive(&content, attachment.clone()).await {
                log::error!("[Dispatcher] directive failed: {e}");
                let (namespace, name) = directive_namespace_name(&content);
                self.emitter.emit_dialog(DialogEvent::DirectiveFailed {
                    namespace,
                    name,
                    reason: e.to_string(),
                    timestamp: now_millis(),
                });
            }
        }

        Ok(())
    }

    async fn dispatch_directive(
        self: &Arc<Self>,
        content: &Value,
        attachment: Option<Bytes>,
    ) -> Result<(), AvsError> {
        let directive = content
            .get("directive")
            .ok_or_else(|| DirectiveError::MissingField("directive".into()))?;
        let header = directive
            .get("header")
            .ok_or_else(|| DirectiveError::MissingField("directive.header".into()))?;
        let namespace = header
            .get("namespace")
            .and_then(Value::as_str)
            .ok_or_else(|| DirectiveError::MissingField("header.namespace".into()))?;
        let name = header
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| DirectiveError::MissingField("header.name".into()))?;
        let dialog_request_id = header
            .get("dialogRequestId")
            .and_then(Value::as_str)
            .map(String::from);
        let payload = directive.get("payload").cloned().unwrap_or(json!({}));

        let result = match (namespace, name) {
            ("SpeechSynthesizer", "Speak") => self.handle_speak(&payload, attachment).await,
            ("SpeechRecognizer", "ExpectSpeech") => {
                self.handle_expect_speech(&payload, dialog_request_id).await
            }
            ("SpeechRecognizer", "StopCapture") => {
                // Accepted but undefined by the published API; treated as a
                // safe no-op.
                log::debug!("[Dispatcher] StopCapture accepted (no-op)");
                Ok(())
            }
            ("Alerts", "SetAlert") => self.handle_set_alert(&payload).await,
            ("Alerts", "DeleteAlert") => self.handle_delete_alert(&payload).await,
            (namespace, name) => Err(AvsError::Directive(DirectiveError::Unsupported(
                namespace.to_string(),
                name.to_string(),
            ))),
        };

        if result.is_ok() {
            self.emitter.emit_dialog(DialogEvent::DirectiveDispatched {
                namespace: namespace.to_string(),
                name: name.to_string(),
                timestamp: now_millis(),
            });
        }

        result
    }

    async fn handle_speak(
        self: &Arc<Self>,
        payload: &Value,
        attachment: Option<Bytes>,
    ) -> Result<(), AvsError> {
        let token = payload
            .get("token")
            .and_then(Value::as_str)
            .ok_or_else(|| DirectiveError::MissingField("payload.token".into()))?
            .to_string();
        let audio =
            attachment.ok_or_else(|| DirectiveError::MissingField("attachment".into()))?;

        self.state.set_speech_activity(SpeechActivity::Playing);
        self.state.set_player_activity(PlayerActivity::Playing);
        self.send_and_dispatch(
            "SpeechSynthesizer",
            "SpeechStarted",
            json!({ "token": token }),
            None,
            None,
        )
        .await?;

        if let Err(e) = self.player.play(audio).await {
            log::warn!("[Dispatcher] playback of Speak token {token} failed: {e}");
        }

        self.state.set_speech_activity(SpeechActivity::Finished);
        self.state.set_player_activity(PlayerActivity::Idle);
        self.send_and_dispatch(
            "SpeechSynthesizer",
            "SpeechFinished",
            json!({ "token": token }),
            None,
            None,
        )
        .await
    }

    async fn handle_expect_speech(
        self: &Arc<Self>,
        payload: &Value,
        dialog_request_id: Option<String>,
    ) -> Result<(), AvsError> {
        let timeout = payload
            .get("timeoutInMilliseconds")
            .and_then(Value::as_u64)
            .map(Duration::from_millis);

        let audio = self.microphone.listen(timeout).await;

        if audio.is_empty() {
            self.send_and_dispatch(
                "SpeechRecognizer",
                "ExpectSpeechTimedOut",
                json!({}),
                dialog_request_id.as_deref(),
                None,
            )
            .await
        } else {
            self.recognize(Bytes::from(audio), dialog_request_id).await
        }
    }

    async fn handle_set_alert(self: &Arc<Self>, payload: &Value) -> Result<(), AvsError> {
        let token = payload
            .get("token")
            .and_then(Value::as_str)
            .ok_or_else(|| DirectiveError::MissingField("payload.token".into()))?
            .to_string();
        let alert_type = payload
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("ALARM")
            .to_string();
        let scheduled_time = payload
            .get("scheduledTime")
            .and_then(Value::as_str)
            .ok_or_else(|| DirectiveError::MissingField("payload.scheduledTime".into()))?
            .to_string();

        let succeeded = match super::alerts::validate_scheduled_time(&scheduled_time) {
            Ok(()) => self.alerts.set_alert(token.clone(), alert_type, scheduled_time),
            Err(e) => {
                log::warn!("[Dispatcher] rejecting SetAlert for {token}: {e}");
                false
            }
        };

        let name = if succeeded {
            "SetAlertSucceeded"
        } else {
            "SetAlertFailed"
        };
        self.send_and_dispatch("Alerts", name, json!({ "token": token }), None, None)
            .await
    }

    async fn handle_delete_alert(self: &Arc<Self>, payload: &Value) -> Result<(), AvsError> {
        let token = payload
            .get("token")
            .and_then(Value::as_str)
            .ok_or_else(|| DirectiveError::MissingField("payload.token".into()))?
            .to_string();

        let succeeded = self.alerts.delete_alert(&token);
        if !succeeded {
            log::warn!("[Dispatcher] {}", AlertError::NotFound(token.clone()));
        }

        let name = if succeeded {
            "DeleteAlertSucceeded"
        } else {
            "DeleteAlertFailed"
        };
        self.send_and_dispatch("Alerts", name, json!({ "token": token }), None, None)
            .await
    }

    /// Sends `System.SynchronizeState` and returns the raw status code
    /// without interpreting it, for the initial handshake, which treats any
    /// status other than `204` as fatal — including `200`, which
    /// [`Self::send_and_dispatch`]'s general event flow treats as a normal
    /// directive-bearing response.
    ///
    /// # Errors
    ///
    /// Returns [`AvsError`] on transport failure.
    pub async fn send_and_dispatch_raw_synchronize_state(self: &Arc<Self>) -> Result<u16, AvsError> {
        let response = self.event_builder.send_synchronize_state().await?;
        Ok(response.status)
    }

    /// Sends an event and fetches/recursively dispatches its response,
    /// fusing the always-read-then-process convention into one call so a
    /// single dialog turn chains without the caller driving each step.
    ///
    /// # Errors
    ///
    /// Returns [`AvsError`] on transport failure or an unexpected status.
    pub async fn send_and_dispatch(
        self: &Arc<Self>,
        namespace: &str,
        name: &str,
        payload: Value,
        dialog_request_id: Option<&str>,
        audio: Option<Bytes>,
    ) -> Result<(), AvsError> {
        let response = self
            .event_builder
            .send_event(namespace, name, payload, dialog_request_id, audio)
            .await?;
        self.process_response(response).await
    }

    /// Sends `SpeechRecognizer.Recognize` and recursively dispatches its
    /// response, used both by the dialog driver (fresh wake-word capture)
    /// and by `ExpectSpeech` (inheriting its `dialogRequestId`).
    ///
    /// # Errors
    ///
    /// Returns [`AvsError`] on transport failure or an unexpected status.
    pub async fn recognize(
        self: &Arc<Self>,
        audio: Bytes,
        dialog_request_id: Option<String>,
    ) -> Result<(), AvsError> {
        let (result, dialog_request_id) =
            self.event_builder.send_recognize(audio, dialog_request_id).await;
        self.emitter.emit_dialog(DialogEvent::RecognizeSent {
            dialog_request_id,
            timestamp: now_millis(),
        });
        self.process_response(result?).await
    }

    async fn process_response(self: &Arc<Self>, response: AvsResponse) -> Result<(), AvsError> {
        if response.is_no_content() {
            return Ok(());
        }
        if response.is_ok_with_body() {
            let boundary = response
                .content_type
                .as_deref()
                .and_then(|ct| multipart::extract_boundary(ct).ok())
                .unwrap_or_else(|| OUTBOUND_BOUNDARY.to_string());
            let message = multipart::decode(&response.body, &boundary)?;
            return Box::pin(self.dispatch(message)).await;
        }
        Err(AvsError::Network(ConnectionError::HttpStatus(
            response.status,
            "unexpected status from /events".to_string(),
        )))
    }
}

fn directive_namespace_name(content: &Value) -> (String, String) {
    let namespace = content
        .pointer("/directive/header/namespace")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();
    let name = content
        .pointer("/directive/header/name")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();
    (namespace, name)
}
