//! Event builder: assembles and sends AVS event envelopes.
//!
//! A single envelope-building and transport entry point, mirroring how a
//! SOAP client centralizes request construction, generalized here to the
//! AVS JSON+multipart envelope shape.

use std::sync::Arc;

use bytes::Bytes;
use reqwest::Method;
use serde_json::{json, Value};

use super::connection::{AvsResponse, ConnectionApi};
use super::context_assembler::ContextAssembler;
use crate::error::ConnectionError;
use crate::multipart;
use crate::protocol_constants::{OUTBOUND_BOUNDARY, RECOGNIZE_FORMAT, RECOGNIZE_PROFILE};

/// Builds and sends AVS events: `{ context, event: { header, payload } }`
/// multipart bodies posted to `/events`.
///
/// Depends on [`ConnectionApi`] rather than the concrete [`super::connection::Connection`]
/// so tests can exercise event-building and response-handling against an
/// in-memory fake instead of a live AVS endpoint.
pub struct EventBuilder {
    connection: Arc<dyn ConnectionApi>,
    context: Arc<ContextAssembler>,
}

impl EventBuilder {
    #[must_use]
    pub fn new(connection: Arc<dyn ConnectionApi>, context: Arc<ContextAssembler>) -> Self {
        Self {
            connection,
            context,
        }
    }

    /// Sends an event with the given namespace/name/payload, an optional
    /// `dialogRequestId`, and an optional audio attachment.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError`] on transport failure.
    pub async fn send_event(
        &self,
        namespace: &str,
        name: &str,
        payload: Value,
        dialog_request_id: Option<&str>,
        audio: Option<Bytes>,
    ) -> Result<AvsResponse, ConnectionError> {
        let message_id = self.connection.id_generator().next_message_id();

        let mut header = json!({
            "namespace": namespace,
            "name": name,
            "messageId": message_id,
        });
        if let Some(dialog_request_id) = dialog_request_id {
            header["dialogRequestId"] = json!(dialog_request_id);
        }

        let metadata = json!({
            "context": self.context.assemble(),
            "event": { "header": header, "payload": payload },
        });

        let body = multipart::encode(OUTBOUND_BOUNDARY, &metadata, audio.as_deref());
        let content_type = format!("multipart/form-data; boundary={OUTBOUND_BOUNDARY}");

        log::info!("[EventBuilder] sending {namespace}.{name}");

        // The wire method is literally GET even with a body attached; see
        // `Connection::request`'s doc comment.
        self.connection
            .request(Method::GET, "/events", Some(body), true, Some(&content_type))
            .await
    }

    /// Sends `SpeechRecognizer.Recognize` with a generated `dialogRequestId`
    /// if the caller didn't supply one (e.g. inheriting from an
    /// `ExpectSpeech` directive). Returns the response and the
    /// `dialogRequestId` actually used.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError`] on transport failure.
    pub async fn send_recognize(
        &self,
        audio: Bytes,
        dialog_request_id: Option<String>,
    ) -> (Result<AvsResponse, ConnectionError>, String) {
        let dialog_request_id =
            dialog_request_id.unwrap_or_else(|| self.connection.id_generator().next_dialog_id());

        let payload = json!({
            "profile": RECOGNIZE_PROFILE,
            "format": RECOGNIZE_FORMAT,
        });

        let result = self
            .send_event(
                "SpeechRecognizer",
                "Recognize",
                payload,
                Some(&dialog_request_id),
                Some(audio),
            )
            .await;

        (result, dialog_request_id)
    }

    /// Sends `System.SynchronizeState` with an empty payload (the initial
    /// handshake).
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError`] on transport failure.
    pub async fn send_synchronize_state(&self) -> Result<AvsResponse, ConnectionError> {
        self.send_event("System", "SynchronizeState", json!({}), None, None)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::avs::alerts::AlertScheduler;
    use crate::avs::connection::fake::FakeConnection;
    use crate::events::NoopEventEmitter;
    use crate::multipart;
    use crate::runtime::TokioSpawner;
    use crate::state::ClientState;
    use async_trait::async_trait;
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

    fn builder(connection: Arc<dyn ConnectionApi>) -> EventBuilder {
        let state = Arc::new(ClientState::new());
        let (alerts, _rx) = AlertScheduler::new(
            Arc::new(SilentPlayer),
            Bytes::new(),
            Arc::new(TokioSpawner::current()),
            Arc::new(NoopEventEmitter),
        );
        let context = Arc::new(ContextAssembler::new(state, alerts));
        EventBuilder::new(connection, context)
    }

    #[tokio::test]
    async fn send_event_carries_context_and_unique_message_ids() {
        let fake = Arc::new(FakeConnection::new(vec![
            AvsResponse { status: 204, content_type: None, body: Bytes::new() },
            AvsResponse { status: 204, content_type: None, body: Bytes::new() },
        ]));
        let eb = builder(fake.clone());

        eb.send_event("System", "SynchronizeState", json!({}), None, None)
            .await
            .unwrap();
        eb.send_event("System", "SynchronizeState", json!({}), None, None)
            .await
            .unwrap();

        let bodies = fake.bodies();
        assert_eq!(bodies.len(), 2);
        let msg_a = multipart::decode(&bodies[0], "this-is-my-boundary").unwrap();
        let msg_b = multipart::decode(&bodies[1], "this-is-my-boundary").unwrap();
        let id_a = msg_a.content[0]["event"]["header"]["messageId"].as_str().unwrap();
        let id_b = msg_b.content[0]["event"]["header"]["messageId"].as_str().unwrap();
        assert_ne!(id_a, id_b);
        assert_eq!(msg_a.content[0]["context"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn send_recognize_generates_dialog_id_when_absent() {
        let fake = Arc::new(FakeConnection::new(vec![AvsResponse {
            status: 204,
            content_type: None,
            body: Bytes::new(),
        }]));
        let eb = builder(fake.clone());

        let (result, dialog_id) = eb.send_recognize(Bytes::from_static(b"pcm"), None).await;
        result.unwrap();

        let body = &fake.bodies()[0];
        let msg = multipart::decode(body, "this-is-my-boundary").unwrap();
        assert_eq!(
            msg.content[0]["event"]["header"]["dialogRequestId"].as_str().unwrap(),
            dialog_id
        );
        assert_eq!(msg.attachment[0].as_ref(), b"pcm");
    }

    #[tokio::test]
    async fn send_recognize_preserves_inherited_dialog_id() {
        let fake = Arc::new(FakeConnection::new(vec![AvsResponse {
            status: 204,
            content_type: None,
            body: Bytes::new(),
        }]));
        let eb = builder(fake);

        let (result, dialog_id) = eb
            .send_recognize(Bytes::from_static(b"pcm"), Some("dlg-X".to_string()))
            .await;
        result.unwrap();
        assert_eq!(dialog_id, "dlg-X");
    }
}
