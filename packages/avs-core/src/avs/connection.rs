//! The persistent connection to AVS.
//!
//! `reqwest` negotiates HTTP/2 via ALPN and does not expose stream IDs to
//! callers — a streamed `Response` already represents what the protocol
//! calls a directive stream, so a request and its response collapse into a
//! single async call instead of a separate send/receive pair; see
//! DESIGN.md for the reasoning.
//!
//! All request issuance is serialized through `send_lock`, giving the
//! shared HTTP/2 session a single entry point with exclusive-lock
//! discipline.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use reqwest::{Client, Method};
use tokio::sync::Mutex;

use crate::auth::TokenManager;
use crate::error::ConnectionError;
use crate::protocol_constants::{AVS_API_VERSION_PATH, AVS_HOST};
use crate::utils::IdGenerator;

/// A buffered AVS HTTP response: status, content-type, and the full body.
///
/// Event/ping responses are small (JSON directives plus at most one audio
/// attachment) so buffering them whole is simple. The downchannel uses
/// [`Connection::open_stream`] instead, since its body is unbounded and
/// server-pushed.
#[derive(Debug, Clone)]
pub struct AvsResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl AvsResponse {
    #[must_use]
    pub fn is_no_content(&self) -> bool {
        self.status == 204
    }

    #[must_use]
    pub fn is_ok_with_body(&self) -> bool {
        self.status == 200
    }
}

/// The request-sending seam [`EventBuilder`](super::event_builder::EventBuilder)
/// depends on, so its tests can run against an in-memory fake instead of a
/// live AVS endpoint.
#[async_trait]
pub trait ConnectionApi: Send + Sync {
    /// See [`Connection::request`].
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Bytes>,
        include_version: bool,
        content_type: Option<&str>,
    ) -> Result<AvsResponse, ConnectionError>;

    /// The per-connection message/dialog ID generator.
    fn id_generator(&self) -> &IdGenerator;
}

/// Owns the HTTP/2 session to `avs-alexa-na.amazon.com` and the counters
/// that make every outbound event's `messageId`/`dialogRequestId` unique.
pub struct Connection {
    client: Client,
    token: Arc<TokenManager>,
    send_lock: Mutex<()>,
    id_gen: IdGenerator,
}

impl Connection {
    #[must_use]
    pub fn new(client: Client, token: Arc<TokenManager>) -> Self {
        Self {
            client,
            token,
            send_lock: Mutex::new(()),
            id_gen: IdGenerator::new(),
        }
    }

    #[must_use]
    pub fn id_generator(&self) -> &IdGenerator {
        &self.id_gen
    }

    fn build_url(path: &str, include_version: bool) -> String {
        if include_version {
            format!("https://{AVS_HOST}{AVS_API_VERSION_PATH}{path}")
        } else {
            format!("https://{AVS_HOST}{path}")
        }
    }

    /// Sends a request to AVS and buffers its response.
    ///
    /// The wire method is literally `GET` for `/events` even though a body
    /// is attached — if the HTTP/2 stack this links against ever rejects a
    /// body on `GET`, switch to `POST`; AVS accepts either.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError`] on transport failure. Non-204/200 status
    /// codes are *not* errors here — callers interpret status per endpoint.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Bytes>,
        include_version: bool,
        content_type: Option<&str>,
    ) -> Result<AvsResponse, ConnectionError> {
        let _guard = self.send_lock.lock().await;

        let token = self.token.current_token().await?;
        let url = Self::build_url(path, include_version);

        let mut request = self
            .client
            .request(method.clone(), &url)
            .header("authorization", format!("Bearer {token}"));

        if let Some(ct) = content_type {
            request = request.header("content-type", ct);
        }
        if let Some(body) = body {
            request = request.body(body);
        }

        let started_at = Instant::now();
        log::debug!("[Connection] {method} {url}");
        let response = request.send().await?;
        log::debug!(
            "[Connection] {} {} -> {} in {:?}",
            method,
            url,
            response.status(),
            started_at.elapsed()
        );

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?;

        Ok(AvsResponse {
            status,
            content_type,
            body,
        })
    }

    /// Opens a long-lived response stream, used only for `GET /directives`
    /// (the downchannel). Returns the response's status, content-type, and
    /// a stream of raw body chunks as they are pushed by the server.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError`] on transport failure.
    pub async fn open_stream(
        &self,
        path: &str,
        include_version: bool,
    ) -> Result<
        (
            u16,
            Option<String>,
            impl Stream<Item = Result<Bytes, reqwest::Error>>,
        ),
        ConnectionError,
    > {
        let _guard = self.send_lock.lock().await;

        let token = self.token.current_token().await?;
        let url = Self::build_url(path, include_version);

        log::info!("[Connection] opening downchannel stream at {url}");
        let response = self
            .client
            .request(Method::GET, &url)
            .header("authorization", format!("Bearer {token}"))
            .send()
            .await?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        Ok((status, content_type, response.bytes_stream()))
    }
}

#[async_trait]
impl ConnectionApi for Connection {
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Bytes>,
        include_version: bool,
        content_type: Option<&str>,
    ) -> Result<AvsResponse, ConnectionError> {
        Connection::request(self, method, path, body, include_version, content_type).await
    }

    fn id_generator(&self) -> &IdGenerator {
        Connection::id_generator(self)
    }
}

/// A canned [`ConnectionApi`] for tests that exercise `EventBuilder`/
/// `Dispatcher` without a live AVS endpoint, grounded the same way
/// `StreamCoordinator`'s tests stub `SonosPlayback` behind a trait object
/// instead of a real device.
#[cfg(test)]
pub(crate) mod fake {
    use super::{AvsResponse, ConnectionApi, ConnectionError, IdGenerator};
    use async_trait::async_trait;
    use bytes::Bytes;
    use reqwest::Method;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// One observed call into [`FakeConnection::request`].
    pub struct SentRequest {
        pub method: Method,
        pub path: String,
        pub body: Option<Bytes>,
    }

    /// Returns queued responses in order, recording every request it was
    /// asked to send. Once exhausted, further calls return a bare `204` so
    /// tests that don't care about trailing requests don't need to
    /// over-provision the queue.
    pub struct FakeConnection {
        responses: Mutex<VecDeque<Result<AvsResponse, ConnectionError>>>,
        sent: Mutex<Vec<SentRequest>>,
        id_gen: IdGenerator,
    }

    impl FakeConnection {
        pub fn new(responses: Vec<AvsResponse>) -> Self {
            Self {
                responses: Mutex::new(responses.into_iter().map(Ok).collect()),
                sent: Mutex::new(Vec::new()),
                id_gen: IdGenerator::new(),
            }
        }

        pub fn sent_requests(&self) -> Vec<String> {
            self.sent.lock().unwrap().iter().map(|r| r.path.clone()).collect()
        }

        pub fn bodies(&self) -> Vec<Bytes> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .filter_map(|r| r.body.clone())
                .collect()
        }
    }

    #[async_trait]
    impl ConnectionApi for FakeConnection {
        async fn request(
            &self,
            method: Method,
            path: &str,
            body: Option<Bytes>,
            _include_version: bool,
            _content_type: Option<&str>,
        ) -> Result<AvsResponse, ConnectionError> {
            self.sent.lock().unwrap().push(SentRequest {
                method,
                path: path.to_string(),
                body,
            });
            self.responses.lock().unwrap().pop_front().unwrap_or(Ok(AvsResponse {
                status: 204,
                content_type: None,
                body: Bytes::new(),
            }))
        }

        fn id_generator(&self) -> &IdGenerator {
            &self.id_gen
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::token::RefreshCredentials;

    fn make_connection() -> Connection {
        let token = Arc::new(TokenManager::new(
            Client::new(),
            RefreshCredentials {
                client_id: "id".into(),
                client_secret: "secret".into(),
                refresh_token: "refresh".into(),
            },
        ));
        Connection::new(Client::new(), token)
    }

    #[test]
    fn build_url_prefixes_version_by_default() {
        assert_eq!(
            Connection::build_url("/events", true),
            "https://avs-alexa-na.amazon.com/v20160207/events"
        );
    }

    #[test]
    fn build_url_omits_version_for_ping() {
        assert_eq!(
            Connection::build_url("/ping", false),
            "https://avs-alexa-na.amazon.com/ping"
        );
    }

    #[test]
    fn message_ids_increment_across_connection_lifetime() {
        let conn = make_connection();
        let a = conn.id_generator().next_message_id();
        let b = conn.id_generator().next_message_id();
        assert_ne!(a, b);
    }
}
