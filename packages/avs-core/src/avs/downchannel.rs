//! Downchannel reader: consumes the server-pushed `GET /directives`
//! stream and hands complete frames to the dispatcher.
//!
//! Grounded on `topology_monitor::TopologyMonitor::start_monitoring`'s
//! `tokio::select!` loop shape (cancellation token raced against the next
//! unit of work), adapted here from a timer tick to the next chunk of a
//! `reqwest` byte stream.

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use super::connection::Connection;
use super::dispatcher::Dispatcher;
use crate::error::{AvsError, ConnectionError};
use crate::multipart;

/// Reads the downchannel stream, reassembles multipart frames out of
/// arbitrarily-chunked bytes, and dispatches each decoded message.
pub struct Downchannel {
    connection: Arc<Connection>,
    dispatcher: Arc<Dispatcher>,
    stop: CancellationToken,
}

impl Downchannel {
    #[must_use]
    pub fn new(connection: Arc<Connection>, dispatcher: Arc<Dispatcher>, stop: CancellationToken) -> Self {
        Self {
            connection,
            dispatcher,
            stop,
        }
    }

    /// Opens `GET /directives` and runs the read loop to completion: until
    /// the stream ends, a transport error occurs, or `stop` is cancelled.
    ///
    /// Each call opens a fresh stream, so this is also how the client
    /// re-establishes its downchannel after a keepalive-triggered
    /// reconnect — callers re-invoke `run` rather than holding onto a
    /// stale stream.
    ///
    /// # Errors
    ///
    /// Returns [`AvsError`] if the initial `GET /directives` fails or does
    /// not return `200` with a multipart `Content-Type`.
    pub async fn run(self: &Arc<Self>) -> Result<(), AvsError> {
        let (status, content_type, stream) = self.connection.open_stream("/directives", true).await?;
        if status != 200 {
            return Err(AvsError::Network(ConnectionError::HttpStatus(
                status,
                "unexpected status opening downchannel".to_string(),
            )));
        }
        let boundary = content_type
            .as_deref()
            .and_then(|ct| multipart::extract_boundary(ct).ok())
            .ok_or_else(|| {
                AvsError::Protocol("downchannel response missing multipart boundary".to_string())
            })?;

        log::info!("[Downchannel] stream open, boundary={boundary}");

        let mut buf = BytesMut::new();
        tokio::pin!(stream);

        loop {
            tokio::select! {
                () = self.stop.cancelled() => {
                    log::info!("[Downchannel] stop signal received, closing stream");
                    return Ok(());
                }
                chunk = stream.next() => {
                    match chunk {
                        Some(Ok(bytes)) => {
                            buf.extend_from_slice(&bytes);
                            self.drain_frames(&mut buf, &boundary).await;
                        }
                        Some(Err(e)) => {
                            return Err(AvsError::Network(ConnectionError::Http(e)));
                        }
                        None => {
                            log::warn!("[Downchannel] stream ended");
                            return Err(AvsError::Network(ConnectionError::DownchannelClosed));
                        }
                    }
                }
            }
        }
    }

    async fn drain_frames(self: &Arc<Self>, buf: &mut BytesMut, boundary: &str) {
        while let Some((frame_end, remainder_start)) = multipart::find_frame(buf, boundary) {
            let frame: Bytes = buf.split_to(remainder_start).split_to(frame_end).freeze();
            if frame.is_empty() {
                continue;
            }
            match multipart::decode(&frame, boundary) {
                Ok(message) if message.is_empty() => {}
                Ok(message) => {
                    if let Err(e) = self.dispatcher.dispatch(message).await {
                        log::error!("[Downchannel] dispatch failed: {e}");
                    }
                }
                Err(e) => log::warn!("[Downchannel] failed to parse frame: {e}"),
            }
        }
    }
}
