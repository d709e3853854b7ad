//! Keepalive: periodic `GET /ping` that keeps the persistent HTTP/2
//! session alive, and the trigger for reconnection when it stops answering.
//!
//! Grounded on the same `tokio::select!` + `interval.tick()` shape as
//! [`super::downchannel::Downchannel`]. Per DESIGN.md's cyclic-ownership
//! redesign note, this never calls back into whatever owns the connection
//! directly — a failed ping sends on `reconnect_tx` instead, the same
//! signal-not-callback shape [`super::alerts::AlertScheduler`] uses to avoid
//! a back-pointer to the dispatcher.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::connection::Connection;
use crate::events::{ConnectionEvent, EventEmitter};
use crate::protocol_constants::PING_INTERVAL_SECS;
use crate::utils::now_millis;

/// Pings AVS on a fixed interval and signals for reconnection on failure.
pub struct Keepalive {
    connection: Arc<Connection>,
    reconnect_tx: mpsc::UnboundedSender<()>,
    emitter: Arc<dyn EventEmitter>,
    stop: CancellationToken,
}

impl Keepalive {
    /// Builds a `Keepalive` along with the receiving half of its
    /// reconnect-request channel. The caller owns `rx` and drives
    /// reconnection (re-opening the downchannel, resending
    /// `System.SynchronizeState`) however its composition root is
    /// structured.
    #[must_use]
    pub fn new(
        connection: Arc<Connection>,
        emitter: Arc<dyn EventEmitter>,
        stop: CancellationToken,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<()>) {
        let (reconnect_tx, reconnect_rx) = mpsc::unbounded_channel();
        let keepalive = Arc::new(Self {
            connection,
            reconnect_tx,
            emitter,
            stop,
        });
        (keepalive, reconnect_rx)
    }

    /// Runs the ping loop until `stop` is cancelled. The first tick is
    /// consumed immediately so the first real ping fires one full interval
    /// after the connection was established, not right away.
    pub async fn run(self: Arc<Self>) {
        let mut interval = tokio::time::interval(Duration::from_secs(PING_INTERVAL_SECS));
        interval.tick().await;

        loop {
            tokio::select! {
                () = self.stop.cancelled() => {
                    log::info!("[Keepalive] stop signal received");
                    return;
                }
                _ = interval.tick() => {
                    let ok = self.ping().await;
                    self.emitter.emit_connection(ConnectionEvent::PingResult {
                        ok,
                        timestamp: now_millis(),
                    });
                    if !ok {
                        log::warn!("[Keepalive] ping failed, requesting reconnect");
                        self.emitter.emit_connection(ConnectionEvent::DownchannelReconnecting {
                            reason: "keepalive ping failed".to_string(),
                            timestamp: now_millis(),
                        });
                        if self.reconnect_tx.send(()).is_err() {
                            log::error!("[Keepalive] reconnect channel closed, stopping");
                            return;
                        }
                    }
                }
            }
        }
    }

    async fn ping(&self) -> bool {
        match self
            .connection
            .request(Method::GET, "/ping", None, false, None)
            .await
        {
            Ok(response) if response.is_no_content() => true,
            Ok(response) => {
                log::warn!("[Keepalive] /ping returned unexpected status {}", response.status);
                false
            }
            Err(e) => {
                log::warn!("[Keepalive] /ping request failed: {e}");
                false
            }
        }
    }
}
