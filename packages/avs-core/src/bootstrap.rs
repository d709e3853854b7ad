//! Composition root: wires the token manager, connection, event builder,
//! context assembler, alert scheduler, dispatcher, downchannel, keepalive,
//! and dialog driver into one running client.
//!
//! A single function builds every service in dependency order and returns
//! one container struct, kept here as [`ClientRuntime::bootstrap`].

use std::sync::Arc;

use bytes::Bytes;
use reqwest::Client;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::auth::{RefreshCredentials, TokenManager};
use crate::avs::{
    AlertScheduler, Connection, ConnectionApi, ContextAssembler, Dispatcher, Downchannel,
    EventBuilder, Keepalive,
};
use crate::collaborators::{AudioPlayer, Microphone};
use crate::dialog::DialogDriver;
use crate::error::{AvsError, ConnectionError};
use crate::events::EventEmitter;
use crate::runtime::TaskSpawner;
use crate::state::ClientState;

/// Everything [`ClientRuntime::bootstrap`] needs to assemble a running
/// client. Collaborator implementations (microphone, player) and
/// cross-cutting concerns (spawner, emitter) are supplied by the binary
/// crate; the engine never constructs them itself.
pub struct BootstrapConfig {
    pub credentials: RefreshCredentials,
    pub microphone: Arc<dyn Microphone>,
    pub player: Arc<dyn AudioPlayer>,
    pub alert_tone: Bytes,
    pub wake_word: String,
    pub emitter: Arc<dyn EventEmitter>,
    pub spawner: Arc<dyn TaskSpawner>,
}

/// A fully wired, running AVS client.
///
/// Owns the long-lived background tasks (downchannel, keepalive, the
/// reconnect supervisor) indirectly through the spawner; dropping this
/// struct does not stop them — cancel the `CancellationToken` passed to
/// [`ClientRuntime::bootstrap`] for that.
pub struct ClientRuntime {
    dispatcher: Arc<Dispatcher>,
    downchannel: Arc<Downchannel>,
    dialog_driver: Arc<DialogDriver>,
    stop: CancellationToken,
}

impl ClientRuntime {
    /// Assembles every component, performs the initial handshake (opening
    /// the downchannel and sending `System.SynchronizeState`), and spawns
    /// the keepalive and reconnect-supervisor background tasks.
    ///
    /// # Errors
    ///
    /// Returns [`AvsError`] if the initial downchannel open or
    /// `SynchronizeState` handshake fails. This is a fatal bootstrap error
    /// and the caller should exit the process rather than retry.
    pub async fn bootstrap(
        config: BootstrapConfig,
        stop: CancellationToken,
    ) -> Result<Arc<Self>, AvsError> {
        let http_client = Client::new();

        let token_manager = Arc::new(TokenManager::new(http_client.clone(), config.credentials));
        let connection = Arc::new(Connection::new(http_client, token_manager));

        let state = Arc::new(ClientState::new());
        let (alerts, alert_signal_rx) = AlertScheduler::new(
            Arc::clone(&config.player),
            config.alert_tone,
            Arc::clone(&config.spawner),
            Arc::clone(&config.emitter),
        );

        let context = Arc::new(ContextAssembler::new(Arc::clone(&state), Arc::clone(&alerts)));
        let event_builder = Arc::new(EventBuilder::new(
            Arc::clone(&connection) as Arc<dyn ConnectionApi>,
            context,
        ));
        let dispatcher = Arc::new(Dispatcher::new(
            event_builder,
            alerts,
            Arc::clone(&config.microphone),
            Arc::clone(&config.player),
            state,
            Arc::clone(&config.emitter),
        ));
        dispatcher.spawn_alert_forwarder(alert_signal_rx, config.spawner.as_ref());

        let downchannel = Arc::new(Downchannel::new(
            Arc::clone(&connection),
            Arc::clone(&dispatcher),
            stop.clone(),
        ));
        let dialog_driver = Arc::new(DialogDriver::new(
            config.microphone,
            Arc::clone(&dispatcher),
            config.wake_word,
            stop.clone(),
        ));

        let (keepalive, reconnect_rx) =
            Keepalive::new(Arc::clone(&connection), Arc::clone(&config.emitter), stop.clone());

        let runtime = Arc::new(Self {
            dispatcher,
            downchannel,
            dialog_driver,
            stop: stop.clone(),
        });

        // Fatal: a failed initial handshake means this process cannot speak
        // to AVS at all.
        runtime.init_connection().await?;

        config.spawner.spawn({
            let keepalive = Arc::clone(&keepalive);
            async move { keepalive.run().await }
        });
        runtime.spawn_reconnect_supervisor(reconnect_rx, config.spawner.as_ref());

        Ok(runtime)
    }

    /// Opens (or re-opens) the downchannel and performs the
    /// `System.SynchronizeState` handshake. A `204` is the only acceptable
    /// response — unlike ordinary event handling, a `200` here is also an
    /// error, since AVS never attaches directives to this specific
    /// response.
    async fn init_connection(self: &Arc<Self>) -> Result<(), AvsError> {
        let downchannel = Arc::clone(&self.downchannel);
        let stop = self.stop.clone();
        // The downchannel read loop runs until the stream ends or `stop` is
        // cancelled; it must not block bootstrap, so it's spawned rather
        // than awaited here.
        tokio::spawn(async move {
            if let Err(e) = downchannel.run().await {
                if !stop.is_cancelled() {
                    log::warn!("[ClientRuntime] downchannel reader exited: {e}");
                }
            }
        });

        let response = self
            .dispatcher
            .send_and_dispatch_raw_synchronize_state()
            .await?;
        if response != 204 {
            return Err(AvsError::Network(ConnectionError::HttpStatus(
                response,
                "SynchronizeState handshake expected 204".to_string(),
            )));
        }
        Ok(())
    }

    /// Consumes reconnect requests raised by [`Keepalive`] and re-runs the
    /// bootstrap handshake. Failures here are logged rather than
    /// propagated — only the *initial* handshake failure is fatal.
    fn spawn_reconnect_supervisor(
        self: &Arc<Self>,
        mut reconnect_rx: mpsc::UnboundedReceiver<()>,
        spawner: &dyn TaskSpawner,
    ) {
        let runtime = Arc::clone(self);
        spawner.spawn(async move {
            while reconnect_rx.recv().await.is_some() {
                log::info!("[ClientRuntime] reconnecting after keepalive failure");
                if let Err(e) = runtime.init_connection().await {
                    log::error!("[ClientRuntime] reconnect attempt failed: {e}");
                }
            }
        });
    }

    /// Runs the dialog driver until the microphone closes or `stop` is
    /// cancelled. This is the call that blocks the binary's `main`.
    pub async fn run(self: Arc<Self>) {
        Arc::clone(&self.dialog_driver).run().await;
    }
}

#[cfg(test)]
mod tests {
    // `ClientRuntime::bootstrap` requires a live AVS endpoint to exercise
    // end-to-end; its components (`Connection`, `Downchannel`, `Keepalive`,
    // `Dispatcher`, `AlertScheduler`) each carry their own unit tests.
    // Wiring correctness here is covered by the fact that this module
    // compiles against their real constructors rather than stubs.
}
