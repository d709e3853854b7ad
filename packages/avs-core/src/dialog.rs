//! Dialog driver: the wake → listen → recognize loop that turns
//! microphone input into `SpeechRecognizer.Recognize` events.
//!
//! Grounded on the same `tokio::select!` shape the downchannel and keepalive
//! loops use, here racing the next wake-word detection against the
//! process-wide stop signal instead of a timer tick.

use std::sync::Arc;

use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use crate::avs::Dispatcher;
use crate::collaborators::Microphone;

/// Drives the wake-word → capture → recognize cycle for as long as the
/// microphone stays open and `stop` isn't cancelled.
pub struct DialogDriver {
    microphone: Arc<dyn Microphone>,
    dispatcher: Arc<Dispatcher>,
    wake_word: String,
    stop: CancellationToken,
}

impl DialogDriver {
    #[must_use]
    pub fn new(
        microphone: Arc<dyn Microphone>,
        dispatcher: Arc<Dispatcher>,
        wake_word: String,
        stop: CancellationToken,
    ) -> Self {
        Self {
            microphone,
            dispatcher,
            wake_word,
            stop,
        }
    }

    /// Runs the dialog loop until the microphone closes (`wakeup` returns
    /// `false`) or `stop` is cancelled.
    pub async fn run(self: Arc<Self>) {
        loop {
            tokio::select! {
                () = self.stop.cancelled() => {
                    log::info!("[DialogDriver] stop signal received");
                    return;
                }
                woke = self.microphone.wakeup(&self.wake_word) => {
                    if !woke {
                        log::info!("[DialogDriver] microphone closed, stopping dialog loop");
                        return;
                    }
                    self.run_turn().await;
                }
            }
        }
    }

    async fn run_turn(&self) {
        let audio = self.microphone.listen(None).await;
        if audio.is_empty() {
            log::debug!("[DialogDriver] wake word detected but no speech captured");
            return;
        }
        if let Err(e) = self.dispatcher.recognize(Bytes::from(audio), None).await {
            log::warn!("[DialogDriver] dialog turn failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::avs::alerts::AlertScheduler;
    use crate::avs::connection::Connection;
    use crate::avs::context_assembler::ContextAssembler;
    use crate::avs::event_builder::EventBuilder;
    use crate::auth::token::{RefreshCredentials, TokenManager};
    use crate::collaborators::{AudioPlayer, PlayerError};
    use crate::events::NoopEventEmitter;
    use crate::runtime::TokioSpawner;
    use crate::state::ClientState;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration as StdDuration;

    struct CountingMicrophone {
        wakeups: AtomicUsize,
        max_wakeups: usize,
    }

    #[async_trait]
    impl Microphone for CountingMicrophone {
        async fn wakeup(&self, _keyword: &str) -> bool {
            self.wakeups.fetch_add(1, Ordering::SeqCst) < self.max_wakeups
        }

        async fn listen(&self, _timeout: Option<StdDuration>) -> Vec<u8> {
            Vec::new()
        }
    }

    struct SilentPlayer;

    #[async_trait]
    impl AudioPlayer for SilentPlayer {
        async fn play(&self, _audio: Bytes) -> Result<(), PlayerError> {
            Ok(())
        }
        async fn play_looped(&self, _tone: Bytes, _stop: CancellationToken, _max: StdDuration) {}
    }

    fn dispatcher() -> Arc<Dispatcher> {
        let token = Arc::new(TokenManager::new(
            reqwest::Client::new(),
            RefreshCredentials {
                client_id: "id".into(),
                client_secret: "secret".into(),
                refresh_token: "refresh".into(),
            },
        ));
        let connection: Arc<dyn crate::avs::ConnectionApi> =
            Arc::new(Connection::new(reqwest::Client::new(), token));
        let state = Arc::new(ClientState::new());
        let (alerts, _rx) = AlertScheduler::new(
            Arc::new(SilentPlayer),
            Bytes::new(),
            Arc::new(TokioSpawner::current()),
            Arc::new(NoopEventEmitter),
        );
        let context = Arc::new(ContextAssembler::new(Arc::clone(&state), Arc::clone(&alerts)));
        let event_builder = Arc::new(EventBuilder::new(connection, context));
        Arc::new(Dispatcher::new(
            event_builder,
            alerts,
            Arc::new(CountingMicrophone {
                wakeups: AtomicUsize::new(0),
                max_wakeups: 0,
            }),
            Arc::new(SilentPlayer),
            state,
            Arc::new(NoopEventEmitter),
        ))
    }

    #[tokio::test]
    async fn dialog_driver_exits_when_microphone_closes() {
        let microphone = Arc::new(CountingMicrophone {
            wakeups: AtomicUsize::new(0),
            max_wakeups: 2,
        });
        let driver = Arc::new(DialogDriver::new(
            microphone,
            dispatcher(),
            "alexa".into(),
            CancellationToken::new(),
        ));
        // Returns once `wakeup` reports the microphone closed; doesn't hang.
        driver.run().await;
    }

    #[tokio::test]
    async fn dialog_driver_exits_on_stop_signal() {
        let microphone = Arc::new(CountingMicrophone {
            wakeups: AtomicUsize::new(0),
            max_wakeups: usize::MAX,
        });
        let stop = CancellationToken::new();
        stop.cancel();
        let driver = Arc::new(DialogDriver::new(microphone, dispatcher(), "alexa".into(), stop));
        driver.run().await;
    }
}
