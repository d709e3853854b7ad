//! Event emitter abstraction for decoupling services from observability.
//!
//! Services depend on the [`EventEmitter`] trait rather than calling
//! `log::` directly, enabling tests to assert on emitted events instead of
//! parsing log output.

use super::{AlertEvent, ConnectionEvent, DialogEvent};

/// Trait for emitting domain events without knowledge of how they're
/// recorded.
///
/// # Example
///
/// ```ignore
/// struct MyService {
///     emitter: Arc<dyn EventEmitter>,
/// }
///
/// impl MyService {
///     fn do_something(&self) {
///         self.emitter.emit_dialog(DialogEvent::RecognizeSent { .. });
///     }
/// }
/// ```
pub trait EventEmitter: Send + Sync {
    /// Emits a connection lifecycle event.
    fn emit_connection(&self, event: ConnectionEvent);

    /// Emits a dialog turn event.
    fn emit_dialog(&self, event: DialogEvent);

    /// Emits an alert scheduling event.
    fn emit_alert(&self, event: AlertEvent);
}

/// No-op emitter. Events are silently discarded.
pub struct NoopEventEmitter;

impl EventEmitter for NoopEventEmitter {
    fn emit_connection(&self, _event: ConnectionEvent) {}
    fn emit_dialog(&self, _event: DialogEvent) {}
    fn emit_alert(&self, _event: AlertEvent) {}
}

/// Logs every event at debug level. This is the default emitter wired by
/// `bootstrap` for the headless client, where there is no separate UI
/// listening for these events.
pub struct LoggingEventEmitter;

impl EventEmitter for LoggingEventEmitter {
    fn emit_connection(&self, event: ConnectionEvent) {
        log::debug!("connection_event: {:?}", event);
    }

    fn emit_dialog(&self, event: DialogEvent) {
        log::debug!("dialog_event: {:?}", event);
    }

    fn emit_alert(&self, event: AlertEvent) {
        log::debug!("alert_event: {:?}", event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Test emitter that counts events, used by dispatcher/alert tests to
    /// assert on event flow without parsing log output.
    pub struct CountingEventEmitter {
        pub dialog_count: AtomicUsize,
        pub alert_count: AtomicUsize,
        pub connection_count: AtomicUsize,
    }

    impl CountingEventEmitter {
        pub fn new() -> Self {
            Self {
                dialog_count: AtomicUsize::new(0),
                alert_count: AtomicUsize::new(0),
                connection_count: AtomicUsize::new(0),
            }
        }
    }

    impl EventEmitter for CountingEventEmitter {
        fn emit_connection(&self, _event: ConnectionEvent) {
            self.connection_count.fetch_add(1, Ordering::SeqCst);
        }

        fn emit_dialog(&self, _event: DialogEvent) {
            self.dialog_count.fetch_add(1, Ordering::SeqCst);
        }

        fn emit_alert(&self, _event: AlertEvent) {
            self.alert_count.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn counting_emitter_tracks_events() {
        let emitter = Arc::new(CountingEventEmitter::new());

        emitter.emit_dialog(DialogEvent::RecognizeSent {
            dialog_request_id: "njc_dialog_id-0-0".into(),
            timestamp: 0,
        });
        emitter.emit_alert(AlertEvent::Scheduled {
            token: "tok".into(),
            timestamp: 0,
        });

        assert_eq!(emitter.dialog_count.load(Ordering::SeqCst), 1);
        assert_eq!(emitter.alert_count.load(Ordering::SeqCst), 1);
        assert_eq!(emitter.connection_count.load(Ordering::SeqCst), 0);
    }
}
