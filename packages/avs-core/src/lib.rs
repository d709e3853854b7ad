//! AVS Core - shared protocol library for the Alexa Voice Service client.
//!
//! This crate implements the AVS (v20160207) wire protocol: multipart
//! framing, OAuth2 token management, the persistent HTTP/2 connection and
//! its downchannel/keepalive background tasks, the directive dispatcher,
//! and the alert scheduler. It has no opinion about where microphone audio
//! comes from or how decoded audio gets to speakers — those are narrow
//! collaborator traits the binary crate wires up.
//!
//! # Architecture
//!
//! - [`multipart`]: the `multipart/form-data` codec AVS speaks on the wire
//! - [`auth`]: OAuth2 token acquisition and caching
//! - [`avs`]: the protocol engine — connection, downchannel, keepalive,
//!   event builder, context assembler, alert scheduler, dispatcher
//! - [`dialog`]: the wake-word → recognize driving loop
//! - [`state`]: locally observed client state snapshotted into event context
//! - [`events`]: the domain event system used for observability
//! - [`runtime`]: task spawning abstraction for runtime independence
//! - [`collaborators`]: microphone/audio-player traits the protocol engine
//!   depends on but never implements
//! - [`bootstrap`]: the composition root wiring everything above together
//! - [`error`]: centralized error types

#![warn(clippy::all)]

pub mod auth;
pub mod avs;
pub mod bootstrap;
pub mod collaborators;
pub mod dialog;
pub mod error;
pub mod events;
pub mod multipart;
pub mod protocol_constants;
pub mod runtime;
pub mod state;
pub mod utils;

pub use auth::{RefreshCredentials, TokenManager};
pub use avs::{
    AlertScheduler, Connection, ConnectionApi, ContextAssembler, Dispatcher, Downchannel,
    EventBuilder, Keepalive,
};
pub use bootstrap::{BootstrapConfig, ClientRuntime};
pub use collaborators::{AudioPlayer, Microphone, PlayerError};
pub use dialog::DialogDriver;
pub use error::{AvsError, AvsResult};
pub use events::{EventEmitter, LoggingEventEmitter, NoopEventEmitter};
pub use runtime::{TaskSpawner, TokioSpawner};
pub use state::ClientState;
