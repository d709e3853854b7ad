//! The AVS protocol engine: the persistent connection, downchannel reader,
//! keepalive, event builder, alert scheduler, and directive dispatcher.

pub mod alerts;
pub mod connection;
pub mod context_assembler;
pub mod dispatcher;
pub mod downchannel;
pub mod event_builder;
pub mod keepalive;

pub use alerts::{Alert, AlertScheduler};
pub use connection::{Connection, ConnectionApi};
pub use context_assembler::ContextAssembler;
pub use dispatcher::Dispatcher;
pub use downchannel::Downchannel;
pub use event_builder::EventBuilder;
pub use keepalive::Keepalive;
