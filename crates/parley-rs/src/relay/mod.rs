//! The bounded tool-call loop: configuration, observability events, and the
//! runner itself.

pub mod config;
pub mod events;
pub mod runner;

pub use config::RelayConfig;
pub use events::{
    CompositeEventHandler, EventHandler, FnEventHandler, LoggingHandler, NoopHandler, RelayEvent,
};
pub use runner::{Relay, RelayResult};
