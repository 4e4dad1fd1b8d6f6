//! The async connector that drives [`crate::proto::ClientStateMachine`]
//! against a real UDP socket (spec §4.3): binds the endpoint, runs the
//! login handshake, pumps datagrams, arms keep-alive/retransmit/timeout
//! timers, and supervises reconnection with exponential backoff.
//!
//! Gated behind the `connector` feature (default-on). The wire codec and
//! protocol state machine in [`crate::packet`] and [`crate::proto`] are
//! usable without it, with zero networking dependencies.

mod config;
mod driver;
mod event;
mod reconnect;
mod session;

#[cfg(test)]
mod test_support;

pub use config::{ConnectorConfig, Encoding};
pub use event::{DisconnectCause, Event, LoginFailureKind};
pub use session::{Client, Session};
