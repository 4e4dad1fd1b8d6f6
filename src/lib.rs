#![doc = include_str!("../README.md")]
#![deny(rustdoc::broken_intra_doc_links, rust_2018_idioms)]
#![warn(
    clippy::clone_on_ref_ptr,
    clippy::dbg_macro,
    clippy::explicit_iter_loop,
    clippy::future_not_send,
    clippy::todo,
    clippy::unimplemented,
    clippy::use_self,
    clippy::doc_markdown,
    clippy::print_stdout,
    missing_debug_implementations,
    unused_crate_dependencies,
    unreachable_pub,
    missing_docs
)]

mod checks;
pub use checks::{Clock, ManualClock, NonceCheck, SystemClock};

mod error;
pub use error::Error;

pub mod packet;

pub mod proto;

#[cfg(feature = "connector")]
mod connector;

#[cfg(feature = "connector")]
pub use connector::{
    Client, ConnectorConfig, DisconnectCause, Encoding, Event, LoginFailureKind, Session,
};

// Unused crate lint workarounds for dependencies only exercised by
// benches/fuzz targets, not by any `#[cfg(test)]` unit test.
#[cfg(test)]
use criterion as _;
#[cfg(test)]
use hex_literal as _;
