//! credguard engine library entry.
//!
//! Wires rule evaluation, usage accounting, and run cancellation behind one
//! credential-use listener, plus the reporting HTTP surface. Consumed by the
//! binary (`main.rs`), by runtimes embedding the guard, and by integration
//! tests.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod app_state;
pub mod cancel;
pub mod config;
pub mod listener;
pub mod obs;
pub mod ops;
pub mod policy;
pub mod router;
pub mod usage;
