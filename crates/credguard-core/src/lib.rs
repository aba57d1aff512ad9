//! credguard core: error types and the data model shared by the engine.
//!
//! This crate defines rules, rule sets, and usage records, plus the error
//! surface shared by the engine and reporting tooling. It carries no runtime
//! or pattern-matching dependencies so it can be reused by other front ends.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! All fallible paths surface as `CredGuardError`/`Result`.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod model;

/// Shared result type.
pub use error::{CredGuardError, ErrorCode, Result};
pub use model::rule::{Rule, RuleSet};
pub use model::usage::{ConsumerDimension, UsageRecord, UsageSnapshot};
