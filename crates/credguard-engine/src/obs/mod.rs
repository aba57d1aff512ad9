//! Lightweight in-process metrics.
//!
//! Policy verdicts, usage writes, and run-stop outcomes are stored as atomics
//! and rendered by the `/metrics` handler in Prometheus text format.

pub mod metrics;
