//! Data model shared by the policy engine, usage store, and reporting.
//!
//! - `rule`: named credential/item pattern pairs and the rule set.
//! - `usage`: per-credential usage counters keyed by consumer and node.

pub mod rule;
pub mod usage;
