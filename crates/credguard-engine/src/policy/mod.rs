//! Policy layer (credential rules, evaluation, rule-set storage).
//!
//! Compiles configured rules into regex matchers once per rule-set snapshot
//! so the per-use check is a plain scan over precompiled patterns.

pub mod engine;
pub mod matcher;
pub mod store;

pub use engine::{evaluate, is_allowed, CompiledRuleSet, DenyReason, PolicyDecision};
pub use store::{InMemoryRuleSetProvider, RuleSetProvider, RuleStore, YamlFileRuleSetProvider};
