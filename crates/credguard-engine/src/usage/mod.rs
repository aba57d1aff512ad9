//! Usage accounting.
//!
//! One store-wide critical section covers every `record` and `clear`, so
//! concurrent use events never lose an increment. Persistence is pluggable.

pub mod persist;
pub mod store;

pub use persist::{InMemoryUsagePersistence, JsonFileUsagePersistence, UsagePersistence};
pub use store::UsageStore;
