//! Top-level facade crate for credguard.
//!
//! Re-exports the core model and the engine so users can depend on a single crate.

pub mod core {
    pub use credguard_core::*;
}

pub mod engine {
    pub use credguard_engine::*;
}
