//! Guard config loader (strict parsing).

pub mod rules;
pub mod schema;

use std::fs;

use credguard_core::error::{CredGuardError, Result};

pub use schema::{CancellationSection, GuardConfig, RulesSection, ServerSection, UsageSection};

pub fn load_from_file(path: &str) -> Result<GuardConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| CredGuardError::InvalidConfig(format!("read config {path} failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<GuardConfig> {
    let cfg: GuardConfig = serde_yaml::from_str(s)
        .map_err(|e| CredGuardError::InvalidConfig(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}
