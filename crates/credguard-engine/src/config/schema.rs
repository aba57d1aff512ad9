use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_yaml::Mapping;

use credguard_core::error::{CredGuardError, Result};

use crate::policy::{InMemoryRuleSetProvider, RuleSetProvider, YamlFileRuleSetProvider};
use crate::usage::{InMemoryUsagePersistence, JsonFileUsagePersistence, UsagePersistence};

use super::rules::rule_set_from_mapping;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GuardConfig {
    pub version: u32,

    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub usage: UsageSection,

    #[serde(default)]
    pub rules: RulesSection,

    #[serde(default)]
    pub cancellation: CancellationSection,

    /// Inline rule set in the structured rule-set format.
    #[serde(default, rename = "credentialRules")]
    pub credential_rules: Option<Mapping>,
}

impl GuardConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(CredGuardError::UnsupportedVersion);
        }

        self.server.validate()?;
        self.cancellation.validate()?;

        if self.rules.path.is_some() && self.credential_rules.is_some() {
            return Err(CredGuardError::InvalidConfig(
                "set either rules.path or credentialRules, not both".into(),
            ));
        }
        if let Some(m) = &self.credential_rules {
            rule_set_from_mapping(m)?;
        }
        Ok(())
    }

    /// Rule-set provider named by this config: the rules file, or the inline
    /// rules held in memory.
    pub fn rule_provider(&self) -> Result<Arc<dyn RuleSetProvider>> {
        if let Some(path) = &self.rules.path {
            return Ok(Arc::new(YamlFileRuleSetProvider::new(path)));
        }
        let set = match &self.credential_rules {
            Some(m) => rule_set_from_mapping(m)?,
            None => credguard_core::RuleSet::empty(false),
        };
        Ok(Arc::new(InMemoryRuleSetProvider::new(set)))
    }

    pub fn usage_persistence(&self) -> Arc<dyn UsagePersistence> {
        match &self.usage.path {
            Some(path) => Arc::new(JsonFileUsagePersistence::new(path)),
            None => Arc::new(InMemoryUsagePersistence::new()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self { listen: default_listen() }
    }
}

impl ServerSection {
    pub fn validate(&self) -> Result<()> {
        self.listen_addr().map(|_| ())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.listen.parse().map_err(|e| {
            CredGuardError::InvalidConfig(format!("server.listen must be a socket address: {e}"))
        })
    }
}

fn default_listen() -> String {
    "127.0.0.1:8088".into()
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct UsageSection {
    /// JSON usage file; usage is kept in memory only when absent.
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RulesSection {
    /// YAML file in the structured rule-set format.
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CancellationSection {
    /// Bounds both the live-step lookup and the step cancellation of a graph
    /// run; expiry escalates to a hard kill.
    #[serde(default = "default_lookup_timeout_ms")]
    pub lookup_timeout_ms: u64,
}

impl Default for CancellationSection {
    fn default() -> Self {
        Self { lookup_timeout_ms: default_lookup_timeout_ms() }
    }
}

impl CancellationSection {
    pub fn validate(&self) -> Result<()> {
        if !(100..=300_000).contains(&self.lookup_timeout_ms) {
            return Err(CredGuardError::InvalidConfig(
                "cancellation.lookup_timeout_ms must be between 100 and 300000".into(),
            ));
        }
        Ok(())
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }
}

fn default_lookup_timeout_ms() -> u64 {
    10_000
}
