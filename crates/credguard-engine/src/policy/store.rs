use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use credguard_core::error::{CredGuardError, Result};
use credguard_core::RuleSet;

use crate::config::rules::{rule_set_from_str, rule_set_to_string};

use super::engine::CompiledRuleSet;
use super::matcher::validate_rule_set;

/// Where the rule set lives between restarts.
pub trait RuleSetProvider: Send + Sync {
    fn load_rule_set(&self) -> Result<RuleSet>;
    fn save_rule_set(&self, set: &RuleSet) -> Result<()>;
}

/// Process-local provider, used by tests and by configs with inline rules.
#[derive(Default)]
pub struct InMemoryRuleSetProvider {
    inner: Mutex<RuleSet>,
}

impl InMemoryRuleSetProvider {
    pub fn new(set: RuleSet) -> Self {
        Self { inner: Mutex::new(set) }
    }
}

impl RuleSetProvider for InMemoryRuleSetProvider {
    fn load_rule_set(&self) -> Result<RuleSet> {
        Ok(self.inner.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    fn save_rule_set(&self, set: &RuleSet) -> Result<()> {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner) = set.clone();
        Ok(())
    }
}

/// YAML file in the structured rule-set format. A missing file loads as an
/// empty, permissive rule set.
pub struct YamlFileRuleSetProvider {
    path: PathBuf,
}

impl YamlFileRuleSetProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RuleSetProvider for YamlFileRuleSetProvider {
    fn load_rule_set(&self) -> Result<RuleSet> {
        match fs::read_to_string(&self.path) {
            Ok(s) => rule_set_from_str(&s),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(RuleSet::empty(false)),
            Err(e) => Err(CredGuardError::Persistence(format!(
                "read {} failed: {e}",
                self.path.display()
            ))),
        }
    }

    fn save_rule_set(&self, set: &RuleSet) -> Result<()> {
        let body = rule_set_to_string(set)?;
        crate::usage::persist::write_atomic(&self.path, body.as_bytes())
    }
}

/// Current rule set, shared by every evaluation.
///
/// Readers clone an `Arc` snapshot and evaluate without holding any lock, so
/// a concurrent replacement is observed either entirely or not at all.
pub struct RuleStore {
    provider: Arc<dyn RuleSetProvider>,
    current: RwLock<Arc<CompiledRuleSet>>,
    writer: Mutex<()>,
}

impl RuleStore {
    /// Load and validate the rule set from `provider`.
    pub fn open(provider: Arc<dyn RuleSetProvider>) -> Result<Self> {
        let set = provider.load_rule_set()?;
        validate_rule_set(&set)?;
        tracing::info!(rules = set.len(), restrict = set.restrict_by_default(), "credential rules loaded");
        Ok(Self {
            provider,
            current: RwLock::new(Arc::new(CompiledRuleSet::compile(set))),
            writer: Mutex::new(()),
        })
    }

    pub fn snapshot(&self) -> Arc<CompiledRuleSet> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn rule_set(&self) -> RuleSet {
        self.snapshot().source().clone()
    }

    /// Validate, persist, then publish a new rule set. On any error the
    /// previous rule set stays in effect.
    pub fn replace(&self, set: RuleSet) -> Result<()> {
        validate_rule_set(&set)?;
        let _w = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        self.provider.save_rule_set(&set)?;
        let compiled = Arc::new(CompiledRuleSet::compile(set));
        tracing::info!(
            rules = compiled.source().len(),
            restrict = compiled.restrict_by_default(),
            "credential rules replaced"
        );
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = compiled;
        Ok(())
    }

    /// Re-read the provider (e.g. after an external edit).
    pub fn reload(&self) -> Result<()> {
        let _w = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let set = self.provider.load_rule_set()?;
        validate_rule_set(&set)?;
        *self.current.write().unwrap_or_else(PoisonError::into_inner) =
            Arc::new(CompiledRuleSet::compile(set));
        Ok(())
    }
}
