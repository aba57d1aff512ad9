//! Rule compilation and matching utilities.
//!
//! Patterns are full-string regular expressions: `deploy-.*` matches
//! `deploy-prod` but not `my-deploy-prod`. Compilation wraps every pattern in
//! `^(?:...)$` so a plain `Regex::is_match` gives whole-string semantics.

use regex::Regex;

use credguard_core::error::{CredGuardError, Result};
use credguard_core::{Rule, RuleSet};

use crate::config::rules::RESTRICT_KEY;

/// Compiled rule. A pattern that fails to compile is kept as `None` and never
/// matches.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub name: String,
    credential: Option<Regex>,
    item: Option<Regex>,
}

impl CompiledRule {
    pub fn matches_credential(&self, credential_id: &str) -> bool {
        self.credential.as_ref().is_some_and(|re| re.is_match(credential_id))
    }

    pub fn matches_item(&self, consumer: &str) -> bool {
        self.item.as_ref().is_some_and(|re| re.is_match(consumer))
    }
}

// The raw pattern must compile on its own: `a)|(b` only compiles once wrapped,
// and the wrapped form is no longer anchored.
fn anchored(pattern: &str) -> std::result::Result<Regex, regex::Error> {
    Regex::new(pattern)?;
    Regex::new(&format!("^(?:{pattern})$"))
}

/// Check one pattern at authoring time.
pub fn validate_pattern(rule: &str, field: &str, pattern: &str) -> Result<()> {
    anchored(pattern).map(|_| ()).map_err(|e| CredGuardError::InvalidPattern {
        rule: rule.to_string(),
        reason: format!("{field}: {e}"),
    })
}

/// Authoring-time validation: every pattern of every rule must compile, and no
/// rule may take the name of the default-policy key.
pub fn validate_rule_set(set: &RuleSet) -> Result<()> {
    for r in set.rules() {
        if r.name() == RESTRICT_KEY {
            return Err(CredGuardError::InvalidConfig(format!(
                "rule name {RESTRICT_KEY} is reserved"
            )));
        }
        validate_pattern(r.name(), "credentialPattern", r.credential_pattern())?;
        validate_pattern(r.name(), "itemPattern", r.item_pattern())?;
    }
    Ok(())
}

/// Evaluation-time compilation. Never fails: a malformed pattern degrades to
/// "does not match".
pub fn compile_rule(rule: &Rule) -> CompiledRule {
    let credential = match anchored(rule.credential_pattern()) {
        Ok(re) => Some(re),
        Err(e) => {
            tracing::warn!(rule = %rule.name(), error = %e, "credentialPattern does not compile; rule never matches");
            None
        }
    };
    let item = match anchored(rule.item_pattern()) {
        Ok(re) => Some(re),
        Err(e) => {
            tracing::warn!(rule = %rule.name(), error = %e, "itemPattern does not compile; rule never grants");
            None
        }
    };
    CompiledRule { name: rule.name().to_string(), credential, item }
}

pub fn compile_rules(rules: &[Rule]) -> Vec<CompiledRule> {
    rules.iter().map(compile_rule).collect()
}
