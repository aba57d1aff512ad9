//! Structured rule-set format.
//!
//! ```yaml
//! restrictNotMatching: true
//! deploy-keys:
//!   credentialPattern: "deploy-.*"
//!   itemPattern: "release/.*"
//! ```
//!
//! Every key other than `restrictNotMatching` is a rule name. Entry order is
//! the rule order. A rule missing either pattern is a fatal error.

use serde::Deserialize;
use serde_yaml::{Mapping, Value};

use credguard_core::error::{CredGuardError, Result};
use credguard_core::{Rule, RuleSet};

use crate::policy::matcher::validate_rule_set;

pub const RESTRICT_KEY: &str = "restrictNotMatching";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleEntry {
    #[serde(rename = "credentialPattern")]
    credential_pattern: Option<String>,
    #[serde(rename = "itemPattern")]
    item_pattern: Option<String>,
}

pub fn rule_set_from_str(s: &str) -> Result<RuleSet> {
    if s.trim().is_empty() {
        return Ok(RuleSet::empty(false));
    }
    let value: Value = serde_yaml::from_str(s)
        .map_err(|e| CredGuardError::InvalidConfig(format!("invalid yaml: {e}")))?;
    match value {
        Value::Mapping(m) => rule_set_from_mapping(&m),
        // an empty document means "nothing configured"
        Value::Null => Ok(RuleSet::empty(false)),
        _ => Err(CredGuardError::InvalidConfig(
            "credential rules must be a mapping".into(),
        )),
    }
}

pub fn rule_set_from_mapping(m: &Mapping) -> Result<RuleSet> {
    let mut restrict = false;
    let mut rules = Vec::with_capacity(m.len());

    for (k, v) in m {
        let key = k.as_str().ok_or_else(|| {
            CredGuardError::InvalidConfig(format!("credential rule key must be a string: {k:?}"))
        })?;

        if key == RESTRICT_KEY {
            restrict = v.as_bool().ok_or_else(|| {
                CredGuardError::InvalidConfig(format!("{RESTRICT_KEY} must be a boolean"))
            })?;
            continue;
        }

        let entry: RuleEntry = serde_yaml::from_value(v.clone()).map_err(|e| {
            CredGuardError::InvalidConfig(format!("invalid credential rule {key}: {e}"))
        })?;
        let (Some(cred), Some(item)) = (entry.credential_pattern, entry.item_pattern) else {
            return Err(CredGuardError::InvalidConfig(format!(
                "missing credentialPattern/itemPattern key for {key}"
            )));
        };
        tracing::debug!(rule = %key, credential_pattern = %cred, item_pattern = %item, "loaded credential rule");
        rules.push(Rule::new(key, cred, item)?);
    }

    let set = RuleSet::new(rules, restrict)?;
    validate_rule_set(&set)?;
    Ok(set)
}

pub fn rule_set_to_mapping(set: &RuleSet) -> Result<Mapping> {
    let mut m = Mapping::new();
    m.insert(RESTRICT_KEY.into(), Value::Bool(set.restrict_by_default()));
    for r in set.rules() {
        if r.name() == RESTRICT_KEY {
            return Err(CredGuardError::InvalidConfig(format!(
                "rule name {RESTRICT_KEY} is reserved"
            )));
        }
        let mut entry = Mapping::new();
        entry.insert("credentialPattern".into(), r.credential_pattern().into());
        entry.insert("itemPattern".into(), r.item_pattern().into());
        m.insert(r.name().into(), Value::Mapping(entry));
    }
    Ok(m)
}

pub fn rule_set_to_string(set: &RuleSet) -> Result<String> {
    let m = rule_set_to_mapping(set)?;
    serde_yaml::to_string(&m)
        .map_err(|e| CredGuardError::Internal(format!("yaml encode failed: {e}")))
}
