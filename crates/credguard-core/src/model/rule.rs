use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{CredGuardError, Result};

/// A named pair of patterns permitting credential/consumer combinations.
///
/// Patterns are kept as authored; compilation (and full-string anchoring)
/// happens in the engine when a rule set snapshot is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawRule")]
pub struct Rule {
    name: String,
    credential_pattern: String,
    item_pattern: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawRule {
    name: String,
    credential_pattern: String,
    item_pattern: String,
}

impl TryFrom<RawRule> for Rule {
    type Error = CredGuardError;

    fn try_from(raw: RawRule) -> Result<Self> {
        Rule::new(raw.name, raw.credential_pattern, raw.item_pattern)
    }
}

impl Rule {
    /// Build a rule, rejecting empty (or whitespace-only) name and patterns.
    pub fn new(
        name: impl Into<String>,
        credential_pattern: impl Into<String>,
        item_pattern: impl Into<String>,
    ) -> Result<Self> {
        let name = name.into();
        let credential_pattern = credential_pattern.into();
        let item_pattern = item_pattern.into();

        if name.trim().is_empty() {
            return Err(CredGuardError::InvalidConfig("rule name can't be empty".into()));
        }
        if credential_pattern.trim().is_empty() {
            return Err(CredGuardError::InvalidConfig(format!(
                "rule {name}: credential pattern can't be empty"
            )));
        }
        if item_pattern.trim().is_empty() {
            return Err(CredGuardError::InvalidConfig(format!(
                "rule {name}: item pattern can't be empty"
            )));
        }

        Ok(Self { name, credential_pattern, item_pattern })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn credential_pattern(&self) -> &str {
        &self.credential_pattern
    }

    pub fn item_pattern(&self) -> &str {
        &self.item_pattern
    }
}

/// Ordered rules plus the default policy for credentials no rule matches.
///
/// Order never affects a decision but is preserved for display and
/// configuration round-trips. A rule set is replaced wholesale, never edited
/// in place.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSet {
    rules: Vec<Rule>,
    restrict_by_default: bool,
}

impl RuleSet {
    /// Build a rule set. Rule names must be unique since the structured
    /// configuration format keys rules by name.
    pub fn new(rules: Vec<Rule>, restrict_by_default: bool) -> Result<Self> {
        let mut seen = HashSet::with_capacity(rules.len());
        for r in &rules {
            if !seen.insert(r.name()) {
                return Err(CredGuardError::InvalidConfig(format!(
                    "duplicate rule name: {}",
                    r.name()
                )));
            }
        }
        Ok(Self { rules, restrict_by_default })
    }

    /// Rule set without rules; the default policy decides everything.
    pub fn empty(restrict_by_default: bool) -> Self {
        Self { rules: Vec::new(), restrict_by_default }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn restrict_by_default(&self) -> bool {
        self.restrict_by_default
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }
}
