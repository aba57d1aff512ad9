use credguard_core::RuleSet;

use super::matcher::{compile_rules, CompiledRule};

/// Why a use was denied. Administrative detail only; the consumer is told
/// nothing beyond "access blocked".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// Restrictive default and no rule's credential pattern matched.
    NoMatchingRule,
    /// Some rule matched the credential but none of the matching rules
    /// permits this consumer.
    ConsumerNotPermitted,
    /// The credential id could not be determined (fail closed).
    MissingIdentity,
}

impl DenyReason {
    pub fn as_str(self) -> &'static str {
        match self {
            DenyReason::NoMatchingRule => "no_matching_rule",
            DenyReason::ConsumerNotPermitted => "consumer_not_permitted",
            DenyReason::MissingIdentity => "missing_identity",
        }
    }
}

/// Decision from policy evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyDecision {
    Allow,
    Deny(DenyReason),
}

impl PolicyDecision {
    pub fn is_allowed(self) -> bool {
        matches!(self, PolicyDecision::Allow)
    }

    /// Metrics label.
    pub fn label(self) -> &'static str {
        match self {
            PolicyDecision::Allow => "allow",
            PolicyDecision::Deny(r) => r.as_str(),
        }
    }
}

/// Rule set snapshot with patterns compiled once.
/// Construct when the configuration changes, then share via Arc.
#[derive(Debug)]
pub struct CompiledRuleSet {
    source: RuleSet,
    rules: Vec<CompiledRule>,
}

impl CompiledRuleSet {
    pub fn compile(source: RuleSet) -> Self {
        let rules = compile_rules(source.rules());
        Self { source, rules }
    }

    pub fn source(&self) -> &RuleSet {
        &self.source
    }

    pub fn restrict_by_default(&self) -> bool {
        self.source.restrict_by_default()
    }
}

/// Evaluate whether `consumer` may use `credential_id`.
///
/// Every rule is scanned: rules whose credential pattern matches contribute to
/// `consumer_allowed` by OR, so a later rule can grant what an earlier one
/// only matched.
pub fn evaluate(credential_id: &str, consumer: &str, set: &CompiledRuleSet) -> PolicyDecision {
    let restrict = set.restrict_by_default();

    if set.rules.is_empty() {
        tracing::debug!(credential = %credential_id, consumer = %consumer, restrict, "no credential rules configured");
        return if restrict {
            PolicyDecision::Deny(DenyReason::NoMatchingRule)
        } else {
            PolicyDecision::Allow
        };
    }

    let mut credential_matched = false;
    let mut consumer_allowed = false;
    for r in &set.rules {
        if !r.matches_credential(credential_id) {
            continue;
        }
        credential_matched = true;
        if r.matches_item(consumer) {
            tracing::debug!(rule = %r.name, credential = %credential_id, consumer = %consumer, "rule permits consumer");
            consumer_allowed = true;
        } else {
            tracing::debug!(rule = %r.name, credential = %credential_id, consumer = %consumer, "rule matched credential only");
        }
    }

    match (restrict, credential_matched) {
        (true, false) => PolicyDecision::Deny(DenyReason::NoMatchingRule),
        (_, true) if consumer_allowed => PolicyDecision::Allow,
        (_, true) => PolicyDecision::Deny(DenyReason::ConsumerNotPermitted),
        (false, false) => PolicyDecision::Allow,
    }
}

/// Convenience form over an uncompiled rule set. Compiles every pattern, so
/// prefer [`evaluate`] with a cached [`CompiledRuleSet`] on hot paths.
pub fn is_allowed(credential_id: &str, consumer: &str, set: &RuleSet) -> bool {
    evaluate(credential_id, consumer, &CompiledRuleSet::compile(set.clone())).is_allowed()
}
