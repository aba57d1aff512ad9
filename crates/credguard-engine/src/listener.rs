//! Credential-use event handling.
//!
//! Every use is counted first. Uses by runs are then checked against the
//! current rule set, and a denied run is stopped through the cancellation
//! controller. Node and item uses are counted only: they carry no run handle
//! to stop.

use std::sync::Arc;

use credguard_core::ConsumerDimension;

use crate::cancel::{CancellationController, LogSink, LogSinkRegistry, RunHandle, StepGate, StopOutcome};
use crate::obs::metrics::GuardMetrics;
use crate::policy::{evaluate, DenyReason, PolicyDecision, RuleStore};
use crate::usage::UsageStore;

/// The run that used a credential.
#[derive(Debug, Clone)]
pub struct RunConsumer {
    /// Full name of the job/pipeline the run belongs to. Rules match on this
    /// and usage is counted under it.
    pub item_name: String,
    pub handle: RunHandle,
}

#[derive(Debug, Clone)]
pub enum Consumer {
    Run(RunConsumer),
    Node(String),
    Item(String),
}

impl Consumer {
    fn dimension(&self) -> ConsumerDimension {
        match self {
            Consumer::Run(r) => ConsumerDimension::Item(r.item_name.clone()),
            Consumer::Node(n) => ConsumerDimension::Node(n.clone()),
            Consumer::Item(i) => ConsumerDimension::Item(i.clone()),
        }
    }
}

/// One "credential used" notification. `credential_id` is `None` when the
/// runtime could not determine the credential's identity.
#[derive(Debug, Clone)]
pub struct UseEvent {
    pub credential_id: Option<String>,
    pub consumer: Consumer,
}

impl UseEvent {
    pub fn run(credential_id: impl Into<String>, item_name: impl Into<String>, handle: RunHandle) -> Self {
        Self {
            credential_id: Some(credential_id.into()),
            consumer: Consumer::Run(RunConsumer { item_name: item_name.into(), handle }),
        }
    }

    pub fn node(credential_id: impl Into<String>, node: impl Into<String>) -> Self {
        Self { credential_id: Some(credential_id.into()), consumer: Consumer::Node(node.into()) }
    }

    pub fn item(credential_id: impl Into<String>, item: impl Into<String>) -> Self {
        Self { credential_id: Some(credential_id.into()), consumer: Consumer::Item(item.into()) }
    }
}

/// What happened to one use event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UseOutcome {
    /// Usage total after this event, if it was counted.
    pub usage_total: Option<u64>,
    /// Policy verdict; `None` for node/item uses.
    pub decision: Option<PolicyDecision>,
    pub stop: Option<StopOutcome>,
}

pub struct UseListener {
    rules: Arc<RuleStore>,
    usage: Arc<UsageStore>,
    controller: Arc<CancellationController>,
    sinks: Arc<LogSinkRegistry>,
    metrics: Arc<GuardMetrics>,
}

impl UseListener {
    pub fn new(
        rules: Arc<RuleStore>,
        usage: Arc<UsageStore>,
        controller: Arc<CancellationController>,
        sinks: Arc<LogSinkRegistry>,
        metrics: Arc<GuardMetrics>,
    ) -> Self {
        Self { rules, usage, controller, sinks, metrics }
    }

    pub async fn on_use(&self, event: UseEvent) -> UseOutcome {
        let dimension = event.consumer.dimension();

        let usage_total = match event.credential_id.as_deref() {
            Some(id) => self.count(id, &dimension),
            None => {
                tracing::warn!(consumer = %dimension.key(), "credential use without identity; not counted");
                None
            }
        };

        let Consumer::Run(run) = &event.consumer else {
            return UseOutcome { usage_total, decision: None, stop: None };
        };

        let decision = match event.credential_id.as_deref() {
            Some(id) => evaluate(id, &run.item_name, &self.rules.snapshot()),
            None => PolicyDecision::Deny(DenyReason::MissingIdentity),
        };
        self.metrics.policy_decisions.inc(&[("decision", decision.label())]);

        let credential = event.credential_id.as_deref().unwrap_or("<unknown>");
        let run_id = run.handle.run_id();
        if decision.is_allowed() {
            tracing::info!(credential, item = %run.item_name, run = %run_id, "allowing credential access");
            return UseOutcome { usage_total, decision: Some(decision), stop: None };
        }

        tracing::info!(credential, item = %run.item_name, run = %run_id, reason = decision.label(), "blocking credential access");
        self.sinks.error(
            run_id,
            &format!("Access to credential {credential} is blocked. Failing the run.."),
        );

        let started = std::time::Instant::now();
        let outcome = self.controller.stop(&run.handle).await;
        self.metrics.stop_outcomes.inc(&[("kind", run.handle.kind()), ("outcome", outcome.as_str())]);
        self.metrics.stop_duration.observe(&[("kind", run.handle.kind())], started.elapsed());

        UseOutcome { usage_total, decision: Some(decision), stop: Some(outcome) }
    }

    fn count(&self, credential_id: &str, dimension: &ConsumerDimension) -> Option<u64> {
        match self.usage.record(credential_id, dimension) {
            Ok(total) => {
                self.metrics.usage_records.inc(&[("dimension", dimension.kind())]);
                Some(total)
            }
            Err(e) => {
                tracing::error!(credential = %credential_id, error = %e, "failed to persist credential usage");
                self.metrics.usage_persist_errors.inc(&[]);
                Some(self.usage.get(credential_id).total_count())
            }
        }
    }

    /// Run lifecycle: register the run's user-visible log.
    pub fn on_run_started(&self, run_id: &str, sink: Arc<dyn LogSink>) {
        self.sinks.register(run_id, sink);
    }

    /// Run lifecycle: forget everything held for the run.
    pub fn on_run_completed(&self, run_id: &str) {
        self.sinks.remove(run_id);
        self.controller.forget(run_id);
    }

    /// Step-boundary hook for single-step runs.
    pub fn on_step_boundary(&self, run_id: &str) -> StepGate {
        self.controller.on_step_boundary(run_id)
    }
}
