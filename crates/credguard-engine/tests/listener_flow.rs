#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use credguard_core::{Rule, RuleSet};
use credguard_engine::cancel::{
    CancellationController, EmptyExecutionRegistry, GraphExecution, LogSink, LogSinkRegistry,
    RunHandle, SingleStepExecution, StepGate, StopOutcome, STOPPING_MSG,
};
use credguard_engine::listener::{UseEvent, UseListener};
use credguard_engine::obs::metrics::GuardMetrics;
use credguard_engine::policy::{DenyReason, InMemoryRuleSetProvider, PolicyDecision, RuleStore};
use credguard_engine::usage::UsageStore;

#[derive(Default)]
struct RecordingSink {
    lines: Mutex<Vec<String>>,
}

impl LogSink for RecordingSink {
    fn error(&self, msg: &str) {
        self.lines.lock().unwrap().push(msg.to_string());
    }
}

struct Graph {
    id: String,
    failed: AtomicBool,
    killed: AtomicBool,
}

impl GraphExecution for Graph {
    fn run_id(&self) -> &str {
        &self.id
    }
    fn mark_failed(&self) {
        self.failed.store(true, Ordering::SeqCst);
    }
    fn hard_kill(&self) {
        self.killed.store(true, Ordering::SeqCst);
    }
}

struct Freestyle {
    id: String,
    safe: bool,
    aborted: AtomicBool,
}

impl SingleStepExecution for Freestyle {
    fn run_id(&self) -> &str {
        &self.id
    }
    fn at_safe_point(&self) -> bool {
        self.safe
    }
    fn mark_failed(&self) {}
    fn abort(&self, _reason: &str) {
        self.aborted.store(true, Ordering::SeqCst);
    }
}

fn graph(id: &str) -> Arc<Graph> {
    Arc::new(Graph { id: id.into(), failed: AtomicBool::new(false), killed: AtomicBool::new(false) })
}

struct Harness {
    listener: UseListener,
    usage: Arc<UsageStore>,
    controller: Arc<CancellationController>,
    sinks: Arc<LogSinkRegistry>,
    metrics: Arc<GuardMetrics>,
}

fn harness(restrict: bool) -> Harness {
    let set = RuleSet::new(
        vec![Rule::new("deploy", "deploy-.*", "release/.*").unwrap()],
        restrict,
    )
    .unwrap();
    let rules = Arc::new(RuleStore::open(Arc::new(InMemoryRuleSetProvider::new(set))).unwrap());
    let usage = Arc::new(UsageStore::in_memory());
    let sinks = Arc::new(LogSinkRegistry::new());
    let controller = Arc::new(CancellationController::new(
        Arc::new(EmptyExecutionRegistry),
        Arc::clone(&sinks),
        Duration::from_secs(1),
    ));
    let metrics = Arc::new(GuardMetrics::default());
    let listener = UseListener::new(
        rules,
        Arc::clone(&usage),
        Arc::clone(&controller),
        Arc::clone(&sinks),
        Arc::clone(&metrics),
    );
    Harness { listener, usage, controller, sinks, metrics }
}

#[tokio::test]
async fn allowed_use_is_counted_and_not_stopped() {
    let h = harness(true);
    let exec = graph("release/app#1");

    let out = h
        .listener
        .on_use(UseEvent::run("deploy-prod", "release/app", RunHandle::Graph(exec.clone())))
        .await;

    assert_eq!(out.decision, Some(PolicyDecision::Allow));
    assert_eq!(out.usage_total, Some(1));
    assert_eq!(out.stop, None);
    assert!(!exec.failed.load(Ordering::SeqCst));
    assert_eq!(h.usage.get("deploy-prod").item_count("release/app"), 1);
    assert_eq!(h.metrics.policy_decisions.get(&[("decision", "allow")]), 1);
}

#[tokio::test]
async fn denied_run_is_counted_logged_and_stopped() {
    let h = harness(true);
    let sink = Arc::new(RecordingSink::default());
    h.listener.on_run_started("feature/x#4", sink.clone());
    let exec = graph("feature/x#4");

    let out = h
        .listener
        .on_use(UseEvent::run("deploy-prod", "feature/x", RunHandle::Graph(exec.clone())))
        .await;

    assert_eq!(out.decision, Some(PolicyDecision::Deny(DenyReason::ConsumerNotPermitted)));
    // counted even though denied
    assert_eq!(out.usage_total, Some(1));
    // no registry context in this harness: graceful stop fails over to hard kill
    assert_eq!(out.stop, Some(StopOutcome::HardKilled));
    assert!(exec.failed.load(Ordering::SeqCst));
    assert!(exec.killed.load(Ordering::SeqCst));

    let lines = sink.lines.lock().unwrap().clone();
    assert_eq!(lines[0], "Access to credential deploy-prod is blocked. Failing the run..");
    assert_eq!(lines[1], STOPPING_MSG);
    assert_eq!(
        h.metrics.stop_outcomes.get(&[("kind", "graph"), ("outcome", "hard_killed")]),
        1
    );
    assert_eq!(h.metrics.stop_duration.count(&[("kind", "graph")]), 1);
}

#[tokio::test]
async fn unmatched_credential_follows_default() {
    let restrictive = harness(true);
    let out = restrictive
        .listener
        .on_use(UseEvent::run("ssh-key", "anything", RunHandle::Graph(graph("a#1"))))
        .await;
    assert_eq!(out.decision, Some(PolicyDecision::Deny(DenyReason::NoMatchingRule)));

    let permissive = harness(false);
    let out = permissive
        .listener
        .on_use(UseEvent::run("ssh-key", "anything", RunHandle::Graph(graph("a#1"))))
        .await;
    assert_eq!(out.decision, Some(PolicyDecision::Allow));
    assert_eq!(out.stop, None);
}

#[tokio::test]
async fn node_and_item_uses_are_counted_without_policy() {
    let h = harness(true);

    let node = h.listener.on_use(UseEvent::node("deploy-prod", "agent-1")).await;
    let item = h.listener.on_use(UseEvent::item("deploy-prod", "feature/x")).await;

    assert_eq!(node.decision, None);
    assert_eq!(item.decision, None);
    assert_eq!(item.usage_total, Some(2));

    let rec = h.usage.get("deploy-prod");
    assert_eq!(rec.node_count("agent-1"), 1);
    assert_eq!(rec.item_count("feature/x"), 1);
    assert_eq!(h.metrics.policy_decisions.get(&[("decision", "allow")]), 0);
}

#[tokio::test]
async fn use_without_identity_fails_closed_and_is_not_counted() {
    let h = harness(false);
    let exec = graph("free#2");
    let mut event = UseEvent::run("ignored", "release/app", RunHandle::Graph(exec.clone()));
    event.credential_id = None;

    let out = h.listener.on_use(event).await;

    assert_eq!(out.usage_total, None);
    assert_eq!(out.decision, Some(PolicyDecision::Deny(DenyReason::MissingIdentity)));
    assert!(h.usage.is_empty());
    assert!(exec.failed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn single_step_run_denied_mid_step_aborts_at_boundary() {
    let h = harness(true);
    let exec = Arc::new(Freestyle { id: "free#9".into(), safe: false, aborted: AtomicBool::new(false) });

    let out = h
        .listener
        .on_use(UseEvent::run("deploy-prod", "feature/x", RunHandle::SingleStep(exec.clone())))
        .await;

    assert_eq!(out.stop, Some(StopOutcome::PendingStop));
    assert!(!exec.aborted.load(Ordering::SeqCst));
    assert_eq!(h.listener.on_step_boundary("free#9"), StepGate::Abort);
    assert!(exec.aborted.load(Ordering::SeqCst));
}

#[tokio::test]
async fn second_denial_in_same_run_does_not_stop_twice() {
    let h = harness(true);
    let exec = graph("feature/x#5");

    let first = h
        .listener
        .on_use(UseEvent::run("deploy-prod", "feature/x", RunHandle::Graph(exec.clone())))
        .await;
    let second = h
        .listener
        .on_use(UseEvent::run("deploy-prod", "feature/x", RunHandle::Graph(exec.clone())))
        .await;

    assert_eq!(first.stop, Some(StopOutcome::HardKilled));
    assert_eq!(second.stop, Some(StopOutcome::AlreadyStopping));
    assert_eq!(second.usage_total, Some(2));
}

#[tokio::test]
async fn run_completion_drops_sink_and_stop_state() {
    let h = harness(true);
    h.listener.on_run_started("free#3", Arc::new(RecordingSink::default()));
    let exec = Arc::new(Freestyle { id: "free#3".into(), safe: false, aborted: AtomicBool::new(false) });
    h.listener
        .on_use(UseEvent::run("deploy-prod", "feature/x", RunHandle::SingleStep(exec)))
        .await;
    assert_eq!(h.sinks.len(), 1);
    assert!(h.controller.is_pending("free#3"));

    h.listener.on_run_completed("free#3");

    assert!(h.sinks.is_empty());
    assert!(!h.controller.is_pending("free#3"));
    assert_eq!(h.listener.on_step_boundary("free#3"), StepGate::Proceed);
}
