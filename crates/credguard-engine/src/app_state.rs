//! Shared application state for the credguard engine.
//!
//! Builds the rule store, usage store, cancellation controller, and use
//! listener from one config. Startup errors are returned, never panicked.

use std::sync::Arc;

use credguard_core::error::Result;

use crate::cancel::{CancellationController, ExecutionRegistry, LogSinkRegistry};
use crate::config::GuardConfig;
use crate::listener::UseListener;
use crate::obs::metrics::GuardMetrics;
use crate::policy::RuleStore;
use crate::usage::UsageStore;

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
    listener: Arc<UseListener>,
}

struct AppStateInner {
    cfg: GuardConfig,
    rules: Arc<RuleStore>,
    usage: Arc<UsageStore>,
    controller: Arc<CancellationController>,
    sinks: Arc<LogSinkRegistry>,
    metrics: Arc<GuardMetrics>,
}

impl AppState {
    /// Build application state. `registry` resolves live sub-steps of graph
    /// runs for the runtime this engine is embedded in.
    pub fn new(cfg: GuardConfig, registry: Arc<dyn ExecutionRegistry>) -> Result<Self> {
        // 1) Rules and usage, loaded through their providers
        let rules = Arc::new(RuleStore::open(cfg.rule_provider()?)?);
        let usage = Arc::new(UsageStore::open(cfg.usage_persistence())?);

        // 2) Cancellation
        let sinks = Arc::new(LogSinkRegistry::new());
        let controller = Arc::new(CancellationController::new(
            registry,
            Arc::clone(&sinks),
            cfg.cancellation.lookup_timeout(),
        ));

        // 3) Event source wiring
        let metrics = Arc::new(GuardMetrics::default());
        let listener = Arc::new(UseListener::new(
            Arc::clone(&rules),
            Arc::clone(&usage),
            Arc::clone(&controller),
            Arc::clone(&sinks),
            Arc::clone(&metrics),
        ));

        Ok(Self {
            inner: Arc::new(AppStateInner { cfg, rules, usage, controller, sinks, metrics }),
            listener,
        })
    }

    pub fn cfg(&self) -> &GuardConfig {
        &self.inner.cfg
    }

    pub fn rules(&self) -> Arc<RuleStore> {
        Arc::clone(&self.inner.rules)
    }

    pub fn usage(&self) -> Arc<UsageStore> {
        Arc::clone(&self.inner.usage)
    }

    pub fn controller(&self) -> Arc<CancellationController> {
        Arc::clone(&self.inner.controller)
    }

    pub fn listener(&self) -> Arc<UseListener> {
        Arc::clone(&self.listener)
    }

    pub fn metrics(&self) -> &GuardMetrics {
        &self.inner.metrics
    }

    /// Point-in-time gauges appended to the metrics output.
    pub fn metrics_extra(&self) -> Vec<(&'static str, u64)> {
        let snapshot = self.inner.rules.snapshot();
        vec![
            ("credguard_usage_credentials", self.inner.usage.len() as u64),
            ("credguard_rules", snapshot.source().len() as u64),
            ("credguard_restrict_by_default", u64::from(snapshot.restrict_by_default())),
            ("credguard_run_log_sinks", self.inner.sinks.len() as u64),
        ]
    }
}
