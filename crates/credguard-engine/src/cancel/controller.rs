use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::{DashMap, DashSet};
use futures_util::stream::FuturesUnordered;
use futures_util::{FutureExt, StreamExt};
use tokio::time::timeout;

use credguard_core::error::{CredGuardError, Result};

use super::execution::{ExecutionRegistry, GraphExecution, RunHandle, SingleStepExecution};
use super::sink::LogSinkRegistry;

pub const STOPPING_MSG: &str = "Stopping run..";
const STEP_CANCEL_REASON: &str = "Cancelling step: credential access blocked";

/// Result of a stop request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Single-step run aborted immediately.
    Failed,
    /// Single-step run queued; aborts at its next step boundary.
    PendingStop,
    /// Graph run: every live sub-step was cancelled.
    Stopped,
    /// Graph run: graceful stop failed, run was force-terminated.
    HardKilled,
    /// A stop for this run was already issued.
    AlreadyStopping,
}

impl StopOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            StopOutcome::Failed => "failed",
            StopOutcome::PendingStop => "pending_stop",
            StopOutcome::Stopped => "stopped",
            StopOutcome::HardKilled => "hard_killed",
            StopOutcome::AlreadyStopping => "already_stopping",
        }
    }
}

/// What a single-step run should do at a step boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepGate {
    Proceed,
    Abort,
}

/// Stops runs after a credential use was denied.
///
/// Owns its per-run bookkeeping (pending single-step stops, runs already being
/// stopped) in sharded maps; no lock spans more than one run.
pub struct CancellationController {
    registry: Arc<dyn ExecutionRegistry>,
    sinks: Arc<LogSinkRegistry>,
    pending: DashMap<String, Arc<dyn SingleStepExecution>>,
    stopping: DashSet<String>,
    lookup_timeout: Duration,
}

impl CancellationController {
    pub fn new(
        registry: Arc<dyn ExecutionRegistry>,
        sinks: Arc<LogSinkRegistry>,
        lookup_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            sinks,
            pending: DashMap::new(),
            stopping: DashSet::new(),
            lookup_timeout,
        }
    }

    /// Bound on each graceful-stop phase of a graph run: the live-step lookup
    /// and the step cancellation fan-out.
    pub fn lookup_timeout(&self) -> Duration {
        self.lookup_timeout
    }

    /// Stop `handle`'s run. Never fails: graceful-path errors escalate to a
    /// hard kill.
    pub async fn stop(&self, handle: &RunHandle) -> StopOutcome {
        let run_id = handle.run_id().to_string();
        if !self.stopping.insert(run_id.clone()) {
            tracing::debug!(run = %run_id, "stop already issued");
            return StopOutcome::AlreadyStopping;
        }

        let started = Instant::now();
        let outcome = match handle {
            RunHandle::SingleStep(exec) => self.stop_single(exec),
            RunHandle::Graph(exec) => self.stop_graph(exec).await,
        };
        tracing::info!(
            run = %run_id,
            kind = handle.kind(),
            outcome = outcome.as_str(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "run stop finished"
        );
        outcome
    }

    fn stop_single(&self, exec: &Arc<dyn SingleStepExecution>) -> StopOutcome {
        let run_id = exec.run_id();
        if exec.at_safe_point() {
            self.sinks.error(run_id, STOPPING_MSG);
            abort_single(exec.as_ref());
            return StopOutcome::Failed;
        }
        // mid-step: abort at the next boundary instead of from here
        tracing::debug!(run = %run_id, "run is mid-step; queued for stop at next step boundary");
        self.pending.insert(run_id.to_string(), Arc::clone(exec));
        StopOutcome::PendingStop
    }

    /// Step-boundary hook for single-step runs.
    pub fn on_step_boundary(&self, run_id: &str) -> StepGate {
        let Some((_, exec)) = self.pending.remove(run_id) else {
            return StepGate::Proceed;
        };
        tracing::info!(run = %run_id, "aborting run at step boundary");
        self.sinks.error(run_id, STOPPING_MSG);
        abort_single(exec.as_ref());
        StepGate::Abort
    }

    pub fn is_pending(&self, run_id: &str) -> bool {
        self.pending.contains_key(run_id)
    }

    /// Drop all bookkeeping for a finished run.
    pub fn forget(&self, run_id: &str) {
        self.pending.remove(run_id);
        self.stopping.remove(run_id);
    }

    async fn stop_graph(&self, exec: &Arc<dyn GraphExecution>) -> StopOutcome {
        let run_id = exec.run_id();
        self.sinks.error(run_id, STOPPING_MSG);

        let graceful = AssertUnwindSafe(self.stop_graph_gracefully(exec))
            .catch_unwind()
            .await;
        match graceful {
            Ok(Ok(())) => StopOutcome::Stopped,
            Ok(Err(e)) => self.hard_kill(exec, &e.to_string()),
            Err(_) => self.hard_kill(exec, "panic while stopping steps"),
        }
    }

    async fn stop_graph_gracefully(&self, exec: &Arc<dyn GraphExecution>) -> Result<()> {
        let run_id = exec.run_id();

        let lookup = timeout(self.lookup_timeout, self.registry.live_steps(run_id))
            .await
            .map_err(|_| {
                CredGuardError::Cancellation(format!(
                    "live step lookup timed out after {}ms",
                    self.lookup_timeout.as_millis()
                ))
            })?;
        let steps = lookup?.ok_or_else(|| {
            CredGuardError::Cancellation(format!("no execution context for {run_id}"))
        })?;

        tracing::debug!(run = %run_id, steps = steps.len(), "cancelling live steps");
        let mut futs: FuturesUnordered<_> = steps
            .iter()
            .map(|step| async move {
                let label = step.describe();
                tracing::debug!(run = %run_id, step = %label, "cancelling step");
                step.cancel(STEP_CANCEL_REASON).await.map_err(|e| {
                    CredGuardError::Cancellation(format!("step {label} refused cancel: {e}"))
                })
            })
            .collect();

        // every step gets its cancel signal even if an earlier one failed
        let cancel_all = async {
            let mut first_err = None;
            while let Some(res) = futs.next().await {
                if let Err(e) = res {
                    first_err.get_or_insert(e);
                }
            }
            first_err
        };
        let first_err = timeout(self.lookup_timeout, cancel_all).await.map_err(|_| {
            CredGuardError::Cancellation(format!(
                "step cancellation timed out after {}ms",
                self.lookup_timeout.as_millis()
            ))
        })?;
        if let Some(e) = first_err {
            return Err(e);
        }

        exec.mark_failed();
        Ok(())
    }

    fn hard_kill(&self, exec: &Arc<dyn GraphExecution>, reason: &str) -> StopOutcome {
        let run_id = exec.run_id();
        tracing::warn!(run = %run_id, reason, "graceful stop failed; hard-killing run");
        self.sinks.error(run_id, &format!("Failed to stop run with error: {reason}"));
        self.sinks.error(run_id, "Trying hard kill!");

        let killed = std::panic::catch_unwind(AssertUnwindSafe(|| {
            exec.mark_failed();
            exec.hard_kill();
        }));
        if killed.is_err() {
            tracing::error!(run = %run_id, "hard kill panicked");
        }
        StopOutcome::HardKilled
    }
}

fn abort_single(exec: &dyn SingleStepExecution) {
    let aborted = std::panic::catch_unwind(AssertUnwindSafe(|| {
        exec.mark_failed();
        exec.abort(STOPPING_MSG);
    }));
    if aborted.is_err() {
        tracing::error!(run = %exec.run_id(), "single-step abort panicked");
    }
}
