use std::sync::Arc;

use async_trait::async_trait;

use credguard_core::error::Result;

/// A linear unit of work (one step after another).
pub trait SingleStepExecution: Send + Sync {
    fn run_id(&self) -> &str;
    /// True when the run is between steps and can be aborted right away.
    fn at_safe_point(&self) -> bool;
    fn mark_failed(&self);
    fn abort(&self, reason: &str);
}

/// One concurrently running sub-step of a graph execution.
#[async_trait]
pub trait StepHandle: Send + Sync {
    /// Human-readable label for logs.
    fn describe(&self) -> String;
    async fn cancel(&self, reason: &str) -> Result<()>;
}

/// A unit of work made of many concurrently running sub-steps.
pub trait GraphExecution: Send + Sync {
    fn run_id(&self) -> &str;
    fn mark_failed(&self);
    /// Forced, unconditional termination of the whole execution.
    fn hard_kill(&self);
}

/// Resolves the live sub-steps of a graph execution.
#[async_trait]
pub trait ExecutionRegistry: Send + Sync {
    /// `Ok(None)` means no execution context exists for `run_id`.
    async fn live_steps(&self, run_id: &str) -> Result<Option<Vec<Arc<dyn StepHandle>>>>;
}

/// Registry that knows no executions; every graph stop falls back to a hard
/// kill. Used when no runtime integration is wired in.
#[derive(Debug, Default)]
pub struct EmptyExecutionRegistry;

#[async_trait]
impl ExecutionRegistry for EmptyExecutionRegistry {
    async fn live_steps(&self, _run_id: &str) -> Result<Option<Vec<Arc<dyn StepHandle>>>> {
        Ok(None)
    }
}

/// Handle to the run that used a credential.
#[derive(Clone)]
pub enum RunHandle {
    SingleStep(Arc<dyn SingleStepExecution>),
    Graph(Arc<dyn GraphExecution>),
}

impl RunHandle {
    pub fn run_id(&self) -> &str {
        match self {
            RunHandle::SingleStep(e) => e.run_id(),
            RunHandle::Graph(e) => e.run_id(),
        }
    }

    /// Metrics label.
    pub fn kind(&self) -> &'static str {
        match self {
            RunHandle::SingleStep(_) => "single_step",
            RunHandle::Graph(_) => "graph",
        }
    }
}

impl std::fmt::Debug for RunHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunHandle")
            .field("kind", &self.kind())
            .field("run_id", &self.run_id())
            .finish()
    }
}
