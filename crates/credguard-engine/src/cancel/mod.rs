//! Run cancellation after a denied credential use.
//!
//! Single-step runs fail immediately, or at their next step boundary when
//! the denial arrives mid-step. Graph runs get a graceful stop of every live
//! sub-step and fall back to a hard kill on any failure.

mod controller;
mod execution;
mod sink;

pub use controller::{CancellationController, StepGate, StopOutcome, STOPPING_MSG};
pub use execution::{
    EmptyExecutionRegistry, ExecutionRegistry, GraphExecution, RunHandle, SingleStepExecution,
    StepHandle,
};
pub use sink::{LogSink, LogSinkRegistry};
