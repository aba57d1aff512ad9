use std::sync::Arc;

use dashmap::DashMap;

/// User-visible log of one run (what the run's owner reads).
pub trait LogSink: Send + Sync {
    fn error(&self, msg: &str);
}

/// Registry: `run_id -> LogSink`. Runs register on start and are removed on
/// completion.
#[derive(Default)]
pub struct LogSinkRegistry {
    sinks: DashMap<String, Arc<dyn LogSink>>,
}

impl LogSinkRegistry {
    pub fn new() -> Self {
        Self { sinks: DashMap::new() }
    }

    pub fn register(&self, run_id: impl Into<String>, sink: Arc<dyn LogSink>) {
        let run_id = run_id.into();
        tracing::debug!(run = %run_id, "log sink registered");
        self.sinks.insert(run_id, sink);
    }

    pub fn remove(&self, run_id: &str) -> Option<Arc<dyn LogSink>> {
        self.sinks.remove(run_id).map(|(_, s)| s)
    }

    pub fn get(&self, run_id: &str) -> Option<Arc<dyn LogSink>> {
        self.sinks.get(run_id).map(|r| Arc::clone(r.value()))
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Write an error line to the run's log. Without a registered sink the
    /// line only reaches the service log.
    pub fn error(&self, run_id: &str, msg: &str) {
        match self.get(run_id) {
            Some(sink) => sink.error(msg),
            None => tracing::warn!(run = %run_id, msg, "no log sink for run"),
        }
    }
}
