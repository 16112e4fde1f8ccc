//! Pipeline composition, end-of-stream propagation, and the join protocol.
//!
//! This module is deliberately agnostic to *how* a stage's six operations are
//! reached — a stage might be a native [`crate::stage::StageRuntime`], or a
//! handle to a dynamically loaded module across an FFI boundary. Either way it
//! implements [`StageHandle`], and [`Pipeline`] only needs that.

use std::sync::Arc;

/// The sentinel record that signals end-of-stream in-band.
pub const END_SENTINEL: &str = "<END>";

/// A successor's submit entry point, already bound so a predecessor's worker
/// can call it without knowing how the successor is implemented.
pub type NextSubmit = Arc<dyn Fn(&str) -> Result<(), String> + Send + Sync>;

/// The six-operation capability set every stage exposes (spec §4.3/§4.5).
///
/// `init` is intentionally not part of this trait: a stage is only wrapped as
/// a `StageHandle` once it has already been initialized (the loader/host
/// resolves and initializes stages before composing them into a [`Pipeline`]).
pub trait StageHandle {
    /// A stable identifier for diagnostics; not required to be unique across
    /// a misbehaving caller that loads the same stage twice (undefined per
    /// the stage contract).
    fn name(&self) -> &str;

    /// Places `record` on this stage's queue, blocking if it is full.
    fn submit(&self, record: &str) -> Result<(), String>;

    /// Sets (or clears) this stage's successor. Must be called at most once,
    /// before the first `submit`.
    fn attach(&self, next: Option<NextSubmit>) -> Result<(), String>;

    /// Blocks until this stage has processed the sentinel and forwarded it.
    fn wait_finished(&self) -> Result<(), String>;

    /// Joins the worker and releases the stage's resources. Idempotent after
    /// `wait_finished` has returned.
    fn finalize(&self) -> Result<(), String>;
}

/// An ordered chain of initialized stages.
///
/// Owns no threads itself — each [`StageHandle`] owns its own worker — but
/// drives composition (`attach_chain`), feeding (`feed_line`), and the
/// chain-ordered shutdown join (`shutdown`).
pub struct Pipeline<S: StageHandle> {
    stages: Vec<Arc<S>>,
}

impl<S: StageHandle + Send + Sync + 'static> Pipeline<S> {
    /// Wraps an ordered list of already-initialized stages.
    pub fn new(stages: Vec<S>) -> Self {
        Pipeline {
            stages: stages.into_iter().map(Arc::new).collect(),
        }
    }

    /// Number of stages in the chain.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Attaches each stage to its successor, in order. The last stage is left
    /// unattached, per the stage contract.
    pub fn attach_chain(&self) -> Result<(), String> {
        for i in 0..self.stages.len().saturating_sub(1) {
            let successor = self.stages[i + 1].clone();
            let next: NextSubmit = Arc::new(move |record: &str| successor.submit(record));
            self.stages[i]
                .attach(Some(next))
                .map_err(|e| format!("failed to attach '{}': {e}", self.stages[i].name()))?;
        }
        Ok(())
    }

    /// Submits one line to the first stage. The caller strips the line
    /// terminator before calling this; submitting `"<END>"` is how the
    /// sentinel enters the pipeline.
    pub fn feed_line(&self, line: &str) -> Result<(), String> {
        let first = self
            .stages
            .first()
            .ok_or_else(|| "pipeline has no stages".to_string())?;
        first.submit(line)
    }

    /// Waits for and finalizes every stage in chain order (`0..N-1`).
    ///
    /// Chain order is correct, not just convenient: a stage cannot raise its
    /// `finished` signal until it has forwarded the sentinel to its
    /// successor, so stage `i`'s signal happens-before stage `i+1`'s. Errors
    /// from one stage are reported but never abort the rest of the shutdown.
    pub fn shutdown(&self) -> Vec<(String, Result<(), String>)> {
        let mut results = Vec::with_capacity(self.stages.len());
        for stage in &self.stages {
            let name = stage.name().to_string();
            let outcome = stage
                .wait_finished()
                .and_then(|()| stage.finalize())
                .map_err(|e| {
                    log::error!("stage '{name}' reported an error during shutdown: {e}");
                    e
                });
            results.push((name, outcome));
        }
        results
    }
}
