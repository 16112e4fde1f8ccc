//! Per-stage worker lifecycle: initialize, consume-transform-forward, drain,
//! terminate, join (spec §4.3).
//!
//! [`StageRuntime`] is the piece every loaded stage module owns internally —
//! whether it is linked straight into the host (see the `stages/*` crates'
//! `lib.rs`) or reached across an FFI boundary (see `stage-abi`). It is the
//! Rust-native implementation of the stage contract; a dynamic loader wraps
//! its FFI shims around this, not the other way around.

use crate::host::{NextSubmit, StageHandle, END_SENTINEL};
use crate::queue::BoundedQueue;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

struct Shared {
    queue: Arc<BoundedQueue>,
    next_submit: Mutex<Option<NextSubmit>>,
}

/// A running stage: its queue, its worker thread, and the (at most once)
/// successor link.
pub struct StageRuntime {
    name: String,
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl StageRuntime {
    /// Creates the queue, spawns the worker thread, and returns the running
    /// stage. `transform` is the stage's pure `string -> owned string`
    /// function; returning `None` drops the record (non-fatal).
    pub fn init<F>(name: impl Into<String>, capacity: usize, transform: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String> + Send + 'static,
    {
        let name = name.into();
        let queue = Arc::new(BoundedQueue::new(capacity)?);
        let shared = Arc::new(Shared {
            queue,
            next_submit: Mutex::new(None),
        });

        let worker_shared = shared.clone();
        let worker_name = name.clone();
        let handle = thread::Builder::new()
            .name(format!("stage-{worker_name}"))
            .spawn(move || worker_loop(worker_name, worker_shared, transform))
            .map_err(|e| format!("failed to spawn worker thread: {e}"))?;

        Ok(StageRuntime {
            name,
            shared,
            worker: Mutex::new(Some(handle)),
        })
    }
}

fn worker_loop<F>(name: String, shared: Arc<Shared>, transform: F)
where
    F: Fn(&str) -> Option<String>,
{
    loop {
        let record = shared.queue.dequeue();

        if record == END_SENTINEL {
            log::debug!("stage '{name}' draining: forwarding sentinel");
            // The sentinel still passes through `transform` so a stage's side
            // effects (logger's print, typewriter's typing) fire on it too,
            // but whatever it returns is discarded: the chain always forwards
            // the literal sentinel, never a transformed substitute.
            let _ = transform(&record);
            if let Some(next) = shared.next_submit.lock().unwrap().as_ref() {
                if let Err(e) = next(END_SENTINEL) {
                    log::error!("stage '{name}' failed to forward sentinel to successor: {e}");
                }
            }
            shared.queue.signal_finished();
            log::debug!("stage '{name}' finished");
            return;
        }

        let Some(out) = transform(&record) else {
            log::warn!("stage '{name}': transform dropped a record");
            continue;
        };

        if let Some(next) = shared.next_submit.lock().unwrap().as_ref() {
            if let Err(e) = next(&out) {
                log::warn!("stage '{name}' failed to forward a record to its successor: {e}");
            }
        }
        // If there is no successor, `out` is simply dropped here: the last
        // stage's output is released after any side effect the transform
        // already performed.
    }
}

impl StageHandle for StageRuntime {
    fn name(&self) -> &str {
        &self.name
    }

    fn submit(&self, record: &str) -> Result<(), String> {
        self.shared.queue.submit(record.to_string());
        Ok(())
    }

    fn attach(&self, next: Option<NextSubmit>) -> Result<(), String> {
        *self.shared.next_submit.lock().unwrap() = next;
        Ok(())
    }

    fn wait_finished(&self) -> Result<(), String> {
        self.shared.queue.wait_finished();
        Ok(())
    }

    fn finalize(&self) -> Result<(), String> {
        let handle = self.worker.lock().unwrap().take();
        match handle {
            Some(h) => h
                .join()
                .map_err(|_| "failed to join worker thread".to_string()),
            // Idempotent: a stage already finalized (or never started) just
            // succeeds silently, matching the spec's finalize-after-
            // wait_finished idempotence requirement.
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    fn sink_next(sink: Arc<StdMutex<Vec<String>>>) -> NextSubmit {
        Arc::new(move |record: &str| {
            sink.lock().unwrap().push(record.to_string());
            Ok(())
        })
    }

    #[test]
    fn rejects_zero_capacity_like_the_queue_it_wraps() {
        let err = StageRuntime::init("noop", 0, |s: &str| Some(s.to_string()));
        assert!(err.is_err());
    }

    #[test]
    fn processes_records_then_drains_on_sentinel() {
        let stage = StageRuntime::init("upper", 4, |s: &str| Some(s.to_uppercase())).unwrap();
        let sink = Arc::new(StdMutex::new(Vec::new()));
        stage.attach(Some(sink_next(sink.clone()))).unwrap();

        stage.submit("hello").unwrap();
        stage.submit(END_SENTINEL).unwrap();
        stage.wait_finished().unwrap();
        stage.finalize().unwrap();

        assert_eq!(*sink.lock().unwrap(), vec!["HELLO".to_string(), END_SENTINEL.to_string()]);
    }

    #[test]
    fn last_stage_has_no_successor_and_just_drops_output() {
        let stage = StageRuntime::init("sink", 4, |s: &str| Some(s.to_string())).unwrap();
        stage.submit("a").unwrap();
        stage.submit(END_SENTINEL).unwrap();
        stage.wait_finished().unwrap();
        stage.finalize().unwrap();
    }

    #[test]
    fn transform_returning_none_drops_the_record_but_keeps_running() {
        let stage =
            StageRuntime::init("filter", 4, |s: &str| if s.is_empty() { None } else { Some(s.to_string()) })
                .unwrap();
        let sink = Arc::new(StdMutex::new(Vec::new()));
        stage.attach(Some(sink_next(sink.clone()))).unwrap();

        stage.submit("").unwrap();
        stage.submit("kept").unwrap();
        stage.submit(END_SENTINEL).unwrap();
        stage.wait_finished().unwrap();
        stage.finalize().unwrap();

        assert_eq!(*sink.lock().unwrap(), vec!["kept".to_string(), END_SENTINEL.to_string()]);
    }

    #[test]
    fn finalize_is_idempotent_after_wait_finished() {
        let stage = StageRuntime::init("noop", 4, |s: &str| Some(s.to_string())).unwrap();
        stage.submit(END_SENTINEL).unwrap();
        stage.wait_finished().unwrap();
        stage.finalize().unwrap();
        stage.finalize().unwrap();
    }
}
