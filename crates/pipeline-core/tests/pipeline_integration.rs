//! End-to-end exercise of the real worker threads and queues, not the
//! in-process mock used by `host::tests`. Mirrors the scenarios in
//! `SPEC_FULL.md` §8.

use pipeline_core::{Pipeline, StageHandle, StageRuntime, END_SENTINEL};
use std::sync::{Arc, Mutex};

fn rotate_right(s: &str) -> Option<String> {
    let bytes = s.as_bytes();
    if bytes.len() < 2 {
        return Some(s.to_string());
    }
    let mut out = Vec::with_capacity(bytes.len());
    out.push(bytes[bytes.len() - 1]);
    out.extend_from_slice(&bytes[..bytes.len() - 1]);
    Some(String::from_utf8(out).unwrap())
}

/// A stage that records everything submitted to it instead of forwarding
/// further, standing in for `logger` at the end of the chain.
struct SinkStage {
    runtime: StageRuntime,
    log: Arc<Mutex<Vec<String>>>,
}

impl SinkStage {
    fn new(capacity: usize) -> Self {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink_log = log.clone();
        let runtime = StageRuntime::init("sink-logger", capacity, move |s: &str| {
            sink_log.lock().unwrap().push(s.to_string());
            Some(s.to_string())
        })
        .unwrap();
        SinkStage { runtime, log }
    }
}

impl StageHandle for SinkStage {
    fn name(&self) -> &str {
        self.runtime.name()
    }
    fn submit(&self, record: &str) -> Result<(), String> {
        self.runtime.submit(record)
    }
    fn attach(&self, next: Option<pipeline_core::NextSubmit>) -> Result<(), String> {
        self.runtime.attach(next)
    }
    fn wait_finished(&self) -> Result<(), String> {
        self.runtime.wait_finished()
    }
    fn finalize(&self) -> Result<(), String> {
        self.runtime.finalize()
    }
}

fn build_chain(capacity: usize) -> (Pipeline<AnyStage>, Arc<Mutex<Vec<String>>>) {
    let uppercaser = StageRuntime::init("uppercaser", capacity, |s: &str| {
        Some(s.to_ascii_uppercase())
    })
    .unwrap();
    let rotator = StageRuntime::init("rotator", capacity, rotate_right).unwrap();
    let sink = SinkStage::new(capacity);
    let log = sink.log.clone();

    let pipeline = Pipeline::new(vec![
        AnyStage::Runtime(uppercaser),
        AnyStage::Runtime(rotator),
        AnyStage::Sink(sink),
    ]);
    (pipeline, log)
}

/// A small enum wrapper so `uppercaser`/`rotator` (bare `StageRuntime`s) and
/// the logging `SinkStage` can share one `Pipeline`.
enum AnyStage {
    Runtime(StageRuntime),
    Sink(SinkStage),
}

impl StageHandle for AnyStage {
    fn name(&self) -> &str {
        match self {
            AnyStage::Runtime(r) => StageHandle::name(r),
            AnyStage::Sink(s) => StageHandle::name(s),
        }
    }
    fn submit(&self, record: &str) -> Result<(), String> {
        match self {
            AnyStage::Runtime(r) => r.submit(record),
            AnyStage::Sink(s) => s.submit(record),
        }
    }
    fn attach(&self, next: Option<pipeline_core::NextSubmit>) -> Result<(), String> {
        match self {
            AnyStage::Runtime(r) => r.attach(next),
            AnyStage::Sink(s) => s.attach(next),
        }
    }
    fn wait_finished(&self) -> Result<(), String> {
        match self {
            AnyStage::Runtime(r) => r.wait_finished(),
            AnyStage::Sink(s) => s.wait_finished(),
        }
    }
    fn finalize(&self) -> Result<(), String> {
        match self {
            AnyStage::Runtime(r) => r.finalize(),
            AnyStage::Sink(s) => s.finalize(),
        }
    }
}

#[test]
fn hello_through_uppercaser_rotator_logger() {
    let (pipeline, log) = build_chain(20);
    pipeline.attach_chain().unwrap();

    pipeline.feed_line("hello").unwrap();
    pipeline.feed_line(END_SENTINEL).unwrap();
    pipeline.shutdown();

    assert_eq!(
        *log.lock().unwrap(),
        vec!["OHELL".to_string(), END_SENTINEL.to_string()]
    );
}

#[test]
fn empty_line_flows_through_unchanged() {
    let (pipeline, log) = build_chain(20);
    pipeline.attach_chain().unwrap();

    pipeline.feed_line("").unwrap();
    pipeline.feed_line(END_SENTINEL).unwrap();
    pipeline.shutdown();

    assert_eq!(*log.lock().unwrap(), vec!["".to_string(), END_SENTINEL.to_string()]);
}

#[test]
fn single_character_is_left_unrotated() {
    let (pipeline, log) = build_chain(20);
    pipeline.attach_chain().unwrap();

    pipeline.feed_line("a").unwrap();
    pipeline.feed_line(END_SENTINEL).unwrap();
    pipeline.shutdown();

    assert_eq!(*log.lock().unwrap(), vec!["A".to_string(), END_SENTINEL.to_string()]);
}

#[test]
fn order_is_preserved_across_many_records_at_capacity_one() {
    let uppercaser = StageRuntime::init("uppercaser", 1, |s: &str| Some(s.to_ascii_uppercase()))
        .unwrap();
    let sink = SinkStage::new(1);
    let log = sink.log.clone();
    let pipeline = Pipeline::new(vec![AnyStage::Runtime(uppercaser), AnyStage::Sink(sink)]);
    pipeline.attach_chain().unwrap();

    for i in 0..500 {
        pipeline.feed_line(&i.to_string()).unwrap();
    }
    pipeline.feed_line(END_SENTINEL).unwrap();
    pipeline.shutdown();

    let log = log.lock().unwrap();
    let expected: Vec<String> = (0..500)
        .map(|i: u32| i.to_string())
        .chain(std::iter::once(END_SENTINEL.to_string()))
        .collect();
    assert_eq!(*log, expected);
}

#[test]
fn eof_without_sentinel_is_the_hosts_job_not_the_pipelines() {
    // The pipeline itself only reacts to an explicit "<END>" submission; a
    // host synthesizes one on EOF (spec §4.4 step 5). Exercise that the
    // pipeline shuts down cleanly once that synthetic submission happens.
    let (pipeline, log) = build_chain(4);
    pipeline.attach_chain().unwrap();

    pipeline.feed_line("x").unwrap();
    // Simulate EOF: the host submits the sentinel itself.
    pipeline.feed_line(END_SENTINEL).unwrap();
    pipeline.shutdown();

    assert_eq!(*log.lock().unwrap(), vec!["X".to_string(), END_SENTINEL.to_string()]);
}
