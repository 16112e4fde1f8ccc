//! Pipeline host (spec §4.4): parses arguments, loads and initializes each
//! stage, composes the chain, drives stdin, and shuts the pipeline down in
//! order.

mod error;
mod loader;

use clap::error::ErrorKind;
use clap::Parser;
use error::AnalyzerError;
use loader::LoadedStage;
use pipeline_core::END_SENTINEL;
use std::io::BufRead;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Streaming string-transformation pipeline host",
    long_about = "\
Available stages:
  logger      - Logs all strings that pass through
  typewriter  - Simulates typewriter effect with delays
  uppercaser  - Converts strings to uppercase
  rotator     - Moves every character to the right; the last character moves to the front
  flipper     - Reverses the order of characters
  expander    - Expands each character with spaces

Example:
  analyzer 20 uppercaser rotator logger
  echo 'hello' | analyzer 20 uppercaser rotator logger
  echo '<END>' | analyzer 20 uppercaser rotator logger"
)]
struct Args {
    /// Maximum number of items in each stage's queue (1..=1000000)
    #[arg(value_parser = parse_capacity)]
    queue_capacity: usize,

    /// Directory to load compiled stage modules from
    #[arg(long, env = "ANALYZER_STAGE_DIR", default_value = "./target/debug")]
    stage_dir: PathBuf,

    /// Names of stages to load and chain, in order
    #[arg(required = true, num_args = 1..)]
    stages: Vec<String>,
}

fn parse_capacity(raw: &str) -> Result<usize, String> {
    let value: usize = raw
        .parse()
        .map_err(|_| "queue_capacity must be a positive integer".to_string())?;
    if value == 0 || value > 1_000_000 {
        return Err("Invalid queue size: must be in [1, 1000000]".to_string());
    }
    Ok(value)
}

fn main() -> ExitCode {
    env_logger::init();
    let args = match Args::try_parse() {
        Ok(args) => args,
        // `--help`/`--version` arrive as `Err` too; let clap print and exit 0
        // for those, but route genuine usage errors through `AnalyzerError`
        // so they get the spec's exit code 1 instead of clap's default of 2.
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.exit();
        }
        Err(e) => {
            let err = AnalyzerError::Argument(e.to_string());
            log::error!("{err}");
            return ExitCode::from(err.exit_code() as u8);
        }
    };

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

fn run(args: Args) -> Result<(), AnalyzerError> {
    let stages = load_stages(&args.stage_dir, &args.stages)?;
    init_stages(&stages, args.queue_capacity)?;
    attach_chain(&stages);

    log::info!(
        "pipeline composed: {} stage(s), capacity {}",
        stages.len(),
        args.queue_capacity
    );

    feed_stdin(&stages)?;

    shutdown(&stages);
    println!("Pipeline shutdown complete");
    Ok(())
}

/// Resolves and loads every stage module, in order (spec §4.4 step 2). Any
/// missing symbol or load failure is fatal; every library already loaded is
/// dropped (its `Drop` unloads it) before returning the error, mirroring the
/// original's `cleanup_plugins` unwind during the loading phase.
fn load_stages(stage_dir: &std::path::Path, identifiers: &[String]) -> Result<Vec<LoadedStage>, AnalyzerError> {
    let mut stages = Vec::with_capacity(identifiers.len());
    for identifier in identifiers {
        let path = loader::stage_library_path(stage_dir, identifier);
        match LoadedStage::load(&path) {
            Ok(stage) => stages.push(stage),
            Err(e) => {
                // `stages` drops here, unloading every library opened so far.
                return Err(AnalyzerError::Loader(e));
            }
        }
    }
    Ok(stages)
}

/// Calls `init(capacity)` on every stage in order (spec §4.4 step 3). If any
/// stage fails, every previously initialized stage is finalized before
/// returning, so no worker thread or queue is left dangling.
fn init_stages(stages: &[LoadedStage], capacity: usize) -> Result<(), AnalyzerError> {
    for (i, stage) in stages.iter().enumerate() {
        if let Err(e) = stage.init(capacity) {
            for initialized in &stages[..i] {
                if let Err(finalize_err) = initialized.finalize() {
                    log::error!(
                        "stage '{}' failed to finalize during init rollback: {finalize_err}",
                        initialized.name()
                    );
                }
            }
            return Err(AnalyzerError::Init(format!(
                "stage '{}' failed to initialize: {e}",
                stage.name()
            )));
        }
    }
    Ok(())
}

/// Attaches each stage to its successor, in order; the last stage is left
/// unattached (spec §4.4 step 4).
fn attach_chain(stages: &[LoadedStage]) {
    for i in 0..stages.len().saturating_sub(1) {
        if let Err(e) = stages[i].attach_to(&stages[i + 1]) {
            log::error!("failed to attach '{}' to its successor: {e}", stages[i].name());
        }
    }
}

/// Reads lines from standard input, stripping the trailing terminator and
/// submitting each to the first stage (spec §4.4 step 5). The literal line
/// `"<END>"` is submitted like any other and then reading stops; EOF without
/// it causes the host to synthesize one submission of `"<END>"`.
fn feed_stdin(stages: &[LoadedStage]) -> Result<(), AnalyzerError> {
    let Some(first) = stages.first() else {
        return Err(AnalyzerError::Argument("pipeline has no stages".to_string()));
    };

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line.map_err(|e| AnalyzerError::Runtime(format!("failed to read standard input: {e}")))?;
        let is_sentinel = line == END_SENTINEL;
        if let Err(e) = first.submit(&line) {
            log::error!("failed to submit to stage '{}': {e}", first.name());
        }
        if is_sentinel {
            return Ok(());
        }
    }

    // End-of-input without an explicit sentinel: synthesize one.
    if let Err(e) = first.submit(END_SENTINEL) {
        log::error!("failed to submit synthesized sentinel to stage '{}': {e}", first.name());
    }
    Ok(())
}

/// Waits for and finalizes every stage in chain order (spec §4.4 step 6);
/// chain order is correct because each stage's `finished` signal
/// happens-before its successor's (see `pipeline_core::host::Pipeline::shutdown`).
fn shutdown(stages: &[LoadedStage]) {
    for stage in stages {
        if let Err(e) = stage.wait_finished() {
            log::error!("stage '{}' failed while waiting to finish: {e}", stage.name());
            continue;
        }
        if let Err(e) = stage.finalize() {
            log::error!("stage '{}' failed to finalize: {e}", stage.name());
        }
    }
}
