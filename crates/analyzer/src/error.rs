//! The host's error type and its mapping onto the spec's exit codes
//! (§6: `0` success, `1` argument/loader error, `2` stage initialization
//! error), in the style of `gpu_nvidia_dcgm.rs`'s plain `Result<_, String>`
//! conventions rather than a derive-macro error crate.

use std::fmt;

#[derive(Debug)]
pub enum AnalyzerError {
    /// Bad arguments: invalid capacity, too few stages.
    Argument(String),
    /// A stage module failed to load, or was missing a required symbol.
    Loader(String),
    /// A stage's `init` call failed (resource exhaustion during stage or
    /// queue creation).
    Init(String),
    /// An unexpected runtime failure unrelated to a single stage (e.g. a
    /// stdin I/O error).
    Runtime(String),
}

impl AnalyzerError {
    pub fn exit_code(&self) -> i32 {
        match self {
            AnalyzerError::Argument(_) => 1,
            AnalyzerError::Loader(_) => 1,
            AnalyzerError::Init(_) => 2,
            AnalyzerError::Runtime(_) => 1,
        }
    }
}

impl fmt::Display for AnalyzerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalyzerError::Argument(msg) => write!(f, "{msg}"),
            AnalyzerError::Loader(msg) => write!(f, "{msg}"),
            AnalyzerError::Init(msg) => write!(f, "{msg}"),
            AnalyzerError::Runtime(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for AnalyzerError {}
