//! Dynamic stage loading: resolves a stage identifier to a shared-library
//! path, loads it, validates its six entry points, and wraps them behind a
//! small FFI-aware handle.
//!
//! Grounded on `gpu_nvidia_dcgm.rs`'s `DcgmLib`: a single `Library` kept
//! alive for the handle's entire lifetime, symbols resolved fresh with
//! `lib.get` rather than cached as long-lived `Symbol`s (see that file's
//! `Drop` impl, which re-resolves `dcgmDisconnect` at drop time instead of
//! storing it).
//!
//! A `LoadedStage` does not implement `pipeline_core::StageHandle`: the real
//! chain-wiring for an FFI stage is a raw `stage_submit` function pointer
//! passed directly to the predecessor's `stage_attach`, not a Rust closure,
//! so composition here is a small FFI-specific protocol (`attach_to`)
//! instead of the generic closure-based one `Pipeline::attach_chain` uses
//! for natively-linked stages.

use libloading::{Library, Symbol};
use stage_abi::{AttachFn, FinalizeFn, GetNameFn, InitFn, SubmitFn, WaitFinishedFn};
use std::ffi::CStr;
use std::os::raw::c_int;
use std::path::Path;

pub struct LoadedStage {
    name: String,
    library: Library,
}

impl LoadedStage {
    /// Loads the shared library at `path` and validates all six required
    /// symbols are present. Fails fast (spec §4.4 step 2) rather than
    /// discovering a missing entry point partway through initialization.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, String> {
        let path = path.as_ref();
        // Safety: loading an arbitrary shared library is inherently unsafe;
        // the loader trusts the stage identifiers the host was invoked with.
        let library = unsafe { Library::new(path) }
            .map_err(|e| format!("failed to load stage module '{}': {e}", path.display()))?;

        let get_name: Symbol<GetNameFn> = unsafe { library.get(stage_abi::SYM_GET_NAME) }
            .map_err(|e| missing_symbol(path, "stage_get_name", e))?;
        let _: Symbol<InitFn> = unsafe { library.get(stage_abi::SYM_INIT) }
            .map_err(|e| missing_symbol(path, "stage_init", e))?;
        let _: Symbol<SubmitFn> = unsafe { library.get(stage_abi::SYM_SUBMIT) }
            .map_err(|e| missing_symbol(path, "stage_submit", e))?;
        let _: Symbol<AttachFn> = unsafe { library.get(stage_abi::SYM_ATTACH) }
            .map_err(|e| missing_symbol(path, "stage_attach", e))?;
        let _: Symbol<WaitFinishedFn> = unsafe { library.get(stage_abi::SYM_WAIT_FINISHED) }
            .map_err(|e| missing_symbol(path, "stage_wait_finished", e))?;
        let _: Symbol<FinalizeFn> = unsafe { library.get(stage_abi::SYM_FINALIZE) }
            .map_err(|e| missing_symbol(path, "stage_finalize", e))?;

        let name = unsafe { CStr::from_ptr(get_name()) }.to_string_lossy().into_owned();
        drop(get_name);

        Ok(LoadedStage { name, library })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn init(&self, capacity: usize) -> Result<(), String> {
        let init: Symbol<InitFn> = unsafe { self.library.get(stage_abi::SYM_INIT) }
            .map_err(|e| format!("failed to resolve 'stage_init' for '{}': {e}", self.name))?;
        let capacity = c_int::try_from(capacity)
            .map_err(|_| format!("queue capacity too large for stage '{}'", self.name))?;
        unsafe { stage_abi::interpret_result(init(capacity)) }
    }

    pub fn submit(&self, record: &str) -> Result<(), String> {
        let submit = self.submit_fn()?;
        stage_abi::call_submit_fn(submit, record)
    }

    /// Wires `self` to forward into `successor` by passing successor's raw
    /// `stage_submit` pointer to `self`'s `stage_attach`. Must be called
    /// before the first `submit` reaches `self` (spec §4.3 state machine).
    pub fn attach_to(&self, successor: &LoadedStage) -> Result<(), String> {
        let next = successor.submit_fn()?;
        let attach: Symbol<AttachFn> = unsafe { self.library.get(stage_abi::SYM_ATTACH) }
            .map_err(|e| format!("failed to resolve 'stage_attach' for '{}': {e}", self.name))?;
        unsafe { attach(Some(next)) };
        Ok(())
    }

    pub fn wait_finished(&self) -> Result<(), String> {
        let wait_finished: Symbol<WaitFinishedFn> =
            unsafe { self.library.get(stage_abi::SYM_WAIT_FINISHED) }
                .map_err(|e| format!("failed to resolve 'stage_wait_finished' for '{}': {e}", self.name))?;
        unsafe { stage_abi::interpret_result(wait_finished()) }
    }

    pub fn finalize(&self) -> Result<(), String> {
        let finalize: Symbol<FinalizeFn> = unsafe { self.library.get(stage_abi::SYM_FINALIZE) }
            .map_err(|e| format!("failed to resolve 'stage_finalize' for '{}': {e}", self.name))?;
        unsafe { stage_abi::interpret_result(finalize()) }
    }

    fn submit_fn(&self) -> Result<SubmitFn, String> {
        let submit: Symbol<SubmitFn> = unsafe { self.library.get(stage_abi::SYM_SUBMIT) }
            .map_err(|e| format!("failed to resolve 'stage_submit' for '{}': {e}", self.name))?;
        Ok(*submit)
    }
}

fn missing_symbol(path: &Path, symbol: &str, e: libloading::Error) -> String {
    format!("stage module '{}' is missing required symbol '{symbol}': {e}", path.display())
}

/// Resolves a stage identifier to the shared-library path the loader reads
/// from, e.g. `uppercaser` -> `{stage_dir}/libstage_uppercaser.so` on Linux.
/// The original loaded `./output/{name}.so`; this mirrors that well-known
/// relative location with a configurable directory and the platform's own
/// library naming convention instead of a hardcoded `.so`.
pub fn stage_library_path(stage_dir: &Path, identifier: &str) -> std::path::PathBuf {
    stage_dir.join(format!(
        "{}stage_{}{}",
        std::env::consts::DLL_PREFIX,
        identifier,
        std::env::consts::DLL_SUFFIX
    ))
}
