//! The stage contract (spec §4.3/§4.5/§6): the six C-ABI symbols every stage
//! module exports, and the glue a stage crate needs to implement them on top
//! of [`pipeline_core::StageRuntime`].
//!
//! This crate is linked by two kinds of consumer: the `stages/*` cdylibs,
//! which call [`export_stage`] once to generate their `#[no_mangle]` exports,
//! and the `analyzer` host, which resolves those exports through
//! `libloading` using the symbol names and function types defined here.

use pipeline_core::NextSubmit;
use std::ffi::{c_char, c_int, CStr, CString};
use std::sync::Arc;

/// Re-exported so the [`export_stage`] macro can refer to it hygienically
/// from a stage crate that only depends on `stage-abi`.
pub use pipeline_core;

/// `stage_get_name() -> *const c_char` — borrowed, never null.
pub type GetNameFn = unsafe extern "C" fn() -> *const c_char;
/// `stage_init(capacity) -> *const c_char` — null on success.
pub type InitFn = unsafe extern "C" fn(c_int) -> *const c_char;
/// `stage_submit(record) -> *const c_char` — null on success.
pub type SubmitFn = unsafe extern "C" fn(*const c_char) -> *const c_char;
/// `stage_attach(next)` — `next` is the successor's `stage_submit`, or `None`
/// for the last stage in the chain.
pub type AttachFn = unsafe extern "C" fn(Option<SubmitFn>);
/// `stage_wait_finished() -> *const c_char` — null on success.
pub type WaitFinishedFn = unsafe extern "C" fn() -> *const c_char;
/// `stage_finalize() -> *const c_char` — null on success.
pub type FinalizeFn = unsafe extern "C" fn() -> *const c_char;

/// Symbol names resolved by the host loader, in the order the stage contract
/// lists them (spec §4.3).
pub const SYM_GET_NAME: &[u8] = b"stage_get_name\0";
pub const SYM_INIT: &[u8] = b"stage_init\0";
pub const SYM_SUBMIT: &[u8] = b"stage_submit\0";
pub const SYM_ATTACH: &[u8] = b"stage_attach\0";
pub const SYM_WAIT_FINISHED: &[u8] = b"stage_wait_finished\0";
pub const SYM_FINALIZE: &[u8] = b"stage_finalize\0";

/// Fixed, allocation-free error strings crossing the ABI (spec §7: "Errors
/// surface as short, allocation-free string constants where possible").
/// Dynamic detail (the underlying OS error, the offending field, ...) is
/// logged on the stage side before one of these is returned, mirroring how
/// the original plugins returned `const char*` literals rather than
/// heap-allocated messages the caller would have no way to free.
pub static ERR_INVALID_CAPACITY: &CStr = c"invalid capacity";
pub static ERR_NOT_INITIALIZED: &CStr = c"not initialized";
pub static ERR_ALREADY_INITIALIZED: &CStr = c"already initialized";
pub static ERR_NULL_INPUT: &CStr = c"null input";
pub static ERR_INVALID_UTF8: &CStr = c"input was not valid UTF-8";
pub static ERR_INIT_FAILED: &CStr = c"failed to initialize stage";
pub static ERR_JOIN_FAILED: &CStr = c"failed to join worker thread";

/// The success sentinel for every `*const c_char`-returning entry point.
pub fn ok() -> *const c_char {
    std::ptr::null()
}

/// Turns a fixed error constant into the raw pointer the ABI returns.
pub fn err(message: &'static CStr) -> *const c_char {
    message.as_ptr()
}

/// Converts a raw, possibly-null `c_char` pointer from the host into an
/// owned `String`, or one of the two ABI error constants that can arise at
/// this boundary.
///
/// # Safety
/// `ptr`, if non-null, must point to a valid NUL-terminated C string for the
/// duration of this call (the host contract guarantees this for `submit`).
pub unsafe fn str_from_raw(ptr: *const c_char) -> Result<String, &'static CStr> {
    if ptr.is_null() {
        return Err(ERR_NULL_INPUT);
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map(str::to_owned)
        .map_err(|_| ERR_INVALID_UTF8)
}

/// Interprets a `*const c_char` return value under the null-or-error-string
/// convention every stage entry point uses.
///
/// # Safety
/// `result`, if non-null, must point to a live NUL-terminated C string (a
/// `'static` constant, by the contract every entry point follows).
pub unsafe fn interpret_result(result: *const c_char) -> Result<(), String> {
    if result.is_null() {
        Ok(())
    } else {
        Err(CStr::from_ptr(result).to_string_lossy().into_owned())
    }
}

/// Calls a successor's raw `stage_submit` pointer with `record`, translating
/// the C-ABI `null-or-error-string` convention into a `Result`.
///
/// # Safety
/// `f` must be a valid `stage_submit` export of a stage whose backing
/// library is still loaded.
pub fn call_submit_fn(f: SubmitFn, record: &str) -> Result<(), String> {
    let c_record = CString::new(record)
        .map_err(|_| "record contained an interior NUL byte".to_string())?;
    let result = unsafe { f(c_record.as_ptr()) };
    // Safety: a well-behaved stage returns either null or a pointer to a
    // string constant with static storage duration (see `err` above).
    unsafe { interpret_result(result) }
}

/// Wraps a raw `stage_submit` pointer as a [`NextSubmit`] closure, for use by
/// a stage's own `stage_attach` export.
pub fn bind_next_submit(raw: SubmitFn) -> NextSubmit {
    Arc::new(move |record: &str| call_submit_fn(raw, record))
}

/// Generates the six `#[no_mangle] extern "C"` exports for a stage crate.
///
/// `$name` is the stage's stable identifier (spec's `get_name`); `$transform`
/// is a `Fn(&str) -> Option<String> + Send + 'static` value — typically a
/// bare function matching the built-in transforms in spec §6.
#[macro_export]
macro_rules! export_stage {
    ($name:expr, $transform:expr) => {
        static STAGE_NAME_C: ::std::sync::OnceLock<::std::ffi::CString> =
            ::std::sync::OnceLock::new();
        static RUNTIME: ::std::sync::OnceLock<$crate::pipeline_core::StageRuntime> =
            ::std::sync::OnceLock::new();

        /// # Safety
        /// Exported for the host loader; must not panic across the FFI
        /// boundary and must not be called concurrently with itself for the
        /// same symbol (the host calls each entry point from one thread at
        /// a time per the stage contract).
        #[no_mangle]
        pub unsafe extern "C" fn stage_get_name() -> *const ::std::os::raw::c_char {
            STAGE_NAME_C
                .get_or_init(|| ::std::ffi::CString::new($name).unwrap())
                .as_ptr()
        }

        /// # Safety
        /// See `stage_get_name`.
        #[no_mangle]
        pub unsafe extern "C" fn stage_init(
            capacity: ::std::os::raw::c_int,
        ) -> *const ::std::os::raw::c_char {
            if capacity <= 0 {
                return $crate::err($crate::ERR_INVALID_CAPACITY);
            }
            if RUNTIME.get().is_some() {
                return $crate::err($crate::ERR_ALREADY_INITIALIZED);
            }
            match $crate::pipeline_core::StageRuntime::init($name, capacity as usize, $transform) {
                Ok(runtime) => {
                    if RUNTIME.set(runtime).is_err() {
                        return $crate::err($crate::ERR_ALREADY_INITIALIZED);
                    }
                    $crate::ok()
                }
                Err(e) => {
                    ::log::error!("stage '{}' failed to initialize: {}", $name, e);
                    $crate::err($crate::ERR_INIT_FAILED)
                }
            }
        }

        /// # Safety
        /// See `stage_get_name`; `record` must be a valid NUL-terminated
        /// C string or null.
        #[no_mangle]
        pub unsafe extern "C" fn stage_submit(
            record: *const ::std::os::raw::c_char,
        ) -> *const ::std::os::raw::c_char {
            let text = match $crate::str_from_raw(record) {
                Ok(text) => text,
                Err(e) => return $crate::err(e),
            };
            match RUNTIME.get() {
                Some(runtime) => match $crate::pipeline_core::StageHandle::submit(runtime, &text) {
                    Ok(()) => $crate::ok(),
                    Err(e) => {
                        ::log::error!("stage '{}' failed to submit: {}", $name, e);
                        $crate::err($crate::ERR_NOT_INITIALIZED)
                    }
                },
                None => $crate::err($crate::ERR_NOT_INITIALIZED),
            }
        }

        /// # Safety
        /// See `stage_get_name`; `next`, if present, must be a valid
        /// `stage_submit` export of a stage whose library outlives this one's
        /// worker thread.
        #[no_mangle]
        pub unsafe extern "C" fn stage_attach(next: Option<$crate::SubmitFn>) {
            if let Some(runtime) = RUNTIME.get() {
                let bound: Option<$crate::pipeline_core::NextSubmit> =
                    next.map($crate::bind_next_submit);
                let _ = $crate::pipeline_core::StageHandle::attach(runtime, bound);
            }
        }

        /// # Safety
        /// See `stage_get_name`.
        #[no_mangle]
        pub unsafe extern "C" fn stage_wait_finished() -> *const ::std::os::raw::c_char {
            match RUNTIME.get() {
                Some(runtime) => match $crate::pipeline_core::StageHandle::wait_finished(runtime) {
                    Ok(()) => $crate::ok(),
                    Err(_) => $crate::err($crate::ERR_NOT_INITIALIZED),
                },
                None => $crate::err($crate::ERR_NOT_INITIALIZED),
            }
        }

        /// # Safety
        /// See `stage_get_name`.
        #[no_mangle]
        pub unsafe extern "C" fn stage_finalize() -> *const ::std::os::raw::c_char {
            match RUNTIME.get() {
                Some(runtime) => match $crate::pipeline_core::StageHandle::finalize(runtime) {
                    Ok(()) => $crate::ok(),
                    Err(e) => {
                        ::log::error!("stage '{}' failed to finalize: {}", $name, e);
                        $crate::err($crate::ERR_JOIN_FAILED)
                    }
                },
                None => $crate::err($crate::ERR_NOT_INITIALIZED),
            }
        }
    };
}
