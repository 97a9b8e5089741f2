//! FFI bindings for Mudra Flux
//!
//! This module provides C-compatible functions for driving a fusion session from
//! other languages. All functions use C strings (null-terminated) and return
//! allocated memory that must be freed by the caller using `mudra_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use chrono::{DateTime, Utc};

use crate::config::FusionConfig;
use crate::error::ComputeError;
use crate::pipeline::{replay_ndjson, FusionSession};
use crate::types::{PhysiologyReading, TickInput};

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// NULL selects the default configuration
unsafe fn config_from_ptr(config_json: *const c_char) -> Result<FusionConfig, ComputeError> {
    if config_json.is_null() {
        return Ok(FusionConfig::default());
    }
    match cstr_to_string(config_json) {
        Some(json) => FusionConfig::from_json(&json),
        None => Err(ComputeError::ParseError(
            "Config is not valid UTF-8".to_string(),
        )),
    }
}

/// Turn a serializable result into an owned C string, recording errors
fn json_result<T: serde::Serialize>(result: Result<T, ComputeError>) -> *mut c_char {
    match result.and_then(|value| serde_json::to_string(&value).map_err(ComputeError::from)) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Replay an NDJSON (or JSON array) tick stream and return the session report.
///
/// # Safety
/// - `ticks` must be a valid null-terminated C string.
/// - `config_json` must be a valid null-terminated C string or NULL.
/// - Returns a newly allocated string that must be freed with `mudra_free_string`.
/// - Returns NULL on error; call `mudra_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn mudra_replay(
    ticks: *const c_char,
    config_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let ticks_str = match cstr_to_string(ticks) {
        Some(s) => s,
        None => {
            set_last_error("Invalid ticks string pointer");
            return ptr::null_mut();
        }
    };

    json_result(config_from_ptr(config_json).and_then(|config| replay_ndjson(&ticks_str, config)))
}

// ============================================================================
// Session API
// ============================================================================

/// Opaque handle to a FusionSession
pub struct MudraSessionHandle {
    session: FusionSession,
}

/// Create a new session.
///
/// # Safety
/// - `config_json` must be a valid null-terminated C string or NULL for defaults.
/// - Must be freed with `mudra_session_free`.
/// - Returns NULL if the configuration is invalid.
#[no_mangle]
pub unsafe extern "C" fn mudra_session_new(config_json: *const c_char) -> *mut MudraSessionHandle {
    clear_last_error();

    match config_from_ptr(config_json).and_then(FusionSession::with_config) {
        Ok(session) => Box::into_raw(Box::new(MudraSessionHandle { session })),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free a session.
///
/// # Safety
/// - `session` must be a valid pointer returned by `mudra_session_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn mudra_session_free(session: *mut MudraSessionHandle) {
    if !session.is_null() {
        drop(Box::from_raw(session));
    }
}

/// Run one tick and return its snapshot JSON.
///
/// # Safety
/// - `session` must be a valid pointer returned by `mudra_session_new`.
/// - `tick_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `mudra_free_string`.
/// - Returns NULL on error; call `mudra_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn mudra_session_tick(
    session: *mut MudraSessionHandle,
    tick_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if session.is_null() {
        set_last_error("Null session pointer");
        return ptr::null_mut();
    }
    let handle = &mut *session;

    let json = match cstr_to_string(tick_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid tick string pointer");
            return ptr::null_mut();
        }
    };

    json_result(
        serde_json::from_str::<TickInput>(&json)
            .map_err(ComputeError::from)
            .and_then(|tick| handle.session.try_tick(&tick)),
    )
}

/// Push a physiology reading that arrived between ticks.
///
/// # Safety
/// - `session` must be a valid pointer returned by `mudra_session_new`.
/// - `reading_json` and `timestamp` must be valid null-terminated C strings;
///   `timestamp` is RFC 3339.
/// - Returns 0 on success, non-zero on error.
#[no_mangle]
pub unsafe extern "C" fn mudra_session_ingest(
    session: *mut MudraSessionHandle,
    reading_json: *const c_char,
    timestamp: *const c_char,
) -> i32 {
    clear_last_error();

    if session.is_null() {
        set_last_error("Null session pointer");
        return -1;
    }
    let handle = &mut *session;

    let (Some(reading), Some(ts)) = (cstr_to_string(reading_json), cstr_to_string(timestamp))
    else {
        set_last_error("Invalid reading or timestamp string pointer");
        return -1;
    };

    let result = serde_json::from_str::<PhysiologyReading>(&reading)
        .map_err(ComputeError::from)
        .and_then(|reading| {
            let at = DateTime::parse_from_rfc3339(&ts)
                .map_err(|e| ComputeError::ParseError(format!("timestamp: {e}")))?
                .with_timezone(&Utc);
            handle.session.ingest_physiology(&reading, at)
        });

    match result {
        Ok(()) => 0,
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

/// Return the session summary JSON.
///
/// # Safety
/// - `session` must be a valid pointer returned by `mudra_session_new`.
/// - Returns a newly allocated string that must be freed with `mudra_free_string`.
/// - Returns NULL on error; call `mudra_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn mudra_session_summary(session: *mut MudraSessionHandle) -> *mut c_char {
    clear_last_error();

    if session.is_null() {
        set_last_error("Null session pointer");
        return ptr::null_mut();
    }
    let handle = &*session;

    json_result(Ok(handle.session.summary()))
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by Mudra Flux functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a Mudra Flux function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn mudra_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next Mudra Flux call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn mudra_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn mudra_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
