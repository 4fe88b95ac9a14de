//! FFI bindings for Synheart Stress
//!
//! This module provides C-compatible functions for driving the stress engine from
//! other languages. All functions use C strings (null-terminated) and return
//! allocated memory that must be freed by the caller using `stress_free_string`.
//!
//! The processor handle runs on event time: its clock follows the latest
//! interval timestamp passed to `stress_processor_ingest`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use chrono::{DateTime, TimeZone, Utc};

use crate::clock::{Clock, ManualClock};
use crate::config::{EngineConfig, DEFAULT_WINDOW_SECS};
use crate::encoder::StressEncoder;
use crate::pipeline::StressProcessor;
use crate::types::BeatInterval;

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Set the last error message
fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Clear the last error message
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

fn timestamp_from_millis(ts_millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ts_millis).single()
}

// ============================================================================
// Stateful Processor API
// ============================================================================

/// Opaque handle to a StressProcessor
pub struct StressProcessorHandle {
    processor: StressProcessor,
    clock: ManualClock,
    encoder: StressEncoder,
}

/// Create a new StressProcessor with the specified buffer window.
///
/// # Safety
/// - Returns a pointer to a newly allocated StressProcessor.
/// - Must be freed with `stress_processor_free`.
/// - A non-positive `window_secs` selects the 60 second default.
/// - Returns NULL on error, including a window longer than one day.
#[no_mangle]
pub unsafe extern "C" fn stress_processor_new(window_secs: f64) -> *mut StressProcessorHandle {
    clear_last_error();

    let window = if window_secs.is_finite() && window_secs > 0.0 {
        window_secs
    } else {
        DEFAULT_WINDOW_SECS
    };

    let clock = ManualClock::new(DateTime::<Utc>::default());
    let config = EngineConfig::with_window_secs(window);
    match StressProcessor::with_config(config, Box::new(clock.clone())) {
        Ok(processor) => Box::into_raw(Box::new(StressProcessorHandle {
            processor,
            clock,
            encoder: StressEncoder::new(),
        })),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free a StressProcessor.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `stress_processor_new`.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn stress_processor_free(processor: *mut StressProcessorHandle) {
    if !processor.is_null() {
        drop(Box::from_raw(processor));
    }
}

/// Offer one beat interval.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `stress_processor_new`.
/// - Returns 1 if accepted, 0 if rejected as implausible or an artifact,
///   -1 on error; call `stress_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn stress_processor_ingest(
    processor: *mut StressProcessorHandle,
    ts_millis: i64,
    duration_ms: f64,
) -> i32 {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return -1;
    }

    let handle = &mut *processor;

    let timestamp = match timestamp_from_millis(ts_millis) {
        Some(ts) => ts,
        None => {
            set_last_error(&format!("Timestamp out of range: {ts_millis}"));
            return -1;
        }
    };

    if timestamp > handle.clock.now() {
        handle.clock.set(timestamp);
    }

    if handle
        .processor
        .ingest(BeatInterval::new(timestamp, duration_ms))
        .is_accepted()
    {
        1
    } else {
        0
    }
}

/// Compute a metrics snapshot and return it as JSON.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `stress_processor_new`.
/// - Returns a newly allocated string that must be freed with `stress_free_string`.
/// - Returns NULL on error; call `stress_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn stress_processor_snapshot(
    processor: *mut StressProcessorHandle,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }

    let handle = &mut *processor;

    match handle.processor.compute_snapshot().to_json() {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Compute, record and classify a snapshot; return the stress report as JSON.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `stress_processor_new`.
/// - Returns a newly allocated string that must be freed with `stress_free_string`.
/// - Returns NULL on error; call `stress_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn stress_processor_classify(
    processor: *mut StressProcessorHandle,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }

    let handle = &mut *processor;
    let reading = handle.processor.reading();

    match handle.encoder.encode_to_json(&reading) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Drop buffered intervals, keeping the personal baseline.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `stress_processor_new`.
#[no_mangle]
pub unsafe extern "C" fn stress_processor_reset_session(processor: *mut StressProcessorHandle) {
    if !processor.is_null() {
        (*processor).processor.reset_session();
    }
}

/// Save the processor baseline to JSON.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `stress_processor_new`.
/// - Returns a newly allocated string that must be freed with `stress_free_string`.
/// - Returns NULL on error; call `stress_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn stress_processor_save_baseline(
    processor: *mut StressProcessorHandle,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }

    let handle = &*processor;

    match handle.processor.save_baseline() {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Load the processor baseline from JSON.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `stress_processor_new`.
/// - `json` must be a valid null-terminated C string.
/// - Returns 0 on success, non-zero on error.
/// - On error, call `stress_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn stress_processor_load_baseline(
    processor: *mut StressProcessorHandle,
    json: *const c_char,
) -> i32 {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return -1;
    }

    let handle = &mut *processor;

    let json_str = match cstr_to_string(json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return -1;
        }
    };

    match handle.processor.load_baseline(&json_str) {
        Ok(()) => 0,
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by Stress functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a Stress function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn stress_free_string(ptr: *mut c_char) {
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
/// - The returned pointer is valid until the next Stress function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn stress_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn stress_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
