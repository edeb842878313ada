//! C-ABI bindings for embedding the engine from JNI or Swift hosts.
//!
//! Ownership contract: `ws_engine_create` hands the caller a raw pointer
//! it must release exactly once with `ws_engine_destroy`. Calling
//! `ws_engine_match` after destroy (or with null) is a caller bug and
//! aborts rather than silently answering "allow". The same engine
//! pointer may be used from many threads concurrently; matching is
//! read-only.

use std::ffi::{c_char, CStr};

use ws_engine::Engine;

/// Borrow a C string; null or empty become "". Invalid UTF-8 is rejected
/// as empty rather than guessed at.
///
/// # Safety
/// `ptr` must be null or a NUL-terminated string valid for the call.
unsafe fn cstr<'a>(ptr: *const c_char) -> &'a str {
    if ptr.is_null() {
        return "";
    }
    CStr::from_ptr(ptr).to_str().unwrap_or("")
}

/// Compile an engine from NUL-terminated filter-list text.
///
/// Returns null when `rules` is null or the list is entirely
/// unparseable. Invalid UTF-8 in the list is replaced lossily before
/// parsing (individual bad lines are skipped by the parser anyway).
///
/// # Safety
/// `rules` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn ws_engine_create(rules: *const c_char) -> *mut Engine {
    if rules.is_null() {
        return std::ptr::null_mut();
    }
    let text = CStr::from_ptr(rules).to_string_lossy();
    match Engine::from_filter_list(&text) {
        Ok(engine) => Box::into_raw(Box::new(engine)),
        Err(err) => {
            log::error!("engine_create failed: {err}");
            std::ptr::null_mut()
        }
    }
}

/// Match one request. Writes the three decision flags through the out
/// pointers (each may be null to ignore that flag).
///
/// # Safety
/// `engine` must be a live pointer from [`ws_engine_create`]; the string
/// arguments must be null or valid NUL-terminated strings; the out
/// pointers must be null or writable.
#[no_mangle]
pub unsafe extern "C" fn ws_engine_match(
    engine: *const Engine,
    url: *const c_char,
    host: *const c_char,
    source_host: *const c_char,
    third_party: bool,
    resource_type: *const c_char,
    did_match: *mut bool,
    did_match_exception: *mut bool,
    did_match_important: *mut bool,
) {
    assert!(
        !engine.is_null(),
        "ws_engine_match called with null/destroyed engine"
    );
    let engine = &*engine;

    let result = engine.match_request(
        cstr(url),
        cstr(host),
        cstr(source_host),
        third_party,
        cstr(resource_type),
    );

    if !did_match.is_null() {
        *did_match = result.matched;
    }
    if !did_match_exception.is_null() {
        *did_match_exception = result.exception;
    }
    if !did_match_important.is_null() {
        *did_match_important = result.important;
    }
}

/// Number of compiled rules; useful for host-side diagnostics.
///
/// # Safety
/// `engine` must be a live pointer from [`ws_engine_create`].
#[no_mangle]
pub unsafe extern "C" fn ws_engine_rule_count(engine: *const Engine) -> usize {
    assert!(!engine.is_null(), "ws_engine_rule_count on null engine");
    (*engine).rule_count()
}

/// Release an engine. Passing null is a no-op; releasing twice is a
/// caller bug.
///
/// # Safety
/// `engine` must be null or an unreleased pointer from
/// [`ws_engine_create`].
#[no_mangle]
pub unsafe extern "C" fn ws_engine_destroy(engine: *mut Engine) {
    if !engine.is_null() {
        drop(Box::from_raw(engine));
    }
}
