//! C ABI control surface.
//!
//! Grounded on `examples/original_source/stack.h`/`stack.cpp`'s
//! `extern "C"` block: a handle-based API where every fallible call
//! returns a sentinel (null pointer, negative/`false` return) instead of
//! unwinding, and `catch_unwind` sits at the boundary so a Rust panic can
//! never cross into the caller's C frame (`spec.md` §6, §9 design notes).

use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::ptr;

use crate::config::StackerConfig;
use crate::last_error;
use crate::stacker::Stacker;

/// Constructs a stacker. Returns null on any failure; call
/// `stacker_error()` to read why (the process-wide construction-failure
/// slot, since there is no instance yet to report against).
#[no_mangle]
pub extern "C" fn stacker_new(
    width: i64,
    height: i64,
    roi_x: i64,
    roi_y: i64,
    roi_size: i64,
) -> *mut Stacker {
    let result = catch_unwind(|| {
        let config = StackerConfig::new(width, height, roi_x, roi_y, roi_size);
        Stacker::new(config)
    });
    match result {
        Ok(Ok(stacker)) => Box::into_raw(Box::new(stacker)),
        Ok(Err(e)) => {
            last_error::set(e.to_string());
            ptr::null_mut()
        }
        Err(_) => {
            last_error::set("internal panic during stacker_new");
            ptr::null_mut()
        }
    }
}

/// Frees a handle returned by `stacker_new`. Passing null is a no-op.
///
/// # Safety
///
/// `handle` must be either null or a pointer previously returned by
/// `stacker_new` and not already freed.
#[no_mangle]
pub unsafe extern "C" fn stacker_delete(handle: *mut Stacker) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}

/// # Safety
///
/// `handle` must be a live pointer from `stacker_new`; `data` must point to
/// at least `len` readable bytes.
#[no_mangle]
pub unsafe extern "C" fn stacker_set_darks(
    handle: *mut Stacker,
    data: *const u8,
    len: usize,
) -> bool {
    if handle.is_null() || data.is_null() {
        return false;
    }
    let stacker = &mut *handle;
    let bytes = std::slice::from_raw_parts(data, len);
    catch_unwind(AssertUnwindSafe(|| stacker.set_darks(bytes).is_ok())).unwrap_or(false)
}

/// # Safety
///
/// `handle` must be a live pointer from `stacker_new`; `path` must be a
/// valid NUL-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn stacker_load_darks(handle: *mut Stacker, path: *const c_char) -> bool {
    if handle.is_null() || path.is_null() {
        return false;
    }
    let stacker = &mut *handle;
    let path = match CStr::from_ptr(path).to_str() {
        Ok(p) => p,
        Err(_) => return false,
    };
    catch_unwind(AssertUnwindSafe(|| stacker.load_darks(path).is_ok())).unwrap_or(false)
}

/// # Safety
///
/// Same contract as `stacker_load_darks`.
#[no_mangle]
pub unsafe extern "C" fn stacker_save_stacked_darks(
    handle: *mut Stacker,
    path: *const c_char,
) -> bool {
    if handle.is_null() || path.is_null() {
        return false;
    }
    let stacker = &mut *handle;
    let path = match CStr::from_ptr(path).to_str() {
        Ok(p) => p,
        Err(_) => return false,
    };
    catch_unwind(AssertUnwindSafe(|| stacker.save_stacked_darks(path).is_ok())).unwrap_or(false)
}

/// # Safety
///
/// `handle` must be a live pointer from `stacker_new`.
#[no_mangle]
pub unsafe extern "C" fn stacker_set_src_gamma(handle: *mut Stacker, gamma: f32) {
    if !handle.is_null() {
        (*handle).set_source_gamma(gamma);
    }
}

/// # Safety
///
/// `handle` must be a live pointer from `stacker_new`.
#[no_mangle]
pub unsafe extern "C" fn stacker_set_tgt_gamma(handle: *mut Stacker, gamma: f32) {
    if !handle.is_null() {
        (*handle).set_target_gamma(gamma);
    }
}

/// Runs one frame through the pipeline. Returns `1` if accumulated, `0` if
/// held (pre-averaging) or rejected by the drift gate, `-1` on error.
/// `restart` (nonzero) force-accepts the frame and re-anchors the drift
/// gate, the caller's way out of a gate that has permanently stopped
/// accepting frames.
///
/// # Safety
///
/// `handle` must be a live pointer from `stacker_new`; `data` must point to
/// at least `len` readable bytes.
#[no_mangle]
pub unsafe extern "C" fn stacker_stack_image(
    handle: *mut Stacker,
    data: *const u8,
    len: usize,
    rotate_degrees: f32,
    restart: i32,
) -> i32 {
    if handle.is_null() || data.is_null() {
        return -1;
    }
    let stacker = &mut *handle;
    let bytes = std::slice::from_raw_parts(data, len);
    let result = catch_unwind(AssertUnwindSafe(|| {
        stacker.stack_image(bytes, rotate_degrees, restart != 0)
    }));
    match result {
        Ok(Ok(true)) => 1,
        Ok(Ok(false)) => 0,
        Ok(Err(_)) => -1,
        Err(_) => -1,
    }
}

/// Renders the current accumulation into `out` (which must be exactly
/// `width * height * 3` bytes). Returns `false` if `out_len` doesn't match.
///
/// # Safety
///
/// `handle` must be a live pointer from `stacker_new`; `out` must point to
/// at least `out_len` writable bytes.
#[no_mangle]
pub unsafe extern "C" fn stacker_get_stacked(
    handle: *mut Stacker,
    out: *mut u8,
    out_len: usize,
) -> bool {
    if handle.is_null() || out.is_null() {
        return false;
    }
    let stacker = &mut *handle;
    let mut buf = vec![0u8; out_len];
    let result = catch_unwind(AssertUnwindSafe(|| stacker.render_into(&mut buf)));
    match result {
        Ok(Ok(())) => {
            ptr::copy_nonoverlapping(buf.as_ptr(), out, out_len);
            true
        }
        _ => false,
    }
}

/// Returns the most recent *construction* failure as a newly-allocated C
/// string, or null if none. Free with `stacker_free_string`.
#[no_mangle]
pub extern "C" fn stacker_error() -> *mut c_char {
    match last_error::last_error() {
        Some(message) => CString::new(message).map(CString::into_raw).unwrap_or(ptr::null_mut()),
        None => ptr::null_mut(),
    }
}

/// Returns `handle`'s most recent non-construction error as a
/// newly-allocated C string, or null if none. Free with
/// `stacker_free_string`.
///
/// # Safety
///
/// `handle` must be a live pointer from `stacker_new`.
#[no_mangle]
pub unsafe extern "C" fn stacker_instance_error(handle: *const Stacker) -> *mut c_char {
    if handle.is_null() {
        return ptr::null_mut();
    }
    match (*handle).error() {
        Some(message) => CString::new(message).map(CString::into_raw).unwrap_or(ptr::null_mut()),
        None => ptr::null_mut(),
    }
}

/// Frees a string returned by `stacker_error` or `stacker_instance_error`.
///
/// # Safety
///
/// `s` must be a pointer previously returned by one of those functions (or
/// null), and not already freed.
#[no_mangle]
pub unsafe extern "C" fn stacker_free_string(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}
