//! Process-wide "last error" slot.
//!
//! The original C implementation keeps a single static buffer shared by
//! every `Stacker` instance (see `examples/original_source/stack.cpp`,
//! `Stacker::error_message_`). Per the design notes in the specification,
//! that global is preserved only for the one case where it is unavoidable:
//! construction failures, where there is no instance yet to carry the
//! message. Every other failure is reported on the instance itself via
//! [`crate::stacker::Stacker::error`].
//!
//! The FFI boundary's `stacker_error()` (no handle argument, matching
//! `examples/original_source/stack.h`) reads this slot, so it only ever
//! reflects the most recent *construction* failure, not arbitrary instance
//! errors -- a caller that wants per-handle errors should keep reading from
//! the Rust API or treat `stacker_error()` as "why did `stacker_new` just
//! return null".

use once_cell::sync::Lazy;
use std::sync::Mutex;

static LAST_ERROR: Lazy<Mutex<Option<String>>> = Lazy::new(|| Mutex::new(None));

pub(crate) fn set(message: impl Into<String>) {
    if let Ok(mut slot) = LAST_ERROR.lock() {
        *slot = Some(message.into());
    }
}

/// Returns the last construction-failure message recorded, if any.
pub fn last_error() -> Option<String> {
    LAST_ERROR.lock().ok().and_then(|slot| slot.clone())
}
