//! Error types for the stacking engine.
//!
//! This module defines the primary error type, `StackerError`, for the whole
//! crate. Using the `thiserror` crate, it provides a centralized and
//! consistent way to handle the error kinds the design calls for: bad
//! construction parameters, size mismatches, and I/O failures on the
//! dark-frame file format.
//!
//! By using `#[from]`, `StackerError` can be seamlessly created from
//! underlying error types, simplifying error handling throughout the crate
//! with the `?` operator.

use thiserror::Error;

/// Convenience alias for results using the crate's error type.
pub type StackerResult<T> = std::result::Result<T, StackerError>;

#[derive(Error, Debug)]
pub enum StackerError {
    #[error("invalid frame dimensions {width}x{height}: both must be positive")]
    InvalidDimensions { width: i64, height: i64 },

    #[error("registration ROI of size {roi_size} does not fit in a {width}x{height} frame")]
    InvalidRoi {
        width: i64,
        height: i64,
        roi_size: i64,
    },

    #[error("dark frame has {got} bytes, expected {expected} ({width}x{height}x3)")]
    DarksSizeMismatch {
        width: i64,
        height: i64,
        got: usize,
        expected: usize,
    },

    #[error("input frame has {got} bytes, expected {expected} ({width}x{height}x3)")]
    FrameSizeMismatch {
        width: i64,
        height: i64,
        got: usize,
        expected: usize,
    },

    #[error("darks file is {got} bytes, expected exactly {expected} ({width}x{height}x3x4)")]
    ShortDarksFile {
        width: i64,
        height: i64,
        got: usize,
        expected: usize,
    },

    #[error("output buffer has {got} bytes, expected {expected} ({width}x{height}x3)")]
    OutputSizeMismatch {
        width: i64,
        height: i64,
        got: usize,
        expected: usize,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(#[from] toml::de::Error),
}
