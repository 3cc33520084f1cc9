//! Real-time astrophotography live-stacking engine.
//!
//! Frames are registered against a frozen reference via Fourier phase
//! correlation, gated against implausible drift, translated into a running
//! sum/count accumulation, and rendered on demand into an 8-bit image
//! either by auto-stretching percentiles or by an explicit gamma/min-max
//! curve. Camera control, codec I/O and CLI front-ends are external
//! collaborators and are not part of this crate; see [`stacker::Stacker`]
//! for the single entry point this library exposes, or [`ffi`] for the C
//! ABI wrapping it.

pub mod accumulator;
pub mod config;
pub mod darks;
pub mod drift_gate;
pub mod error;
pub mod ffi;
pub mod frame;
pub mod geometry;
pub mod last_error;
pub mod preaverage;
pub mod registrar;
pub mod render;
pub mod rotate;
pub mod stacker;

pub use config::StackerConfig;
pub use error::{StackerError, StackerResult};
pub use frame::Frame;
pub use geometry::Rect;
pub use stacker::Stacker;
