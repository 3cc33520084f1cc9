//! The `Stacker` facade: wires configuration, calibration, registration,
//! drift gating, accumulation and rendering into the single entry point a
//! caller drives one frame at a time (`spec.md` §4.1, §4.2).
//!
//! # Thread Safety
//!
//! `Stacker` holds plain owned state with no interior mutability and no
//! internal locking, matching the teacher's convention of stating the
//! sharing contract in a module doc comment rather than enforcing it with
//! a lock: callers that want to drive a `Stacker` from multiple threads
//! must serialize calls themselves (`spec.md` §5).

use log::{debug, info, warn};

use crate::accumulator::Accumulator;
use crate::config::StackerConfig;
use crate::darks::DarkFrameStore;
use crate::drift_gate::DriftGate;
use crate::error::{StackerError, StackerResult};
use crate::frame::Frame;
use crate::geometry::Rect;
use crate::last_error;
use crate::preaverage::PreAverager;
use crate::registrar::FourierRegistrar;
use crate::render;
use crate::rotate;

pub struct Stacker {
    config: StackerConfig,
    darks: DarkFrameStore,
    registrar: Option<FourierRegistrar>,
    drift_gate: DriftGate,
    preaverager: PreAverager,
    accumulator: Accumulator,
    frames_accepted: u64,
    last_error: Option<String>,
}

impl Stacker {
    /// Validates `config` and builds a new stacker. Failures here have no
    /// instance to report against, so the message is also recorded in the
    /// process-wide last-error slot (`spec.md` §9 design notes).
    pub fn new(config: StackerConfig) -> StackerResult<Self> {
        let (roi_x, roi_y, roi_size) = config.resolve_roi().map_err(|e| {
            last_error::set(e.to_string());
            e
        })?;

        let registrar = if roi_size > 0 {
            Some(FourierRegistrar::new(roi_size as usize, roi_x, roi_y))
        } else {
            None
        };

        info!(
            "stacker constructed: {}x{} roi_size={}",
            config.width, config.height, roi_size
        );

        Ok(Self {
            darks: DarkFrameStore::new(config.width as usize, config.height as usize),
            accumulator: Accumulator::new(config.width, config.height),
            preaverager: PreAverager::new(config.exp_multiplier),
            drift_gate: DriftGate::new(),
            registrar,
            config,
            frames_accepted: 0,
            last_error: None,
        })
    }

    fn fail(&mut self, err: StackerError) -> StackerError {
        self.last_error = Some(err.to_string());
        err
    }

    /// The most recent error recorded against this instance, if any.
    pub fn error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn set_source_gamma(&mut self, gamma: f32) {
        self.config.src_gamma = gamma;
    }

    pub fn set_target_gamma(&mut self, gamma: f32) {
        self.config.tgt_gamma = gamma;
    }

    fn expected_frame_bytes(&self) -> usize {
        (self.config.width * self.config.height * 3) as usize
    }

    /// Stores `bytes` (H*W*3 8-bit RGB) as the dark calibration frame
    /// (`spec.md` §4.1).
    pub fn set_darks(&mut self, bytes: &[u8]) -> StackerResult<()> {
        self.darks.set_darks(bytes).map_err(|e| self.fail(e))
    }

    pub fn load_darks(&mut self, path: impl AsRef<std::path::Path>) -> StackerResult<()> {
        self.darks.load_darks(path).map_err(|e| self.fail(e))
    }

    pub fn save_stacked_darks(&mut self, path: impl AsRef<std::path::Path>) -> StackerResult<()> {
        DarkFrameStore::save_stacked(path, self.accumulator.sum(), self.accumulator.cnt())
            .map_err(|e| self.fail(e))
    }

    /// Runs one frame through the full pipeline (`spec.md` §4.2):
    /// byte decode, optional pre-averaging, source gamma, dark subtraction,
    /// optional rotation, registration, drift gating, accumulation.
    ///
    /// `restart` forces this frame through the drift gate regardless of its
    /// step size, re-anchoring the gate at the frame's registered position
    /// (`spec.md` §4.1, §4.2 step 9): the caller's way out of the permanent
    /// rejection a gate falls into once `missed_frames` has climbed past its
    /// limit.
    ///
    /// Returns `Ok(true)` if the frame (or the pre-averaged batch it
    /// completed) was accumulated, `Ok(false)` if it was held for
    /// pre-averaging or rejected by the drift gate.
    pub fn stack_image(&mut self, bytes: &[u8], rotate_degrees: f32, restart: bool) -> StackerResult<bool> {
        let expected = self.expected_frame_bytes();
        if bytes.len() != expected {
            return Err(self.fail(StackerError::FrameSizeMismatch {
                width: self.config.width,
                height: self.config.height,
                got: bytes.len(),
                expected,
            }));
        }

        let frame = Frame::from_bytes(
            self.config.width as usize,
            self.config.height as usize,
            bytes,
        );

        let mut frame = match self.preaverager.push(frame) {
            Some(f) => f,
            None => {
                debug!("frame held for pre-averaging");
                return Ok(false);
            }
        };

        frame.apply_gamma(self.config.src_gamma);
        self.darks.subtract(&mut frame, self.config.src_gamma);

        let frame = if rotate_degrees != 0.0 {
            rotate::rotate(&frame, rotate_degrees)
        } else {
            frame
        };

        let shift = match &mut self.registrar {
            None => (0, 0),
            Some(registrar) => {
                let fingerprint = registrar.fingerprint(&frame);
                if !registrar.has_reference() {
                    registrar.set_reference(fingerprint);
                    self.drift_gate.reset((0.0, 0.0));
                    info!("reference frame established for registration");
                    (0, 0)
                } else {
                    let shift = registrar.estimate_shift(&fingerprint);
                    if restart {
                        self.drift_gate.reset((shift.0 as f64, shift.1 as f64));
                        info!("drift gate restarted at shift={:?}", shift);
                    } else {
                        let accepted = self
                            .drift_gate
                            .check_step((shift.0 as f64, shift.1 as f64));
                        if !accepted {
                            warn!("frame rejected by drift gate: shift={:?}", shift);
                            return Ok(false);
                        }
                        debug!("frame accepted: shift={:?}", shift);
                    }
                    shift
                }
            }
        };

        self.accumulator.add_image(&frame, shift);
        self.frames_accepted += 1;
        Ok(true)
    }

    /// Renders the current accumulation into an 8-bit RGB byte buffer of
    /// size `width * height * 3` (`spec.md` §4.6). Before any frame has
    /// been accepted this is all zero.
    pub fn get_stacked(&self) -> Vec<u8> {
        render::render(
            self.accumulator.sum(),
            self.accumulator.cnt(),
            self.config.width,
            self.config.height,
            self.accumulator.fully_stacked_area(),
            self.config.tgt_gamma,
            self.config.low_per,
            self.config.high_per,
        )
    }

    /// Renders into a caller-supplied buffer, which must be exactly
    /// `width * height * 3` bytes -- the shape the FFI boundary's
    /// `stacker_get_stacked` exposes to callers that manage their own
    /// output allocation.
    pub fn render_into(&mut self, out: &mut [u8]) -> StackerResult<()> {
        let expected = self.expected_frame_bytes();
        if out.len() != expected {
            return Err(self.fail(StackerError::OutputSizeMismatch {
                width: self.config.width,
                height: self.config.height,
                got: out.len(),
                expected,
            }));
        }
        out.copy_from_slice(&self.get_stacked());
        Ok(())
    }

    pub fn fully_stacked_area(&self) -> Rect {
        self.accumulator.fully_stacked_area()
    }

    pub fn fully_stacked_count(&self) -> u64 {
        self.accumulator.fully_stacked_count()
    }

    pub fn frames_accepted(&self) -> u64 {
        self.frames_accepted
    }
}
