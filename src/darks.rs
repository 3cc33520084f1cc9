//! Dark-frame calibration store.
//!
//! Holds an optional dark frame in linear float space (`spec.md` §3), plus a
//! gamma-corrected cache computed lazily and invalidated whenever the darks
//! or the source gamma change (`spec.md` §4.2 step 4).

use crate::error::{StackerError, StackerResult};
use crate::frame::Frame;
use std::io::{Read, Write};
use std::path::Path;

pub struct DarkFrameStore {
    width: usize,
    height: usize,
    darks: Option<Vec<f32>>,
    gamma_corrected: Option<Vec<f32>>,
    gamma_corrected_for: f32,
}

impl DarkFrameStore {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            darks: None,
            gamma_corrected: None,
            gamma_corrected_for: 1.0,
        }
    }

    pub fn has_darks(&self) -> bool {
        self.darks.is_some()
    }

    fn expected_len(&self) -> usize {
        self.width * self.height * 3
    }

    /// Stores `bytes` (H*W*3 8-bit RGB) as linear float darks. Idempotent:
    /// calling again simply replaces the stored darks (`spec.md` §4.1).
    pub fn set_darks(&mut self, bytes: &[u8]) -> StackerResult<()> {
        let expected = self.expected_len();
        if bytes.len() != expected {
            return Err(StackerError::DarksSizeMismatch {
                width: self.width as i64,
                height: self.height as i64,
                got: bytes.len(),
                expected,
            });
        }
        self.darks = Some(bytes.iter().map(|&b| b as f32 / 255.0).collect());
        self.gamma_corrected = None;
        Ok(())
    }

    /// Loads raw little-endian float32 triplets from `path`
    /// (`spec.md` §6: exactly `H*W*3*4` bytes, no header).
    pub fn load_darks(&mut self, path: impl AsRef<Path>) -> StackerResult<()> {
        let expected_floats = self.expected_len();
        let expected_bytes = expected_floats * 4;
        let mut file = std::fs::File::open(path)?;
        let mut buf = Vec::with_capacity(expected_bytes);
        file.read_to_end(&mut buf)?;
        if buf.len() != expected_bytes {
            return Err(StackerError::ShortDarksFile {
                width: self.width as i64,
                height: self.height as i64,
                got: buf.len(),
                expected: expected_bytes,
            });
        }
        let mut darks = Vec::with_capacity(expected_floats);
        for chunk in buf.chunks_exact(4) {
            darks.push(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
        }
        self.darks = Some(darks);
        self.gamma_corrected = None;
        Ok(())
    }

    /// Writes `sum / cnt` (the current running average) as raw little-endian
    /// float32 triplets, for building a master dark from a stacking session
    /// (`spec.md` §4.1). Pixels never stacked (`cnt == 0`) would divide to
    /// NaN/Inf in the original; per the open defect noted in `spec.md` §9,
    /// those pixels are written as `0.0` instead.
    pub fn save_stacked(
        path: impl AsRef<Path>,
        sum: &[f32],
        cnt: &[f32],
    ) -> StackerResult<()> {
        let mut file = std::fs::File::create(path)?;
        let mut buf = Vec::with_capacity(sum.len() * 4);
        for (&s, &c) in sum.iter().zip(cnt.iter()) {
            let v = if c > 0.0 { s / c } else { 0.0 };
            buf.extend_from_slice(&v.to_le_bytes());
        }
        file.write_all(&buf)?;
        Ok(())
    }

    /// Returns the gamma-corrected dark frame (`darks^src_gamma`), computing
    /// and caching it on first use for a given `src_gamma`, matching the
    /// original's `darks_corrected_` dirty flag.
    pub fn gamma_corrected(&mut self, src_gamma: f32) -> Option<&[f32]> {
        let darks = self.darks.as_ref()?;
        if src_gamma == 1.0 {
            return Some(darks);
        }
        if self.gamma_corrected.is_none() || self.gamma_corrected_for != src_gamma {
            self.gamma_corrected = Some(darks.iter().map(|&v| v.powf(src_gamma)).collect());
            self.gamma_corrected_for = src_gamma;
        }
        self.gamma_corrected.as_deref()
    }

    /// Subtracts the (possibly gamma-corrected) darks from `frame` in place.
    /// No negative clamping: negatives are allowed through (`spec.md` §4.2
    /// step 4).
    pub fn subtract(&mut self, frame: &mut Frame, src_gamma: f32) {
        if let Some(darks) = self.gamma_corrected(src_gamma) {
            for (pixel, dark) in frame.data.iter_mut().zip(darks.iter()) {
                *pixel -= dark;
            }
        }
    }
}
