//! Phase-correlation-based sub-frame registration.
//!
//! Grounded on `src/data/fft.rs`'s use of `rustfft`/`num_complex` for a
//! sliding-window 1-D FFT; this module needs a 2-D transform of a square
//! ROI, built the separable way (row FFTs, then column FFTs) since
//! `rustfft` only provides 1-D plans.

use num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

use crate::frame::Frame;

/// Forward/inverse 2-D FFT plans and the low-pass kernel for a fixed ROI
/// size, plus the frozen reference spectrum from the first accepted frame.
pub struct FourierRegistrar {
    roi_size: usize,
    roi_x: i64,
    roi_y: i64,
    kernel: Vec<Complex<f32>>,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
    reference: Option<Vec<Complex<f32>>>,
}

/// Signed DFT-centered coordinate: `x - n` for `x > n/2`, else `x`
/// (`spec.md` §4.3).
fn fft_pos(x: usize, n: usize) -> i64 {
    if x > n / 2 {
        x as i64 - n as i64
    } else {
        x as i64
    }
}

impl FourierRegistrar {
    pub fn new(roi_size: usize, roi_x: i64, roi_y: i64) -> Self {
        let mut planner = FftPlanner::new();
        let forward = planner.plan_fft_forward(roi_size);
        let inverse = planner.plan_fft_inverse(roi_size);
        let kernel = Self::build_kernel(roi_size);
        Self {
            roi_size,
            roi_x,
            roi_y,
            kernel,
            forward,
            inverse,
            reference: None,
        }
    }

    /// A centered disc of radius `roi_size/16` in DFT-space (`spec.md` §4.3).
    fn build_kernel(roi_size: usize) -> Vec<Complex<f32>> {
        let rad = (roi_size / 16) as i64;
        let mut kernel = vec![Complex::new(0.0, 0.0); roi_size * roi_size];
        for r in 0..roi_size {
            for c in 0..roi_size {
                let dy = fft_pos(r, roi_size);
                let dx = fft_pos(c, roi_size);
                if dx * dx + dy * dy <= rad * rad {
                    kernel[r * roi_size + c] = Complex::new(1.0, 0.0);
                }
            }
        }
        kernel
    }

    fn dft2d(&self, buf: &mut [Complex<f32>], plan: &Arc<dyn Fft<f32>>) {
        let n = self.roi_size;
        for row in buf.chunks_mut(n) {
            plan.process(row);
        }
        let mut column = vec![Complex::new(0.0, 0.0); n];
        for c in 0..n {
            for (r, slot) in column.iter_mut().enumerate() {
                *slot = buf[r * n + c];
            }
            plan.process(&mut column);
            for (r, &val) in column.iter().enumerate() {
                buf[r * n + c] = val;
            }
        }
    }

    /// Crops the green channel ROI, forward-transforms it, and applies the
    /// low-pass kernel (`spec.md` §4.3's "per-frame FFT").
    pub fn fingerprint(&self, frame: &Frame) -> Vec<Complex<f32>> {
        let n = self.roi_size;
        let mut spectrum: Vec<Complex<f32>> = Vec::with_capacity(n * n);
        for r in 0..n {
            for c in 0..n {
                let x = self.roi_x as usize + c;
                let y = self.roi_y as usize + r;
                spectrum.push(Complex::new(frame.green(x, y), 0.0));
            }
        }
        self.dft2d(&mut spectrum, &self.forward);
        for (s, k) in spectrum.iter_mut().zip(self.kernel.iter()) {
            *s *= k;
        }
        spectrum
    }

    /// Freezes `spectrum` as the reference fingerprint; never replaced
    /// afterwards (`spec.md` §3 invariant: "the reference is never replaced
    /// after it is first set").
    pub fn set_reference(&mut self, spectrum: Vec<Complex<f32>>) {
        if self.reference.is_none() {
            self.reference = Some(spectrum);
        }
    }

    pub fn has_reference(&self) -> bool {
        self.reference.is_some()
    }

    /// Phase correlation between the frozen reference and `fingerprint`,
    /// returning the integer pixel shift that maps the new frame into the
    /// reference's coordinate frame (`spec.md` §4.4).
    pub fn estimate_shift(&self, fingerprint: &[Complex<f32>]) -> (i32, i32) {
        let reference = match &self.reference {
            Some(r) => r,
            None => return (0, 0),
        };
        let n = self.roi_size;
        let mut cross: Vec<Complex<f32>> = reference
            .iter()
            .zip(fingerprint.iter())
            .map(|(&r, &f)| r * f.conj())
            .collect();
        for v in &mut cross {
            let mag = v.norm();
            *v = if mag > 0.0 {
                *v / mag
            } else {
                Complex::new(0.0, 0.0)
            };
        }
        self.dft2d(&mut cross, &self.inverse);

        let mut best_value = f32::NEG_INFINITY;
        let mut best = (0usize, 0usize);
        for r in 0..n {
            for c in 0..n {
                let value = cross[r * n + c].re;
                if value > best_value {
                    best_value = value;
                    best = (c, r);
                }
            }
        }
        (
            fft_pos(best.0, n) as i32,
            fft_pos(best.1, n) as i32,
        )
    }
}
