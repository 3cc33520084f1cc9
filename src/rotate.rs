//! Affine de-rotation.
//!
//! Grounded on the original's `cv::getRotationMatrix2D` + `cv::warpAffine`
//! (field de-rotation compensates for alt-az mount drift, `spec.md` §4.9):
//! rotate by `-angle_degrees` about the frame center with bilinear sampling,
//! and source samples that fall outside the frame contribute zero, matching
//! OpenCV's default `BORDER_CONSTANT` with value 0.

use crate::frame::Frame;

/// Rotates `frame` by `-angle_degrees` about its center. A zero angle is a
/// no-op that returns a clone without resampling.
pub fn rotate(frame: &Frame, angle_degrees: f32) -> Frame {
    if angle_degrees == 0.0 {
        return frame.clone();
    }

    let width = frame.width;
    let height = frame.height;
    let cx = width as f32 / 2.0;
    let cy = height as f32 / 2.0;

    // Inverse map: for each destination pixel, find the source location by
    // rotating by +angle (the inverse of the -angle forward rotation).
    let theta = angle_degrees.to_radians();
    let cos_t = theta.cos();
    let sin_t = theta.sin();

    let mut out = Frame::zeros(width, height);
    for y in 0..height {
        for x in 0..width {
            let dx = x as f32 - cx;
            let dy = y as f32 - cy;
            let src_x = cx + dx * cos_t - dy * sin_t;
            let src_y = cy + dx * sin_t + dy * cos_t;
            let sample = bilinear_sample(frame, src_x, src_y);
            let idx = (y * width + x) * 3;
            out.data[idx..idx + 3].copy_from_slice(&sample);
        }
    }
    out
}

fn bilinear_sample(frame: &Frame, x: f32, y: f32) -> [f32; 3] {
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;
    let x0 = x0 as i64;
    let y0 = y0 as i64;

    let get = |xi: i64, yi: i64, c: usize| -> f32 {
        if xi < 0 || yi < 0 || xi >= frame.width as i64 || yi >= frame.height as i64 {
            0.0
        } else {
            frame.data[((yi as usize * frame.width + xi as usize) * 3) + c]
        }
    };

    let mut out = [0.0f32; 3];
    for (c, slot) in out.iter_mut().enumerate() {
        let top = get(x0, y0, c) * (1.0 - fx) + get(x0 + 1, y0, c) * fx;
        let bottom = get(x0, y0 + 1, c) * (1.0 - fx) + get(x0 + 1, y0 + 1, c) * fx;
        *slot = top * (1.0 - fy) + bottom * fy;
    }
    out
}
