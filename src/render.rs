//! Rendering the running accumulation into an 8-bit RGB image.
//!
//! Two modes, selected by `tgt_gamma` (`spec.md` §3/§4.6):
//! - **Auto-stretch** (`tgt_gamma == AUTO_STRETCH`): a per-channel 256-bin
//!   histogram drives a white-balance scale/offset (grounded on the
//!   original's `calc_scale_offset2`), followed by a luminance boost read
//!   off a cumulative-from-top histogram (`stretch_high_factor`), and an
//!   adaptive gamma derived from the resulting mean brightness.
//! - **Explicit**: a single global min/max normalization, with an optional
//!   fixed gamma applied afterwards.
//!
//! Both modes only look at the `fully_stacked_area` sub-rectangle when
//! computing statistics -- it is the only region guaranteed to have a
//! contribution from every accepted frame. Gamma is always applied as
//! `value^(1/gamma)` (matching `cv::pow(tmp, 1/g, tmp)` in the original),
//! the inverse of the forward `value^gamma` applied to the source image on
//! the way in (`frame.rs`'s `apply_gamma`).

use crate::config::AUTO_STRETCH;
use crate::geometry::Rect;

fn region_channel_bytes(sum: &[f32], cnt: &[f32], width: i64, area: Rect, channel: usize) -> Vec<f32> {
    let mut values = Vec::with_capacity((area.width * area.height).max(0) as usize);
    for y in area.y..(area.y + area.height) {
        for x in area.x..(area.x + area.width) {
            let idx = ((y * width + x) * 3) as usize + channel;
            let c = cnt[idx];
            if c > 0.0 {
                values.push(sum[idx] / c * 255.0);
            }
        }
    }
    values
}

fn histogram256(bytes: &[f32]) -> ([u32; 256], u32) {
    let mut hist = [0u32; 256];
    for &v in bytes {
        let bin = (v.round().clamp(0.0, 255.0)) as usize;
        hist[bin] += 1;
    }
    (hist, bytes.len() as u32)
}

/// The bin at which the cumulative count from the bottom first reaches
/// `low_per` percent of `total` -- the histogram's "black point".
fn low_percentile_bin(hist: &[u32; 256], total: u32, low_per: f32) -> u32 {
    if total == 0 {
        return 0;
    }
    let threshold = (low_per / 100.0 * total as f32).ceil() as u32;
    let mut cumulative = 0u32;
    for (bin, &count) in hist.iter().enumerate() {
        cumulative += count;
        if cumulative >= threshold {
            return bin as u32;
        }
    }
    255
}

/// The bin at which the cumulative count from the top first reaches
/// `100 - high_per` percent of `total` -- the histogram's "white point",
/// found by scanning down from the brightest bin.
fn high_percentile_bin_from_top(hist: &[u32; 256], total: u32, high_per: f32) -> u32 {
    if total == 0 {
        return 255;
    }
    let threshold = ((100.0 - high_per) / 100.0 * total as f32).ceil() as u32;
    let mut cumulative = 0u32;
    for bin in (0..256).rev() {
        cumulative += hist[bin];
        if cumulative >= threshold {
            return bin as u32;
        }
    }
    0
}

/// Renders `sum`/`cnt` (the accumulator's running buffers) into an 8-bit
/// interleaved RGB byte buffer of size `width * height * 3`.
pub fn render(
    sum: &[f32],
    cnt: &[f32],
    width: i64,
    height: i64,
    fully_stacked_area: Rect,
    tgt_gamma: f32,
    low_per: f32,
    high_per: f32,
) -> Vec<u8> {
    if tgt_gamma == AUTO_STRETCH {
        render_auto_stretch(sum, cnt, width, height, fully_stacked_area, low_per, high_per)
    } else {
        render_explicit(sum, cnt, width, height, fully_stacked_area, tgt_gamma)
    }
}

fn render_auto_stretch(
    sum: &[f32],
    cnt: &[f32],
    width: i64,
    height: i64,
    area: Rect,
    low_per: f32,
    high_per: f32,
) -> Vec<u8> {
    let mut lp = [0.0f32; 3];
    let mut mean = [0.0f32; 3];
    for (channel, (lp_slot, mean_slot)) in lp.iter_mut().zip(mean.iter_mut()).enumerate() {
        let bytes = region_channel_bytes(sum, cnt, width, area, channel);
        let (hist, total) = histogram256(&bytes);
        *lp_slot = low_percentile_bin(&hist, total, low_per) as f32;
        *mean_slot = if total > 0 {
            bytes.iter().sum::<f32>() / total as f32
        } else {
            0.0
        };
    }

    let min_factor = lp
        .iter()
        .map(|&lp_c| 255.0 / (255.0 - lp_c).max(1.0))
        .fold(0.0f32, f32::max);
    let maxmean = mean.iter().cloned().fold(0.0f32, f32::max);

    let mut scale = [1.0f32; 3];
    let mut offset = [0.0f32; 3];
    for channel in 0..3 {
        let wb = (maxmean / mean[channel].max(1e-3)) * min_factor;
        scale[channel] = wb;
        offset[channel] = -lp[channel] * wb;
    }

    // Luminance pass: white-balance every covered pixel, then find the
    // high-percentile cut via a cumulative-from-top histogram.
    let mut luminance_bytes: Vec<f32> = Vec::with_capacity((area.width * area.height).max(0) as usize);
    for y in area.y..(area.y + area.height) {
        for x in area.x..(area.x + area.width) {
            let idx = ((y * width + x) * 3) as usize;
            if cnt[idx] <= 0.0 {
                continue;
            }
            let r = sum[idx] / cnt[idx] * 255.0 * scale[0] + offset[0];
            let g = sum[idx + 1] / cnt[idx + 1] * 255.0 * scale[1] + offset[1];
            let b = sum[idx + 2] / cnt[idx + 2] * 255.0 * scale[2] + offset[2];
            luminance_bytes.push(0.3 * r + 0.6 * g + 0.1 * b);
        }
    }
    let (lum_hist, lum_total) = histogram256(&luminance_bytes);
    let hp = high_percentile_bin_from_top(&lum_hist, lum_total, high_per) as f32;
    let boost = 255.0 / hp.max(1.0);

    let mean_luminance_norm = if lum_total > 0 {
        (luminance_bytes.iter().sum::<f32>() / lum_total as f32 * boost / 255.0).max(1e-6)
    } else {
        0.25
    };
    let gamma = (mean_luminance_norm.ln() / 0.25f32.ln()).clamp(1.0, 2.2);

    let mut out = vec![0u8; (width * height * 3) as usize];
    for y in 0..height {
        for x in 0..width {
            let idx = ((y * width + x) * 3) as usize;
            for channel in 0..3 {
                let v = if cnt[idx + channel] > 0.0 {
                    let raw_byte = sum[idx + channel] / cnt[idx + channel] * 255.0;
                    let stretched_byte = raw_byte * scale[channel] + offset[channel];
                    let normalized = (stretched_byte * boost / 255.0).clamp(0.0, 1.0);
                    normalized.powf(1.0 / gamma)
                } else {
                    0.0
                };
                out[idx + channel] = (v * 255.0).round().clamp(0.0, 255.0) as u8;
            }
        }
    }
    out
}

fn render_explicit(
    sum: &[f32],
    cnt: &[f32],
    width: i64,
    height: i64,
    area: Rect,
    tgt_gamma: f32,
) -> Vec<u8> {
    let mut min_val = f32::INFINITY;
    let mut max_val = f32::NEG_INFINITY;
    for channel in 0..3 {
        for &v in &region_channel_bytes(sum, cnt, width, area, channel) {
            min_val = min_val.min(v);
            max_val = max_val.max(v);
        }
    }
    if !min_val.is_finite() || !max_val.is_finite() {
        min_val = 0.0;
        max_val = 255.0;
    }
    let span = (max_val - min_val).max(1e-6);

    let mut out = vec![0u8; (width * height * 3) as usize];
    for y in 0..height {
        for x in 0..width {
            let idx = ((y * width + x) * 3) as usize;
            for channel in 0..3 {
                let v = if cnt[idx + channel] > 0.0 {
                    let raw_byte = sum[idx + channel] / cnt[idx + channel] * 255.0;
                    let mut normalized = ((raw_byte - min_val) / span).clamp(0.0, 1.0);
                    if tgt_gamma > 0.0 && tgt_gamma != 1.0 {
                        normalized = normalized.powf(1.0 / tgt_gamma);
                    }
                    normalized
                } else {
                    0.0
                };
                out[idx + channel] = (v * 255.0).round().clamp(0.0, 255.0) as u8;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_all_zero_before_any_frame() {
        let sum = vec![0.0f32; 3 * 4];
        let cnt = vec![0.0f32; 3 * 4];
        let out = render(&sum, &cnt, 2, 2, Rect::full(2, 2), AUTO_STRETCH, 0.5, 99.999);
        assert!(out.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_explicit_mode_min_max_normalizes() {
        let mut sum = vec![0.0f32; 3 * 4];
        let mut cnt = vec![1.0f32; 3 * 4];
        sum[0] = 0.0;
        sum[3] = 10.0;
        sum[6] = 20.0;
        sum[9] = 30.0;
        cnt.iter_mut().for_each(|c| *c = 1.0);
        let out = render(&sum, &cnt, 2, 2, Rect::full(2, 2), 1.0, 0.5, 99.999);
        assert_eq!(out[0], 0);
        assert_eq!(out[9], 255);
    }

    #[test]
    fn test_explicit_mode_gamma_is_inverse_exponent() {
        // tgt_gamma = 2.0 should brighten midtones: value^(1/2) > value for
        // 0 < value < 1.
        let mut sum = vec![0.0f32; 3];
        let cnt = vec![1.0f32; 3];
        sum[0] = 64.0 / 255.0;
        let out_linear = render(&sum, &cnt, 1, 1, Rect::full(1, 1), 1.0, 0.5, 99.999);
        let out_gamma = render(&sum, &cnt, 1, 1, Rect::full(1, 1), 2.0, 0.5, 99.999);
        assert!(out_gamma[0] >= out_linear[0]);
    }

    #[test]
    fn test_low_percentile_bin_finds_black_point() {
        let mut bytes = vec![0.0f32; 90];
        bytes.extend(vec![200.0f32; 10]);
        let (hist, total) = histogram256(&bytes);
        let bin = low_percentile_bin(&hist, total, 50.0);
        assert_eq!(bin, 0);
    }

    #[test]
    fn test_high_percentile_bin_from_top_finds_white_point() {
        let mut bytes = vec![50.0f32; 99];
        bytes.push(250.0);
        let (hist, total) = histogram256(&bytes);
        let bin = high_percentile_bin_from_top(&hist, total, 99.0);
        assert_eq!(bin, 250);
    }

    #[test]
    fn test_auto_stretch_output_is_monotonic_in_brightness() {
        let mut sum = vec![0.0f32; 3 * 4];
        let cnt = vec![1.0f32; 3 * 4];
        for p in 0..4 {
            let base = (p as f32 * 40.0 + 20.0) / 255.0;
            sum[p * 3] = base;
            sum[p * 3 + 1] = base;
            sum[p * 3 + 2] = base;
        }
        let out = render(&sum, &cnt, 2, 2, Rect::full(2, 2), AUTO_STRETCH, 0.5, 99.999);
        assert!(out[0] <= out[3]);
        assert!(out[3] <= out[6]);
        assert!(out[6] <= out[9]);
    }
}
