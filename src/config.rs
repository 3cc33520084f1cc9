//! Stacker configuration: construction parameters, ROI resolution, and a
//! TOML loader.
//!
//! Grounded on the teacher's `Settings`-from-TOML pattern (its `config.rs`
//! module loads a `Settings` struct via the `config`/`figment` crates); this
//! crate has no use for layered env-var overrides, so it keeps only the
//! plain `toml` deserialization half of that pattern.

use crate::error::{StackerError, StackerResult};
use serde::Deserialize;

/// Sentinel for "roi_size = min(W,H)" (`spec.md` §3).
pub const ROI_AUTO: i64 = -1;
/// Sentinel for "roi_x/roi_y centered" (`spec.md` §3).
pub const ROI_CENTERED: i64 = -1;
/// Sentinel on `tgt_gamma` selecting auto-stretch rendering (`spec.md` §3).
pub const AUTO_STRETCH: f32 = -1.0;

fn default_exp_multiplier() -> u32 {
    1
}
fn default_src_gamma() -> f32 {
    1.0
}
fn default_tgt_gamma() -> f32 {
    AUTO_STRETCH
}
fn default_low_per() -> f32 {
    0.5
}
fn default_high_per() -> f32 {
    99.999
}

/// Immutable-after-construction stacker configuration, plus the two
/// mutable gamma knobs (`spec.md` §3).
#[derive(Clone, Debug, Deserialize)]
pub struct StackerConfig {
    pub width: i64,
    pub height: i64,
    #[serde(default = "neg_one")]
    pub roi_x: i64,
    #[serde(default = "neg_one")]
    pub roi_y: i64,
    #[serde(default = "neg_one")]
    pub roi_size: i64,
    #[serde(default = "default_exp_multiplier")]
    pub exp_multiplier: u32,
    #[serde(default = "default_src_gamma")]
    pub src_gamma: f32,
    #[serde(default = "default_tgt_gamma")]
    pub tgt_gamma: f32,
    #[serde(default = "default_low_per")]
    pub low_per: f32,
    #[serde(default = "default_high_per")]
    pub high_per: f32,
}

fn neg_one() -> i64 {
    -1
}

impl StackerConfig {
    pub fn new(width: i64, height: i64, roi_x: i64, roi_y: i64, roi_size: i64) -> Self {
        Self {
            width,
            height,
            roi_x,
            roi_y,
            roi_size,
            exp_multiplier: default_exp_multiplier(),
            src_gamma: default_src_gamma(),
            tgt_gamma: default_tgt_gamma(),
            low_per: default_low_per(),
            high_per: default_high_per(),
        }
    }

    pub fn with_exp_multiplier(mut self, exp_multiplier: u32) -> Self {
        self.exp_multiplier = exp_multiplier.max(1);
        self
    }

    /// Loads a configuration from a TOML document, e.g.:
    ///
    /// ```toml
    /// width = 1920
    /// height = 1080
    /// roi_size = 256
    /// exp_multiplier = 4
    /// ```
    pub fn from_toml_str(s: &str) -> StackerResult<Self> {
        toml::from_str(s).map_err(StackerError::Config)
    }

    /// Validates dimensions and resolves the registration ROI into an
    /// `(offset_x, offset_y, window_size)` triple, per `spec.md` §3:
    /// `roi_size = 0` disables registration (window_size = 0); `-1` selects
    /// `min(W,H)`; `roi_x`/`roi_y` both `-1` centers the ROI, otherwise it is
    /// centered at `(roi_x, roi_y)` and clamped to fit inside the frame.
    pub fn resolve_roi(&self) -> StackerResult<(i64, i64, i64)> {
        if self.width <= 0 || self.height <= 0 {
            return Err(StackerError::InvalidDimensions {
                width: self.width,
                height: self.height,
            });
        }
        if self.roi_size == 0 {
            return Ok((0, 0, 0));
        }
        let window_size = if self.roi_size == ROI_AUTO {
            self.width.min(self.height)
        } else {
            self.roi_size
        };
        if window_size <= 0 || window_size > self.width || window_size > self.height {
            return Err(StackerError::InvalidRoi {
                width: self.width,
                height: self.height,
                roi_size: window_size,
            });
        }
        let (dx, dy) = if self.roi_x == ROI_CENTERED && self.roi_y == ROI_CENTERED {
            (
                (self.width - window_size) / 2,
                (self.height - window_size) / 2,
            )
        } else {
            let dx = (self.roi_x - window_size / 2)
                .max(0)
                .min(self.width - window_size);
            let dy = (self.roi_y - window_size / 2)
                .max(0)
                .min(self.height - window_size);
            (dx, dy)
        };
        Ok((dx, dy, window_size))
    }
}
