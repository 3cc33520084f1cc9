//! Running sum/count accumulation of registered frames.
//!
//! Each accepted frame is translated by its estimated shift and added into
//! per-pixel sum/count buffers. The running intersection of every frame's
//! overlap rectangle tracks the region that has received a contribution
//! from *every* accepted frame so far (`spec.md` §4.7).

use crate::frame::Frame;
use crate::geometry::Rect;

pub struct Accumulator {
    width: i64,
    height: i64,
    sum: Vec<f32>,
    cnt: Vec<f32>,
    fully_stacked_area: Rect,
    fully_stacked_count: u64,
}

impl Accumulator {
    pub fn new(width: i64, height: i64) -> Self {
        Self {
            width,
            height,
            sum: vec![0.0; (width * height * 3) as usize],
            cnt: vec![0.0; (width * height * 3) as usize],
            fully_stacked_area: Rect::full(width, height),
            fully_stacked_count: 0,
        }
    }

    pub fn sum(&self) -> &[f32] {
        &self.sum
    }

    pub fn cnt(&self) -> &[f32] {
        &self.cnt
    }

    pub fn fully_stacked_area(&self) -> Rect {
        self.fully_stacked_area
    }

    pub fn fully_stacked_count(&self) -> u64 {
        self.fully_stacked_count
    }

    /// Adds `frame` into the running sum/count, translated so that
    /// `output(x, y) = frame(x - shift.0, y - shift.1)` -- the same
    /// convention as the original's `add_image` (destination rect offset
    /// at `max(shift, 0)`, source rect offset at `max(-shift, 0)`, both of
    /// width/height `W/H - abs(shift)`). `shift` is the integer offset of
    /// `frame` relative to the reference frame, as returned by the
    /// registrar (`spec.md` §4.4, §4.7).
    pub fn add_image(&mut self, frame: &Frame, shift: (i32, i32)) {
        let full = Rect::full(self.width, self.height);
        // Region in accumulator space this frame can contribute to.
        let dst_rect = Rect::new(shift.0 as i64, shift.1 as i64, self.width, self.height)
            .intersect(&full);

        if dst_rect.is_empty() {
            self.fully_stacked_area = Rect::new(self.fully_stacked_area.x, self.fully_stacked_area.y, 0, 0);
            self.fully_stacked_count += 1;
            return;
        }

        for y in dst_rect.y..(dst_rect.y + dst_rect.height) {
            let src_y = (y - shift.1 as i64) as usize;
            for x in dst_rect.x..(dst_rect.x + dst_rect.width) {
                let src_x = (x - shift.0 as i64) as usize;
                let dst_idx = ((y * self.width + x) * 3) as usize;
                let src_idx = (src_y * frame.width + src_x) * 3;
                for c in 0..3 {
                    self.sum[dst_idx + c] += frame.data[src_idx + c];
                    self.cnt[dst_idx + c] += 1.0;
                }
            }
        }

        self.fully_stacked_area = self.fully_stacked_area.intersect(&dst_rect);
        self.fully_stacked_count += 1;
    }
}
