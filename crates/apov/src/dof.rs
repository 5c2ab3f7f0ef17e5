//! Depth-of-field post filter.
//!
//! Pixels whose neighbourhood sits at a similar depth are pulled towards the
//! neighbourhood's average colour, more strongly the deeper they are. Depth
//! discontinuities and background are left sharp.

use crate::raster::{channels, pack, DepthBuffer, Raster};

/// Pixels this close to the raster edge are copied unfiltered.
pub const BORDER: u32 = 2;

/// Near ring on the axes plus a far diagonal ring: eight distinct taps.
const TAPS: [(i32, i32); 8] = [
    (-1, 0),
    (1, 0),
    (0, -1),
    (0, 1),
    (-2, -2),
    (2, -2),
    (-2, 2),
    (2, 2),
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DofParams {
    /// Depth at which a pixel is fully replaced by its neighbourhood average.
    pub max_depth: f32,
    /// Largest `|mean neighbour depth - own depth|` still treated as one surface.
    pub threshold: f32,
}

impl Default for DofParams {
    fn default() -> Self {
        Self {
            max_depth: 128.0,
            threshold: 8.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DofFilter {
    params: DofParams,
    mix: [f32; 256],
}

impl DofFilter {
    pub fn new(params: DofParams) -> Self {
        let mut mix = [0.0f32; 256];
        for (d, m) in mix.iter_mut().enumerate() {
            let d = d as f32;
            if d < params.max_depth {
                *m = (params.max_depth - d) / params.max_depth;
            }
        }
        Self { params, mix }
    }

    pub fn params(&self) -> DofParams {
        self.params
    }

    /// Weight of a pixel's own colour at depth `d`.
    #[inline]
    pub fn mix(&self, d: u8) -> f32 {
        self.mix[d as usize]
    }

    /// Filter `src` into `dst`; both rasters and `depth` share one size.
    pub fn apply(&self, src: &Raster, depth: &DepthBuffer, dst: &mut Raster) {
        dst.copy_from(src);

        let (width, height) = (src.width(), src.height());
        if width <= 2 * BORDER || height <= 2 * BORDER {
            return;
        }

        let pixels = src.pixels();
        for y in BORDER..height - BORDER {
            for x in BORDER..width - BORDER {
                let i = src.idx(x, y);
                let own = pixels[i];
                if own == 0 {
                    continue;
                }

                let mut n = 0u32;
                let mut sum = [0u32; 3];
                let mut depth_sum = 0u32;
                for (dx, dy) in TAPS {
                    let (nx, ny) = ((x as i32 + dx) as u32, (y as i32 + dy) as u32);
                    let px = pixels[src.idx(nx, ny)];
                    if px == 0 {
                        continue;
                    }
                    let [r, g, b, _] = channels(px);
                    sum[0] += r as u32;
                    sum[1] += g as u32;
                    sum[2] += b as u32;
                    depth_sum += depth.at(nx, ny) as u32;
                    n += 1;
                }
                if n == 0 {
                    continue;
                }

                let d = depth.at(x, y);
                let n_f = n as f32;
                let dd = depth_sum as f32 / n_f - d as f32;
                if dd.abs() > self.params.threshold {
                    continue;
                }

                let m = self.mix[d as usize];
                let [r, g, b, a] = channels(own);
                let blend = |c: u8, s: u32| (c as f32 * m + s as f32 / n_f * (1.0 - m)) as u8;
                dst.pixels_mut()[i] = pack(blend(r, sum[0]), blend(g, sum[1]), blend(b, sum[2]), a);
            }
        }
    }
}
