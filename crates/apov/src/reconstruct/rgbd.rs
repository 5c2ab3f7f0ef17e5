//! RGBD reconstruction: depth-buffered perspective splatting and the
//! orthographic direct unpack.

use crate::descriptor::Geometry;
use crate::raster::{rgbd_color, rgbd_depth, DepthBuffer, Raster};
use glam::IVec2;
use rayon::prelude::*;

/// Perspective tables derived once from the window size and projection depth.
#[derive(Debug, Clone)]
pub struct ProjectionTables {
    /// Perspective scale per depth byte: `1 - d / max_projection_depth`.
    scale: [f32; 256],
    /// Window coordinates relative to the centre, row-major.
    centered: Vec<IVec2>,
    half: IVec2,
}

impl ProjectionTables {
    pub fn new(geometry: &Geometry, max_projection_depth: f32) -> Self {
        let factor = 1.0 / max_projection_depth;
        let mut scale = [0.0f32; 256];
        for (d, s) in scale.iter_mut().enumerate() {
            *s = 1.0 - d as f32 * factor;
        }

        let width = geometry.win_width as i32;
        let half = IVec2::new(width / 2, geometry.win_height as i32 / 2);
        let centered = (0..geometry.win_pixels)
            .into_par_iter()
            .map(|i| {
                let i = i as i32;
                IVec2::new(i % width, i / width) - half
            })
            .collect();

        Self {
            scale,
            centered,
            half,
        }
    }

    #[inline]
    pub fn scale(&self, depth: u8) -> f32 {
        self.scale[depth as usize]
    }

    /// Scaled centred position of a sample, or `None` when it falls outside the window.
    #[inline(always)]
    fn project(&self, i: usize, depth: u8) -> Option<IVec2> {
        let s = self.scale[depth as usize];
        let c = self.centered[i];
        // `as` truncates toward zero.
        let p = IVec2::new((c.x as f32 * s) as i32, (c.y as f32 * s) as i32);

        let inside = p.x >= -self.half.x && p.x < self.half.x && p.y >= -self.half.y && p.y < self.half.y;
        inside.then(|| p + self.half)
    }
}

/// Splat every non-zero sample towards the centre by its depth scale.
///
/// Samples are visited in descending x, then descending y. A destination is
/// written when it is still background or holds a strictly farther sample, so
/// on equal depth the sample visited first stays.
pub fn project(
    tables: &ProjectionTables,
    geometry: &Geometry,
    words: &[u32],
    raster: &mut Raster,
    depth: &mut DepthBuffer,
) {
    let zpos = depth.as_mut_slice();
    for x in (0..geometry.win_width).rev() {
        for y in (0..geometry.win_height).rev() {
            let i = geometry.idx(x, y);
            let word = words[i];
            if word == 0 {
                continue;
            }

            let d = rgbd_depth(word);
            let Some(p) = tables.project(i, d) else {
                continue;
            };

            let dst = raster.idx(p.x as u32, p.y as u32);
            let px = &mut raster.pixels_mut()[dst];
            if *px == 0 || zpos[dst] > d {
                *px = rgbd_color(word);
                zpos[dst] = d;
            }
        }
    }
}

/// Orthographic unpack: colour in place, depth byte into the depth buffer.
pub fn unpack_direct(words: &[u32], raster: &mut Raster, depth: &mut DepthBuffer) {
    let pixels = raster.pixels_mut();
    let zpos = depth.as_mut_slice();
    for (i, &word) in words.iter().enumerate() {
        if word != 0 {
            pixels[i] = rgbd_color(word);
            zpos[i] = rgbd_depth(word);
        }
    }
}
