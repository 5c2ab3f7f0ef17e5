//! Occupancy + colour-map reconstruction.
//!
//! Each window pixel owns one occupancy bit. Its colour comes from the coarse
//! colour map: either the anchor cell alone, or a three-tap blend of the anchor
//! with its nearest horizontal and vertical neighbour cells. The high byte of
//! the anchor word is the pixel's depth.

use crate::descriptor::Geometry;
use crate::raster::{DepthBuffer, Raster, ALPHA_OPAQUE};
use glam::{UVec2, Vec2};
use rayon::prelude::*;

/// Everything the per-frame loop needs to know about one window pixel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CachedPixel {
    /// Bit of the pixel inside its mask byte.
    pub mask: u8,
    pub mask_offset: u32,
    /// Map cell containing the pixel.
    pub anchor: u32,
    /// Offset from the anchor cell centre, in cells.
    pub sub_cell: Vec2,
    pub fa: f32,
    pub fb: f32,
    pub fc: f32,
    pub horizontal: Option<u32>,
    pub vertical: Option<u32>,
}

impl CachedPixel {
    fn new(geometry: &Geometry, x: u32, y: u32) -> Self {
        let i = geometry.idx(x, y);
        let scale = Vec2::new(geometry.map_scale_x as f32, geometry.map_scale_y as f32);
        let f = Vec2::new(x as f32, y as f32) / scale;
        let cell = f.floor();
        let u = UVec2::new(cell.x as u32, cell.y as u32);
        let sub_cell = f - cell - Vec2::splat(0.5);

        let map_width = geometry.map_width;
        let anchor = u.x + u.y * map_width;

        let horizontal = if sub_cell.x < 0.0 && u.x > 0 {
            Some(anchor - 1)
        } else if sub_cell.x >= 0.0 && u.x < map_width - 1 {
            Some(anchor + 1)
        } else {
            None
        };
        let vertical = if sub_cell.y < 0.0 && u.y > 0 {
            Some(anchor - map_width)
        } else if sub_cell.y >= 0.0 && u.y < geometry.map_height - 1 {
            Some(anchor + map_width)
        } else {
            None
        };

        let fb = sub_cell.x.abs();
        let fc = sub_cell.y.abs();

        Self {
            mask: 1 << (i % 8),
            mask_offset: (i / 8) as u32,
            anchor,
            sub_cell,
            fa: 1.0 - (fb + fc),
            fb,
            fc,
            horizontal,
            vertical,
        }
    }

    #[inline(always)]
    pub fn occupied(&self, mask: &[u8]) -> bool {
        mask[self.mask_offset as usize] & self.mask != 0
    }
}

/// Per-pixel lookup table, built once per geometry.
#[derive(Debug, Clone)]
pub struct PixelCache {
    pixels: Vec<CachedPixel>,
}

impl PixelCache {
    pub fn new(geometry: &Geometry) -> Self {
        let width = geometry.win_width as usize;
        let pixels = (0..geometry.win_pixels)
            .into_par_iter()
            .map(|i| CachedPixel::new(geometry, (i % width) as u32, (i / width) as u32))
            .collect();
        Self { pixels }
    }

    #[inline]
    pub fn get(&self, i: usize) -> &CachedPixel {
        &self.pixels[i]
    }

    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }
}

#[inline(always)]
fn channel(word: u32, shift: u32) -> f32 {
    ((word >> shift) & 0xFF) as f32
}

/// Colour channels of a map word; the high byte is depth.
const MAP_COLOR: u32 = 0x00FF_FFFF;

#[inline(always)]
fn map_depth(word: u32) -> u8 {
    (word >> 24) as u8
}

/// Channels stay within the range of their taps.
#[inline(always)]
fn blend(a: u32, b: u32, c: u32, p: &CachedPixel) -> u32 {
    let mix = |shift| {
        let (ca, cb, cc) = (channel(a, shift), channel(b, shift), channel(c, shift));
        let v = ca * p.fa + cb * p.fb + cc * p.fc;
        v.clamp(ca.min(cb).min(cc), ca.max(cb).max(cc)) as u32
    };
    mix(0) | mix(8) << 8 | mix(16) << 16 | ALPHA_OPAQUE
}

/// Three-tap blend of the anchor cell with its neighbours. Missing neighbours
/// contribute black and their weight is not redistributed.
pub fn reconstruct_bilinear(
    cache: &PixelCache,
    mask: &[u8],
    map: &[u32],
    raster: &mut Raster,
    depth: &mut DepthBuffer,
) {
    let out = raster.pixels_mut().iter_mut().zip(depth.as_mut_slice());
    for ((dst, z), p) in out.zip(&cache.pixels) {
        if !p.occupied(mask) {
            *dst = 0;
            *z = 0;
            continue;
        }
        let a = map[p.anchor as usize];
        let b = p.horizontal.map_or(0, |n| map[n as usize]);
        let c = p.vertical.map_or(0, |n| map[n as usize]);
        *dst = blend(a, b, c, p);
        *z = map_depth(a);
    }
}

/// Anchor cell colour only.
pub fn reconstruct_nearest(
    cache: &PixelCache,
    mask: &[u8],
    map: &[u32],
    raster: &mut Raster,
    depth: &mut DepthBuffer,
) {
    let out = raster.pixels_mut().iter_mut().zip(depth.as_mut_slice());
    for ((dst, z), p) in out.zip(&cache.pixels) {
        if !p.occupied(mask) {
            *dst = 0;
            *z = 0;
            continue;
        }
        let a = map[p.anchor as usize];
        *dst = (a & MAP_COLOR) | ALPHA_OPAQUE;
        *z = map_depth(a);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{Representation, VolumeDescriptor};
    use crate::raster::{channels, pack};

    fn geometry_of(space_block_size: u32, color_map_size: u32) -> Geometry {
        let descriptor = VolumeDescriptor {
            space_block_size,
            ray_step: 1,
            color_map_size,
            ..VolumeDescriptor::default()
        };
        Geometry::new(descriptor, Representation::OccupancyMap).unwrap()
    }

    /// 8x8 window over a 2x2 map, scale 4.
    fn geometry() -> Geometry {
        geometry_of(8, 2)
    }

    fn map_word(r: u8, g: u8, b: u8) -> u32 {
        (b as u32) << 16 | (g as u32) << 8 | r as u32
    }

    type Reconstruct = fn(&PixelCache, &[u8], &[u32], &mut Raster, &mut DepthBuffer);

    fn render_with_depth(
        g: &Geometry,
        mask: &[u8],
        map: &[u32],
        f: Reconstruct,
    ) -> (Raster, DepthBuffer) {
        let cache = PixelCache::new(g);
        let mut raster = Raster::new(g.win_width, g.win_height);
        let mut depth = DepthBuffer::new(g.win_width, g.win_height);
        f(&cache, mask, map, &mut raster, &mut depth);
        (raster, depth)
    }

    fn render(g: &Geometry, mask: &[u8], map: &[u32], f: Reconstruct) -> Raster {
        render_with_depth(g, mask, map, f).0
    }

    /// Every channel of a pixel with both neighbours lies within its taps.
    fn assert_blend_within_taps(g: &Geometry, map: &[u32]) {
        let cache = PixelCache::new(g);
        let raster = render(g, &vec![0xFF; g.mask_bytes()], map, reconstruct_bilinear);

        for (i, &px) in raster.pixels().iter().enumerate() {
            let out = channels(px);
            assert_eq!(out[3], 255);

            let p = cache.get(i);
            let (Some(h), Some(v)) = (p.horizontal, p.vertical) else {
                continue;
            };
            let taps = [map[p.anchor as usize], map[h as usize], map[v as usize]].map(channels);
            for c in 0..3 {
                let lo = taps.iter().map(|t| t[c]).min().unwrap();
                let hi = taps.iter().map(|t| t[c]).max().unwrap();
                assert!(out[c] >= lo && out[c] <= hi, "pixel {i} channel {c}: {}", out[c]);
            }
        }
    }

    #[test]
    fn weights_sum_to_one() {
        let g = geometry();
        let cache = PixelCache::new(&g);
        assert_eq!(cache.len(), g.win_pixels);

        for i in 0..cache.len() {
            let p = cache.get(i);
            assert!((p.fa + p.fb + p.fc - 1.0).abs() < 1e-6);
            assert!(p.fa >= 0.0 && p.fb <= 0.5 && p.fc <= 0.5);
        }
    }

    #[test]
    fn occupancy_bits_are_lsb_first() {
        let g = geometry();
        let cache = PixelCache::new(&g);
        let p = cache.get(g.idx(3, 1));
        assert_eq!((p.mask_offset, p.mask), (1, 1 << 3));
        assert_eq!(p.anchor, 0);
    }

    #[test]
    fn unset_bit_is_background() {
        let g = geometry();
        let map = vec![map_word(200, 200, 200); g.map_pixels];
        let raster = render(&g, &vec![0; g.mask_bytes()], &map, reconstruct_bilinear);
        assert!(raster.is_background());
    }

    #[test]
    fn edge_neighbour_contributes_black() {
        let g = geometry();
        let map = vec![map_word(200, 100, 50); g.map_pixels];
        let mask = vec![0xFF; g.mask_bytes()];

        // x = 0 sits half a cell left of the anchor centre with no left cell.
        let p = *PixelCache::new(&g).get(g.idx(0, 2));
        assert_eq!(p.horizontal, None);
        assert_eq!(p.vertical, Some(p.anchor + g.map_width));
        assert_eq!((p.fb, p.fc), (0.5, 0.0));

        let raster = render(&g, &mask, &map, reconstruct_bilinear);
        assert_eq!(raster.get(0, 2), Some(pack(100, 50, 25, 255)));
    }

    #[test]
    fn interior_blend_stays_in_channel_range() {
        let g = geometry();
        let map = vec![
            map_word(255, 0, 255),
            map_word(255, 255, 0),
            map_word(0, 255, 255),
            map_word(255, 255, 255),
        ];
        assert_blend_within_taps(&g, &map);

        // Exactly at a cell centre only the anchor contributes.
        let raster = render(&g, &vec![0xFF; g.mask_bytes()], &map, reconstruct_bilinear);
        assert_eq!(raster.get(6, 6), Some(pack(255, 255, 255, 255)));
    }

    #[test]
    fn uniform_map_survives_an_odd_scale() {
        // 240 / 16 puts the weights on fifteenths, which f32 cannot represent.
        let g = geometry_of(240, 16);
        assert_eq!(g.map_scale_x, 15);
        let map = vec![0x00FF_FFFF; g.map_pixels];
        assert_blend_within_taps(&g, &map);

        let cache = PixelCache::new(&g);
        let raster = render(&g, &vec![0xFF; g.mask_bytes()], &map, reconstruct_bilinear);
        for (i, &px) in raster.pixels().iter().enumerate() {
            let p = cache.get(i);
            if p.horizontal.is_some() && p.vertical.is_some() {
                assert_eq!(px, pack(255, 255, 255, 255), "pixel {i}");
            }
        }
    }

    #[test]
    fn map_high_byte_is_depth_not_colour() {
        let g = geometry();
        let map = vec![
            0x40 << 24 | map_word(10, 20, 30),
            0x80 << 24 | map_word(40, 50, 60),
            0xC0 << 24 | map_word(70, 80, 90),
            0xFF << 24 | map_word(100, 110, 120),
        ];
        let mut mask = vec![0xFF; g.mask_bytes()];
        mask[g.idx(0, 7) / 8] &= !(1 << (g.idx(0, 7) % 8));

        for f in [reconstruct_bilinear as Reconstruct, reconstruct_nearest] {
            let (raster, depth) = render_with_depth(&g, &mask, &map, f);
            assert_eq!(depth.at(2, 2), 0x40);
            assert_eq!(depth.at(5, 1), 0x80);
            assert_eq!(depth.at(1, 5), 0xC0);
            assert_eq!(depth.at(6, 6), 0xFF);
            assert_eq!(depth.at(0, 7), 0);
            assert_eq!(raster.get(0, 7), Some(0));
            assert_eq!(raster.get(6, 6), Some(pack(100, 110, 120, 255)));
        }
    }

    #[test]
    fn nearest_takes_the_anchor_cell() {
        let g = geometry();
        let map = vec![map_word(1, 2, 3), map_word(4, 5, 6), map_word(7, 8, 9), 0];
        let mut mask = vec![0; g.mask_bytes()];
        mask[g.idx(5, 1) / 8] |= 1 << (g.idx(5, 1) % 8);

        let raster = render(&g, &mask, &map, reconstruct_nearest);
        assert_eq!(raster.get(5, 1), Some(pack(4, 5, 6, 255)));
        assert_eq!(raster.get(1, 1), Some(0));
    }
}
