//! Output raster, scratch depth buffer and pixel packing helpers.
//!
//! Raster pixels are `A<<24 | B<<16 | G<<8 | R`, so a little-endian buffer
//! reads as RGBA bytes. Zero is background.

pub const ALPHA_OPAQUE: u32 = 0xFF00_0000;

/// Unpack the colour of an RGBD word (`R<<24 | G<<16 | B<<8 | depth`) with full alpha.
#[inline(always)]
pub fn rgbd_color(word: u32) -> u32 {
    ALPHA_OPAQUE | (word >> 24) | ((word >> 8) & 0x0000_FF00) | ((word << 8) & 0x00FF_0000)
}

#[inline(always)]
pub fn rgbd_depth(word: u32) -> u8 {
    (word & 0xFF) as u8
}

/// Split a raster pixel into `[r, g, b, a]`.
#[inline(always)]
pub fn channels(pixel: u32) -> [u8; 4] {
    pixel.to_le_bytes()
}

#[inline(always)]
pub fn pack(r: u8, g: u8, b: u8, a: u8) -> u32 {
    u32::from_le_bytes([r, g, b, a])
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    width: u32,
    height: u32,
    pixels: Vec<u32>,
}

impl Raster {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize],
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Pixels per row in memory.
    #[inline]
    pub fn stride(&self) -> u32 {
        self.width
    }

    #[inline(always)]
    pub fn idx(&self, x: u32, y: u32) -> usize {
        x as usize + y as usize * self.stride() as usize
    }

    #[inline]
    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    #[inline]
    pub fn pixels_mut(&mut self) -> &mut [u32] {
        &mut self.pixels
    }

    pub fn get(&self, x: u32, y: u32) -> Option<u32> {
        if x < self.width && y < self.height {
            Some(self.pixels[self.idx(x, y)])
        } else {
            None
        }
    }

    pub fn clear(&mut self) {
        self.pixels.fill(0);
    }

    pub fn copy_from(&mut self, other: &Raster) {
        debug_assert_eq!((self.width, self.height), (other.width, other.height));
        self.pixels.copy_from_slice(&other.pixels);
    }

    pub fn is_background(&self) -> bool {
        self.pixels.iter().all(|&p| p == 0)
    }

    /// Tightly packed RGBA8 bytes, row by row.
    pub fn to_rgba8(&self) -> Vec<u8> {
        if cfg!(target_endian = "little") {
            bytemuck::cast_slice::<u32, u8>(&self.pixels).to_vec()
        } else {
            self.pixels.iter().flat_map(|p| p.to_le_bytes()).collect()
        }
    }
}

/// Per-pixel depth written during one reconstruction pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepthBuffer {
    width: u32,
    depth: Vec<u8>,
}

impl DepthBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            depth: vec![0; width as usize * height as usize],
        }
    }

    pub fn reset(&mut self) {
        self.depth.fill(0);
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.depth
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.depth
    }

    #[inline(always)]
    pub fn at(&self, x: u32, y: u32) -> u8 {
        self.depth[x as usize + y as usize * self.width as usize]
    }

    pub fn is_empty(&self) -> bool {
        self.depth.iter().all(|&d| d == 0)
    }
}
