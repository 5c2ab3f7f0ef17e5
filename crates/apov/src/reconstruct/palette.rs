//! Indexed-colour reconstruction through a colour lookup table.

use crate::raster::{Raster, ALPHA_OPAQUE};

pub const CLUT_COLOR_COUNT: usize = 256;

/// Entries actually stored in `clut.bin`; the rest of the table stays zero.
pub const CLUT_LOAD_COUNT: usize = 216;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clut {
    colors: [u32; CLUT_COLOR_COUNT],
}

impl Default for Clut {
    fn default() -> Self {
        Self {
            colors: [0; CLUT_COLOR_COUNT],
        }
    }
}

impl Clut {
    /// Fill the table from the front; extra colours are ignored.
    pub fn from_colors<I: IntoIterator<Item = u32>>(colors: I) -> Self {
        let mut clut = Self::default();
        for (slot, color) in clut.colors.iter_mut().zip(colors) {
            *slot = color;
        }
        clut
    }

    #[inline(always)]
    pub fn color(&self, index: u8) -> u32 {
        self.colors[index as usize]
    }
}

/// One index byte per raster pixel, looked up with full alpha.
pub fn reconstruct_palette(clut: &Clut, indices: &[u8], raster: &mut Raster) {
    for (dst, &index) in raster.pixels_mut().iter_mut().zip(indices) {
        *dst = clut.color(index) | ALPHA_OPAQUE;
    }
}
