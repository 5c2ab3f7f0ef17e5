//! Volume descriptor and the window/map geometry derived from it.

use crate::format::HEADER_BYTES;
use thiserror::Error;

/// Layout parameters of a dataset, loaded once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeDescriptor {
    /// Edge length of one cubic view block, in voxels.
    pub space_block_size: u32,
    pub horizontal_pov_count: u32,
    pub vertical_pov_count: u32,
    /// Depth sampling stride between two consecutive frames.
    pub ray_step: u32,
    pub width_block_count: u32,
    pub depth_block_count: u32,
    /// Edge length of the colour map of one block (occupancy datasets only).
    pub color_map_size: u32,
}

impl Default for VolumeDescriptor {
    fn default() -> Self {
        Self {
            space_block_size: 256,
            horizontal_pov_count: 4,
            vertical_pov_count: 1,
            ray_step: 8,
            width_block_count: 1,
            depth_block_count: 1,
            color_map_size: 64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptorError {
    #[error("{0} must be > 0")]
    Zero(&'static str),

    #[error("ray_step {ray_step} leaves no depth frame in a {span} voxel deep volume")]
    NoDepthFrames { ray_step: u32, span: u64 },

    #[error("window of {0} pixels does not pack into whole occupancy bytes")]
    MaskNotByteAligned(u64),

    #[error("colour map {map_width}x{map_height} does not evenly divide window {win_width}x{win_height}")]
    MapScale {
        map_width: u32,
        map_height: u32,
        win_width: u32,
        win_height: u32,
    },

    #[error("descriptor overflows addressable sizes")]
    Overflow,
}

/// Which sample-block encoding a dataset carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Representation {
    /// Packed colour + depth words, splatted with perspective.
    Rgbd,
    /// One occupancy bit per pixel plus a coarse colour map.
    OccupancyMap,
    /// One palette index per pixel.
    Indexed,
}

impl Representation {
    /// Bytes skipped before the payload region.
    pub fn header_bytes(self) -> u64 {
        match self {
            Representation::Rgbd | Representation::OccupancyMap => HEADER_BYTES,
            Representation::Indexed => 0,
        }
    }
}

/// Quantities derived once from a [`VolumeDescriptor`]; never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Geometry {
    pub descriptor: VolumeDescriptor,
    pub representation: Representation,
    pub win_width: u32,
    pub win_height: u32,
    pub win_pixels: usize,
    /// Number of frames along the move axis.
    pub depth_frame_count: u32,
    /// Number of (hrotate, vrotate) blocks.
    pub pov_count: u32,
    pub map_width: u32,
    pub map_height: u32,
    pub map_scale_x: u32,
    pub map_scale_y: u32,
    pub map_pixels: usize,
}

impl Geometry {
    pub fn new(
        descriptor: VolumeDescriptor,
        representation: Representation,
    ) -> Result<Self, DescriptorError> {
        let d = &descriptor;
        for (name, value) in [
            ("space_block_size", d.space_block_size),
            ("horizontal_pov_count", d.horizontal_pov_count),
            ("vertical_pov_count", d.vertical_pov_count),
            ("ray_step", d.ray_step),
            ("width_block_count", d.width_block_count),
            ("depth_block_count", d.depth_block_count),
        ] {
            if value == 0 {
                return Err(DescriptorError::Zero(name));
            }
        }

        let win_width = d
            .space_block_size
            .checked_mul(d.width_block_count)
            .ok_or(DescriptorError::Overflow)?;
        let win_height = d.space_block_size;
        let win_pixels_u64 = win_width as u64 * win_height as u64;

        // Centred projection coordinates and pose axes are handled as i32.
        if win_width > i32::MAX as u32 || win_pixels_u64 > u32::MAX as u64 {
            return Err(DescriptorError::Overflow);
        }

        let span = d.space_block_size as u64 * d.depth_block_count as u64;
        let depth_frame_count = span / d.ray_step as u64;
        if depth_frame_count == 0 {
            return Err(DescriptorError::NoDepthFrames {
                ray_step: d.ray_step,
                span,
            });
        }

        let pov_count = d
            .horizontal_pov_count
            .checked_mul(d.vertical_pov_count)
            .ok_or(DescriptorError::Overflow)?;
        if depth_frame_count > i32::MAX as u64 || pov_count > i32::MAX as u32 {
            return Err(DescriptorError::Overflow);
        }

        let (mut map_width, mut map_height, mut map_scale_x, mut map_scale_y) = (0, 0, 0, 0);
        if representation == Representation::OccupancyMap {
            if win_pixels_u64 % 8 != 0 {
                return Err(DescriptorError::MaskNotByteAligned(win_pixels_u64));
            }
            if d.color_map_size == 0 {
                return Err(DescriptorError::Zero("color_map_size"));
            }

            map_width = d
                .color_map_size
                .checked_mul(d.width_block_count)
                .ok_or(DescriptorError::Overflow)?;
            map_height = d.color_map_size;

            if map_width > win_width
                || map_height > win_height
                || win_width % map_width != 0
                || win_height % map_height != 0
            {
                return Err(DescriptorError::MapScale {
                    map_width,
                    map_height,
                    win_width,
                    win_height,
                });
            }

            map_scale_x = win_width / map_width;
            map_scale_y = win_height / map_height;
        }

        let geometry = Self {
            descriptor,
            representation,
            win_width,
            win_height,
            win_pixels: win_pixels_u64 as usize,
            depth_frame_count: depth_frame_count as u32,
            pov_count,
            map_width,
            map_height,
            map_scale_x,
            map_scale_y,
            map_pixels: map_width as usize * map_height as usize,
        };

        geometry
            .frame_bytes()
            .checked_mul(geometry.frame_count())
            .and_then(|payload| payload.checked_add(representation.header_bytes()))
            .ok_or(DescriptorError::Overflow)?;

        Ok(geometry)
    }

    /// Like [`Geometry::new`], but an unusable descriptor falls back to the defaults.
    pub fn new_or_default(descriptor: VolumeDescriptor, representation: Representation) -> Self {
        match Self::new(descriptor, representation) {
            Ok(geometry) => geometry,
            Err(err) => {
                log::warn!(
                    "Unusable volume descriptor {:?} ({}); using defaults.",
                    descriptor,
                    err
                );
                Self::new(VolumeDescriptor::default(), representation)
                    .expect("default descriptor is valid for every representation")
            }
        }
    }

    /// Row-major index of window pixel `(x, y)`.
    #[inline(always)]
    pub fn idx(&self, x: u32, y: u32) -> usize {
        x as usize + y as usize * self.win_width as usize
    }

    #[inline]
    pub fn mask_bytes(&self) -> usize {
        self.win_pixels / 8
    }

    /// Byte section of a frame: occupancy mask or palette indices.
    pub fn head_len(&self) -> usize {
        match self.representation {
            Representation::Rgbd => 0,
            Representation::OccupancyMap => self.mask_bytes(),
            Representation::Indexed => self.win_pixels,
        }
    }

    /// Word section of a frame: RGBD samples or colour map cells.
    pub fn word_len(&self) -> usize {
        match self.representation {
            Representation::Rgbd => self.win_pixels,
            Representation::OccupancyMap => self.map_pixels,
            Representation::Indexed => 0,
        }
    }

    /// Bytes of one stored frame.
    pub fn frame_bytes(&self) -> u64 {
        self.head_len() as u64 + 4 * self.word_len() as u64
    }

    /// Total frames stored in the dataset.
    pub fn frame_count(&self) -> u64 {
        self.pov_count as u64 * self.depth_frame_count as u64
    }

    pub fn payload_bytes(&self) -> u64 {
        self.frame_count() * self.frame_bytes()
    }

    /// Expected file size, header included.
    pub fn dataset_bytes(&self) -> u64 {
        self.representation.header_bytes() + self.payload_bytes()
    }
}
