//! Pose navigation and dataset addressing.

use crate::descriptor::{Geometry, Representation};

/// Discrete view selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Pose {
    /// Depth slice along the move axis.
    pub slice: i32,
    pub hrotate: i32,
    pub vrotate: i32,
}

impl Pose {
    pub const fn new(slice: i32, hrotate: i32, vrotate: i32) -> Self {
        Self {
            slice,
            hrotate,
            vrotate,
        }
    }
}

/// Holds the current pose and applies clamp/wrap to every update.
#[derive(Debug, Clone, Copy)]
pub struct PoseNavigator {
    pose: Pose,
    slice_count: i32,
    hpov_count: i32,
    vpov_count: i32,
}

impl PoseNavigator {
    pub fn new(geometry: &Geometry) -> Self {
        // Geometry guarantees every count is in 1..=i32::MAX.
        Self {
            pose: Pose::default(),
            slice_count: geometry.depth_frame_count as i32,
            hpov_count: geometry.descriptor.horizontal_pov_count as i32,
            vpov_count: geometry.descriptor.vertical_pov_count as i32,
        }
    }

    #[inline]
    pub fn pose(&self) -> Pose {
        self.pose
    }

    /// Apply deltas to the current pose and return the resolved pose.
    pub fn advance(&mut self, d_slice: i32, d_hrotate: i32, d_vrotate: i32) -> Pose {
        let moved = Pose {
            slice: self.pose.slice.saturating_add(d_slice),
            hrotate: self.pose.hrotate.saturating_add(d_hrotate),
            vrotate: self.pose.vrotate.saturating_add(d_vrotate),
        };
        self.pose = self.resolve(moved);
        self.pose
    }

    /// Clamp the slice and wrap both rotations. Total over all inputs.
    pub fn resolve(&self, pose: Pose) -> Pose {
        Pose {
            slice: pose.slice.clamp(0, self.slice_count - 1),
            hrotate: pose.hrotate.rem_euclid(self.hpov_count),
            vrotate: pose.vrotate.rem_euclid(self.vpov_count),
        }
    }
}

/// How occupancy masks and colour maps are arranged in the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamLayout {
    /// Each frame stores its mask immediately followed by its map.
    #[default]
    Interleaved,
    /// Every mask frame first, then every map frame, same frame order.
    Split,
}

/// Byte position of a frame relative to the end of the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Offset {
    Single(u64),
    Split { mask: u64, map: u64 },
}

/// Pure pose → offset mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Addressing {
    layout: StreamLayout,
    frame_stride: u64,
    depth_frame_count: u64,
    vpov_count: u64,
    mask_bytes: u64,
    map_bytes: u64,
    mask_region: u64,
}

impl Addressing {
    pub fn new(geometry: &Geometry, layout: StreamLayout) -> Self {
        let layout = if layout == StreamLayout::Split
            && geometry.representation != Representation::OccupancyMap
        {
            log::warn!(
                "Split stream layout only applies to occupancy datasets; using interleaved."
            );
            StreamLayout::Interleaved
        } else {
            layout
        };

        let mask_bytes = geometry.head_len() as u64;
        Self {
            layout,
            frame_stride: geometry.frame_bytes(),
            depth_frame_count: geometry.depth_frame_count as u64,
            vpov_count: geometry.descriptor.vertical_pov_count as u64,
            mask_bytes,
            map_bytes: 4 * geometry.word_len() as u64,
            mask_region: mask_bytes * geometry.frame_count(),
        }
    }

    #[inline]
    pub fn layout(&self) -> StreamLayout {
        self.layout
    }

    /// Bytes between two consecutive slices of one pov block.
    #[inline]
    pub fn frame_stride(&self) -> u64 {
        self.frame_stride
    }

    /// Bytes between two consecutive pov blocks.
    #[inline]
    pub fn pov_stride(&self) -> u64 {
        self.frame_stride * self.depth_frame_count
    }

    /// Linear position of a resolved pose among all stored frames.
    #[inline]
    pub fn frame_ordinal(&self, pose: Pose) -> u64 {
        let pov = pose.hrotate as u64 * self.vpov_count + pose.vrotate as u64;
        pov * self.depth_frame_count + pose.slice as u64
    }

    pub fn offset_of_frame(&self, ordinal: u64) -> Offset {
        match self.layout {
            StreamLayout::Interleaved => Offset::Single(self.frame_stride * ordinal),
            StreamLayout::Split => Offset::Split {
                mask: self.mask_bytes * ordinal,
                map: self.mask_region + self.map_bytes * ordinal,
            },
        }
    }

    /// Offset of a pose already resolved by a [`PoseNavigator`].
    pub fn offset_of(&self, pose: Pose) -> Offset {
        self.offset_of_frame(self.frame_ordinal(pose))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::VolumeDescriptor;

    fn scenario(representation: Representation) -> Geometry {
        let descriptor = VolumeDescriptor {
            space_block_size: 256,
            horizontal_pov_count: 4,
            vertical_pov_count: 1,
            ray_step: 8,
            width_block_count: 1,
            depth_block_count: 1,
            color_map_size: 64,
        };
        Geometry::new(descriptor, representation).unwrap()
    }

    #[test]
    fn clamps_below_the_first_slice() {
        let g = scenario(Representation::Rgbd);
        let mut nav = PoseNavigator::new(&g);
        let addr = Addressing::new(&g, StreamLayout::Interleaved);

        let pose = nav.advance(-1, 0, 0);
        assert_eq!(pose, Pose::new(0, 0, 0));
        assert_eq!(addr.offset_of(pose), Offset::Single(0));
        assert_eq!((g.win_width, g.win_height), (256, 256));
    }

    #[test]
    fn clamp_is_idempotent_at_both_ends() {
        let g = scenario(Representation::Rgbd);
        let mut nav = PoseNavigator::new(&g);

        let once = nav.advance(-1, 0, 0);
        for _ in 0..10 {
            assert_eq!(nav.advance(-1, 0, 0), once);
        }

        let top = nav.advance(1000, 0, 0);
        assert_eq!(top.slice, 31);
        assert_eq!(nav.advance(1, 0, 0), top);
        assert_eq!(nav.advance(i32::MAX, 0, 0), top);
    }

    #[test]
    fn wraps_rotation_below_zero() {
        let g = scenario(Representation::Rgbd);
        let mut nav = PoseNavigator::new(&g);
        let addr = Addressing::new(&g, StreamLayout::Interleaved);

        let pose = nav.advance(5, -1, 0);
        assert_eq!(pose, Pose::new(5, 3, 0));
        assert_eq!(
            addr.offset_of(pose),
            Offset::Single(addr.frame_stride() * 5 + addr.pov_stride() * 3)
        );

        assert_eq!(nav.advance(0, 1, 0).hrotate, 0);
    }

    #[test]
    fn single_pov_axis_always_resolves_to_zero() {
        let g = scenario(Representation::Rgbd);
        let mut nav = PoseNavigator::new(&g);

        for delta in [-1, 1, 7, i32::MIN, i32::MAX] {
            assert_eq!(nav.advance(0, 0, delta).vrotate, 0);
        }
    }

    #[test]
    fn reachable_offsets_stay_inside_the_payload() {
        for representation in [
            Representation::Rgbd,
            Representation::OccupancyMap,
            Representation::Indexed,
        ] {
            let mut descriptor = scenario(representation).descriptor;
            descriptor.vertical_pov_count = 3;
            let g = Geometry::new(descriptor, representation).unwrap();
            let mut nav = PoseNavigator::new(&g);
            let layouts: &[StreamLayout] = if representation == Representation::OccupancyMap {
                &[StreamLayout::Interleaved, StreamLayout::Split]
            } else {
                &[StreamLayout::Interleaved]
            };

            let deltas = [(1, 0, 0), (40, 1, -1), (-3, -5, 2), (-100, 9, 4), (7, -1, -1)];
            for step in 0..200 {
                let (dm, dh, dv) = deltas[step % deltas.len()];
                let pose = nav.advance(dm, dh, dv);

                for &layout in layouts {
                    let addr = Addressing::new(&g, layout);
                    match addr.offset_of(pose) {
                        Offset::Single(at) => {
                            assert!(at + g.frame_bytes() <= g.payload_bytes());
                        }
                        Offset::Split { mask, map } => {
                            assert!(mask + g.head_len() as u64 <= g.head_len() as u64 * g.frame_count());
                            assert!(map + 4 * g.word_len() as u64 <= g.payload_bytes());
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn split_layout_places_maps_after_every_mask() {
        let g = scenario(Representation::OccupancyMap);
        let addr = Addressing::new(&g, StreamLayout::Split);
        let mask_region = g.head_len() as u64 * g.frame_count();

        assert_eq!(
            addr.offset_of(Pose::new(0, 0, 0)),
            Offset::Split {
                mask: 0,
                map: mask_region
            }
        );
        assert_eq!(
            addr.offset_of(Pose::new(2, 1, 0)),
            Offset::Split {
                mask: g.head_len() as u64 * 34,
                map: mask_region + 4 * g.word_len() as u64 * 34
            }
        );
    }

    #[test]
    fn split_layout_is_ignored_without_an_occupancy_stream() {
        let g = scenario(Representation::Rgbd);
        assert_eq!(
            Addressing::new(&g, StreamLayout::Split).layout(),
            StreamLayout::Interleaved
        );
    }
}
