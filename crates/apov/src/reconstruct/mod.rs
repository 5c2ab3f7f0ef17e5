//! Reconstruction engine: turns a cached frame into the output raster.

pub mod density_map;
pub mod palette;
pub mod rgbd;

use crate::cache::Frame;
use crate::descriptor::{Geometry, Representation};
use crate::dof::{DofFilter, DofParams};
use crate::raster::{DepthBuffer, Raster};
use density_map::PixelCache;
use palette::Clut;
use rgbd::ProjectionTables;

pub const DEFAULT_MAX_PROJECTION_DEPTH: f32 = 300.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderMode {
    /// RGBD, depth-buffered perspective splatting.
    Projection,
    /// RGBD, orthographic unpack.
    Direct,
    /// Occupancy + map, three-tap colour blend.
    MapBilinear,
    /// Occupancy + map, anchor cell only.
    MapNearest,
    /// Indexed, CLUT lookup.
    Palette,
}

impl RenderMode {
    pub fn default_for(representation: Representation) -> Self {
        match representation {
            Representation::Rgbd => RenderMode::Projection,
            Representation::OccupancyMap => RenderMode::MapBilinear,
            Representation::Indexed => RenderMode::Palette,
        }
    }

    pub fn representation(self) -> Representation {
        match self {
            RenderMode::Projection | RenderMode::Direct => Representation::Rgbd,
            RenderMode::MapBilinear | RenderMode::MapNearest => Representation::OccupancyMap,
            RenderMode::Palette => Representation::Indexed,
        }
    }

    /// The other mode of the same representation, if there is one.
    pub fn toggled(self) -> Self {
        match self {
            RenderMode::Projection => RenderMode::Direct,
            RenderMode::Direct => RenderMode::Projection,
            RenderMode::MapBilinear => RenderMode::MapNearest,
            RenderMode::MapNearest => RenderMode::MapBilinear,
            RenderMode::Palette => RenderMode::Palette,
        }
    }

    /// Modes whose reconstruction leaves per-pixel depth in place for the
    /// depth-of-field filter. Projection moves samples off their source pixel
    /// and palette frames carry no depth.
    pub fn keeps_depth(self) -> bool {
        matches!(
            self,
            RenderMode::Direct | RenderMode::MapBilinear | RenderMode::MapNearest
        )
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Starting mode; `None` picks the representation's default.
    pub mode: Option<RenderMode>,
    pub max_projection_depth: f32,
    pub dof: DofParams,
    pub clut: Clut,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mode: None,
            max_projection_depth: DEFAULT_MAX_PROJECTION_DEPTH,
            dof: DofParams::default(),
            clut: Clut::default(),
        }
    }
}

/// Owns every per-frame buffer and the tables precomputed for one geometry.
pub struct Engine {
    geometry: Geometry,
    mode: RenderMode,
    projection: Option<ProjectionTables>,
    pixel_cache: Option<PixelCache>,
    clut: Clut,
    dof: DofFilter,
    raster: Raster,
    scratch: Raster,
    depth: DepthBuffer,
}

impl Engine {
    pub fn new(geometry: Geometry, config: EngineConfig) -> Self {
        let representation = geometry.representation;

        let mode = match config.mode {
            Some(mode) if mode.representation() == representation => mode,
            Some(mode) => {
                let fallback = RenderMode::default_for(representation);
                log::warn!(
                    "Render mode {:?} does not apply to {:?} data; using {:?}.",
                    mode,
                    representation,
                    fallback
                );
                fallback
            }
            None => RenderMode::default_for(representation),
        };

        let mut max_projection_depth = config.max_projection_depth;
        if !(max_projection_depth.is_finite() && max_projection_depth > 0.0) {
            log::warn!(
                "Invalid max projection depth {}; using {}.",
                max_projection_depth,
                DEFAULT_MAX_PROJECTION_DEPTH
            );
            max_projection_depth = DEFAULT_MAX_PROJECTION_DEPTH;
        }

        let mut dof = config.dof;
        if !(dof.max_depth.is_finite() && dof.max_depth > 0.0) || !(dof.threshold >= 0.0) {
            log::warn!("Invalid depth-of-field parameters {:?}; using defaults.", dof);
            dof = DofParams::default();
        }

        let projection = (representation == Representation::Rgbd)
            .then(|| ProjectionTables::new(&geometry, max_projection_depth));
        let pixel_cache =
            (representation == Representation::OccupancyMap).then(|| PixelCache::new(&geometry));

        log::debug!(
            "Engine ready: {}x{} {:?}, mode {:?}.",
            geometry.win_width,
            geometry.win_height,
            representation,
            mode
        );

        let (w, h) = (geometry.win_width, geometry.win_height);
        Self {
            geometry,
            mode,
            projection,
            pixel_cache,
            clut: config.clut,
            dof: DofFilter::new(dof),
            raster: Raster::new(w, h),
            scratch: Raster::new(w, h),
            depth: DepthBuffer::new(w, h),
        }
    }

    #[inline]
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    #[inline]
    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    /// Switch mode; rejected when it belongs to another representation.
    pub fn set_mode(&mut self, mode: RenderMode) -> bool {
        if mode.representation() != self.geometry.representation {
            log::warn!("Ignoring render mode {:?} for {:?} data.", mode, self.geometry.representation);
            return false;
        }
        self.mode = mode;
        true
    }

    pub fn toggle_mode(&mut self) -> RenderMode {
        self.mode = self.mode.toggled();
        self.mode
    }

    /// Rebuild the raster and depth buffer from `frame`.
    pub fn reconstruct(&mut self, frame: &Frame) {
        self.raster.clear();
        self.depth.reset();

        match self.mode {
            RenderMode::Projection => {
                if let Some(tables) = &self.projection {
                    rgbd::project(
                        tables,
                        &self.geometry,
                        frame.words(),
                        &mut self.raster,
                        &mut self.depth,
                    );
                }
            }
            RenderMode::Direct => {
                rgbd::unpack_direct(frame.words(), &mut self.raster, &mut self.depth);
            }
            RenderMode::MapBilinear => {
                if let Some(cache) = &self.pixel_cache {
                    density_map::reconstruct_bilinear(
                        cache,
                        frame.bytes(),
                        frame.words(),
                        &mut self.raster,
                        &mut self.depth,
                    );
                }
            }
            RenderMode::MapNearest => {
                if let Some(cache) = &self.pixel_cache {
                    density_map::reconstruct_nearest(
                        cache,
                        frame.bytes(),
                        frame.words(),
                        &mut self.raster,
                        &mut self.depth,
                    );
                }
            }
            RenderMode::Palette => {
                palette::reconstruct_palette(&self.clut, frame.bytes(), &mut self.raster);
            }
        }
    }

    /// Produce the presentable raster from the last reconstruction.
    pub fn post_process(&mut self, dof_enabled: bool) -> &Raster {
        if dof_enabled && self.mode.keeps_depth() {
            self.dof.apply(&self.raster, &self.depth, &mut self.scratch);
        } else {
            self.scratch.copy_from(&self.raster);
        }
        &self.scratch
    }

    pub fn render(&mut self, frame: &Frame, dof_enabled: bool) -> &Raster {
        self.reconstruct(frame);
        self.post_process(dof_enabled)
    }

    /// Reconstruction output before post-processing.
    #[inline]
    pub fn raster(&self) -> &Raster {
        &self.raster
    }

    /// Last presentable raster.
    #[inline]
    pub fn scratch(&self) -> &Raster {
        &self.scratch
    }

    #[inline]
    pub fn depth_buffer(&self) -> &DepthBuffer {
        &self.depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::VolumeDescriptor;
    use crate::raster::pack;

    fn geometry(representation: Representation) -> Geometry {
        let descriptor = VolumeDescriptor {
            space_block_size: 8,
            ray_step: 1,
            color_map_size: 2,
            ..VolumeDescriptor::default()
        };
        Geometry::new(descriptor, representation).unwrap()
    }

    #[test]
    fn modes_toggle_within_their_representation() {
        for mode in [
            RenderMode::Projection,
            RenderMode::Direct,
            RenderMode::MapBilinear,
            RenderMode::MapNearest,
            RenderMode::Palette,
        ] {
            assert_eq!(mode.toggled().representation(), mode.representation());
            assert_eq!(mode.toggled().toggled(), mode);
        }
    }

    #[test]
    fn mismatched_mode_falls_back() {
        let engine = Engine::new(
            geometry(Representation::Indexed),
            EngineConfig {
                mode: Some(RenderMode::Direct),
                ..EngineConfig::default()
            },
        );
        assert_eq!(engine.mode(), RenderMode::Palette);
    }

    #[test]
    fn set_mode_rejects_other_representations() {
        let mut engine = Engine::new(geometry(Representation::Rgbd), EngineConfig::default());
        assert!(!engine.set_mode(RenderMode::MapNearest));
        assert!(engine.set_mode(RenderMode::Direct));
        assert_eq!(engine.toggle_mode(), RenderMode::Projection);
    }

    #[test]
    fn all_zero_rgbd_frame_renders_transparent() {
        let g = geometry(Representation::Rgbd);
        let mut engine = Engine::new(g.clone(), EngineConfig::default());

        let raster = engine.render(&Frame::new(&g), true);
        assert!(raster.is_background());
        assert!(engine.depth_buffer().is_empty());
    }

    #[test]
    fn reconstruct_clears_the_previous_frame() {
        let g = geometry(Representation::Rgbd);
        let mut engine = Engine::new(
            g.clone(),
            EngineConfig {
                mode: Some(RenderMode::Direct),
                ..EngineConfig::default()
            },
        );

        let mut words = vec![0; g.win_pixels];
        words[g.idx(1, 1)] = 0x0A0B0C10;
        engine.render(&Frame::from_parts(Vec::new(), words), false);
        assert_eq!(engine.scratch().get(1, 1), Some(pack(0x0A, 0x0B, 0x0C, 255)));
        assert_eq!(engine.depth_buffer().at(1, 1), 0x10);

        engine.render(&Frame::new(&g), false);
        assert!(engine.scratch().is_background());
        assert!(engine.depth_buffer().is_empty());
    }

    #[test]
    fn projection_output_skips_the_filter() {
        let g = geometry(Representation::Rgbd);
        let mut engine = Engine::new(g.clone(), EngineConfig::default());

        let mut words = vec![0x40404080u32; g.win_pixels];
        words[g.idx(4, 4)] = 0xFF000080;
        let frame = Frame::from_parts(Vec::new(), words);

        let filtered = engine.render(&frame, true).clone();
        assert_eq!(&filtered, engine.raster());

        engine.set_mode(RenderMode::Direct);
        let filtered = engine.render(&frame, true).clone();
        assert_ne!(&filtered, engine.raster());
    }

    #[test]
    fn palette_frames_use_the_clut() {
        let g = geometry(Representation::Indexed);
        let clut = Clut::from_colors([0, pack(5, 6, 7, 0)]);
        let mut engine = Engine::new(
            g.clone(),
            EngineConfig {
                clut,
                ..EngineConfig::default()
            },
        );

        let raster = engine.render(&Frame::from_parts(vec![1; g.win_pixels], Vec::new()), false);
        assert!(raster.pixels().iter().all(|&p| p == pack(5, 6, 7, 255)));
    }

    #[test]
    fn invalid_projection_depth_is_replaced() {
        let g = geometry(Representation::Rgbd);
        let mut engine = Engine::new(
            g.clone(),
            EngineConfig {
                max_projection_depth: 0.0,
                ..EngineConfig::default()
            },
        );

        let mut words = vec![0; g.win_pixels];
        words[g.idx(5, 5)] = 0x01020300;
        let raster = engine.render(&Frame::from_parts(Vec::new(), words), false);
        assert_eq!(raster.get(5, 5), Some(pack(1, 2, 3, 255)));
    }

    #[test]
    fn map_depth_feeds_the_filter() {
        let g = geometry(Representation::OccupancyMap);
        let mut engine = Engine::new(
            g.clone(),
            EngineConfig {
                mode: Some(RenderMode::MapNearest),
                dof: DofParams {
                    max_depth: 128.0,
                    threshold: 8.0,
                },
                ..EngineConfig::default()
            },
        );

        // Far cells of different colours, all at the same depth.
        let map = vec![
            0xC0 << 24 | 0x0000FF,
            0xC0 << 24 | 0x00FF00,
            0xC0 << 24 | 0xFF0000,
            0xC0 << 24 | 0xFFFFFF,
        ];
        let frame = Frame::from_parts(vec![0xFF; g.mask_bytes()], map);

        let copied = engine.render(&frame, false).clone();
        assert_eq!(engine.depth_buffer().at(3, 3), 0xC0);
        assert_eq!(copied.get(3, 3), Some(pack(255, 0, 0, 255)));

        let filtered = engine.render(&frame, true).clone();
        assert_ne!(filtered.get(3, 3), copied.get(3, 3));
        assert_ne!(filtered, copied);

        engine.toggle_mode();
        let copied = engine.render(&frame, false).clone();
        assert_ne!(engine.render(&frame, true), &copied);
    }

    #[test]
    fn palette_output_skips_the_filter() {
        let g = geometry(Representation::Indexed);
        let clut = Clut::from_colors([0, pack(5, 6, 7, 0), pack(200, 0, 0, 0)]);
        let mut engine = Engine::new(
            g.clone(),
            EngineConfig {
                clut,
                ..EngineConfig::default()
            },
        );

        let indices = (0..g.win_pixels).map(|i| 1 + (i % 2) as u8).collect();
        let filtered = engine.render(&Frame::from_parts(indices, Vec::new()), true).clone();
        assert_eq!(&filtered, engine.raster());
    }
}
