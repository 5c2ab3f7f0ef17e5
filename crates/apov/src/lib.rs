//! APoV: playback core for pre-baked "frozen light field" datasets.
//!
//! A dataset holds one sample block ("frame") per discrete pose. A pose is a
//! depth slice plus a horizontal and a vertical point-of-view index; the core
//! turns it into a byte offset, streams the frame through a single-slot cache
//! and reconstructs an RGBA raster from it.
//!
//! Dataset layout (little-endian):
//!   00  : u32     space_block_size
//!   04  : u32     horizontal_pov_count
//!   08  : u32     vertical_pov_count
//!   0C  : u32     ray_step
//!   10  : u32     width_block_count
//!   14  : u32     depth_block_count
//!   18  : u32     color_map_size
//!   1C  : [u8;52] reserved (header is 80 bytes)
//!   50  : payload, for each pov (hrotate-major, then vrotate):
//!           depth_frame_count frames of
//!             RGBD      : win_pixels u32  (R<<24 | G<<16 | B<<8 | depth)
//!             Occupancy : win_pixels/8 mask bytes, then map_pixels u32 (depth<<24 | B<<16 | G<<8 | R)
//!
//! Indexed datasets are headerless: win_pixels palette indices per frame, the
//! descriptor comes from an `options.txt` line and colours from `clut.bin`.
//!
//! Occupancy datasets may also use the split layout, where every mask frame is
//! stored first and every colour map after them.

pub mod cache;
pub mod descriptor;
pub mod dof;
pub mod format;
pub mod pose;
pub mod raster;
pub mod reconstruct;
pub mod storage;

pub use cache::{Frame, FrameCache};
pub use descriptor::{DescriptorError, Geometry, Representation, VolumeDescriptor};
pub use dof::{DofFilter, DofParams};
pub use pose::{Addressing, Offset, Pose, PoseNavigator, StreamLayout};
pub use raster::{DepthBuffer, Raster};
pub use reconstruct::{palette::Clut, Engine, EngineConfig, RenderMode};
pub use storage::{FileStorage, MemoryStorage, Storage};

#[cfg(feature = "mmap")]
pub use storage::MmapStorage;
