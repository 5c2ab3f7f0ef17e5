use apov::{Representation, RenderMode};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Sample-block encoding of the dataset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum DatasetKind {
    /// Packed colour + depth words behind an 80-byte header.
    Rgbd,
    /// Occupancy bits plus a coarse colour map behind an 80-byte header.
    Occupancy,
    /// Headerless palette indices; descriptor from `--options`, colours from `--clut`.
    Indexed,
}

impl From<DatasetKind> for Representation {
    fn from(kind: DatasetKind) -> Self {
        match kind {
            DatasetKind::Rgbd => Representation::Rgbd,
            DatasetKind::Occupancy => Representation::OccupancyMap,
            DatasetKind::Indexed => Representation::Indexed,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Projection,
    Direct,
    Bilinear,
    Nearest,
    Palette,
}

impl From<ModeArg> for RenderMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Projection => RenderMode::Projection,
            ModeArg::Direct => RenderMode::Direct,
            ModeArg::Bilinear => RenderMode::MapBilinear,
            ModeArg::Nearest => RenderMode::MapNearest,
            ModeArg::Palette => RenderMode::Palette,
        }
    }
}

/// `apov-player` - headless playback of APoV frozen light-field datasets.
///
/// Poses are driven by an input script, one token per frame. Rendered frames
/// go to a null sink, or to PNG files when `--dump-dir` is set.
#[derive(Parser, Debug, Clone)]
#[command(name = "apov-player", version, about, long_about = None)]
pub struct Config {
    /// Dataset file.
    #[arg(long, env = "APOV_DATASET", default_value = "atoms.apov")]
    pub dataset: PathBuf,

    #[arg(long, value_enum, default_value_t = DatasetKind::Occupancy)]
    pub kind: DatasetKind,

    /// Options line for indexed datasets.
    #[arg(long, default_value = "options.txt")]
    pub options: PathBuf,

    /// Colour table for indexed datasets.
    #[arg(long, default_value = "clut.bin")]
    pub clut: PathBuf,

    /// Depth at which perspective splatting collapses to the window centre.
    #[arg(long, default_value_t = 300.0)]
    pub max_projection_depth: f32,

    /// Occupancy dataset stores all masks first, then all colour maps.
    #[arg(long, default_value_t = false)]
    pub split_streams: bool,

    /// Starting render mode; defaults to the dataset kind's first mode.
    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Start with the depth-of-field filter on.
    #[arg(long, default_value_t = false)]
    pub dof: bool,

    #[arg(long, default_value_t = 128.0)]
    pub dof_max_depth: f32,

    #[arg(long, default_value_t = 8.0)]
    pub dof_threshold: f32,

    /// Input script: whitespace-separated frame tokens, e.g. `m+*5 h-,dof . quit`.
    /// Read from a file when it names one; an empty script quits immediately.
    #[arg(long, env = "APOV_SCRIPT", default_value = "")]
    pub script: String,

    /// Sample input on its own thread, sharing only the frame and DoF flag.
    #[arg(long, default_value_t = false)]
    pub threaded_input: bool,

    /// Pause between frames.
    #[arg(long, default_value_t = 0)]
    pub frame_interval_ms: u64,

    /// Write presented frames as PNG files here.
    #[arg(long)]
    pub dump_dir: Option<PathBuf>,

    /// Dump every Nth presented frame.
    #[arg(long, default_value_t = 1)]
    pub dump_every: u64,

    /// Memory-map the dataset instead of reading it through a file handle.
    #[arg(long, default_value_t = false)]
    pub mmap: bool,
}
