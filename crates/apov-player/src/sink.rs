//! Display sinks: where presented rasters go.

use anyhow::{Context, Result};
use apov::Raster;
use std::path::PathBuf;

/// Receives each presented raster. The raster is only lent for the call.
pub trait DisplaySink {
    fn present(&mut self, raster: &Raster) -> Result<()>;
}

impl<S: DisplaySink + ?Sized> DisplaySink for Box<S> {
    fn present(&mut self, raster: &Raster) -> Result<()> {
        (**self).present(raster)
    }
}

/// Counts frames and drops them.
#[derive(Debug, Default)]
pub struct NullSink {
    pub presented: u64,
}

impl DisplaySink for NullSink {
    fn present(&mut self, _raster: &Raster) -> Result<()> {
        self.presented += 1;
        Ok(())
    }
}

/// Writes every `every`th presented raster to `dir/frame_NNNNNN.png`.
#[derive(Debug)]
pub struct PngSink {
    dir: PathBuf,
    every: u64,
    presented: u64,
    written: u64,
}

impl PngSink {
    pub fn new(dir: PathBuf, every: u64) -> Result<Self> {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("creating dump directory {}", dir.display()))?;
        Ok(Self {
            dir,
            every: every.max(1),
            presented: 0,
            written: 0,
        })
    }

    pub fn written(&self) -> u64 {
        self.written
    }
}

impl DisplaySink for PngSink {
    fn present(&mut self, raster: &Raster) -> Result<()> {
        let n = self.presented;
        self.presented += 1;
        if n % self.every != 0 {
            return Ok(());
        }

        let image = image::RgbaImage::from_raw(raster.width(), raster.height(), raster.to_rgba8())
            .context("raster does not fill its declared size")?;
        let path = self.dir.join(format!("frame_{n:06}.png"));
        image
            .save(&path)
            .with_context(|| format!("writing {}", path.display()))?;
        self.written += 1;
        log::debug!("Dumped {}", path.display());
        Ok(())
    }
}
