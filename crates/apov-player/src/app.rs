//! The playback pipeline: input → pose → cached frame → engine → sink.

use crate::config::Config;
use crate::controls::{spawn_input, InputEvent, InputSource, ScriptedInput, SharedControls};
use crate::sink::{DisplaySink, NullSink, PngSink};
use anyhow::{anyhow, Result};
use apov::format::{load_clut_or_default, load_descriptor_or_default, load_options_or_default};
use apov::{
    Addressing, Clut, DofParams, Engine, EngineConfig, FileStorage, FrameCache, Geometry, Offset,
    Pose, PoseNavigator, Representation, Storage, StreamLayout,
};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Counters reported when playback ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub frames: u64,
    pub redraws: u64,
    pub reads: u64,
    pub faults: u64,
}

pub struct Player<S, K> {
    navigator: PoseNavigator,
    addressing: Addressing,
    cache: FrameCache<S>,
    engine: Engine,
    sink: K,
    dof: bool,
    /// Reconstruct from the cached frame even if the offset did not change.
    dirty: bool,
    /// DoF flag the presented raster was post-processed with.
    presented_dof: Option<bool>,
    frames: u64,
    redraws: u64,
}

impl<S: Storage, K: DisplaySink> Player<S, K> {
    pub fn new(
        geometry: Geometry,
        layout: StreamLayout,
        storage: S,
        engine_config: EngineConfig,
        sink: K,
        dof: bool,
    ) -> Self {
        Self {
            navigator: PoseNavigator::new(&geometry),
            addressing: Addressing::new(&geometry, layout),
            cache: FrameCache::new(storage, &geometry),
            engine: Engine::new(geometry, engine_config),
            sink,
            dof,
            dirty: false,
            presented_dof: None,
            frames: 0,
            redraws: 0,
        }
    }

    pub fn pose(&self) -> Pose {
        self.navigator.pose()
    }

    pub fn dof_enabled(&self) -> bool {
        self.dof
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn cache(&self) -> &FrameCache<S> {
        &self.cache
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    /// Apply one frame of input. Returns `false` when playback should stop.
    pub fn apply_input(&mut self, event: InputEvent) -> bool {
        if event.quit {
            return false;
        }

        let pose = self
            .navigator
            .advance(event.d_slice, event.d_hrotate, event.d_vrotate);
        log::trace!("Pose {:?}", pose);

        if event.toggle_dof {
            self.dof = !self.dof;
            log::debug!("Depth of field {}", if self.dof { "on" } else { "off" });
        }
        if event.toggle_mode {
            let mode = self.engine.toggle_mode();
            self.cache.invalidate();
            self.dirty = true;
            log::debug!("Render mode {:?}", mode);
        }
        true
    }

    /// Fetch, reconstruct if needed, and present one frame.
    pub fn render_frame(&mut self, offset: Offset, dof: bool) -> Result<()> {
        let (frame, changed) = self.cache.fetch(offset);
        let redraw = changed || self.dirty;
        if redraw {
            self.engine.reconstruct(frame);
            self.dirty = false;
            self.redraws += 1;
        }
        if redraw || self.presented_dof != Some(dof) {
            self.engine.post_process(dof);
            self.presented_dof = Some(dof);
        }

        self.sink.present(self.engine.scratch())?;
        self.frames += 1;
        Ok(())
    }

    fn current_offset(&self) -> Offset {
        self.addressing.offset_of(self.navigator.pose())
    }

    /// Input and rendering on the calling thread, one input event per frame.
    pub fn run_inline<I: InputSource>(&mut self, input: &mut I, interval: Duration) -> Result<()> {
        self.render_frame(self.current_offset(), self.dof)?;

        while let Some(event) = input.poll() {
            if !self.apply_input(event) {
                break;
            }
            self.render_frame(self.current_offset(), self.dof)?;
            if !interval.is_zero() {
                thread::sleep(interval);
            }
        }
        Ok(())
    }

    /// Input on its own thread; this thread renders whatever it last published
    /// until the input thread finishes.
    pub fn run_threaded<I>(&mut self, input: I, interval: Duration) -> Result<()>
    where
        I: InputSource + Send + 'static,
    {
        let controls = Arc::new(SharedControls::new(
            self.addressing.frame_ordinal(self.navigator.pose()),
            self.dof,
        ));
        let handle = spawn_input(
            input,
            self.navigator,
            self.addressing,
            controls.clone(),
            interval,
        );

        while !handle.is_finished() {
            let offset = self.addressing.offset_of_frame(controls.frame());
            self.render_frame(offset, controls.dof())?;
            if interval.is_zero() {
                thread::yield_now();
            } else {
                thread::sleep(interval);
            }
        }

        self.navigator = handle
            .join()
            .map_err(|_| anyhow!("input thread panicked"))?;

        // Last published state, after the input thread is gone.
        self.dof = controls.dof();
        let offset = self.addressing.offset_of_frame(controls.frame());
        self.render_frame(offset, self.dof)
    }

    pub fn stats(&self) -> RunStats {
        RunStats {
            frames: self.frames,
            redraws: self.redraws,
            reads: self.cache.reads(),
            faults: self.cache.faults(),
        }
    }

    /// Release every buffer and close storage.
    pub fn shutdown(self) -> RunStats {
        let stats = self.stats();
        drop(self.cache.into_storage());
        stats
    }
}

fn load_geometry(config: &Config, representation: Representation) -> Geometry {
    let descriptor = match representation {
        Representation::Indexed => load_options_or_default(&config.options),
        Representation::Rgbd | Representation::OccupancyMap => {
            load_descriptor_or_default(&config.dataset)
        }
    };
    Geometry::new_or_default(descriptor, representation)
}

fn open_storage(config: &Config, geometry: &Geometry) -> Box<dyn Storage> {
    #[cfg(feature = "mmap")]
    {
        if config.mmap {
            match apov::MmapStorage::open(&config.dataset) {
                Ok(storage) => {
                    if let Some(len) = storage.len() {
                        check_len(len, geometry);
                    }
                    return Box::new(storage);
                }
                Err(err) => log::warn!(
                    "Mapping {} failed ({}); using file reads.",
                    config.dataset.display(),
                    err
                ),
            }
        }
    }

    #[cfg(not(feature = "mmap"))]
    {
        if config.mmap {
            log::warn!("Built without the `mmap` feature; using file reads.");
        }
    }

    match FileStorage::open(&config.dataset) {
        Ok(storage) => {
            if let Some(len) = storage.len() {
                check_len(len, geometry);
            }
            Box::new(storage)
        }
        Err(err) => {
            log::error!(
                "Cannot open dataset {}: {}. Frames will stay blank until it can be reopened.",
                config.dataset.display(),
                err
            );
            Box::new(FileStorage::detached(&config.dataset))
        }
    }
}

fn check_len(len: u64, geometry: &Geometry) {
    let expected = geometry.dataset_bytes();
    if len < expected {
        log::warn!(
            "Dataset holds {} bytes, descriptor needs {}; distant poses will fault.",
            len,
            expected
        );
    }
}

/// Run the player as configured.
pub fn run(config: Config) -> Result<()> {
    let representation = Representation::from(config.kind);
    let geometry = load_geometry(&config, representation);
    log::info!(
        "{:?} dataset: window {}x{}, {} slices x {} povs, {} bytes per frame.",
        representation,
        geometry.win_width,
        geometry.win_height,
        geometry.depth_frame_count,
        geometry.pov_count,
        geometry.frame_bytes()
    );

    let clut = if representation == Representation::Indexed {
        load_clut_or_default(&config.clut)
    } else {
        Clut::default()
    };

    let engine_config = EngineConfig {
        mode: config.mode.map(Into::into),
        max_projection_depth: config.max_projection_depth,
        dof: DofParams {
            max_depth: config.dof_max_depth,
            threshold: config.dof_threshold,
        },
        clut,
    };
    let layout = if config.split_streams {
        StreamLayout::Split
    } else {
        StreamLayout::Interleaved
    };

    let sink: Box<dyn DisplaySink> = match &config.dump_dir {
        Some(dir) => Box::new(PngSink::new(dir.clone(), config.dump_every)?),
        None => Box::new(NullSink::default()),
    };

    let storage = open_storage(&config, &geometry);
    let mut input = ScriptedInput::load(&config.script)?;
    log::info!("Input script holds {} frames.", input.len());

    let interval = Duration::from_millis(config.frame_interval_ms);
    let mut player = Player::new(geometry, layout, storage, engine_config, sink, config.dof);

    let started = Instant::now();
    if config.threaded_input {
        player.run_threaded(input, interval)?;
    } else {
        player.run_inline(&mut input, interval)?;
    }

    let elapsed = started.elapsed();
    let stats = player.shutdown();
    let fps = stats.frames as f64 / elapsed.as_secs_f64().max(f64::EPSILON);
    log::info!(
        "Played {} frames ({} redraws, {} reads, {} faults) in {:.2?}, {:.1} fps.",
        stats.frames,
        stats.redraws,
        stats.reads,
        stats.faults,
        elapsed,
        fps
    );
    Ok(())
}
