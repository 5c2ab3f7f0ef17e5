//! Per-frame input: scripted events, and the state shared with an input thread.

use anyhow::{bail, Context, Result};
use apov::{Addressing, PoseNavigator};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Everything the user asked for during one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputEvent {
    pub d_slice: i32,
    pub d_hrotate: i32,
    pub d_vrotate: i32,
    pub toggle_dof: bool,
    pub toggle_mode: bool,
    pub quit: bool,
}

pub trait InputSource {
    /// Next frame's input; `None` once the source is exhausted.
    fn poll(&mut self) -> Option<InputEvent>;
}

impl<I: InputSource + ?Sized> InputSource for Box<I> {
    fn poll(&mut self) -> Option<InputEvent> {
        (**self).poll()
    }
}

/// Input replayed from a script.
///
/// Tokens are separated by whitespace, one per frame. A token is a
/// comma-separated list of actions (`m+ m- h+ h- v+ v- dof mode quit`, or `.`
/// for an idle frame), optionally followed by `*N` to repeat it N times.
#[derive(Debug, Clone, Default)]
pub struct ScriptedInput {
    events: VecDeque<InputEvent>,
}

impl ScriptedInput {
    pub fn parse(script: &str) -> Result<Self> {
        let mut events = VecDeque::new();
        for token in script.split_whitespace() {
            let (actions, repeat) = match token.rsplit_once('*') {
                Some((actions, n)) => {
                    let n: usize = n
                        .parse()
                        .with_context(|| format!("bad repeat count in `{token}`"))?;
                    (actions, n)
                }
                None => (token, 1),
            };

            let mut event = InputEvent::default();
            for action in actions.split(',') {
                match action {
                    "." => {}
                    "m+" => event.d_slice += 1,
                    "m-" => event.d_slice -= 1,
                    "h+" => event.d_hrotate += 1,
                    "h-" => event.d_hrotate -= 1,
                    "v+" => event.d_vrotate += 1,
                    "v-" => event.d_vrotate -= 1,
                    "dof" => event.toggle_dof = true,
                    "mode" => event.toggle_mode = true,
                    "quit" => event.quit = true,
                    other => bail!("unknown input action `{other}` in `{token}`"),
                }
            }
            events.extend(std::iter::repeat(event).take(repeat));
        }
        Ok(Self { events })
    }

    /// Treat `script` as a file path when one exists, as inline text otherwise.
    pub fn load(script: &str) -> Result<Self> {
        let path = Path::new(script);
        if !script.is_empty() && path.is_file() {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading input script {}", path.display()))?;
            return Self::parse(&text);
        }
        Self::parse(script)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl InputSource for ScriptedInput {
    fn poll(&mut self) -> Option<InputEvent> {
        self.events.pop_front()
    }
}

/// The two values the input thread publishes to the render loop.
///
/// The pose travels as its frame ordinal, which maps onto single and split
/// offsets alike.
#[derive(Debug, Default)]
pub struct SharedControls {
    frame: AtomicU64,
    dof: AtomicBool,
}

impl SharedControls {
    pub fn new(frame: u64, dof: bool) -> Self {
        Self {
            frame: AtomicU64::new(frame),
            dof: AtomicBool::new(dof),
        }
    }

    pub fn frame(&self) -> u64 {
        self.frame.load(Ordering::Relaxed)
    }

    pub fn publish_frame(&self, ordinal: u64) {
        self.frame.store(ordinal, Ordering::Relaxed);
    }

    pub fn dof(&self) -> bool {
        self.dof.load(Ordering::Relaxed)
    }

    pub fn toggle_dof(&self) -> bool {
        !self.dof.fetch_xor(true, Ordering::Relaxed)
    }
}

/// Run `source` on its own thread until it quits or runs dry.
///
/// The thread finishing is the render loop's shutdown signal; joining it hands
/// back the navigator with the final pose.
pub fn spawn_input<I>(
    mut source: I,
    mut navigator: PoseNavigator,
    addressing: Addressing,
    controls: Arc<SharedControls>,
    interval: Duration,
) -> thread::JoinHandle<PoseNavigator>
where
    I: InputSource + Send + 'static,
{
    thread::spawn(move || {
        while let Some(event) = source.poll() {
            if event.quit {
                break;
            }

            let pose = navigator.advance(event.d_slice, event.d_hrotate, event.d_vrotate);
            controls.publish_frame(addressing.frame_ordinal(pose));
            if event.toggle_dof {
                controls.toggle_dof();
            }
            if event.toggle_mode {
                log::debug!("Mode toggle ignored while input runs on its own thread.");
            }

            if !interval.is_zero() {
                thread::sleep(interval);
            }
        }
        log::info!("Input thread finished.");
        navigator
    })
}
