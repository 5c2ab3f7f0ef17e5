//! Single-slot frame cache in front of the dataset storage.

use crate::descriptor::Geometry;
use crate::pose::Offset;
use crate::storage::{read_full, Storage};
use std::io::{self, ErrorKind};

/// One sample block as read from storage.
///
/// `bytes` holds the occupancy mask or palette indices, `words` the RGBD
/// samples or the colour map; either may be empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    bytes: Vec<u8>,
    words: Vec<u32>,
}

impl Frame {
    /// Zeroed frame sized for `geometry`.
    pub fn new(geometry: &Geometry) -> Self {
        Self {
            bytes: vec![0; geometry.head_len()],
            words: vec![0; geometry.word_len()],
        }
    }

    pub fn from_parts(bytes: Vec<u8>, words: Vec<u32>) -> Self {
        Self { bytes, words }
    }

    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    pub fn words(&self) -> &[u32] {
        &self.words
    }
}

fn fill<S: Storage + ?Sized>(storage: &mut S, buf: &mut [u8]) -> io::Result<()> {
    let n = read_full(storage, buf)?;
    if n != buf.len() {
        return Err(io::Error::new(
            ErrorKind::UnexpectedEof,
            format!("short read: {} of {} bytes", n, buf.len()),
        ));
    }
    Ok(())
}

#[inline]
fn words_from_le(words: &mut [u32]) {
    if cfg!(target_endian = "big") {
        for w in words.iter_mut() {
            *w = u32::from_le(*w);
        }
    }
}

/// Remembers the last offset served and only touches storage when it changes.
pub struct FrameCache<S> {
    storage: S,
    header_bytes: u64,
    last: Option<Offset>,
    current: Frame,
    staging: Frame,
    reads: u64,
    faults: u64,
    /// Consecutive faults since the last successful read.
    fault_streak: u64,
}

/// Only the first fault of a streak logs at `level`; the rest go to debug.
fn fault_level(streak: u64, level: log::Level) -> log::Level {
    if streak <= 1 {
        level
    } else {
        log::Level::Debug
    }
}

impl<S: Storage> FrameCache<S> {
    pub fn new(storage: S, geometry: &Geometry) -> Self {
        Self {
            storage,
            header_bytes: geometry.representation.header_bytes(),
            last: None,
            current: Frame::new(geometry),
            staging: Frame::new(geometry),
            reads: 0,
            faults: 0,
            fault_streak: 0,
        }
    }

    /// Serve the frame at `offset`; `true` when it was freshly read.
    ///
    /// A short or failed read is a storage fault: storage is asked to reopen,
    /// the previously served frame is returned unchanged and the same offset is
    /// retried on the next call.
    pub fn fetch(&mut self, offset: Offset) -> (&Frame, bool) {
        if self.last == Some(offset) {
            return (&self.current, false);
        }

        match self.load(offset) {
            Ok(()) => {
                std::mem::swap(&mut self.current, &mut self.staging);
                self.last = Some(offset);
                self.reads += 1;
                if self.fault_streak > 0 {
                    log::info!("Storage recovered after {} faults.", self.fault_streak);
                    self.fault_streak = 0;
                }
                log::trace!("Loaded frame at {:?}", offset);
                (&self.current, true)
            }
            Err(err) => {
                self.faults += 1;
                self.fault_streak += 1;
                let streak = self.fault_streak;
                log::log!(
                    fault_level(streak, log::Level::Warn),
                    "Storage fault at {:?}: {}; reopening.",
                    offset,
                    err
                );
                if let Err(err) = self.storage.reopen() {
                    log::log!(
                        fault_level(streak, log::Level::Error),
                        "Reopening dataset failed: {}",
                        err
                    );
                }
                (&self.current, false)
            }
        }
    }

    fn load(&mut self, offset: Offset) -> io::Result<()> {
        let Frame { bytes, words } = &mut self.staging;
        let word_bytes: &mut [u8] = bytemuck::cast_slice_mut(words.as_mut_slice());

        match offset {
            Offset::Single(at) => {
                self.storage.seek(self.header_bytes + at)?;
                fill(&mut self.storage, bytes)?;
                fill(&mut self.storage, word_bytes)?;
            }
            Offset::Split { mask, map } => {
                self.storage.seek(self.header_bytes + mask)?;
                fill(&mut self.storage, bytes)?;
                self.storage.seek(self.header_bytes + map)?;
                fill(&mut self.storage, word_bytes)?;
            }
        }

        words_from_le(words);
        Ok(())
    }

    /// Forget the remembered offset so the next fetch reads again.
    pub fn invalidate(&mut self) {
        self.last = None;
    }

    #[inline]
    pub fn last_offset(&self) -> Option<Offset> {
        self.last
    }

    /// The most recently served frame.
    #[inline]
    pub fn frame(&self) -> &Frame {
        &self.current
    }

    /// Successful storage reads so far.
    pub fn reads(&self) -> u64 {
        self.reads
    }

    /// Storage faults so far.
    pub fn faults(&self) -> u64 {
        self.faults
    }

    /// Faults since the last successful read.
    pub fn fault_streak(&self) -> u64 {
        self.fault_streak
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn into_storage(self) -> S {
        self.storage
    }
}
