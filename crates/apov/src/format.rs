//! Dataset header, `options.txt` and `clut.bin` loaders.
//!
//! Configuration is never fatal: the `*_or_default` loaders log what went
//! wrong and hand back the documented defaults.

use crate::descriptor::VolumeDescriptor;
use crate::reconstruct::palette::{Clut, CLUT_LOAD_COUNT};
use std::fs::File;
use std::io::{self, ErrorKind, Read};
use std::path::Path;

/// Fixed header preceding the payload of RGBD and occupancy datasets.
pub const HEADER_BYTES: u64 = 80;

/// Leading header bytes holding the descriptor (seven u32 fields).
pub const DESCRIPTOR_BYTES: usize = 7 * 4;

#[inline(always)]
fn need(buf: &[u8], want: usize) -> io::Result<()> {
    if buf.len() < want {
        Err(io::Error::new(ErrorKind::UnexpectedEof, "truncated APoV header"))
    } else {
        Ok(())
    }
}

#[inline(always)]
fn take<'a>(buf: &mut &'a [u8], n: usize) -> io::Result<&'a [u8]> {
    need(buf, n)?;
    let (head, tail) = buf.split_at(n);
    *buf = tail;
    Ok(head)
}

#[inline(always)]
fn le_u32(buf: &mut &[u8]) -> io::Result<u32> {
    let b = take(buf, 4)?;
    Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

#[cold]
fn bad(msg: &str) -> io::Error {
    io::Error::new(ErrorKind::InvalidData, msg)
}

/// Parse the descriptor record at the start of a dataset header.
pub fn parse_descriptor_bytes(mut p: &[u8]) -> io::Result<VolumeDescriptor> {
    Ok(VolumeDescriptor {
        space_block_size: le_u32(&mut p)?,
        horizontal_pov_count: le_u32(&mut p)?,
        vertical_pov_count: le_u32(&mut p)?,
        ray_step: le_u32(&mut p)?,
        width_block_count: le_u32(&mut p)?,
        depth_block_count: le_u32(&mut p)?,
        color_map_size: le_u32(&mut p)?,
    })
}

/// Parse an options line: `hpov ray_step width_blocks depth_blocks [vpov [map_size]]`.
///
/// Fields not present keep their default value; the block size of indexed
/// datasets is fixed.
pub fn parse_options_line(line: &str) -> io::Result<VolumeDescriptor> {
    let fields = line
        .split_whitespace()
        .map(|field| field.parse::<u32>().map_err(|_| bad("options field is not a u32")))
        .collect::<io::Result<Vec<u32>>>()?;

    if fields.len() < 4 {
        return Err(bad("options line needs at least 4 fields"));
    }
    if fields.len() > 6 {
        return Err(bad("options line has more than 6 fields"));
    }

    let mut descriptor = VolumeDescriptor {
        horizontal_pov_count: fields[0],
        ray_step: fields[1],
        width_block_count: fields[2],
        depth_block_count: fields[3],
        ..VolumeDescriptor::default()
    };

    if let Some(&vpov) = fields.get(4) {
        descriptor.vertical_pov_count = vpov;
    }
    if let Some(&map_size) = fields.get(5) {
        descriptor.color_map_size = map_size;
    }

    Ok(descriptor)
}

/// Parse up to [`CLUT_LOAD_COUNT`] little-endian colours; missing entries stay zero.
pub fn parse_clut_bytes(p: &[u8]) -> Clut {
    let colors = p
        .chunks_exact(4)
        .take(CLUT_LOAD_COUNT)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]));

    Clut::from_colors(colors)
}

/// Read the descriptor from the header of a dataset file.
pub fn read_descriptor_header<P: AsRef<Path>>(path: P) -> io::Result<VolumeDescriptor> {
    let mut file = File::open(path)?;
    let mut head = [0u8; DESCRIPTOR_BYTES];
    file.read_exact(&mut head)?;
    parse_descriptor_bytes(&head)
}

pub fn read_options_file<P: AsRef<Path>>(path: P) -> io::Result<VolumeDescriptor> {
    let text = std::fs::read_to_string(path)?;
    let line = text.lines().next().ok_or_else(|| bad("empty options file"))?;
    parse_options_line(line)
}

pub fn load_descriptor_or_default<P: AsRef<Path>>(path: P) -> VolumeDescriptor {
    let path = path.as_ref();
    match read_descriptor_header(path) {
        Ok(descriptor) => {
            log::info!("Descriptor from {}: {:?}", path.display(), descriptor);
            descriptor
        }
        Err(err) => {
            log::warn!(
                "No descriptor in {} ({}); using defaults.",
                path.display(),
                err
            );
            VolumeDescriptor::default()
        }
    }
}

pub fn load_options_or_default<P: AsRef<Path>>(path: P) -> VolumeDescriptor {
    let path = path.as_ref();
    match read_options_file(path) {
        Ok(descriptor) => {
            log::info!("Options from {}: {:?}", path.display(), descriptor);
            descriptor
        }
        Err(err) => {
            log::warn!(
                "Options {} unusable ({}); using defaults.",
                path.display(),
                err
            );
            VolumeDescriptor::default()
        }
    }
}

pub fn load_clut_or_default<P: AsRef<Path>>(path: P) -> Clut {
    let path = path.as_ref();
    match std::fs::read(path) {
        Ok(bytes) => {
            if bytes.len() < CLUT_LOAD_COUNT * 4 {
                log::warn!(
                    "CLUT {} holds {} of {} colours.",
                    path.display(),
                    bytes.len() / 4,
                    CLUT_LOAD_COUNT
                );
            }
            parse_clut_bytes(&bytes)
        }
        Err(err) => {
            log::warn!("CLUT {} unreadable ({}); using an empty table.", path.display(), err);
            Clut::default()
        }
    }
}

#[cfg(test)]
pub(crate) fn encode_header(descriptor: &VolumeDescriptor) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_BYTES as usize);
    for value in [
        descriptor.space_block_size,
        descriptor.horizontal_pov_count,
        descriptor.vertical_pov_count,
        descriptor.ray_step,
        descriptor.width_block_count,
        descriptor.depth_block_count,
        descriptor.color_map_size,
    ] {
        out.extend_from_slice(&value.to_le_bytes());
    }
    out.resize(HEADER_BYTES as usize, 0);
    out
}
