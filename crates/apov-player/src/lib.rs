//! Headless APoV player.
//!
//! Drives the `apov` core from scripted input and hands every presented
//! raster to a display sink.

pub mod app;
pub mod config;
pub mod controls;
pub mod sink;
