//! Mod loading and rebuild orchestration.
//!
//! This crate turns a directory of mods into a patched image:
//!
//! 1. [`mods::loader`] discovers mod metadata and computes the load order.
//! 2. [`fingerprint`] decides whether the previous rebuild is still valid.
//! 3. [`orchestrator`] drives every mod through its lifecycle phases and
//!    writes the rebuilt image.
//! 4. [`launch`] starts the host program on the selected image.
//!
//! Configuration lives in [`config::LoaderConfig`].

pub mod config;
pub mod error;
pub mod fingerprint;
pub mod launch;
pub mod mods;
pub mod orchestrator;

/// Version mixed into every build fingerprint.
pub const LOADER_VERSION: &str = env!("CARGO_PKG_VERSION");
