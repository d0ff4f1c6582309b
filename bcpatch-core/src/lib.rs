//! Bytecode image model and hook engine.
//!
//! This crate holds everything that touches the in-memory [`image::BytecodeImage`]:
//! the instruction IR, the textual assembler used to compile hook sources, the
//! image file codec, the extension id allocator and the hook engine itself.
//!
//! # Overview
//!
//! A patch run owns one image and one [`hooker::PatchSession`]. Mods edit the
//! image through a [`hooker::HookEngine`], which borrows both for the duration
//! of a single phase:
//!
//! ```rust,no_run
//! use bcpatch_core::asm::AsmCompiler;
//! use bcpatch_core::hooker::{HookEngine, PatchSession, DEFAULT_PLACEHOLDER};
//! use bcpatch_core::image::BytecodeImage;
//!
//! let mut image = BytecodeImage::default();
//! let mut session = PatchSession::new();
//! let compiler = AsmCompiler::new();
//! let mut engine = HookEngine::new(&mut image, &mut session, &compiler);
//! engine.hook("scr_player_step", "call #orig#(argc=0)\nret", DEFAULT_PLACEHOLDER)?;
//! engine.finalize_hooks()?;
//! # Ok::<(), bcpatch_core::error::HookError>(())
//! ```

pub mod asm;
pub mod error;
pub mod extension;
pub mod hooker;
pub mod image;
