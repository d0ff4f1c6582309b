//! Hook Engine Errors
//!
//! Error types raised while editing an image through the hook engine.
//!
//! # Error Categories
//! - **Lookup errors**: the hook target does not exist, or a new name collides
//! - **Compilation errors**: the hook source does not compile
//! - **Invariant violations**: a pending redirect points at a unit that is gone

use thiserror::Error;

use crate::asm::CompileError;

/// Hook engine error types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HookError {
    /// The code unit or function to hook does not exist in the image.
    #[error("code unit or function `{0}` not found")]
    NotFound(String),

    /// A new unit would reuse a name already present in the image.
    #[error("`{0}` is already declared in the image")]
    AlreadyExists(String),

    /// The hook source failed to compile.
    #[error("failed to compile hook for `{target}`")]
    Compile {
        target: String,
        #[source]
        source: CompileError,
    },

    /// A pending redirect names a replacement unit missing from the image.
    ///
    /// Only reachable if the image is edited behind the engine's back.
    #[error("redirect of `{function}` targets missing unit `{replacement}`")]
    InvalidRedirect {
        function: String,
        replacement: String,
    },
}

impl HookError {
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound(name.into())
    }
}
