//! Loader Errors
//!
//! Every failure a run can raise. Apart from [`LoaderError::MissingDependency`],
//! which only ever shows up as a load order diagnostic, each of these aborts
//! the run and sends the launcher down the fallback path.

use std::fmt;
use std::path::PathBuf;

use bcpatch_core::error::HookError;
use bcpatch_core::image::codec::ImageError;
use thiserror::Error;

/// Lifecycle phase in which a mod failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Instantiate,
    Prepare,
    Patch,
    Interop,
    Finalize,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Instantiate => "instantiate",
            Phase::Prepare => "prepare",
            Phase::Patch => "patch",
            Phase::Interop => "interop",
            Phase::Finalize => "finalize",
        };
        f.write_str(name)
    }
}

/// Loader error types.
#[derive(Error, Debug)]
pub enum LoaderError {
    /// A required file or argument is missing.
    #[error("{0} not found")]
    NotFound(String),

    /// The host command line names no executable.
    #[error("host command line is empty, expected the executable name first")]
    EmptyCommandLine,

    /// A mod declares a dependency no known mod provides.
    #[error("mod `{mod_id}` depends on missing mod `{dependency}`")]
    MissingDependency { mod_id: String, dependency: String },

    /// A mod failed before or while patching the image.
    #[error("mod `{mod_id}` failed during {phase}")]
    PatchFailure {
        mod_id: String,
        phase: Phase,
        #[source]
        source: anyhow::Error,
    },

    /// A whole-batch hook step failed.
    #[error("hook {phase} step failed")]
    HookFailure {
        phase: Phase,
        #[source]
        source: HookError,
    },

    /// A mod failed in its start phase.
    #[error("mod `{mod_id}` failed to start")]
    StartFailure {
        mod_id: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("I/O error on {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Image(#[from] ImageError),
}

/// Failure of a whole run, as seen by the launcher.
pub type RunError = LoaderError;

impl LoaderError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error aborts a run.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::MissingDependency { .. })
    }
}
