//! Modding System Infrastructure
//!
//! A mod is a directory inside the mods directory:
//!
//! ```text
//! mods/
//! └── better_score/
//!     ├── mod.json        # metadata (or mod.toml)
//!     ├── patches.json    # optional script manifest
//!     ├── scripts/        # *.asm hook sources
//!     └── assets/
//! ```
//!
//! # Metadata
//!
//! ```json
//! {
//!   "name": "Better Score",
//!   "id": "better_score",
//!   "version": "1.0.0",
//!   "description": "Doubles every score pickup",
//!   "dependencies": ["core_lib"]
//! }
//! ```
//!
//! # Mod Logic
//!
//! The behaviour of a mod is a [`Mod`] implementation. Implementations are
//! registered by id in a [`ModCatalog`]; a mod without a registration but with
//! a `patches.json` manifest runs as a [`script_mod::ScriptMod`].
//!
//! Every mod goes through the same phases, each of which completes for every
//! mod before the next starts:
//!
//! 1. instantiate
//! 2. [`Mod::prepare`] (only when rebuilding)
//! 3. [`Mod::patch`] and interop export registration (only when rebuilding)
//! 4. [`Mod::start`]

pub mod api;
pub mod interop;
pub mod loader;
pub mod script_mod;

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bcpatch_core::image::BytecodeImage;
use serde::{Deserialize, Serialize};

use crate::error::LoaderError;
use api::PatchApi;
use script_mod::ScriptMod;

/// Artifact hashed into the fingerprint when the metadata names none.
pub const DEFAULT_ARTIFACT: &str = "patches.json";

/// Metadata file names, in lookup order.
pub const METADATA_FILES: [&str; 2] = ["mod.json", "mod.toml"];

/// Extension of hook source files in a mod's `scripts` directory.
pub const SCRIPT_EXTENSION: &str = "asm";

/// Metadata for a mod.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModMetadata {
    /// Display name
    pub name: String,
    /// Unique identifier, referenced by dependencies and allow/deny lists
    pub id: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    /// Ids of the mods this one must load after
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// File identifying this mod's build, relative to the mod directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<String>,
}

impl ModMetadata {
    /// Load metadata from a JSON or TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read mod metadata {}", path.display()))?;

        if path.extension().and_then(|e| e.to_str()) == Some("toml") {
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse mod metadata {}", path.display()))
        } else {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse mod metadata {}", path.display()))
        }
    }
}

/// A discovered mod: its metadata and the directory it lives in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModDescriptor {
    pub metadata: ModMetadata,
    pub dir: PathBuf,
}

impl ModDescriptor {
    pub fn new(metadata: ModMetadata, dir: impl Into<PathBuf>) -> Self {
        Self {
            metadata,
            dir: dir.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.metadata.id
    }

    /// Whether the metadata names its artifact explicitly.
    pub fn declares_artifact(&self) -> bool {
        self.metadata.artifact.is_some()
    }

    pub fn artifact_path(&self) -> PathBuf {
        self.dir
            .join(self.metadata.artifact.as_deref().unwrap_or(DEFAULT_ARTIFACT))
    }

    pub fn scripts_dir(&self) -> PathBuf {
        self.dir.join("scripts")
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.dir.join("assets")
    }

    /// Every `*.asm` file of the `scripts` directory, sorted by file name.
    pub fn script_files(&self) -> Result<Vec<PathBuf>, LoaderError> {
        let dir = self.scripts_dir();
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        let entries = std::fs::read_dir(&dir).map_err(|e| LoaderError::io(&dir, e))?;
        for entry in entries {
            let path = entry.map_err(|e| LoaderError::io(&dir, e))?.path();
            if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some(SCRIPT_EXTENSION)
            {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

/// A function exported to the host program through the interop extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteropExport {
    /// Name the host program calls
    pub name: String,
    pub argc: u16,
    /// Symbol resolved by the interop library
    pub symbol: String,
}

/// Trait that all mods implement.
///
/// Errors are reported with [`anyhow`]; the orchestrator attaches the mod id
/// and phase.
pub trait Mod {
    /// Called once per rebuild, before any mod patches.
    fn prepare(&mut self, _env: &ModEnvironment, _image: &BytecodeImage) -> Result<()> {
        Ok(())
    }

    /// Apply this mod's hooks to the image.
    fn patch(&mut self, api: &mut PatchApi<'_>) -> Result<()>;

    /// Called on every run after all mods are patched, rebuild or not.
    fn start(&mut self, _descriptor: &ModDescriptor) -> Result<()> {
        Ok(())
    }

    /// Functions to export through the interop extension.
    fn interop_exports(&self) -> Vec<InteropExport> {
        Vec::new()
    }
}

/// Per-mod data loaded in the prepare phase.
#[derive(Debug, Clone)]
pub struct ModEnvironment {
    descriptor: ModDescriptor,
    /// File name to source text
    scripts: BTreeMap<String, String>,
}

impl ModEnvironment {
    /// Read every `*.asm` file from the mod's `scripts` directory.
    pub fn load(descriptor: &ModDescriptor) -> Result<Self, LoaderError> {
        let mut scripts = BTreeMap::new();
        let files = descriptor.script_files()?;
        if !files.is_empty() {
            log::info!("Loading scripts from {}", descriptor.scripts_dir().display());
        }

        for path in files {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let source = std::fs::read_to_string(&path).map_err(|e| LoaderError::io(&path, e))?;
            scripts.insert(name.to_string(), source);
        }

        Ok(Self {
            descriptor: descriptor.clone(),
            scripts,
        })
    }

    /// Environment with scripts supplied directly.
    pub fn with_scripts(descriptor: ModDescriptor, scripts: BTreeMap<String, String>) -> Self {
        Self {
            descriptor,
            scripts,
        }
    }

    pub fn descriptor(&self) -> &ModDescriptor {
        &self.descriptor
    }

    pub fn script(&self, file: &str) -> Option<&str> {
        self.scripts.get(file).map(String::as_str)
    }

    pub fn script_names(&self) -> impl Iterator<Item = &str> {
        self.scripts.keys().map(String::as_str)
    }
}

/// Builds the [`Mod`] object of a registered mod.
pub type ModFactory = Box<dyn Fn(&ModDescriptor) -> Result<Box<dyn Mod>>>;

/// A compiled-in mod implementation.
pub struct ModRegistration {
    pub id: String,
    /// Version of the implementation, mixed into the build fingerprint
    pub build_version: Option<String>,
    factory: ModFactory,
}

/// Explicit registry of mod implementations, keyed by mod id.
#[derive(Default)]
pub struct ModCatalog {
    entries: HashMap<String, ModRegistration>,
}

impl ModCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an implementation for mod `id`, replacing any earlier one.
    pub fn register<F>(&mut self, id: impl Into<String>, factory: F)
    where
        F: Fn(&ModDescriptor) -> Result<Box<dyn Mod>> + 'static,
    {
        self.insert(id.into(), None, Box::new(factory));
    }

    /// Register an implementation carrying its own build version.
    pub fn register_versioned<F>(
        &mut self,
        id: impl Into<String>,
        build_version: impl Into<String>,
        factory: F,
    ) where
        F: Fn(&ModDescriptor) -> Result<Box<dyn Mod>> + 'static,
    {
        self.insert(id.into(), Some(build_version.into()), Box::new(factory));
    }

    fn insert(&mut self, id: String, build_version: Option<String>, factory: ModFactory) {
        let registration = ModRegistration {
            id: id.clone(),
            build_version,
            factory,
        };
        if self.entries.insert(id.clone(), registration).is_some() {
            log::warn!("Replacing registered implementation of mod {}", id);
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn build_version(&self, id: &str) -> Option<&str> {
        self.entries.get(id)?.build_version.as_deref()
    }

    /// Create the logic object of a mod.
    ///
    /// Registered implementations win; otherwise a mod with a script manifest
    /// becomes a [`ScriptMod`].
    pub fn instantiate(&self, descriptor: &ModDescriptor) -> Result<Box<dyn Mod>> {
        if let Some(registration) = self.entries.get(descriptor.id()) {
            log::debug!("Instantiating registered mod {}", registration.id);
            return (registration.factory)(descriptor);
        }

        let manifest = descriptor.dir.join(script_mod::MANIFEST_FILE);
        if manifest.is_file() {
            log::debug!("Instantiating script mod {}", descriptor.id());
            return Ok(Box::new(ScriptMod::load(&manifest)?));
        }

        anyhow::bail!(
            "no implementation registered for mod `{}` and no {} in {}",
            descriptor.id(),
            script_mod::MANIFEST_FILE,
            descriptor.dir.display()
        )
    }
}
