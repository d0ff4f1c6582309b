//! Mod discovery and load ordering.
//!
//! # Usage
//!
//! ```rust,no_run
//! use bcpatch_loader::mods::loader::{compute_load_order, discover_mods, load_list};
//! use std::path::Path;
//!
//! let mods_dir = Path::new("bcpatch/mods");
//! let available = discover_mods(mods_dir)?;
//! let allow = load_list(&mods_dir.join("whitelist.txt"))?;
//! let deny = load_list(&mods_dir.join("blacklist.txt"))?;
//! let order = compute_load_order(&available, &allow, &deny);
//! for descriptor in &order.mods {
//!     println!("{}", descriptor.id());
//! }
//! # Ok::<(), bcpatch_loader::error::LoaderError>(())
//! ```
//!
//! # Ordering Rules
//!
//! A non-empty allow-list selects the mods to load; otherwise every mod not on
//! the deny-list is loaded. Each selected mod's direct dependencies are looked
//! up among all discovered mods, filters ignored, and placed before it. A mod
//! with an unknown dependency is left out. Dependencies of dependencies are not
//! followed.
//!
//! List files behave as they always have: when a list file exists, an empty
//! entry is added before its lines, so an existing but empty allow-list still
//! excludes every mod.

use std::path::{Path, PathBuf};

use super::{ModDescriptor, ModMetadata, METADATA_FILES};
use crate::error::LoaderError;

pub const ALLOW_LIST_FILE: &str = "whitelist.txt";
pub const DENY_LIST_FILE: &str = "blacklist.txt";

/// Mods in the order they load, with the diagnostics of those left out.
#[derive(Debug, Default)]
pub struct LoadOrder {
    pub mods: Vec<ModDescriptor>,
    /// One [`LoaderError::MissingDependency`] per unresolved dependency
    pub excluded: Vec<LoaderError>,
}

impl LoadOrder {
    pub fn ids(&self) -> Vec<&str> {
        self.mods.iter().map(ModDescriptor::id).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.mods.is_empty()
    }

    fn contains(&self, id: &str) -> bool {
        self.mods.iter().any(|descriptor| descriptor.id() == id)
    }
}

/// Scan `mods_dir` for mod directories, sorted by directory name.
///
/// Directories without readable metadata are skipped with a warning. A
/// missing mods directory yields no mods.
pub fn discover_mods(mods_dir: &Path) -> Result<Vec<ModDescriptor>, LoaderError> {
    if !mods_dir.exists() {
        log::warn!("Mod directory does not exist: {}", mods_dir.display());
        return Ok(Vec::new());
    }

    let mut dirs: Vec<PathBuf> = Vec::new();
    for entry in std::fs::read_dir(mods_dir).map_err(|e| LoaderError::io(mods_dir, e))? {
        let path = entry.map_err(|e| LoaderError::io(mods_dir, e))?.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();

    let mut discovered = Vec::with_capacity(dirs.len());
    for dir in dirs {
        let Some(metadata_path) = find_metadata_file(&dir) else {
            log::warn!("No metadata file found for mod: {}", dir.display());
            continue;
        };
        match ModMetadata::load(&metadata_path) {
            Ok(metadata) => discovered.push(ModDescriptor::new(metadata, dir)),
            Err(e) => log::warn!("Skipping mod {}: {:#}", dir.display(), e),
        }
    }

    log::info!("Discovered {} mods in {}", discovered.len(), mods_dir.display());
    Ok(discovered)
}

fn find_metadata_file(dir: &Path) -> Option<PathBuf> {
    METADATA_FILES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}

/// Read an allow/deny list file.
///
/// Absent file: empty list. Present file: `""` followed by every line.
pub fn load_list(path: &Path) -> Result<Vec<String>, LoaderError> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let content = std::fs::read_to_string(path).map_err(|e| LoaderError::io(path, e))?;
    let mut list = vec![String::new()];
    list.extend(content.lines().map(str::to_string));
    Ok(list)
}

/// Order `available` mods for loading.
pub fn compute_load_order(
    available: &[ModDescriptor],
    allow: &[String],
    deny: &[String],
) -> LoadOrder {
    let mut order = LoadOrder::default();

    let considered = available.iter().filter(|descriptor| {
        let id = descriptor.id();
        if allow.is_empty() {
            !deny.iter().any(|entry| entry == id)
        } else {
            allow.iter().any(|entry| entry == id)
        }
    });

    for descriptor in considered {
        let mut excluded = false;

        for dependency in &descriptor.metadata.dependencies {
            match available.iter().find(|known| known.id() == dependency) {
                Some(found) => {
                    if !order.contains(found.id()) {
                        order.mods.push(found.clone());
                    }
                }
                None => {
                    let diagnostic = LoaderError::MissingDependency {
                        mod_id: descriptor.id().to_string(),
                        dependency: dependency.clone(),
                    };
                    log::warn!("{}, not loading it", diagnostic);
                    order.excluded.push(diagnostic);
                    excluded = true;
                }
            }
        }

        if !excluded && !order.contains(descriptor.id()) {
            order.mods.push(descriptor.clone());
        }
    }

    log::info!("Load order: {}", order.ids().join(", "));
    order
}
