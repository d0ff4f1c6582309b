//! Incremental rebuild detection.
//!
//! A [`BuildFingerprint`] concatenates everything a rebuild depends on: the
//! host executable name, a hash of the base image, the loader version and,
//! for each mod in load order, its name, version, implementation build version,
//! a hash of its artifact and a hash of its hook scripts. If the fingerprint
//! stored by the previous run matches, the previously written image is still
//! valid.

use std::fmt;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::LoaderError;
use crate::mods::{ModCatalog, ModDescriptor};

/// Composite identity of one rebuild's inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildFingerprint(String);

impl BuildFingerprint {
    pub fn compute(
        exe_name: &str,
        base_image: &Path,
        loader_version: &str,
        order: &[ModDescriptor],
        catalog: &ModCatalog,
    ) -> Result<Self, LoaderError> {
        let mut value = String::new();
        value.push_str(exe_name);
        value.push_str(&hash_file(base_image)?);
        value.push_str(loader_version);

        for descriptor in order {
            value.push_str(&descriptor.metadata.name);
            value.push_str(&descriptor.metadata.version);
            let build_version = catalog.build_version(descriptor.id());
            if let Some(build_version) = build_version {
                value.push_str(build_version);
            }
            let artifact = artifact_hash(descriptor)?;
            if artifact.is_empty() && build_version.is_none() && catalog.contains(descriptor.id()) {
                log::warn!(
                    "Mod {} has no artifact and no build version; \
                     changes to its code will not trigger a rebuild",
                    descriptor.id()
                );
            }
            value.push_str(&artifact);
            value.push_str(&scripts_hash(descriptor)?);
        }

        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for BuildFingerprint {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for BuildFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lower-case hex SHA-256 of a file's contents.
pub fn hash_file(path: &Path) -> Result<String, LoaderError> {
    let file = File::open(path).map_err(|e| LoaderError::io(path, e))?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    io::copy(&mut reader, &mut hasher).map_err(|e| LoaderError::io(path, e))?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// Hash of a mod's artifact.
///
/// A mod relying on the default artifact may not have one; it then
/// contributes nothing. An artifact named in the metadata must exist.
fn artifact_hash(descriptor: &ModDescriptor) -> Result<String, LoaderError> {
    let path = descriptor.artifact_path();
    if !descriptor.declares_artifact() && !path.exists() {
        log::debug!("Mod {} has no artifact to hash", descriptor.id());
        return Ok(String::new());
    }
    hash_file(&path)
}

/// Hash over the names and contents of a mod's scripts, in file name order.
///
/// Empty when the mod has no scripts.
fn scripts_hash(descriptor: &ModDescriptor) -> Result<String, LoaderError> {
    let files = descriptor.script_files()?;
    if files.is_empty() {
        return Ok(String::new());
    }

    let mut hasher = Sha256::new();
    for path in &files {
        let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        hasher.update(name.as_bytes());
        hasher.update([0u8]);
        hasher.update(hash_file(path)?.as_bytes());
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Fingerprint persisted between runs.
#[derive(Debug, Clone)]
pub struct FingerprintCache {
    path: PathBuf,
}

impl FingerprintCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The stored fingerprint, if any.
    pub fn load(&self) -> Result<Option<BuildFingerprint>, LoaderError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content =
            std::fs::read_to_string(&self.path).map_err(|e| LoaderError::io(&self.path, e))?;
        let line = content.trim_end_matches(['\r', '\n']);
        Ok(Some(BuildFingerprint(line.to_string())))
    }

    pub fn is_current(&self, fingerprint: &BuildFingerprint) -> Result<bool, LoaderError> {
        Ok(self.load()?.as_ref() == Some(fingerprint))
    }

    /// Forget the stored fingerprint so the next run rebuilds.
    pub fn clear(&self) -> Result<(), LoaderError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                log::debug!("Removed fingerprint {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(LoaderError::io(&self.path, e)),
        }
    }

    pub fn store(&self, fingerprint: &BuildFingerprint) -> Result<(), LoaderError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| LoaderError::io(parent, e))?;
        }
        std::fs::write(&self.path, fingerprint.as_str())
            .map_err(|e| LoaderError::io(&self.path, e))?;
        log::debug!("Stored fingerprint in {}", self.path.display());
        Ok(())
    }
}
