//! Loader configuration.
//!
//! Read from `bcpatch.json` in the host program's directory. Every field is
//! optional; relative paths are resolved against the base directory.
//!
//! ```json
//! {
//!   "mods_dir": "bcpatch/mods",
//!   "base_image": "data.win",
//!   "artifact": "cache.win",
//!   "compress_image": true,
//!   "confirm_on_failure": false
//! }
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bcpatch_core::hooker::DEFAULT_PLACEHOLDER;
use bcpatch_core::image::codec::ImageFile;
use serde::{Deserialize, Serialize};

/// Name of the configuration file inside the base directory.
pub const CONFIG_FILE: &str = "bcpatch.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Directory of the host program; set by [`LoaderConfig::load`]
    #[serde(skip)]
    pub base_dir: PathBuf,
    pub mods_dir: PathBuf,
    /// Unmodified image, relative to the base directory
    pub base_image: String,
    /// Rebuilt image, relative to the base directory
    pub artifact: String,
    pub fingerprint_file: PathBuf,
    pub diagnostic_file: PathBuf,
    /// Native library backing interop exports
    pub interop_library: PathBuf,
    pub compress_image: bool,
    pub compression_level: i32,
    /// Wait for Enter before falling back to the unmodified image
    pub confirm_on_failure: bool,
    pub placeholder: String,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            mods_dir: PathBuf::from("bcpatch/mods"),
            base_image: "data.win".to_string(),
            artifact: "cache.win".to_string(),
            fingerprint_file: PathBuf::from("bcpatch/cache.fingerprint"),
            diagnostic_file: PathBuf::from("bcpatch/error.txt"),
            interop_library: PathBuf::from("bcpatch/interop/bcpatch-interop.dll"),
            compress_image: false,
            compression_level: 3,
            confirm_on_failure: true,
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
        }
    }
}

impl LoaderConfig {
    /// Defaults rooted at `base_dir`.
    pub fn for_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            ..Self::default()
        }
    }

    /// Load `bcpatch.json` from `base_dir`, or the defaults when absent.
    pub fn load(base_dir: &Path) -> Result<Self> {
        Self::load_from(base_dir, &base_dir.join(CONFIG_FILE))
    }

    /// Load an explicit configuration file, rooted at `base_dir`.
    pub fn load_from(base_dir: &Path, path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str::<LoaderConfig>(&content)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?
        } else {
            log::debug!("No config file at {}, using defaults", path.display());
            Self::default()
        };
        config.base_dir = base_dir.to_path_buf();
        Ok(config)
    }

    pub fn mods_path(&self) -> PathBuf {
        self.base_dir.join(&self.mods_dir)
    }

    pub fn base_image_path(&self) -> PathBuf {
        self.base_dir.join(&self.base_image)
    }

    pub fn artifact_path(&self) -> PathBuf {
        self.base_dir.join(&self.artifact)
    }

    pub fn fingerprint_path(&self) -> PathBuf {
        self.base_dir.join(&self.fingerprint_file)
    }

    pub fn diagnostic_path(&self) -> PathBuf {
        self.base_dir.join(&self.diagnostic_file)
    }

    pub fn interop_library_path(&self) -> PathBuf {
        self.base_dir.join(&self.interop_library)
    }

    /// Image codec matching the compression settings.
    pub fn image_codec(&self) -> ImageFile {
        if self.compress_image {
            ImageFile::compressed(self.compression_level)
        } else {
            ImageFile::new()
        }
    }
}
