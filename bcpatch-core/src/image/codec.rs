//! Image File Codec
//!
//! Reads and writes [`BytecodeImage`]s. The patcher only talks to the
//! [`ImageCodec`] trait; [`ImageFile`] is the bundled implementation, a JSON
//! document that may be zstd compressed. Compression is detected on read from
//! the zstd frame magic, so compressed and plain images can be mixed freely.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::BytecodeImage;

/// zstd frame magic number (little endian 0xFD2FB528).
const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

/// Errors raised while reading or writing an image file.
#[derive(Error, Debug)]
pub enum ImageError {
    #[error("failed to access image file {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed image file {}", .path.display())]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to (de)compress image file {}", .path.display())]
    Compression {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Reads a base image into memory and writes a rebuilt image back.
pub trait ImageCodec {
    fn read(&self, path: &Path) -> Result<BytecodeImage, ImageError>;
    fn write(&self, image: &BytecodeImage, path: &Path) -> Result<(), ImageError>;
}

/// JSON image file, optionally zstd compressed.
#[derive(Debug, Clone, Copy)]
pub struct ImageFile {
    compress: bool,
    level: i32,
}

impl ImageFile {
    /// Plain JSON output.
    pub fn new() -> Self {
        Self {
            compress: false,
            level: 0,
        }
    }

    /// zstd compressed output at `level` (clamped to 1-22).
    pub fn compressed(level: i32) -> Self {
        Self {
            compress: true,
            level: level.clamp(1, 22),
        }
    }

    pub fn is_compressed(&self) -> bool {
        self.compress
    }
}

impl Default for ImageFile {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageCodec for ImageFile {
    fn read(&self, path: &Path) -> Result<BytecodeImage, ImageError> {
        let raw = fs::read(path).map_err(|source| ImageError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let data = if raw.starts_with(&ZSTD_MAGIC) {
            log::debug!("Decompressing image {}", path.display());
            zstd::decode_all(&raw[..]).map_err(|source| ImageError::Compression {
                path: path.to_path_buf(),
                source,
            })?
        } else {
            raw
        };

        serde_json::from_slice(&data).map_err(|source| ImageError::Format {
            path: path.to_path_buf(),
            source,
        })
    }

    fn write(&self, image: &BytecodeImage, path: &Path) -> Result<(), ImageError> {
        let json = if self.compress {
            serde_json::to_vec(image)
        } else {
            serde_json::to_vec_pretty(image)
        }
        .map_err(|source| ImageError::Format {
            path: path.to_path_buf(),
            source,
        })?;

        let data = if self.compress {
            zstd::encode_all(&json[..], self.level).map_err(|source| ImageError::Compression {
                path: path.to_path_buf(),
                source,
            })?
        } else {
            json
        };

        fs::write(path, data).map_err(|source| ImageError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}
