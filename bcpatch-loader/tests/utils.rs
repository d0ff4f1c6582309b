//! Test Utilities
//!
//! Builds a throwaway host program directory: a base image, a mods directory
//! and a [`LoaderConfig`] pointing at both.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use bcpatch_core::asm::{AsmCompiler, Compiler};
use bcpatch_core::image::codec::{ImageCodec, ImageFile};
use bcpatch_core::image::{BytecodeImage, CodeUnit};
use bcpatch_loader::config::LoaderConfig;
use tempfile::TempDir;

pub const EXE: &str = "game.exe";

pub struct Fixture {
    pub dir: TempDir,
    pub config: LoaderConfig,
}

impl Fixture {
    /// Base directory with the default base image and no mods.
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = LoaderConfig::for_base_dir(dir.path());
        config.confirm_on_failure = false;
        std::fs::create_dir_all(config.mods_path()).unwrap();

        let fixture = Self { dir, config };
        fixture.write_base_image(&base_image());
        fixture
    }

    pub fn base(&self) -> &Path {
        self.dir.path()
    }

    pub fn write_base_image(&self, image: &BytecodeImage) {
        ImageFile::new()
            .write(image, &self.config.base_image_path())
            .unwrap();
    }

    pub fn read_artifact(&self) -> BytecodeImage {
        ImageFile::new().read(&self.config.artifact_path()).unwrap()
    }

    /// Create a mod directory with metadata, an optional manifest and scripts.
    pub fn add_mod(
        &self,
        id: &str,
        dependencies: &[&str],
        manifest: Option<&str>,
        scripts: &[(&str, &str)],
    ) -> PathBuf {
        let dir = self.config.mods_path().join(id);
        std::fs::create_dir_all(dir.join("scripts")).unwrap();

        let metadata = serde_json::json!({
            "name": id.to_uppercase(),
            "id": id,
            "version": "1.0.0",
            "description": format!("test mod {}", id),
            "dependencies": dependencies,
        });
        std::fs::write(dir.join("mod.json"), metadata.to_string()).unwrap();

        if let Some(manifest) = manifest {
            std::fs::write(dir.join("patches.json"), manifest).unwrap();
        }
        for (name, source) in scripts {
            std::fs::write(dir.join("scripts").join(name), source).unwrap();
        }
        dir
    }

    pub fn fingerprint_stored(&self) -> bool {
        self.config.fingerprint_path().exists()
    }
}

/// `scr_main` returns `scr_score(10)`, which returns its argument plus one.
pub fn base_image() -> BytecodeImage {
    let mut image = BytecodeImage::default();
    for (name, argc, source) in [
        ("scr_main", 0, "push.l 10\ncall scr_score(argc=1)\nret"),
        ("scr_score", 1, "push.a 0\npush.l 1\nadd\nret"),
    ] {
        let instructions = AsmCompiler::new()
            .compile(&BytecodeImage::default(), name, source)
            .unwrap();
        image
            .code
            .push(CodeUnit::new(name, argc).with_instructions(instructions));
        image.declare_function(name, Some(name));
    }
    image
}

/// Manifest soft hooking `scr_score` with `script`.
pub fn hook_score_manifest(script: &str) -> String {
    format!(
        r#"{{ "patches": [ {{ "op": "hook_code", "target": "scr_score", "script": "{}" }} ] }}"#,
        script
    )
}
