//! Data-driven mods.
//!
//! A mod without compiled-in logic can describe its patches in a
//! `patches.json` manifest. Scripts are looked up by file name in the mod's
//! `scripts` directory.
//!
//! ```json
//! {
//!   "patches": [
//!     { "op": "hook_code", "target": "scr_score", "script": "score.asm" },
//!     { "op": "hard_hook", "target": "scr_damage", "script": "damage.asm", "argc": 2 },
//!     { "op": "create_function", "target": "scr_bonus", "script": "bonus.asm", "argc": 0 }
//!   ],
//!   "interop": [
//!     { "name": "score_changed", "argc": 1, "symbol": "on_score_changed" }
//!   ]
//! }
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::api::PatchApi;
use super::{InteropExport, Mod};

pub const MANIFEST_FILE: &str = "patches.json";

/// A single manifest entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PatchOp {
    HookCode {
        target: String,
        script: String,
    },
    HookFunction {
        target: String,
        script: String,
    },
    HardHook {
        target: String,
        script: String,
        argc: u16,
    },
    CreateFunction {
        target: String,
        script: String,
        #[serde(default)]
        argc: u16,
    },
}

impl PatchOp {
    pub fn script(&self) -> &str {
        match self {
            PatchOp::HookCode { script, .. }
            | PatchOp::HookFunction { script, .. }
            | PatchOp::HardHook { script, .. }
            | PatchOp::CreateFunction { script, .. } => script,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub patches: Vec<PatchOp>,
    #[serde(default)]
    pub interop: Vec<InteropExport>,
}

/// Mod driven entirely by a [`Manifest`].
#[derive(Debug, Clone)]
pub struct ScriptMod {
    manifest: Manifest,
}

impl ScriptMod {
    pub fn new(manifest: Manifest) -> Self {
        Self { manifest }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest {}", path.display()))?;
        let manifest = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse manifest {}", path.display()))?;
        Ok(Self::new(manifest))
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }
}

impl Mod for ScriptMod {
    fn patch(&mut self, api: &mut PatchApi<'_>) -> Result<()> {
        for op in &self.manifest.patches {
            // Unlike the file helpers on PatchApi, a manifest naming a missing
            // script is an error.
            let source = api
                .script(op.script())
                .with_context(|| format!("script {} is not loaded", op.script()))?
                .to_string();

            match op {
                PatchOp::HookCode { target, .. } => {
                    api.hook_code(target, &source)?;
                }
                PatchOp::HookFunction { target, .. } => {
                    api.hook_function(target, &source)?;
                }
                PatchOp::HardHook { target, argc, .. } => {
                    api.hard_hook(target, &source, *argc)?;
                }
                PatchOp::CreateFunction { target, argc, .. } => {
                    api.create_function(target, &source, *argc)?;
                }
            }
        }
        Ok(())
    }

    fn interop_exports(&self) -> Vec<InteropExport> {
        self.manifest.interop.clone()
    }
}
