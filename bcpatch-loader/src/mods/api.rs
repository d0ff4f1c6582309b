//! Public Modding API
//!
//! Mod implementations should only need this module:
//!
//! ```rust,no_run
//! use bcpatch_loader::mods::api::*;
//!
//! struct DoubleScore;
//!
//! impl Mod for DoubleScore {
//!     fn patch(&mut self, api: &mut PatchApi<'_>) -> anyhow::Result<()> {
//!         api.hook_code("scr_score", "push.a 0\ncall #orig#(argc=1)\npush.a 0\nadd\nret")?;
//!         Ok(())
//!     }
//! }
//!
//! let mut catalog = ModCatalog::new();
//! catalog.register("double_score", |_| Ok(Box::new(DoubleScore) as Box<dyn Mod>));
//! ```

pub use crate::mods::{
    InteropExport, Mod, ModCatalog, ModDescriptor, ModEnvironment, ModMetadata,
};
pub use bcpatch_core::error::HookError;
pub use bcpatch_core::hooker::AsmCursor;
pub use bcpatch_core::image::{BytecodeImage, CodeUnit, Instruction};

use bcpatch_core::hooker::HookEngine;

/// What a mod sees during its patch phase.
///
/// Wraps the hook engine with the mod's loaded scripts and the configured
/// placeholder token.
pub struct PatchApi<'a> {
    engine: HookEngine<'a>,
    env: &'a ModEnvironment,
    placeholder: &'a str,
}

impl<'a> PatchApi<'a> {
    pub fn new(engine: HookEngine<'a>, env: &'a ModEnvironment, placeholder: &'a str) -> Self {
        Self {
            engine,
            env,
            placeholder,
        }
    }

    pub fn descriptor(&self) -> &ModDescriptor {
        self.env.descriptor()
    }

    pub fn image(&self) -> &BytecodeImage {
        self.engine.image()
    }

    pub fn image_mut(&mut self) -> &mut BytecodeImage {
        self.engine.image_mut()
    }

    pub fn engine_mut(&mut self) -> &mut HookEngine<'a> {
        &mut self.engine
    }

    /// Source of a file from the mod's `scripts` directory.
    pub fn script(&self, file: &str) -> Option<&str> {
        self.env.script(file)
    }

    /// Soft hook a code unit. See [`HookEngine::hook`].
    pub fn hook_code(&mut self, code: &str, source: &str) -> Result<String, HookError> {
        self.engine.hook(code, source, self.placeholder)
    }

    /// Hard hook a function with its declared arity.
    pub fn hook_function(&mut self, function: &str, source: &str) -> Result<String, HookError> {
        self.engine.hook_function(function, source, self.placeholder)
    }

    pub fn hard_hook(&mut self, function: &str, source: &str, argc: u16) -> Result<String, HookError> {
        self.engine.hard_hook(function, source, argc, self.placeholder)
    }

    pub fn hook_asm<F>(&mut self, name: &str, edit: F) -> Result<(), HookError>
    where
        F: FnOnce(&mut AsmCursor<'_>),
    {
        self.engine.hook_asm(name, edit)
    }

    pub fn create_function(&mut self, name: &str, source: &str, argc: u16) -> Result<(), HookError> {
        self.engine.create_function(name, source, argc)
    }

    /// Soft hook `code` with a script file. Missing scripts are skipped.
    pub fn hook_code_from_file(&mut self, file: &str, code: &str) -> Result<(), HookError> {
        match self.env.script(file) {
            Some(source) => {
                log::info!("Loading {}", file);
                self.engine.hook(code, source, self.placeholder).map(drop)
            }
            None => {
                log::warn!("Couldn't hook code {}, script {} is not loaded", code, file);
                Ok(())
            }
        }
    }

    /// Hard hook `function` with a script file. Missing scripts are skipped.
    pub fn hook_function_from_file(&mut self, file: &str, function: &str) -> Result<(), HookError> {
        match self.env.script(file) {
            Some(source) => {
                log::info!("Loading {}", file);
                self.engine
                    .hook_function(function, source, self.placeholder)
                    .map(drop)
            }
            None => {
                log::warn!("Couldn't hook function {}, script {} is not loaded", function, file);
                Ok(())
            }
        }
    }

    /// Create a function from a script file. Missing scripts are skipped.
    pub fn create_function_from_file(
        &mut self,
        file: &str,
        name: &str,
        argc: u16,
    ) -> Result<(), HookError> {
        match self.env.script(file) {
            Some(source) => {
                log::info!("Loading {}", file);
                self.engine.create_function(name, source, argc)
            }
            None => {
                log::warn!("Couldn't create function {}, script {} is not loaded", name, file);
                Ok(())
            }
        }
    }
}
