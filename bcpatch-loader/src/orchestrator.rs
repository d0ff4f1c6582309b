//! Mod Lifecycle Orchestrator
//!
//! Drives one run: discover mods, order them, decide whether the image must be
//! rebuilt, take every mod through its phases and persist the results.
//!
//! # Phases
//!
//! Every phase completes for every mod before the next phase starts:
//!
//! ```text
//! instantiate ──► [fingerprint changed?] ──► prepare ──► patch ──► finalize ──► write image
//!                        │ no                                                    │
//!                        └──────────────────────────► start ◄────────────────────┘
//!                                                       │
//!                                                store fingerprint
//! ```
//!
//! The first failure ends the run. Nothing is written after it; in particular
//! the fingerprint is only stored once every mod has started, so the next run
//! rebuilds again.

use bcpatch_core::asm::{AsmCompiler, Compiler};
use bcpatch_core::hooker::{HookEngine, PatchSession};
use bcpatch_core::image::codec::ImageCodec;
use bcpatch_core::image::BytecodeImage;

use crate::config::LoaderConfig;
use crate::error::{LoaderError, Phase, RunError};
use crate::fingerprint::{BuildFingerprint, FingerprintCache};
use crate::mods::api::PatchApi;
use crate::mods::interop;
use crate::mods::loader::{compute_load_order, discover_mods, load_list, LoadOrder};
use crate::mods::loader::{ALLOW_LIST_FILE, DENY_LIST_FILE};
use crate::mods::{Mod, ModCatalog, ModDescriptor, ModEnvironment};
use crate::LOADER_VERSION;

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    /// Image the host program should load, relative to the base directory
    pub artifact: String,
    /// Whether the image was rebuilt during this run
    pub rebuilt: bool,
    /// Ids of the loaded mods, in load order
    pub mods: Vec<String>,
}

/// Image selected for launch after [`run_and_fallback`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchChoice {
    pub artifact: String,
    /// `false` when the run failed and the unmodified image was selected
    pub modded: bool,
}

struct LoadedMod {
    descriptor: ModDescriptor,
    logic: Box<dyn Mod>,
}

pub struct Orchestrator {
    config: LoaderConfig,
    catalog: ModCatalog,
    exe_name: String,
    codec: Box<dyn ImageCodec>,
    compiler: Box<dyn Compiler>,
}

impl Orchestrator {
    /// Orchestrator for the host executable `exe_name`, using the image codec
    /// from `config` and the strict assembler.
    pub fn new(config: LoaderConfig, catalog: ModCatalog, exe_name: impl Into<String>) -> Self {
        let codec = Box::new(config.image_codec());
        Self {
            config,
            catalog,
            exe_name: exe_name.into(),
            codec,
            compiler: Box::new(AsmCompiler::strict()),
        }
    }

    pub fn with_codec(mut self, codec: Box<dyn ImageCodec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_compiler(mut self, compiler: Box<dyn Compiler>) -> Self {
        self.compiler = compiler;
        self
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn catalog(&self) -> &ModCatalog {
        &self.catalog
    }

    /// Discover mods and compute their load order.
    pub fn load_order(&self) -> Result<LoadOrder, LoaderError> {
        let mods_dir = self.config.mods_path();
        let available = discover_mods(&mods_dir)?;
        let allow = load_list(&mods_dir.join(ALLOW_LIST_FILE))?;
        let deny = load_list(&mods_dir.join(DENY_LIST_FILE))?;
        Ok(compute_load_order(&available, &allow, &deny))
    }

    pub fn fingerprint(&self, order: &LoadOrder) -> Result<BuildFingerprint, LoaderError> {
        BuildFingerprint::compute(
            &self.exe_name,
            &self.config.base_image_path(),
            LOADER_VERSION,
            &order.mods,
            &self.catalog,
        )
    }

    pub fn fingerprint_cache(&self) -> FingerprintCache {
        FingerprintCache::new(self.config.fingerprint_path())
    }

    /// Run every phase for every mod.
    pub fn run(&self) -> Result<RunOutcome, RunError> {
        let base_image = self.config.base_image_path();
        let artifact = self.config.artifact_path();
        if !base_image.is_file() {
            return Err(LoaderError::NotFound(format!(
                "base image {}",
                base_image.display()
            )));
        }

        let order = self.load_order()?;
        if order.is_empty() {
            log::info!("No mods to load, using an unmodified copy of the base image");
            std::fs::copy(&base_image, &artifact).map_err(|e| LoaderError::io(&artifact, e))?;
            // The artifact no longer matches any earlier build.
            self.fingerprint_cache().clear()?;
            return Ok(RunOutcome {
                artifact: self.config.artifact.clone(),
                rebuilt: false,
                mods: Vec::new(),
            });
        }

        let fingerprint = self.fingerprint(&order)?;
        let cache = self.fingerprint_cache();

        let mut loaded = self.instantiate(order.mods)?;

        let rebuilt = !cache.is_current(&fingerprint)? || !artifact.exists();
        if rebuilt {
            log::info!("Inputs changed, rebuilding {}", self.config.artifact);
            let image = self.rebuild(&mut loaded)?;
            log::info!("Saving modified image to {}", artifact.display());
            self.codec.write(&image, &artifact)?;
        } else {
            log::info!("Inputs unchanged, reusing {}", self.config.artifact);
        }

        for module in &mut loaded {
            log::info!("Starting mod {}", module.descriptor.id());
            module
                .logic
                .start(&module.descriptor)
                .map_err(|source| LoaderError::StartFailure {
                    mod_id: module.descriptor.id().to_string(),
                    source,
                })?;
        }

        cache.store(&fingerprint)?;

        Ok(RunOutcome {
            artifact: self.config.artifact.clone(),
            rebuilt,
            mods: loaded
                .iter()
                .map(|module| module.descriptor.id().to_string())
                .collect(),
        })
    }

    fn instantiate(&self, mods: Vec<ModDescriptor>) -> Result<Vec<LoadedMod>, LoaderError> {
        let mut loaded = Vec::with_capacity(mods.len());
        for descriptor in mods {
            log::info!("Loading mod {}...", descriptor.id());
            let logic = self
                .catalog
                .instantiate(&descriptor)
                .map_err(|source| patch_failure(&descriptor, Phase::Instantiate, source))?;
            loaded.push(LoadedMod { descriptor, logic });
        }
        Ok(loaded)
    }

    /// Read the base image and apply every mod to it.
    fn rebuild(&self, loaded: &mut [LoadedMod]) -> Result<BytecodeImage, LoaderError> {
        log::info!("Reading {}...", self.config.base_image);
        let mut image = self.codec.read(&self.config.base_image_path())?;
        let mut session = PatchSession::new();
        let compiler = self.compiler.as_ref();

        {
            let mut engine = HookEngine::new(&mut image, &mut session, compiler);
            interop::setup_interop(&mut engine, &self.config.interop_library_path()).map_err(
                |source| LoaderError::HookFailure {
                    phase: Phase::Interop,
                    source,
                },
            )?;
        }

        let mut environments = Vec::with_capacity(loaded.len());
        for module in loaded.iter_mut() {
            log::info!("Preparing mod {}", module.descriptor.id());
            let env = ModEnvironment::load(&module.descriptor)?;
            module
                .logic
                .prepare(&env, &image)
                .map_err(|source| patch_failure(&module.descriptor, Phase::Prepare, source))?;
            environments.push(env);
        }

        for (module, env) in loaded.iter_mut().zip(&environments) {
            log::info!("Patching mod {}", module.descriptor.id());
            let engine = HookEngine::new(&mut image, &mut session, compiler);
            let mut api = PatchApi::new(engine, env, &self.config.placeholder);
            module
                .logic
                .patch(&mut api)
                .map_err(|source| patch_failure(&module.descriptor, Phase::Patch, source))?;

            for export in module.logic.interop_exports() {
                interop::register_export(api.engine_mut(), module.descriptor.id(), &export)
                    .map_err(|source| {
                        patch_failure(&module.descriptor, Phase::Interop, source.into())
                    })?;
            }
        }

        let rewritten = HookEngine::new(&mut image, &mut session, compiler)
            .finalize_hooks()
            .map_err(|source| LoaderError::HookFailure {
                phase: Phase::Finalize,
                source,
            })?;
        log::info!(
            "Finalized hooks: {} rewrites, {} instructions total",
            rewritten,
            image.instruction_count()
        );

        Ok(image)
    }
}

fn patch_failure(descriptor: &ModDescriptor, phase: Phase, source: anyhow::Error) -> LoaderError {
    LoaderError::PatchFailure {
        mod_id: descriptor.id().to_string(),
        phase,
        source,
    }
}

/// Run the orchestrator and pick the image to launch.
///
/// On failure the full error chain is written to the diagnostic file and,
/// when `confirm_on_failure` is set, `confirm` is called (typically waiting for
/// Enter) before the unmodified base image is selected.
pub fn run_and_fallback<F>(orchestrator: &Orchestrator, confirm: F) -> LaunchChoice
where
    F: FnOnce(),
{
    let config = orchestrator.config();
    match orchestrator.run() {
        Ok(outcome) => LaunchChoice {
            artifact: outcome.artifact,
            modded: true,
        },
        Err(err) => {
            let report = format!("{:?}", anyhow::Error::new(err));
            log::error!("Modding failed, launching the unmodified game:\n{}", report);

            let path = config.diagnostic_path();
            let written = path
                .parent()
                .map_or(Ok(()), std::fs::create_dir_all)
                .and_then(|()| std::fs::write(&path, &report));
            match written {
                Ok(()) => log::error!("Error details written to {}", path.display()),
                Err(e) => log::error!("Failed to write {}: {}", path.display(), e),
            }

            if config.confirm_on_failure {
                confirm();
            }

            LaunchChoice {
                artifact: config.base_image.clone(),
                modded: false,
            }
        }
    }
}
