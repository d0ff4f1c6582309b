// CLI command handlers
use anyhow::{Context, Result};
use indicatif::ProgressBar;
use std::path::Path;

use bcpatch_core::asm::disassemble;
use bcpatch_core::image::codec::{ImageCodec, ImageFile};
use bcpatch_loader::config::LoaderConfig;
use bcpatch_loader::launch::launch;
use bcpatch_loader::mods::ModCatalog;
use bcpatch_loader::orchestrator::{run_and_fallback, LaunchChoice, Orchestrator, RunOutcome};

/// Patch if needed, then start the host program.
///
/// `args` is the host command line: executable name first. `progress` is
/// hidden while waiting for the user to acknowledge a failure.
pub fn run_game(
    config: LoaderConfig,
    catalog: ModCatalog,
    args: &[String],
    progress: &ProgressBar,
) -> Result<LaunchChoice> {
    let exe = args.first().context("Missing host executable name")?;
    let base_dir = config.base_dir.clone();
    let orchestrator = Orchestrator::new(config, catalog, exe.as_str());

    let choice = run_and_fallback(&orchestrator, || progress.suspend(wait_for_enter));
    log::info!("Selected {} (modded: {})", choice.artifact, choice.modded);
    launch(&base_dir, args, &choice.artifact)
        .with_context(|| format!("Failed to launch {}", exe))?;
    Ok(choice)
}

fn wait_for_enter() {
    println!("Press Enter to continue...");
    let mut line = String::new();
    if let Err(e) = std::io::stdin().read_line(&mut line) {
        log::warn!("Failed to read confirmation: {}", e);
    }
}

/// Patch without launching.
pub fn patch(config: LoaderConfig, catalog: ModCatalog, exe: &str) -> Result<RunOutcome> {
    let orchestrator = Orchestrator::new(config, catalog, exe);
    let outcome = orchestrator.run().context("Patching failed")?;

    println!("Artifact: {}", outcome.artifact);
    println!("  Rebuilt: {}", outcome.rebuilt);
    println!("  Mods: {}", outcome.mods.join(", "));
    Ok(outcome)
}

/// Print the load order and the mods left out of it.
pub fn show_order(config: LoaderConfig) -> Result<()> {
    let orchestrator = Orchestrator::new(config, ModCatalog::new(), "");
    let order = orchestrator
        .load_order()
        .context("Failed to compute load order")?;

    println!("Load order ({} mods):", order.mods.len());
    for (index, descriptor) in order.mods.iter().enumerate() {
        println!(
            "  {}. {} {} ({})",
            index + 1,
            descriptor.metadata.name,
            descriptor.metadata.version,
            descriptor.id()
        );
    }
    if !order.excluded.is_empty() {
        println!("\nExcluded:");
        for diagnostic in &order.excluded {
            println!("  {}", diagnostic);
        }
    }
    Ok(())
}

/// Print the current build fingerprint and whether the cached build matches.
pub fn show_fingerprint(config: LoaderConfig, catalog: ModCatalog, exe: &str) -> Result<()> {
    let orchestrator = Orchestrator::new(config, catalog, exe);
    let order = orchestrator.load_order()?;
    let fingerprint = orchestrator
        .fingerprint(&order)
        .context("Failed to compute fingerprint")?;
    let cache = orchestrator.fingerprint_cache();

    println!("{}", fingerprint);
    println!("  Cached: {}", cache.path().display());
    println!("  Up to date: {}", cache.is_current(&fingerprint)?);
    Ok(())
}

/// Disassemble one code unit, or list every unit of an image.
pub fn disasm(image_path: &Path, unit: Option<&str>) -> Result<()> {
    let image = ImageFile::new()
        .read(image_path)
        .with_context(|| format!("Failed to read image: {}", image_path.display()))?;

    match unit {
        Some(name) => {
            let code = image
                .code(name)
                .with_context(|| format!("No code unit named {}", name))?;
            println!("; {} (argc={}, locals={})", code.name, code.arguments_count, code.locals_count);
            print!("{}", disassemble(code));
        }
        None => {
            println!("Code units: {}", image.code.len());
            println!("  Functions: {}", image.functions.len());
            println!("  Extension functions: {}", image.extension_functions().count());
            println!("  Instructions: {}", image.instruction_count());
            for code in &image.code {
                let parent = code
                    .parent
                    .as_deref()
                    .map(|p| format!(" -> {}", p))
                    .unwrap_or_default();
                println!(
                    "  {} argc={} len={}{}",
                    code.name,
                    code.arguments_count,
                    code.instructions.len(),
                    parent
                );
            }
        }
    }
    Ok(())
}
