// CLI application
use anyhow::Result;
use bcpatch_cli::commands::{disasm, patch, run_game, show_fingerprint, show_order};
use bcpatch_loader::config::LoaderConfig;
use bcpatch_loader::mods::ModCatalog;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "bcpatch")]
#[command(about = "Bytecode image mod loader")]
#[command(version)]
struct Cli {
    /// Directory of the host program
    #[arg(short, long, default_value = ".", global = true)]
    base_dir: PathBuf,

    /// Configuration file (default: <base-dir>/bcpatch.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Patch if needed, then launch the host program
    Run {
        /// Host executable followed by the arguments to forward
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Patch without launching
    Patch {
        /// Host executable name, part of the build fingerprint
        #[arg(short, long, default_value = "game.exe")]
        exe: String,
    },
    /// Show the mod load order
    Order,
    /// Show the build fingerprint
    Fingerprint {
        #[arg(short, long, default_value = "game.exe")]
        exe: String,
    },
    /// Disassemble an image
    Disasm {
        /// Path to the image file
        image: PathBuf,

        /// Code unit to print (default: list all units)
        #[arg(short, long)]
        unit: Option<String>,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => LoaderConfig::load_from(&cli.base_dir, path)?,
        None => LoaderConfig::load(&cli.base_dir)?,
    };

    match cli.command {
        Commands::Run { args } => {
            let pb = create_progress_bar("Loading mods...")?;
            let choice = run_game(config, ModCatalog::new(), &args, &pb)?;
            if choice.modded {
                pb.finish_with_message(format!("Launched on {}", choice.artifact));
            } else {
                pb.abandon_with_message(format!("Modding failed, launched on {}", choice.artifact));
            }
        }
        Commands::Patch { exe } => {
            let pb = create_progress_bar("Patching image...")?;
            patch(config, ModCatalog::new(), &exe)?;
            pb.finish_with_message("Patching complete");
        }
        Commands::Order => show_order(config)?,
        Commands::Fingerprint { exe } => show_fingerprint(config, ModCatalog::new(), &exe)?,
        Commands::Disasm { image, unit } => disasm(&image, unit.as_deref())?,
    }

    Ok(())
}

fn create_progress_bar(message: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")?
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    Ok(pb)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_forwards_hyphenated_arguments() {
        let cli = Cli::try_parse_from(["bcpatch", "-b", "/games/x", "run", "game.exe", "-debug", "save1"])
            .unwrap();
        assert_eq!(cli.base_dir, PathBuf::from("/games/x"));
        match cli.command {
            Commands::Run { args } => assert_eq!(args, ["game.exe", "-debug", "save1"]),
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_run_requires_executable() {
        assert!(Cli::try_parse_from(["bcpatch", "run"]).is_err());
    }
}
