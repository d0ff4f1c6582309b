//! Host program launch.

use std::path::Path;
use std::process::{Child, Command};

use crate::error::LoaderError;

/// Arguments for the host program: `-game <artifact>`, then `forwarded`.
pub fn launch_arguments(artifact: &str, forwarded: &[String]) -> Vec<String> {
    let mut args = Vec::with_capacity(forwarded.len() + 2);
    args.push("-game".to_string());
    args.push(artifact.to_string());
    args.extend(forwarded.iter().cloned());
    args
}

/// Start `<base_dir>/<exe>` on `artifact` without waiting for it.
///
/// `args` is the original command line of the host program: the executable
/// name followed by the arguments to forward.
pub fn launch(base_dir: &Path, args: &[String], artifact: &str) -> Result<Child, LoaderError> {
    let (exe, forwarded) = args
        .split_first()
        .ok_or(LoaderError::EmptyCommandLine)?;
    let program = base_dir.join(exe);

    log::info!("Launching {} on {}", program.display(), artifact);
    Command::new(&program)
        .current_dir(base_dir)
        .args(launch_arguments(artifact, forwarded))
        .spawn()
        .map_err(|e| LoaderError::io(program, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_game_argument_comes_first() {
        let forwarded = vec!["-debug".to_string(), "save1".to_string()];
        assert_eq!(
            launch_arguments("cache.win", &forwarded),
            ["-game", "cache.win", "-debug", "save1"]
        );
    }

    #[test]
    fn test_launch_without_executable() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            launch(dir.path(), &[], "cache.win"),
            Err(LoaderError::EmptyCommandLine)
        ));
        assert!(matches!(
            launch(dir.path(), &["missing.exe".to_string()], "cache.win"),
            Err(LoaderError::Io { .. })
        ));
    }
}
