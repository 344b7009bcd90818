use std::process::Command;

use tracing::{info, warn};

use crate::config::BuildParams;

/// Run an ordered list of shell command hooks, each blocking until it
/// exits, with build-parameter substitution applied to its text. A hook
/// that fails to spawn or exits non-zero is reported and skipped; hooks
/// never abort the run.
pub fn run_hooks(stage: &str, commands: &[String], params: &BuildParams) {
    for command in commands {
        let line = params.substitute(command);
        info!("Running {stage} command: {line}");

        let mut parts = line.split_whitespace();
        let Some(program) = parts.next() else {
            warn!("Skipping empty {stage} command");
            continue;
        };

        match Command::new(program).args(parts).status() {
            Ok(status) if status.success() => {}
            Ok(status) => warn!("{stage} command '{line}' exited with {status}"),
            Err(error) => warn!("Failed to run {stage} command '{line}': {error}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(dir: &std::path::Path) -> BuildParams {
        BuildParams {
            asset_directory: dir.to_owned(),
            cache_directory: dir.to_owned(),
            output_directory: dir.to_owned(),
            tmp_directory: dir.to_owned(),
            working_directory: dir.to_owned(),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_hooks_run_in_order() {
        let dir = tempfile::TempDir::new().unwrap();
        let first = dir.path().join("first");
        let second = dir.path().join("second");
        run_hooks(
            "prebuild",
            &[
                format!("touch {}", first.display()),
                format!("touch {}", second.display()),
            ],
            &params(dir.path()),
        );
        assert!(first.exists());
        assert!(second.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_hook_does_not_abort() {
        let dir = tempfile::TempDir::new().unwrap();
        let after = dir.path().join("after");
        run_hooks(
            "postbuild",
            &[
                "false".to_string(),
                "no-such-hook-binary".to_string(),
                format!("touch {}", after.display()),
            ],
            &params(dir.path()),
        );
        // Both failures were reported and skipped; the last hook still ran.
        assert!(after.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_hook_receives_parameter_substitution() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut p = params(dir.path());
        p.output_directory = dir.path().join("out");
        std::fs::create_dir_all(&p.output_directory).unwrap();
        run_hooks("prebuild", &["touch %(output_directory)/marker".to_string()], &p);
        assert!(p.output_directory.join("marker").exists());
    }
}
