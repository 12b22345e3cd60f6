//! Import search path discovery
//!
//! Asks the configured interpreter for its `sys.path` and filters out
//! entries that can never contain `.py` sources: zip archives and the
//! compiled-extension `lib-dynload` directory.

use crate::error::{PythonError, PythonResult};
use std::path::Path;
use std::process::Command;
use tracing::{debug, trace};

/// Program handed to `python -c`: one `sys.path` entry per line.
const PRINT_SYS_PATH: &str = "import sys\nfor entry in sys.path:\n    print(entry)";

/// Run the interpreter and return its filtered search roots, in order.
pub fn discover_search_paths(interpreter: &Path) -> PythonResult<Vec<String>> {
    debug!("discovering sys.path via {:?}", interpreter);

    let output = Command::new(interpreter)
        .arg("-c")
        .arg(PRINT_SYS_PATH)
        .output()
        .map_err(|source| PythonError::SpawnFailed {
            interpreter: interpreter.to_path_buf(),
            source,
        })?;

    if !output.status.success() {
        return Err(PythonError::CommandFailed {
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    let stdout = std::str::from_utf8(&output.stdout).map_err(|_| PythonError::InvalidOutput)?;
    let paths = filter_search_paths(stdout);
    trace!("discovered {} search roots", paths.len());
    Ok(paths)
}

/// Drop empty lines, zip archives, and `lib-dynload` entries.
fn filter_search_paths(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter(|line| !line.is_empty())
        .filter(|line| !line.ends_with(".zip") && !line.ends_with("lib-dynload"))
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_drops_zip_and_dynload() {
        let stdout = "\n\
            /usr/lib/python311.zip\n\
            /usr/lib/python3.11\n\
            /usr/lib/python3.11/lib-dynload\n\
            \n\
            /usr/lib/python3.11/site-packages\n";
        let paths = filter_search_paths(stdout);
        assert_eq!(
            paths,
            vec![
                "/usr/lib/python3.11".to_string(),
                "/usr/lib/python3.11/site-packages".to_string(),
            ]
        );
    }

    #[test]
    fn test_filter_preserves_order_and_duplicates() {
        let stdout = "/a\n/b\n/a\n";
        assert_eq!(filter_search_paths(stdout), vec!["/a", "/b", "/a"]);
    }

    #[test]
    fn test_missing_interpreter_is_spawn_failure() {
        let err = discover_search_paths(Path::new("/nonexistent/python")).unwrap_err();
        assert!(matches!(err, PythonError::SpawnFailed { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_interpreter_reports_status() {
        // A shell balks at the Python program and exits non-zero.
        let err = discover_search_paths(Path::new("/bin/sh")).unwrap_err();
        match err {
            PythonError::CommandFailed { status, .. } => assert!(!status.success()),
            other => panic!("expected CommandFailed, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_fake_interpreter_output_is_parsed() {
        use std::io::Write;
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("python");
        {
            let mut file = std::fs::File::create(&script).unwrap();
            writeln!(file, "#!/bin/sh").unwrap();
            writeln!(file, "echo /roots/stdlib").unwrap();
            writeln!(file, "echo /roots/stdlib.zip").unwrap();
            writeln!(file, "echo /roots/site-packages").unwrap();
        }
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let paths = discover_search_paths(&script).unwrap();
        assert_eq!(paths, vec!["/roots/stdlib", "/roots/site-packages"]);
    }
}
