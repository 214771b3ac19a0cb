//! Command-line output of the `autoanalyst` binary

use std::process::Command;

use anyhow::Result;
use tempfile::TempDir;

/// A failed run prints the error and recovery plan on stdout; logs go to stderr
#[test]
fn test_recovery_plan_printed_to_stdout() -> Result<()> {
    let dir = TempDir::new()?;

    let output = Command::new(env!("CARGO_BIN_EXE_autoanalyst"))
        .current_dir(dir.path())
        .env("RUST_LOG", "autoanalyst=info")
        .args(["--input-dir", "missing", "--output-dir", "out"])
        .output()?;

    assert_eq!(output.status.code(), Some(1));

    let stdout = String::from_utf8(output.stdout)?;
    assert!(stdout.contains("Error during execution: Stage data_loading failed"));
    assert!(stdout.contains("Recovery plan:\nFailed task: data_loading\nRecovery steps:\n"));
    assert!(stdout.contains("- Verify input data exists and is accessible"));
    assert!(!stdout.contains("INFO"));

    let stderr = String::from_utf8(output.stderr)?;
    assert!(stderr.contains("Executing task: data_loading"));
    assert!(!stderr.contains("Recovery plan:"));

    Ok(())
}
