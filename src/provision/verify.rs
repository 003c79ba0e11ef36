//! Version-probe verification.
//!
//! A candidate is accepted only if `<binary> --version` exits cleanly within
//! the probe timeout. A probe that hangs is killed when the timeout drops it.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::provision::error::{ProvisionError, ProvisionResult};

/// Run the version probe. Returns the first line of output on success.
pub async fn verify_binary(path: &Path, timeout: Duration) -> ProvisionResult<String> {
    let failed = |output: String| ProvisionError::VerificationFailed {
        path: path.to_path_buf(),
        output,
    };

    let probe = Command::new(path)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output();

    let output = match tokio::time::timeout(timeout, probe).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => return Err(failed(e.to_string())),
        Err(_) => return Err(failed(format!("no answer within {:?}", timeout))),
    };

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    if !output.status.success() {
        let detail = [stdout.trim(), stderr.trim()]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        return Err(failed(format!("{}: {}", output.status, detail)));
    }

    let version = stdout
        .lines()
        .chain(stderr.lines())
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default()
        .to_string();

    tracing::debug!(path = %path.display(), version = %version, "Binary verified");
    Ok(version)
}
