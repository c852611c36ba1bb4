//! OS process control for terminal instances
//!
//! Windows uses `tasklist` / `taskkill`; other platforms read `/proc` and send
//! signals with `kill` (terminals running under Wine show up there too).

use crate::ports::{LaunchSpec, ProcessControl};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Image names a live terminal process may have
const TERMINAL_IMAGES: [&str; 2] = ["terminal64.exe", "terminal.exe"];

const POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Default, Clone)]
pub struct OsProcessControl;

impl OsProcessControl {
    pub fn new() -> Self {
        Self
    }
}

fn is_terminal_image(text: &str) -> bool {
    let lower = text.to_lowercase();
    TERMINAL_IMAGES.iter().any(|image| lower.contains(image))
}

#[cfg(windows)]
async fn probe(pid: u32) -> bool {
    let output = Command::new("tasklist")
        .args(["/FI", &format!("PID eq {}", pid), "/FO", "CSV", "/NH"])
        .stdin(Stdio::null())
        .output()
        .await;

    match output {
        Ok(output) if output.status.success() => {
            is_terminal_image(&String::from_utf8_lossy(&output.stdout))
        }
        Ok(_) => false,
        Err(e) => {
            tracing::warn!(pid, error = %e, "Failed to execute tasklist");
            false
        }
    }
}

#[cfg(not(windows))]
async fn probe(pid: u32) -> bool {
    let proc_dir = std::path::PathBuf::from(format!("/proc/{}", pid));
    for file in ["comm", "cmdline"] {
        if let Ok(raw) = tokio::fs::read(proc_dir.join(file)).await {
            if is_terminal_image(&String::from_utf8_lossy(&raw)) {
                return true;
            }
        }
    }
    false
}

#[cfg(windows)]
async fn signal(pid: u32, force: bool) -> Result<()> {
    let pid_arg = pid.to_string();
    let mut args = vec!["/PID", pid_arg.as_str()];
    if force {
        args.insert(0, "/F");
    }
    Command::new("taskkill")
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .context("Failed to execute taskkill")?;
    Ok(())
}

#[cfg(not(windows))]
async fn signal(pid: u32, force: bool) -> Result<()> {
    let sig = if force { "-KILL" } else { "-TERM" };
    Command::new("kill")
        .args([sig, &pid.to_string()])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .context("Failed to execute kill")?;
    Ok(())
}

#[async_trait]
impl ProcessControl for OsProcessControl {
    async fn spawn(&self, spec: &LaunchSpec) -> Result<u32> {
        let child = Command::new(&spec.program)
            .args(&spec.args)
            .current_dir(&spec.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("Failed to start {}", spec.program.display()))?;

        // The terminal outlives the handle; dropping it does not kill the process
        let pid = child
            .id()
            .context("Terminal process exited before its PID could be read")?;
        tracing::info!(pid, program = %spec.program.display(), "Terminal process spawned");
        Ok(pid)
    }

    async fn is_alive(&self, pid: u32) -> bool {
        probe(pid).await
    }

    async fn terminate(&self, pid: u32, grace: Duration) -> Result<()> {
        signal(pid, false).await?;

        let deadline = tokio::time::Instant::now() + grace;
        while tokio::time::Instant::now() < deadline {
            if !probe(pid).await {
                tracing::info!(pid, "Terminal process exited");
                return Ok(());
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }

        tracing::warn!(pid, grace_secs = grace.as_secs(), "Terminal did not exit in time, killing");
        signal(pid, true).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_image_detection() {
        assert!(is_terminal_image(
            "\"terminal64.exe\",\"4242\",\"Console\",\"1\",\"250,000 K\""
        ));
        assert!(is_terminal_image("TERMINAL.EXE"));
        assert!(!is_terminal_image("INFO: No tasks are running which match the specified criteria."));
        assert!(!is_terminal_image("notepad.exe"));
    }

    #[cfg(not(windows))]
    #[tokio::test]
    async fn test_own_process_is_not_a_terminal() {
        let control = OsProcessControl::new();
        assert!(!control.is_alive(std::process::id()).await);
    }
}
