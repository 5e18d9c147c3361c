//! Background check for a newer release on crates.io.
//!
//! The check never blocks the workflow: it runs on its own thread, shells out
//! to `curl` with a short timeout and reports only if it finished by the time
//! the session ends. Every failure is silent.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::io::Read;
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::time::Duration;
use tracing::debug;
use wait_timeout::ChildExt;

pub const SKIP_UPDATE_CHECK_ENV: &str = "WORKTREE_SKIP_UPDATE_CHECK";
const CRATES_IO_URL: &str = "https://crates.io/api/v1/crates/worktree";
const TIMEOUT: Duration = Duration::from_secs(2);

pub fn current_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateAvailable {
    pub current: String,
    pub latest: String,
}

/// Handle to an in-flight check.
pub struct VersionCheck {
    rx: Option<Receiver<UpdateAvailable>>,
}

impl VersionCheck {
    pub fn spawn() -> Self {
        if std::env::var(SKIP_UPDATE_CHECK_ENV).is_ok_and(|v| !v.is_empty()) {
            debug!("version:check disabled");
            return Self { rx: None };
        }
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || match fetch_latest_version() {
            Ok(latest) if is_newer_version(current_version(), &latest) => {
                let _ = tx.send(UpdateAvailable {
                    current: current_version().to_string(),
                    latest,
                });
            }
            Ok(latest) => debug!(latest = %latest, "version:up to date"),
            Err(e) => debug!(error = %e, "version:check failed"),
        });
        Self { rx: Some(rx) }
    }

    /// Result if it has already arrived.
    pub fn poll(&self) -> Option<UpdateAvailable> {
        self.rx.as_ref()?.try_recv().ok()
    }
}

#[derive(Deserialize)]
struct CrateResponse {
    #[serde(rename = "crate")]
    krate: CrateInfo,
}

#[derive(Deserialize)]
struct CrateInfo {
    max_stable_version: Option<String>,
    max_version: String,
}

fn fetch_latest_version() -> Result<String> {
    let user_agent = format!("worktree/{}", current_version());
    let mut child = Command::new("curl")
        .args(["-sL", "--max-time", "2", "-A", &user_agent, CRATES_IO_URL])
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .context("Failed to run curl")?;

    // Drain stdout first so a large body cannot fill the pipe; curl's own
    // --max-time bounds the read.
    let mut body = String::new();
    if let Some(mut stdout) = child.stdout.take() {
        stdout.read_to_string(&mut body)?;
    }

    let Some(status) = child.wait_timeout(TIMEOUT + Duration::from_millis(500))? else {
        let _ = child.kill();
        let _ = child.wait();
        bail!("curl timed out");
    };
    if !status.success() {
        bail!("curl exited with status {}", status);
    }

    let response: CrateResponse =
        serde_json::from_str(&body).context("Failed to parse crates.io response")?;
    Ok(response
        .krate
        .max_stable_version
        .unwrap_or(response.krate.max_version))
}

/// Compare up to three numeric components, ignoring a leading `v`.
/// Missing or non-numeric components count as zero.
pub fn is_newer_version(current: &str, latest: &str) -> bool {
    let parts = |s: &str| -> [u64; 3] {
        let mut out = [0; 3];
        let s = s.trim().trim_start_matches('v');
        let s = s.split('-').next().unwrap_or(s);
        for (slot, part) in out.iter_mut().zip(s.split('.')) {
            *slot = part.parse().unwrap_or(0);
        }
        out
    };
    parts(latest) > parts(current)
}

#[cfg(test)]
mod tests {
    use super::is_newer_version;

    #[test]
    fn newer_versions() {
        assert!(is_newer_version("1.0.0", "1.0.1"));
        assert!(is_newer_version("1.2.3", "1.3.0"));
        assert!(is_newer_version("1.9.9", "2.0.0"));
        assert!(is_newer_version("v0.1.0", "0.2.0"));
    }

    #[test]
    fn same_or_older() {
        assert!(!is_newer_version("1.0.0", "1.0.0"));
        assert!(!is_newer_version("1.0.1", "1.0.0"));
        assert!(!is_newer_version("2.0.0", "v1.9.9"));
    }

    #[test]
    fn short_and_prerelease_versions() {
        assert!(is_newer_version("1.2", "1.2.1"));
        assert!(!is_newer_version("1.2.0", "1.2"));
        assert!(!is_newer_version("1.2.0", "1.2.0-beta.1"));
    }
}
