use anyhow::{Context, Result, anyhow};
use std::path::Path;
use std::process::{Command, Output, Stdio};
use tracing::{debug, trace};

/// Builder around `std::process::Command` used for every external program
/// the tool invokes (git, editors, terminals, package managers).
pub struct Cmd<'a> {
    program: &'a str,
    args: Vec<&'a str>,
    workdir: Option<&'a Path>,
}

impl<'a> Cmd<'a> {
    pub fn new(program: &'a str) -> Self {
        Self {
            program,
            args: Vec::new(),
            workdir: None,
        }
    }

    pub fn arg(mut self, arg: &'a str) -> Self {
        self.args.push(arg);
        self
    }

    pub fn args(mut self, args: &[&'a str]) -> Self {
        self.args.extend_from_slice(args);
        self
    }

    pub fn workdir(mut self, path: &'a Path) -> Self {
        self.workdir = Some(path);
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(self.program);
        cmd.args(&self.args);
        if let Some(dir) = self.workdir {
            cmd.current_dir(dir);
        }
        cmd
    }

    fn describe(&self) -> String {
        format!("{} {}", self.program, self.args.join(" "))
    }

    /// Run to completion and fail on a non-zero exit, carrying stderr in the error.
    pub fn run(self) -> Result<Output> {
        let workdir_display = self.workdir.map(|p| p.display().to_string());
        trace!(program = self.program, args = ?self.args, workdir = ?workdir_display, "cmd:run start");

        let output = self
            .command()
            .output()
            .with_context(|| format!("Failed to execute command: {}", self.describe()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!(
                program = self.program,
                args = ?self.args,
                status = ?output.status.code(),
                stderr = %stderr.trim(),
                "cmd:run failure"
            );
            return Err(anyhow!(
                "Command failed: {}\n{}",
                self.describe(),
                stderr.trim()
            ));
        }
        trace!(program = self.program, "cmd:run success");
        Ok(output)
    }

    /// Run and return trimmed stdout.
    pub fn run_and_capture_stdout(self) -> Result<String> {
        let output = self.run()?;
        Ok(String::from_utf8(output.stdout)?.trim().to_string())
    }

    /// Run as a predicate: `Ok(true)` on exit 0, `Ok(false)` otherwise.
    /// Only a failure to spawn is an error.
    pub fn run_as_check(self) -> Result<bool> {
        trace!(program = self.program, args = ?self.args, "cmd:check start");
        let status = self
            .command()
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .with_context(|| format!("Failed to execute command: {}", self.describe()))?;
        let success = status.success();
        trace!(program = self.program, success, "cmd:check result");
        Ok(success)
    }

    /// Start the program detached from our stdio and return immediately.
    /// Used for GUI launches (editors, terminals, file explorers).
    pub fn spawn_detached(self) -> Result<()> {
        debug!(program = self.program, args = ?self.args, "cmd:spawn");
        self.command()
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("Failed to launch: {}", self.describe()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::Cmd;

    #[test]
    fn check_reports_exit_status() {
        assert!(Cmd::new("git").arg("--version").run_as_check().unwrap());
        assert!(!Cmd::new("git").arg("not-a-real-subcommand").run_as_check().unwrap());
    }

    #[test]
    fn capture_trims_output() {
        let out = Cmd::new("git").arg("--version").run_and_capture_stdout().unwrap();
        assert!(out.starts_with("git version"));
        assert!(!out.ends_with('\n'));
    }

    #[test]
    fn missing_program_is_an_error() {
        assert!(Cmd::new("definitely-not-installed-xyz").run().is_err());
    }
}
