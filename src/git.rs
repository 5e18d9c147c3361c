use anyhow::{Context, Result, anyhow};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::cmd::Cmd;

/// One entry of `git worktree list --porcelain`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorktreeInfo {
    pub path: PathBuf,
    /// `None` when the worktree has a detached HEAD (or is bare).
    pub branch: Option<String>,
    pub is_main: bool,
}

/// Where a branch name exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BranchExists {
    pub local: bool,
    pub remote: bool,
}

/// A branch name explicitly scoped to a remote, e.g. `origin/feature-x`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRef {
    pub remote: String,
    pub branch: String,
}

impl std::fmt::Display for RemoteRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.remote, self.branch)
    }
}

/// Outcome of a git mutation whose failure is expected and reportable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitResult {
    pub success: bool,
    pub error: Option<String>,
}

impl GitResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }

    fn from_result(result: Result<()>) -> Self {
        match result {
            Ok(()) => Self::ok(),
            Err(e) => Self::failed(format!("{:#}", e)),
        }
    }
}

// ── Repo detection ───────────────────────────────────────────────

pub fn is_inside_git_repo(dir: &Path) -> bool {
    Cmd::new("git")
        .workdir(dir)
        .args(&["rev-parse", "--is-inside-work-tree"])
        .run_as_check()
        .unwrap_or(false)
}

/// Absolute git dir and common dir for `dir`, in that order.
fn git_dirs(dir: &Path) -> Result<(PathBuf, PathBuf)> {
    let out = Cmd::new("git")
        .workdir(dir)
        .args(&[
            "rev-parse",
            "--path-format=absolute",
            "--git-dir",
            "--git-common-dir",
        ])
        .run_and_capture_stdout()
        .context("Failed to resolve git directories")?;
    let mut lines = out.lines();
    match (lines.next(), lines.next()) {
        (Some(git_dir), Some(common_dir)) => Ok((PathBuf::from(git_dir), PathBuf::from(common_dir))),
        _ => Err(anyhow!("Unexpected output from git rev-parse: {}", out)),
    }
}

/// A linked worktree has its own git dir under the shared common dir.
pub fn is_inside_worktree(dir: &Path) -> Result<bool> {
    let (git_dir, common_dir) = git_dirs(dir)?;
    Ok(git_dir != common_dir)
}

/// The main repository is the directory holding the shared `.git`.
pub fn main_repo_path(dir: &Path) -> Result<PathBuf> {
    let (_, common_dir) = git_dirs(dir)?;
    if common_dir.file_name().is_some_and(|n| n == ".git") {
        return common_dir
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| anyhow!("Git common dir has no parent: {}", common_dir.display()));
    }
    // Bare layouts: fall back to the first registered worktree.
    list_worktrees(dir)?
        .into_iter()
        .next()
        .map(|w| w.path)
        .ok_or_else(|| anyhow!("No main worktree found"))
}

pub fn current_worktree_path(dir: &Path) -> Result<PathBuf> {
    let path = Cmd::new("git")
        .workdir(dir)
        .args(&["rev-parse", "--show-toplevel"])
        .run_and_capture_stdout()?;
    Ok(PathBuf::from(path))
}

// ── Worktrees ────────────────────────────────────────────────────

pub fn list_worktrees(dir: &Path) -> Result<Vec<WorktreeInfo>> {
    let out = Cmd::new("git")
        .workdir(dir)
        .args(&["worktree", "list", "--porcelain"])
        .run_and_capture_stdout()
        .context("Failed to list worktrees")?;
    Ok(parse_worktree_porcelain(&out))
}

/// Parse `git worktree list --porcelain`. The first block is the main worktree.
pub fn parse_worktree_porcelain(output: &str) -> Vec<WorktreeInfo> {
    let mut worktrees = Vec::new();
    for block in output.trim().split("\n\n") {
        let mut path = None;
        let mut branch = None;
        for line in block.lines() {
            if let Some(p) = line.strip_prefix("worktree ") {
                path = Some(PathBuf::from(p));
            } else if let Some(b) = line.strip_prefix("branch ") {
                branch = Some(b.strip_prefix("refs/heads/").unwrap_or(b).to_string());
            }
        }
        if let Some(path) = path {
            let is_main = worktrees.is_empty();
            worktrees.push(WorktreeInfo {
                path,
                branch,
                is_main,
            });
        }
    }
    worktrees
}

/// `git worktree add -b <branch> <path> [base]` for new branches,
/// `git worktree add <path> <branch>` for existing ones.
pub fn create_worktree(
    dir: &Path,
    path: &Path,
    branch: &str,
    create_new_branch: bool,
    base: Option<&str>,
) -> GitResult {
    let Some(path_str) = path.to_str() else {
        return GitResult::failed(format!("Invalid worktree path: {}", path.display()));
    };
    let mut cmd = Cmd::new("git").workdir(dir).args(&["worktree", "add"]);
    if create_new_branch {
        cmd = cmd.args(&["-b", branch, path_str]);
        if let Some(base) = base {
            cmd = cmd.arg(base);
        }
    } else {
        cmd = cmd.args(&[path_str, branch]);
    }
    debug!(path = %path.display(), branch, create_new_branch, base = ?base, "git:worktree add");
    GitResult::from_result(cmd.run().map(|_| ()))
}

pub fn remove_worktree(dir: &Path, path: &Path) -> GitResult {
    let Some(path_str) = path.to_str() else {
        return GitResult::failed(format!("Invalid worktree path: {}", path.display()));
    };
    debug!(path = path_str, "git:worktree remove");
    GitResult::from_result(
        Cmd::new("git")
            .workdir(dir)
            .args(&["worktree", "remove", path_str, "--force"])
            .run()
            .map(|_| ()),
    )
}

/// Drop registry entries for worktrees whose directories are gone.
pub fn prune_worktrees(dir: &Path) -> GitResult {
    GitResult::from_result(
        Cmd::new("git")
            .workdir(dir)
            .args(&["worktree", "prune"])
            .run()
            .map(|_| ()),
    )
}

// ── Branches ─────────────────────────────────────────────────────

pub fn local_branch_exists(dir: &Path, branch: &str) -> Result<bool> {
    let refname = format!("refs/heads/{}", branch);
    Cmd::new("git")
        .workdir(dir)
        .args(&["show-ref", "--verify", "--quiet", &refname])
        .run_as_check()
}

pub fn remote_branch_exists(dir: &Path, remote: &str, branch: &str) -> Result<bool> {
    Cmd::new("git")
        .workdir(dir)
        .args(&["ls-remote", "--exit-code", "--heads", remote, branch])
        .run_as_check()
}

/// Query failures count as "not found".
pub fn branch_exists(dir: &Path, branch: &str) -> BranchExists {
    let local = local_branch_exists(dir, branch).unwrap_or_else(|e| {
        warn!(branch, error = %e, "git:local branch query failed");
        false
    });
    let remote = remote_branch_exists(dir, "origin", branch).unwrap_or_else(|e| {
        warn!(branch, error = %e, "git:remote branch query failed");
        false
    });
    BranchExists { local, remote }
}

pub fn list_remotes(dir: &Path) -> Result<Vec<String>> {
    let out = Cmd::new("git")
        .workdir(dir)
        .arg("remote")
        .run_and_capture_stdout()
        .context("Failed to list git remotes")?;
    Ok(out
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

/// Split `remote/branch` when the prefix names a configured remote.
pub fn parse_qualified_ref(name: &str, remotes: &[String]) -> Option<RemoteRef> {
    let (remote, branch) = name.split_once('/')?;
    if branch.is_empty() || !remotes.iter().any(|r| r == remote) {
        return None;
    }
    Some(RemoteRef {
        remote: remote.to_string(),
        branch: branch.to_string(),
    })
}

pub fn current_branch(dir: &Path) -> Result<String> {
    Cmd::new("git")
        .workdir(dir)
        .args(&["branch", "--show-current"])
        .run_and_capture_stdout()
}

/// Origin's HEAD when known, otherwise `main` or `master` if present, otherwise `main`.
pub fn default_branch(dir: &Path) -> String {
    if let Ok(refname) = Cmd::new("git")
        .workdir(dir)
        .args(&["symbolic-ref", "refs/remotes/origin/HEAD"])
        .run_and_capture_stdout()
        && let Some(branch) = refname.strip_prefix("refs/remotes/origin/")
    {
        return branch.to_string();
    }
    for candidate in ["main", "master"] {
        if local_branch_exists(dir, candidate).unwrap_or(false) {
            return candidate.to_string();
        }
    }
    "main".to_string()
}

/// Commits on `origin/<branch>` not yet in `<branch>`. Zero when unknown.
pub fn origin_ahead_count(dir: &Path, branch: &str) -> u32 {
    let range = format!("{0}..origin/{0}", branch);
    Cmd::new("git")
        .workdir(dir)
        .args(&["rev-list", "--count", &range])
        .run_and_capture_stdout()
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0)
}

pub fn fetch(dir: &Path) -> GitResult {
    GitResult::from_result(
        Cmd::new("git")
            .workdir(dir)
            .args(&["fetch", "origin"])
            .run()
            .map(|_| ()),
    )
}

// ── Path queries ─────────────────────────────────────────────────

fn nul_separated(output: &[u8]) -> Vec<String> {
    output
        .split(|b| *b == 0)
        .filter(|p| !p.is_empty())
        .map(|p| String::from_utf8_lossy(p).into_owned())
        .collect()
}

/// Tracked files matching `pathspec`, in one `git ls-files` call.
pub fn tracked_files(repo: &Path, pathspec: &str) -> Result<HashSet<String>> {
    let output = Cmd::new("git")
        .workdir(repo)
        .args(&["ls-files", "-z", "--cached", "--", pathspec])
        .run()
        .context("Failed to list tracked files")?;
    Ok(nul_separated(&output.stdout).into_iter().collect())
}

/// Untracked ignored entries, honoring every gitignore source. Wholly
/// ignored directories are listed once with a trailing `/`.
pub fn ignored_entries(repo: &Path) -> Result<Vec<String>> {
    let output = Cmd::new("git")
        .workdir(repo)
        .args(&[
            "ls-files",
            "-z",
            "--others",
            "--ignored",
            "--exclude-standard",
            "--directory",
        ])
        .run()
        .context("Failed to list ignored files")?;
    Ok(nul_separated(&output.stdout))
}

/// Whether `rel_path` is one of `ignored` or lies inside an ignored directory.
pub fn is_covered_by(ignored: &[String], rel_path: &str) -> bool {
    ignored.iter().any(|entry| match entry.strip_suffix('/') {
        Some(dir) => {
            rel_path == dir
                || rel_path
                    .strip_prefix(dir)
                    .is_some_and(|rest| rest.starts_with('/'))
        }
        None => rel_path == entry,
    })
}

#[cfg(test)]
pub mod test_support {
    use super::*;

    /// Fresh repository with one commit on `main`.
    pub fn init_repo(dir: &Path) {
        for args in [
            vec!["init", "-q", "-b", "main"],
            vec![
                "-c",
                "user.name=t",
                "-c",
                "user.email=t@example.com",
                "commit",
                "-q",
                "--allow-empty",
                "-m",
                "init",
            ],
        ] {
            Cmd::new("git").workdir(dir).args(&args).run().unwrap();
        }
    }
}
