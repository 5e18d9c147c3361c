use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::{Files, Git, Host};
use crate::files::{self, RepoStructure};
use crate::git::{self, BranchExists, GitResult, WorktreeInfo};
use crate::host::{self, Capabilities, InstallOutcome, Terminal};

/// Git through the `git` binary, run in the process's current directory.
///
/// [`Git::enter_main_repo`] moves the process, and with it every later
/// command, into the main repository.
pub struct SystemGit;

impl SystemGit {
    fn dir(&self) -> &Path {
        Path::new(".")
    }
}

impl Git for SystemGit {
    fn is_inside_git_repo(&self) -> bool {
        git::is_inside_git_repo(self.dir())
    }

    fn is_inside_worktree(&self) -> Result<bool> {
        git::is_inside_worktree(self.dir())
    }

    fn main_repo_path(&self) -> Result<PathBuf> {
        git::main_repo_path(self.dir())
    }

    fn current_worktree_path(&self) -> Result<PathBuf> {
        git::current_worktree_path(self.dir())
    }

    fn enter_main_repo(&self, main_repo_path: &Path) -> Result<()> {
        debug!(safe_cwd = %main_repo_path.display(), "git:changing to main repo");
        std::env::set_current_dir(main_repo_path).with_context(|| {
            format!(
                "Could not change directory to '{}'",
                main_repo_path.display()
            )
        })
    }

    fn list_worktrees(&self) -> Result<Vec<WorktreeInfo>> {
        git::list_worktrees(self.dir())
    }

    fn create_worktree(
        &self,
        path: &Path,
        branch: &str,
        create_new_branch: bool,
        base: Option<&str>,
    ) -> GitResult {
        git::create_worktree(self.dir(), path, branch, create_new_branch, base)
    }

    fn remove_worktree(&self, path: &Path) -> GitResult {
        git::remove_worktree(self.dir(), path)
    }

    fn prune_worktrees(&self) -> GitResult {
        git::prune_worktrees(self.dir())
    }

    fn branch_exists(&self, branch: &str) -> BranchExists {
        git::branch_exists(self.dir(), branch)
    }

    fn remote_branch_exists(&self, remote: &str, branch: &str) -> bool {
        git::remote_branch_exists(self.dir(), remote, branch).unwrap_or_else(|e| {
            warn!(remote, branch, error = %e, "git:remote ref query failed");
            false
        })
    }

    fn list_remotes(&self) -> Vec<String> {
        git::list_remotes(self.dir()).unwrap_or_else(|e| {
            warn!(error = %e, "git:listing remotes failed");
            Vec::new()
        })
    }

    fn current_branch(&self) -> Option<String> {
        git::current_branch(self.dir())
            .ok()
            .filter(|b| !b.is_empty())
    }

    fn default_branch(&self) -> String {
        git::default_branch(self.dir())
    }

    fn origin_ahead_count(&self, branch: &str) -> u32 {
        git::origin_ahead_count(self.dir(), branch)
    }

    fn fetch(&self) -> GitResult {
        git::fetch(self.dir())
    }
}

pub struct SystemFiles;

impl Files for SystemFiles {
    fn find_env_files(&self, root: &Path) -> Result<Vec<String>> {
        files::find_env_files(root)
    }

    fn find_generated_files(&self, root: &Path) -> Result<Vec<String>> {
        files::find_generated_files(root)
    }

    fn detect_repo_structure(&self, root: &Path) -> Result<RepoStructure> {
        files::detect_repo_structure(root)
    }

    fn symlink_env_files(&self, src: &Path, dest: &Path, items: &[String]) -> Result<()> {
        files::symlink_env_files(src, dest, items)
    }

    fn copy_env_files(&self, src: &Path, dest: &Path, items: &[String]) -> Result<()> {
        files::copy_env_files(src, dest, items)
    }

    fn copy_generated_files(&self, src: &Path, dest: &Path, items: &[String]) -> Result<()> {
        files::copy_generated_files(src, dest, items)
    }

    fn path_exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        std::fs::remove_dir_all(path)
            .with_context(|| format!("Failed to delete {}", path.display()))
    }
}

pub struct SystemHost;

impl Host for SystemHost {
    fn detect_capabilities(&self, configured_terminal: Option<&str>) -> Capabilities {
        host::detect_capabilities(configured_terminal)
    }

    fn open_in_editor(&self, editor: &str, path: &Path) -> Result<()> {
        host::editor::open(editor, path)
    }

    fn open_in_file_explorer(&self, path: &Path) -> Result<()> {
        host::editor::open_file_explorer(path)
    }

    fn open_in_terminal(&self, terminal: Option<Terminal>, path: &Path, title: &str) -> Result<()> {
        host::terminal::open(terminal, path, title)
    }

    fn install_dependencies(&self, worktree: &Path, structure: &RepoStructure) -> InstallOutcome {
        host::install_dependencies(worktree, structure)
    }
}
