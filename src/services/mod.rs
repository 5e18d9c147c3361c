//! Collaborator contracts the workflow depends on.
//!
//! The workflow only talks to git, the filesystem, the host machine and the
//! config file through these traits, so a whole session can be driven against
//! in-memory fakes.

mod system;

#[cfg(test)]
pub mod fake;

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{ConfigStore, FileConfigStore};
use crate::files::RepoStructure;
use crate::git::{BranchExists, GitResult, WorktreeInfo};
use crate::host::{Capabilities, InstallOutcome, Terminal};

pub use self::system::{SystemFiles, SystemGit, SystemHost};

pub trait Git: Send + Sync {
    // ── Repo detection ───────────────────────────────────────────────

    fn is_inside_git_repo(&self) -> bool;

    /// True inside a linked worktree, false in the main one.
    fn is_inside_worktree(&self) -> Result<bool>;

    fn main_repo_path(&self) -> Result<PathBuf>;

    fn current_worktree_path(&self) -> Result<PathBuf>;

    /// Run every later command from the main repository, so removing the
    /// worktree we started in cannot pull the ground from under us.
    fn enter_main_repo(&self, main_repo_path: &Path) -> Result<()>;

    // ── Worktrees ────────────────────────────────────────────────────

    /// Ordered list, main worktree first.
    fn list_worktrees(&self) -> Result<Vec<WorktreeInfo>>;

    fn create_worktree(
        &self,
        path: &Path,
        branch: &str,
        create_new_branch: bool,
        base: Option<&str>,
    ) -> GitResult;

    fn remove_worktree(&self, path: &Path) -> GitResult;

    fn prune_worktrees(&self) -> GitResult;

    // ── Branches ─────────────────────────────────────────────────────

    /// Local and `origin` existence. Query failures read as "absent".
    fn branch_exists(&self, branch: &str) -> BranchExists;

    fn remote_branch_exists(&self, remote: &str, branch: &str) -> bool;

    fn list_remotes(&self) -> Vec<String>;

    fn current_branch(&self) -> Option<String>;

    fn default_branch(&self) -> String;

    fn origin_ahead_count(&self, branch: &str) -> u32;

    fn fetch(&self) -> GitResult;
}

pub trait Files: Send + Sync {
    fn find_env_files(&self, root: &Path) -> Result<Vec<String>>;

    fn find_generated_files(&self, root: &Path) -> Result<Vec<String>>;

    fn detect_repo_structure(&self, root: &Path) -> Result<RepoStructure>;

    fn symlink_env_files(&self, src: &Path, dest: &Path, files: &[String]) -> Result<()>;

    fn copy_env_files(&self, src: &Path, dest: &Path, files: &[String]) -> Result<()>;

    fn copy_generated_files(&self, src: &Path, dest: &Path, items: &[String]) -> Result<()>;

    fn path_exists(&self, path: &Path) -> bool;

    fn remove_dir_all(&self, path: &Path) -> Result<()>;
}

pub trait Host: Send + Sync {
    fn detect_capabilities(&self, configured_terminal: Option<&str>) -> Capabilities;

    fn open_in_editor(&self, editor: &str, path: &Path) -> Result<()>;

    fn open_in_file_explorer(&self, path: &Path) -> Result<()>;

    fn open_in_terminal(&self, terminal: Option<Terminal>, path: &Path, title: &str) -> Result<()>;

    fn install_dependencies(&self, worktree: &Path, structure: &RepoStructure) -> InstallOutcome;
}

/// Everything a workflow session needs from the outside world.
#[derive(Clone)]
pub struct Services {
    pub git: Arc<dyn Git>,
    pub files: Arc<dyn Files>,
    pub host: Arc<dyn Host>,
    pub config: Arc<dyn ConfigStore>,
}

impl Services {
    pub fn system() -> Self {
        Self {
            git: Arc::new(SystemGit),
            files: Arc::new(SystemFiles),
            host: Arc::new(SystemHost),
            config: Arc::new(FileConfigStore::from_env()),
        }
    }
}
