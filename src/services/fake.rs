//! In-memory collaborators that record every side-effecting call.

use anyhow::{Result, anyhow};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::{Files, Git, Host, Services};
use crate::config::{Config, MemoryConfigStore};
use crate::files::{PackageManager, Project, RepoKind, RepoStructure};
use crate::git::{BranchExists, GitResult, WorktreeInfo};
use crate::host::{Capabilities, InstallOutcome, Terminal};

pub type CallLog = Arc<Mutex<Vec<String>>>;

pub struct FakeGit {
    pub log: CallLog,
    pub inside_repo: bool,
    pub inside_worktree: bool,
    pub main_path: PathBuf,
    pub current_path: PathBuf,
    pub worktrees: Mutex<Vec<WorktreeInfo>>,
    pub local_branches: HashSet<String>,
    pub origin_branches: HashSet<String>,
    pub remotes: Vec<String>,
    /// Fully qualified refs such as `upstream/feature`.
    pub remote_refs: HashSet<String>,
    pub current_branch: Option<String>,
    pub default_branch: String,
    pub ahead: u32,
    pub fail_create: bool,
    pub fail_remove: bool,
    pub fail_fetch: bool,
}

impl FakeGit {
    pub fn new(log: CallLog) -> Self {
        let main_path = PathBuf::from("/work/repo");
        Self {
            log,
            inside_repo: true,
            inside_worktree: false,
            current_path: main_path.clone(),
            worktrees: Mutex::new(vec![WorktreeInfo {
                path: main_path.clone(),
                branch: Some("main".into()),
                is_main: true,
            }]),
            main_path,
            local_branches: HashSet::from(["main".to_string()]),
            origin_branches: HashSet::from(["main".to_string()]),
            remotes: vec!["origin".into()],
            remote_refs: HashSet::new(),
            current_branch: Some("main".into()),
            default_branch: "main".into(),
            ahead: 0,
            fail_create: false,
            fail_remove: false,
            fail_fetch: false,
        }
    }

    fn record(&self, call: String) {
        self.log.lock().unwrap().push(call);
    }
}

impl Git for FakeGit {
    fn is_inside_git_repo(&self) -> bool {
        self.inside_repo
    }

    fn is_inside_worktree(&self) -> Result<bool> {
        Ok(self.inside_worktree)
    }

    fn main_repo_path(&self) -> Result<PathBuf> {
        Ok(self.main_path.clone())
    }

    fn current_worktree_path(&self) -> Result<PathBuf> {
        Ok(self.current_path.clone())
    }

    fn enter_main_repo(&self, _main_repo_path: &Path) -> Result<()> {
        Ok(())
    }

    fn list_worktrees(&self) -> Result<Vec<WorktreeInfo>> {
        Ok(self.worktrees.lock().unwrap().clone())
    }

    fn create_worktree(
        &self,
        path: &Path,
        branch: &str,
        create_new_branch: bool,
        base: Option<&str>,
    ) -> GitResult {
        self.record(format!(
            "git:create {} {} new={} base={}",
            path.display(),
            branch,
            create_new_branch,
            base.unwrap_or("-")
        ));
        if self.fail_create {
            return GitResult::failed("fatal: could not create worktree");
        }
        self.worktrees.lock().unwrap().push(WorktreeInfo {
            path: path.to_path_buf(),
            branch: Some(branch.to_string()),
            is_main: false,
        });
        GitResult::ok()
    }

    fn remove_worktree(&self, path: &Path) -> GitResult {
        self.record(format!("git:remove {}", path.display()));
        if self.fail_remove {
            return GitResult::failed("fatal: not a working tree");
        }
        self.worktrees.lock().unwrap().retain(|w| w.path != path);
        GitResult::ok()
    }

    fn prune_worktrees(&self) -> GitResult {
        self.record("git:prune".into());
        GitResult::ok()
    }

    fn branch_exists(&self, branch: &str) -> BranchExists {
        BranchExists {
            local: self.local_branches.contains(branch),
            remote: self.origin_branches.contains(branch),
        }
    }

    fn remote_branch_exists(&self, remote: &str, branch: &str) -> bool {
        self.remote_refs.contains(&format!("{}/{}", remote, branch))
    }

    fn list_remotes(&self) -> Vec<String> {
        self.remotes.clone()
    }

    fn current_branch(&self) -> Option<String> {
        self.current_branch.clone()
    }

    fn default_branch(&self) -> String {
        self.default_branch.clone()
    }

    fn origin_ahead_count(&self, _branch: &str) -> u32 {
        self.ahead
    }

    fn fetch(&self) -> GitResult {
        self.record("git:fetch".into());
        if self.fail_fetch {
            GitResult::failed("could not reach origin")
        } else {
            GitResult::ok()
        }
    }
}

pub struct FakeFiles {
    pub log: CallLog,
    pub env_files: Vec<String>,
    pub generated: Vec<String>,
    pub structure: RepoStructure,
    pub existing: Mutex<HashSet<PathBuf>>,
    pub fail_copy: bool,
}

impl FakeFiles {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            env_files: Vec::new(),
            generated: Vec::new(),
            structure: RepoStructure {
                kind: RepoKind::SingleProject,
                projects: Vec::new(),
            },
            existing: Mutex::new(HashSet::new()),
            fail_copy: false,
        }
    }

    pub fn single_project() -> RepoStructure {
        RepoStructure {
            kind: RepoKind::SingleProject,
            projects: vec![Project {
                relative_path: ".".into(),
                package_manager: PackageManager::Npm,
            }],
        }
    }

    fn record(&self, call: String) -> Result<()> {
        self.log.lock().unwrap().push(call);
        if self.fail_copy {
            return Err(anyhow!("disk full"));
        }
        Ok(())
    }
}

impl Files for FakeFiles {
    fn find_env_files(&self, _root: &Path) -> Result<Vec<String>> {
        Ok(self.env_files.clone())
    }

    fn find_generated_files(&self, _root: &Path) -> Result<Vec<String>> {
        Ok(self.generated.clone())
    }

    fn detect_repo_structure(&self, _root: &Path) -> Result<RepoStructure> {
        Ok(self.structure.clone())
    }

    fn symlink_env_files(&self, _src: &Path, dest: &Path, files: &[String]) -> Result<()> {
        self.record(format!("files:symlink-env {} {}", dest.display(), files.join(",")))
    }

    fn copy_env_files(&self, _src: &Path, dest: &Path, files: &[String]) -> Result<()> {
        self.record(format!("files:copy-env {} {}", dest.display(), files.join(",")))
    }

    fn copy_generated_files(&self, _src: &Path, dest: &Path, items: &[String]) -> Result<()> {
        self.record(format!("files:copy-generated {} {}", dest.display(), items.join(",")))
    }

    fn path_exists(&self, path: &Path) -> bool {
        self.existing.lock().unwrap().contains(path)
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        self.log
            .lock()
            .unwrap()
            .push(format!("files:remove-dir {}", path.display()));
        self.existing.lock().unwrap().remove(path);
        Ok(())
    }
}

pub struct FakeHost {
    pub log: CallLog,
    pub capabilities: Capabilities,
    pub fail_install: bool,
}

impl FakeHost {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            capabilities: Capabilities {
                editor: Some("code".into()),
                terminal: Some(Terminal::Kitty),
            },
            fail_install: false,
        }
    }

    fn record(&self, call: String) {
        self.log.lock().unwrap().push(call);
    }
}

impl Host for FakeHost {
    fn detect_capabilities(&self, _configured_terminal: Option<&str>) -> Capabilities {
        self.capabilities.clone()
    }

    fn open_in_editor(&self, editor: &str, path: &Path) -> Result<()> {
        self.record(format!("host:editor {} {}", editor, path.display()));
        Ok(())
    }

    fn open_in_file_explorer(&self, path: &Path) -> Result<()> {
        self.record(format!("host:explorer {}", path.display()));
        Ok(())
    }

    fn open_in_terminal(&self, terminal: Option<Terminal>, path: &Path, title: &str) -> Result<()> {
        self.record(format!(
            "host:terminal {} {} {}",
            terminal.map(Terminal::name).unwrap_or("default"),
            path.display(),
            title
        ));
        Ok(())
    }

    fn install_dependencies(&self, worktree: &Path, structure: &RepoStructure) -> InstallOutcome {
        self.record(format!(
            "host:install {} {}",
            worktree.display(),
            structure.projects.len()
        ));
        let mut outcome = InstallOutcome::default();
        for p in &structure.projects {
            if self.fail_install {
                outcome
                    .failed
                    .push((p.relative_path.clone(), "exit 1".into()));
            } else {
                outcome
                    .installed
                    .push((p.relative_path.clone(), p.package_manager.to_string()));
            }
        }
        outcome
    }
}

/// A configurable fake environment. Adjust the public parts, then call
/// [`FakeWorld::services`].
pub struct FakeWorld {
    pub log: CallLog,
    pub git: FakeGit,
    pub files: FakeFiles,
    pub host: FakeHost,
    pub config: Option<Config>,
}

impl FakeWorld {
    pub fn new() -> Self {
        let log: CallLog = Arc::default();
        Self {
            git: FakeGit::new(log.clone()),
            files: FakeFiles::new(log.clone()),
            host: FakeHost::new(log.clone()),
            config: None,
            log,
        }
    }

    pub fn services(self) -> (Services, CallLog, Arc<MemoryConfigStore>) {
        let config = Arc::new(match &self.config {
            Some(c) => MemoryConfigStore::with_config(c),
            None => MemoryConfigStore::default(),
        });
        let services = Services {
            git: Arc::new(self.git),
            files: Arc::new(self.files),
            host: Arc::new(self.host),
            config: config.clone(),
        };
        (services, self.log, config)
    }
}
