use std::path::{Path, PathBuf};

use crate::config::{Config, EnvAction};
use crate::files::RepoStructure;
use crate::host::Capabilities;

use super::options::OptionsAnswers;
use super::types::{ConflictTarget, ExistingAction, Session};

/// Mutable state of one session, owned by the state machine.
///
/// Created with the session's defaults and changed only in response to a step
/// result. The operation queue is built from a snapshot of it.
#[derive(Debug, Clone)]
pub struct WorkflowContext {
    pub repo_name: String,
    pub main_repo_path: PathBuf,
    pub branch_name: String,
    pub worktree_path: PathBuf,
    pub create_new_branch: bool,
    pub base_branch: Option<String>,
    /// Base picked from the inside-worktree menu. Wins over any base offer.
    pub base_override: Option<String>,
    pub env_action: EnvAction,
    pub env_files: Vec<String>,
    pub generated_files: Vec<String>,
    pub install_deps: bool,
    pub open_editor: bool,
    pub open_terminal: bool,
    pub action_on_existing: Option<ExistingAction>,
    /// The worktree removed before creation when replacing.
    pub replace_target: Option<ConflictTarget>,
    pub config: Option<Config>,
    pub using_saved_defaults: bool,
    pub capabilities: Capabilities,
    pub structure: Option<RepoStructure>,
}

impl Default for WorkflowContext {
    fn default() -> Self {
        Self {
            repo_name: String::new(),
            main_repo_path: PathBuf::new(),
            branch_name: String::new(),
            worktree_path: PathBuf::new(),
            create_new_branch: true,
            base_branch: None,
            base_override: None,
            env_action: EnvAction::Nothing,
            env_files: Vec::new(),
            generated_files: Vec::new(),
            install_deps: true,
            open_editor: true,
            open_terminal: true,
            action_on_existing: None,
            replace_target: None,
            config: None,
            using_saved_defaults: false,
            capabilities: Capabilities::default(),
            structure: None,
        }
    }
}

impl WorkflowContext {
    pub fn new(session: &Session) -> Self {
        Self {
            repo_name: session.repo_name.clone(),
            main_repo_path: session.main_repo_path.clone(),
            config: session.config.clone(),
            ..Self::default()
        }
    }

    /// Target a branch at its canonical sibling directory.
    pub fn set_branch(&mut self, branch: &str) {
        self.branch_name = branch.to_string();
        self.worktree_path = worktree_path(&self.main_repo_path, &self.repo_name, branch);
    }

    pub fn is_replacing(&self) -> bool {
        self.action_on_existing == Some(ExistingAction::Replace)
    }

    pub fn apply_options(&mut self, answers: &OptionsAnswers) {
        self.env_action = answers.env_action;
        self.env_files = answers.env_files.clone();
        self.generated_files = answers.generated_files.clone();
        self.install_deps = answers.install_deps;
        self.open_editor = answers.open_editor;
        self.open_terminal = answers.open_terminal;
        self.using_saved_defaults = answers.using_saved_defaults;
    }

    pub fn terminal_title(&self) -> String {
        format!("{}: {}", self.repo_name, self.branch_name)
    }
}

/// `<parent of main repo>/<repo>-<branch with '/' replaced by '-'>`.
pub fn worktree_path(main_repo_path: &Path, repo_name: &str, branch: &str) -> PathBuf {
    let parent = main_repo_path.parent().unwrap_or(main_repo_path);
    parent.join(format!("{}-{}", repo_name, branch.replace('/', "-")))
}

pub fn repo_name(main_repo_path: &Path) -> String {
    main_repo_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "repo".to_string())
}
