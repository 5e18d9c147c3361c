use std::path::PathBuf;

use crate::config::Config;
use crate::git::WorktreeInfo;

use super::context::WorkflowContext;

/// Facts gathered once when the session starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub repo_name: String,
    pub main_repo_path: PathBuf,
    /// `None` when the config file is absent or unreadable.
    pub config: Option<Config>,
    pub location: Location,
}

/// Where the command was started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// The main worktree, with the linked worktrees that already exist.
    Main { linked: Vec<WorktreeInfo> },
    /// A linked worktree.
    Linked {
        current: WorktreeInfo,
        default_branch: String,
    },
}

/// Choices offered when started inside a linked worktree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsideAction {
    CreateNew,
    ManageCurrent,
}

/// First choice in the main repository when linked worktrees exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Existing(WorktreeInfo),
    New,
}

/// What to do with a worktree or directory that is already there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExistingAction {
    Open,
    Delete,
    Replace,
    Cancel,
}

impl ExistingAction {
    pub fn label(self) -> &'static str {
        match self {
            ExistingAction::Open => "Open in editor",
            ExistingAction::Delete => "Delete worktree",
            ExistingAction::Replace => "Replace with a fresh worktree",
            ExistingAction::Cancel => "Cancel",
        }
    }
}

/// A worktree or directory standing where we want to work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictTarget {
    pub path: PathBuf,
    pub branch: Option<String>,
    /// Known to `git worktree list`, so removal must go through git first.
    pub registered: bool,
    /// The main working tree. It can be opened but never removed.
    pub is_main: bool,
}

impl ConflictTarget {
    pub fn from_worktree(info: &WorktreeInfo) -> Self {
        Self {
            path: info.path.clone(),
            branch: info.branch.clone(),
            registered: true,
            is_main: info.is_main,
        }
    }
}

/// The side effects chosen once prompting is over.
#[derive(Debug, Clone)]
pub enum Plan {
    Create(Box<WorkflowContext>),
    Delete(ConflictTarget),
    Open(PathBuf),
}

impl Plan {
    /// Summary line printed when the plan completes.
    pub fn done_message(&self) -> String {
        match self {
            Plan::Create(ctx) => format!("Worktree ready at: {}", ctx.worktree_path.display()),
            Plan::Delete(_) => "Worktree deleted.".to_string(),
            Plan::Open(path) => format!("Opened {}", path.display()),
        }
    }
}
