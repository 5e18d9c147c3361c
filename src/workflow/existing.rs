//! Handling a worktree or directory that already occupies the target path.

use anyhow::Result;
use tracing::{info, warn};

use crate::prompt::Item;
use crate::services::Services;

use super::operations::OperationError;
use super::types::{ConflictTarget, ExistingAction};

/// Replace needs a branch to recreate, so detached worktrees don't offer it.
/// The main working tree only offers Open and Cancel.
pub fn actions_for(target: &ConflictTarget) -> Vec<ExistingAction> {
    if target.is_main {
        return vec![ExistingAction::Open, ExistingAction::Cancel];
    }
    let mut actions = vec![ExistingAction::Open];
    if target.branch.is_some() {
        actions.push(ExistingAction::Replace);
    }
    actions.push(ExistingAction::Delete);
    actions.push(ExistingAction::Cancel);
    actions
}

pub fn items(actions: &[ExistingAction]) -> Vec<Item> {
    actions
        .iter()
        .map(|a| match a {
            ExistingAction::Replace => Item::new(a.label()).hint("delete, then create again"),
            _ => Item::new(a.label()),
        })
        .collect()
}

pub fn prompt_message(target: &ConflictTarget) -> String {
    match &target.branch {
        Some(branch) if target.is_main => format!(
            "'{}' is checked out in the main repository at {}",
            branch,
            target.path.display()
        ),
        Some(branch) if target.registered => format!(
            "Worktree for '{}' already exists at {}",
            branch,
            target.path.display()
        ),
        _ => format!("{} already exists", target.path.display()),
    }
}

/// Delete a worktree without corrupting git's registry.
///
/// Registered worktrees go through `git worktree remove --force` first. The
/// directory is deleted directly only when git could not remove it or never
/// knew it, and stale registry entries are pruned afterwards.
pub fn remove_with_fallback(services: &Services, target: &ConflictTarget) -> Result<()> {
    let path = &target.path;

    if target.registered {
        let result = services.git.remove_worktree(path);
        if result.success {
            info!(path = %path.display(), "existing:worktree removed");
            return Ok(());
        }
        warn!(
            path = %path.display(),
            error = result.error.as_deref().unwrap_or_default(),
            "existing:git remove failed, deleting directory"
        );
    }

    if services.files.path_exists(path) {
        services
            .files
            .remove_dir_all(path)
            .map_err(|e| OperationError::RemoveFailed {
                path: path.clone(),
                reason: format!("{:#}", e),
            })?;
        info!(path = %path.display(), "existing:directory deleted");
    }

    let pruned = services.git.prune_worktrees();
    if !pruned.success {
        warn!(error = pruned.error.as_deref().unwrap_or_default(), "existing:prune failed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::fake::FakeWorld;
    use std::path::PathBuf;

    fn target(registered: bool) -> ConflictTarget {
        ConflictTarget {
            path: PathBuf::from("/work/repo-feature"),
            branch: Some("feature".into()),
            registered,
            is_main: false,
        }
    }

    #[test]
    fn replace_is_only_offered_with_a_branch() {
        let mut t = target(true);
        assert_eq!(actions_for(&t).len(), 4);
        t.branch = None;
        assert!(!actions_for(&t).contains(&ExistingAction::Replace));
        assert_eq!(actions_for(&t).last(), Some(&ExistingAction::Cancel));
    }

    #[test]
    fn main_working_tree_can_only_be_opened() {
        let mut t = target(true);
        t.branch = Some("main".into());
        t.is_main = true;
        assert_eq!(
            actions_for(&t),
            vec![ExistingAction::Open, ExistingAction::Cancel]
        );
        assert!(prompt_message(&t).contains("main repository"));
    }

    #[test]
    fn registered_worktree_is_removed_through_git() {
        let (services, log, _) = FakeWorld::new().services();
        remove_with_fallback(&services, &target(true)).unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["git:remove /work/repo-feature"]);
    }

    #[test]
    fn failed_git_removal_falls_back_to_directory_delete() {
        let mut world = FakeWorld::new();
        world.git.fail_remove = true;
        world
            .files
            .existing
            .lock()
            .unwrap()
            .insert(PathBuf::from("/work/repo-feature"));
        let (services, log, _) = world.services();

        remove_with_fallback(&services, &target(true)).unwrap();
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "git:remove /work/repo-feature",
                "files:remove-dir /work/repo-feature",
                "git:prune",
            ]
        );
    }

    #[test]
    fn unregistered_directory_skips_git_removal() {
        let world = FakeWorld::new();
        world
            .files
            .existing
            .lock()
            .unwrap()
            .insert(PathBuf::from("/work/repo-feature"));
        let (services, log, _) = world.services();

        remove_with_fallback(&services, &target(false)).unwrap();
        assert_eq!(
            *log.lock().unwrap(),
            vec!["files:remove-dir /work/repo-feature", "git:prune"]
        );
    }
}
