//! Branch resolution: decide how the worktree's branch comes into being.
//!
//! [`inspect`] does every git query up front; [`decide`] is pure and turns
//! the snapshot into a creation strategy or a question for the user.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::git::{self, BranchExists, RemoteRef, WorktreeInfo};
use crate::services::Services;

use super::context::worktree_path;

/// Default branch base offered when origin has moved ahead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseOffer {
    pub base: String,
    pub ahead: u32,
}

/// Snapshot of everything known about a requested branch name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchCheck {
    pub requested: String,
    /// Local branch name: the requested name, or the branch part of a
    /// qualified ref.
    pub branch: String,
    pub qualified: Option<RemoteRef>,
    pub exists: BranchExists,
    /// A linked worktree that already has `branch` checked out.
    pub checked_out_at: Option<WorktreeInfo>,
    pub path: PathBuf,
    pub path_exists: bool,
    pub path_registered: bool,
    pub base_offer: Option<BaseOffer>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchAction {
    /// Create `branch` tracking an explicit `remote/branch`.
    TrackQualified,
    /// Check out the existing local branch.
    UseExisting,
    /// Create `branch` tracking `origin/branch`.
    Track,
    Create,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub action: BranchAction,
    pub base_branch: Option<String>,
    pub remote_ref: Option<RemoteRef>,
}

impl Resolution {
    pub fn creates_branch(&self) -> bool {
        self.action != BranchAction::UseExisting
    }

    pub fn track(branch: &str) -> Self {
        Self {
            action: BranchAction::Track,
            base_branch: Some(format!("origin/{}", branch)),
            remote_ref: None,
        }
    }

    pub fn create(base_branch: Option<String>) -> Self {
        Self {
            action: BranchAction::Create,
            base_branch,
            remote_ref: None,
        }
    }

    fn use_existing() -> Self {
        Self {
            action: BranchAction::UseExisting,
            base_branch: None,
            remote_ref: None,
        }
    }

    fn track_qualified(remote_ref: &RemoteRef) -> Self {
        Self {
            action: BranchAction::TrackQualified,
            base_branch: Some(remote_ref.to_string()),
            remote_ref: Some(remote_ref.clone()),
        }
    }
}

/// Result of [`decide`]: either settled, or a question to put to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Resolved(Resolution),
    /// Only origin has the branch: track it or start fresh?
    AskTrack,
    /// Fresh branch while origin's default branch is ahead of ours.
    OfferBase(BaseOffer),
}

pub fn validate_branch_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("Branch name is required".to_string());
    }
    if name.chars().any(char::is_whitespace) {
        return Err("Branch name cannot contain spaces".to_string());
    }
    Ok(())
}

/// Query git for everything [`decide`] and the conflict check need.
///
/// A qualified ref that does not exist on its remote is treated as a plain
/// branch name.
pub fn inspect(
    services: &Services,
    main_repo_path: &Path,
    repo_name: &str,
    requested: &str,
) -> BranchCheck {
    let git = &services.git;

    let remotes = git.list_remotes();
    let qualified = git::parse_qualified_ref(requested, &remotes).and_then(|r| {
        if git.remote_branch_exists(&r.remote, &r.branch) {
            Some(r)
        } else {
            warn!(
                requested,
                remote = %r.remote,
                "branch:qualified ref not found, treating as a branch name"
            );
            None
        }
    });

    let branch = qualified
        .as_ref()
        .map_or_else(|| requested.to_string(), |r| r.branch.clone());

    let exists = if qualified.is_some() {
        BranchExists::default()
    } else {
        git.branch_exists(&branch)
    };

    let worktrees = git.list_worktrees().unwrap_or_else(|e| {
        warn!(error = %e, "branch:listing worktrees failed");
        Vec::new()
    });
    // Includes the main working tree: git refuses a second checkout of its branch too.
    let checked_out_at = worktrees
        .iter()
        .find(|w| w.branch.as_deref() == Some(branch.as_str()))
        .cloned();

    let path = worktree_path(main_repo_path, repo_name, &branch);
    let path_exists = services.files.path_exists(&path);
    let path_registered = worktrees.iter().any(|w| w.path == path);

    let base_offer = if qualified.is_none() && !exists.local {
        base_offer(services)
    } else {
        None
    };

    debug!(
        requested,
        branch = %branch,
        qualified = ?qualified.as_ref().map(ToString::to_string),
        local = exists.local,
        remote = exists.remote,
        path_exists,
        "branch:inspected"
    );

    BranchCheck {
        requested: requested.to_string(),
        branch,
        qualified,
        exists,
        checked_out_at,
        path,
        path_exists,
        path_registered,
        base_offer,
    }
}

fn base_offer(services: &Services) -> Option<BaseOffer> {
    let git = &services.git;
    let default_branch = git.default_branch();
    if git.current_branch().as_deref() != Some(default_branch.as_str()) {
        return None;
    }
    let ahead = git.origin_ahead_count(&default_branch);
    (ahead > 0).then(|| BaseOffer {
        base: format!("origin/{}", default_branch),
        ahead,
    })
}

/// Qualified refs win over everything, then a local branch, then origin.
pub fn decide(check: &BranchCheck, base_override: Option<&str>) -> Decision {
    if let Some(remote_ref) = &check.qualified {
        return Decision::Resolved(Resolution::track_qualified(remote_ref));
    }
    if check.exists.local {
        return Decision::Resolved(Resolution::use_existing());
    }
    if check.exists.remote {
        return Decision::AskTrack;
    }
    decide_fresh(check, base_override)
}

/// Strategy for a branch that will be created from scratch.
pub fn decide_fresh(check: &BranchCheck, base_override: Option<&str>) -> Decision {
    if let Some(base) = base_override {
        return Decision::Resolved(Resolution::create(Some(base.to_string())));
    }
    match &check.base_offer {
        Some(offer) => Decision::OfferBase(offer.clone()),
        None => Decision::Resolved(Resolution::create(None)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::fake::FakeWorld;

    fn check(local: bool, remote: bool) -> BranchCheck {
        BranchCheck {
            requested: "feature/x".into(),
            branch: "feature/x".into(),
            qualified: None,
            exists: BranchExists { local, remote },
            checked_out_at: None,
            path: PathBuf::from("/work/repo-feature-x"),
            path_exists: false,
            path_registered: false,
            base_offer: None,
        }
    }

    #[test]
    fn local_wins_over_remote() {
        let decision = decide(&check(true, true), None);
        assert_eq!(
            decision,
            Decision::Resolved(Resolution {
                action: BranchAction::UseExisting,
                base_branch: None,
                remote_ref: None,
            })
        );
    }

    #[test]
    fn remote_only_asks_to_track() {
        assert_eq!(decide(&check(false, true), None), Decision::AskTrack);
        assert_eq!(
            Resolution::track("feature/x").base_branch.as_deref(),
            Some("origin/feature/x")
        );
    }

    #[test]
    fn qualified_ref_wins_over_existence() {
        let mut c = check(true, true);
        c.qualified = Some(RemoteRef {
            remote: "upstream".into(),
            branch: "feature/x".into(),
        });
        let Decision::Resolved(r) = decide(&c, None) else {
            panic!("expected a resolution");
        };
        assert_eq!(r.action, BranchAction::TrackQualified);
        assert_eq!(r.base_branch.as_deref(), Some("upstream/feature/x"));
        assert!(r.creates_branch());
    }

    #[test]
    fn new_branch_gets_base_offer_unless_overridden() {
        let mut c = check(false, false);
        assert_eq!(
            decide(&c, None),
            Decision::Resolved(Resolution::create(None))
        );

        let offer = BaseOffer {
            base: "origin/main".into(),
            ahead: 3,
        };
        c.base_offer = Some(offer.clone());
        assert_eq!(decide(&c, None), Decision::OfferBase(offer));
        assert_eq!(
            decide(&c, Some("feature/parent")),
            Decision::Resolved(Resolution::create(Some("feature/parent".into())))
        );
    }

    #[test]
    fn branch_names_are_validated() {
        assert!(validate_branch_name("feature/login").is_ok());
        assert!(validate_branch_name("").is_err());
        assert!(validate_branch_name("   ").is_err());
        assert!(validate_branch_name("my branch").is_err());
    }

    #[test]
    fn inspect_uses_existing_qualified_ref() {
        let mut world = FakeWorld::new();
        world.git.remotes = vec!["origin".into(), "upstream".into()];
        world.git.remote_refs.insert("upstream/fix/bug".into());
        let (services, log, _) = world.services();

        let c = inspect(&services, Path::new("/work/repo"), "repo", "upstream/fix/bug");
        assert_eq!(c.branch, "fix/bug");
        assert_eq!(c.path, PathBuf::from("/work/repo-fix-bug"));
        assert_eq!(c.qualified.as_ref().map(ToString::to_string).as_deref(), Some("upstream/fix/bug"));
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn inspect_falls_through_on_missing_qualified_ref() {
        let mut world = FakeWorld::new();
        world.git.remotes = vec!["origin".into(), "upstream".into()];
        let (services, _, _) = world.services();

        let c = inspect(&services, Path::new("/work/repo"), "repo", "upstream/fix/bug");
        assert!(c.qualified.is_none());
        assert_eq!(c.branch, "upstream/fix/bug");
        assert_eq!(c.path, PathBuf::from("/work/repo-upstream-fix-bug"));
        assert_eq!(
            decide(&c, None),
            Decision::Resolved(Resolution::create(None))
        );
    }

    #[test]
    fn inspect_finds_branch_checked_out_elsewhere() {
        let world = FakeWorld::new();
        world.git.worktrees.lock().unwrap().push(WorktreeInfo {
            path: PathBuf::from("/elsewhere/wt"),
            branch: Some("feature/x".into()),
            is_main: false,
        });
        let (services, _, _) = world.services();

        let c = inspect(&services, Path::new("/work/repo"), "repo", "feature/x");
        assert_eq!(
            c.checked_out_at.map(|w| w.path),
            Some(PathBuf::from("/elsewhere/wt"))
        );
    }

    #[test]
    fn inspect_reports_the_main_working_tree_as_holder() {
        let (services, _, _) = FakeWorld::new().services();

        let c = inspect(&services, Path::new("/work/repo"), "repo", "main");
        let holder = c.checked_out_at.expect("main is checked out in the main working tree");
        assert!(holder.is_main);
        assert_eq!(holder.path, PathBuf::from("/work/repo"));
    }

    #[test]
    fn inspect_offers_origin_default_when_ahead() {
        let mut world = FakeWorld::new();
        world.git.ahead = 2;
        let (services, _, _) = world.services();

        let c = inspect(&services, Path::new("/work/repo"), "repo", "feature/new");
        assert_eq!(
            c.base_offer,
            Some(BaseOffer {
                base: "origin/main".into(),
                ahead: 2
            })
        );
    }

    #[test]
    fn no_base_offer_off_the_default_branch() {
        let mut world = FakeWorld::new();
        world.git.ahead = 2;
        world.git.current_branch = Some("develop".into());
        let (services, _, _) = world.services();

        let c = inspect(&services, Path::new("/work/repo"), "repo", "feature/new");
        assert_eq!(c.base_offer, None);
    }
}
