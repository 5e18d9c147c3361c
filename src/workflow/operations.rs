//! Sequential side effects with per-step status.
//!
//! A step returning `Ok(success: false)` is a warning and the queue moves on.
//! A step returning `Err` is an error and nothing after it runs.

use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::EnvAction;
use crate::host::editor::EDITOR_ENV;
use crate::services::Services;

use super::context::WorkflowContext;
use super::existing::remove_with_fallback;
use super::types::ConflictTarget;

#[derive(Debug, thiserror::Error)]
pub enum OperationError {
    #[error("Failed to create worktree: {0}")]
    CreateFailed(String),
    #[error("Failed to remove {}: {reason}", path.display())]
    RemoveFailed { path: PathBuf, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationOutcome {
    pub success: bool,
    pub message: Option<String>,
}

impl OperationOutcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationId {
    RemoveExisting,
    Fetch,
    Create,
    EnvFiles,
    GeneratedFiles,
    Install,
    Editor,
    Terminal,
    Delete,
    Open,
}

type RunFn<'a> = Box<dyn FnOnce() -> Result<OperationOutcome> + 'a>;

pub struct Operation<'a> {
    pub id: OperationId,
    pub label: String,
    run: RunFn<'a>,
}

impl<'a> Operation<'a> {
    pub fn new(
        id: OperationId,
        label: impl Into<String>,
        run: impl FnOnce() -> Result<OperationOutcome> + 'a,
    ) -> Self {
        Self {
            id,
            label: label.into(),
            run: Box::new(run),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationStatus {
    Pending,
    Running,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationState {
    pub id: OperationId,
    pub label: String,
    pub status: OperationStatus,
    pub message: Option<String>,
}

/// Live view of a run, e.g. spinners.
pub trait RunObserver {
    fn on_start(&mut self, state: &OperationState);
    fn on_finish(&mut self, state: &OperationState);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Every step succeeded. Vacuously true for an empty queue.
    pub success: bool,
    /// A step errored and the rest of the queue was skipped.
    pub aborted: bool,
    /// Message of the last step that reported one.
    pub message: Option<String>,
    pub states: Vec<OperationState>,
}

pub fn run(operations: Vec<Operation<'_>>, observer: &mut dyn RunObserver) -> RunSummary {
    let mut states: Vec<OperationState> = operations
        .iter()
        .map(|op| OperationState {
            id: op.id,
            label: op.label.clone(),
            status: OperationStatus::Pending,
            message: None,
        })
        .collect();

    let mut success = true;
    let mut aborted = false;
    let mut last_message = None;

    for (state, op) in states.iter_mut().zip(operations) {
        state.status = OperationStatus::Running;
        observer.on_start(state);
        info!(id = ?op.id, label = %op.label, "operations:step");

        match (op.run)() {
            Ok(outcome) => {
                if outcome.success {
                    state.status = OperationStatus::Success;
                } else {
                    state.status = OperationStatus::Warning;
                    success = false;
                    warn!(id = ?op.id, message = ?outcome.message, "operations:warning");
                }
                state.message = outcome.message;
                if state.message.is_some() {
                    last_message = state.message.clone();
                }
                observer.on_finish(state);
            }
            Err(e) => {
                let message = format!("{:#}", e);
                warn!(id = ?op.id, error = %message, "operations:error");
                state.status = OperationStatus::Error;
                state.message = Some(message.clone());
                last_message = Some(message);
                success = false;
                aborted = true;
                observer.on_finish(state);
                break;
            }
        }
    }

    info!(success, aborted, "operations:finished");
    RunSummary {
        success,
        aborted,
        message: last_message,
        states,
    }
}

// ── Queues ───────────────────────────────────────────────────────

/// Steps for a new worktree, in their fixed order.
pub fn create_queue<'a>(services: &'a Services, ctx: &'a WorkflowContext) -> Vec<Operation<'a>> {
    let mut ops = Vec::new();
    let path = ctx.worktree_path.as_path();

    if ctx.is_replacing()
        && let Some(target) = &ctx.replace_target
    {
        ops.push(Operation::new(
            OperationId::RemoveExisting,
            "Removing existing worktree",
            move || {
                remove_with_fallback(services, target)?;
                Ok(OperationOutcome::ok("Removed"))
            },
        ));
    }

    ops.push(Operation::new(OperationId::Fetch, "Fetching from origin", move || {
        let result = services.git.fetch();
        if !result.success {
            warn!(error = ?result.error, "operations:fetch skipped");
        }
        Ok(OperationOutcome::ok(if result.success { "Done" } else { "Skipped" }))
    }));

    ops.push(Operation::new(OperationId::Create, "Creating worktree", move || {
        let result = services.git.create_worktree(
            path,
            &ctx.branch_name,
            ctx.create_new_branch,
            ctx.base_branch.as_deref(),
        );
        if result.success {
            Ok(OperationOutcome::ok("Created"))
        } else {
            let reason = result.error.unwrap_or_else(|| "unknown git error".to_string());
            Err(OperationError::CreateFailed(reason).into())
        }
    }));

    if ctx.env_action != EnvAction::Nothing && !ctx.env_files.is_empty() {
        let label = match ctx.env_action {
            EnvAction::Symlink => "Symlinking env files",
            _ => "Copying env files",
        };
        ops.push(Operation::new(OperationId::EnvFiles, label, move || {
            let main = ctx.main_repo_path.as_path();
            let result = match ctx.env_action {
                EnvAction::Symlink => services.files.symlink_env_files(main, path, &ctx.env_files),
                EnvAction::Copy => services.files.copy_env_files(main, path, &ctx.env_files),
                EnvAction::Nothing => Ok(()),
            };
            Ok(soft(result, "Done"))
        }));
    }

    if !ctx.generated_files.is_empty() {
        ops.push(Operation::new(
            OperationId::GeneratedFiles,
            "Copying generated files",
            move || {
                let result = services.files.copy_generated_files(
                    &ctx.main_repo_path,
                    path,
                    &ctx.generated_files,
                );
                Ok(soft(result, "Done"))
            },
        ));
    }

    if ctx.install_deps
        && let Some(structure) = ctx.structure.as_ref().filter(|s| s.has_projects())
    {
        ops.push(Operation::new(
            OperationId::Install,
            "Installing dependencies",
            move || {
                let outcome = services.host.install_dependencies(path, structure);
                Ok(OperationOutcome {
                    success: outcome.succeeded(),
                    message: Some(outcome.summary()),
                })
            },
        ));
    }

    if ctx.open_editor {
        ops.push(Operation::new(OperationId::Editor, "Opening in editor", move || {
            Ok(open_editor(services, ctx.capabilities.editor.as_deref(), path))
        }));
    }

    if ctx.open_terminal {
        ops.push(Operation::new(OperationId::Terminal, "Opening terminal", move || {
            let title = ctx.terminal_title();
            let result = services
                .host
                .open_in_terminal(ctx.capabilities.terminal, path, &title);
            Ok(soft(result, "Opened"))
        }));
    }

    ops
}

pub fn delete_queue<'a>(services: &'a Services, target: &'a ConflictTarget) -> Vec<Operation<'a>> {
    vec![Operation::new(OperationId::Delete, "Removing worktree", move || {
        remove_with_fallback(services, target)?;
        Ok(OperationOutcome::ok("Worktree removed"))
    })]
}

pub fn open_queue<'a>(
    services: &'a Services,
    path: &'a Path,
    editor: Option<String>,
) -> Vec<Operation<'a>> {
    vec![Operation::new(OperationId::Open, "Opening in editor", move || {
        Ok(open_editor(services, editor.as_deref(), path))
    })]
}

fn soft(result: Result<()>, done: &str) -> OperationOutcome {
    match result {
        Ok(()) => OperationOutcome::ok(done),
        Err(e) => OperationOutcome::warning(format!("{:#}", e)),
    }
}

/// Without an editor the folder opens in the file explorer, reported as a
/// warning so the user learns how to pick one.
fn open_editor(services: &Services, editor: Option<&str>, path: &Path) -> OperationOutcome {
    match editor {
        Some(editor) => match services.host.open_in_editor(editor, path) {
            Ok(()) => OperationOutcome::ok(format!("Opened in {}", editor)),
            Err(e) => OperationOutcome::warning(format!("Could not open {}: {:#}", editor, e)),
        },
        None => {
            let hint = format!("No editor found. Set {} to choose one", EDITOR_ENV);
            match services.host.open_in_file_explorer(path) {
                Ok(()) => OperationOutcome::warning(format!("{} (opened the folder instead)", hint)),
                Err(e) => {
                    warn!(error = %e, "operations:file explorer failed");
                    OperationOutcome::warning(hint)
                }
            }
        }
    }
}
