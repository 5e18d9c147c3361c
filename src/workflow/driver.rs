//! Glue between the state machine and the outside world.
//!
//! The driver renders each interactive step as a prompt, performs lookups and
//! effects through [`Services`], and feeds the results back as events.

use anyhow::{Result, bail};
use std::collections::VecDeque;
use tracing::{debug, info, warn};

use crate::files::{RepoKind, RepoStructure};
use crate::git::WorktreeInfo;
use crate::prompt::{Item, Prompter, Reply};
use crate::services::Services;

use super::branch;
use super::context::{self, WorkflowContext};
use super::existing;
use super::machine::{Effect, Event, Machine, Step};
use super::operations::{self, RunObserver};
use super::options::{Answer, Ask, Survey};
use super::types::{InsideAction, Location, Plan, Session, Source};

/// Run one session to a terminal step.
pub fn drive(
    services: &Services,
    prompter: &mut dyn Prompter,
    observer: &mut dyn RunObserver,
    cli_branch: Option<String>,
) -> Result<Machine> {
    let mut machine = Machine::new(cli_branch);
    let mut events = VecDeque::from([load_session(services)?]);

    loop {
        while let Some(event) = events.pop_front() {
            for effect in machine.handle(event) {
                if let Some(next) = perform(services, prompter, observer, machine.context(), effect)? {
                    events.push_back(next);
                }
            }
        }
        if machine.is_finished() {
            return Ok(machine);
        }
        events.push_back(render(prompter, machine.step())?);
    }
}

fn load_session(services: &Services) -> Result<Event> {
    let git = &services.git;
    if !git.is_inside_git_repo() {
        return Ok(Event::NotARepo);
    }

    let main_repo_path = git.main_repo_path()?;
    let config = services.config.load().unwrap_or_else(|e| {
        warn!(error = %e, "workflow:config ignored");
        None
    });

    let location = if git.is_inside_worktree()? {
        let current_path = git.current_worktree_path()?;
        let current = git
            .list_worktrees()?
            .into_iter()
            .find(|w| w.path == current_path)
            .unwrap_or_else(|| WorktreeInfo {
                path: current_path,
                branch: git.current_branch(),
                is_main: false,
            });
        Location::Linked {
            current,
            default_branch: git.default_branch(),
        }
    } else {
        let linked = git
            .list_worktrees()?
            .into_iter()
            .filter(|w| !w.is_main)
            .collect();
        Location::Main { linked }
    };

    git.enter_main_repo(&main_repo_path)?;

    let session = Session {
        repo_name: context::repo_name(&main_repo_path),
        main_repo_path,
        config,
        location,
    };
    if let Some(config) = &session.config {
        let scripts = config.after_scripts(&session.repo_name);
        if !scripts.is_empty() {
            debug!(?scripts, "workflow:after scripts configured, not run");
        }
    }
    info!(
        repo = %session.repo_name,
        main = %session.main_repo_path.display(),
        inside_worktree = matches!(session.location, Location::Linked { .. }),
        "workflow:session"
    );
    Ok(Event::Loaded(session))
}

// ── Rendering ────────────────────────────────────────────────────

fn cancelled_or<T>(reply: Reply<T>, f: impl FnOnce(T) -> Option<Event>) -> Event {
    match reply {
        Reply::Answered(value) => f(value).unwrap_or(Event::Cancelled),
        Reply::Cancelled => Event::Cancelled,
    }
}

fn worktree_item(info: &WorktreeInfo) -> Item {
    Item::new(info.branch.as_deref().unwrap_or("(detached)")).hint(info.path.display().to_string())
}

fn render(prompter: &mut dyn Prompter, step: &Step) -> Result<Event> {
    let event = match step {
        Step::InsideWorktree { current, .. } => {
            prompter.note(&format!(
                "You are inside the worktree {} ({})",
                current.path.display(),
                current.branch.as_deref().unwrap_or("detached")
            ));
            let items = [
                Item::new("Create new worktree"),
                Item::new("Manage current worktree").hint(current.path.display().to_string()),
            ];
            let reply = prompter.select("What would you like to do?", &items, 0)?;
            cancelled_or(reply, |idx| match idx {
                0 => Some(Event::InsideChosen(InsideAction::CreateNew)),
                1 => Some(Event::InsideChosen(InsideAction::ManageCurrent)),
                _ => None,
            })
        }

        Step::ChooseBase {
            current_branch,
            default_branch,
        } => {
            let mut bases = Vec::new();
            let mut items = Vec::new();
            if let Some(current) = current_branch {
                bases.push(current.clone());
                items.push(Item::new("From current branch").hint(current.clone()));
            }
            let origin_default = format!("origin/{}", default_branch);
            items.push(Item::new(format!("From {}", origin_default)));
            bases.push(origin_default);

            let reply = prompter.select("Create the new worktree from", &items, 0)?;
            cancelled_or(reply, |idx| bases.get(idx).cloned().map(Event::BaseChosen))
        }

        Step::SelectWorktree { linked } => {
            let mut items: Vec<Item> = linked.iter().map(worktree_item).collect();
            items.push(Item::new("Create new worktree"));
            let reply = prompter.select("Select a worktree or create a new one", &items, linked.len())?;
            cancelled_or(reply, |idx| {
                Some(Event::SourceChosen(match linked.get(idx) {
                    Some(info) => Source::Existing(info.clone()),
                    None => Source::New,
                }))
            })
        }

        Step::EnterBranch { default } => {
            let reply = prompter.text("Branch name", default.as_deref(), &branch::validate_branch_name)?;
            cancelled_or(reply, |name| Some(Event::BranchEntered(name)))
        }

        Step::ExistingAction { target, .. } => {
            let actions = existing::actions_for(target);
            let reply = prompter.select(
                &existing::prompt_message(target),
                &existing::items(&actions),
                0,
            )?;
            cancelled_or(reply, |idx| actions.get(idx).copied().map(Event::ExistingChosen))
        }

        Step::TrackRemote { check } => {
            let reply = prompter.confirm(
                &format!("Branch '{}' exists on origin. Track it?", check.branch),
                true,
            )?;
            cancelled_or(reply, |track| Some(Event::TrackAnswered(track)))
        }

        Step::OfferBase { offer } => {
            let reply = prompter.confirm(
                &format!(
                    "{} is {} commit(s) ahead of your branch. Create from {}?",
                    offer.base, offer.ahead, offer.base
                ),
                true,
            )?;
            cancelled_or(reply, |use_offer| Some(Event::BaseAnswered(use_offer)))
        }

        Step::Options {
            collector,
            question,
        } => match collector.ask(*question) {
            Ask::Confirm { message, default } => {
                let reply = prompter.confirm(&message, default)?;
                cancelled_or(reply, |b| Some(Event::Answered(Answer::Confirm(b))))
            }
            Ask::Select {
                message,
                items,
                default,
            } => {
                let reply = prompter.select(&message, &items, default)?;
                cancelled_or(reply, |idx| Some(Event::Answered(Answer::Choice(idx))))
            }
            Ask::MultiSelect {
                message,
                items,
                checked,
            } => {
                let reply = prompter.multi_select(&message, &items, &checked)?;
                cancelled_or(reply, |picked| Some(Event::Answered(Answer::Checked(picked))))
            }
        },

        other => bail!("Nothing to ask in the {} step", other.name()),
    };
    Ok(event)
}

// ── Effects ──────────────────────────────────────────────────────

fn perform(
    services: &Services,
    prompter: &mut dyn Prompter,
    observer: &mut dyn RunObserver,
    ctx: &WorkflowContext,
    effect: Effect,
) -> Result<Option<Event>> {
    let event = match effect {
        Effect::CheckBranch(name) => Some(Event::BranchChecked(branch::inspect(
            services,
            &ctx.main_repo_path,
            &ctx.repo_name,
            &name,
        ))),
        Effect::Survey => Some(Event::SurveyReady(survey(services, ctx))),
        Effect::SaveDefaults(defaults) => {
            match services.config.save_repo_defaults(&ctx.repo_name, &defaults) {
                Ok(()) => prompter.note("Settings saved"),
                Err(e) => {
                    warn!(error = %e, "workflow:saving settings failed");
                    prompter.note(&format!("Could not save settings: {}", e));
                }
            }
            None
        }
        Effect::RunOperations(plan) => {
            let summary = match &plan {
                Plan::Create(snapshot) => {
                    operations::run(operations::create_queue(services, snapshot), observer)
                }
                Plan::Delete(target) => {
                    operations::run(operations::delete_queue(services, target), observer)
                }
                Plan::Open(path) => {
                    let terminal = ctx.config.as_ref().and_then(|c| c.terminal.as_deref());
                    let editor = services.host.detect_capabilities(terminal).editor;
                    operations::run(operations::open_queue(services, path, editor), observer)
                }
            };
            Some(Event::OperationsFinished(summary))
        }
    };
    Ok(event)
}

fn scan<T: Default>(what: &str, joined: std::thread::Result<Result<T>>) -> T {
    match joined {
        Ok(Ok(found)) => found,
        Ok(Err(e)) => {
            warn!(scan = what, error = %e, "workflow:scan failed");
            T::default()
        }
        Err(_) => {
            warn!(scan = what, "workflow:scan panicked");
            T::default()
        }
    }
}

/// Read-only lookups for the options questions, run side by side.
fn survey(services: &Services, ctx: &WorkflowContext) -> Survey {
    let root = ctx.main_repo_path.as_path();
    let terminal = ctx.config.as_ref().and_then(|c| c.terminal.as_deref());

    std::thread::scope(|s| {
        let env = s.spawn(|| services.files.find_env_files(root));
        let generated = s.spawn(|| services.files.find_generated_files(root));
        let capabilities = s.spawn(|| services.host.detect_capabilities(terminal));
        let structure = services
            .files
            .detect_repo_structure(root)
            .unwrap_or_else(|e| {
                warn!(error = %e, "workflow:structure detection failed");
                RepoStructure {
                    kind: RepoKind::SingleProject,
                    projects: Vec::new(),
                }
            });

        Survey {
            env_files: scan("env files", env.join()),
            generated_files: scan("generated files", generated.join()),
            structure,
            capabilities: capabilities.join().unwrap_or_default(),
        }
    })
}

/// One line for the end of the session.
pub fn summary_line(step: &Step) -> Option<String> {
    match step {
        Step::Done { message, .. } => Some(message.clone()),
        Step::Cancelled => Some("Operation cancelled.".to_string()),
        Step::NotARepo => Some("Not inside a git repository.".to_string()),
        Step::Failed(message) => Some(message.clone()),
        _ => None,
    }
}
