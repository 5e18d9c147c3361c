//! The workflow as a pure state machine.
//!
//! [`Machine::handle`] takes one event and returns the effects the driver must
//! perform. It never touches git, the filesystem or the terminal, so every
//! path through the workflow can be replayed from a list of events.

use tracing::{debug, info, warn};

use crate::config::DefaultValues;
use crate::git::WorktreeInfo;

use super::branch::{self, BaseOffer, BranchCheck, Decision, Resolution};
use super::context::WorkflowContext;
use super::operations::RunSummary;
use super::options::{Answer, OptionsCollector, Question, Survey};
use super::types::{ConflictTarget, ExistingAction, InsideAction, Location, Plan, Session, Source};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Loading,
    NotARepo,
    /// Started inside a linked worktree.
    InsideWorktree {
        current: WorktreeInfo,
        default_branch: String,
    },
    /// Base for a worktree created from inside a linked worktree.
    ChooseBase {
        current_branch: Option<String>,
        default_branch: String,
    },
    SelectWorktree {
        linked: Vec<WorktreeInfo>,
    },
    EnterBranch {
        default: Option<String>,
    },
    CheckingBranch,
    ExistingAction {
        target: ConflictTarget,
        check: Option<BranchCheck>,
    },
    TrackRemote {
        check: BranchCheck,
    },
    OfferBase {
        offer: BaseOffer,
    },
    Surveying,
    Options {
        collector: OptionsCollector,
        question: Question,
    },
    Running {
        done_message: String,
    },
    Done {
        message: String,
        /// Last message of a run that finished with warnings.
        warning: Option<String>,
    },
    Cancelled,
    Failed(String),
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Step::Loading => "loading",
            Step::NotARepo => "not-a-repo",
            Step::InsideWorktree { .. } => "inside-worktree",
            Step::ChooseBase { .. } => "choose-base",
            Step::SelectWorktree { .. } => "select-worktree",
            Step::EnterBranch { .. } => "enter-branch",
            Step::CheckingBranch => "checking-branch",
            Step::ExistingAction { .. } => "existing-action",
            Step::TrackRemote { .. } => "track-remote",
            Step::OfferBase { .. } => "offer-base",
            Step::Surveying => "surveying",
            Step::Options { .. } => "options",
            Step::Running { .. } => "running",
            Step::Done { .. } => "done",
            Step::Cancelled => "cancelled",
            Step::Failed(_) => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Step::NotARepo | Step::Done { .. } | Step::Cancelled | Step::Failed(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Loaded(Session),
    NotARepo,
    /// The user escaped a prompt.
    Cancelled,
    InsideChosen(InsideAction),
    BaseChosen(String),
    SourceChosen(Source),
    BranchEntered(String),
    BranchChecked(BranchCheck),
    ExistingChosen(ExistingAction),
    TrackAnswered(bool),
    BaseAnswered(bool),
    SurveyReady(Survey),
    Answered(Answer),
    OperationsFinished(RunSummary),
}

#[derive(Debug, Clone)]
pub enum Effect {
    /// Inspect a branch name; answered with [`Event::BranchChecked`].
    CheckBranch(String),
    /// Scan the repository and host; answered with [`Event::SurveyReady`].
    Survey,
    SaveDefaults(DefaultValues),
    /// Build and run the queue; answered with [`Event::OperationsFinished`].
    RunOperations(Plan),
}

type Transition = (Step, Vec<Effect>);

pub struct Machine {
    cli_branch: Option<String>,
    ctx: WorkflowContext,
    step: Step,
}

impl Machine {
    pub fn new(cli_branch: Option<String>) -> Self {
        Self {
            cli_branch: cli_branch.filter(|b| !b.trim().is_empty()),
            ctx: WorkflowContext::default(),
            step: Step::Loading,
        }
    }

    pub fn step(&self) -> &Step {
        &self.step
    }

    pub fn context(&self) -> &WorkflowContext {
        &self.ctx
    }

    pub fn is_finished(&self) -> bool {
        self.step.is_terminal()
    }

    pub fn handle(&mut self, event: Event) -> Vec<Effect> {
        if self.is_finished() {
            debug!(step = self.step.name(), ?event, "machine:event after finish ignored");
            return Vec::new();
        }
        let from = std::mem::replace(&mut self.step, Step::Loading);
        let from_name = from.name();
        let (next, effects) = self.transition(from, event);
        debug!(from = from_name, to = next.name(), effects = effects.len(), "machine:transition");
        self.step = next;
        effects
    }

    fn transition(&mut self, step: Step, event: Event) -> Transition {
        match (step, event) {
            (_, Event::Cancelled) => {
                info!("machine:cancelled");
                (Step::Cancelled, Vec::new())
            }
            (Step::Loading, Event::NotARepo) => (Step::NotARepo, Vec::new()),
            (Step::Loading, Event::Loaded(session)) => self.on_loaded(session),

            (
                Step::InsideWorktree {
                    current,
                    default_branch,
                },
                Event::InsideChosen(action),
            ) => match action {
                InsideAction::CreateNew => (
                    Step::ChooseBase {
                        current_branch: current.branch,
                        default_branch,
                    },
                    Vec::new(),
                ),
                InsideAction::ManageCurrent => {
                    self.ctx.worktree_path = current.path.clone();
                    self.ctx.branch_name = current.branch.clone().unwrap_or_default();
                    (
                        Step::ExistingAction {
                            target: ConflictTarget::from_worktree(&current),
                            check: None,
                        },
                        Vec::new(),
                    )
                }
            },
            (Step::ChooseBase { .. }, Event::BaseChosen(base)) => {
                self.ctx.base_override = Some(base);
                (self.enter_branch(), Vec::new())
            }

            (Step::SelectWorktree { .. }, Event::SourceChosen(Source::Existing(info))) => {
                self.ctx.worktree_path = info.path.clone();
                self.ctx.branch_name = info.branch.clone().unwrap_or_default();
                (
                    Step::ExistingAction {
                        target: ConflictTarget::from_worktree(&info),
                        check: None,
                    },
                    Vec::new(),
                )
            }
            (Step::SelectWorktree { .. }, Event::SourceChosen(Source::New)) => {
                (self.enter_branch(), Vec::new())
            }

            (Step::EnterBranch { .. }, Event::BranchEntered(name)) => self.check_branch(name),
            (Step::CheckingBranch, Event::BranchChecked(check)) => self.on_branch_checked(check),

            (Step::ExistingAction { target, check }, Event::ExistingChosen(action)) => {
                self.on_existing(target, check, action)
            }

            (Step::TrackRemote { check }, Event::TrackAnswered(track)) => {
                if track {
                    self.resolved(Resolution::track(&check.branch))
                } else {
                    let decision = branch::decide_fresh(&check, self.ctx.base_override.as_deref());
                    self.follow(decision, check)
                }
            }
            (Step::OfferBase { offer }, Event::BaseAnswered(use_offer)) => {
                self.resolved(Resolution::create(use_offer.then_some(offer.base)))
            }

            (Step::Surveying, Event::SurveyReady(survey)) => {
                self.ctx.capabilities = survey.capabilities.clone();
                self.ctx.structure = Some(survey.structure.clone());
                let saved = self
                    .ctx
                    .config
                    .as_ref()
                    .and_then(|c| c.saved_defaults(&self.ctx.repo_name))
                    .cloned();
                self.ask_next(OptionsCollector::new(survey, saved))
            }
            (
                Step::Options {
                    mut collector,
                    question,
                },
                Event::Answered(answer),
            ) => {
                collector.answer(question, answer);
                self.ask_next(collector)
            }

            (Step::Running { done_message }, Event::OperationsFinished(summary)) => {
                if summary.aborted {
                    let message = summary
                        .message
                        .unwrap_or_else(|| "Operation failed".to_string());
                    (Step::Failed(message), Vec::new())
                } else {
                    let warning = if summary.success {
                        None
                    } else {
                        summary.message
                    };
                    (
                        Step::Done {
                            message: done_message,
                            warning,
                        },
                        Vec::new(),
                    )
                }
            }

            (step, event) => {
                warn!(step = step.name(), ?event, "machine:unexpected event");
                (step, Vec::new())
            }
        }
    }

    fn on_loaded(&mut self, session: Session) -> Transition {
        self.ctx = WorkflowContext::new(&session);
        info!(repo = %self.ctx.repo_name, "machine:loaded");

        match session.location {
            Location::Linked {
                current,
                default_branch,
            } => (
                Step::InsideWorktree {
                    current,
                    default_branch,
                },
                Vec::new(),
            ),
            Location::Main { linked } => {
                if let Some(branch) = self.cli_branch.clone() {
                    if branch::validate_branch_name(&branch).is_ok() {
                        return self.check_branch(branch);
                    }
                    warn!(branch = %branch, "machine:invalid branch argument");
                }
                if linked.is_empty() {
                    (self.enter_branch(), Vec::new())
                } else {
                    (Step::SelectWorktree { linked }, Vec::new())
                }
            }
        }
    }

    fn enter_branch(&self) -> Step {
        Step::EnterBranch {
            default: self
                .cli_branch
                .clone()
                .filter(|b| branch::validate_branch_name(b).is_ok()),
        }
    }

    fn check_branch(&mut self, name: String) -> Transition {
        self.ctx.set_branch(&name);
        (Step::CheckingBranch, vec![Effect::CheckBranch(name)])
    }

    fn on_branch_checked(&mut self, check: BranchCheck) -> Transition {
        self.ctx.branch_name = check.branch.clone();

        // Replacing: the conflict is already settled and the path stays put.
        if self.ctx.is_replacing() {
            let decision = branch::decide(&check, self.ctx.base_override.as_deref());
            return self.follow(decision, check);
        }

        self.ctx.worktree_path = check.path.clone();

        if let Some(existing) = &check.checked_out_at {
            self.ctx.worktree_path = existing.path.clone();
            return (
                Step::ExistingAction {
                    target: ConflictTarget::from_worktree(existing),
                    check: Some(check),
                },
                Vec::new(),
            );
        }

        if check.path_exists {
            let target = ConflictTarget {
                path: check.path.clone(),
                branch: Some(check.branch.clone()),
                registered: check.path_registered,
                is_main: false,
            };
            return (
                Step::ExistingAction {
                    target,
                    check: Some(check),
                },
                Vec::new(),
            );
        }

        let decision = branch::decide(&check, self.ctx.base_override.as_deref());
        self.follow(decision, check)
    }

    fn on_existing(
        &mut self,
        target: ConflictTarget,
        check: Option<BranchCheck>,
        action: ExistingAction,
    ) -> Transition {
        info!(action = ?action, path = %target.path.display(), "machine:existing action");
        if target.is_main && matches!(action, ExistingAction::Delete | ExistingAction::Replace) {
            warn!(path = %target.path.display(), "machine:main working tree cannot be removed");
            return (Step::ExistingAction { target, check }, Vec::new());
        }
        match action {
            ExistingAction::Cancel => (Step::Cancelled, Vec::new()),
            ExistingAction::Open => {
                self.ctx.action_on_existing = Some(action);
                self.ctx.worktree_path = target.path.clone();
                self.run(Plan::Open(target.path))
            }
            ExistingAction::Delete => {
                self.ctx.action_on_existing = Some(action);
                self.run(Plan::Delete(target))
            }
            ExistingAction::Replace => {
                let Some(branch) = target.branch.clone() else {
                    warn!("machine:replace needs a branch");
                    return (Step::ExistingAction { target, check }, Vec::new());
                };
                self.ctx.action_on_existing = Some(action);
                self.ctx.worktree_path = target.path.clone();
                self.ctx.branch_name = branch.clone();
                self.ctx.replace_target = Some(target);
                match check {
                    Some(check) => {
                        let decision = branch::decide(&check, self.ctx.base_override.as_deref());
                        self.follow(decision, check)
                    }
                    None => (Step::CheckingBranch, vec![Effect::CheckBranch(branch)]),
                }
            }
        }
    }

    fn follow(&mut self, decision: Decision, check: BranchCheck) -> Transition {
        match decision {
            Decision::Resolved(resolution) => self.resolved(resolution),
            Decision::AskTrack => (Step::TrackRemote { check }, Vec::new()),
            Decision::OfferBase(offer) => (Step::OfferBase { offer }, Vec::new()),
        }
    }

    fn resolved(&mut self, resolution: Resolution) -> Transition {
        info!(
            branch = %self.ctx.branch_name,
            action = ?resolution.action,
            base = ?resolution.base_branch,
            "machine:branch resolved"
        );
        self.ctx.create_new_branch = resolution.creates_branch();
        self.ctx.base_branch = resolution.base_branch;
        (Step::Surveying, vec![Effect::Survey])
    }

    fn ask_next(&mut self, mut collector: OptionsCollector) -> Transition {
        if let Some(question) = collector.next_question() {
            return (
                Step::Options {
                    collector,
                    question,
                },
                Vec::new(),
            );
        }

        let answers = collector.finish();
        self.ctx.apply_options(&answers);

        let mut effects = Vec::new();
        if answers.save {
            effects.push(Effect::SaveDefaults(answers.defaults()));
        }
        let (step, run) = self.run(Plan::Create(Box::new(self.ctx.clone())));
        effects.extend(run);
        (step, effects)
    }

    fn run(&self, plan: Plan) -> Transition {
        (
            Step::Running {
                done_message: plan.done_message(),
            },
            vec![Effect::RunOperations(plan)],
        )
    }
}
