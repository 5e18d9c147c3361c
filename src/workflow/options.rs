//! Post-creation questions: env files, generated files, install, editor,
//! terminal, and whether to remember the answers.
//!
//! The collector is a small queue of questions. Which questions appear depends
//! on what the survey found; saved per-repository defaults either pre-fill
//! them or, when accepted, replace them entirely. The save question closes
//! every path.

use std::collections::VecDeque;
use tracing::warn;

use crate::config::{DefaultValues, EnvAction};
use crate::files::RepoStructure;
use crate::host::Capabilities;
use crate::prompt::Item;

/// What the scans found in the main repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Survey {
    pub env_files: Vec<String>,
    pub generated_files: Vec<String>,
    pub structure: RepoStructure,
    pub capabilities: Capabilities,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Question {
    UseSaved,
    EnvAction,
    GeneratedFiles,
    InstallDeps,
    OpenEditor,
    OpenTerminal,
    Save,
}

/// Raw reply from the prompt layer; the collector knows what it means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    Confirm(bool),
    Choice(usize),
    Checked(Vec<usize>),
}

/// How a question should be asked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ask {
    Confirm {
        message: String,
        default: bool,
    },
    Select {
        message: String,
        items: Vec<Item>,
        default: usize,
    },
    MultiSelect {
        message: String,
        items: Vec<Item>,
        checked: Vec<bool>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionsAnswers {
    pub env_action: EnvAction,
    /// Empty whenever `env_action` is `Nothing`.
    pub env_files: Vec<String>,
    pub copy_generated: bool,
    /// Empty whenever `copy_generated` is false.
    pub generated_files: Vec<String>,
    pub install_deps: bool,
    pub open_editor: bool,
    pub open_terminal: bool,
    pub save: bool,
    pub using_saved_defaults: bool,
}

impl OptionsAnswers {
    /// The five fields persisted per repository.
    pub fn defaults(&self) -> DefaultValues {
        DefaultValues {
            dot_env_action: Some(self.env_action),
            copy_generated_files: Some(self.copy_generated),
            install_dependencies: Some(self.install_deps),
            open_in_editor: Some(self.open_editor),
            open_in_terminal: Some(self.open_terminal),
        }
    }
}

const ENV_ACTIONS: [EnvAction; 3] = [EnvAction::Symlink, EnvAction::Copy, EnvAction::Nothing];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionsCollector {
    survey: Survey,
    saved: Option<DefaultValues>,
    queue: VecDeque<Question>,
    answers: OptionsAnswers,
}

impl OptionsCollector {
    /// `saved` is only honoured when at least one field is set.
    pub fn new(survey: Survey, saved: Option<DefaultValues>) -> Self {
        let saved = saved.filter(DefaultValues::has_any);
        let mut collector = Self {
            answers: OptionsAnswers {
                env_action: EnvAction::Nothing,
                env_files: Vec::new(),
                copy_generated: false,
                generated_files: Vec::new(),
                install_deps: false,
                open_editor: false,
                open_terminal: false,
                save: false,
                using_saved_defaults: false,
            },
            survey,
            saved,
            queue: VecDeque::new(),
        };
        if collector.saved.is_some() {
            collector.queue.push_back(Question::UseSaved);
        } else {
            collector.queue_individual();
        }
        collector
    }

    fn queue_individual(&mut self) {
        if !self.survey.env_files.is_empty() {
            self.queue.push_back(Question::EnvAction);
        }
        if !self.survey.generated_files.is_empty() {
            self.queue.push_back(Question::GeneratedFiles);
        }
        if self.survey.structure.has_projects() {
            self.queue.push_back(Question::InstallDeps);
        }
        self.queue.extend([Question::OpenEditor, Question::OpenTerminal, Question::Save]);
    }

    pub fn next_question(&mut self) -> Option<Question> {
        self.queue.pop_front()
    }

    // ── Defaults shown in the prompts ────────────────────────────────

    fn default_env_action(&self) -> EnvAction {
        self.saved
            .as_ref()
            .and_then(|s| s.dot_env_action)
            .unwrap_or(EnvAction::Symlink)
    }

    fn default_copy_generated(&self) -> bool {
        self.saved_flag(|s| s.copy_generated_files)
    }

    fn saved_flag(&self, field: impl Fn(&DefaultValues) -> Option<bool>) -> bool {
        self.saved.as_ref().and_then(field).unwrap_or(true)
    }

    pub fn ask(&self, question: Question) -> Ask {
        let survey = &self.survey;
        match question {
            Question::UseSaved => Ask::Confirm {
                message: format!(
                    "Use saved settings? ({})",
                    self.saved.as_ref().map(describe).unwrap_or_default()
                ),
                default: true,
            },
            Question::EnvAction => Ask::Select {
                message: format!(
                    "Env files found ({}). What should we do?",
                    survey.env_files.join(", ")
                ),
                items: vec![
                    Item::new("Symlink").hint("recommended"),
                    Item::new("Copy"),
                    Item::new("Nothing"),
                ],
                default: ENV_ACTIONS
                    .iter()
                    .position(|a| *a == self.default_env_action())
                    .unwrap_or(0),
            },
            Question::GeneratedFiles => Ask::MultiSelect {
                message: "Copy generated files?".to_string(),
                items: survey.generated_files.iter().map(Item::new).collect(),
                checked: vec![self.default_copy_generated(); survey.generated_files.len()],
            },
            Question::InstallDeps => {
                let count = survey.structure.projects.len();
                let message = if count > 1 {
                    format!(
                        "Install dependencies in all projects after creation? (Found {} projects)",
                        count
                    )
                } else {
                    "Install dependencies after creation?".to_string()
                };
                Ask::Confirm {
                    message,
                    default: self.saved_flag(|s| s.install_dependencies),
                }
            }
            Question::OpenEditor => Ask::Confirm {
                message: match &survey.capabilities.editor {
                    Some(editor) => format!("Open in editor ({})?", editor),
                    None => "Open in editor?".to_string(),
                },
                default: self.saved_flag(|s| s.open_in_editor),
            },
            Question::OpenTerminal => Ask::Confirm {
                message: match survey.capabilities.terminal {
                    Some(terminal) => format!("Open in terminal ({})?", terminal.name()),
                    None => "Open in terminal?".to_string(),
                },
                default: self.saved_flag(|s| s.open_in_terminal),
            },
            Question::Save => Ask::Confirm {
                message: if self.saved.is_some() {
                    "Update saved settings for this repository?".to_string()
                } else {
                    "Save these settings for this repository?".to_string()
                },
                default: true,
            },
        }
    }

    pub fn answer(&mut self, question: Question, answer: Answer) {
        match (question, answer) {
            (Question::UseSaved, Answer::Confirm(true)) => self.apply_saved(),
            (Question::UseSaved, Answer::Confirm(false)) => self.queue_individual(),
            (Question::EnvAction, Answer::Choice(idx)) => {
                self.answers.env_action = ENV_ACTIONS.get(idx).copied().unwrap_or_default();
                self.answers.env_files = self.survey.env_files.clone();
            }
            (Question::GeneratedFiles, Answer::Checked(indices)) => {
                self.answers.generated_files = indices
                    .iter()
                    .filter_map(|i| self.survey.generated_files.get(*i).cloned())
                    .collect();
                self.answers.copy_generated = !self.answers.generated_files.is_empty();
            }
            (Question::InstallDeps, Answer::Confirm(b)) => self.answers.install_deps = b,
            (Question::OpenEditor, Answer::Confirm(b)) => self.answers.open_editor = b,
            (Question::OpenTerminal, Answer::Confirm(b)) => self.answers.open_terminal = b,
            (Question::Save, Answer::Confirm(b)) => self.answers.save = b,
            (question, answer) => {
                warn!(?question, ?answer, "options:mismatched answer ignored");
            }
        }
    }

    /// Take every saved value as is; unset fields keep the prompt defaults.
    /// Only the closing save question is still asked.
    fn apply_saved(&mut self) {
        self.answers = OptionsAnswers {
            env_action: self.default_env_action(),
            env_files: self.survey.env_files.clone(),
            copy_generated: self.default_copy_generated(),
            generated_files: self.survey.generated_files.clone(),
            install_deps: self.survey.structure.has_projects()
                && self.saved_flag(|s| s.install_dependencies),
            open_editor: self.saved_flag(|s| s.open_in_editor),
            open_terminal: self.saved_flag(|s| s.open_in_terminal),
            save: false,
            using_saved_defaults: true,
        };
        self.queue.push_back(Question::Save);
    }

    /// Final answers, made self-consistent.
    pub fn finish(mut self) -> OptionsAnswers {
        if self.answers.env_action == EnvAction::Nothing {
            self.answers.env_files.clear();
        }
        if !self.answers.copy_generated {
            self.answers.generated_files.clear();
        }
        self.answers
    }
}

fn describe(saved: &DefaultValues) -> String {
    let flag = |label: &str, v: Option<bool>| {
        v.map(|b| format!("{}: {}", label, if b { "yes" } else { "no" }))
    };
    [
        saved.dot_env_action.map(|a| format!("env: {}", a.as_str())),
        flag("generated", saved.copy_generated_files),
        flag("install", saved.install_dependencies),
        flag("editor", saved.open_in_editor),
        flag("terminal", saved.open_in_terminal),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>()
    .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::files::{PackageManager, Project, RepoKind};
    use crate::host::Terminal;

    fn project(path: &str) -> Project {
        Project {
            relative_path: path.into(),
            package_manager: PackageManager::Pnpm,
        }
    }

    fn survey() -> Survey {
        Survey {
            env_files: vec![".env".into(), "api/.env.local".into()],
            generated_files: vec!["src/generated".into()],
            structure: RepoStructure {
                kind: RepoKind::SingleProject,
                projects: vec![project(".")],
            },
            capabilities: Capabilities {
                editor: Some("code".into()),
                terminal: Some(Terminal::Kitty),
            },
        }
    }

    fn drain(collector: &mut OptionsCollector) -> Vec<Question> {
        std::iter::from_fn(|| collector.next_question()).collect()
    }

    #[test]
    fn questions_follow_what_the_survey_found() {
        let mut c = OptionsCollector::new(survey(), None);
        assert_eq!(
            drain(&mut c),
            vec![
                Question::EnvAction,
                Question::GeneratedFiles,
                Question::InstallDeps,
                Question::OpenEditor,
                Question::OpenTerminal,
                Question::Save,
            ]
        );

        let empty = Survey {
            env_files: vec![],
            generated_files: vec![],
            structure: RepoStructure {
                kind: RepoKind::SingleProject,
                projects: vec![],
            },
            capabilities: Capabilities::default(),
        };
        let mut c = OptionsCollector::new(empty, None);
        assert_eq!(
            drain(&mut c),
            vec![Question::OpenEditor, Question::OpenTerminal, Question::Save]
        );
    }

    #[test]
    fn labels_mention_detected_tools_and_project_count() {
        let mut s = survey();
        s.structure.kind = RepoKind::MultiProject;
        s.structure.projects = vec![project("api"), project("web")];
        let c = OptionsCollector::new(s, None);

        let Ask::Confirm { message, .. } = c.ask(Question::OpenEditor) else {
            panic!("editor is a confirm");
        };
        assert_eq!(message, "Open in editor (code)?");
        let Ask::Confirm { message, .. } = c.ask(Question::InstallDeps) else {
            panic!("install is a confirm");
        };
        assert!(message.contains("(Found 2 projects)"));

        let none = OptionsCollector::new(
            Survey {
                capabilities: Capabilities::default(),
                ..survey()
            },
            None,
        );
        let Ask::Confirm { message, .. } = none.ask(Question::OpenTerminal) else {
            panic!("terminal is a confirm");
        };
        assert_eq!(message, "Open in terminal?");
    }

    #[test]
    fn nothing_clears_env_files_and_declined_generated_clears_list() {
        let mut c = OptionsCollector::new(survey(), None);
        c.answer(Question::EnvAction, Answer::Choice(2));
        c.answer(Question::GeneratedFiles, Answer::Checked(vec![]));
        c.answer(Question::InstallDeps, Answer::Confirm(true));
        let answers = c.finish();
        assert_eq!(answers.env_action, EnvAction::Nothing);
        assert!(answers.env_files.is_empty());
        assert!(!answers.copy_generated);
        assert!(answers.generated_files.is_empty());
        assert!(answers.install_deps);
    }

    #[test]
    fn saved_defaults_prefill_prompts() {
        let saved = DefaultValues {
            dot_env_action: Some(EnvAction::Copy),
            copy_generated_files: Some(false),
            ..Default::default()
        };
        let c = OptionsCollector::new(survey(), Some(saved));
        let Ask::Select { default, .. } = c.ask(Question::EnvAction) else {
            panic!("env is a select");
        };
        assert_eq!(default, 1);
        let Ask::MultiSelect { checked, .. } = c.ask(Question::GeneratedFiles) else {
            panic!("generated is a multi-select");
        };
        assert_eq!(checked, vec![false]);
    }

    #[test]
    fn accepting_saved_defaults_skips_to_the_save_question() {
        let saved = DefaultValues {
            dot_env_action: Some(EnvAction::Copy),
            open_in_terminal: Some(false),
            ..Default::default()
        };
        let mut c = OptionsCollector::new(survey(), Some(saved));
        assert_eq!(c.next_question(), Some(Question::UseSaved));
        c.answer(Question::UseSaved, Answer::Confirm(true));
        assert_eq!(c.next_question(), Some(Question::Save));
        let Ask::Confirm { message, .. } = c.ask(Question::Save) else {
            panic!("save is a confirm");
        };
        assert!(message.starts_with("Update saved settings"));
        c.answer(Question::Save, Answer::Confirm(false));
        assert_eq!(c.next_question(), None);

        let answers = c.finish();
        assert!(answers.using_saved_defaults);
        assert_eq!(answers.env_action, EnvAction::Copy);
        assert_eq!(answers.env_files, vec![".env", "api/.env.local"]);
        assert!(answers.copy_generated);
        assert!(answers.install_deps);
        assert!(answers.open_editor);
        assert!(!answers.open_terminal);
        assert!(!answers.save);
    }

    #[test]
    fn declining_saved_defaults_asks_everything() {
        let saved = DefaultValues {
            open_in_editor: Some(false),
            ..Default::default()
        };
        let mut c = OptionsCollector::new(survey(), Some(saved));
        c.next_question();
        c.answer(Question::UseSaved, Answer::Confirm(false));
        assert_eq!(drain(&mut c).len(), 6);
    }

    #[test]
    fn empty_saved_defaults_are_ignored() {
        let mut c = OptionsCollector::new(survey(), Some(DefaultValues::default()));
        assert_eq!(c.next_question(), Some(Question::EnvAction));
    }

    #[test]
    fn persisted_defaults_cover_all_five_fields() {
        let mut c = OptionsCollector::new(survey(), None);
        c.answer(Question::EnvAction, Answer::Choice(0));
        c.answer(Question::GeneratedFiles, Answer::Checked(vec![0]));
        c.answer(Question::InstallDeps, Answer::Confirm(false));
        c.answer(Question::OpenEditor, Answer::Confirm(true));
        c.answer(Question::OpenTerminal, Answer::Confirm(true));
        c.answer(Question::Save, Answer::Confirm(true));
        let answers = c.finish();
        assert!(answers.save);
        assert_eq!(
            answers.defaults(),
            DefaultValues {
                dot_env_action: Some(EnvAction::Symlink),
                copy_generated_files: Some(true),
                install_dependencies: Some(false),
                open_in_editor: Some(true),
                open_in_terminal: Some(true),
            }
        );
    }

    #[test]
    fn describe_lists_only_set_fields() {
        let saved = DefaultValues {
            dot_env_action: Some(EnvAction::Copy),
            open_in_editor: Some(false),
            ..Default::default()
        };
        assert_eq!(describe(&saved), "env: copy, editor: no");
    }
}
