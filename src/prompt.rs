//! Prompt primitives. Every prompt either answers or reports that the user
//! pressed Escape; cancellation is a value, never an error.

use anyhow::Result;
use console::{Key, Term, style};
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, MultiSelect, Select};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply<T> {
    Answered(T),
    Cancelled,
}

impl<T> From<Option<T>> for Reply<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Reply::Answered(v),
            None => Reply::Cancelled,
        }
    }
}

/// One entry of a select or multi-select.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub label: String,
    pub hint: Option<String>,
}

impl Item {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            hint: None,
        }
    }

    pub fn hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    fn render(&self) -> String {
        match &self.hint {
            Some(hint) => format!("{} {}", self.label, style(format!("({})", hint)).dim()),
            None => self.label.clone(),
        }
    }
}

pub type Validator<'a> = &'a dyn Fn(&str) -> std::result::Result<(), String>;

pub trait Prompter {
    /// Free text. An empty entry yields `default` (or the empty string).
    fn text(&mut self, message: &str, default: Option<&str>, validate: Validator<'_>)
    -> Result<Reply<String>>;

    fn confirm(&mut self, message: &str, default: bool) -> Result<Reply<bool>>;

    /// Index of the chosen item.
    fn select(&mut self, message: &str, items: &[Item], default: usize) -> Result<Reply<usize>>;

    /// Indices of the checked items.
    fn multi_select(
        &mut self,
        message: &str,
        items: &[Item],
        checked: &[bool],
    ) -> Result<Reply<Vec<usize>>>;

    /// Informational line shown between prompts.
    fn note(&mut self, message: &str);
}

/// Interactive prompter on stderr.
pub struct TerminalPrompter {
    theme: ColorfulTheme,
    term: Term,
}

impl TerminalPrompter {
    pub fn new() -> Self {
        Self {
            theme: ColorfulTheme::default(),
            term: Term::stderr(),
        }
    }

    fn render_text_line(message: &str, default: Option<&str>, input: &str) -> String {
        let default_hint = default
            .filter(|d| !d.is_empty())
            .map(|d| format!(" {}", style(format!("({})", d)).dim()))
            .unwrap_or_default();
        format!(
            "{} {}{} {} {}",
            style("?").yellow(),
            style(message).bold(),
            default_hint,
            style("›").dim(),
            input
        )
    }

    /// Read a line key by key so Escape can cancel; dialoguer's `Input`
    /// has no cancel outcome.
    ///
    /// Editing is append-only with Backspace: arrow keys, Home and End are
    /// ignored. The default is shown as a dimmed hint, not pre-filled, and
    /// the caller substitutes it for an empty line.
    fn read_line_cancellable(&self, message: &str, default: Option<&str>) -> Result<Option<String>> {
        let mut input = String::new();
        self.term
            .write_str(&Self::render_text_line(message, default, &input))?;
        loop {
            match self.term.read_key()? {
                Key::Escape | Key::Char('\u{3}') => {
                    self.term.clear_line()?;
                    self.term
                        .write_line(&format!("{} {}", style("✘").red(), message))?;
                    return Ok(None);
                }
                Key::Enter => {
                    self.term.write_line("")?;
                    return Ok(Some(input));
                }
                Key::Backspace => {
                    if input.pop().is_some() {
                        self.term.clear_line()?;
                        self.term
                            .write_str(&Self::render_text_line(message, default, &input))?;
                    }
                }
                Key::Char(c) if !c.is_control() => {
                    input.push(c);
                    self.term.write_str(c.encode_utf8(&mut [0; 4]))?;
                }
                _ => {}
            }
        }
    }
}

impl Default for TerminalPrompter {
    fn default() -> Self {
        Self::new()
    }
}

impl Prompter for TerminalPrompter {
    fn text(
        &mut self,
        message: &str,
        default: Option<&str>,
        validate: Validator<'_>,
    ) -> Result<Reply<String>> {
        loop {
            let Some(raw) = self.read_line_cancellable(message, default)? else {
                return Ok(Reply::Cancelled);
            };
            let value = match raw.trim() {
                "" => default.unwrap_or_default().to_string(),
                trimmed => trimmed.to_string(),
            };
            match validate(&value) {
                Ok(()) => return Ok(Reply::Answered(value)),
                Err(msg) => self
                    .term
                    .write_line(&format!("  {}", style(msg).red()))?,
            }
        }
    }

    fn confirm(&mut self, message: &str, default: bool) -> Result<Reply<bool>> {
        Ok(Confirm::with_theme(&self.theme)
            .with_prompt(message)
            .default(default)
            .interact_opt()?
            .into())
    }

    fn select(&mut self, message: &str, items: &[Item], default: usize) -> Result<Reply<usize>> {
        let labels: Vec<String> = items.iter().map(Item::render).collect();
        Ok(Select::with_theme(&self.theme)
            .with_prompt(message)
            .items(&labels)
            .default(default.min(labels.len().saturating_sub(1)))
            .interact_opt()?
            .into())
    }

    fn multi_select(
        &mut self,
        message: &str,
        items: &[Item],
        checked: &[bool],
    ) -> Result<Reply<Vec<usize>>> {
        let labels: Vec<String> = items.iter().map(Item::render).collect();
        Ok(MultiSelect::with_theme(&self.theme)
            .with_prompt(message)
            .items(&labels)
            .defaults(checked)
            .interact_opt()?
            .into())
    }

    fn note(&mut self, message: &str) {
        let _ = self.term.write_line(&format!("{} {}", style("│").dim(), message));
    }
}

/// Prompter fed from a script, for driving workflows in tests.
#[cfg(test)]
pub mod scripted {
    use super::*;
    use std::collections::VecDeque;

    #[derive(Debug, Clone)]
    pub enum Answer {
        Text(&'static str),
        Confirm(bool),
        /// Select the item whose label starts with this text.
        Choose(&'static str),
        /// Multi-select: check exactly the items whose labels are listed.
        Check(Vec<&'static str>),
        /// Accept whatever the prompt offers by default.
        Default,
        Cancel,
    }

    #[derive(Default)]
    pub struct ScriptedPrompter {
        pub script: VecDeque<Answer>,
        /// Every prompt message, in order.
        pub asked: Vec<String>,
        pub notes: Vec<String>,
    }

    impl ScriptedPrompter {
        pub fn new(script: impl IntoIterator<Item = Answer>) -> Self {
            Self {
                script: script.into_iter().collect(),
                ..Default::default()
            }
        }

        fn next(&mut self, message: &str) -> Answer {
            self.asked.push(message.to_string());
            self.script
                .pop_front()
                .unwrap_or_else(|| panic!("unscripted prompt: {message}"))
        }

        pub fn was_asked(&self, fragment: &str) -> bool {
            self.asked.iter().any(|m| m.contains(fragment))
        }
    }

    impl Prompter for ScriptedPrompter {
        fn text(
            &mut self,
            message: &str,
            default: Option<&str>,
            validate: Validator<'_>,
        ) -> Result<Reply<String>> {
            let value = match self.next(message) {
                Answer::Text(t) if t.is_empty() => default.unwrap_or_default().to_string(),
                Answer::Text(t) => t.to_string(),
                Answer::Default => default.unwrap_or_default().to_string(),
                Answer::Cancel => return Ok(Reply::Cancelled),
                other => panic!("expected text answer for {message}, got {other:?}"),
            };
            validate(&value).map_err(|e| anyhow::anyhow!("scripted text rejected: {e}"))?;
            Ok(Reply::Answered(value))
        }

        fn confirm(&mut self, message: &str, default: bool) -> Result<Reply<bool>> {
            Ok(match self.next(message) {
                Answer::Confirm(b) => Reply::Answered(b),
                Answer::Default => Reply::Answered(default),
                Answer::Cancel => Reply::Cancelled,
                other => panic!("expected confirm answer for {message}, got {other:?}"),
            })
        }

        fn select(&mut self, message: &str, items: &[Item], default: usize) -> Result<Reply<usize>> {
            Ok(match self.next(message) {
                Answer::Choose(prefix) => Reply::Answered(
                    items
                        .iter()
                        .position(|i| i.label.starts_with(prefix))
                        .unwrap_or_else(|| panic!("no item {prefix:?} in {items:?}")),
                ),
                Answer::Default => Reply::Answered(default),
                Answer::Cancel => Reply::Cancelled,
                other => panic!("expected select answer for {message}, got {other:?}"),
            })
        }

        fn multi_select(
            &mut self,
            message: &str,
            items: &[Item],
            checked: &[bool],
        ) -> Result<Reply<Vec<usize>>> {
            Ok(match self.next(message) {
                Answer::Check(labels) => Reply::Answered(
                    items
                        .iter()
                        .enumerate()
                        .filter(|(_, i)| labels.contains(&i.label.as_str()))
                        .map(|(idx, _)| idx)
                        .collect(),
                ),
                Answer::Default => Reply::Answered(
                    checked
                        .iter()
                        .enumerate()
                        .filter(|(_, c)| **c)
                        .map(|(idx, _)| idx)
                        .collect(),
                ),
                Answer::Cancel => Reply::Cancelled,
                other => panic!("expected multi-select answer for {message}, got {other:?}"),
            })
        }

        fn note(&mut self, message: &str) {
            self.notes.push(message.to_string());
        }
    }
}
