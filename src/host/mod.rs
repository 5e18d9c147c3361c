//! Editor, terminal and package-manager integration with the user's machine.

pub mod editor;
pub mod terminal;

use std::path::Path;
use tracing::{info, warn};

use crate::cmd::Cmd;
use crate::files::RepoStructure;

pub use terminal::Terminal;

/// What the machine offers for the post-creation steps. Detected once and
/// treated as opaque by the workflow, which only uses it for labels and launches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub editor: Option<String>,
    pub terminal: Option<Terminal>,
}

/// Editor and terminal lookups run side by side. A `terminal` name from the
/// config file replaces detection when it is recognised.
pub fn detect_capabilities(configured_terminal: Option<&str>) -> Capabilities {
    let (editor, terminal) = std::thread::scope(|s| {
        let editor = s.spawn(editor::detect);
        let terminal = s.spawn(|| {
            configured_terminal
                .and_then(|name| {
                    let parsed = Terminal::from_name(name);
                    if parsed.is_none() {
                        warn!(terminal = name, "host:unknown configured terminal");
                    }
                    parsed
                })
                .or_else(terminal::detect)
        });
        (
            editor.join().unwrap_or_default(),
            terminal.join().unwrap_or_default(),
        )
    });
    info!(editor = ?editor, terminal = ?terminal.map(Terminal::name), "host:capabilities");
    Capabilities { editor, terminal }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InstallOutcome {
    /// `(relative project path, package manager)` for each successful install.
    pub installed: Vec<(String, String)>,
    /// `(relative project path, error)` for each failure.
    pub failed: Vec<(String, String)>,
}

impl InstallOutcome {
    pub fn succeeded(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn summary(&self) -> String {
        if !self.failed.is_empty() {
            let paths: Vec<&str> = self.failed.iter().map(|(p, _)| p.as_str()).collect();
            return format!("Failed to install dependencies in: {}", paths.join(", "));
        }
        let mut managers: Vec<&str> = self.installed.iter().map(|(_, pm)| pm.as_str()).collect();
        managers.dedup();
        match self.installed.len() {
            0 => "No projects to install".to_string(),
            1 => format!("Dependencies installed with {}", managers.join(", ")),
            n => format!("Dependencies installed in {} projects", n),
        }
    }
}

/// Run `<package manager> install` once per project inside the new worktree.
/// One project failing does not stop the others.
pub fn install_dependencies(worktree: &Path, structure: &RepoStructure) -> InstallOutcome {
    let mut outcome = InstallOutcome::default();
    for project in &structure.projects {
        let dir = worktree.join(&project.relative_path);
        let pm = project.package_manager.program();
        info!(project = %project.relative_path, pm, "install:start");
        match Cmd::new(pm).arg("install").workdir(&dir).run() {
            Ok(_) => outcome
                .installed
                .push((project.relative_path.clone(), pm.to_string())),
            Err(e) => {
                warn!(project = %project.relative_path, pm, error = %e, "install:failed");
                outcome
                    .failed
                    .push((project.relative_path.clone(), format!("{:#}", e)));
            }
        }
    }
    outcome
}
