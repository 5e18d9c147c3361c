use anyhow::{Result, anyhow};
use std::path::Path;
use tracing::debug;

use crate::cmd::Cmd;

pub const EDITOR_ENV: &str = "WORKTREE_EDITOR";

const KNOWN_EDITORS: &[&str] = &["cursor", "code", "zed"];

/// `$WORKTREE_EDITOR` when set, otherwise the first known editor on PATH.
pub fn detect() -> Option<String> {
    detect_with(
        std::env::var(EDITOR_ENV).ok(),
        |bin| which::which(bin).is_ok(),
    )
}

fn detect_with(override_editor: Option<String>, on_path: impl Fn(&str) -> bool) -> Option<String> {
    if let Some(editor) = override_editor
        && !editor.trim().is_empty()
    {
        return Some(editor.trim().to_string());
    }
    KNOWN_EDITORS
        .iter()
        .find(|bin| on_path(bin))
        .map(|bin| bin.to_string())
}

/// Launch `editor` on `path`. The editor string may carry extra arguments,
/// e.g. `code --new-window`.
pub fn open(editor: &str, path: &Path) -> Result<()> {
    let mut parts = editor.split_whitespace();
    let program = parts
        .next()
        .ok_or_else(|| anyhow!("Empty editor command"))?;
    let extra: Vec<&str> = parts.collect();
    let path_str = path
        .to_str()
        .ok_or_else(|| anyhow!("Invalid path: {}", path.display()))?;
    debug!(editor, path = path_str, "editor:open");
    Cmd::new(program).args(&extra).arg(path_str).run()?;
    Ok(())
}

pub fn open_file_explorer(path: &Path) -> Result<()> {
    let path_str = path
        .to_str()
        .ok_or_else(|| anyhow!("Invalid path: {}", path.display()))?;
    let program = if cfg!(target_os = "macos") {
        "open"
    } else if cfg!(windows) {
        "explorer"
    } else {
        "xdg-open"
    };
    Cmd::new(program).arg(path_str).spawn_detached()
}
