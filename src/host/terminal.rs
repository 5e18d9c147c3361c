use anyhow::{Result, anyhow};
use std::path::Path;
use tracing::{debug, warn};

use crate::cmd::Cmd;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminal {
    Ghostty,
    ITerm,
    Warp,
    VsCode,
    Kitty,
    Alacritty,
    AppleTerminal,
    Hyper,
    GnomeTerminal,
    Konsole,
}

impl Terminal {
    const ALL: [Terminal; 10] = [
        Terminal::Ghostty,
        Terminal::ITerm,
        Terminal::Warp,
        Terminal::VsCode,
        Terminal::Kitty,
        Terminal::Alacritty,
        Terminal::AppleTerminal,
        Terminal::Hyper,
        Terminal::GnomeTerminal,
        Terminal::Konsole,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Terminal::Ghostty => "ghostty",
            Terminal::ITerm => "iterm",
            Terminal::Warp => "warp",
            Terminal::VsCode => "vscode",
            Terminal::Kitty => "kitty",
            Terminal::Alacritty => "alacritty",
            Terminal::AppleTerminal => "apple-terminal",
            Terminal::Hyper => "hyper",
            Terminal::GnomeTerminal => "gnome-terminal",
            Terminal::Konsole => "konsole",
        }
    }

    /// Parse a name as written in the config file's `terminal` key.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().to_lowercase();
        Self::ALL.into_iter().find(|t| t.name() == name)
    }
}

/// Identify the terminal we are running in from its environment markers.
pub fn detect_from_env(var: impl Fn(&str) -> Option<String>) -> Option<Terminal> {
    let set = |key: &str| var(key).is_some_and(|v| !v.is_empty());
    let term_program = var("TERM_PROGRAM").unwrap_or_default().to_lowercase();

    if set("GHOSTTY_RESOURCES_DIR") {
        Some(Terminal::Ghostty)
    } else if set("ITERM_SESSION_ID") {
        Some(Terminal::ITerm)
    } else if set("WARP_SESSION_ID") || term_program.contains("warp") {
        Some(Terminal::Warp)
    } else if set("VSCODE_INJECTION") || term_program == "vscode" {
        Some(Terminal::VsCode)
    } else if set("KITTY_PID") {
        Some(Terminal::Kitty)
    } else if set("ALACRITTY_SOCKET") {
        Some(Terminal::Alacritty)
    } else if term_program == "apple_terminal" {
        Some(Terminal::AppleTerminal)
    } else if term_program == "hyper" {
        Some(Terminal::Hyper)
    } else if set("GNOME_TERMINAL_SCREEN") {
        Some(Terminal::GnomeTerminal)
    } else if set("KONSOLE_VERSION") {
        Some(Terminal::Konsole)
    } else {
        None
    }
}

pub fn detect() -> Option<Terminal> {
    detect_from_env(|key| std::env::var(key).ok())
}

fn escape_applescript(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// A path inside a double-quoted `cd` that AppleScript then types into a shell.
fn escape_cd_path(path: &str) -> String {
    path.replace('"', "\\\"").replace('$', "\\$")
}

fn escape_shell_single(s: &str) -> String {
    s.replace('\'', "'\\''")
}

fn osascript(script: &str) -> Result<()> {
    Cmd::new("osascript").args(&["-e", script]).run()?;
    Ok(())
}

/// AppleScript that opens a new tab with Cmd+T and types a command into it.
fn keystroke_new_tab_script(app: &str, command: &str) -> String {
    format!(
        r#"tell application "{app}"
  activate
  tell application "System Events"
    keystroke "t" using command down
    delay 0.3
    keystroke "{command}"
    key code 36
  end tell
end tell"#,
        app = app,
        command = escape_applescript(command),
    )
}

fn launch(terminal: Terminal, path: &Path, title: &str) -> Result<()> {
    let path_str = path
        .to_str()
        .ok_or_else(|| anyhow!("Invalid path: {}", path.display()))?;
    match terminal {
        Terminal::ITerm => osascript(&format!(
            r#"tell application "iTerm"
  tell current window
    create tab with default profile
    tell current session
      set name to "{title}"
      write text "cd {path}"
    end tell
  end tell
end tell"#,
            title = escape_applescript(title),
            path = escape_cd_path(path_str),
        )),
        Terminal::AppleTerminal => osascript(&format!(
            r#"tell application "Terminal"
  activate
  do script "cd {path}"
  set custom title of front window to "{title}"
end tell"#,
            title = escape_applescript(title),
            path = escape_cd_path(path_str),
        )),
        Terminal::Warp => osascript(&keystroke_new_tab_script(
            "Warp",
            &format!("cd '{}'", escape_shell_single(path_str)),
        )),
        Terminal::Ghostty => osascript(&keystroke_new_tab_script(
            "Ghostty",
            &format!(
                "cd '{}' && printf '\\033]0;{}\\007'",
                escape_shell_single(path_str),
                escape_shell_single(title)
            ),
        )),
        Terminal::Kitty => {
            let title_arg = format!("--tab-title={}", title);
            let cwd_arg = format!("--cwd={}", path_str);
            Cmd::new("kitty")
                .args(&["@", "launch", "--type=tab", &title_arg, &cwd_arg])
                .run()?;
            Ok(())
        }
        Terminal::GnomeTerminal => {
            let title_arg = format!("--title={}", title);
            let dir_arg = format!("--working-directory={}", path_str);
            Cmd::new("gnome-terminal")
                .args(&["--tab", &title_arg, &dir_arg])
                .run()?;
            Ok(())
        }
        Terminal::Konsole => {
            let title_arg = format!("tabtitle={}", title);
            Cmd::new("konsole")
                .args(&["--new-tab", "-p", &title_arg, "--workdir", path_str])
                .run()?;
            Ok(())
        }
        Terminal::VsCode | Terminal::Alacritty | Terminal::Hyper => open_default(path_str),
    }
}

fn open_default(path: &str) -> Result<()> {
    if cfg!(target_os = "macos") {
        Cmd::new("open").args(&["-a", "Terminal", path]).run()?;
        return Ok(());
    }
    if cfg!(windows) {
        let cd = format!("cd /d {}", path);
        return Cmd::new("cmd")
            .args(&["/C", "start", "cmd", "/K", &cd])
            .spawn_detached();
    }
    let dir_arg = format!("--working-directory={}", path);
    Cmd::new("x-terminal-emulator")
        .arg(&dir_arg)
        .spawn_detached()
        .or_else(|e| {
            debug!(error = %e, "terminal:x-terminal-emulator unavailable");
            Cmd::new("xdg-open").arg(path).spawn_detached()
        })
}

/// Open a new tab (or window) at `path` titled `title`. A failing
/// terminal-specific launcher falls back to the platform default.
pub fn open(terminal: Option<Terminal>, path: &Path, title: &str) -> Result<()> {
    let Some(terminal) = terminal else {
        let path_str = path
            .to_str()
            .ok_or_else(|| anyhow!("Invalid path: {}", path.display()))?;
        return open_default(path_str);
    };
    debug!(terminal = terminal.name(), path = %path.display(), "terminal:open");
    launch(terminal, path, title).or_else(|e| {
        warn!(terminal = terminal.name(), error = %e, "terminal:launch failed, using default");
        let path_str = path
            .to_str()
            .ok_or_else(|| anyhow!("Invalid path: {}", path.display()))?;
        open_default(path_str)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn ghostty_marker_wins_over_term_program() {
        let detected = detect_from_env(env(&[
            ("GHOSTTY_RESOURCES_DIR", "/x"),
            ("TERM_PROGRAM", "vscode"),
        ]));
        assert_eq!(detected, Some(Terminal::Ghostty));
    }

    #[test]
    fn term_program_variants() {
        assert_eq!(
            detect_from_env(env(&[("TERM_PROGRAM", "Apple_Terminal")])),
            Some(Terminal::AppleTerminal)
        );
        assert_eq!(
            detect_from_env(env(&[("TERM_PROGRAM", "WarpTerminal")])),
            Some(Terminal::Warp)
        );
        assert_eq!(detect_from_env(env(&[("KITTY_PID", "42")])), Some(Terminal::Kitty));
        assert_eq!(detect_from_env(env(&[("KITTY_PID", "")])), None);
        assert_eq!(detect_from_env(env(&[])), None);
    }

    #[test]
    fn names_round_trip_through_config_spelling() {
        for t in Terminal::ALL {
            assert_eq!(Terminal::from_name(t.name()), Some(t));
        }
        assert_eq!(Terminal::from_name(" Kitty "), Some(Terminal::Kitty));
        assert_eq!(Terminal::from_name("xterm"), None);
    }

    #[test]
    fn applescript_strings_are_escaped() {
        assert_eq!(escape_applescript(r#"a "b" \c"#), r#"a \"b\" \\c"#);
        assert_eq!(escape_cd_path("/tmp/$HOME \"x\""), "/tmp/\\$HOME \\\"x\\\"");
        assert_eq!(escape_shell_single("it's"), "it'\\''s");
    }
}
