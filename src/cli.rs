use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use console::{Term, style};
use std::process::ExitCode;
use tracing::{info, warn};

use crate::prompt::TerminalPrompter;
use crate::services::Services;
use crate::spinner::SpinnerObserver;
use crate::version::{UpdateAvailable, VersionCheck};
use crate::workflow::{self, Step};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(name = "worktree")]
#[command(about = "Interactive git worktree manager")]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    /// Branch to create or manage (prompted for when omitted). `remote/branch`
    /// tracks that remote's branch.
    branch: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate shell completions
    Completions {
        /// The shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// --- Public Entry Point ---
pub fn run() -> Result<ExitCode> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Completions { shell }) => {
            generate_completions(shell);
            Ok(ExitCode::SUCCESS)
        }
        None => run_session(cli.branch),
    }
}

fn run_session(branch: Option<String>) -> Result<ExitCode> {
    // Escape cancels prompts; Ctrl-C still kills the process, so leave the
    // terminal usable when it does.
    if let Err(e) = ctrlc::set_handler(|| {
        let _ = Term::stderr().show_cursor();
        std::process::exit(130);
    }) {
        warn!(error = %e, "cli:ctrl-c handler not installed");
    }

    let version_check = VersionCheck::spawn();
    let services = Services::system();
    let mut prompter = TerminalPrompter::new();
    let mut observer = SpinnerObserver::default();

    let machine = workflow::drive(&services, &mut prompter, &mut observer, branch)?;
    let step = machine.step();
    info!(step = step.name(), "cli:session finished");

    print_summary(step);
    if let Some(update) = version_check.poll() {
        print_update_notice(&update);
    }

    Ok(match step {
        Step::NotARepo | Step::Failed(_) => ExitCode::FAILURE,
        _ => ExitCode::SUCCESS,
    })
}

fn print_summary(step: &Step) {
    let Some(line) = workflow::summary_line(step) else {
        return;
    };
    let out = match step {
        Step::Done {
            warning: Some(warning),
            ..
        } => format!(
            "{} {}\n  {}",
            style("⚠").yellow(),
            line,
            style(format!("Completed with warnings: {}", warning)).dim()
        ),
        Step::Done { .. } => format!("{} {}", style("✔").green(), style(line).bold()),
        Step::Cancelled => format!("{} {}", style("✘").dim(), line),
        _ => format!("{} {}", style("✘").red(), style(line).red()),
    };
    eprintln!("{}", out);
}

fn print_update_notice(update: &UpdateAvailable) {
    eprintln!(
        "\n{} {} → {}  {}",
        style("Update available:").yellow(),
        style(&update.current).dim(),
        style(&update.latest).green(),
        style("cargo install worktree").dim()
    );
}

fn generate_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut std::io::stdout());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn branch_is_optional() {
        let cli = Cli::try_parse_from(["worktree"]).unwrap();
        assert!(cli.branch.is_none());
        assert!(cli.command.is_none());

        let cli = Cli::try_parse_from(["worktree", "feature/login"]).unwrap();
        assert_eq!(cli.branch.as_deref(), Some("feature/login"));
    }

    #[test]
    fn completions_subcommand_parses() {
        let cli = Cli::try_parse_from(["worktree", "completions", "zsh"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Completions { shell: Shell::Zsh })
        ));
    }
}
