use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use crate::workflow::{OperationState, OperationStatus, RunObserver};

/// Create a spinner with consistent styling.
fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.enable_steady_tick(Duration::from_millis(120));
    let ticks = ProgressStyle::default_spinner()
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
    pb.set_style(
        ticks
            .clone()
            .template("{spinner:.blue} {msg}")
            .unwrap_or(ticks),
    );
    pb.set_message(msg.to_string());
    pb
}

fn finished_line(state: &OperationState) -> String {
    let mark = match state.status {
        OperationStatus::Success => style("✔").green(),
        OperationStatus::Warning => style("⚠").yellow(),
        OperationStatus::Error => style("✘").red(),
        OperationStatus::Pending | OperationStatus::Running => style("·").dim(),
    };
    match &state.message {
        Some(message) => format!("{} {} {}", mark, state.label, style(message).dim()),
        None => format!("{} {}", mark, state.label),
    }
}

/// One spinner line per operation, left behind with its final status.
#[derive(Default)]
pub struct SpinnerObserver {
    current: Option<ProgressBar>,
}

impl RunObserver for SpinnerObserver {
    fn on_start(&mut self, state: &OperationState) {
        if let Some(pb) = self.current.take() {
            pb.finish_and_clear();
        }
        self.current = Some(create_spinner(&state.label));
    }

    fn on_finish(&mut self, state: &OperationState) {
        let line = finished_line(state);
        match self.current.take() {
            Some(pb) => pb.finish_with_message(line),
            None => eprintln!("{}", line),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::operations::OperationId;

    fn state(status: OperationStatus, message: Option<&str>) -> OperationState {
        OperationState {
            id: OperationId::Fetch,
            label: "Fetching from origin".into(),
            status,
            message: message.map(str::to_string),
        }
    }

    #[test]
    fn finished_line_carries_label_and_message() {
        console::set_colors_enabled(false);
        assert_eq!(
            finished_line(&state(OperationStatus::Success, Some("Done"))),
            "✔ Fetching from origin Done"
        );
        assert_eq!(
            finished_line(&state(OperationStatus::Warning, None)),
            "⚠ Fetching from origin"
        );
        assert!(finished_line(&state(OperationStatus::Error, Some("boom"))).starts_with("✘ "));
    }
}
