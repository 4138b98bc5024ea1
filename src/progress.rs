//! Terminal progress and confirmation for rollouts

use anyhow::Result;
use colored::Colorize;
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use stackgraph::{ConfirmCallback, ProgressCallback, StackOutcome};

use crate::ui;

/// Progress bar over all stacks of a plan
pub struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    pub fn new(total: usize) -> Self {
        let bar = ProgressBar::new(total as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        Self { bar }
    }

    /// Hidden bar for `--quiet` and non-interactive runs
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressCallback for BarProgress {
    fn on_wave_start(&mut self, wave: usize, count: usize) {
        self.bar
            .set_message(format!("wave {} ({count} stacks)", wave + 1));
    }

    fn on_stack_start(&mut self, stack_id: &str) {
        self.bar.set_message(format!("provisioning {stack_id}"));
    }

    fn on_stack_complete(&mut self, stack_id: &str, outcome: &StackOutcome) {
        let detail = match outcome {
            StackOutcome::Provisioned { outputs } => format!("{} outputs", outputs.len()),
            StackOutcome::Failed { error } => error.clone(),
            StackOutcome::Skipped { reason } => reason.clone(),
        };
        self.bar.println(format!(
            "  {} {} {}",
            ui::outcome_label(outcome),
            stack_id.bold(),
            detail.dimmed()
        ));
        self.bar.inc(1);
    }

    fn on_wave_complete(&mut self) {}
}

/// Ask on the terminal before provisioning
pub struct TerminalConfirm;

impl ConfirmCallback for TerminalConfirm {
    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        let confirmed = Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()?;
        Ok(confirmed)
    }
}
