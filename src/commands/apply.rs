use anyhow::Result;
use colored::Colorize;
use stackgraph::{
    AutoConfirm, ConfirmCallback, DeploymentPlan, RolloutOptions, RolloutSummary, StackOutcome,
    rollout,
};

use crate::Context;
use crate::cli::ApplyArgs;
use crate::progress::{BarProgress, TerminalConfirm};
use crate::provisioner::SimulatedProvisioner;
use crate::state::StateStore;
use crate::ui;

use super::load;

pub fn run(ctx: &Context, args: &ApplyArgs) -> Result<()> {
    let plan = load(ctx)?.synthesize()?;
    let opts = RolloutOptions {
        dry_run: args.dry_run,
        jobs: args.jobs.max(1),
    };

    ui::header("Apply");
    ui::kv("Stacks", &plan.len().to_string());
    ui::kv("Resources", &plan.resource_count().to_string());
    ui::kv("Waves", &plan.waves().len().to_string());
    ui::kv("Jobs", &opts.jobs.to_string());
    if opts.dry_run {
        ui::warn("Dry run - nothing will be provisioned");
    }
    println!();

    let provisioner = SimulatedProvisioner::new(&args.region);
    let mut progress = if ctx.quiet {
        BarProgress::hidden()
    } else {
        BarProgress::new(plan.len())
    };
    let mut confirm: Box<dyn ConfirmCallback> = if args.yes || opts.dry_run {
        Box::new(AutoConfirm)
    } else {
        Box::new(TerminalConfirm)
    };

    let summary = rollout(&plan, &opts, &provisioner, &mut progress, &mut confirm)?;
    progress.finish();

    if !opts.dry_run && summary.total() > summary.skipped {
        let store = StateStore::open_default()?;
        store.save_plan(&plan)?;
        store.save_rollout(&plan, &summary)?;
    }

    print_summary(&plan, &summary);
    if summary.is_success() {
        Ok(())
    } else {
        anyhow::bail!("{} stack(s) failed to provision", summary.failed)
    }
}

/// Print final summary
fn print_summary(plan: &DeploymentPlan, summary: &RolloutSummary) {
    println!();
    if summary.provisioned == plan.len() {
        println!("  {} Deployment applied successfully!", "✓".green().bold());
    } else if summary.is_success() {
        println!("  {} Nothing was provisioned", "•".dimmed());
    } else {
        println!("  {} Deployment applied with errors", "⚠".yellow().bold());
    }

    if summary.provisioned > 0 {
        println!("    • {} stacks provisioned", summary.provisioned);
    }
    if summary.skipped > 0 {
        println!("    • {} stacks skipped", summary.skipped);
    }
    if summary.failed > 0 {
        println!("    • {} {} failed", summary.failed, "stacks".red());
    }

    for record in &summary.records {
        match &record.outcome {
            StackOutcome::Provisioned { outputs } if !outputs.is_empty() => {
                ui::section(&record.stack_id);
                for (name, value) in outputs {
                    ui::kv(name, &value.to_string());
                }
            }
            StackOutcome::Failed { error } => {
                ui::error(&format!("{}: {error}", record.stack_id));
            }
            _ => {}
        }
    }
}
