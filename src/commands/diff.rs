use anyhow::{Context as _, Result};
use stackgraph::{DeploymentPlan, DiffSummary, StackChange, StackDiff, diff_plans};
use std::fs;

use crate::Context;
use crate::cli::DiffArgs;
use crate::state::{SavedRollout, StateStore};
use crate::ui;

use super::load;

pub fn run(ctx: &Context, args: &DiffArgs) -> Result<()> {
    let next = load(ctx)?.synthesize()?;

    let previous = match &args.against {
        Some(path) => {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read plan: {}", path.display()))?;
            serde_json::from_str::<DeploymentPlan>(&content)
                .with_context(|| format!("Failed to parse plan: {}", path.display()))?
        }
        None => {
            let store = StateStore::open_default()?;
            match store.load_plan()? {
                Some(saved) => {
                    log::info!("Comparing against plan saved at {}", saved.saved_at);
                    if let Some(rollout) = store.load_rollout()? {
                        ui::dim(&last_rollout_line(&rollout, &saved.fingerprint));
                    }
                    saved.plan
                }
                None => {
                    ui::warn("No saved plan yet; run `stackplan plan --save` first");
                    DeploymentPlan::default()
                }
            }
        }
    };

    let diffs = diff_plans(&previous, &next);
    let summary = DiffSummary::from_diffs(&diffs);

    ui::header("Plan diff");
    for diff in diffs.iter().filter(|d| args.all || d.is_change()) {
        print_diff(diff);
    }

    println!();
    if summary.has_changes() {
        ui::info(&format!(
            "{} to add, {} to change, {} to remove",
            summary.added, summary.changed, summary.removed
        ));
    } else {
        ui::success("No changes. The plan matches the baseline.");
    }
    Ok(())
}

/// One line about the last apply, flagged when it ran a different plan
fn last_rollout_line(rollout: &SavedRollout, baseline: &str) -> String {
    let summary = &rollout.summary;
    let mut line = format!(
        "Last apply {}: {} provisioned, {} skipped, {} failed",
        rollout.finished_at.format("%Y-%m-%d %H:%M"),
        summary.provisioned,
        summary.skipped,
        summary.failed
    );
    if rollout.plan_fingerprint != baseline {
        line.push_str(" (different plan)");
    }
    line
}

fn print_diff(diff: &StackDiff) {
    println!("  {} {}", ui::change_label(&diff.change), diff.stack_id);
    if let StackChange::Changed {
        inputs,
        resources,
        outputs,
    } = &diff.change
    {
        if !inputs.is_empty() {
            ui::dim(&format!("inputs: {}", inputs.join(", ")));
        }
        if *resources {
            ui::dim("resources changed");
        }
        if *outputs {
            ui::dim("outputs changed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use stackgraph::{RolloutSummary, StackOutcome};

    fn rollout() -> SavedRollout {
        let mut summary = RolloutSummary::default();
        summary.add("VpcStack", StackOutcome::Provisioned { outputs: Default::default() });
        summary.add(
            "AutoScalingStack",
            StackOutcome::Failed {
                error: "boom".into(),
            },
        );
        SavedRollout {
            finished_at: Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap(),
            plan_fingerprint: "abc".into(),
            summary,
        }
    }

    #[test]
    fn test_last_rollout_line() {
        assert_eq!(
            last_rollout_line(&rollout(), "abc"),
            "Last apply 2026-03-01 09:30: 1 provisioned, 0 skipped, 1 failed"
        );
    }

    #[test]
    fn test_last_rollout_of_other_plan_is_flagged() {
        assert!(last_rollout_line(&rollout(), "def").ends_with(" (different plan)"));
    }
}
