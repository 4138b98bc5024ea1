//! Diff computation between deployment plans
//!
//! Redeploying the same composition with the same settings must produce no
//! changes. Comparing the previous plan with the next one shows exactly
//! which stacks a redeployment would touch.

use crate::planner::{DeploymentPlan, PlanStep};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// How a stack changed between two plans
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum StackChange {
    Added,
    Removed,
    Unchanged,
    Changed {
        /// Names of inputs that were added, removed or given new values
        inputs: Vec<String>,
        resources: bool,
        outputs: bool,
    },
}

/// A diff for one stack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackDiff {
    pub stack_id: String,
    #[serde(flatten)]
    pub change: StackChange,
}

impl StackDiff {
    /// Check if this diff represents a change of any kind
    pub fn is_change(&self) -> bool {
        !matches!(self.change, StackChange::Unchanged)
    }
}

/// Compare two plans stack by stack
///
/// Returns one entry per stack in either plan: stacks of `next` in plan
/// order, followed by stacks only present in `previous`.
pub fn diff_plans(previous: &DeploymentPlan, next: &DeploymentPlan) -> Vec<StackDiff> {
    let mut diffs: Vec<StackDiff> = next
        .steps()
        .iter()
        .map(|step| StackDiff {
            stack_id: step.stack_id.clone(),
            change: match previous.step(&step.stack_id) {
                None => StackChange::Added,
                Some(old) => compare_steps(old, step),
            },
        })
        .collect();

    diffs.extend(
        previous
            .steps()
            .iter()
            .filter(|step| next.step(&step.stack_id).is_none())
            .map(|step| StackDiff {
                stack_id: step.stack_id.clone(),
                change: StackChange::Removed,
            }),
    );
    diffs
}

fn compare_steps(old: &PlanStep, new: &PlanStep) -> StackChange {
    let names: BTreeSet<&String> = old.inputs.keys().chain(new.inputs.keys()).collect();
    let inputs: Vec<String> = names
        .into_iter()
        .filter(|name| old.inputs.get(*name) != new.inputs.get(*name))
        .cloned()
        .collect();
    let resources = old.resources != new.resources;
    let outputs = old.outputs != new.outputs;

    if inputs.is_empty() && !resources && !outputs {
        StackChange::Unchanged
    } else {
        StackChange::Changed {
            inputs,
            resources,
            outputs,
        }
    }
}

/// Diff summary statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffSummary {
    pub added: usize,
    pub removed: usize,
    pub changed: usize,
    pub unchanged: usize,
}

impl DiffSummary {
    /// Create a summary from a list of diffs
    pub fn from_diffs(diffs: &[StackDiff]) -> Self {
        let mut summary = Self::default();
        for diff in diffs {
            match diff.change {
                StackChange::Added => summary.added += 1,
                StackChange::Removed => summary.removed += 1,
                StackChange::Changed { .. } => summary.changed += 1,
                StackChange::Unchanged => summary.unchanged += 1,
            }
        }
        summary
    }

    /// Total number of changes
    pub fn total(&self) -> usize {
        self.added + self.removed + self.changed
    }

    /// Check if there are any changes
    pub fn has_changes(&self) -> bool {
        self.total() > 0
    }
}
