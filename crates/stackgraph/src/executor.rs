//! Rollout engine - walks a deployment plan wave by wave
//!
//! Each stack is handed to the [`Provisioner`] once every producer it
//! depends on has been provisioned. Deferred inputs are replaced by the
//! concrete outputs those producers returned. Stacks within a wave do not
//! depend on each other and may run in parallel.

use crate::context::{ConfirmCallback, ProgressCallback, ProvisionRequest, Provisioner};
use crate::planner::{DeploymentPlan, PlanStep};
use crate::types::{RolloutOptions, RolloutSummary, StackOutcome, Value};
use anyhow::Result;
use rayon::prelude::*;
use std::collections::BTreeMap;

/// Roll out a plan with the given options and callbacks
///
/// # Type Parameters
/// * `P` - Provisioner handling the actual infrastructure
/// * `G` - Progress callback type
/// * `C` - Confirm callback type
///
/// # Returns
/// Summary with one outcome per stack, in plan order within each wave
pub fn rollout<P, G, C>(
    plan: &DeploymentPlan,
    opts: &RolloutOptions,
    provisioner: &P,
    progress: &mut G,
    confirm: &mut C,
) -> Result<RolloutSummary>
where
    P: Provisioner,
    G: ProgressCallback,
    C: ConfirmCallback,
{
    let mut summary = RolloutSummary::default();
    if plan.is_empty() {
        return Ok(summary);
    }

    if opts.dry_run {
        skip_all(plan, "Dry run", &mut summary);
        return Ok(summary);
    }

    let prompt = format!(
        "Provision {} stacks ({} resources)?",
        plan.len(),
        plan.resource_count()
    );
    if !confirm.confirm(&prompt)? {
        skip_all(plan, "Declined", &mut summary);
        return Ok(summary);
    }

    for (index, wave) in plan.waves().into_iter().enumerate() {
        progress.on_wave_start(index, wave.len());
        log::info!("wave {index}: {} stacks", wave.len());

        let mut ready = Vec::with_capacity(wave.len());
        let mut held = BTreeMap::new();
        for step in &wave {
            match prepare_inputs(step, &summary) {
                Ok(inputs) => ready.push((*step, inputs)),
                Err(outcome) => {
                    progress.on_stack_complete(&step.stack_id, &outcome);
                    held.insert(step.stack_id.as_str(), outcome);
                }
            }
        }

        let outcomes = provision_wave(&ready, opts.jobs, provisioner, progress)?;
        held.extend(
            outcomes
                .into_iter()
                .map(|(step, outcome)| (step.stack_id.as_str(), outcome)),
        );

        // Record in step order, whether skipped or provisioned
        for step in &wave {
            let Some(outcome) = held.remove(step.stack_id.as_str()) else {
                continue;
            };
            match &outcome {
                StackOutcome::Provisioned { .. } => log::info!("{} provisioned", step.stack_id),
                StackOutcome::Failed { error } => log::warn!("{} failed: {error}", step.stack_id),
                StackOutcome::Skipped { reason } => {
                    log::warn!("{} skipped: {reason}", step.stack_id);
                }
            }
            summary.add(&step.stack_id, outcome);
        }
        progress.on_wave_complete();
    }

    Ok(summary)
}

fn skip_all(plan: &DeploymentPlan, reason: &str, summary: &mut RolloutSummary) {
    for step in plan.steps() {
        summary.add(
            &step.stack_id,
            StackOutcome::Skipped {
                reason: reason.to_string(),
            },
        );
    }
}

/// Replace deferred inputs with provisioned outputs
///
/// Returns the outcome to record instead when a producer did not make it.
fn prepare_inputs(
    step: &PlanStep,
    summary: &RolloutSummary,
) -> std::result::Result<BTreeMap<String, Value>, StackOutcome> {
    if let Some(producer) = step
        .depends_on
        .iter()
        .find(|p| !summary.outcome(p).is_some_and(StackOutcome::is_provisioned))
    {
        return Err(StackOutcome::Skipped {
            reason: format!("producer '{producer}' was not provisioned"),
        });
    }

    let mut inputs = BTreeMap::new();
    for (name, value) in &step.inputs {
        let resolved = match value {
            Value::Deferred(token) => summary
                .outputs
                .get(&token.stack)
                .and_then(|outputs| outputs.get(&token.output))
                .cloned()
                .ok_or_else(|| StackOutcome::Failed {
                    error: format!("no provisioned value for {token} (input '{name}')"),
                })?,
            concrete => concrete.clone(),
        };
        inputs.insert(name.clone(), resolved);
    }
    Ok(inputs)
}

/// Provision the ready stacks of one wave
fn provision_wave<'a, P, G>(
    ready: &[(&'a PlanStep, BTreeMap<String, Value>)],
    jobs: usize,
    provisioner: &P,
    progress: &mut G,
) -> Result<Vec<(&'a PlanStep, StackOutcome)>>
where
    P: Provisioner,
    G: ProgressCallback,
{
    if jobs <= 1 || ready.len() <= 1 {
        let mut outcomes = Vec::with_capacity(ready.len());
        for (step, inputs) in ready {
            progress.on_stack_start(&step.stack_id);
            let outcome = provision_step(provisioner, step, inputs);
            progress.on_stack_complete(&step.stack_id, &outcome);
            outcomes.push((*step, outcome));
        }
        return Ok(outcomes);
    }

    // The progress callback is not Sync; report around the pool, not inside it
    for (step, _) in ready {
        progress.on_stack_start(&step.stack_id);
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to create thread pool: {}", e))?;

    let outcomes: Vec<(&'a PlanStep, StackOutcome)> = pool.install(|| {
        ready
            .par_iter()
            .map(|(step, inputs)| (*step, provision_step(provisioner, step, inputs)))
            .collect()
    });

    for (step, outcome) in &outcomes {
        progress.on_stack_complete(&step.stack_id, outcome);
    }
    Ok(outcomes)
}

fn provision_step<P: Provisioner>(
    provisioner: &P,
    step: &PlanStep,
    inputs: &BTreeMap<String, Value>,
) -> StackOutcome {
    let request = ProvisionRequest {
        stack_id: &step.stack_id,
        inputs,
        resources: &step.resources,
        outputs: &step.outputs,
    };

    match provisioner.provision(&request) {
        Ok(returned) => match check_outputs(step, returned) {
            Ok(outputs) => StackOutcome::Provisioned { outputs },
            Err(error) => StackOutcome::Failed { error },
        },
        Err(e) => StackOutcome::Failed {
            error: format!("{e:#}"),
        },
    }
}

/// Keep the declared outputs, each concrete and of the declared type
fn check_outputs(
    step: &PlanStep,
    mut returned: BTreeMap<String, Value>,
) -> std::result::Result<BTreeMap<String, Value>, String> {
    let mut outputs = BTreeMap::new();
    for (name, declared) in &step.outputs {
        let value = returned
            .remove(name)
            .ok_or_else(|| format!("provisioner returned no value for output '{name}'"))?;
        if value.is_deferred() {
            return Err(format!("output '{name}' is still unresolved ({value})"));
        }
        if value.ty() != declared.ty() {
            return Err(format!(
                "output '{name}' should be {} but provisioner returned {}",
                declared.ty(),
                value.ty()
            ));
        }
        outputs.insert(name.clone(), value);
    }
    Ok(outputs)
}

/// Simple rollout without callbacks
///
/// For basic use cases where you don't need progress or confirmation.
pub fn rollout_simple<P: Provisioner>(
    plan: &DeploymentPlan,
    opts: &RolloutOptions,
    provisioner: &P,
) -> Result<RolloutSummary> {
    use crate::context::{AutoConfirm, NoProgress};

    rollout(plan, opts, provisioner, &mut NoProgress, &mut AutoConfirm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{AutoConfirm, AutoDecline, NoProgress};
    use crate::graph::StackGraph;
    use crate::node::{builder_fn, declare, slots};
    use crate::planner::synthesize;
    use crate::types::{SlotDecl, SlotSpec, SlotType, Synthesized, Token};
    use std::sync::Mutex;

    /// Returns "<stack>-<output>" for every deferred output and records calls
    #[derive(Default)]
    struct MockProvisioner {
        fail: Option<&'static str>,
        calls: Mutex<Vec<(String, BTreeMap<String, Value>)>>,
    }

    impl Provisioner for MockProvisioner {
        fn provision(&self, request: &ProvisionRequest<'_>) -> Result<BTreeMap<String, Value>> {
            self.calls
                .lock()
                .unwrap()
                .push((request.stack_id.to_string(), request.inputs.clone()));
            if self.fail == Some(request.stack_id) {
                anyhow::bail!("capacity unavailable");
            }
            Ok(request
                .outputs
                .iter()
                .map(|(name, value)| {
                    let concrete = match value {
                        Value::Deferred(token) => {
                            Value::String(format!("{}-{}", token.stack, token.output))
                        }
                        other => other.clone(),
                    };
                    (name.clone(), concrete)
                })
                .collect())
        }
    }

    fn network(id: &str) -> crate::node::StackNode {
        declare(
            id,
            SlotSpec::new(),
            slots([("vpcId", SlotDecl::required(SlotType::String))]),
            builder_fn(&[], |inputs| {
                Ok(Synthesized::new().output(
                    "vpcId",
                    Value::Deferred(Token::new(inputs.stack(), "vpcId", SlotType::String)),
                ))
            }),
        )
        .unwrap()
    }

    fn compute(id: &str) -> crate::node::StackNode {
        declare(
            id,
            slots([("vpcId", SlotDecl::required(SlotType::String))]),
            slots([("dns", SlotDecl::required(SlotType::String))]),
            builder_fn(&[], |inputs| {
                Ok(Synthesized::new().output(
                    "dns",
                    Value::Deferred(Token::new(inputs.stack(), "dns", SlotType::String)),
                ))
            }),
        )
        .unwrap()
    }

    fn plan() -> DeploymentPlan {
        let mut graph = StackGraph::new();
        graph.add_node(network("Network")).unwrap();
        graph.add_node(compute("Compute")).unwrap();
        graph.add_node(compute("Batch")).unwrap();
        graph.add_edge("Network", "vpcId", "Compute", "vpcId").unwrap();
        graph.add_edge("Network", "vpcId", "Batch", "vpcId").unwrap();
        synthesize(&graph).unwrap()
    }

    #[test]
    fn test_rollout_empty_plan() {
        let provisioner = MockProvisioner::default();
        let summary =
            rollout_simple(&DeploymentPlan::default(), &RolloutOptions::default(), &provisioner)
                .unwrap();
        assert_eq!(summary.total(), 0);
    }

    #[test]
    fn test_outputs_feed_forward() {
        let provisioner = MockProvisioner::default();
        let opts = RolloutOptions {
            jobs: 1,
            ..Default::default()
        };
        let summary = rollout_simple(&plan(), &opts, &provisioner).unwrap();

        assert!(summary.is_success());
        assert_eq!(summary.provisioned, 3);

        let calls = provisioner.calls.lock().unwrap();
        let order: Vec<&str> = calls.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(order, vec!["Network", "Batch", "Compute"]);
        assert_eq!(
            calls[2].1["vpcId"],
            Value::String("Network-vpcId".into())
        );
        assert_eq!(
            summary.outputs["Compute"]["dns"],
            Value::String("Compute-dns".into())
        );
    }

    #[test]
    fn test_parallel_wave_keeps_plan_order() {
        let provisioner = MockProvisioner::default();
        let opts = RolloutOptions {
            jobs: 4,
            ..Default::default()
        };
        let summary = rollout(&plan(), &opts, &provisioner, &mut NoProgress, &mut AutoConfirm)
            .unwrap();
        let order: Vec<&str> = summary.records.iter().map(|r| r.stack_id.as_str()).collect();
        assert_eq!(order, vec!["Network", "Batch", "Compute"]);
    }

    #[test]
    fn test_failed_producer_skips_consumers() {
        let provisioner = MockProvisioner {
            fail: Some("Network"),
            ..Default::default()
        };
        let summary = rollout_simple(&plan(), &RolloutOptions::default(), &provisioner).unwrap();

        assert!(!summary.is_success());
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 2);
        assert_eq!(
            summary.outcome("Network"),
            Some(&StackOutcome::Failed {
                error: "capacity unavailable".into()
            })
        );
        assert_eq!(provisioner.calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_skipped_stacks_keep_their_place_in_the_wave() {
        let mut graph = StackGraph::new();
        graph.add_node(network("Edge")).unwrap();
        graph.add_node(network("Network")).unwrap();
        graph.add_node(compute("Batch")).unwrap();
        graph.add_node(compute("Compute")).unwrap();
        graph.add_edge("Edge", "vpcId", "Batch", "vpcId").unwrap();
        graph.add_edge("Network", "vpcId", "Compute", "vpcId").unwrap();
        let plan = synthesize(&graph).unwrap();

        for jobs in [1, 4] {
            let provisioner = MockProvisioner {
                fail: Some("Network"),
                ..Default::default()
            };
            let opts = RolloutOptions {
                jobs,
                ..Default::default()
            };
            let summary = rollout_simple(&plan, &opts, &provisioner).unwrap();

            let order: Vec<&str> = summary.records.iter().map(|r| r.stack_id.as_str()).collect();
            assert_eq!(order, vec!["Edge", "Network", "Batch", "Compute"], "jobs={jobs}");
            assert!(summary.outcome("Batch").is_some_and(StackOutcome::is_provisioned));
            assert!(matches!(
                summary.outcome("Compute"),
                Some(StackOutcome::Skipped { .. })
            ));
        }
    }

    #[test]
    fn test_dry_run_does_not_provision() {
        let provisioner = MockProvisioner::default();
        let opts = RolloutOptions {
            dry_run: true,
            ..Default::default()
        };
        let summary = rollout_simple(&plan(), &opts, &provisioner).unwrap();
        assert_eq!(summary.skipped, 3);
        assert!(provisioner.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_declined_confirmation_skips_everything() {
        let provisioner = MockProvisioner::default();
        let summary = rollout(
            &plan(),
            &RolloutOptions::default(),
            &provisioner,
            &mut NoProgress,
            &mut AutoDecline,
        )
        .unwrap();
        assert_eq!(summary.skipped, 3);
        assert!(provisioner.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_unresolved_output_fails_stack() {
        struct Lazy;
        impl Provisioner for Lazy {
            fn provision(
                &self,
                request: &ProvisionRequest<'_>,
            ) -> Result<BTreeMap<String, Value>> {
                Ok(request.outputs.clone())
            }
        }

        let summary = rollout_simple(&plan(), &RolloutOptions::default(), &Lazy).unwrap();
        assert!(matches!(
            summary.outcome("Network"),
            Some(StackOutcome::Failed { error }) if error.contains("unresolved")
        ));
        assert_eq!(summary.skipped, 2);
    }
}
