//! Plan synthesis - orders a stack graph and resolves every stack's inputs
//!
//! Synthesis moves through `Unvalidated -> Validated -> Ordered -> Resolved`.
//! Any failure stops it where it is; a [`DeploymentPlan`] only exists once
//! every stage has passed.

use crate::error::{GraphError, SpecError, SynthesisError};
use crate::graph::StackGraph;
use crate::types::{ResourceDescriptor, Value};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Unvalidated,
    Validated,
    Ordered,
    Resolved,
}

fn advance(stage: &mut Stage, next: Stage) {
    log::debug!("synthesis {stage:?} -> {next:?}");
    *stage = next;
}

/// One stack in a deployment plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    pub stack_id: String,
    /// Longest distance from a stack with no producers
    pub wave: usize,
    /// Producers this stack consumes from, ascending
    pub depends_on: Vec<String>,
    /// Every bound or defaulted input
    pub inputs: BTreeMap<String, Value>,
    pub resources: Vec<ResourceDescriptor>,
    pub outputs: BTreeMap<String, Value>,
}

/// Audit record of a plan step: the stack and what it was given
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanRecord {
    pub stack_id: String,
    pub inputs: BTreeMap<String, Value>,
}

/// Ordered stacks with fully resolved inputs
///
/// Every producer precedes all consumers of its outputs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeploymentPlan {
    steps: Vec<PlanStep>,
}

impl DeploymentPlan {
    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    /// Stack ids in deployment order
    pub fn order(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.stack_id.as_str()).collect()
    }

    pub fn step(&self, stack_id: &str) -> Option<&PlanStep> {
        self.steps.iter().find(|s| s.stack_id == stack_id)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Total number of resource descriptors across all stacks
    pub fn resource_count(&self) -> usize {
        self.steps.iter().map(|s| s.resources.len()).sum()
    }

    /// Steps grouped by wave
    ///
    /// Stacks in the same wave do not depend on each other. Within a wave
    /// steps keep their plan order.
    pub fn waves(&self) -> Vec<Vec<&PlanStep>> {
        let mut waves: Vec<Vec<&PlanStep>> = Vec::new();
        for step in &self.steps {
            if waves.len() <= step.wave {
                waves.resize_with(step.wave + 1, Vec::new);
            }
            waves[step.wave].push(step);
        }
        waves
    }

    /// Ordered `(stack, inputs)` records for audit or replay
    pub fn to_records(&self) -> Vec<PlanRecord> {
        self.steps
            .iter()
            .map(|s| PlanRecord {
                stack_id: s.stack_id.clone(),
                inputs: s.inputs.clone(),
            })
            .collect()
    }
}

/// Topological order of a graph using Kahn's algorithm
///
/// Ties between ready stacks go to the smallest id, so identical graphs
/// always give identical orders. Stacks left with a non-zero in-degree
/// mean the graph has a cycle.
pub fn topological_order(graph: &StackGraph) -> Result<Vec<String>, GraphError> {
    let mut in_degree: BTreeMap<&str, usize> = graph.nodes().map(|n| (n.id(), 0)).collect();
    let mut outgoing: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for edge in graph.edges() {
        *in_degree.entry(edge.consumer.as_str()).or_default() += 1;
        outgoing
            .entry(edge.producer.as_str())
            .or_default()
            .push(edge.consumer.as_str());
    }

    let mut ready: BTreeSet<&str> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(id, _)| *id)
        .collect();
    let mut order = Vec::with_capacity(in_degree.len());

    while let Some(id) = ready.pop_first() {
        order.push(id.to_string());
        for consumer in outgoing.get(id).into_iter().flatten() {
            if let Some(degree) = in_degree.get_mut(consumer) {
                *degree -= 1;
                if *degree == 0 {
                    ready.insert(*consumer);
                }
            }
        }
    }

    if order.len() < in_degree.len() {
        let remaining = in_degree
            .into_iter()
            .filter(|(_, degree)| *degree > 0)
            .map(|(id, _)| id.to_string())
            .collect();
        return Err(GraphError::UnresolvedGraph { remaining });
    }
    Ok(order)
}

/// Synthesize a deployment plan
///
/// Validates the graph, orders it, then builds each stack in order with its
/// inputs resolved from producer outputs or literal defaults. No partial
/// plan is returned on failure.
pub fn synthesize(graph: &StackGraph) -> Result<DeploymentPlan, SynthesisError> {
    let mut stage = Stage::Unvalidated;

    graph.validate()?;
    advance(&mut stage, Stage::Validated);

    let order = topological_order(graph)?;
    advance(&mut stage, Stage::Ordered);

    let mut steps: Vec<PlanStep> = Vec::with_capacity(order.len());
    let mut index: BTreeMap<String, usize> = BTreeMap::new();

    for id in order {
        let node = graph
            .node(&id)
            .ok_or_else(|| GraphError::UnknownStack { id: id.clone() })?;

        let mut inputs = BTreeMap::new();
        let mut depends_on = BTreeSet::new();
        let mut wave: usize = 0;

        for (name, decl) in node.inputs() {
            if let Some(edge) = graph.binding(&id, name) {
                let producer = index
                    .get(&edge.producer)
                    .map(|i| &steps[*i])
                    .ok_or_else(|| GraphError::UnresolvedGraph {
                        remaining: vec![edge.producer.clone()],
                    })?;
                let value = producer.outputs.get(&edge.output).cloned().ok_or_else(|| {
                    SpecError::MissingOutput {
                        stack: edge.producer.clone(),
                        output: edge.output.clone(),
                    }
                })?;
                wave = wave.max(producer.wave + 1);
                depends_on.insert(edge.producer.clone());
                inputs.insert(name.clone(), value);
            } else if let Some(default) = &decl.default {
                inputs.insert(name.clone(), default.clone());
            }
        }

        let synthesized = node.build(&inputs)?;
        log::debug!(
            "built {id}: {} resources, {} outputs",
            synthesized.resources.len(),
            synthesized.outputs.len()
        );

        index.insert(id.clone(), steps.len());
        steps.push(PlanStep {
            stack_id: id,
            wave,
            depends_on: depends_on.into_iter().collect(),
            inputs,
            resources: synthesized.resources,
            outputs: synthesized.outputs,
        });
    }
    advance(&mut stage, Stage::Resolved);

    Ok(DeploymentPlan { steps })
}
