//! Stack graph - stacks plus the references between them
//!
//! # Invariants
//!
//! - Stack ids are unique
//! - Every edge joins a declared output to a declared input of the same type
//! - An input is bound by at most one edge
//! - No stack depends on its own outputs, directly or transitively
//!
//! The last invariant is only checked in full by [`StackGraph::validate`];
//! `add_edge` rejects self-loops eagerly.

use crate::error::{GraphError, SlotKind};
use crate::node::StackNode;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

/// An output of one stack consumed as an input of another
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReferenceEdge {
    pub producer: String,
    pub output: String,
    pub consumer: String,
    pub input: String,
}

impl fmt::Display for ReferenceEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{} -> {}.{}",
            self.producer, self.output, self.consumer, self.input
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    White,
    Gray,
    Black,
}

/// Stacks and the reference edges between them
///
/// Built incrementally by one caller. Once built it can be shared across
/// threads behind an `Arc`; nothing in it is mutated by synthesis.
#[derive(Debug, Clone, Default)]
pub struct StackGraph {
    nodes: BTreeMap<String, StackNode>,
    edges: Vec<ReferenceEdge>,
}

impl StackGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a stack
    pub fn add_node(&mut self, node: StackNode) -> Result<(), GraphError> {
        if self.nodes.contains_key(node.id()) {
            return Err(GraphError::DuplicateId {
                id: node.id().to_string(),
            });
        }
        log::debug!("added stack {}", node.id());
        self.nodes.insert(node.id().to_string(), node);
        Ok(())
    }

    /// Bind `producer.output` to `consumer.input`
    ///
    /// Checks run in a fixed order: both stacks exist, both slots are
    /// declared, the slot types match, the edge is not a self-loop, and the
    /// input is not bound yet.
    pub fn add_edge(
        &mut self,
        producer: &str,
        output: &str,
        consumer: &str,
        input: &str,
    ) -> Result<(), GraphError> {
        let producer_node = self.require(producer)?;
        let consumer_node = self.require(consumer)?;

        let output_decl = producer_node
            .output(output)
            .ok_or_else(|| GraphError::UnknownSlot {
                stack: producer.to_string(),
                slot: output.to_string(),
                kind: SlotKind::Output,
            })?;
        let input_decl = consumer_node
            .input(input)
            .ok_or_else(|| GraphError::UnknownSlot {
                stack: consumer.to_string(),
                slot: input.to_string(),
                kind: SlotKind::Input,
            })?;

        if output_decl.ty != input_decl.ty {
            return Err(GraphError::TypeMismatch {
                producer: producer.to_string(),
                output: output.to_string(),
                output_type: output_decl.ty,
                consumer: consumer.to_string(),
                input: input.to_string(),
                input_type: input_decl.ty,
            });
        }

        if producer == consumer {
            return Err(GraphError::Cycle {
                path: vec![producer.to_string(), consumer.to_string()],
            });
        }

        if let Some(existing) = self.binding(consumer, input) {
            return Err(GraphError::InputAlreadyBound {
                stack: consumer.to_string(),
                input: input.to_string(),
                bound_to: format!("{}.{}", existing.producer, existing.output),
            });
        }

        let edge = ReferenceEdge {
            producer: producer.to_string(),
            output: output.to_string(),
            consumer: consumer.to_string(),
            input: input.to_string(),
        };
        log::debug!("added edge {edge}");
        self.edges.push(edge);
        Ok(())
    }

    fn require(&self, id: &str) -> Result<&StackNode, GraphError> {
        self.nodes
            .get(id)
            .ok_or_else(|| GraphError::UnknownStack { id: id.to_string() })
    }

    pub fn node(&self, id: &str) -> Option<&StackNode> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Stacks in ascending id order
    pub fn nodes(&self) -> impl Iterator<Item = &StackNode> {
        self.nodes.values()
    }

    /// Edges in insertion order
    pub fn edges(&self) -> &[ReferenceEdge] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Edge bound to `consumer.input`, if any
    pub fn binding(&self, consumer: &str, input: &str) -> Option<&ReferenceEdge> {
        self.edges
            .iter()
            .find(|e| e.consumer == consumer && e.input == input)
    }

    /// Edges leaving `producer`
    pub fn consumers_of<'a>(&'a self, producer: &'a str) -> impl Iterator<Item = &'a ReferenceEdge> {
        self.edges.iter().filter(move |e| e.producer == producer)
    }

    /// Edges entering `consumer`
    pub fn producers_of<'a>(&'a self, consumer: &'a str) -> impl Iterator<Item = &'a ReferenceEdge> {
        self.edges.iter().filter(move |e| e.consumer == consumer)
    }

    /// Producer to consumers, both in ascending id order
    pub(crate) fn adjacency(&self) -> BTreeMap<&str, BTreeSet<&str>> {
        let mut adjacency: BTreeMap<&str, BTreeSet<&str>> =
            self.nodes.keys().map(|id| (id.as_str(), BTreeSet::new())).collect();
        for edge in &self.edges {
            adjacency
                .entry(edge.producer.as_str())
                .or_default()
                .insert(edge.consumer.as_str());
        }
        adjacency
    }

    /// Full-graph check
    ///
    /// Cycles are reported first, then inputs that are neither bound by
    /// exactly one edge nor covered by a default. Optional inputs may stay
    /// unbound.
    pub fn validate(&self) -> Result<(), GraphError> {
        if let Some(path) = self.find_cycle() {
            return Err(GraphError::Cycle { path });
        }

        for node in self.nodes.values() {
            for (name, decl) in node.inputs() {
                let mut bindings = self.producers_of(node.id()).filter(|e| &e.input == name);
                match (bindings.next(), bindings.next()) {
                    (Some(_), None) => {}
                    (Some(_), Some(second)) => {
                        return Err(GraphError::InputAlreadyBound {
                            stack: node.id().to_string(),
                            input: name.clone(),
                            bound_to: format!("{}.{}", second.producer, second.output),
                        });
                    }
                    (None, _) if decl.default.is_some() || decl.optional => {}
                    (None, _) => {
                        return Err(GraphError::UnsatisfiedInput {
                            stack: node.id().to_string(),
                            input: name.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Find a dependency cycle with a white/gray/black depth-first search
    ///
    /// Returns the cycle as a path that starts and ends with the same stack,
    /// following edges from producer to consumer.
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        let adjacency = self.adjacency();
        let mut marks: HashMap<&str, Mark> =
            adjacency.keys().map(|id| (*id, Mark::White)).collect();
        let mut stack = Vec::new();

        for id in adjacency.keys() {
            if marks.get(id) == Some(&Mark::White)
                && let Some(path) = visit(*id, &adjacency, &mut marks, &mut stack)
            {
                return Some(path);
            }
        }
        None
    }
}

fn visit<'a>(
    id: &'a str,
    adjacency: &BTreeMap<&'a str, BTreeSet<&'a str>>,
    marks: &mut HashMap<&'a str, Mark>,
    stack: &mut Vec<&'a str>,
) -> Option<Vec<String>> {
    marks.insert(id, Mark::Gray);
    stack.push(id);

    for next in adjacency.get(id).into_iter().flatten() {
        match marks.get(next).copied().unwrap_or(Mark::White) {
            Mark::Gray => {
                let start = stack.iter().position(|s| s == next).unwrap_or(0);
                let mut path: Vec<String> = stack[start..].iter().map(|s| (*s).to_string()).collect();
                path.push((*next).to_string());
                return Some(path);
            }
            Mark::White => {
                if let Some(path) = visit(*next, adjacency, marks, stack) {
                    return Some(path);
                }
            }
            Mark::Black => {}
        }
    }

    stack.pop();
    marks.insert(id, Mark::Black);
    None
}
