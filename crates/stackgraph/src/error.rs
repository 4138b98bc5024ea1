//! Error types for stack composition
//!
//! Every error is an authoring mistake in a composition. Variants carry the
//! offending stack id, slot name, setting key or cycle path.

use crate::types::SlotType;
use thiserror::Error;

/// Invalid settings
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Override names a key the schema does not know
    #[error("unknown setting '{key}'")]
    UnknownKey { key: String },

    /// Override does not parse as the setting's type
    #[error("invalid value '{value}' for setting '{key}': {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    /// Schema default does not match its declared type
    #[error("default for setting '{key}' is invalid: {reason}")]
    InvalidDefault { key: String, reason: String },
}

/// Malformed stack declaration or builder result
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpecError {
    #[error("stack id must not be empty")]
    EmptyId,

    /// Builder reads an input the stack does not declare
    #[error("stack '{stack}' builder references undeclared input '{input}'")]
    UndeclaredInput { stack: String, input: String },

    /// Literal default does not fit the input slot
    #[error("default for input '{stack}.{input}' is not a valid {expected}: {reason}")]
    DefaultType {
        stack: String,
        input: String,
        expected: SlotType,
        reason: String,
    },

    #[error("stack '{stack}' did not produce declared output '{output}'")]
    MissingOutput { stack: String, output: String },

    #[error("output '{stack}.{output}' is declared as {expected} but produced {found}")]
    OutputType {
        stack: String,
        output: String,
        expected: SlotType,
        found: SlotType,
    },

    #[error("stack '{stack}' produced undeclared output '{output}'")]
    UndeclaredOutput { stack: String, output: String },
}

/// Which side of an edge a slot lives on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    Input,
    Output,
}

impl std::fmt::Display for SlotKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Input => write!(f, "input"),
            Self::Output => write!(f, "output"),
        }
    }
}

/// Invalid graph structure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("stack '{id}' is already part of the graph")]
    DuplicateId { id: String },

    #[error("unknown stack '{id}'")]
    UnknownStack { id: String },

    #[error("stack '{stack}' declares no {kind} named '{slot}'")]
    UnknownSlot {
        stack: String,
        slot: String,
        kind: SlotKind,
    },

    #[error(
        "cannot bind {producer}.{output} ({output_type}) to {consumer}.{input} ({input_type})"
    )]
    TypeMismatch {
        producer: String,
        output: String,
        output_type: SlotType,
        consumer: String,
        input: String,
        input_type: SlotType,
    },

    /// Path starts and ends with the same stack
    #[error("dependency cycle: {}", .path.join(" -> "))]
    Cycle { path: Vec<String> },

    #[error("input '{stack}.{input}' is already bound to {bound_to}")]
    InputAlreadyBound {
        stack: String,
        input: String,
        bound_to: String,
    },

    #[error("required input '{stack}.{input}' has no edge and no default")]
    UnsatisfiedInput { stack: String, input: String },

    /// Kahn's algorithm left stacks behind
    #[error("graph could not be ordered; unresolved stacks: {}", .remaining.join(", "))]
    UnresolvedGraph { remaining: Vec<String> },
}

/// Failure while turning a graph into a plan
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SynthesisError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Spec(#[from] SpecError),

    /// Builder returned an error
    #[error("building stack '{stack}' failed: {message}")]
    Build { stack: String, message: String },
}

/// Any error raised by this crate
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Spec(#[from] SpecError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Synthesis(#[from] SynthesisError),
}

/// Result type for stack composition
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_message() {
        let err = GraphError::Cycle {
            path: vec!["A".into(), "B".into(), "A".into()],
        };
        assert_eq!(err.to_string(), "dependency cycle: A -> B -> A");
    }

    #[test]
    fn test_type_mismatch_message() {
        let err = GraphError::TypeMismatch {
            producer: "Network".into(),
            output: "vpcId".into(),
            output_type: SlotType::String,
            consumer: "Compute".into(),
            input: "maxAzs".into(),
            input_type: SlotType::Integer,
        };
        assert_eq!(
            err.to_string(),
            "cannot bind Network.vpcId (string) to Compute.maxAzs (integer)"
        );
    }

    #[test]
    fn test_wrapping_is_transparent() {
        let err: Error = SynthesisError::from(GraphError::UnknownStack { id: "X".into() }).into();
        assert_eq!(err.to_string(), "unknown stack 'X'");
    }
}
