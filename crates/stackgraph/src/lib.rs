//! # Stackgraph
//!
//! Declarative composition of infrastructure stacks.
//!
//! Stacks declare typed input and output slots. Outputs of one stack are
//! wired to inputs of another with reference edges, and the resulting graph
//! is validated and synthesized into a deterministic deployment plan.
//!
//! ## Core Concepts
//!
//! - **Settings**: Typed deployment parameters, defaults merged with overrides
//! - **StackNode**: A stack with declared slots and a builder producing resources
//! - **StackGraph**: Stacks plus the reference edges between them
//! - **DeploymentPlan**: Stacks in dependency order with every input resolved
//! - **Rollout**: Hands each planned stack to a [`Provisioner`], wave by wave
//!
//! ## Example
//!
//! ```ignore
//! use stackgraph::{
//!     builder_fn, declare, slots, synthesize, SlotDecl, SlotSpec, SlotType,
//!     StackGraph, Synthesized, Token, Value,
//! };
//!
//! let network = declare(
//!     "Network",
//!     SlotSpec::new(),
//!     slots([("vpcId", SlotDecl::required(SlotType::String))]),
//!     builder_fn(&[], |inputs| {
//!         Ok(Synthesized::new().output(
//!             "vpcId",
//!             Value::Deferred(Token::new(inputs.stack(), "vpcId", SlotType::String)),
//!         ))
//!     }),
//! )?;
//! let compute = declare(
//!     "Compute",
//!     slots([("vpcId", SlotDecl::required(SlotType::String))]),
//!     SlotSpec::new(),
//!     builder_fn(&["vpcId"], |_| Ok(Synthesized::new())),
//! )?;
//!
//! let mut graph = StackGraph::new();
//! graph.add_node(network)?;
//! graph.add_node(compute)?;
//! graph.add_edge("Network", "vpcId", "Compute", "vpcId")?;
//!
//! let plan = synthesize(&graph)?;
//! assert_eq!(plan.order(), vec!["Network", "Compute"]);
//! ```
//!
//! ## Provider Traits
//!
//! - [`Provisioner`]: Turns resource descriptors into real infrastructure
//! - [`ProgressCallback`]: Receives progress updates
//! - [`ConfirmCallback`]: Handles user confirmations
//!
//! The crate has no dependency on any cloud SDK or terminal UI.

pub mod context;
pub mod diff;
pub mod error;
pub mod executor;
pub mod graph;
pub mod node;
pub mod planner;
pub mod settings;
pub mod types;

// Re-export main types at crate root
pub use context::{
    AutoConfirm, AutoDecline, ConfirmCallback, NoProgress, ProgressCallback, ProvisionRequest,
    Provisioner,
};
pub use diff::{DiffSummary, StackChange, StackDiff, diff_plans};
pub use error::{ConfigError, Error, GraphError, Result, SlotKind, SpecError, SynthesisError};
pub use executor::{rollout, rollout_simple};
pub use graph::{ReferenceEdge, StackGraph};
pub use node::{FnBuilder, Inputs, StackBuilder, StackNode, builder_fn, declare, slots};
pub use planner::{DeploymentPlan, PlanRecord, PlanStep, synthesize, topological_order};
pub use settings::{Setting, SettingSource, SettingSpec, Settings, SettingsSchema, resolve};
pub use types::{
    ResourceDescriptor, RolloutOptions, RolloutSummary, SlotDecl, SlotSpec, SlotType,
    StackOutcome, StackRecord, Synthesized, Token, Value,
};
