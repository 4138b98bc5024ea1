//! Core types for stack composition
//!
//! Slots are typed, and every value flowing between stacks carries enough
//! information to check it against the slot it lands in.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;
use std::sync::LazyLock;

static INSTANCE_TYPE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z][a-z0-9-]*\.[a-z0-9]+(-[a-z0-9]+)*$")
        .expect("instance type pattern is valid")
});

/// Type of an input, output or setting slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotType {
    /// Free-form text (names, ids, DNS names)
    String,
    /// Signed integer (capacities, counts)
    Integer,
    /// Boolean flag
    Boolean,
    /// IPv4 or IPv6 network in CIDR notation
    Cidr,
    /// Instance type such as `t2.micro`
    InstanceType,
    /// Ordered list of strings
    StringList,
}

impl SlotType {
    /// Lowercase name used in messages and composition files
    pub fn name(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Cidr => "cidr",
            Self::InstanceType => "instance_type",
            Self::StringList => "string_list",
        }
    }
}

impl fmt::Display for SlotType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Reference to an output that is only known after provisioning
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Token {
    /// Stack producing the value
    pub stack: String,
    /// Output slot on that stack
    pub output: String,
    /// Declared type of the output
    pub ty: SlotType,
}

impl Token {
    pub fn new(stack: impl Into<String>, output: impl Into<String>, ty: SlotType) -> Self {
        Self {
            stack: stack.into(),
            output: output.into(),
            ty,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${{{}.{}}}", self.stack, self.output)
    }
}

/// A typed value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    String(String),
    Integer(i64),
    Boolean(bool),
    Cidr(String),
    InstanceType(String),
    StringList(Vec<String>),
    /// Placeholder for a provisioned output
    Deferred(Token),
}

impl Value {
    /// The slot type this value satisfies
    pub fn ty(&self) -> SlotType {
        match self {
            Self::String(_) => SlotType::String,
            Self::Integer(_) => SlotType::Integer,
            Self::Boolean(_) => SlotType::Boolean,
            Self::Cidr(_) => SlotType::Cidr,
            Self::InstanceType(_) => SlotType::InstanceType,
            Self::StringList(_) => SlotType::StringList,
            Self::Deferred(token) => token.ty,
        }
    }

    /// Whether the value is a placeholder for a provisioned output
    pub fn is_deferred(&self) -> bool {
        matches!(self, Self::Deferred(_))
    }

    /// Borrow the text of string-like values
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) | Self::Cidr(s) | Self::InstanceType(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Parse raw text into a value of the given type
    ///
    /// Returns a human-readable reason when the text does not fit the type.
    pub fn parse(ty: SlotType, raw: &str) -> Result<Self, String> {
        let raw = raw.trim();
        match ty {
            SlotType::String => Ok(Self::String(raw.to_string())),
            SlotType::Integer => raw
                .parse::<i64>()
                .map(Self::Integer)
                .map_err(|_| format!("'{raw}' is not an integer")),
            SlotType::Boolean => match raw.to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" | "on" => Ok(Self::Boolean(true)),
                "false" | "no" | "0" | "off" => Ok(Self::Boolean(false)),
                _ => Err(format!("'{raw}' is not a boolean")),
            },
            SlotType::Cidr => validate_cidr(raw).map(|()| Self::Cidr(raw.to_string())),
            SlotType::InstanceType => {
                if INSTANCE_TYPE_RE.is_match(raw) {
                    Ok(Self::InstanceType(raw.to_string()))
                } else {
                    Err(format!(
                        "'{raw}' is not an instance type (expected family.size, e.g. t2.micro)"
                    ))
                }
            }
            SlotType::StringList => Ok(Self::StringList(
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect(),
            )),
        }
    }

    /// Check that the value is well-formed for its own type
    ///
    /// Values built directly (not through [`Value::parse`]) go through this
    /// before they are accepted as defaults.
    pub fn check(&self) -> Result<(), String> {
        match self {
            Self::Cidr(s) => validate_cidr(s),
            Self::InstanceType(s) => Self::parse(SlotType::InstanceType, s).map(|_| ()),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) | Self::Cidr(s) | Self::InstanceType(s) => write!(f, "{s}"),
            Self::Integer(n) => write!(f, "{n}"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::StringList(items) => write!(f, "{}", items.join(",")),
            Self::Deferred(token) => write!(f, "{token}"),
        }
    }
}

fn validate_cidr(raw: &str) -> Result<(), String> {
    let (addr, prefix) = raw
        .split_once('/')
        .ok_or_else(|| format!("'{raw}' is not a CIDR block (missing '/prefix')"))?;

    let addr: IpAddr = addr
        .parse()
        .map_err(|_| format!("'{raw}' has an invalid address part"))?;
    if prefix.is_empty() || !prefix.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("'{raw}' has an invalid prefix length"));
    }
    let prefix: u8 = prefix
        .parse()
        .map_err(|_| format!("'{raw}' has an invalid prefix length"))?;

    let max = if addr.is_ipv4() { 32 } else { 128 };
    if prefix > max {
        return Err(format!("'{raw}' prefix length exceeds /{max}"));
    }
    Ok(())
}

/// Declaration of a single named slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotDecl {
    pub ty: SlotType,
    /// Literal used when no edge binds this input
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Input may stay unbound
    #[serde(default)]
    pub optional: bool,
}

impl SlotDecl {
    /// A required slot of the given type
    pub fn required(ty: SlotType) -> Self {
        Self {
            ty,
            default: None,
            optional: false,
        }
    }

    /// A slot that may stay unbound
    pub fn optional(ty: SlotType) -> Self {
        Self {
            ty,
            default: None,
            optional: true,
        }
    }

    /// A slot with a literal default
    pub fn with_default(ty: SlotType, default: Value) -> Self {
        Self {
            ty,
            default: Some(default),
            optional: false,
        }
    }
}

/// Named, typed slots of a stack, ordered by name
pub type SlotSpec = BTreeMap<String, SlotDecl>;

/// Opaque description of one cloud resource
///
/// Produced by stack builders and handed to the provisioning engine.
/// Nothing in this crate looks inside `properties`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    /// Resource kind, e.g. `AWS::EC2::VPC`
    pub kind: String,
    /// Logical id, unique within its stack
    pub logical_id: String,
    pub properties: serde_json::Value,
}

impl ResourceDescriptor {
    pub fn new(
        kind: impl Into<String>,
        logical_id: impl Into<String>,
        properties: serde_json::Value,
    ) -> Self {
        Self {
            kind: kind.into(),
            logical_id: logical_id.into(),
            properties,
        }
    }
}

/// What a stack builder produces
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Synthesized {
    pub resources: Vec<ResourceDescriptor>,
    pub outputs: BTreeMap<String, Value>,
}

impl Synthesized {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resource descriptor
    pub fn resource(mut self, resource: ResourceDescriptor) -> Self {
        self.resources.push(resource);
        self
    }

    /// Add a produced output value
    pub fn output(mut self, name: impl Into<String>, value: Value) -> Self {
        self.outputs.insert(name.into(), value);
        self
    }
}

/// Result of provisioning one stack during a rollout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StackOutcome {
    /// Stack provisioned; concrete values of its declared outputs
    Provisioned { outputs: BTreeMap<String, Value> },
    /// Provisioning failed
    Failed { error: String },
    /// Stack was not attempted
    Skipped { reason: String },
}

impl StackOutcome {
    /// Check if the outcome represents success (no failure)
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }

    pub fn is_provisioned(&self) -> bool {
        matches!(self, Self::Provisioned { .. })
    }
}

/// Outcome of one stack, tagged with its id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackRecord {
    pub stack_id: String,
    #[serde(flatten)]
    pub outcome: StackOutcome,
}

/// Summary of a rollout
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RolloutSummary {
    pub provisioned: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Per-stack outcomes in plan order
    pub records: Vec<StackRecord>,
    /// Concrete outputs of provisioned stacks
    pub outputs: BTreeMap<String, BTreeMap<String, Value>>,
}

impl RolloutSummary {
    /// Check if the rollout was fully successful (no failures)
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Total number of stacks processed
    pub fn total(&self) -> usize {
        self.provisioned + self.failed + self.skipped
    }

    /// Add an outcome to the summary
    pub fn add(&mut self, stack_id: &str, outcome: StackOutcome) {
        match &outcome {
            StackOutcome::Provisioned { outputs } => {
                self.provisioned += 1;
                self.outputs.insert(stack_id.to_string(), outputs.clone());
            }
            StackOutcome::Failed { .. } => self.failed += 1,
            StackOutcome::Skipped { .. } => self.skipped += 1,
        }
        self.records.push(StackRecord {
            stack_id: stack_id.to_string(),
            outcome,
        });
    }

    /// Outcome recorded for a stack
    pub fn outcome(&self, stack_id: &str) -> Option<&StackOutcome> {
        self.records
            .iter()
            .find(|r| r.stack_id == stack_id)
            .map(|r| &r.outcome)
    }
}

/// Options for a rollout
#[derive(Debug, Clone)]
pub struct RolloutOptions {
    /// Don't provision, just report what would happen
    pub dry_run: bool,
    /// Number of stacks of the same wave provisioned in parallel
    pub jobs: usize,
}

impl Default for RolloutOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            jobs: 4,
        }
    }
}
