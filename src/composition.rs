//! Composition files
//!
//! A composition names the stacks to deploy, the template each one is built
//! from, and the links wiring outputs to inputs:
//!
//! ```toml
//! [settings]
//! instance_type = "t3.small"
//!
//! [[stacks]]
//! id = "VpcStack"
//! template = "network"
//!
//! [[stacks]]
//! id = "AutoScalingStack"
//! template = "web-tier"
//! inputs = { maxCapacity = "6" }
//!
//! [[links]]
//! from = "VpcStack.vpcId"
//! to = "AutoScalingStack.vpcId"
//! ```

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use stackgraph::{Settings, SettingsSchema, StackGraph};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::catalog;

/// A stack instance in a composition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackDef {
    pub id: String,
    pub template: String,
    /// Literal input values, parsed with the slot's type
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub inputs: BTreeMap<String, String>,
}

/// A reference edge written as `Stack.slot`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkDef {
    pub from: String,
    pub to: String,
}

impl LinkDef {
    /// Split both ends into `(stack, slot)`
    pub fn endpoints(&self) -> Result<((&str, &str), (&str, &str))> {
        Ok((split_slot(&self.from)?, split_slot(&self.to)?))
    }
}

fn split_slot(reference: &str) -> Result<(&str, &str)> {
    match reference.rsplit_once('.') {
        Some((stack, slot)) if !stack.is_empty() && !slot.is_empty() => Ok((stack, slot)),
        _ => bail!("'{reference}' is not a Stack.slot reference"),
    }
}

/// A deployment: settings overrides, stacks and links
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Composition {
    #[serde(default)]
    pub settings: BTreeMap<String, String>,
    #[serde(default)]
    pub stacks: Vec<StackDef>,
    #[serde(default)]
    pub links: Vec<LinkDef>,
}

impl Composition {
    /// Load a composition from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read composition: {}", path.display()))?;
        let composition: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse composition: {}", path.display()))?;
        log::debug!(
            "Loaded {} stacks and {} links from {}",
            composition.stacks.len(),
            composition.links.len(),
            path.display()
        );
        Ok(composition)
    }

    /// Load from `path`, or fall back to the built-in deployment
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                log::debug!("No composition file given, using the default deployment");
                Ok(catalog::default_composition())
            }
        }
    }

    /// Build the stack graph with inputs defaulted from `settings`
    pub fn build_graph(&self, settings: &Settings) -> Result<StackGraph> {
        let mut graph = StackGraph::new();

        for stack in &self.stacks {
            let template = catalog::template(&stack.template).with_context(|| {
                format!(
                    "Unknown template '{}' for stack '{}'",
                    stack.template, stack.id
                )
            })?;
            let node = template
                .instantiate(&stack.id, settings, &stack.inputs)
                .with_context(|| format!("Failed to declare stack '{}'", stack.id))?;
            graph.add_node(node)?;
        }

        for link in &self.links {
            let ((producer, output), (consumer, input)) = link.endpoints()?;
            graph
                .add_edge(producer, output, consumer, input)
                .with_context(|| format!("Invalid link {} -> {}", link.from, link.to))?;
        }

        Ok(graph)
    }
}

/// Merge settings overrides, lowest precedence first
///
/// Sources are the composition's `[settings]` table, then environment
/// variables named after the upper-cased key, then `--set key=value` flags.
/// Blank environment values and blank flags count as not supplied and leave
/// the lower layers in place.
pub fn merge_overrides<F>(
    schema: &SettingsSchema,
    file: &BTreeMap<String, String>,
    env: F,
    flags: &[(String, String)],
) -> BTreeMap<String, String>
where
    F: Fn(&str) -> Option<String>,
{
    let mut merged = file.clone();
    for spec in schema.iter() {
        match env(&spec.key.to_uppercase()) {
            Some(value) if value.trim().is_empty() => {
                log::debug!("{} is blank in the environment, ignoring", spec.key);
            }
            Some(value) => {
                log::debug!("{} from environment", spec.key);
                merged.insert(spec.key.clone(), value);
            }
            None => {}
        }
    }
    for (key, value) in flags {
        if value.trim().is_empty() {
            log::debug!("--set {key}= is blank, ignoring");
            continue;
        }
        merged.insert(key.clone(), value.clone());
    }
    merged
}

/// Parse a `key=value` flag
pub fn parse_assignment(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing key in '{raw}'"));
    }
    Ok((key.to_string(), value.to_string()))
}
