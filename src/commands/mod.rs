pub mod apply;
pub mod diff;
pub mod graph;
pub mod plan;
pub mod settings;
pub mod templates;
pub mod validate;

use anyhow::{Context as _, Result};
use stackgraph::{DeploymentPlan, Settings, SettingsSchema, StackGraph, resolve, synthesize};

use crate::Context;
use crate::catalog;
use crate::composition::{Composition, merge_overrides};

/// Everything a command needs, loaded from the composition and overrides
pub struct Loaded {
    pub composition: Composition,
    pub graph: StackGraph,
}

impl Loaded {
    pub fn synthesize(&self) -> Result<DeploymentPlan> {
        synthesize(&self.graph).context("Failed to synthesize the deployment plan")
    }
}

/// Resolve settings for the current invocation
pub fn load_settings(ctx: &Context) -> Result<(Composition, SettingsSchema, Settings)> {
    let composition = Composition::load_or_default(ctx.file.as_deref())?;
    let schema = catalog::settings_schema();
    let overrides = merge_overrides(
        &schema,
        &composition.settings,
        |name| std::env::var(name).ok(),
        &ctx.overrides,
    );
    let settings = resolve(&schema, &overrides).context("Invalid settings")?;
    Ok((composition, schema, settings))
}

/// Resolve settings and build the stack graph
pub fn load(ctx: &Context) -> Result<Loaded> {
    let (composition, _, settings) = load_settings(ctx)?;
    let graph = composition.build_graph(&settings)?;
    Ok(Loaded { composition, graph })
}
