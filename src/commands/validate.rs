use anyhow::{Context as _, Result};
use colored::Colorize;

use crate::Context;
use crate::ui;

use super::load;

pub fn run(ctx: &Context) -> Result<()> {
    let loaded = load(ctx)?;
    let graph = &loaded.graph;

    graph.validate().context("Composition is not valid")?;

    if ctx.quiet {
        return Ok(());
    }

    ui::header("Composition");
    for stack in &loaded.composition.stacks {
        ui::kv(&stack.id, &stack.template);
    }

    ui::section("Links");
    if graph.edges().is_empty() {
        ui::dim("none");
    }
    for edge in graph.edges() {
        println!("  {edge}");
    }

    // Outputs nobody consumes are legal, but worth pointing out
    let unconsumed: Vec<String> = graph
        .nodes()
        .flat_map(|node| {
            node.outputs()
                .keys()
                .filter(move |output| {
                    !graph
                        .consumers_of(node.id())
                        .any(|edge| &edge.output == *output)
                })
                .map(move |output| format!("{}.{output}", node.id()))
        })
        .collect();
    if !unconsumed.is_empty() {
        ui::section("Unconsumed outputs");
        for output in &unconsumed {
            ui::dim(output);
        }
    }

    println!();
    ui::success(&format!(
        "{} stacks, {} links, {}",
        graph.len(),
        graph.edges().len(),
        "no cycles".green()
    ));
    Ok(())
}
