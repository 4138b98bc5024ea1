use anyhow::Result;
use colored::Colorize;
use stackgraph::StackGraph;
use std::fmt::Write as _;

use crate::Context;
use crate::cli::GraphFormat;
use crate::ui;

use super::load;

pub fn run(ctx: &Context, format: GraphFormat) -> Result<()> {
    let loaded = load(ctx)?;
    match format {
        GraphFormat::Dot => print!("{}", to_dot(&loaded.graph)),
        GraphFormat::Text => print_text(&loaded.graph),
    }
    Ok(())
}

fn print_text(graph: &StackGraph) {
    ui::header("Stack graph");
    for node in graph.nodes() {
        ui::section(node.id());
        for (name, decl) in node.inputs() {
            let source = match (graph.binding(node.id(), name), &decl.default) {
                (Some(edge), _) => format!("<- {}.{}", edge.producer, edge.output).cyan(),
                (None, Some(default)) => format!("= {}", ui::value(default)).normal(),
                (None, None) if decl.optional => "(optional, unbound)".dimmed(),
                (None, None) => "(unbound)".red(),
            };
            println!("  {} {:<22} {:<14} {}", "in ".dimmed(), name, decl.ty.name(), source);
        }
        for (name, decl) in node.outputs() {
            let consumers: Vec<String> = graph
                .consumers_of(node.id())
                .filter(|edge| &edge.output == name)
                .map(|edge| format!("{}.{}", edge.consumer, edge.input))
                .collect();
            let target = if consumers.is_empty() {
                "(unconsumed)".dimmed()
            } else {
                format!("-> {}", consumers.join(", ")).cyan()
            };
            println!("  {} {:<22} {:<14} {}", "out".dimmed(), name, decl.ty.name(), target);
        }
    }
}

/// Graphviz rendering, one edge per reference
fn to_dot(graph: &StackGraph) -> String {
    let mut dot = String::from("digraph stacks {\n  rankdir=LR;\n  node [shape=box];\n");
    for node in graph.nodes() {
        let _ = writeln!(dot, "  \"{}\";", node.id());
    }
    for edge in graph.edges() {
        let _ = writeln!(
            dot,
            "  \"{}\" -> \"{}\" [label=\"{} -> {}\"];",
            edge.producer, edge.consumer, edge.output, edge.input
        );
    }
    dot.push_str("}\n");
    dot
}
