use anyhow::Result;
use colored::Colorize;
use stackgraph::DeploymentPlan;

use crate::Context;
use crate::cli::{OutputFormat, PlanArgs};
use crate::state::StateStore;
use crate::ui;

use super::load;

pub fn run(ctx: &Context, args: &PlanArgs) -> Result<()> {
    let plan = load(ctx)?.synthesize()?;

    match (args.format, args.records) {
        (OutputFormat::Json, true) => {
            println!("{}", serde_json::to_string_pretty(&plan.to_records())?);
        }
        (OutputFormat::Json, false) => println!("{}", serde_json::to_string_pretty(&plan)?),
        (OutputFormat::Text, true) => print_records(&plan),
        (OutputFormat::Text, false) => print_plan(ctx, &plan),
    }

    if args.save {
        let store = StateStore::open_default()?;
        let saved = store.save_plan(&plan)?;
        if !ctx.quiet && args.format == OutputFormat::Text {
            println!();
            ui::success(&format!(
                "Plan saved to {} ({})",
                store.dir().display(),
                &saved.fingerprint[..12]
            ));
        }
    }
    Ok(())
}

fn print_records(plan: &DeploymentPlan) {
    for (index, record) in plan.to_records().iter().enumerate() {
        ui::step(index + 1, plan.len(), &record.stack_id);
        for (name, value) in &record.inputs {
            ui::kv(name, &ui::value(value));
        }
    }
}

fn print_plan(ctx: &Context, plan: &DeploymentPlan) {
    ui::header("Deployment plan");

    let mut position = 0;
    for (wave, steps) in plan.waves().iter().enumerate() {
        ui::section(&format!("Wave {}", wave + 1));
        for step in steps {
            position += 1;
            let depends = if step.depends_on.is_empty() {
                String::new()
            } else {
                format!(" (after {})", step.depends_on.join(", "))
                    .dimmed()
                    .to_string()
            };
            ui::step(position, plan.len(), &format!("{}{depends}", step.stack_id.bold()));

            for (name, value) in &step.inputs {
                ui::kv(name, &ui::value(value));
            }
            if ctx.verbose > 0 {
                for resource in &step.resources {
                    ui::dim(&format!("{} {}", resource.kind, resource.logical_id));
                }
            } else {
                ui::dim(&format!(
                    "{} resources, {} outputs",
                    step.resources.len(),
                    step.outputs.len()
                ));
            }
        }
    }

    println!();
    ui::success(&format!(
        "{} stacks, {} resources, {} waves",
        plan.len(),
        plan.resource_count(),
        plan.waves().len()
    ));
}
