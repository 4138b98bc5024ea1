use anyhow::Result;
use colored::Colorize;

use crate::Context;
use crate::catalog;
use crate::ui;

pub fn run(_ctx: &Context) -> Result<()> {
    ui::header("Stack templates");
    for template in catalog::templates() {
        ui::section(template.name);
        ui::dim(template.description);
        for input in template.inputs {
            let source = match (input.setting, input.default) {
                (Some(key), _) => format!("setting {key}").normal(),
                (None, Some(default)) => format!("default {default}").normal(),
                (None, None) if input.optional => "optional".dimmed(),
                (None, None) => "link required".yellow(),
            };
            println!("  {} {:<22} {:<14} {}", "in ".dimmed(), input.name, input.ty.name(), source);
        }
        for output in template.outputs {
            println!("  {} {output}", "out".dimmed());
        }
    }
    Ok(())
}
