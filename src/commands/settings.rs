use anyhow::Result;
use colored::Colorize;
use stackgraph::SettingSource;

use crate::Context;
use crate::cli::OutputFormat;
use crate::ui;

use super::load_settings;

pub fn run(ctx: &Context, format: OutputFormat) -> Result<()> {
    let (_, schema, settings) = load_settings(ctx)?;

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&settings)?);
        return Ok(());
    }

    ui::header("Settings");
    for setting in settings.iter() {
        let source = match setting.source {
            SettingSource::Default => "default".dimmed(),
            SettingSource::Override => "override".yellow(),
        };
        println!(
            "  {:<24} {:<24} {}",
            setting.key.bold(),
            ui::value(&setting.value),
            source
        );
        if ctx.verbose > 0
            && let Some(spec) = schema.get(&setting.key)
        {
            ui::dim(&format!("{} ({})", spec.description, spec.ty));
        }
    }

    let overridden = settings.overridden().count();
    if overridden > 0 && !ctx.quiet {
        println!();
        ui::info(&format!("{overridden} setting(s) overridden"));
    }
    Ok(())
}
