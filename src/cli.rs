use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

use crate::composition::parse_assignment;

#[derive(Parser)]
#[command(name = "stackplan")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Compose infrastructure stacks into validated deployment plans", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Composition file (defaults to the built-in VPC + web tier deployment)
    #[arg(short, long, global = true, env = "STACKPLAN_FILE")]
    pub file: Option<PathBuf>,

    /// Override a setting (repeatable): --set instance_type=t3.small
    #[arg(long = "set", value_name = "KEY=VALUE", global = true, value_parser = parse_assignment)]
    pub overrides: Vec<(String, String)>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show resolved settings and where each value came from
    Settings(FormatArgs),

    /// Check the composition without building any stack
    Validate,

    /// Print the stack graph
    Graph(GraphArgs),

    /// Synthesize the deployment plan
    Plan(PlanArgs),

    /// Compare the plan with the last saved one
    Diff(DiffArgs),

    /// Provision the plan, wave by wave
    Apply(ApplyArgs),

    /// List available stack templates
    Templates,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum GraphFormat {
    #[default]
    Text,
    Dot,
}

#[derive(Parser)]
pub struct FormatArgs {
    /// Output format
    #[arg(long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

#[derive(Parser)]
pub struct GraphArgs {
    /// Output format
    #[arg(long, value_enum, default_value_t)]
    pub format: GraphFormat,
}

#[derive(Parser)]
pub struct PlanArgs {
    /// Output format
    #[arg(long, value_enum, default_value_t)]
    pub format: OutputFormat,

    /// Only print the ordered (stack, inputs) records
    #[arg(long)]
    pub records: bool,

    /// Save the plan as the baseline for `diff`
    #[arg(long)]
    pub save: bool,
}

#[derive(Parser)]
pub struct DiffArgs {
    /// Plan file to compare against instead of the saved plan
    #[arg(long)]
    pub against: Option<PathBuf>,

    /// Show unchanged stacks too
    #[arg(long)]
    pub all: bool,
}

#[derive(Parser)]
pub struct ApplyArgs {
    /// Dry run - show what would be done
    #[arg(short, long)]
    pub dry_run: bool,

    /// Number of stacks provisioned in parallel within a wave
    #[arg(short, long, default_value = "4")]
    pub jobs: usize,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Region used by the simulated provisioner
    #[arg(long, default_value = "us-east-1", env = "AWS_REGION")]
    pub region: String,
}
