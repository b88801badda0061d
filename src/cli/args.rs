// ABOUTME: Command line argument definitions and parsing using Clap
// ABOUTME: Defines the main CLI structure and subcommands for gridflow

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::engine::ExecutionMode;

#[derive(Parser)]
#[command(name = "gridflow")]
#[command(about = "A declarative matrix workflow engine with restart-safe execution")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(short, long, global = true, help = "Path to configuration file")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, help = "Disable colored output")]
    pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Execute a workflow across its whole matrix
    Run {
        #[arg(help = "Path to workflow YAML or JSON file")]
        workflow: PathBuf,

        #[arg(
            short,
            long,
            value_parser = parse_mode,
            help = "Execution mode: dry-run, run or compare (default from config, else dry-run)"
        )]
        mode: Option<ExecutionMode>,

        #[arg(short, long, help = "Write the JSON run report to this file")]
        output: Option<PathBuf>,

        #[arg(long, help = "Maximum number of jobs run at once")]
        max_concurrent: Option<usize>,
    },

    /// Validate a workflow file and its matrix without executing
    Validate {
        #[arg(help = "Path to workflow YAML or JSON file")]
        workflow: PathBuf,
    },

    /// List the registered actions grouped by package
    Actions,

    /// Initialize a new workflow file from template
    Init {
        #[arg(help = "Identifier of the workflow to create")]
        name: String,

        #[arg(short, long, help = "Output directory", default_value = ".")]
        output_dir: PathBuf,
    },
}

fn parse_mode(value: &str) -> Result<ExecutionMode, String> {
    value.parse()
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
