// ABOUTME: Main application orchestration for gridflow CLI
// ABOUTME: Coordinates between CLI arguments, configuration, the action registry and command execution

use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use super::commands;
use super::{Args, Commands, Config};
use crate::actions::ActionRegistry;

pub struct App {
    config: Config,
    registry: Arc<ActionRegistry>,
}

impl App {
    /// Create a new application instance with the built-in actions
    pub fn new(config: Config) -> Self {
        Self::with_registry(config, ActionRegistry::with_builtins())
    }

    /// Create an application around a registry populated by the embedding program
    pub fn with_registry(config: Config, registry: ActionRegistry) -> Self {
        Self {
            config,
            registry: Arc::new(registry),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Initialize logging based on configuration
    pub fn init_logging(&self, verbose: bool, no_color: bool) -> Result<()> {
        let log_level = if verbose {
            "debug"
        } else {
            &self.config.logging.level
        };

        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

        let builder = tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_ansi(!no_color)
            .with_target(false)
            .with_writer(std::io::stderr);

        let initialized = match self.config.logging.format.as_str() {
            "compact" => builder.compact().try_init(),
            "json" => builder.json().try_init(),
            _ => builder.try_init(),
        };
        if let Err(e) = initialized {
            debug!("Logging already initialized: {}", e);
        }

        debug!("Logging initialized with level: {}", log_level);
        Ok(())
    }

    /// Run the application with parsed arguments
    pub async fn run(&self, args: Args) -> Result<()> {
        self.init_logging(args.verbose, args.no_color)?;

        info!("Starting gridflow v{}", env!("CARGO_PKG_VERSION"));
        debug!("Configuration loaded from: {:?}", args.config);

        match args.command {
            Commands::Run {
                workflow,
                mode,
                output,
                max_concurrent,
            } => {
                let options = commands::RunOptions {
                    mode: mode.unwrap_or(self.config.default_mode),
                    output,
                    max_concurrent_jobs: max_concurrent.unwrap_or(self.config.max_concurrent_jobs),
                    step_timeout: self.config.step_timeout,
                };
                commands::run_workflow(workflow, options, Arc::clone(&self.registry)).await
            }

            Commands::Validate { workflow } => {
                commands::validate_workflow(workflow, Arc::clone(&self.registry)).await
            }

            Commands::Actions => commands::list_actions(&self.registry),

            Commands::Init { name, output_dir } => commands::init_workflow(name, output_dir).await,
        }
    }

    /// Create application from command line arguments
    pub fn from_args() -> Result<(Self, Args)> {
        let args = Args::parse_args();
        let config = Config::load(args.config.clone())?;
        Ok((Self::new(config), args))
    }
}
