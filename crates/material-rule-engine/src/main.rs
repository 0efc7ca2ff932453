//! 物料计算命令行入口

use clap::Parser;
use material_rules::cli::{Cli, CommandRunner, Commands};
use takeoff_shared::config::AppConfig;
use takeoff_shared::observability;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load("takeoff").unwrap_or_else(|e| {
        eprintln!("Failed to load config, using defaults: {}", e);
        AppConfig::default()
    });
    if let Some(level) = cli.log_level {
        config.observability.log_level = level;
    }
    observability::init(&config.observability)?;

    let runner = CommandRunner::new(config.engine);

    match cli.command {
        Commands::Compute {
            rules,
            features,
            output,
            parallel,
        } => {
            runner
                .run_compute(&rules, &features, output.as_deref(), parallel)
                .await?;
        }
        Commands::Validate { rules } => {
            runner.run_validate(&rules)?;
        }
    }

    Ok(())
}
