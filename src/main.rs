//! Session Sentinel - Main Entry Point

use clap::Parser;
use session_sentinel::cli::{
    cmd_config, cmd_detect, cmd_evaluate, cmd_info, cmd_report, show_help, Cli, Commands,
};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "session_sentinel=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Detect { data, output, config, threshold }) => {
            cmd_detect(&data, &output, config.as_deref(), threshold)?;
        }
        Some(Commands::Evaluate { data }) => {
            cmd_evaluate(&data)?;
        }
        Some(Commands::Report { data, output_dir }) => {
            cmd_report(&data, &output_dir)?;
        }
        Some(Commands::Info { data }) => {
            cmd_info(&data)?;
        }
        Some(Commands::Config) => {
            cmd_config()?;
        }
        None => {
            show_help();
        }
    }

    Ok(())
}
