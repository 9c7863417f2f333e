mod cli;
mod commands;
mod output;

use clap::Parser;
use cli::{Cli, Commands};
use cloudregister::{
    stores, Error as RegisterError, Parser as ConfigParser, Registration, RegistrationLock,
    DEFAULT_CONFIG_FILE,
};
use std::path::{Path, PathBuf};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(e) = run().await {
        if let Some(register_error) = e.downcast_ref::<RegisterError>() {
            tracing::error!("{}", register_error);
            eprintln!("Error: {}", register_error);
            if let Some(suggestion) = register_error.suggestion() {
                eprintln!("\nHint: {}", suggestion);
            }
        } else {
            tracing::error!("{:#}", e);
            eprintln!("Error: {:#}", e);
        }
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_file)?;

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let config = ConfigParser::new().load_config(&config_path)?;
    let registration = Registration::builder().config(config).build()?;

    let zypper_pid = stores::package_manager_pid().await;

    // Read-only commands run without the lock
    let _lock = if cli.command.is_mutating() {
        if let Some(pid) = zypper_pid {
            return Err(RegisterError::PackageManagerBusy(pid).into());
        }
        Some(RegistrationLock::acquire(registration.registry().dir())?)
    } else {
        None
    };

    match cli.command {
        Commands::Status { json } => {
            commands::run_status(&registration, json, zypper_pid.as_deref(), &output::CliOutput)
        }
        Commands::Discover => commands::run_discover(&registration, &output::CliOutput).await,
        Commands::Register { force_new } => {
            commands::run_register(&registration, force_new, &output::CliOutput).await
        }
        Commands::Failover => commands::run_failover(&registration, &output::CliOutput).await,
        Commands::Clean { keep_cache } => {
            commands::run_clean(&registration, keep_cache, &output::CliOutput)
        }
    }
}

fn init_tracing(log_file: &Path) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if log_file == Path::new("-") {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
        return Ok(());
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .map_err(|e| {
            anyhow::anyhow!("Could not open log file {}: {}", log_file.display(), e)
        })?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::sync::Mutex::new(file))
        .with_ansi(false)
        .init();

    Ok(())
}
