use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cloudregister")]
#[command(about = "Register this instance with the region's SMT update server")]
pub struct Cli {
    /// Config file path (defaults to /etc/regionserverclnt.yaml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log file, or `-` for stderr
    #[arg(long, default_value = "/var/log/cloudregister")]
    pub log_file: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the current registration server
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Query the region infrastructure and cache the announced servers
    Discover,
    /// Register with a responsive registration server
    Register {
        /// Drop the existing registration and start over
        #[arg(long)]
        force_new: bool,
    },
    /// Switch to an equivalent server if the current one stopped answering
    Failover,
    /// Remove the registration and everything that depends on it
    Clean {
        /// Keep the cached candidate servers
        #[arg(long)]
        keep_cache: bool,
    },
}

impl Commands {
    /// Commands that modify host files and need the registration lock.
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Commands::Status { .. })
    }
}
