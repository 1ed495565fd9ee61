use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::service::{self, DetectArgs, ServeArgs, ServiceConfig};

#[derive(Debug, Parser)]
#[command(name = "plane-service", version, about = "Plane detection over HTTP")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve the detection API.
    Serve(ServeArgs),
    /// Detect planes in a single point file and print them as JSON.
    Detect(DetectArgs),
}

pub fn handle_command(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Serve(args) => service::run(ServiceConfig::try_from(args)?),
        Command::Detect(args) => service::run_oneshot(args),
    }
}
