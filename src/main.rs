use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod agent;
mod backend;
mod commands;
mod config;
mod pipeline;
mod sandbox;
mod state;
mod templates;

use commands::exec::Mapping;

#[derive(Parser)]
#[command(name = "sandpipe")]
#[command(
    author,
    version,
    about = "Provision a remote sandbox, hand it to an agent, clean it up"
)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default sandpipe.toml in the current project
    Init {
        /// Force overwrite an existing config
        #[arg(short, long)]
        force: bool,
    },

    /// Send a message to the agent inside a fresh sandbox
    Run {
        /// Message for the agent (`@ls`, `@read`, `@write` or a shell command)
        #[arg(required = true, num_args = 1..)]
        message: Vec<String>,
    },

    /// Run one command in a fresh sandbox
    Exec {
        /// Upload a local file before running, as LOCAL=REMOTE
        #[arg(long, value_name = "LOCAL=REMOTE", value_parser = commands::exec::parse_mapping)]
        upload: Vec<Mapping>,

        /// Download a file after running, as REMOTE=LOCAL
        #[arg(long, value_name = "REMOTE=LOCAL", value_parser = commands::exec::parse_mapping)]
        download: Vec<Mapping>,

        /// Command and arguments to run
        #[arg(required = true, last = true)]
        command: Vec<String>,
    },

    /// Show the last recorded run
    Status,

    /// Remove sandpipe state and release a leftover sandbox
    Clean {
        /// Also remove sandpipe.toml
        #[arg(long)]
        all: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("sandpipe=debug")
    } else {
        EnvFilter::new("sandpipe=info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match cli.command {
        Commands::Init { force } => {
            commands::init::run(force).await?;
        }
        Commands::Run { message } => {
            commands::run::run(message.join(" ")).await?;
        }
        Commands::Exec {
            upload,
            download,
            command,
        } => {
            commands::exec::run(command, upload, download).await?;
        }
        Commands::Status => {
            commands::status::run().await?;
        }
        Commands::Clean { all } => {
            commands::clean::run(all).await?;
        }
    }

    Ok(())
}
