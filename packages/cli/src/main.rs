use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use docksock::LoggingConfig;

mod commands;
mod config;

#[derive(Parser)]
#[command(name = "docksock", about = "Docksock CLI - Talk to the container engine daemon")]
#[command(version, propagate_version = true)]
struct Cli {
    /// Path to configuration file (default: ~/.docksock/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Daemon socket path, overrides the configuration
    #[arg(short, long, global = true, env = "DOCKSOCK_SOCKET")]
    socket: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show client and daemon version information
    Version,

    /// Show daemon-wide information
    Info,

    /// List containers
    Ps {
        /// Include stopped containers
        #[arg(short, long)]
        all: bool,
    },

    /// Fetch the logs of a container
    Logs {
        /// Container ID or name
        container: String,

        /// Follow log output (live stream)
        #[arg(short, long)]
        follow: bool,

        /// Number of lines to show from the end of the logs
        #[arg(short = 'n', long)]
        tail: Option<usize>,
    },

    /// Show resource usage of a container
    Stats {
        /// Container ID or name
        container: String,

        /// Keep printing samples until interrupted
        #[arg(long)]
        stream: bool,
    },

    /// Log in to a registry through the daemon
    Login {
        /// Registry server address, e.g. ghcr.io
        server: String,

        /// Registry username
        #[arg(short, long)]
        username: String,
    },

    /// Pull an image
    Pull {
        /// Image name, e.g. alpine
        image: String,

        /// Image tag
        #[arg(short, long, default_value = "latest")]
        tag: String,
    },

    /// Save an image to a tar archive
    Save {
        /// Image name or ID
        image: String,

        /// File to write the archive to
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Build an image from a tar build context
    Build {
        /// Path to the build context archive
        context: PathBuf,

        /// Name and optionally a tag in the name:tag format
        #[arg(short, long)]
        tag: Vec<String>,

        /// Path of the Dockerfile inside the context
        #[arg(short, long, default_value = "Dockerfile")]
        file: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let docker = config::load(cli.config.as_deref(), cli.socket)?;
    init_logging(&docker.logging, cli.verbose)?;

    match cli.command {
        Commands::Version => commands::version::run(&docker).await,
        Commands::Info => commands::info::run(&docker).await,
        Commands::Ps { all } => commands::ps::run(&docker, all).await,
        Commands::Logs {
            container,
            follow,
            tail,
        } => commands::logs::run(&docker, &container, follow, tail).await,
        Commands::Stats { container, stream } => {
            commands::stats::run(&docker, &container, stream).await
        }
        Commands::Login { server, username } => {
            commands::login::run(&docker, &server, &username).await
        }
        Commands::Pull { image, tag } => commands::pull::run(&docker, &image, &tag).await,
        Commands::Save { image, output } => commands::save::run(&docker, &image, &output).await,
        Commands::Build { context, tag, file } => {
            commands::build::run(&docker, &context, tag, file).await
        }
    }
}

fn init_logging(logging: &LoggingConfig, verbose: bool) -> Result<()> {
    let level = if verbose {
        Level::DEBUG
    } else {
        logging.level.parse().unwrap_or(Level::INFO)
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string().to_lowercase()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose)
        .with_writer(std::io::stderr);

    match logging.format.as_str() {
        "json" => tracing::subscriber::set_global_default(builder.json().finish())?,
        "compact" => tracing::subscriber::set_global_default(builder.compact().finish())?,
        _ => tracing::subscriber::set_global_default(builder.finish())?,
    }

    Ok(())
}
