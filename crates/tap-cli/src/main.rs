mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{action::ActionSubcommand, config::ConfigSubcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "tap",
    about = "Token action provider: run and manage identity passthrough actions",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .tap/)
    #[arg(long, global = true, env = "TAP_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create .tap/ and a default config in the project root
    Init,

    /// Serve the provider over HTTP
    Serve {
        /// Port to listen on (default: server.port from config; 0 = OS-assigned)
        #[arg(long, env = "TAP_PORT")]
        port: Option<u16>,

        /// Keep actions in memory instead of the configured store file
        #[arg(long)]
        memory: bool,
    },

    /// Show or validate the configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },

    /// Inspect and maintain stored actions (operator access, no caller checks)
    Action {
        #[command(subcommand)]
        subcommand: ActionSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root, cli.json),
        Commands::Serve { port, memory } => cmd::serve::run(&root, port, memory),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
        Commands::Action { subcommand } => cmd::action::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
