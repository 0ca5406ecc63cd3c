use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

mod commands;
mod utils;

/// ICN sensor gateway
#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    /// Configuration file (TOML)
    #[clap(short, long, global = true)]
    config: Option<PathBuf>,

    /// Sets the level of verbosity
    #[clap(short, long, global = true)]
    verbose: bool,

    /// Subcommand to execute
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the gateway until interrupted
    Run {
        /// Mesh endpoint: serial device path or tcp://host:port
        #[clap(short, long)]
        mesh: Option<String>,

        /// Serial baud rate
        #[clap(short, long)]
        baud: Option<u32>,

        /// Address of the ICN daemon
        #[clap(short, long)]
        icn: Option<String>,
    },

    /// Build or inspect sensor frames
    Frame {
        #[clap(subcommand)]
        cmd: FrameCommands,
    },

    /// Print the effective configuration
    ShowConfig,
}

#[derive(Subcommand)]
enum FrameCommands {
    /// Encode a frame and print it as base64
    Encode {
        /// Signal code
        #[clap(short, long, value_enum, default_value = "data")]
        signal: SignalArg,

        /// Hop count (defaults to 0 for DATA, 1 for INTEREST)
        #[clap(long)]
        hops: Option<u8>,

        /// Content name
        #[clap(short, long)]
        name: String,

        /// Content (defaults to "N/A" for INTEREST)
        #[clap(short = 'p', long)]
        content: Option<String>,

        /// Also print the TX command for this mesh address
        #[clap(short, long)]
        dest: Option<String>,
    },

    /// Decode a base64 frame or a TX:/RX: line
    Decode {
        /// Base64 frame or mesh protocol line
        input: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SignalArg {
    Data,
    Interest,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(
        if cli.verbose { "debug" } else { "info" }
    )).init();

    // Execute the specified command
    match cli.command {
        Commands::Run { mesh, baud, icn } => {
            commands::run::run_gateway(cli.config, mesh, baud, icn).await?;
        },
        Commands::Frame { cmd } => {
            commands::frame::handle_command(cmd)?;
        },
        Commands::ShowConfig => {
            commands::run::show_config(cli.config)?;
        },
    }

    Ok(())
}
