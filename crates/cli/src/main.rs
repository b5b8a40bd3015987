/// Entry point for the Shroud CLI, a PHP source obfuscator.
///
/// Parses command-line arguments, initializes logging and dispatches to the subcommands for
/// obfuscating syntax trees, printing them back as PHP, or querying saved renaming state.
use clap::Parser;
use shroud_cli::commands::{Cmd, Command};
use tracing_subscriber::EnvFilter;

/// Command-line interface for Shroud.
///
/// Shroud reads PHP syntax trees serialized as JSON, renames identifiers consistently across
/// files and applies structural transforms (statement shuffling, control-flow wrapping,
/// array-access indirection, dead code, string and arithmetic encoding).
#[derive(Parser)]
#[command(name = "shroud")]
#[command(about = "Shroud: PHP source obfuscator")]
struct Cli {
    #[command(subcommand)]
    command: Cmd,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    cli.command.execute().await
}
