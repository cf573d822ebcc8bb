use clap::{Parser, Subcommand};

mod commands;

use commands::config::ConfigCommand;
use commands::serve::ServeArgs;
use commands::tools::ToolsArgs;

#[derive(Parser, Debug)]
#[command(name = "warden", version, about = "Warden MCP server")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the MCP server.
    Serve(ServeArgs),

    /// Print the built-in tool definitions as JSON.
    Tools(ToolsArgs),

    /// Inspect a configuration file.
    Config {
        #[command(subcommand)]
        cmd: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.cmd {
        Command::Serve(args) => commands::serve::run(args).await?,
        Command::Tools(args) => commands::tools::run(args)?,
        Command::Config { cmd } => commands::config::run(cmd)?,
    }

    Ok(())
}
