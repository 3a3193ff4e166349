use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

mod commands;
mod notify;

use commands::ask::AskArgs;
use commands::history::HistoryAction;
use commands::utils::{self, GlobalOptions};

#[derive(Parser, Debug)]
#[command(name = "gchat")]
#[command(version, about = "Streaming Gemini chat with a dated conversation log", long_about = None)]
struct Cli {
    /// Directory holding conversation.json and history/
    #[arg(long, global = true, value_name = "DIR")]
    workspace: Option<PathBuf>,

    /// Config file (defaults to ~/.config/gchat/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ask Gemini a question
    Ask(AskArgs),
    /// Inspect and manage the conversation log
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    utils::init_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let options = GlobalOptions {
        workspace: cli.workspace,
        config: cli.config,
    };

    match cli.command {
        Commands::Ask(args) => commands::ask::run(args, &options).await?,
        Commands::History { action } => commands::history::run(action, &options)?,
    }

    Ok(())
}
