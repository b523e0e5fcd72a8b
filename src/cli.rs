use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "shellmate",
    version,
    about = "Chat with a remote AI that can run shell commands after you confirm them",
    long_about = "shellmate - terminal relay to a remote AI workflow\n\nUsage:\n  shellmate                      Start interactive chat\n  shellmate --message \"prompt\"   Run a single exchange and exit\n  shellmate config --init        Configure the AI endpoint"
)]
pub struct Cli {
    /// Run a single exchange with this message and exit
    #[arg(long, visible_alias = "msg")]
    pub message: Option<String>,

    /// Conversation identifier to resume (defaults to AI_SESSION_ID or a new UUID)
    #[arg(long, conflicts_with = "no_session")]
    pub session_id: Option<String>,

    /// Send prompts without a session identifier
    #[arg(long)]
    pub no_session: bool,

    /// Prompt history file (defaults to ./history.log)
    #[arg(long)]
    pub history_file: Option<PathBuf>,

    /// Print diagnostics to stderr (-v for debug, -vv for trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Configure the AI endpoint and settings.
    Config(ConfigArgs),
}

#[derive(Debug, Clone, Args)]
pub struct ConfigArgs {
    /// Run the interactive setup and save the result.
    #[arg(long)]
    pub init: bool,
    /// Show the effective configuration.
    #[arg(long)]
    pub show: bool,
}
