mod affirm;
mod channel;
mod chunker;
mod cli;
mod config;
mod engine;
mod error;
mod executor;
mod history;
mod repl;
mod session;

use anyhow::Result;
use clap::Parser;
use tracing::{debug, info};

use crate::channel::HttpChannel;
use crate::cli::{Cli, Commands, ConfigArgs};
use crate::config::Config;
use crate::engine::{ExchangeEnd, MediationEngine};
use crate::executor::ShellExecutor;
use crate::history::HistoryLog;
use crate::repl::Repl;
use crate::session::Session;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        eprintln!("\n💥 Unexpected error, shellmate has to stop: {err:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    if let Some(Commands::Config(args)) = &cli.command {
        return handle_config(args.clone());
    }

    let mut config = Config::load()?;
    config.apply_env()?;
    if let Some(session_id) = &cli.session_id {
        config.session_id = Some(session_id.clone());
    }
    if let Some(history_file) = &cli.history_file {
        config.history_file = Some(history_file.clone());
    }

    init_tracing(cli.verbose, config.debug_enabled());

    let endpoint = config.endpoint()?;
    let session = if cli.no_session {
        None
    } else {
        Some(Session::resolve(config.session_id.as_deref()))
    };
    match &session {
        Some(session) => debug!(session_id = session.id(), "using session"),
        None => debug!("session scoping disabled"),
    }
    info!(url = %endpoint.url, "AI endpoint configured");

    let channel = HttpChannel::new(endpoint, session, config.request_timeout())?;
    let executor = ShellExecutor::new(config.command_timeout());
    let engine = MediationEngine::new(channel, executor);
    let mut repl = Repl::new(engine, HistoryLog::new(config.history_path()))?;

    if let Some(message) = cli.message {
        match repl.run_once(&message).await? {
            Some(ExchangeEnd::Answered(answer)) => {
                debug!(chars = answer.chars().count(), "one-shot exchange answered")
            }
            Some(ExchangeEnd::Declined) => debug!("one-shot command declined"),
            Some(ExchangeEnd::Aborted(err)) => debug!(error = %err, "one-shot exchange aborted"),
            None => debug!("one-shot message handled locally"),
        }
        return Ok(());
    }

    repl.run().await
}

fn init_tracing(verbose: u8, debug_mode: bool) {
    let mut env_filter =
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into());

    let crate_level = match (verbose, debug_mode) {
        (0, false) => None,
        (0 | 1, _) => Some("shellmate=debug"),
        _ => Some("shellmate=trace"),
    };
    if let Some(directive) = crate_level {
        if let Ok(parsed) = directive.parse() {
            env_filter = env_filter.add_directive(parsed);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

fn handle_config(args: ConfigArgs) -> Result<()> {
    let ConfigArgs { init, show } = args;

    if init || !show {
        Config::interactive_setup()?;
        return Ok(());
    }

    let path = Config::config_path()?;
    let mut config = Config::load()?;
    config.apply_env()?;

    println!("Configuration file: {}", path.display());
    println!();
    match config.endpoint() {
        Ok(endpoint) => {
            println!("✓ Endpoint: {}", endpoint.url);
            match endpoint.credentials {
                Some(credentials) => println!("✓ Basic auth: {} (password hidden)", credentials.username),
                None => println!("✗ Basic auth: not configured"),
            }
        }
        Err(err) => println!("✗ Endpoint: {err}"),
    }
    match config.session_id.as_deref() {
        Some(id) => println!("✓ Session: {id}"),
        None => println!("✗ Session: a new one is generated per run"),
    }
    println!("  Request timeout: {}s", config.request_timeout().as_secs());
    println!("  Command timeout: {}s", config.command_timeout().as_secs());
    println!("  History file: {}", config.history_path().display());
    println!();
    println!("Run 'shellmate config --init' to change these settings");

    Ok(())
}

