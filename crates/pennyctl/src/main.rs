//! Penny REPL - interactive host for the Penny resolution engine.

mod cli;
mod config;
mod ledger;
mod parser;
mod repl;

use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{bail, Result};
use clap::Parser;
use owo_colors::OwoColorize;
use tracing_subscriber::EnvFilter;

use penny_common::PersonaId;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    let default_filter = if cli.debug { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = config::Config::load_or_default(cli.config.as_deref())?;

    let persona_name = cli
        .persona
        .or(config.persona)
        .unwrap_or_else(|| "coach".to_string());
    let Some(persona) = PersonaId::parse(&persona_name) else {
        bail!("unknown persona '{}', expected coach, analyst or deadpan", persona_name);
    };

    let seed = cli
        .seed
        .or(config.session_seed)
        .unwrap_or_else(session_seed_from_clock);

    let workspace = match (cli.workspace.as_str(), config.workspace) {
        ("default", Some(from_config)) => from_config,
        _ => cli.workspace,
    };

    eprintln!(
        "{} workspace={} persona={} seed={}",
        "penny".bold(),
        workspace,
        persona.as_str(),
        seed
    );

    let mut repl = repl::Repl::new(workspace, persona, seed);
    match cli.command {
        Some(cli::Commands::Ask { text }) => {
            let prompt = text.join(" ");
            if prompt.trim().is_empty() {
                bail!("nothing to ask");
            }
            repl.ask(&prompt);
            Ok(())
        }
        None => repl.run(),
    }
}

/// One seed per session; replies vary between sessions but stay stable
/// within one.
fn session_seed_from_clock() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
