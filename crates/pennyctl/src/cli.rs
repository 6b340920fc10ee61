//! Command-line argument parsing
//!
//! Keeps argument parsing separate from execution logic.

use clap::{Parser, Subcommand};

/// Penny Assistant REPL
#[derive(Parser)]
#[command(name = "pennyctl")]
#[command(about = "Penny - conversational budgeting assistant", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Workspace id (conversation histories are scoped per workspace)
    #[arg(long, global = true, default_value = "default")]
    pub workspace: String,

    /// Reply persona: coach, analyst or deadpan
    #[arg(long, global = true)]
    pub persona: Option<String>,

    /// Session seed for reply variant selection
    #[arg(long, global = true)]
    pub seed: Option<u64>,

    /// Path to a TOML config file
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Verbose tracing output
    #[arg(long, global = true)]
    pub debug: bool,

    /// Subcommand (if not provided, starts the interactive REPL)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Ask a single question and exit
    Ask {
        /// The question, as you would type it in the REPL
        text: Vec<String>,
    },
}
