//! Command-line interface for stagecue
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// Streaming voice agent for a speaking character
#[derive(Parser, Debug)]
#[command(name = "stagecue", version, about = "Streaming voice agent for a speaking character")]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose logging (-v: debug, -vv: trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Connect to the stage server and answer user input
    Run {
        /// Server address (e.g. localhost:8000, https://stage.example.com)
        #[arg(long, value_name = "URL")]
        server: Option<String>,

        /// Agent name used in the endpoint path
        #[arg(long, value_name = "NAME")]
        name: Option<String>,
    },

    /// Chat in the terminal: each stdin line is one user input
    Chat {
        /// Disable colored output
        #[arg(long)]
        no_color: bool,
    },

    /// Segment stdin text into speakable sentences and tags (JSON lines)
    Segment {
        /// Override boundary characters
        #[arg(long, value_name = "CHARS")]
        boundaries: Option<String>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print the configuration file path
    Path,
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
