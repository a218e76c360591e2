//! CLI module for photofeed
//!
//! One-shot subcommands for each screen plus an interactive shell that keeps
//! the screens alive between commands.

mod commands;
mod output;
mod shell;

use clap::{Parser, Subcommand};

pub use output::OutputFormat;

/// Photofeed - paginated photo feed with permissioned downloads
#[derive(Parser, Debug)]
#[command(name = "photofeed")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Output format
    #[command(flatten)]
    pub output: OutputOptions,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Output formatting options
#[derive(Parser, Debug, Clone)]
pub struct OutputOptions {
    /// Output in JSON format (for machine parsing)
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

impl OutputOptions {
    pub fn format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Browse the product feed
    Feed {
        #[command(subcommand)]
        command: commands::feed::FeedCommands,
    },

    /// Download an image through the storage permission gate
    Download {
        /// Image URL
        url: String,

        /// Identifier used for the file name (image-<id>.jpg)
        id: String,
    },

    /// Pick an image from the gallery or camera
    Pick {
        #[command(subcommand)]
        command: commands::pick::PickCommands,
    },

    /// Show a notification
    Notify {
        /// Notification body
        message: String,

        /// Notification title
        #[arg(long, default_value = "Notification")]
        title: String,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        command: commands::config::ConfigCommands,
    },

    /// Diagnostics and debugging
    Diag {
        #[command(subcommand)]
        command: commands::diag::DiagCommands,
    },

    /// Start the interactive shell (default)
    Shell,
}

/// Run the CLI with parsed arguments
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let format = cli.output.format();
    let quiet = cli.output.quiet;

    match cli.command.unwrap_or(Commands::Shell) {
        Commands::Feed { command } => commands::feed::run(command, format, quiet).await,
        Commands::Download { url, id } => commands::download::run(&url, &id, format, quiet).await,
        Commands::Pick { command } => commands::pick::run(command, format, quiet).await,
        Commands::Notify { message, title } => {
            commands::notify::run(&title, &message, format, quiet).await
        }
        Commands::Config { command } => commands::config::run(command, format, quiet).await,
        Commands::Diag { command } => commands::diag::run(command, format, quiet).await,
        Commands::Shell => shell::run().await,
    }
}
