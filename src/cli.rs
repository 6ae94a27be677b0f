use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "xfilter", about = "Filter and re-rank a feed snapshot", version)]
pub struct Args {
    /// Directory holding config.yaml (defaults to ~/.config/xfilter)
    #[arg(long, global = true)]
    pub config_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one pipeline pass over an HTML feed snapshot
    Run {
        /// Path to the snapshot
        feed: PathBuf,

        /// Optional JSON settings update applied after the first pass,
        /// the way the live settings surface would push it
        #[arg(long)]
        update: Option<PathBuf>,
    },

    /// Load the embedding model and report what it binds to
    CheckModel {},
}
