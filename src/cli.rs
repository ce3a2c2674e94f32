use std::path::PathBuf;

use clap::Parser;

use crate::cmd::Commands;

/// Quest-driven project tracker.
/// Storage defaults to ./quests.json or a path passed via --db.
#[derive(Parser)]
#[command(name = "ql", version, about = "Quest-driven project tracker")]
pub struct Cli {
    /// Path to the JSON data file.
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Defaults to `ui` when omitted.
    #[command(subcommand)]
    pub command: Option<Commands>,
}
