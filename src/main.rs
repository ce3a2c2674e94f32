//! # Questline
//!
//! A quest-driven tracker for personal projects with a daily-planner TUI.
//!
//! ## Key Features
//!
//! - **Three-Level Hierarchy**: Projects contain Quests, Quests contain Tasks,
//!   with completion percentages rolled up the tree.
//! - **Daily Planner**: the dashboard orders active quests by priority and
//!   soonest deadline so the next thing to do is always on top.
//! - **In-Place Forms**: create and edit projects, quests, and tasks without
//!   leaving the terminal, with inline validation.
//! - **Local File Storage**: one JSON file (`quests.json`) in the working
//!   directory, written in the background after every change.
//! - **Scriptable CLI**: `list`, `plan`, `add`, and quest lifecycle commands
//!   alongside the interactive UI.
//!
//! ## Quick Start
//!
//! ```bash
//! # Launch the TUI (also the default with no subcommand)
//! ql ui
//!
//! # Add a quest from the shell
//! ql add "Plant the garden" --priority 7 --deadline "in 2w"
//!
//! # Print today's plan
//! ql plan
//!
//! # Retire a finished quest
//! ql complete "Plant the garden"
//! ```
//!
//! Data lives in `./quests.json`; pass `--db <path>` to keep it elsewhere.

use std::path::PathBuf;

use clap::Parser;

pub mod cli;
pub mod cmd;
pub mod db;
pub mod model;
pub mod plan;
pub mod tui {
    pub mod app;
    pub mod colors;
    pub mod enums;
    pub mod form;
    pub mod input;
    pub mod run;
    pub mod utils;
}

use cli::Cli;
use cmd::*;
use db::{Database, DATA_FILE};
use model::QuestState;

fn main() {
    let cli = Cli::parse();
    let db_path = cli.db.unwrap_or_else(|| PathBuf::from(DATA_FILE));

    // UI and completions manage their own I/O; everything else loads the
    // tree up front.
    let command = cli.command.unwrap_or(Commands::Ui);
    match command {
        Commands::Ui => {
            cmd_ui(&db_path);
            return;
        }
        Commands::Completions { shell } => {
            cmd_completions(shell);
            return;
        }
        _ => {}
    }

    let mut db = match Database::load(&db_path) {
        Ok(db) => db,
        Err(e) => {
            eprintln!("Failed to load {}: {e}", db_path.display());
            std::process::exit(1);
        }
    };

    match command {
        Commands::Ui | Commands::Completions { .. } => unreachable!("handled above"),

        Commands::List => cmd_list(&db),

        Commands::Plan { project } => cmd_plan(&db, project),

        Commands::Add {
            title,
            project,
            desc,
            priority,
            deadline,
        } => cmd_add(&mut db, &db_path, title, project, desc, priority, deadline),

        Commands::Complete { quest } => {
            cmd_set_state(&mut db, &db_path, &quest, QuestState::Completed)
        }

        Commands::Cancel { quest } => {
            cmd_set_state(&mut db, &db_path, &quest, QuestState::Cancelled)
        }

        Commands::Reactivate { quest } => {
            cmd_set_state(&mut db, &db_path, &quest, QuestState::Active)
        }
    }
}
