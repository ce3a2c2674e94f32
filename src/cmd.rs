//! Command implementations for the CLI interface.
//!
//! The TUI is the primary surface; these handlers cover the scriptable
//! operations: printing the tree, printing today's plan, adding a quest,
//! and moving quests through their lifecycle.

use std::path::Path;

use chrono::Local;
use clap::Subcommand;
use clap_complete::{generate, Shell};

use crate::db::{
    format_deadline_relative, format_state, parse_deadline_input, resolve_quest_identifier,
    Database,
};
use crate::model::QuestState;
use crate::plan::{plan, PlanScope};
use crate::tui::run::run_tui;

#[derive(Subcommand)]
pub enum Commands {
    /// Launch the terminal user interface (the default).
    Ui,
    /// Print the full project/quest/task tree.
    List,
    /// Print today's plan: active quests by priority, then soonest deadline.
    Plan {
        /// Restrict the plan to one project (1-based index).
        #[arg(long)]
        project: Option<usize>,
    },
    /// Add a quest to a project.
    Add {
        /// Quest title.
        title: String,
        /// Project the quest belongs to (1-based index).
        #[arg(long, default_value_t = 1)]
        project: usize,
        /// Longer description.
        #[arg(long)]
        desc: Option<String>,
        /// Priority, higher is more important.
        #[arg(long, default_value_t = 0)]
        priority: i32,
        /// Deadline: YYYY-MM-DD, "today", "tomorrow", "in 3d", "in 2w".
        #[arg(long)]
        deadline: Option<String>,
    },
    /// Mark a quest completed (by id or exact title).
    Complete { quest: String },
    /// Cancel a quest (by id or exact title).
    Cancel { quest: String },
    /// Reactivate a completed or cancelled quest.
    Reactivate { quest: String },
    /// Generate shell completion scripts.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Launch the terminal user interface.
pub fn cmd_ui(db_path: &Path) {
    if let Err(e) = run_tui(db_path) {
        eprintln!("UI error: {e}");
        std::process::exit(1);
    }
}

/// Print the full tree, one indented line per entity.
pub fn cmd_list(db: &Database) {
    if db.projects.is_empty() {
        println!("No projects yet. Run `ql ui` to create one.");
        return;
    }
    let today = Local::now().date_naive();
    for project in &db.projects {
        println!("{} ({:.1}%)", project.name, project.progress);
        for quest in &project.quests {
            println!(
                "  [{}] {} ({:.1}%, priority {}, due {})",
                format_state(quest.state),
                quest.title,
                quest.progress,
                quest.priority,
                format_deadline_relative(quest.deadline, today)
            );
            for task in &quest.tasks {
                println!(
                    "    [{}] {}",
                    if task.done { "x" } else { " " },
                    task.description
                );
            }
        }
    }
}

/// Print today's plan as a table.
pub fn cmd_plan(db: &Database, project: Option<usize>) {
    let scope = match project {
        Some(0) => {
            eprintln!("Project index is 1-based.");
            std::process::exit(1);
        }
        Some(n) => {
            if n > db.projects.len() {
                eprintln!("No project at index {n}.");
                std::process::exit(1);
            }
            PlanScope::OneProject(n - 1)
        }
        None => PlanScope::AllProjects,
    };

    let quests = plan(&db.projects, scope);
    if quests.is_empty() {
        println!("No active quests.");
        return;
    }

    let today = Local::now().date_naive();
    println!("{:<32} {:<5} {:<10} {}", "Quest", "Pri", "Due", "Progress");
    for quest in quests {
        println!(
            "{:<32} {:<5} {:<10} {:>5.1}%",
            truncate(&quest.title, 32),
            quest.priority,
            format_deadline_relative(quest.deadline, today),
            quest.progress
        );
    }
}

/// Add a quest to a project and save.
pub fn cmd_add(
    db: &mut Database,
    db_path: &Path,
    title: String,
    project: usize,
    desc: Option<String>,
    priority: i32,
    deadline: Option<String>,
) {
    if project == 0 {
        eprintln!("Project index is 1-based.");
        std::process::exit(1);
    }
    let deadline = match deadline {
        Some(ref input) => match parse_deadline_input(input) {
            Some(d) => Some(d),
            None => {
                eprintln!("Could not parse deadline '{input}'.");
                std::process::exit(1);
            }
        },
        None => None,
    };

    let id = match db.create_quest(
        project - 1,
        title.trim(),
        desc.as_deref().unwrap_or("").trim(),
        priority,
        deadline,
    ) {
        Some(quest) => quest.id.clone(),
        None => {
            eprintln!("No project at index {project}.");
            std::process::exit(1);
        }
    };

    if let Err(e) = db.save(db_path) {
        eprintln!("Error saving: {e}");
        std::process::exit(1);
    }
    println!("Added quest {id}");
}

/// Move a quest to the given lifecycle state and save.
pub fn cmd_set_state(db: &mut Database, db_path: &Path, quest: &str, state: QuestState) {
    let (p_idx, q_idx) = match resolve_quest_identifier(db, quest) {
        Ok(coords) => coords,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };
    db.set_quest_state(p_idx, q_idx, state);
    if let Err(e) = db.save(db_path) {
        eprintln!("Error saving: {e}");
        std::process::exit(1);
    }
    println!(
        "Quest '{}' marked {}",
        db.projects[p_idx].quests[q_idx].title,
        format_state(state)
    );
}

/// Generate shell completion scripts.
pub fn cmd_completions(shell: Shell) {
    use clap::CommandFactory;

    use crate::cli::Cli;

    let mut app = Cli::command();
    let app_name = app.get_name().to_string();
    generate(shell, &mut app, app_name, &mut std::io::stdout());
}

/// Truncate a string to a maximum width, adding ellipsis if needed.
fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let mut out = String::new();
        for (i, ch) in s.chars().enumerate() {
            if i + 1 >= width {
                out.push('…');
                break;
            }
            out.push(ch);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_keeps_short_strings_and_clips_long_ones() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("exactly-10", 10), "exactly-10");
        assert_eq!(truncate("much too long for this", 10), "much too …");
    }
}
