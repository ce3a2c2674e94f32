//! Tree storage, CRUD operations, and JSON persistence.
//!
//! The `Database` owns the full Project → Quest → Task tree and is the only
//! way entities enter, change, or leave it. Index-taking operations treat an
//! out-of-range index as a silent no-op: the navigation layer validates
//! indices before calling, and a stale index after a delete must never crash.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use chrono::{Duration, Local, NaiveDate};
use thiserror::Error;

use crate::model::{generate_id, Project, Quest, QuestState, Task};

/// Default data file, kept in the working directory.
pub const DATA_FILE: &str = "quests.json";

/// Failure reading or writing the persisted tree.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to read or write data file: {0}")]
    Io(#[from] std::io::Error),
    #[error("data file is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// In-memory tree of projects, the unit of persistence.
#[derive(Debug, Default, Clone)]
pub struct Database {
    pub projects: Vec<Project>,
}

impl Database {
    /// Load the tree from a JSON file.
    ///
    /// A missing file yields an empty tree; any other read or parse failure
    /// propagates. All progress values are recomputed after loading so a
    /// hand-edited file cannot carry stale percentages.
    pub fn load(path: &Path) -> Result<Self, PersistenceError> {
        if !path.exists() {
            return Ok(Database::default());
        }
        let data = fs::read_to_string(path)?;
        let mut db = Database {
            projects: serde_json::from_str(&data)?,
        };
        db.recalculate_all();
        Ok(db)
    }

    /// Save the tree as indented JSON using a temp-file + rename write.
    pub fn save(&self, path: &Path) -> Result<(), PersistenceError> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }
        let data = serde_json::to_string_pretty(&self.projects)?;
        let tmp = path.with_extension("json.tmp");
        let mut f = File::create(&tmp)?;
        f.write_all(data.as_bytes())?;
        f.flush()?;
        fs::rename(tmp, path)?;
        Ok(())
    }

    /// Recompute every quest and project progress value.
    pub fn recalculate_all(&mut self) {
        for project in &mut self.projects {
            for quest in &mut project.quests {
                quest.recalculate_progress();
            }
            project.recalculate_progress();
        }
    }

    /// Append a new project with a freshly generated id.
    pub fn create_project(&mut self, name: &str) -> &Project {
        self.projects.push(Project {
            id: generate_id(),
            name: name.to_string(),
            quests: Vec::new(),
            progress: 0.0,
        });
        self.projects.last().expect("just pushed")
    }

    /// Rename an existing project.
    pub fn update_project(&mut self, index: usize, name: &str) {
        if let Some(project) = self.projects.get_mut(index) {
            project.name = name.to_string();
        }
    }

    /// Remove a project and everything under it, preserving sibling order.
    pub fn delete_project(&mut self, index: usize) {
        if index < self.projects.len() {
            self.projects.remove(index);
        }
    }

    /// Append a new quest to a project. Returns `None` when the parent
    /// index is out of range.
    pub fn create_quest(
        &mut self,
        project_idx: usize,
        title: &str,
        description: &str,
        priority: i32,
        deadline: Option<NaiveDate>,
    ) -> Option<&Quest> {
        let project = self.projects.get_mut(project_idx)?;
        project.quests.push(Quest {
            id: generate_id(),
            title: title.to_string(),
            description: description.to_string(),
            tasks: Vec::new(),
            progress: 0.0,
            priority,
            deadline,
            state: QuestState::Active,
        });
        project.recalculate_progress();
        project.quests.last()
    }

    /// Replace the mutable fields of a quest.
    pub fn update_quest(
        &mut self,
        project_idx: usize,
        quest_idx: usize,
        title: &str,
        description: &str,
        priority: i32,
        deadline: Option<NaiveDate>,
    ) {
        if let Some(quest) = self
            .projects
            .get_mut(project_idx)
            .and_then(|p| p.quests.get_mut(quest_idx))
        {
            quest.title = title.to_string();
            quest.description = description.to_string();
            quest.priority = priority;
            quest.deadline = deadline;
            quest.recalculate_progress();
        }
    }

    /// Move a quest through its lifecycle.
    pub fn set_quest_state(&mut self, project_idx: usize, quest_idx: usize, state: QuestState) {
        if let Some(quest) = self
            .projects
            .get_mut(project_idx)
            .and_then(|p| p.quests.get_mut(quest_idx))
        {
            quest.state = state;
        }
    }

    /// Remove a quest and its tasks, preserving sibling order.
    pub fn delete_quest(&mut self, project_idx: usize, quest_idx: usize) {
        if let Some(project) = self.projects.get_mut(project_idx) {
            if quest_idx < project.quests.len() {
                project.quests.remove(quest_idx);
                project.recalculate_progress();
            }
        }
    }

    /// Append a new task to a quest. Returns `None` when either parent
    /// index is out of range.
    pub fn create_task(
        &mut self,
        project_idx: usize,
        quest_idx: usize,
        description: &str,
    ) -> Option<&Task> {
        let project = self.projects.get_mut(project_idx)?;
        let quest = project.quests.get_mut(quest_idx)?;
        quest.tasks.push(Task {
            id: generate_id(),
            description: description.to_string(),
            done: false,
        });
        quest.recalculate_progress();
        project.recalculate_progress();
        project.quests[quest_idx].tasks.last()
    }

    /// Replace a task's description.
    pub fn update_task(
        &mut self,
        project_idx: usize,
        quest_idx: usize,
        task_idx: usize,
        description: &str,
    ) {
        if let Some(project) = self.projects.get_mut(project_idx) {
            if let Some(quest) = project.quests.get_mut(quest_idx) {
                if let Some(task) = quest.tasks.get_mut(task_idx) {
                    task.description = description.to_string();
                    quest.recalculate_progress();
                    project.recalculate_progress();
                }
            }
        }
    }

    /// Remove a task, preserving sibling order.
    pub fn delete_task(&mut self, project_idx: usize, quest_idx: usize, task_idx: usize) {
        if let Some(project) = self.projects.get_mut(project_idx) {
            if let Some(quest) = project.quests.get_mut(quest_idx) {
                if task_idx < quest.tasks.len() {
                    quest.tasks.remove(task_idx);
                    quest.recalculate_progress();
                    project.recalculate_progress();
                }
            }
        }
    }

    /// Flip a task's done flag and recompute ancestor progress.
    pub fn toggle_task(&mut self, project_idx: usize, quest_idx: usize, task_idx: usize) {
        if let Some(project) = self.projects.get_mut(project_idx) {
            if let Some(quest) = project.quests.get_mut(quest_idx) {
                if let Some(task) = quest.tasks.get_mut(task_idx) {
                    task.done = !task.done;
                    quest.recalculate_progress();
                    project.recalculate_progress();
                }
            }
        }
    }

    /// Resolve a quest id to its (project index, quest index) coordinates.
    ///
    /// Planner rows carry identity, not position; this is how they map back
    /// onto the tree after it may have been mutated.
    pub fn find_quest(&self, quest_id: &str) -> Option<(usize, usize)> {
        for (p_idx, project) in self.projects.iter().enumerate() {
            for (q_idx, quest) in project.quests.iter().enumerate() {
                if quest.id == quest_id {
                    return Some((p_idx, q_idx));
                }
            }
        }
        None
    }
}

/// Resolve a quest identifier (either id or exact title, case-insensitive)
/// to tree coordinates. Ambiguous titles are an error that points the user
/// at the id instead.
pub fn resolve_quest_identifier(db: &Database, identifier: &str) -> Result<(usize, usize), String> {
    if let Some(coords) = db.find_quest(identifier) {
        return Ok(coords);
    }

    let wanted = identifier.to_lowercase();
    let matches: Vec<(usize, usize)> = db
        .projects
        .iter()
        .enumerate()
        .flat_map(|(p_idx, project)| {
            project
                .quests
                .iter()
                .enumerate()
                .filter(|(_, quest)| quest.title.to_lowercase() == wanted)
                .map(move |(q_idx, _)| (p_idx, q_idx))
        })
        .collect();

    match matches.len() {
        0 => Err(format!("no quest found matching '{identifier}'")),
        1 => Ok(matches[0]),
        _ => Err(format!(
            "multiple quests titled '{identifier}'; use the quest id instead"
        )),
    }
}

/// Parse human-friendly deadline input for the CLI.
///
/// Supports "today", "tomorrow", "in Nd", "in Nw", and `YYYY-MM-DD`.
/// The TUI form accepts only the ISO format.
pub fn parse_deadline_input(s: &str) -> Option<NaiveDate> {
    let s = s.trim().to_lowercase();
    let today = Local::now().date_naive();

    match s.as_str() {
        "today" => return Some(today),
        "tomorrow" => return Some(today + Duration::days(1)),
        _ => {}
    }

    if let Some(rest) = s.strip_prefix("in ") {
        if let Some(nd) = rest.strip_suffix('d') {
            if let Ok(days) = nd.trim().parse::<i64>() {
                return Some(today + Duration::days(days));
            }
        }
        if let Some(nw) = rest.strip_suffix('w') {
            if let Ok(weeks) = nw.trim().parse::<i64>() {
                return Some(today + Duration::weeks(weeks));
            }
        }
    }

    NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()
}

/// Format a deadline relative to today ("today", "tomorrow", "in 3d", "2d late").
pub fn format_deadline_relative(deadline: Option<NaiveDate>, today: NaiveDate) -> String {
    match deadline {
        None => "-".into(),
        Some(d) => {
            let days = (d - today).num_days();
            match days {
                0 => "today".into(),
                1 => "tomorrow".into(),
                n if n > 1 => format!("in {n}d"),
                n => format!("{}d late", -n),
            }
        }
    }
}

/// Format a quest state for display.
pub fn format_state(s: QuestState) -> &'static str {
    match s {
        QuestState::Active => "Active",
        QuestState::Completed => "Completed",
        QuestState::Cancelled => "Cancelled",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_db() -> Database {
        let mut db = Database::default();
        db.create_project("Home");
        db.create_project("Work");
        db.create_quest(0, "Garden", "Spring planting", 5, None);
        db.create_quest(
            0,
            "Garage",
            "Clear it out",
            2,
            NaiveDate::from_ymd_opt(2026, 9, 1),
        );
        db.create_quest(1, "Launch", "Ship v1", 9, None);
        db.create_task(0, 0, "Buy seeds");
        db.create_task(0, 0, "Prepare beds");
        db.create_task(0, 1, "Sort shelves");
        db
    }

    #[test]
    fn create_quest_with_stale_parent_index_is_a_no_op() {
        let mut db = sample_db();
        assert!(db.create_quest(99, "Ghost", "", 0, None).is_none());
        assert!(db.create_task(0, 99, "Ghost").is_none());
        assert_eq!(db.projects[0].quests.len(), 2);
    }

    #[test]
    fn update_with_stale_index_is_a_no_op() {
        let mut db = sample_db();
        let before = db.clone();
        db.update_project(99, "Ghost");
        db.update_quest(0, 99, "Ghost", "", 0, None);
        db.update_task(0, 0, 99, "Ghost");
        db.delete_task(0, 0, 99);
        assert_eq!(before.projects, db.projects);
    }

    #[test]
    fn delete_project_cascades_and_invalidates_lookups() {
        let mut db = sample_db();
        let garden_id = db.projects[0].quests[0].id.clone();
        let garage_id = db.projects[0].quests[1].id.clone();

        db.delete_project(0);

        assert_eq!(db.projects.len(), 1);
        assert_eq!(db.projects[0].name, "Work");
        assert_eq!(db.find_quest(&garden_id), None);
        assert_eq!(db.find_quest(&garage_id), None);
    }

    #[test]
    fn delete_quest_preserves_sibling_order() {
        let mut db = sample_db();
        db.create_quest(0, "Attic", "", 1, None);
        db.delete_quest(0, 1);
        let titles: Vec<&str> = db.projects[0].quests.iter().map(|q| q.title.as_str()).collect();
        assert_eq!(titles, vec!["Garden", "Attic"]);
    }

    #[test]
    fn toggling_a_task_updates_ancestor_progress() {
        let mut db = sample_db();
        db.toggle_task(0, 0, 0);
        assert_eq!(db.projects[0].quests[0].progress, 50.0);
        // Garden at 50%, Garage at 0% -> project mean 25%.
        assert_eq!(db.projects[0].progress, 25.0);

        db.toggle_task(0, 0, 0);
        assert_eq!(db.projects[0].quests[0].progress, 0.0);
        assert_eq!(db.projects[0].progress, 0.0);
    }

    #[test]
    fn find_quest_resolves_coordinates() {
        let db = sample_db();
        let launch_id = db.projects[1].quests[0].id.clone();
        assert_eq!(db.find_quest(&launch_id), Some((1, 0)));
        assert_eq!(db.find_quest("no-such-id"), None);
    }

    #[test]
    fn quest_identifier_resolves_by_id_or_title() {
        let mut db = sample_db();
        db.create_quest(1, "garden", "duplicate name elsewhere", 1, None);
        let launch_id = db.projects[1].quests[0].id.clone();

        assert_eq!(resolve_quest_identifier(&db, &launch_id), Ok((1, 0)));
        assert_eq!(resolve_quest_identifier(&db, "Launch"), Ok((1, 0)));
        assert!(resolve_quest_identifier(&db, "nothing").is_err());
        // "Garden" now matches quests in two projects.
        assert!(resolve_quest_identifier(&db, "Garden").is_err());
    }

    #[test]
    fn load_of_missing_file_yields_empty_tree() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::load(&dir.path().join("quests.json")).unwrap();
        assert!(db.projects.is_empty());
    }

    #[test]
    fn load_of_garbage_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quests.json");
        fs::write(&path, "not json").unwrap();
        assert!(matches!(
            Database::load(&path),
            Err(PersistenceError::Parse(_))
        ));
    }

    #[test]
    fn save_then_load_round_trips_the_tree() {
        let mut db = sample_db();
        db.toggle_task(0, 0, 1);
        db.set_quest_state(1, 0, QuestState::Completed);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("quests.json");
        db.save(&path).unwrap();

        let loaded = Database::load(&path).unwrap();
        assert_eq!(db.projects, loaded.projects);

        // State persists as its integer code, deadline as nullable ISO date.
        let raw = fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value[1]["Quests"][0]["State"], 1);
        assert_eq!(value[0]["Quests"][0]["Deadline"], serde_json::Value::Null);
        assert_eq!(value[0]["Quests"][1]["Deadline"], "2026-09-01");
    }

    #[test]
    fn parse_deadline_input_accepts_iso_and_relative_forms() {
        let today = Local::now().date_naive();
        assert_eq!(parse_deadline_input("today"), Some(today));
        assert_eq!(parse_deadline_input("in 3d"), Some(today + Duration::days(3)));
        assert_eq!(parse_deadline_input("in 2w"), Some(today + Duration::weeks(2)));
        assert_eq!(
            parse_deadline_input("2026-01-15"),
            NaiveDate::from_ymd_opt(2026, 1, 15)
        );
        assert_eq!(parse_deadline_input("someday"), None);
    }

    #[test]
    fn format_deadline_relative_covers_each_bucket() {
        let today = NaiveDate::from_ymd_opt(2026, 8, 6).unwrap();
        assert_eq!(format_deadline_relative(None, today), "-");
        assert_eq!(format_deadline_relative(Some(today), today), "today");
        assert_eq!(
            format_deadline_relative(today.succ_opt(), today),
            "tomorrow"
        );
        assert_eq!(
            format_deadline_relative(NaiveDate::from_ymd_opt(2026, 8, 11), today),
            "in 5d"
        );
        assert_eq!(
            format_deadline_relative(NaiveDate::from_ymd_opt(2026, 8, 4), today),
            "2d late"
        );
    }
}
