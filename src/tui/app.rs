//! Main application logic for the terminal user interface.
//!
//! This module contains the `App` struct which owns the navigation state
//! machine: the current screen, selection context, active form, and the
//! delete-confirmation overlay. One key event is fully processed before the
//! next is read; saves run on background threads and report back through a
//! channel drained by the event loop.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;

use chrono::Local;
use crossterm::event::{self, Event, KeyCode, KeyModifiers};
use ratatui::{
    backend::Backend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame, Terminal,
};

use crate::db::{format_deadline_relative, format_state, Database, PersistenceError};
use crate::model::{Quest, QuestState};
use crate::plan::{plan, PlanScope};
use crate::tui::{
    colors::{DARK_RED, DEEP_PURPLE, GOLD, RASPBERRY},
    enums::{DeleteTarget, View},
    form::{Form, FormMode, FormOutput},
    utils::centered_rect,
};

/// Outcome of a background save, delivered to the event loop.
type SaveOutcome = Result<(), String>;

/// Adjust a selection index after removing `deleted` from its collection.
///
/// Indices past the deleted one shift down; selecting the deleted index
/// clears the selection. This is the single reconciliation rule applied
/// after every delete, so no screen is left pointing at a shifted row.
pub fn reconcile_selection(selection: Option<usize>, deleted: usize) -> Option<usize> {
    match selection {
        Some(i) if i == deleted => None,
        Some(i) if i > deleted => Some(i - 1),
        other => other,
    }
}

fn clamp_index(i: usize, len: usize) -> usize {
    if len == 0 {
        0
    } else {
        i.min(len - 1)
    }
}

/// Main application state for the terminal user interface.
pub struct App {
    db: Database,
    db_path: PathBuf,
    view: View,
    /// Project scope: set by the startup chooser or project list, cleared
    /// when the scoped project is deleted.
    selected_project: Option<usize>,
    selected_quest: Option<usize>,
    /// Row the entity being edited sits at, captured when the form opens.
    editing_idx: Option<usize>,
    selection_cursor: usize,
    dashboard_cursor: usize,
    project_cursor: usize,
    task_cursor: usize,
    form: Option<Form>,
    pending_delete: Option<DeleteTarget>,
    status_message: String,
    show_help: bool,
    save_tx: Sender<SaveOutcome>,
    save_rx: Receiver<SaveOutcome>,
}

impl App {
    /// Load the tree from disk and build the initial state.
    pub fn new(db_path: &Path) -> Result<Self, PersistenceError> {
        let db = Database::load(db_path)?;
        Ok(Self::with_database(db, db_path))
    }

    /// Build the app around an already-loaded tree.
    ///
    /// More than one project lands on the startup chooser, exactly one on a
    /// dashboard scoped to it. An empty tree gets a default project,
    /// persisted immediately, and an unscoped dashboard.
    pub fn with_database(mut db: Database, db_path: &Path) -> Self {
        db.recalculate_all();

        let mut status_message = String::new();
        let (view, selected_project) = if db.projects.is_empty() {
            db.create_project("Sample Project");
            if let Err(e) = db.save(db_path) {
                status_message = format!("Save failed: {e}");
            }
            (View::Dashboard, None)
        } else if db.projects.len() == 1 {
            (View::Dashboard, Some(0))
        } else {
            (View::ProjectSelection, None)
        };

        let (save_tx, save_rx) = mpsc::channel();
        App {
            db,
            db_path: db_path.to_path_buf(),
            view,
            selected_project,
            selected_quest: None,
            editing_idx: None,
            selection_cursor: 0,
            dashboard_cursor: 0,
            project_cursor: 0,
            task_cursor: 0,
            form: None,
            pending_delete: None,
            status_message,
            show_help: false,
            save_tx,
            save_rx,
        }
    }

    /// Current screen, for transition checks.
    pub fn view(&self) -> View {
        self.view
    }

    /// Read access to the tree, for projections and tests.
    pub fn database(&self) -> &Database {
        &self.db
    }

    fn set_status(&mut self, msg: impl Into<String>) {
        self.status_message = msg.into();
    }

    fn dashboard_scope(&self) -> PlanScope {
        match self.selected_project {
            Some(idx) => PlanScope::OneProject(idx),
            None => PlanScope::AllProjects,
        }
    }

    fn current_quest(&self) -> Option<&Quest> {
        let p = self.selected_project?;
        let q = self.selected_quest?;
        self.db.projects.get(p)?.quests.get(q)
    }

    /// Dispatch a save of the current tree onto a background thread.
    ///
    /// Overlapping saves are tolerated: each writes a full snapshot, so the
    /// last write wins. Completion lands on the channel and is drained by
    /// the event loop.
    fn request_save(&self) {
        let snapshot = self.db.clone();
        let path = self.db_path.clone();
        let tx = self.save_tx.clone();
        thread::spawn(move || {
            let result = snapshot.save(&path).map_err(|e| e.to_string());
            let _ = tx.send(result);
        });
    }

    fn drain_save_outcomes(&mut self) {
        while let Ok(outcome) = self.save_rx.try_recv() {
            if let Err(e) = outcome {
                self.set_status(format!("Save failed: {e}"));
            }
        }
    }

    /// Clamp every cursor into range and drop selections whose target is
    /// gone. Called after any committed mutation.
    fn clamp_cursors(&mut self) {
        let n_projects = self.db.projects.len();
        self.selection_cursor = clamp_index(self.selection_cursor, n_projects);
        self.project_cursor = clamp_index(self.project_cursor, n_projects);

        if let Some(p) = self.selected_project {
            if p >= n_projects {
                self.selected_project = None;
                self.selected_quest = None;
            } else if let Some(q) = self.selected_quest {
                if q >= self.db.projects[p].quests.len() {
                    self.selected_quest = None;
                }
            }
        }

        let plan_len = plan(&self.db.projects, self.dashboard_scope()).len();
        self.dashboard_cursor = clamp_index(self.dashboard_cursor, plan_len);

        let n_tasks = self.current_quest().map(|q| q.tasks.len()).unwrap_or(0);
        self.task_cursor = clamp_index(self.task_cursor, n_tasks);
    }

    /// Handle one key event. Returns true when the application should quit.
    ///
    /// An active form or delete confirmation captures all input; otherwise
    /// global keys (quit, help) run before the per-screen dispatch.
    pub fn handle_key(&mut self, key: KeyCode, modifiers: KeyModifiers) -> bool {
        if self.form.is_some() {
            self.handle_form_key(key);
            return false;
        }
        if self.pending_delete.is_some() {
            self.handle_confirm_key(key);
            return false;
        }
        if self.show_help {
            // Any key closes the help overlay.
            self.show_help = false;
            return false;
        }

        match key {
            KeyCode::Char('q') => return true,
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => return true,
            KeyCode::Char('h') => {
                self.show_help = true;
                return false;
            }
            _ => {}
        }

        match self.view {
            View::ProjectSelection => self.handle_project_selection_key(key),
            View::Dashboard => self.handle_dashboard_key(key),
            View::ProjectList => self.handle_project_list_key(key),
            View::QuestDetail => self.handle_quest_detail_key(key),
            // Form views always carry an active form, handled above.
            View::CreateProject
            | View::EditProject
            | View::CreateQuest
            | View::EditQuest
            | View::CreateTask
            | View::EditTask => {}
        }
        false
    }

    fn handle_project_selection_key(&mut self, key: KeyCode) {
        match key {
            KeyCode::Up | KeyCode::Char('k') => {
                self.selection_cursor = self.selection_cursor.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.selection_cursor + 1 < self.db.projects.len() {
                    self.selection_cursor += 1;
                }
            }
            KeyCode::Enter => {
                if self.selection_cursor < self.db.projects.len() {
                    self.selected_project = Some(self.selection_cursor);
                    self.selected_quest = None;
                    self.view = View::Dashboard;
                    self.dashboard_cursor = 0;
                }
            }
            _ => {}
        }
    }

    fn handle_dashboard_key(&mut self, key: KeyCode) {
        let rows = plan(&self.db.projects, self.dashboard_scope());
        match key {
            KeyCode::Up | KeyCode::Char('k') => {
                self.dashboard_cursor = self.dashboard_cursor.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.dashboard_cursor + 1 < rows.len() {
                    self.dashboard_cursor += 1;
                }
            }
            KeyCode::Char('c') => {
                if self.selected_project.is_some() {
                    self.form = Some(Form::quest(FormMode::Create, None));
                    self.view = View::CreateQuest;
                } else {
                    self.form = Some(Form::project(FormMode::Create, ""));
                    self.view = View::CreateProject;
                }
            }
            KeyCode::Char('e') => {
                if let Some((p_idx, q_idx)) = self.resolve_dashboard_row(&rows) {
                    self.selected_project = Some(p_idx);
                    self.selected_quest = Some(q_idx);
                    let quest = &self.db.projects[p_idx].quests[q_idx];
                    self.form = Some(Form::quest(FormMode::Edit, Some(quest)));
                    self.view = View::EditQuest;
                }
            }
            KeyCode::Char('x') => {
                if let Some((p_idx, q_idx)) = self.resolve_dashboard_row(&rows) {
                    self.pending_delete = Some(DeleteTarget::Quest(p_idx, q_idx));
                }
            }
            KeyCode::Enter => {
                if let Some((p_idx, q_idx)) = self.resolve_dashboard_row(&rows) {
                    self.selected_project = Some(p_idx);
                    self.selected_quest = Some(q_idx);
                    self.task_cursor = 0;
                    self.view = View::QuestDetail;
                }
            }
            KeyCode::Char('p') => {
                self.view = View::ProjectList;
            }
            _ => {}
        }
    }

    /// Map the dashboard cursor back onto tree coordinates. Planner rows
    /// carry identity, not position, so this survives earlier mutations.
    fn resolve_dashboard_row(&self, rows: &[Quest]) -> Option<(usize, usize)> {
        rows.get(self.dashboard_cursor)
            .and_then(|quest| self.db.find_quest(&quest.id))
    }

    fn handle_project_list_key(&mut self, key: KeyCode) {
        match key {
            KeyCode::Up | KeyCode::Char('k') => {
                self.project_cursor = self.project_cursor.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.project_cursor + 1 < self.db.projects.len() {
                    self.project_cursor += 1;
                }
            }
            KeyCode::Enter => {
                if self.project_cursor < self.db.projects.len() {
                    self.selected_project = Some(self.project_cursor);
                    if self.db.projects[self.project_cursor].quests.is_empty() {
                        self.selected_quest = None;
                        self.view = View::Dashboard;
                        self.dashboard_cursor = 0;
                    } else {
                        self.selected_quest = Some(0);
                        self.task_cursor = 0;
                        self.view = View::QuestDetail;
                    }
                }
            }
            KeyCode::Char('c') => {
                if self.project_cursor < self.db.projects.len() {
                    self.selected_project = Some(self.project_cursor);
                    self.form = Some(Form::quest(FormMode::Create, None));
                    self.view = View::CreateQuest;
                } else {
                    self.form = Some(Form::project(FormMode::Create, ""));
                    self.view = View::CreateProject;
                }
            }
            KeyCode::Char('n') => {
                self.form = Some(Form::project(FormMode::Create, ""));
                self.view = View::CreateProject;
            }
            KeyCode::Char('e') => {
                if let Some(project) = self.db.projects.get(self.project_cursor) {
                    self.editing_idx = Some(self.project_cursor);
                    self.form = Some(Form::project(FormMode::Edit, &project.name));
                    self.view = View::EditProject;
                }
            }
            KeyCode::Char('x') => {
                if self.project_cursor < self.db.projects.len() {
                    self.pending_delete = Some(DeleteTarget::Project(self.project_cursor));
                }
            }
            KeyCode::Char('d') => {
                self.view = View::Dashboard;
            }
            _ => {}
        }
    }

    fn handle_quest_detail_key(&mut self, key: KeyCode) {
        let (Some(p_idx), Some(q_idx)) = (self.selected_project, self.selected_quest) else {
            self.view = View::Dashboard;
            return;
        };
        let n_tasks = self
            .db
            .projects
            .get(p_idx)
            .and_then(|p| p.quests.get(q_idx))
            .map(|q| q.tasks.len())
            .unwrap_or(0);

        match key {
            KeyCode::Up | KeyCode::Char('k') => {
                self.task_cursor = self.task_cursor.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.task_cursor + 1 < n_tasks {
                    self.task_cursor += 1;
                }
            }
            KeyCode::Enter | KeyCode::Char(' ') => {
                if self.task_cursor < n_tasks {
                    self.db.toggle_task(p_idx, q_idx, self.task_cursor);
                    self.request_save();
                }
            }
            KeyCode::Char('c') => {
                self.form = Some(Form::task(FormMode::Create, ""));
                self.view = View::CreateTask;
            }
            KeyCode::Char('e') => {
                if let Some(task) = self
                    .db
                    .projects
                    .get(p_idx)
                    .and_then(|p| p.quests.get(q_idx))
                    .and_then(|q| q.tasks.get(self.task_cursor))
                {
                    self.editing_idx = Some(self.task_cursor);
                    self.form = Some(Form::task(FormMode::Edit, &task.description));
                    self.view = View::EditTask;
                }
            }
            KeyCode::Char('x') => {
                if self.task_cursor < n_tasks {
                    self.pending_delete =
                        Some(DeleteTarget::Task(p_idx, q_idx, self.task_cursor));
                }
            }
            KeyCode::Char('s') => {
                if let Some(quest) = self.current_quest() {
                    let next = match quest.state {
                        QuestState::Active => QuestState::Completed,
                        QuestState::Completed => QuestState::Cancelled,
                        QuestState::Cancelled => QuestState::Active,
                    };
                    self.db.set_quest_state(p_idx, q_idx, next);
                    self.set_status(format!("Quest marked {}", format_state(next)));
                    // The planner's row set just changed.
                    self.clamp_cursors();
                    self.request_save();
                }
            }
            KeyCode::Char('d') => {
                self.view = View::Dashboard;
            }
            KeyCode::Char('p') => {
                self.view = View::ProjectList;
            }
            _ => {}
        }
    }

    fn handle_form_key(&mut self, key: KeyCode) {
        let Some(form) = self.form.as_mut() else {
            return;
        };
        match key {
            KeyCode::Esc => {
                self.form = None;
                self.editing_idx = None;
                self.view = self.view.form_return();
            }
            KeyCode::Tab | KeyCode::Down => form.next_field(),
            KeyCode::BackTab | KeyCode::Up => form.prev_field(),
            KeyCode::Left => form.handle_left_right(false),
            KeyCode::Right => form.handle_left_right(true),
            KeyCode::Backspace => form.handle_backspace(),
            KeyCode::Delete => form.handle_delete(),
            KeyCode::Enter => {
                if !form.on_last_field() {
                    form.next_field();
                } else {
                    match form.validate() {
                        Err(e) => form.error = Some(e),
                        Ok(output) => {
                            let mode = form.mode;
                            self.form = None;
                            self.commit_form(mode, output);
                        }
                    }
                }
            }
            KeyCode::Char(c) => form.handle_char(c),
            _ => {}
        }
    }

    /// Apply a validated form to the tree, return to the opening screen,
    /// and request persistence.
    fn commit_form(&mut self, mode: FormMode, output: FormOutput) {
        match output {
            FormOutput::Project { name } => match mode {
                FormMode::Create => {
                    self.db.create_project(&name);
                    self.set_status("Project created");
                }
                FormMode::Edit => {
                    if let Some(idx) = self.editing_idx {
                        self.db.update_project(idx, &name);
                    }
                    self.set_status("Project updated");
                }
            },
            FormOutput::Quest {
                title,
                description,
                priority,
                deadline,
            } => {
                if let Some(p_idx) = self.selected_project {
                    match mode {
                        FormMode::Create => {
                            self.db
                                .create_quest(p_idx, &title, &description, priority, deadline);
                            self.set_status("Quest created");
                        }
                        FormMode::Edit => {
                            if let Some(q_idx) = self.selected_quest {
                                self.db.update_quest(
                                    p_idx,
                                    q_idx,
                                    &title,
                                    &description,
                                    priority,
                                    deadline,
                                );
                            }
                            self.set_status("Quest updated");
                        }
                    }
                }
            }
            FormOutput::Task { description } => {
                if let (Some(p_idx), Some(q_idx)) = (self.selected_project, self.selected_quest) {
                    match mode {
                        FormMode::Create => {
                            self.db.create_task(p_idx, q_idx, &description);
                            self.set_status("Task created");
                        }
                        FormMode::Edit => {
                            if let Some(t_idx) = self.editing_idx {
                                self.db.update_task(p_idx, q_idx, t_idx, &description);
                            }
                            self.set_status("Task updated");
                        }
                    }
                }
            }
        }
        self.editing_idx = None;
        self.view = self.view.form_return();
        self.clamp_cursors();
        self.request_save();
    }

    fn handle_confirm_key(&mut self, key: KeyCode) {
        match key {
            KeyCode::Char('y') | KeyCode::Char('Y') => self.confirm_pending_delete(),
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                self.pending_delete = None;
            }
            _ => {}
        }
    }

    fn confirm_pending_delete(&mut self) {
        let Some(target) = self.pending_delete.take() else {
            return;
        };
        match target {
            DeleteTarget::Project(p_idx) => {
                self.db.delete_project(p_idx);
                self.selected_project = reconcile_selection(self.selected_project, p_idx);
                if self.selected_project.is_none() {
                    self.selected_quest = None;
                }
            }
            DeleteTarget::Quest(p_idx, q_idx) => {
                self.db.delete_quest(p_idx, q_idx);
                if self.selected_project == Some(p_idx) {
                    self.selected_quest = reconcile_selection(self.selected_quest, q_idx);
                }
            }
            DeleteTarget::Task(p_idx, q_idx, t_idx) => {
                self.db.delete_task(p_idx, q_idx, t_idx);
                self.task_cursor =
                    reconcile_selection(Some(self.task_cursor), t_idx).unwrap_or(t_idx);
            }
        }
        self.set_status(format!("Deleted {}", target.kind_label()));
        self.clamp_cursors();
        self.request_save();
    }

    // --- Screen projections ---

    /// One display line per project, shared by the chooser and the list.
    fn project_rows(&self) -> Vec<String> {
        self.db
            .projects
            .iter()
            .enumerate()
            .map(|(i, p)| {
                format!(
                    "{:2}. {} ({} quests, {:.1}%)",
                    i + 1,
                    p.name,
                    p.quests.len(),
                    p.progress
                )
            })
            .collect()
    }

    /// One display line per planned quest.
    fn dashboard_rows(&self) -> Vec<String> {
        let today = Local::now().date_naive();
        plan(&self.db.projects, self.dashboard_scope())
            .iter()
            .map(|q| {
                format!(
                    "{}: {:.1}% complete (priority {}, due {})",
                    q.title,
                    q.progress,
                    q.priority,
                    format_deadline_relative(q.deadline, today)
                )
            })
            .collect()
    }

    fn task_rows(&self) -> Vec<String> {
        self.current_quest()
            .map(|quest| {
                quest
                    .tasks
                    .iter()
                    .map(|t| format!("[{}] {}", if t.done { "✓" } else { " " }, t.description))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn delete_prompt(&self, target: DeleteTarget) -> String {
        let name = match target {
            DeleteTarget::Project(p) => self.db.projects.get(p).map(|p| p.name.clone()),
            DeleteTarget::Quest(p, q) => self
                .db
                .projects
                .get(p)
                .and_then(|pr| pr.quests.get(q))
                .map(|q| q.title.clone()),
            DeleteTarget::Task(p, q, t) => self
                .db
                .projects
                .get(p)
                .and_then(|pr| pr.quests.get(q))
                .and_then(|qu| qu.tasks.get(t))
                .map(|t| t.description.clone()),
        };
        format!(
            "Delete {} '{}'?",
            target.kind_label(),
            name.unwrap_or_default()
        )
    }

    // --- Rendering ---

    fn render_list_screen(
        &self,
        f: &mut Frame,
        area: Rect,
        title: &str,
        rows: &[String],
        cursor: usize,
        empty_message: &str,
    ) {
        let mut lines = vec![
            Line::from(Span::styled(
                format!(" {title} "),
                Style::default().bg(DEEP_PURPLE).fg(Color::White),
            )),
            Line::from(""),
        ];
        if rows.is_empty() {
            lines.push(Line::from(empty_message.to_string()));
        } else {
            for (i, row) in rows.iter().enumerate() {
                let line = if i == cursor {
                    Line::from(Span::styled(
                        row.clone(),
                        Style::default().bg(RASPBERRY).fg(Color::White),
                    ))
                } else {
                    Line::from(row.clone())
                };
                lines.push(line);
            }
        }
        let paragraph = Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL))
            .wrap(Wrap { trim: false });
        f.render_widget(paragraph, area);
    }

    fn render_dashboard(&self, f: &mut Frame, area: Rect) {
        let title = match self.selected_project.and_then(|i| self.db.projects.get(i)) {
            Some(p) => format!("Dashboard - {} - Today's Active Quests", p.name),
            None => "Dashboard - Today's Active Quests".to_string(),
        };
        self.render_list_screen(
            f,
            area,
            &title,
            &self.dashboard_rows(),
            self.dashboard_cursor,
            "No active quests! Press 'c' to create one.",
        );
    }

    fn render_quest_detail(&self, f: &mut Frame, area: Rect) {
        let Some(quest) = self.current_quest() else {
            let paragraph = Paragraph::new("No quest selected.")
                .block(Block::default().borders(Borders::ALL));
            f.render_widget(paragraph, area);
            return;
        };

        let mut lines = vec![
            Line::from(Span::styled(
                format!(" Quest: {} ", quest.title),
                Style::default().bg(DEEP_PURPLE).fg(Color::White),
            )),
            Line::from(quest.description.clone()),
            Line::from(""),
            Line::from(format!(
                "Progress: {:.1}% | Priority: {} | Status: {}",
                quest.progress,
                quest.priority,
                format_state(quest.state)
            )),
        ];
        if let Some(deadline) = quest.deadline {
            lines.push(Line::from(format!("Deadline: {deadline}")));
        }
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "Tasks",
            Style::default().add_modifier(Modifier::BOLD),
        )));

        let rows = self.task_rows();
        if rows.is_empty() {
            lines.push(Line::from("No tasks yet. Press 'c' to add one."));
        } else {
            for (i, row) in rows.iter().enumerate() {
                let line = if i == self.task_cursor {
                    Line::from(Span::styled(
                        row.clone(),
                        Style::default().bg(RASPBERRY).fg(Color::White),
                    ))
                } else {
                    Line::from(row.clone())
                };
                lines.push(line);
            }
        }

        let paragraph = Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL))
            .wrap(Wrap { trim: false });
        f.render_widget(paragraph, area);
    }

    fn render_form(&self, f: &mut Frame, area: Rect) {
        let Some(form) = &self.form else {
            return;
        };
        let labels = form.labels();
        let fields = form.fields();

        let mut constraints: Vec<Constraint> = vec![Constraint::Length(1)];
        constraints.extend(fields.iter().map(|_| Constraint::Length(3)));
        constraints.push(Constraint::Length(2)); // error line
        constraints.push(Constraint::Min(0));
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints(constraints)
            .split(area);

        let title = Paragraph::new(Span::styled(
            format!(" {} ", form.title()),
            Style::default().bg(DEEP_PURPLE).fg(Color::White),
        ));
        f.render_widget(title, chunks[0]);

        for (i, field) in fields.iter().enumerate() {
            let focused = i == form.focus;
            let border_style = if focused {
                Style::default().fg(GOLD)
            } else {
                Style::default()
            };
            let content = if field.value.is_empty() {
                Span::styled(field.placeholder, Style::default().fg(Color::DarkGray))
            } else {
                Span::raw(field.value.as_str())
            };
            let input = Paragraph::new(content).block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(labels[i])
                    .border_style(border_style),
            );
            f.render_widget(input, chunks[i + 1]);
            if focused {
                f.set_cursor_position((
                    chunks[i + 1].x + field.cursor as u16 + 1,
                    chunks[i + 1].y + 1,
                ));
            }
        }

        if let Some(error) = &form.error {
            let error_line = Paragraph::new(Span::styled(
                format!("Error: {error}"),
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            ));
            f.render_widget(error_line, chunks[fields.len() + 1]);
        }

        let instructions =
            Paragraph::new("Tab/Shift+Tab: fields  Enter: next/submit  Esc: cancel")
                .style(Style::default().fg(Color::DarkGray));
        f.render_widget(instructions, chunks[fields.len() + 2]);
    }

    fn render_confirm_popup(&self, f: &mut Frame, area: Rect) {
        let Some(target) = self.pending_delete else {
            return;
        };
        let popup = centered_rect(50, 20, area);
        f.render_widget(Clear, popup);
        let text = vec![
            Line::from(""),
            Line::from(self.delete_prompt(target)),
            Line::from(""),
            Line::from("This cannot be undone."),
            Line::from(""),
            Line::from("Press 'y' to confirm, 'n' to cancel"),
        ];
        let paragraph = Paragraph::new(text)
            .block(
                Block::default()
                    .title("Confirm Delete")
                    .borders(Borders::ALL)
                    .style(Style::default().bg(DARK_RED).fg(Color::White)),
            )
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });
        f.render_widget(paragraph, popup);
    }

    fn render_help(&self, f: &mut Frame, area: Rect) {
        let help_text = vec![
            Line::from(Span::styled(
                "Questline Help",
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from(Span::styled(
                "Lists:",
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from("  ↑/k, ↓/j     Move selection"),
            Line::from("  Enter        Open selected item"),
            Line::from("  c            Create (project, quest, or task by screen)"),
            Line::from("  n            New project (project list)"),
            Line::from("  e            Edit selected"),
            Line::from("  x            Delete selected (with confirmation)"),
            Line::from(""),
            Line::from(Span::styled(
                "Quest detail:",
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from("  Space/Enter  Toggle task done"),
            Line::from("  s            Cycle quest state (Active → Completed → Cancelled)"),
            Line::from(""),
            Line::from(Span::styled(
                "Navigation:",
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from("  d            Dashboard"),
            Line::from("  p            Project list"),
            Line::from(""),
            Line::from(Span::styled(
                "Forms:",
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from("  Tab/Shift+Tab  Next/previous field"),
            Line::from("  Enter          Next field, submit on the last"),
            Line::from("  Esc            Cancel"),
            Line::from(""),
            Line::from("  h toggles this help, q quits."),
        ];
        let paragraph = Paragraph::new(help_text)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title("Help - press any key to return"),
            )
            .wrap(Wrap { trim: true });
        f.render_widget(paragraph, area);
    }

    fn render_status_bar(&self, f: &mut Frame, area: Rect) {
        let text = if !self.status_message.is_empty() {
            self.status_message.clone()
        } else {
            match self.view {
                View::ProjectSelection => "Enter: open project | h: help | q: quit".to_string(),
                View::Dashboard => {
                    "c: create  e: edit  x: delete  Enter: open  p: projects  h: help  q: quit"
                        .to_string()
                }
                View::ProjectList => {
                    "c: create quest  n: new project  e: edit  x: delete  d: dashboard  h: help"
                        .to_string()
                }
                View::QuestDetail => {
                    "Space: toggle  c/e/x: task ops  s: quest state  d: dashboard  h: help"
                        .to_string()
                }
                View::CreateProject
                | View::EditProject
                | View::CreateQuest
                | View::EditQuest
                | View::CreateTask
                | View::EditTask => "Editing - Esc cancels".to_string(),
            }
        };
        let status = Paragraph::new(text)
            .style(Style::default().bg(DEEP_PURPLE).fg(Color::White))
            .alignment(Alignment::Left);
        f.render_widget(status, area);
    }

    /// Dispatch to the current screen's renderer, then lay overlays on top.
    fn render(&mut self, f: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(1)].as_ref())
            .split(f.area());

        if self.show_help {
            self.render_help(f, chunks[0]);
            self.render_status_bar(f, chunks[1]);
            return;
        }

        match self.view {
            View::ProjectSelection => self.render_list_screen(
                f,
                chunks[0],
                "Select Project to Work On",
                &self.project_rows(),
                self.selection_cursor,
                "No projects available.",
            ),
            View::Dashboard => self.render_dashboard(f, chunks[0]),
            View::ProjectList => self.render_list_screen(
                f,
                chunks[0],
                "Projects",
                &self.project_rows(),
                self.project_cursor,
                "No projects. Press 'c' to create one.",
            ),
            View::QuestDetail => self.render_quest_detail(f, chunks[0]),
            View::CreateProject
            | View::EditProject
            | View::CreateQuest
            | View::EditQuest
            | View::CreateTask
            | View::EditTask => self.render_form(f, chunks[0]),
        }

        if self.pending_delete.is_some() {
            self.render_confirm_popup(f, chunks[0]);
        }
        self.render_status_bar(f, chunks[1]);
    }

    /// Main event loop: draw, apply save completions, process one key.
    pub fn run<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> io::Result<()> {
        loop {
            terminal.draw(|f| self.render(f))?;
            self.drain_save_outcomes();

            if event::poll(Duration::from_millis(50))? {
                if let Event::Key(key) = event::read()? {
                    if self.handle_key(key.code, key.modifiers) {
                        break;
                    }
                }
            }
        }
        // Final synchronous save on the way out; the terminal is about to be
        // restored, so a failure here has nowhere useful to go.
        let _ = self.db.save(&self.db_path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn key(app: &mut App, code: KeyCode) {
        app.handle_key(code, KeyModifiers::NONE);
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            key(app, KeyCode::Char(c));
        }
    }

    fn app_with_projects(count: usize) -> (App, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let mut db = Database::default();
        for i in 0..count {
            db.create_project(&format!("Project {}", i + 1));
        }
        let app = App::with_database(db, &dir.path().join("quests.json"));
        (app, dir)
    }

    #[test]
    fn empty_tree_synthesizes_a_default_project_and_persists_it() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quests.json");
        let app = App::with_database(Database::default(), &path);

        assert_eq!(app.view(), View::Dashboard);
        assert_eq!(app.selected_project, None);
        assert_eq!(app.database().projects.len(), 1);
        let on_disk = Database::load(&path).unwrap();
        assert_eq!(on_disk.projects.len(), 1);
    }

    #[test]
    fn single_project_opens_a_scoped_dashboard() {
        let (app, _dir) = app_with_projects(1);
        assert_eq!(app.view(), View::Dashboard);
        assert_eq!(app.selected_project, Some(0));
    }

    #[test]
    fn multiple_projects_open_the_startup_chooser() {
        let (mut app, _dir) = app_with_projects(3);
        assert_eq!(app.view(), View::ProjectSelection);

        key(&mut app, KeyCode::Down);
        key(&mut app, KeyCode::Enter);
        assert_eq!(app.view(), View::Dashboard);
        assert_eq!(app.selected_project, Some(1));
    }

    #[test]
    fn reconcile_selection_shifts_and_clears() {
        assert_eq!(reconcile_selection(Some(2), 0), Some(1));
        assert_eq!(reconcile_selection(Some(1), 1), None);
        assert_eq!(reconcile_selection(Some(0), 2), Some(0));
        assert_eq!(reconcile_selection(None, 0), None);
    }

    #[test]
    fn quest_form_commits_and_returns_to_the_dashboard() {
        let (mut app, _dir) = app_with_projects(1);
        key(&mut app, KeyCode::Char('c'));
        assert_eq!(app.view(), View::CreateQuest);

        type_text(&mut app, "Write report");
        key(&mut app, KeyCode::Enter); // description
        key(&mut app, KeyCode::Enter); // priority
        type_text(&mut app, "5");
        key(&mut app, KeyCode::Enter); // deadline (last field)
        key(&mut app, KeyCode::Enter); // submit

        assert_eq!(app.view(), View::Dashboard);
        let quest = &app.database().projects[0].quests[0];
        assert_eq!(quest.title, "Write report");
        assert_eq!(quest.priority, 5);
        assert_eq!(quest.state, QuestState::Active);
    }

    #[test]
    fn invalid_submit_stays_in_the_form_with_an_error() {
        let (mut app, _dir) = app_with_projects(1);
        key(&mut app, KeyCode::Char('c'));
        // Jump straight to the last field and submit with an empty title.
        key(&mut app, KeyCode::BackTab);
        key(&mut app, KeyCode::Enter);

        assert_eq!(app.view(), View::CreateQuest);
        assert!(app.form.as_ref().unwrap().error.is_some());
        assert!(app.database().projects[0].quests.is_empty());

        // Fixing the title clears the path to a commit.
        key(&mut app, KeyCode::BackTab);
        key(&mut app, KeyCode::BackTab);
        key(&mut app, KeyCode::BackTab);
        type_text(&mut app, "Fixed");
        key(&mut app, KeyCode::BackTab); // back onto the deadline field
        key(&mut app, KeyCode::Enter);
        assert_eq!(app.view(), View::Dashboard);
        assert_eq!(app.database().projects[0].quests[0].title, "Fixed");
    }

    #[test]
    fn cancelled_form_discards_input_and_returns_to_opener() {
        let (mut app, _dir) = app_with_projects(1);
        key(&mut app, KeyCode::Char('c'));
        type_text(&mut app, "Discard me");
        key(&mut app, KeyCode::Esc);

        assert_eq!(app.view(), View::Dashboard);
        assert!(app.database().projects[0].quests.is_empty());
    }

    #[test]
    fn project_form_returns_to_the_project_list() {
        let (mut app, _dir) = app_with_projects(1);
        key(&mut app, KeyCode::Char('p'));
        assert_eq!(app.view(), View::ProjectList);
        key(&mut app, KeyCode::Char('n'));
        assert_eq!(app.view(), View::CreateProject);
        type_text(&mut app, "Second");
        key(&mut app, KeyCode::Enter);

        assert_eq!(app.view(), View::ProjectList);
        assert_eq!(app.database().projects.len(), 2);
        assert_eq!(app.database().projects[1].name, "Second");
    }

    #[test]
    fn delete_confirmation_only_deletes_on_yes() {
        let (mut app, _dir) = app_with_projects(2);
        key(&mut app, KeyCode::Enter); // chooser -> dashboard
        key(&mut app, KeyCode::Char('p'));

        key(&mut app, KeyCode::Char('x'));
        assert_eq!(app.pending_delete, Some(DeleteTarget::Project(0)));
        key(&mut app, KeyCode::Char('n'));
        assert_eq!(app.pending_delete, None);
        assert_eq!(app.database().projects.len(), 2);

        key(&mut app, KeyCode::Char('x'));
        key(&mut app, KeyCode::Char('y'));
        assert_eq!(app.database().projects.len(), 1);
        assert_eq!(app.database().projects[0].name, "Project 2");
    }

    #[test]
    fn deleting_an_earlier_task_keeps_the_cursor_on_the_same_item() {
        let (mut app, _dir) = app_with_projects(1);
        {
            let db = &mut app.db;
            db.create_quest(0, "Quest", "", 1, None);
            db.create_task(0, 0, "first");
            db.create_task(0, 0, "second");
            db.create_task(0, 0, "third");
        }
        app.selected_quest = Some(0);
        app.view = View::QuestDetail;
        app.task_cursor = 2;

        app.pending_delete = Some(DeleteTarget::Task(0, 0, 0));
        key(&mut app, KeyCode::Char('y'));

        assert_eq!(app.task_cursor, 1);
        assert_eq!(
            app.database().projects[0].quests[0].tasks[app.task_cursor].description,
            "third"
        );
    }

    #[test]
    fn deleting_the_scoped_project_clears_the_scope() {
        let (mut app, _dir) = app_with_projects(2);
        key(&mut app, KeyCode::Down);
        key(&mut app, KeyCode::Enter); // scope to project 2
        assert_eq!(app.selected_project, Some(1));

        app.pending_delete = Some(DeleteTarget::Project(1));
        key(&mut app, KeyCode::Char('y'));
        assert_eq!(app.selected_project, None);
        assert_eq!(app.selected_quest, None);
    }

    #[test]
    fn dashboard_enter_opens_the_quest_detail_via_identity() {
        let (mut app, _dir) = app_with_projects(1);
        {
            let db = &mut app.db;
            db.create_quest(0, "Low", "", 1, None);
            db.create_quest(0, "High", "", 9, None);
        }
        // Top dashboard row is the high-priority quest, which sits at
        // tree index 1.
        key(&mut app, KeyCode::Enter);
        assert_eq!(app.view(), View::QuestDetail);
        assert_eq!(app.selected_quest, Some(1));
    }

    #[test]
    fn toggling_a_task_updates_progress() {
        let (mut app, _dir) = app_with_projects(1);
        {
            let db = &mut app.db;
            db.create_quest(0, "Quest", "", 1, None);
            db.create_task(0, 0, "only");
        }
        app.selected_quest = Some(0);
        app.view = View::QuestDetail;

        key(&mut app, KeyCode::Char(' '));
        assert_eq!(app.database().projects[0].quests[0].progress, 100.0);
        assert_eq!(app.database().projects[0].progress, 100.0);
    }

    #[test]
    fn cycling_quest_state_hides_it_from_the_planner() {
        let (mut app, _dir) = app_with_projects(1);
        {
            let db = &mut app.db;
            db.create_quest(0, "Quest", "", 1, None);
        }
        app.selected_quest = Some(0);
        app.view = View::QuestDetail;

        key(&mut app, KeyCode::Char('s'));
        assert_eq!(
            app.database().projects[0].quests[0].state,
            QuestState::Completed
        );
        assert!(app.dashboard_rows().is_empty());
    }

    #[test]
    fn global_keys_are_captured_while_a_form_is_active() {
        let (mut app, _dir) = app_with_projects(1);
        key(&mut app, KeyCode::Char('c'));
        // 'q' must type into the field, not quit.
        assert!(!app.handle_key(KeyCode::Char('q'), KeyModifiers::NONE));
        assert_eq!(app.form.as_ref().unwrap().fields()[0].value, "q");
        // Outside a form, 'q' quits.
        key(&mut app, KeyCode::Esc);
        assert!(app.handle_key(KeyCode::Char('q'), KeyModifiers::NONE));
    }

    #[test]
    fn edit_form_seeds_and_updates_in_place() {
        let (mut app, _dir) = app_with_projects(1);
        {
            let db = &mut app.db;
            db.create_quest(0, "Old title", "desc", 3, NaiveDate::from_ymd_opt(2026, 1, 1));
        }
        key(&mut app, KeyCode::Char('e'));
        assert_eq!(app.view(), View::EditQuest);
        assert_eq!(app.form.as_ref().unwrap().fields()[0].value, "Old title");

        // Append to the title, then submit from the last field.
        type_text(&mut app, " v2");
        key(&mut app, KeyCode::BackTab);
        key(&mut app, KeyCode::Enter);

        assert_eq!(app.view(), View::Dashboard);
        let quest = &app.database().projects[0].quests[0];
        assert_eq!(quest.title, "Old title v2");
        assert_eq!(quest.priority, 3);
        assert_eq!(app.database().projects[0].quests.len(), 1);
    }

    #[test]
    fn project_list_enter_prefers_quest_detail() {
        let (mut app, _dir) = app_with_projects(2);
        key(&mut app, KeyCode::Enter); // chooser -> dashboard (project 1)
        app.db.create_quest(0, "Quest", "", 1, None);
        key(&mut app, KeyCode::Char('p'));

        key(&mut app, KeyCode::Enter);
        assert_eq!(app.view(), View::QuestDetail);
        assert_eq!(app.selected_quest, Some(0));

        // A project with no quests lands on its dashboard instead.
        key(&mut app, KeyCode::Char('p'));
        key(&mut app, KeyCode::Down);
        key(&mut app, KeyCode::Enter);
        assert_eq!(app.view(), View::Dashboard);
        assert_eq!(app.selected_project, Some(1));
    }

    #[test]
    fn help_overlay_captures_the_next_key() {
        let (mut app, _dir) = app_with_projects(1);
        key(&mut app, KeyCode::Char('h'));
        assert!(app.show_help);
        key(&mut app, KeyCode::Char('x'));
        assert!(!app.show_help);
        assert_eq!(app.pending_delete, None);
    }
}
