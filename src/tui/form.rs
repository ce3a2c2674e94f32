//! Create/edit forms for projects, quests, and tasks.
//!
//! A form owns typed, positionally-ordered input fields for one entity kind,
//! a focus cursor over them, and an optional inline error. Nothing touches
//! the tree until validation passes; the app then hands the typed
//! [`FormOutput`] to the database.

use chrono::NaiveDate;
use thiserror::Error;

use crate::model::Quest;
use crate::tui::input::InputField;

/// Entity kind a form edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormKind {
    Project,
    Quest,
    Task,
}

/// Whether the form creates a new entity or edits an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMode {
    Create,
    Edit,
}

/// Recoverable form input failure, shown inline and never propagated
/// past the form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("project name is required")]
    ProjectNameRequired,
    #[error("quest title is required")]
    QuestTitleRequired,
    #[error("task description is required")]
    TaskDescRequired,
    #[error("invalid date format (use YYYY-MM-DD)")]
    InvalidDateFormat,
}

/// Validated field values, ready for the matching database operation.
#[derive(Debug, Clone, PartialEq)]
pub enum FormOutput {
    Project {
        name: String,
    },
    Quest {
        title: String,
        description: String,
        priority: i32,
        deadline: Option<NaiveDate>,
    },
    Task {
        description: String,
    },
}

#[derive(Debug, Clone)]
struct ProjectFields {
    name: InputField,
}

#[derive(Debug, Clone)]
struct QuestFields {
    title: InputField,
    description: InputField,
    priority: InputField,
    deadline: InputField,
}

#[derive(Debug, Clone)]
struct TaskFields {
    description: InputField,
}

#[derive(Debug, Clone)]
enum FormFields {
    Project(ProjectFields),
    Quest(QuestFields),
    Task(TaskFields),
}

const PROJECT_LABELS: &[&str] = &["Name"];
const QUEST_LABELS: &[&str] = &["Title", "Description", "Priority (0-10)", "Deadline (YYYY-MM-DD)"];
const TASK_LABELS: &[&str] = &["Description"];

/// An in-flight create or edit form.
#[derive(Debug, Clone)]
pub struct Form {
    pub kind: FormKind,
    pub mode: FormMode,
    pub focus: usize,
    pub error: Option<ValidationError>,
    fields: FormFields,
}

impl Form {
    /// Project form, seeded with the current name when editing.
    pub fn project(mode: FormMode, initial_name: &str) -> Self {
        Form {
            kind: FormKind::Project,
            mode,
            focus: 0,
            error: None,
            fields: FormFields::Project(ProjectFields {
                name: InputField::with_value("Project Name", initial_name),
            }),
        }
    }

    /// Quest form, seeded from an existing quest when editing.
    pub fn quest(mode: FormMode, initial: Option<&Quest>) -> Self {
        let fields = match initial {
            Some(q) => QuestFields {
                title: InputField::with_value("Title", &q.title),
                description: InputField::with_value("Description", &q.description),
                priority: InputField::with_value("Priority (0-10)", &q.priority.to_string()),
                deadline: InputField::with_value(
                    "Deadline (YYYY-MM-DD)",
                    &q.deadline.map(|d| d.to_string()).unwrap_or_default(),
                ),
            },
            None => QuestFields {
                title: InputField::new("Title"),
                description: InputField::new("Description"),
                priority: InputField::new("Priority (0-10)"),
                deadline: InputField::new("Deadline (YYYY-MM-DD)"),
            },
        };
        Form {
            kind: FormKind::Quest,
            mode,
            focus: 0,
            error: None,
            fields: FormFields::Quest(fields),
        }
    }

    /// Task form, seeded with the current description when editing.
    pub fn task(mode: FormMode, initial_desc: &str) -> Self {
        Form {
            kind: FormKind::Task,
            mode,
            focus: 0,
            error: None,
            fields: FormFields::Task(TaskFields {
                description: InputField::with_value("Task Description", initial_desc),
            }),
        }
    }

    /// Screen title, e.g. "Edit Quest".
    pub fn title(&self) -> &'static str {
        match (self.mode, self.kind) {
            (FormMode::Create, FormKind::Project) => "Create Project",
            (FormMode::Edit, FormKind::Project) => "Edit Project",
            (FormMode::Create, FormKind::Quest) => "Create Quest",
            (FormMode::Edit, FormKind::Quest) => "Edit Quest",
            (FormMode::Create, FormKind::Task) => "Create Task",
            (FormMode::Edit, FormKind::Task) => "Edit Task",
        }
    }

    /// Field labels in visual order.
    pub fn labels(&self) -> &'static [&'static str] {
        match self.kind {
            FormKind::Project => PROJECT_LABELS,
            FormKind::Quest => QUEST_LABELS,
            FormKind::Task => TASK_LABELS,
        }
    }

    /// All input fields in visual order.
    pub fn fields(&self) -> Vec<&InputField> {
        match &self.fields {
            FormFields::Project(f) => vec![&f.name],
            FormFields::Quest(f) => vec![&f.title, &f.description, &f.priority, &f.deadline],
            FormFields::Task(f) => vec![&f.description],
        }
    }

    fn fields_mut(&mut self) -> Vec<&mut InputField> {
        match &mut self.fields {
            FormFields::Project(f) => vec![&mut f.name],
            FormFields::Quest(f) => {
                vec![&mut f.title, &mut f.description, &mut f.priority, &mut f.deadline]
            }
            FormFields::Task(f) => vec![&mut f.description],
        }
    }

    pub fn field_count(&self) -> usize {
        self.fields().len()
    }

    /// Whether the focus cursor sits on the final field, where enter submits
    /// instead of advancing.
    pub fn on_last_field(&self) -> bool {
        self.focus + 1 == self.field_count()
    }

    /// Move focus to the next field, wrapping past the end.
    pub fn next_field(&mut self) {
        self.focus = (self.focus + 1) % self.field_count();
    }

    /// Move focus to the previous field, wrapping past the start.
    pub fn prev_field(&mut self) {
        let count = self.field_count();
        self.focus = (self.focus + count - 1) % count;
    }

    /// Type a character into the focused field.
    pub fn handle_char(&mut self, c: char) {
        let focus = self.focus;
        self.fields_mut()[focus].handle_char(c);
    }

    /// Backspace in the focused field.
    pub fn handle_backspace(&mut self) {
        let focus = self.focus;
        self.fields_mut()[focus].handle_backspace();
    }

    /// Forward-delete in the focused field.
    pub fn handle_delete(&mut self) {
        let focus = self.focus;
        self.fields_mut()[focus].handle_delete();
    }

    /// Move the focused field's cursor.
    pub fn handle_left_right(&mut self, right: bool) {
        let focus = self.focus;
        let mut fields = self.fields_mut();
        if right {
            fields[focus].move_cursor_right();
        } else {
            fields[focus].move_cursor_left();
        }
    }

    /// Validate the current values into a typed output.
    ///
    /// Required text must be non-empty after trimming, and a non-empty
    /// deadline must be an ISO date. A priority that does not parse falls
    /// back to 0 rather than failing.
    pub fn validate(&self) -> Result<FormOutput, ValidationError> {
        match &self.fields {
            FormFields::Project(f) => {
                let name = f.name.trimmed();
                if name.is_empty() {
                    return Err(ValidationError::ProjectNameRequired);
                }
                Ok(FormOutput::Project {
                    name: name.to_string(),
                })
            }
            FormFields::Quest(f) => {
                let title = f.title.trimmed();
                if title.is_empty() {
                    return Err(ValidationError::QuestTitleRequired);
                }
                let deadline = match f.deadline.trimmed() {
                    "" => None,
                    s => Some(
                        NaiveDate::parse_from_str(s, "%Y-%m-%d")
                            .map_err(|_| ValidationError::InvalidDateFormat)?,
                    ),
                };
                let priority = f.priority.trimmed().parse().unwrap_or(0);
                Ok(FormOutput::Quest {
                    title: title.to_string(),
                    description: f.description.trimmed().to_string(),
                    priority,
                    deadline,
                })
            }
            FormFields::Task(f) => {
                let description = f.description.trimmed();
                if description.is_empty() {
                    return Err(ValidationError::TaskDescRequired);
                }
                Ok(FormOutput::Task {
                    description: description.to_string(),
                })
            }
        }
    }
}
