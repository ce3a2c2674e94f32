//! Enumerations for TUI state management.

/// Current screen of the terminal user interface.
///
/// Matched exhaustively everywhere: adding a screen forces every dispatch
/// site to handle it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    ProjectSelection,
    Dashboard,
    ProjectList,
    QuestDetail,
    CreateProject,
    EditProject,
    CreateQuest,
    EditQuest,
    CreateTask,
    EditTask,
}

impl View {
    /// Whether this screen is one of the six form screens.
    pub fn is_form(self) -> bool {
        matches!(
            self,
            View::CreateProject
                | View::EditProject
                | View::CreateQuest
                | View::EditQuest
                | View::CreateTask
                | View::EditTask
        )
    }

    /// Screen a form returns to on commit or cancel: project forms to the
    /// project list, quest forms to the dashboard, task forms to the quest
    /// detail. Non-form views return themselves.
    pub fn form_return(self) -> View {
        match self {
            View::CreateProject | View::EditProject => View::ProjectList,
            View::CreateQuest | View::EditQuest => View::Dashboard,
            View::CreateTask | View::EditTask => View::QuestDetail,
            other => other,
        }
    }
}

/// Entity pending deletion in the confirmation overlay, identified by its
/// tree coordinates at the time the confirmation was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteTarget {
    Project(usize),
    Quest(usize, usize),
    Task(usize, usize, usize),
}

impl DeleteTarget {
    /// Noun for the confirmation prompt.
    pub fn kind_label(self) -> &'static str {
        match self {
            DeleteTarget::Project(_) => "project",
            DeleteTarget::Quest(..) => "quest",
            DeleteTarget::Task(..) => "task",
        }
    }
}
