//! Core data model: the Project → Quest → Task tree.
//!
//! This module defines the three entity types, the quest lifecycle state,
//! derived progress calculation, and identity generation. Entities are only
//! ever created and mutated through the `Database` operations in `db.rs`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a quest.
///
/// Persisted as its integer code (0 = Active, 1 = Completed, 2 = Cancelled).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(into = "u8", try_from = "u8")]
pub enum QuestState {
    Active,
    Completed,
    Cancelled,
}

impl From<QuestState> for u8 {
    fn from(s: QuestState) -> u8 {
        match s {
            QuestState::Active => 0,
            QuestState::Completed => 1,
            QuestState::Cancelled => 2,
        }
    }
}

impl TryFrom<u8> for QuestState {
    type Error = String;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(QuestState::Active),
            1 => Ok(QuestState::Completed),
            2 => Ok(QuestState::Cancelled),
            _ => Err(format!("invalid quest state code {v}")),
        }
    }
}

/// A single actionable item inside a quest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct Task {
    #[serde(rename = "ID")]
    pub id: String,
    pub description: String,
    pub done: bool,
}

/// A goal with an ordered task list, priority, and optional deadline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct Quest {
    #[serde(rename = "ID")]
    pub id: String,
    pub title: String,
    pub description: String,
    pub tasks: Vec<Task>,
    /// Derived: 0.0 → 100.0, share of done tasks.
    pub progress: f64,
    pub priority: i32,
    pub deadline: Option<NaiveDate>,
    pub state: QuestState,
}

/// A named collection of quests.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct Project {
    #[serde(rename = "ID")]
    pub id: String,
    pub name: String,
    pub quests: Vec<Quest>,
    /// Derived: arithmetic mean of quest progress values.
    pub progress: f64,
}

impl Quest {
    /// Recompute progress from the current task set.
    ///
    /// Idempotent: calling twice without an intervening mutation yields the
    /// same value. A quest with no tasks is 0% complete.
    pub fn recalculate_progress(&mut self) {
        if self.tasks.is_empty() {
            self.progress = 0.0;
            return;
        }
        let done = self.tasks.iter().filter(|t| t.done).count();
        self.progress = done as f64 / self.tasks.len() as f64 * 100.0;
    }

    /// Whether this quest has no sub-quests.
    ///
    /// The model has no nested quests today, so every quest is a leaf; the
    /// planner filters on this predicate so the contract survives if the
    /// hierarchy ever deepens.
    pub fn is_leaf(&self) -> bool {
        true
    }
}

impl Project {
    /// Recompute progress as the mean of the quests' cached progress values.
    ///
    /// Idempotent, same contract as [`Quest::recalculate_progress`]. A
    /// project with no quests is 0% complete.
    pub fn recalculate_progress(&mut self) {
        if self.quests.is_empty() {
            self.progress = 0.0;
            return;
        }
        let total: f64 = self.quests.iter().map(|q| q.progress).sum();
        self.progress = total / self.quests.len() as f64;
    }
}

static LAST_ID: AtomicU64 = AtomicU64::new(0);

/// Generate a unique entity id from the creation timestamp.
///
/// Nanosecond resolution, with a strictly-increasing floor so two ids minted
/// back-to-back never collide even on a coarse clock.
pub fn generate_id() -> String {
    let now_nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);
    let mut id = now_nanos;
    let _ = LAST_ID.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |last| {
        id = now_nanos.max(last + 1);
        Some(id)
    });
    id.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quest_with_tasks(done_flags: &[bool]) -> Quest {
        Quest {
            id: generate_id(),
            title: "quest".to_string(),
            description: String::new(),
            tasks: done_flags
                .iter()
                .map(|&done| Task {
                    id: generate_id(),
                    description: "task".to_string(),
                    done,
                })
                .collect(),
            progress: 0.0,
            priority: 0,
            deadline: None,
            state: QuestState::Active,
        }
    }

    #[test]
    fn quest_progress_with_no_tasks_is_zero() {
        let mut q = quest_with_tasks(&[]);
        q.progress = 55.0; // stale cached value
        q.recalculate_progress();
        assert_eq!(q.progress, 0.0);
    }

    #[test]
    fn quest_progress_is_done_share() {
        let mut q = quest_with_tasks(&[true, false, false]);
        q.recalculate_progress();
        assert!((q.progress - 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn quest_progress_recalculation_is_idempotent() {
        let mut q = quest_with_tasks(&[true, false]);
        q.recalculate_progress();
        let first = q.progress;
        q.recalculate_progress();
        assert_eq!(first, q.progress);
    }

    #[test]
    fn project_progress_is_mean_of_quests() {
        let mut p = Project {
            id: generate_id(),
            name: "p".to_string(),
            quests: vec![quest_with_tasks(&[]), quest_with_tasks(&[]), quest_with_tasks(&[])],
            progress: 0.0,
        };
        p.quests[0].progress = 100.0;
        p.quests[1].progress = 50.0;
        p.quests[2].progress = 0.0;
        p.recalculate_progress();
        assert_eq!(p.progress, 50.0);

        p.quests.clear();
        p.recalculate_progress();
        assert_eq!(p.progress, 0.0);
    }

    #[test]
    fn quest_state_round_trips_as_integer_code() {
        assert_eq!(serde_json::to_string(&QuestState::Active).unwrap(), "0");
        assert_eq!(serde_json::to_string(&QuestState::Completed).unwrap(), "1");
        assert_eq!(serde_json::to_string(&QuestState::Cancelled).unwrap(), "2");
        let s: QuestState = serde_json::from_str("2").unwrap();
        assert_eq!(s, QuestState::Cancelled);
        assert!(serde_json::from_str::<QuestState>("3").is_err());
    }

    #[test]
    fn generated_ids_are_unique_under_rapid_creation() {
        let ids: Vec<String> = (0..1000).map(|_| generate_id()).collect();
        let mut deduped = ids.clone();
        deduped.sort();
        deduped.dedup();
        assert_eq!(ids.len(), deduped.len());
    }
}
