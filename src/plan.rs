//! Daily planner: selects and orders the quests worth working on today.

use std::cmp::Ordering;

use crate::model::{Project, Quest, QuestState};

/// Candidate set restriction for a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanScope {
    AllProjects,
    OneProject(usize),
}

/// Build today's plan: active leaf quests, highest priority first, soonest
/// deadline breaking ties. Deadline-less quests sort after dated ones at
/// equal priority; beyond that the stable sort keeps insertion order.
///
/// Returns cloned snapshots so the caller holds no references into the tree;
/// rows are mapped back to coordinates by id via `Database::find_quest`.
/// An out-of-range project scope yields an empty plan.
pub fn plan(projects: &[Project], scope: PlanScope) -> Vec<Quest> {
    let candidates: Box<dyn Iterator<Item = &Quest> + '_> = match scope {
        PlanScope::AllProjects => Box::new(projects.iter().flat_map(|p| p.quests.iter())),
        PlanScope::OneProject(idx) => match projects.get(idx) {
            Some(p) => Box::new(p.quests.iter()),
            None => return Vec::new(),
        },
    };

    let mut quests: Vec<Quest> = candidates
        .filter(|q| q.state == QuestState::Active && q.is_leaf())
        .cloned()
        .collect();

    quests.sort_by(|a, b| {
        b.priority.cmp(&a.priority).then_with(|| match (a.deadline, b.deadline) {
            (Some(da), Some(db)) => da.cmp(&db),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
    });

    quests
}
