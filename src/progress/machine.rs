//! Per-user progression state machine.
//!
//! ```text
//!   Locked --unlock--> NotStarted --open--> InProgress --complete--> Completed
//!                          |                                            ^
//!                          +------------------complete------------------+
//! ```
//!
//! The authored `locked` flag only seeds the initial state; the shared
//! catalog is never mutated. Completion is relaxed: a topic may be completed
//! straight from `NotStarted`, but never while `Locked`. Unlocks are always
//! triggered by the caller, never inferred from other topics.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use thiserror::Error;

use super::store::ProgressStore;
use crate::catalog::{query, Catalog, CatalogEntry, SearchCriteria, TopicRef};
use crate::domain::{CategoryId, TopicId, TopicState, Transition, TransitionKind};

/// A rejected transition. Expected in interactive use and always
/// recoverable; state is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Topic not found: {0}")]
    UnknownTopic(String),

    #[error("Topic {topic_id} is already unlocked ({state})")]
    AlreadyUnlocked { topic_id: TopicId, state: TopicState },

    #[error("Cannot {kind} topic {topic_id} while it is {from}")]
    InvalidTransition {
        topic_id: TopicId,
        kind: TransitionKind,
        from: TopicState,
    },
}

/// Next state for a transition, or why it is refused
pub fn next_state(
    topic_id: &TopicId,
    kind: TransitionKind,
    from: TopicState,
) -> Result<TopicState, TransitionError> {
    use TopicState::*;

    match (kind, from) {
        (TransitionKind::Unlock, Locked) => Ok(NotStarted),
        (TransitionKind::Unlock, state) => Err(TransitionError::AlreadyUnlocked {
            topic_id: topic_id.clone(),
            state,
        }),

        (TransitionKind::Open, NotStarted) => Ok(InProgress),
        (TransitionKind::Open, state @ (InProgress | Completed)) => Ok(state),

        (TransitionKind::Complete, NotStarted | InProgress) => Ok(Completed),
        (TransitionKind::Complete, Completed) => Ok(Completed),

        (kind @ (TransitionKind::Open | TransitionKind::Complete), Locked) => {
            Err(TransitionError::InvalidTransition {
                topic_id: topic_id.clone(),
                kind,
                from: Locked,
            })
        }
    }
}

/// Progress breakdown for one category
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CategoryProgress {
    pub category_id: String,
    pub total: usize,
    pub locked: usize,
    pub not_started: usize,
    pub in_progress: usize,
    pub completed: usize,
}

impl CategoryProgress {
    /// Completed / total, or 0 for an empty category
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }
}

/// One catalog joined with one user's progress store.
///
/// Every transition holds the store lock across its read-modify-write, so
/// concurrent calls for the same user are serialized.
pub struct ProgressionHandle<S> {
    catalog: Arc<Catalog>,
    store: Mutex<S>,
}

impl<S: ProgressStore> ProgressionHandle<S> {
    pub fn new(catalog: Arc<Catalog>, store: S) -> Self {
        Self {
            catalog,
            store: Mutex::new(store),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Release the handle and return the store
    pub fn into_store(self) -> S {
        self.store.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    // The store holds plain data, so a panic elsewhere cannot leave it
    // half-written; a poisoned lock is safe to reuse.
    fn lock(&self) -> MutexGuard<'_, S> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn current(store: &S, entry: &CatalogEntry) -> TopicState {
        store
            .get(&entry.topic.id)
            .unwrap_or_else(|| TopicState::initial(entry.topic.locked))
    }

    /// Current state of a topic, `None` if the catalog has no such topic
    pub fn state(&self, topic_id: &str) -> Option<TopicState> {
        let entry = self.catalog.entry(topic_id)?;
        let store = self.lock();
        Some(Self::current(&store, entry))
    }

    /// `Locked -> NotStarted`
    pub fn unlock(&self, topic_id: &str) -> Result<Transition, TransitionError> {
        self.transition(topic_id, TransitionKind::Unlock)
    }

    /// `NotStarted -> InProgress`; no-op when already started
    pub fn mark_opened(&self, topic_id: &str) -> Result<Transition, TransitionError> {
        self.transition(topic_id, TransitionKind::Open)
    }

    /// `NotStarted | InProgress -> Completed`; refused while locked
    pub fn mark_completed(&self, topic_id: &str) -> Result<Transition, TransitionError> {
        self.transition(topic_id, TransitionKind::Complete)
    }

    fn transition(
        &self,
        topic_id: &str,
        kind: TransitionKind,
    ) -> Result<Transition, TransitionError> {
        let entry = self
            .catalog
            .entry(topic_id)
            .ok_or_else(|| TransitionError::UnknownTopic(topic_id.to_string()))?;

        let mut store = self.lock();
        let from = Self::current(&store, entry);

        let to = match next_state(&entry.topic.id, kind, from) {
            Ok(to) => to,
            Err(e) => {
                tracing::debug!(topic = %entry.topic.id, %kind, %from, "Transition refused");
                return Err(e);
            }
        };

        if to != from {
            store.set(&entry.topic.id, to);
            tracing::debug!(topic = %entry.topic.id, %kind, %from, %to, "Topic transitioned");
        }

        Ok(Transition {
            topic_id: entry.topic.id.clone(),
            kind,
            from,
            to,
        })
    }

    /// Whether the topic is currently accessible. Unknown topics are not.
    pub fn is_unlocked(&self, topic_id: &str) -> bool {
        self.state(topic_id)
            .map(|s| s.is_unlocked())
            .unwrap_or(false)
    }

    /// Completed / total topics in a category; 0 for empty or unknown
    /// categories
    pub fn completion_ratio(&self, category_id: &str) -> f64 {
        self.category_progress(category_id).ratio()
    }

    /// State counts for a category
    pub fn category_progress(&self, category_id: &str) -> CategoryProgress {
        let mut progress = CategoryProgress {
            category_id: category_id.to_string(),
            ..Default::default()
        };

        let store = self.lock();
        for topic_id in self.catalog.topic_ids_in(category_id) {
            let Some(entry) = self.catalog.entry(topic_id.as_str()) else {
                continue;
            };
            progress.total += 1;
            match Self::current(&store, entry) {
                TopicState::Locked => progress.locked += 1,
                TopicState::NotStarted => progress.not_started += 1,
                TopicState::InProgress => progress.in_progress += 1,
                TopicState::Completed => progress.completed += 1,
            }
        }

        progress
    }

    /// Progress for every category in display order
    pub fn overview(&self) -> Vec<CategoryProgress> {
        self.catalog
            .categories()
            .iter()
            .map(|c| self.category_progress(c.id.as_str()))
            .collect()
    }

    /// Search with lock constraints applied to this user's current state
    /// instead of the authored default
    pub fn search(&self, criteria: &SearchCriteria) -> Vec<TopicRef<'_>> {
        let results = query(&self.catalog, &criteria.without_lock_filters());
        let store = self.lock();

        results
            .iter()
            .filter(|hit| {
                let Some(entry) = self.catalog.entry(hit.topic_id.as_str()) else {
                    return false;
                };
                let unlocked = Self::current(&store, entry).is_unlocked();
                !(criteria.locked_only && unlocked) && !(criteria.unlocked_only && !unlocked)
            })
            .collect()
    }

    /// Topics of a category in display order with their current state
    pub fn category_states(&self, category_id: &str) -> Vec<(&TopicId, TopicState)> {
        let store = self.lock();
        self.catalog
            .topic_ids_in(category_id)
            .iter()
            .filter_map(|id| {
                let entry = self.catalog.entry(id.as_str())?;
                Some((id, Self::current(&store, entry)))
            })
            .collect()
    }

    /// Owning category of a topic
    pub fn category_of(&self, topic_id: &str) -> Option<&CategoryId> {
        self.catalog.category_of(topic_id)
    }
}
