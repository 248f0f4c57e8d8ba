//! The user progress store contract and an in-memory implementation.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::{ProgressEvent, TopicId, TopicState};

/// Per-user topic state storage consumed by the state machine.
///
/// `get` returning `None` means the user never touched the topic, so its
/// state is the authored default. Persistence, sync and identity are the
/// implementor's concern.
pub trait ProgressStore: Send {
    fn get(&self, topic_id: &TopicId) -> Option<TopicState>;

    fn set(&mut self, topic_id: &TopicId, state: TopicState);
}

impl<S: ProgressStore + ?Sized> ProgressStore for Box<S> {
    fn get(&self, topic_id: &TopicId) -> Option<TopicState> {
        (**self).get(topic_id)
    }

    fn set(&mut self, topic_id: &TopicId, state: TopicState) {
        (**self).set(topic_id, state)
    }
}

/// HashMap-backed progress store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryProgressStore {
    states: HashMap<TopicId, TopicState>,
}

impl MemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store by replaying journal events in order
    pub fn from_events<'e>(events: impl IntoIterator<Item = &'e ProgressEvent>) -> Self {
        let mut store = Self::new();
        for event in events {
            store.apply_event(event);
        }
        store
    }

    /// Apply a single journal event (last write wins)
    pub fn apply_event(&mut self, event: &ProgressEvent) {
        self.states.insert(event.topic_id.clone(), event.to);
    }

    /// Number of topics with an explicit state
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TopicId, &TopicState)> {
        self.states.iter()
    }
}

impl ProgressStore for MemoryProgressStore {
    fn get(&self, topic_id: &TopicId) -> Option<TopicState> {
        self.states.get(topic_id).copied()
    }

    fn set(&mut self, topic_id: &TopicId, state: TopicState) {
        self.states.insert(topic_id.clone(), state);
    }
}
