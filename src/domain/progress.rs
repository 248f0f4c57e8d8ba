//! Per-user progress states, transitions and journal events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::content::TopicId;

/// State of one topic for one user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicState {
    /// Not accessible until unlocked
    Locked,

    /// Unlocked but not opened yet
    NotStarted,

    /// Opened at least once
    InProgress,

    /// Finished
    Completed,
}

impl TopicState {
    /// Initial state derived from the authored lock flag
    pub fn initial(locked: bool) -> Self {
        if locked {
            Self::Locked
        } else {
            Self::NotStarted
        }
    }

    pub fn is_unlocked(&self) -> bool {
        !matches!(self, Self::Locked)
    }
}

impl std::fmt::Display for TopicState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TopicState::Locked => f.pad("locked"),
            TopicState::NotStarted => f.pad("not started"),
            TopicState::InProgress => f.pad("in progress"),
            TopicState::Completed => f.pad("completed"),
        }
    }
}

/// A requested state change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    Unlock,
    Open,
    Complete,
}

impl std::fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransitionKind::Unlock => f.pad("unlock"),
            TransitionKind::Open => f.pad("open"),
            TransitionKind::Complete => f.pad("complete"),
        }
    }
}

/// Outcome of an accepted transition. `from == to` for no-op calls
/// such as opening a topic twice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub topic_id: TopicId,
    pub kind: TransitionKind,
    pub from: TopicState,
    pub to: TopicState,
}

impl Transition {
    /// Whether the state actually changed
    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}

/// A single line in a user's progress journal.
///
/// The journal is append-only; a user's current progress is rebuilt by
/// replaying events in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Unique identifier for this event
    pub id: Uuid,

    /// When this event occurred (ISO 8601)
    pub timestamp: DateTime<Utc>,

    /// User this event belongs to
    pub user: String,

    pub topic_id: TopicId,
    pub kind: TransitionKind,
    pub from: TopicState,
    pub to: TopicState,

    /// Content release the transition was made against
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release: Option<String>,
}

impl ProgressEvent {
    /// Create an event for a transition with the current timestamp
    pub fn from_transition(user: impl Into<String>, transition: &Transition) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            user: user.into(),
            topic_id: transition.topic_id.clone(),
            kind: transition.kind,
            from: transition.from,
            to: transition.to,
            release: None,
        }
    }

    /// Tag the event with a content release
    pub fn with_release(mut self, release: impl Into<String>) -> Self {
        self.release = Some(release.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_follows_lock_flag() {
        assert_eq!(TopicState::initial(true), TopicState::Locked);
        assert_eq!(TopicState::initial(false), TopicState::NotStarted);
        assert!(!TopicState::Locked.is_unlocked());
        assert!(TopicState::Completed.is_unlocked());
    }

    #[test]
    fn test_event_serialization() {
        let transition = Transition {
            topic_id: TopicId::new("t2"),
            kind: TransitionKind::Unlock,
            from: TopicState::Locked,
            to: TopicState::NotStarted,
        };
        let event = ProgressEvent::from_transition("alice", &transition).with_release("abc123");

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"kind\":\"unlock\""));
        assert!(json.contains("\"to\":\"not_started\""));

        let parsed: ProgressEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, event);
    }

    #[test]
    fn test_event_without_release_omits_field() {
        let transition = Transition {
            topic_id: TopicId::new("t1"),
            kind: TransitionKind::Open,
            from: TopicState::NotStarted,
            to: TopicState::InProgress,
        };
        let event = ProgressEvent::from_transition("bob", &transition);

        let json = serde_json::to_string(&event).unwrap();
        assert!(!json.contains("release"));
    }
}
