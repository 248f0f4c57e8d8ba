//! Domain types for curio.
//!
//! This module contains the core data structures:
//! - Content: categories, topics, identifiers, difficulty tiers
//! - Progress: per-user topic states, transitions, journal events

pub mod content;
pub mod progress;

// Re-export commonly used types
pub use content::{
    Category, CategoryId, Difficulty, Presentation, RawCategory, RawTopic, Topic, TopicId,
    UnknownDifficulty,
};
pub use progress::{ProgressEvent, TopicState, Transition, TransitionKind};
