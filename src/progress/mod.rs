//! Per-user progression.
//!
//! - Store: the `ProgressStore` contract and an in-memory implementation
//! - Machine: the topic state machine bound to one catalog and one store
//! - Journal: append-only JSONL persistence for a user's transitions

pub mod journal;
pub mod machine;
pub mod store;

pub use journal::{JournalError, JournalLock, ProgressJournal};
pub use machine::{next_state, CategoryProgress, ProgressionHandle, TransitionError};
pub use store::{MemoryProgressStore, ProgressStore};
