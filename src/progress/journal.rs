//! Append-only progress journal with file-based persistence.
//!
//! Each user gets one JSONL file (`<dir>/<user>.jsonl`). Every accepted
//! state change is appended as a [`ProgressEvent`]; current progress is
//! derived by replaying the file into a [`MemoryProgressStore`].
//!
//! Appends lock the journal file itself. A caller that replays, decides a
//! transition, and appends must hold [`ProgressJournal::lock`] for the
//! whole sequence, otherwise two sessions can both act on the same stale
//! state.

use std::path::{Path, PathBuf};

use fs2::FileExt;
use thiserror::Error;
use tokio::fs::{self, File};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use super::store::MemoryProgressStore;
use crate::domain::{ProgressEvent, Transition};

/// Errors that can occur with the progress journal
#[derive(Debug, Error)]
pub enum JournalError {
    #[error("Invalid user name '{0}': use letters, digits, '_', '-' or '.'")]
    InvalidUser(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt journal line {line}: {source}")]
    Corrupt {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Exclusive hold on a user's journal, released on drop
#[derive(Debug)]
pub struct JournalLock {
    _file: std::fs::File,
}

/// JSONL progress journal for one user
#[derive(Debug, Clone)]
pub struct ProgressJournal {
    user: String,
    path: PathBuf,
}

impl ProgressJournal {
    /// Journal for `user` inside `dir`. Does not touch the filesystem.
    pub fn new(dir: impl AsRef<Path>, user: &str) -> Result<Self, JournalError> {
        if !is_valid_user(user) {
            return Err(JournalError::InvalidUser(user.to_string()));
        }

        Ok(Self {
            user: user.to_string(),
            path: dir.as_ref().join(format!("{}.jsonl", user)),
        })
    }

    /// Journal for `user`, creating `dir` if needed
    pub async fn open(dir: impl AsRef<Path>, user: &str) -> Result<Self, JournalError> {
        let journal = Self::new(dir.as_ref(), user)?;
        fs::create_dir_all(dir.as_ref()).await?;
        Ok(journal)
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    /// Path to the journal file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path to the lock file guarding read-modify-write sequences
    pub fn lock_path(&self) -> PathBuf {
        self.path.with_extension("lock")
    }

    /// Wait for exclusive use of this user's journal.
    ///
    /// Holds across processes as well as tasks; the lock is released when
    /// the returned guard drops.
    pub async fn lock(&self) -> Result<JournalLock, JournalError> {
        let path = self.lock_path();
        let file = tokio::task::spawn_blocking(move || -> std::io::Result<std::fs::File> {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .write(true)
                .open(&path)?;
            file.lock_exclusive()?;
            Ok(file)
        })
        .await
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))??;

        tracing::trace!(user = %self.user, "Journal locked");
        Ok(JournalLock { _file: file })
    }

    /// Append an event under an exclusive file lock
    pub async fn append(&self, event: &ProgressEvent) -> Result<(), JournalError> {
        let json = serde_json::to_string(event)?;

        let std_file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        // Serializes writers across processes; released when the file drops
        std_file.lock_exclusive()?;

        let mut file = File::from_std(std_file);
        file.write_all(format!("{}\n", json).as_bytes()).await?;
        file.flush().await?;

        Ok(())
    }

    /// Append a transition if it changed anything. Returns the recorded event.
    pub async fn record(
        &self,
        transition: &Transition,
        release: Option<&str>,
    ) -> Result<Option<ProgressEvent>, JournalError> {
        if !transition.changed() {
            return Ok(None);
        }

        let mut event = ProgressEvent::from_transition(&self.user, transition);
        if let Some(release) = release {
            event = event.with_release(release);
        }

        self.append(&event).await?;
        tracing::debug!(
            user = %self.user,
            topic = %event.topic_id,
            to = %event.to,
            "Progress recorded"
        );

        Ok(Some(event))
    }

    /// Replay all events in append order
    pub async fn replay(&self) -> Result<Vec<ProgressEvent>, JournalError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path).await?;
        let reader = BufReader::new(file);
        let mut lines = reader.lines();
        let mut events = Vec::new();
        let mut line_number = 0;

        while let Some(line) = lines.next_line().await? {
            line_number += 1;
            if line.trim().is_empty() {
                continue;
            }
            let event: ProgressEvent = serde_json::from_str(&line).map_err(|source| {
                JournalError::Corrupt {
                    line: line_number,
                    source,
                }
            })?;
            events.push(event);
        }

        Ok(events)
    }

    /// Rebuild the user's progress store from the journal
    pub async fn load_store(&self) -> Result<MemoryProgressStore, JournalError> {
        let events = self.replay().await?;
        Ok(MemoryProgressStore::from_events(&events))
    }

    /// Release tag of the most recent event, if any
    pub async fn last_release(&self) -> Result<Option<String>, JournalError> {
        let events = self.replay().await?;
        Ok(events.into_iter().rev().find_map(|e| e.release))
    }
}

fn is_valid_user(user: &str) -> bool {
    !user.is_empty()
        && user != "."
        && user != ".."
        && user
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{TopicId, TopicState, TransitionKind};
    use crate::progress::ProgressStore;
    use tempfile::TempDir;

    fn transition(topic: &str, from: TopicState, to: TopicState) -> Transition {
        Transition {
            topic_id: TopicId::new(topic),
            kind: TransitionKind::Complete,
            from,
            to,
        }
    }

    #[test]
    fn test_user_name_validation() {
        assert!(ProgressJournal::new("/tmp", "alice").is_ok());
        assert!(ProgressJournal::new("/tmp", "user_1.backup-2").is_ok());
        assert!(matches!(
            ProgressJournal::new("/tmp", "../etc/passwd"),
            Err(JournalError::InvalidUser(_))
        ));
        assert!(ProgressJournal::new("/tmp", "").is_err());
        assert!(ProgressJournal::new("/tmp", "..").is_err());
    }

    #[tokio::test]
    async fn test_record_skips_no_op_transitions() {
        let temp = TempDir::new().unwrap();
        let journal = ProgressJournal::open(temp.path(), "alice").await.unwrap();

        let noop = transition("t1", TopicState::Completed, TopicState::Completed);
        assert!(journal.record(&noop, None).await.unwrap().is_none());
        assert!(!journal.path().exists());

        let real = transition("t1", TopicState::NotStarted, TopicState::Completed);
        let event = journal.record(&real, Some("r1")).await.unwrap().unwrap();
        assert_eq!(event.user, "alice");
        assert_eq!(event.release.as_deref(), Some("r1"));
    }

    #[tokio::test]
    async fn test_replay_order_and_store() {
        let temp = TempDir::new().unwrap();
        let journal = ProgressJournal::open(temp.path(), "bob").await.unwrap();

        journal
            .record(&transition("t1", TopicState::NotStarted, TopicState::InProgress), None)
            .await
            .unwrap();
        journal
            .record(&transition("t1", TopicState::InProgress, TopicState::Completed), Some("r2"))
            .await
            .unwrap();

        let events = journal.replay().await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].to, TopicState::InProgress);
        assert_eq!(events[1].to, TopicState::Completed);

        let store = journal.load_store().await.unwrap();
        assert_eq!(store.get(&TopicId::new("t1")), Some(TopicState::Completed));
        assert_eq!(journal.last_release().await.unwrap().as_deref(), Some("r2"));
    }

    #[tokio::test]
    async fn test_corrupt_line_is_reported() {
        let temp = TempDir::new().unwrap();
        let journal = ProgressJournal::open(temp.path(), "carol").await.unwrap();

        tokio::fs::write(journal.path(), "\n{not json}\n").await.unwrap();

        let err = journal.replay().await.unwrap_err();
        assert!(matches!(err, JournalError::Corrupt { line: 2, .. }));
    }

    #[tokio::test]
    async fn test_lock_is_exclusive_until_dropped() {
        use std::time::Duration;

        let temp = TempDir::new().unwrap();
        let journal = ProgressJournal::open(temp.path(), "erin").await.unwrap();
        let other = journal.clone();

        let held = journal.lock().await.unwrap();
        assert!(journal.lock_path().exists());
        assert!(
            tokio::time::timeout(Duration::from_millis(100), other.lock())
                .await
                .is_err()
        );

        drop(held);
        let reacquired = tokio::time::timeout(Duration::from_secs(5), other.lock()).await;
        assert!(matches!(reacquired, Ok(Ok(_))));
    }

    #[tokio::test]
    async fn test_missing_journal_is_empty() {
        let temp = TempDir::new().unwrap();
        let journal = ProgressJournal::new(temp.path(), "dave").unwrap();

        assert!(journal.replay().await.unwrap().is_empty());
        assert!(journal.load_store().await.unwrap().is_empty());
        assert_eq!(journal.last_release().await.unwrap(), None);
    }
}
