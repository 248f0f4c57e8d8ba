//! Progress Journal Integration Tests
//!
//! Tests that recorded transitions survive a restart, that concurrent
//! appends never interleave, and that locked sessions never act on stale
//! state.

use std::sync::Arc;

use curio::domain::{RawCategory, TopicId, TopicState, TransitionKind};
use curio::{
    load_catalog, progression, Catalog, ProgressJournal, ProgressStore, TransitionError,
};
use serde_json::json;
use tempfile::TempDir;

fn catalog() -> Arc<Catalog> {
    let raw: Vec<RawCategory> = serde_json::from_value(json!([
        {"id": "earth", "title": "Earth", "description": "d", "topics": [
            {"id": "t1", "title": "Rocks", "body": "b", "difficulty": "Beginner"},
            {"id": "t2", "title": "Plates", "body": "b", "difficulty": "Advanced", "locked": true}
        ]}
    ]))
    .unwrap();
    Arc::new(load_catalog(&raw).unwrap())
}

#[tokio::test]
async fn test_replay_restores_progress() {
    let temp = TempDir::new().unwrap();
    let catalog = catalog();
    let journal = ProgressJournal::open(temp.path(), "alice").await.unwrap();

    {
        let handle = progression(Arc::clone(&catalog), journal.load_store().await.unwrap());
        for transition in [
            handle.unlock("t2").unwrap(),
            handle.mark_opened("t2").unwrap(),
            handle.mark_completed("t1").unwrap(),
            handle.mark_completed("t1").unwrap(),
        ] {
            journal
                .record(&transition, Some(catalog.release()))
                .await
                .unwrap();
        }
    }

    // The repeated completion was a no-op and left no trace
    let events = journal.replay().await.unwrap();
    let kinds: Vec<_> = events.iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![
            TransitionKind::Unlock,
            TransitionKind::Open,
            TransitionKind::Complete
        ]
    );
    assert!(events.iter().all(|e| e.user == "alice"));

    let reopened = ProgressJournal::open(temp.path(), "alice").await.unwrap();
    let handle = progression(Arc::clone(&catalog), reopened.load_store().await.unwrap());

    assert_eq!(handle.state("t1"), Some(TopicState::Completed));
    assert_eq!(handle.state("t2"), Some(TopicState::InProgress));
    assert_eq!(handle.completion_ratio("earth"), 0.5);
    assert_eq!(
        reopened.last_release().await.unwrap().as_deref(),
        Some(catalog.release())
    );
}

#[tokio::test]
async fn test_journals_are_per_user() {
    let temp = TempDir::new().unwrap();
    let catalog = catalog();

    let alice = ProgressJournal::open(temp.path(), "alice").await.unwrap();
    let bob = ProgressJournal::open(temp.path(), "bob").await.unwrap();
    assert_ne!(alice.path(), bob.path());

    let handle = progression(Arc::clone(&catalog), alice.load_store().await.unwrap());
    alice
        .record(&handle.mark_completed("t1").unwrap(), None)
        .await
        .unwrap();

    let bob_handle = progression(catalog, bob.load_store().await.unwrap());
    assert_eq!(bob_handle.state("t1"), Some(TopicState::NotStarted));
}

#[tokio::test]
async fn test_events_for_removed_topics_are_ignored() {
    let temp = TempDir::new().unwrap();
    let journal = ProgressJournal::open(temp.path(), "carol").await.unwrap();

    tokio::fs::write(
        journal.path(),
        concat!(
            r#"{"id":"6f1c2a1e-1f5e-4b8a-9f53-0d7e4a1b2c3d","timestamp":"2026-01-05T10:00:00Z","user":"carol","topic_id":"gone","kind":"complete","from":"not_started","to":"completed"}"#,
            "\n",
            r#"{"id":"0b6d7c52-98a4-4c57-8d1e-2f3a4b5c6d7e","timestamp":"2026-01-05T10:01:00Z","user":"carol","topic_id":"t1","kind":"open","from":"not_started","to":"in_progress","release":"old"}"#,
            "\n"
        ),
    )
    .await
    .unwrap();

    let store = journal.load_store().await.unwrap();
    assert_eq!(store.len(), 2);
    assert_eq!(store.get(&TopicId::new("gone")), Some(TopicState::Completed));

    let handle = progression(catalog(), store);
    assert_eq!(handle.state("t1"), Some(TopicState::InProgress));
    assert_eq!(handle.state("gone"), None);
    assert_eq!(journal.last_release().await.unwrap().as_deref(), Some("old"));
}

#[tokio::test]
async fn test_concurrent_appends_stay_line_delimited() {
    let temp = TempDir::new().unwrap();
    let catalog = catalog();
    let journal = ProgressJournal::open(temp.path(), "dave").await.unwrap();

    let mut tasks = Vec::new();
    for _ in 0..10 {
        let journal = journal.clone();
        let catalog = Arc::clone(&catalog);
        tasks.push(tokio::spawn(async move {
            let handle = progression(catalog, curio::MemoryProgressStore::new());
            let transition = handle.mark_completed("t1").unwrap();
            journal.record(&transition, None).await.unwrap();
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let events = journal.replay().await.unwrap();
    assert_eq!(events.len(), 10);
    assert!(events.iter().all(|e| e.to == TopicState::Completed));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_locked_sessions_do_not_duplicate_unlocks() {
    let temp = TempDir::new().unwrap();
    let catalog = catalog();
    let journal = ProgressJournal::open(temp.path(), "erin").await.unwrap();

    let mut sessions = Vec::new();
    for _ in 0..2 {
        let journal = journal.clone();
        let catalog = Arc::clone(&catalog);
        sessions.push(tokio::spawn(async move {
            let _lock = journal.lock().await.unwrap();
            let handle = progression(Arc::clone(&catalog), journal.load_store().await.unwrap());
            let outcome = handle.unlock("t2");
            // Widen the gap between replay and append
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            if let Ok(transition) = &outcome {
                journal
                    .record(transition, Some(catalog.release()))
                    .await
                    .unwrap();
            }
            outcome
        }));
    }

    let mut outcomes = Vec::new();
    for session in sessions {
        outcomes.push(session.await.unwrap());
    }

    assert_eq!(outcomes.iter().filter(|o| o.is_ok()).count(), 1);
    assert!(outcomes
        .iter()
        .any(|o| matches!(o, Err(TransitionError::AlreadyUnlocked { .. }))));
    assert_eq!(journal.replay().await.unwrap().len(), 1);
}
