//! Progress CLI subcommands.
//!
//! Provides commands to:
//! - `status`: Show the user's state for every topic
//! - `unlock`: Make a locked topic accessible
//! - `open`: Mark a topic as started
//! - `complete`: Mark a topic as finished
//! - `history`: Print the user's journal

use anyhow::{Context, Result};
use clap::Subcommand;

use super::Session;
use crate::domain::{TopicState, TransitionKind};

/// Progress-related subcommands
#[derive(Subcommand, Debug)]
pub enum ProgressCommands {
    /// Show topic states per category
    Status {
        /// Only this category
        #[arg(short, long)]
        category: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Unlock a topic
    Unlock {
        /// Topic ID
        topic_id: String,
    },

    /// Mark a topic as opened
    Open {
        /// Topic ID
        topic_id: String,
    },

    /// Mark a topic as completed
    Complete {
        /// Topic ID
        topic_id: String,
    },

    /// Show recorded progress events
    History {
        /// Maximum number of events to show (most recent last)
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
}

/// Execute progress subcommands
pub(crate) async fn execute(ctx: &Session, command: ProgressCommands) -> Result<()> {
    match command {
        ProgressCommands::Status { category, json } => {
            show_status(ctx, category.as_deref(), json).await
        }
        ProgressCommands::Unlock { topic_id } => {
            apply(ctx, &topic_id, TransitionKind::Unlock).await
        }
        ProgressCommands::Open { topic_id } => apply(ctx, &topic_id, TransitionKind::Open).await,
        ProgressCommands::Complete { topic_id } => {
            apply(ctx, &topic_id, TransitionKind::Complete).await
        }
        ProgressCommands::History { limit } => show_history(ctx, limit).await,
    }
}

/// Apply one transition and journal it.
///
/// The journal stays locked from replay to append so concurrent sessions
/// for the same user see each other's changes.
async fn apply(ctx: &Session, topic_id: &str, kind: TransitionKind) -> Result<()> {
    let catalog = ctx.catalog().await?;
    let journal = ctx.journal().await?;
    let _lock = journal
        .lock()
        .await
        .with_context(|| format!("Failed to lock {}", journal.lock_path().display()))?;
    let handle = ctx.attach(catalog, &journal).await?;

    let transition = match kind {
        TransitionKind::Unlock => handle.unlock(topic_id),
        TransitionKind::Open => handle.mark_opened(topic_id),
        TransitionKind::Complete => handle.mark_completed(topic_id),
    }?;

    let recorded = journal
        .record(&transition, Some(handle.catalog().release()))
        .await?;

    if recorded.is_some() {
        println!(
            "{}: {} -> {}",
            transition.topic_id, transition.from, transition.to
        );
    } else {
        println!("{}: already {}", transition.topic_id, transition.to);
    }

    Ok(())
}

/// Print per-category progress and topic states
async fn show_status(ctx: &Session, category: Option<&str>, json: bool) -> Result<()> {
    let (handle, _) = ctx.progression().await?;

    let categories: Vec<_> = match category {
        Some(id) => {
            let category = handle
                .catalog()
                .category(id)
                .ok_or_else(|| anyhow::anyhow!("Category not found: {}", id))?;
            vec![category]
        }
        None => handle.catalog().categories().iter().collect(),
    };

    if json {
        let rows: Vec<_> = categories
            .iter()
            .map(|c| {
                let topics: serde_json::Map<_, _> = handle
                    .category_states(c.id.as_str())
                    .into_iter()
                    .map(|(id, state)| (id.to_string(), serde_json::json!(state)))
                    .collect();
                serde_json::json!({
                    "progress": handle.category_progress(c.id.as_str()),
                    "topics": topics,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!("Progress for {}\n", ctx.user);

    for category in categories {
        let progress = handle.category_progress(category.id.as_str());
        println!(
            "{} ({}/{} complete, {:.0}%)",
            category.title,
            progress.completed,
            progress.total,
            progress.ratio() * 100.0
        );

        for (topic_id, state) in handle.category_states(category.id.as_str()) {
            let title = handle
                .catalog()
                .topic(topic_id.as_str())
                .map(|t| t.title.as_str())
                .unwrap_or_default();
            println!("  {} {:<16} {:<12} {}", marker(state), topic_id, state, title);
        }
        println!();
    }

    Ok(())
}

fn marker(state: TopicState) -> &'static str {
    match state {
        TopicState::Locked => "🔒",
        TopicState::NotStarted => "○",
        TopicState::InProgress => "◐",
        TopicState::Completed => "●",
    }
}

/// Print the most recent journal events
async fn show_history(ctx: &Session, limit: usize) -> Result<()> {
    let journal = ctx.journal().await?;
    let events = journal.replay().await?;

    if events.is_empty() {
        println!("No progress recorded for {}", ctx.user);
        return Ok(());
    }

    println!("{:<20} {:<16} {:<10} {:<26} {}", "TIME", "TOPIC", "ACTION", "CHANGE", "RELEASE");
    println!("{}", "-".repeat(90));

    let skip = events.len().saturating_sub(limit);
    for event in events.iter().skip(skip) {
        println!(
            "{:<20} {:<16} {:<10} {:<26} {}",
            event.timestamp.format("%Y-%m-%d %H:%M:%S"),
            event.topic_id,
            event.kind,
            format!("{} -> {}", event.from, event.to),
            event.release.as_deref().unwrap_or("-")
        );
    }

    Ok(())
}
