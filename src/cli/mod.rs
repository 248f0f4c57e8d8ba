//! Command-line interface for curio.
//!
//! Provides commands for validating content, browsing and searching the
//! catalog, tracking per-user progress, and watching content for changes.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::catalog::{
    CatalogUpdate, CatalogWatcher, ContentSource, SearchCriteria, TopicRef, ValidationErrorList,
    WatcherConfig,
};
use crate::domain::Difficulty;
use crate::facade;
use crate::progress::{MemoryProgressStore, ProgressJournal, ProgressionHandle};

pub mod progress;

/// curio - Content catalog and progression engine
#[derive(Parser, Debug)]
#[command(name = "curio")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Content source: file, glob or URL (repeatable; overrides configuration)
    #[arg(short, long = "source", global = true)]
    pub sources: Vec<String>,

    /// User whose progress to use
    #[arg(short, long, global = true, env = "CURIO_USER")]
    pub user: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate content and report every problem found
    Validate,

    /// Search topics
    Search {
        /// Case-insensitive text to match in titles, bodies and key points
        text: Option<String>,

        /// Restrict to a category
        #[arg(short, long)]
        category: Option<String>,

        /// Restrict to a difficulty (beginner, intermediate, advanced)
        #[arg(short, long)]
        difficulty: Option<Difficulty>,

        /// Only locked topics
        #[arg(long, conflicts_with = "unlocked")]
        locked: bool,

        /// Only unlocked topics
        #[arg(long)]
        unlocked: bool,

        /// Apply lock filters to the user's progress instead of the authored defaults
        #[arg(long)]
        mine: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show a topic
    Show {
        /// Topic ID
        topic_id: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List categories with the user's completion
    Categories,

    /// Show catalog statistics
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Track and inspect progress
    Progress {
        #[command(subcommand)]
        command: progress::ProgressCommands,
    },

    /// Watch content sources and revalidate on change
    Watch,

    /// Show resolved configuration (debug)
    Config,
}

/// Resolved inputs shared by all commands
pub(crate) struct Session {
    pub sources: Vec<ContentSource>,
    pub user: String,
    pub progress_dir: PathBuf,
    pub debounce: std::time::Duration,
}

impl Session {
    fn resolve(sources: &[String], user: Option<String>) -> Result<Self> {
        let cfg = crate::config::config()?;

        let sources = if sources.is_empty() {
            cfg.content_sources.clone()
        } else {
            sources
                .iter()
                .map(|s| {
                    s.parse::<ContentSource>()
                        .with_context(|| format!("Invalid --source: {}", s))
                })
                .collect::<Result<Vec<_>>>()?
        };

        Ok(Self {
            sources,
            user: user.unwrap_or_else(|| cfg.default_user.clone()),
            progress_dir: cfg.progress_dir.clone(),
            debounce: cfg.watch_debounce,
        })
    }

    /// Load and validate the catalog
    pub async fn catalog(&self) -> Result<Arc<crate::catalog::Catalog>> {
        let catalog = facade::load_catalog_from(&self.sources)
            .await
            .with_context(|| format!("Failed to load content for {}", self.describe_sources()))?;
        Ok(Arc::new(catalog))
    }

    /// Open the user's journal
    pub async fn journal(&self) -> Result<ProgressJournal> {
        ProgressJournal::open(&self.progress_dir, &self.user)
            .await
            .with_context(|| format!("Failed to open progress journal for {}", self.user))
    }

    /// Catalog joined with the user's replayed progress
    pub async fn progression(
        &self,
    ) -> Result<(ProgressionHandle<MemoryProgressStore>, ProgressJournal)> {
        let catalog = self.catalog().await?;
        let journal = self.journal().await?;
        let handle = self.attach(catalog, &journal).await?;
        Ok((handle, journal))
    }

    /// Replay `journal` onto `catalog`, warning when the content has moved on
    pub async fn attach(
        &self,
        catalog: Arc<crate::catalog::Catalog>,
        journal: &ProgressJournal,
    ) -> Result<ProgressionHandle<MemoryProgressStore>> {
        let events = journal
            .replay()
            .await
            .with_context(|| format!("Failed to replay {}", journal.path().display()))?;

        if let Some(last) = events.iter().rev().find_map(|e| e.release.as_deref()) {
            if last != catalog.release() {
                tracing::warn!(
                    user = %self.user,
                    recorded = %last,
                    current = %catalog.release(),
                    "Progress was recorded against a different content release"
                );
            }
        }

        let store = MemoryProgressStore::from_events(&events);
        Ok(facade::progression(catalog, store))
    }

    fn describe_sources(&self) -> String {
        self.sources
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        if let Commands::Config = self.command {
            return show_config().await;
        }

        let ctx = Session::resolve(&self.sources, self.user)?;

        match self.command {
            Commands::Validate => validate_content(&ctx).await,
            Commands::Search {
                text,
                category,
                difficulty,
                locked,
                unlocked,
                mine,
                json,
            } => {
                let mut criteria = SearchCriteria::new();
                criteria.text = text;
                criteria.category_id = category;
                criteria.difficulty = difficulty;
                criteria.locked_only = locked;
                criteria.unlocked_only = unlocked;
                search_topics(&ctx, &criteria, mine, json).await
            }
            Commands::Show { topic_id, json } => show_topic(&ctx, &topic_id, json).await,
            Commands::Categories => list_categories(&ctx).await,
            Commands::Stats { json } => show_stats(&ctx, json).await,
            Commands::Progress { command } => progress::execute(&ctx, command).await,
            Commands::Watch => watch_content(&ctx).await,
            Commands::Config => show_config().await,
        }
    }
}

/// Validate content and print every error
async fn validate_content(ctx: &Session) -> Result<()> {
    let raw = crate::catalog::load_sources(&ctx.sources).await?;

    match facade::load_catalog(&raw) {
        Ok(catalog) => {
            println!(
                "OK: {} categories, {} topics (release {})",
                catalog.categories().len(),
                catalog.len(),
                catalog.release()
            );
            Ok(())
        }
        Err(errors) => {
            print_validation_errors(&errors);
            anyhow::bail!("Content failed validation with {} error(s)", errors.len())
        }
    }
}

fn print_validation_errors(errors: &ValidationErrorList) {
    for error in errors {
        println!("  ✗ {}", error);
    }
}

/// Search topics and print hits
async fn search_topics(
    ctx: &Session,
    criteria: &SearchCriteria,
    mine: bool,
    json: bool,
) -> Result<()> {
    if mine {
        let (handle, _) = ctx.progression().await?;
        let hits = handle.search(criteria);
        return print_hits(&hits, json);
    }

    let catalog = ctx.catalog().await?;
    let hits = facade::search(&catalog, criteria).to_vec();
    print_hits(&hits, json)
}

fn print_hits(hits: &[TopicRef<'_>], json: bool) -> Result<()> {
    if json {
        let rows: Vec<_> = hits
            .iter()
            .map(|hit| {
                serde_json::json!({
                    "topicId": hit.topic_id,
                    "categoryId": hit.category_id,
                    "title": hit.topic.title,
                    "difficulty": hit.topic.difficulty,
                    "matched": hit.matched,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if hits.is_empty() {
        println!("No topics found");
        return Ok(());
    }

    println!("{:<16} {:<16} {:<14} {}", "TOPIC", "CATEGORY", "DIFFICULTY", "TITLE");
    println!("{}", "-".repeat(72));

    for hit in hits {
        println!(
            "{:<16} {:<16} {:<14} {}",
            hit.topic_id,
            hit.category_id,
            hit.topic.difficulty,
            truncate(&hit.topic.title, 40)
        );
    }

    println!("\n{} topic(s)", hits.len());
    Ok(())
}

/// Show one topic with the user's state
async fn show_topic(ctx: &Session, topic_id: &str, json: bool) -> Result<()> {
    let (handle, _) = ctx.progression().await?;
    let topic = handle
        .catalog()
        .topic(topic_id)
        .with_context(|| format!("Topic not found: {}", topic_id))?;

    if json {
        println!("{}", serde_json::to_string_pretty(topic)?);
        return Ok(());
    }

    println!("{}", topic.title);
    println!("{}", "=".repeat(topic.title.chars().count()));
    println!();
    println!("ID:         {}", topic.id);
    if let Some(category) = handle.category_of(topic_id) {
        println!("Category:   {}", category);
    }
    println!("Difficulty: {}", topic.difficulty);
    if let Some(ref read_time) = topic.read_time {
        println!("Read time:  {}", read_time);
    }
    if let Some(state) = handle.state(topic_id) {
        println!("State:      {} ({})", state, ctx.user);
    }
    println!();
    println!("{}", topic.body);

    if !topic.key_points.is_empty() {
        println!("\nKey points:");
        for point in &topic.key_points {
            println!("  • {}", point);
        }
    }

    if !topic.facts.is_empty() {
        println!("\nFacts:");
        for fact in &topic.facts {
            println!("  • {}", fact);
        }
    }

    Ok(())
}

/// List categories in display order with completion
async fn list_categories(ctx: &Session) -> Result<()> {
    let (handle, _) = ctx.progression().await?;

    if handle.catalog().categories().is_empty() {
        println!("No categories");
        return Ok(());
    }

    println!("{:<16} {:<28} {:>7} {:>9}", "CATEGORY", "TITLE", "TOPICS", "COMPLETE");
    println!("{}", "-".repeat(63));

    for (category, progress) in handle.catalog().categories().iter().zip(handle.overview()) {
        println!(
            "{:<16} {:<28} {:>7} {:>8.0}%",
            category.id,
            truncate(&category.title, 28),
            progress.total,
            progress.ratio() * 100.0
        );
    }

    Ok(())
}

/// Print catalog statistics
async fn show_stats(ctx: &Session, json: bool) -> Result<()> {
    let catalog = ctx.catalog().await?;
    let stats = catalog.stats();

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("Release:    {}", stats.release);
    println!("Categories: {}", stats.categories);
    println!("Topics:     {}", stats.topics);
    println!("Locked:     {}", stats.locked_by_default);
    println!("\nBy difficulty:");
    for (difficulty, count) in &stats.by_difficulty {
        println!("  {:<14} {}", difficulty, count);
    }

    Ok(())
}

/// Watch sources until Ctrl-C, reporting each rebuild
async fn watch_content(ctx: &Session) -> Result<()> {
    let initial = crate::catalog::watcher::rebuild(&ctx.sources).await;
    report_update(&initial);

    let config = WatcherConfig::new(ctx.sources.clone()).with_debounce(ctx.debounce);
    let watcher = CatalogWatcher::new(config)?;
    let (mut updates, handle) = watcher.watch().await?;

    println!("Watching for content changes. Press Ctrl-C to stop.");

    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Some(update) => report_update(&update),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    handle.stop().await
}

fn report_update(update: &CatalogUpdate) {
    match update {
        CatalogUpdate::Reloaded(catalog) => println!(
            "[{}] OK: {} categories, {} topics (release {})",
            chrono::Local::now().format("%H:%M:%S"),
            catalog.categories().len(),
            catalog.len(),
            catalog.release()
        ),
        CatalogUpdate::Rejected(errors) => {
            println!(
                "[{}] Rejected: {} error(s)",
                chrono::Local::now().format("%H:%M:%S"),
                errors.len()
            );
            print_validation_errors(errors);
        }
        CatalogUpdate::Failed(reason) => println!(
            "[{}] Failed: {}",
            chrono::Local::now().format("%H:%M:%S"),
            reason
        ),
    }
}

/// Show resolved configuration
async fn show_config() -> Result<()> {
    let cfg = crate::config::config()?;

    println!("Curio Configuration");
    println!("===================");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Home:     {}", cfg.home.display());
    println!("  Progress: {}", cfg.progress_dir.display());
    println!();
    println!("Content sources:");
    for source in &cfg.content_sources {
        println!("  {}", source);
    }
    println!();
    println!("Default user:   {}", cfg.default_user);
    println!("Watch debounce: {}ms", cfg.watch_debounce.as_millis());

    Ok(())
}

/// Truncate to `max` characters, marking the cut with an ellipsis
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}
