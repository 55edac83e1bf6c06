//! Rozklad CLI
//!
//! Local entry point: runs the scheduler as a daemon or executes a single
//! job or query against the timetable service.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Datelike, Days};
use clap::{Parser, Subcommand};
use rozklad::{
    error::{AppError, Result},
    models::{Config, DateRange, Event, NotificationKind, TrackedEntity},
    pipeline::{ChangeCheckJob, Delivery, DigestJob, DigestKind, Scheduler},
    services::{
        LogNotifier, ScheduleSource, TimetableClient,
        format::{format_schedule, format_search_results},
        query::{ViewMode, filter_view, parse_day_month, resolve_target, search_upcoming},
    },
    storage::{LocalStorage, ScheduleCache, SettingsStore},
    utils::time::today,
};
use tokio::sync::Mutex;

/// Rozklad - University Timetable Watcher
#[derive(Parser, Debug)]
#[command(
    name = "rozklad",
    version,
    about = "Watches a university timetable and reports schedule changes"
)]
struct Cli {
    /// Path to storage directory holding config, cache and settings
    #[arg(short, long, default_value = "storage")]
    storage_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run change checks and digests until Ctrl-C
    Run,

    /// Run one change-detection cycle
    Check,

    /// Send a digest now
    Digest {
        /// Weekly instead of daily
        #[arg(long)]
        weekly: bool,
    },

    /// Print a group's schedule
    Show {
        /// Group name, e.g. КІ-24-1
        #[arg(short, long)]
        group: String,

        /// today, tomorrow, week or date
        #[arg(long, default_value = "today")]
        view: ViewMode,

        /// Explicit day as dd.mm
        #[arg(long)]
        date: Option<String>,
    },

    /// Search a group's upcoming lessons
    Search {
        #[arg(short, long)]
        group: String,

        query: String,
    },

    /// Look up teachers and rooms in the directory
    Find { query: String },

    /// Point a chat at a group and record its current schedule
    Subscribe {
        #[arg(long)]
        chat: i64,

        #[arg(short, long)]
        group: String,
    },

    /// Flip a chat's notification toggle (changes, daily, weekly)
    Toggle {
        #[arg(long)]
        chat: i64,

        kind: NotificationKind,
    },

    /// Validate the configuration file
    Validate,

    /// Show storage state
    Info,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Shared services for every command.
struct App {
    config: Arc<Config>,
    client: Arc<TimetableClient>,
    cache: Arc<Mutex<ScheduleCache>>,
    settings: Arc<Mutex<SettingsStore>>,
    delivery: Delivery,
}

impl App {
    async fn open(config: Config, storage_dir: &Path) -> Result<Self> {
        let config = Arc::new(config);
        let storage = Arc::new(LocalStorage::with_paths(
            storage_dir,
            config.paths.clone(),
        ));
        let client = Arc::new(TimetableClient::new(Arc::clone(&config))?);
        let cache = Arc::new(Mutex::new(ScheduleCache::open(storage.clone()).await));
        let settings = Arc::new(Mutex::new(SettingsStore::open(storage).await));
        let delivery = Delivery::new(
            Arc::new(LogNotifier::new()),
            settings.clone(),
            config.schedule.max_pinned_messages,
        );

        Ok(Self {
            config,
            client,
            cache,
            settings,
            delivery,
        })
    }

    fn check_job(&self) -> ChangeCheckJob {
        ChangeCheckJob::new(
            self.client.clone(),
            self.cache.clone(),
            self.settings.clone(),
            self.delivery.clone(),
        )
    }

    fn digest_job(&self) -> DigestJob {
        DigestJob::new(
            self.client.clone(),
            self.settings.clone(),
            self.delivery.clone(),
            self.config.timetable.max_concurrent,
        )
    }

    /// Resolve a group name the way users type it.
    async fn resolve_group(&self, name: &str) -> Result<TrackedEntity> {
        let name = name.trim().to_uppercase();
        match self.client.find_group_id(&name).await? {
            Some(id) => Ok(TrackedEntity::group(id, name)),
            None => Err(AppError::validation(format!("group '{name}' not found"))),
        }
    }

    async fn events(
        &self,
        entity: &TrackedEntity,
        range: Option<DateRange>,
    ) -> Result<Vec<Event>> {
        self.client
            .fetch_schedule(entity, range)
            .await
            .into_events()
            .ok_or_else(|| AppError::fetch(entity.display_name(), "schedule unavailable"))
    }
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_path = cli.storage_dir.join("config.toml");
    let config = Config::load_or_default(&config_path);

    let app = App::open(config, &cli.storage_dir).await?;

    match cli.command {
        Command::Run => {
            log::info!("Rozklad starting...");
            let check = Arc::new(app.check_job());
            let digests = Arc::new(app.digest_job());
            let handles = Scheduler::new(check, digests, app.config.schedule.clone()).spawn()?;

            tokio::signal::ctrl_c().await?;
            log::info!("Shutting down...");
            for handle in handles {
                handle.abort();
            }
            app.cache.lock().await.flush().await?;
        }

        Command::Check => {
            if let Some(report) = app.check_job().run_once().await {
                println!(
                    "{} groups checked, {} skipped, {} changes, {} notifications",
                    report.entities_checked,
                    report.entities_skipped,
                    report.changes,
                    report.notifications_sent
                );
            }
        }

        Command::Digest { weekly } => {
            let kind = if weekly {
                DigestKind::Weekly
            } else {
                DigestKind::Daily
            };
            let report = app.digest_job().run(kind).await;
            println!(
                "{} digest: {} sent, {} groups failed",
                kind, report.digests_sent, report.groups_failed
            );
        }

        Command::Show { group, view, date } => {
            let today = today();
            let explicit = match date {
                Some(value) => Some(parse_day_month(&value, today.year()).ok_or_else(|| {
                    AppError::validation(format!("'{value}' is not a dd.mm date"))
                })?),
                None => None,
            };
            let target = resolve_target(view, today, explicit);
            let last = target.checked_add_days(Days::new(6)).unwrap_or(target);

            let entity = app.resolve_group(&group).await?;
            let events = app.events(&entity, Some(DateRange::new(target, last))).await?;
            let events = filter_view(&events, view, target);

            if events.is_empty() {
                println!("Занять немає ({}, {})", entity.display_name(), target.format("%d.%m"));
            } else {
                let title = format!("{}: {}", target.format("%d.%m"), entity.display_name());
                println!("{}", format_schedule(&title, &events));
            }
        }

        Command::Search { group, query } => {
            let entity = app.resolve_group(&group).await?;
            let events = app.events(&entity, None).await?;
            let found = search_upcoming(&events, &query, today());
            println!("{}", format_search_results(&query, &found));
        }

        Command::Find { query } => {
            let entries = app.client.search_directory(&query).await?;
            if entries.is_empty() {
                println!("Nothing matches '{query}'");
            }
            for entry in entries {
                println!("{}: {} ({})", entry.kind.label(), entry.name, entry.id);
            }
        }

        Command::Subscribe { chat, group } => {
            let entity = app.resolve_group(&group).await?;
            app.settings
                .lock()
                .await
                .set_group(chat, entity.display_name(), &entity.id)
                .await;
            println!("Chat {} subscribed to {}", chat, entity.display_name());

            if app.cache.lock().await.is_tracked(&entity.id) {
                println!("Group already tracked, the change check keeps its baseline");
                return Ok(());
            }
            let events = app.events(&entity, None).await?;
            let count = events.len();
            if app.cache.lock().await.seed_baseline(&entity.id, events).await {
                println!("Baseline recorded: {} lessons", count);
            } else {
                println!("No lessons scheduled yet, the first check records the baseline");
            }
        }

        Command::Toggle { chat, kind } => {
            let enabled = app.settings.lock().await.toggle(chat, kind).await;
            println!(
                "Chat {}: {} notifications {}",
                chat,
                kind,
                if enabled { "on" } else { "off" }
            );
        }

        Command::Info => {
            println!("Storage directory: {}", cli.storage_dir.display());
            println!(
                "Config: {}",
                if config_path.exists() {
                    "loaded"
                } else {
                    "defaults"
                }
            );
            for path in [
                app.config.paths.cache_path(&cli.storage_dir),
                app.config.paths.settings_path(&cli.storage_dir),
            ] {
                let state = if path.exists() { "exists" } else { "not found" };
                println!("{}: {}", path.display(), state);
            }
            let cache = app.cache.lock().await;
            println!("Cached groups: {}", cache.len());
            let settings = app.settings.lock().await;
            println!("Recipients: {}", settings.users().count());
            for kind in [
                NotificationKind::Changes,
                NotificationKind::Daily,
                NotificationKind::Weekly,
            ] {
                println!(
                    "  {} subscriptions: {} groups",
                    kind,
                    settings.subscribed_entities(kind).len()
                );
            }
        }

        Command::Validate => {
            log::info!("Validating configuration...");
            if let Err(e) = app.config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK");
        }
    }

    Ok(())
}
