//! Daily and weekly schedule digests.

use std::fmt;
use std::sync::Arc;

use chrono::{Days, NaiveDate};
use futures::stream::{self, StreamExt};
use tokio::sync::Mutex;

use super::delivery::Delivery;
use crate::models::{DateRange, Event, NotificationKind};
use crate::services::{FetchOutcome, ScheduleSource};
use crate::storage::SettingsStore;
use crate::utils::time::today;

/// Which digest to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestKind {
    /// Today's lessons
    Daily,
    /// The seven days starting tomorrow
    Weekly,
}

impl DigestKind {
    pub fn notification_kind(self) -> NotificationKind {
        match self {
            DigestKind::Daily => NotificationKind::Daily,
            DigestKind::Weekly => NotificationKind::Weekly,
        }
    }

    /// Date window covered when run on `today`.
    pub fn range(self, today: NaiveDate) -> DateRange {
        match self {
            DigestKind::Daily => DateRange::single(today),
            DigestKind::Weekly => {
                let start = today.checked_add_days(Days::new(1)).unwrap_or(today);
                let end = start.checked_add_days(Days::new(6)).unwrap_or(start);
                DateRange::new(start, end)
            }
        }
    }

    pub fn title(self, group: &str) -> String {
        match self {
            DigestKind::Daily => format!("Сьогодні: {group}"),
            DigestKind::Weekly => format!("Тиждень: {group}"),
        }
    }
}

impl fmt::Display for DigestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DigestKind::Daily => write!(f, "daily"),
            DigestKind::Weekly => write!(f, "weekly"),
        }
    }
}

/// Summary of one digest run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DigestReport {
    pub groups: usize,
    pub groups_failed: usize,
    pub digests_sent: usize,
}

/// Sends schedule digests to every recipient with the toggle on.
pub struct DigestJob {
    source: Arc<dyn ScheduleSource>,
    settings: Arc<Mutex<SettingsStore>>,
    delivery: Delivery,
    max_concurrent: usize,
}

impl DigestJob {
    pub fn new(
        source: Arc<dyn ScheduleSource>,
        settings: Arc<Mutex<SettingsStore>>,
        delivery: Delivery,
        max_concurrent: usize,
    ) -> Self {
        Self {
            source,
            settings,
            delivery,
            max_concurrent: max_concurrent.max(1),
        }
    }

    pub async fn run(&self, kind: DigestKind) -> DigestReport {
        self.run_at(kind, today()).await
    }

    /// Run a digest as if the current Kyiv date were `today`.
    pub async fn run_at(&self, kind: DigestKind, today: NaiveDate) -> DigestReport {
        let notification = kind.notification_kind();
        let range = kind.range(today);
        let entities = self
            .settings
            .lock()
            .await
            .subscribed_entities(notification);

        log::info!(
            "Sending {} digest for {} groups ({} - {})",
            kind,
            entities.len(),
            range.start,
            range.end
        );

        let source = &self.source;
        let fetched: Vec<_> = stream::iter(entities)
            .map(|entity| async move {
                let outcome = source.fetch_schedule(&entity, Some(range)).await;
                (entity, outcome)
            })
            .buffered(self.max_concurrent)
            .collect()
            .await;

        let mut report = DigestReport {
            groups: fetched.len(),
            ..DigestReport::default()
        };

        for (entity, outcome) in fetched {
            let events: Vec<Event> = match outcome {
                FetchOutcome::Fetched(events) => events
                    .into_iter()
                    .filter(|e| range.contains(e.start_time().date_naive()))
                    .collect(),
                FetchOutcome::Failed(e) => {
                    log::warn!("No {} digest for {}: {}", kind, entity.display_name(), e);
                    report.groups_failed += 1;
                    continue;
                }
            };
            if events.is_empty() {
                log::debug!("Nothing scheduled for {}, no {} digest", entity.id, kind);
                continue;
            }

            let title = kind.title(entity.display_name());
            let recipients = self
                .settings
                .lock()
                .await
                .recipients_for(&entity.id, notification);
            for chat_id in recipients {
                if self.delivery.send_digest(chat_id, &title, &events).await {
                    report.digests_sent += 1;
                }
            }
        }

        log::info!(
            "{} digest done: {} sent, {} groups failed",
            kind,
            report.digests_sent,
            report.groups_failed
        );
        report
    }
}
