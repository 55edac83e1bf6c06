//! Periodic change detection over every subscribed group.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Mutex;

use super::delivery::Delivery;
use crate::models::NotificationKind;
use crate::services::format::format_changes;
use crate::services::{FetchOutcome, ScheduleSource};
use crate::storage::{ScheduleCache, SettingsStore};

/// Summary of one change-check run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckReport {
    pub entities_checked: usize,
    /// Failed or degraded fetches
    pub entities_skipped: usize,
    pub changes: usize,
    pub notifications_sent: usize,
}

/// Clears the running flag when a run ends, however it ends.
struct RunGuard<'a>(&'a AtomicBool);

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Fetches each subscribed group, diffs against the cache and notifies.
///
/// At most one run is in flight at a time.
pub struct ChangeCheckJob {
    source: Arc<dyn ScheduleSource>,
    cache: Arc<Mutex<ScheduleCache>>,
    settings: Arc<Mutex<SettingsStore>>,
    delivery: Delivery,
    running: AtomicBool,
}

impl ChangeCheckJob {
    pub fn new(
        source: Arc<dyn ScheduleSource>,
        cache: Arc<Mutex<ScheduleCache>>,
        settings: Arc<Mutex<SettingsStore>>,
        delivery: Delivery,
    ) -> Self {
        Self {
            source,
            cache,
            settings,
            delivery,
            running: AtomicBool::new(false),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Run one detection cycle.
    ///
    /// Returns `None` without doing anything if a cycle is already running.
    pub async fn run_once(&self) -> Option<CheckReport> {
        let Some(_guard) = RunGuard::acquire(&self.running) else {
            log::warn!("Change check already running, skipping this tick");
            return None;
        };

        let entities = self
            .settings
            .lock()
            .await
            .subscribed_entities(NotificationKind::Changes);
        log::info!("Checking {} groups for changes", entities.len());

        let mut report = CheckReport::default();
        for entity in entities {
            report.entities_checked += 1;

            let events = match self.source.fetch_schedule(&entity, None).await {
                FetchOutcome::Fetched(events) => events,
                FetchOutcome::Failed(e) => {
                    log::warn!("Skipping {}: {}", entity.display_name(), e);
                    report.entities_skipped += 1;
                    continue;
                }
            };

            let changes = {
                let mut cache = self.cache.lock().await;
                if events.is_empty() && cache.has_baseline(&entity.id) {
                    log::warn!(
                        "Empty schedule for {} with a stored baseline, skipping",
                        entity.display_name()
                    );
                    report.entities_skipped += 1;
                    continue;
                }
                cache.update_and_detect_changes(&entity.id, events).await
            };

            if changes.is_empty() {
                continue;
            }
            report.changes += changes.len();

            let text = format_changes(&changes);
            let recipients = self
                .settings
                .lock()
                .await
                .recipients_for(&entity.id, NotificationKind::Changes);
            for chat_id in recipients {
                if self.delivery.send_text(chat_id, &text).await {
                    report.notifications_sent += 1;
                }
            }
        }

        log::info!(
            "Change check done: {} checked, {} skipped, {} changes, {} sent",
            report.entities_checked,
            report.entities_skipped,
            report.changes,
            report.notifications_sent
        );
        Some(report)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;
    use tokio::sync::Notify;

    use crate::error::AppError;
    use crate::models::{DateRange, Event, TrackedEntity};
    use crate::services::{FetchOutcome, ScheduleSource};

    pub enum Reply {
        Events(Vec<Event>),
        Fail,
    }

    /// Schedule source replaying queued replies; an empty queue fails.
    #[derive(Default)]
    pub struct ScriptedSource {
        pub replies: StdMutex<VecDeque<Reply>>,
        pub calls: StdMutex<Vec<(String, Option<DateRange>)>>,
        /// Signalled on entry and awaited before answering, when set
        pub gate: Option<(std::sync::Arc<Notify>, std::sync::Arc<Notify>)>,
    }

    impl ScriptedSource {
        pub fn with(replies: Vec<Reply>) -> Self {
            Self {
                replies: StdMutex::new(replies.into()),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl ScheduleSource for ScriptedSource {
        async fn fetch_schedule(
            &self,
            entity: &TrackedEntity,
            range: Option<DateRange>,
        ) -> FetchOutcome {
            self.calls.lock().unwrap().push((entity.id.clone(), range));
            if let Some((entered, release)) = &self.gate {
                entered.notify_one();
                release.notified().await;
            }
            let reply = self.replies.lock().unwrap().pop_front();
            match reply {
                Some(Reply::Events(events)) => FetchOutcome::Fetched(events),
                Some(Reply::Fail) | None => {
                    FetchOutcome::Failed(AppError::fetch(&entity.id, "scripted failure"))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{Reply, ScriptedSource};
    use super::*;
    use crate::models::fixtures::lesson;
    use crate::models::Event;
    use crate::pipeline::delivery::testing::RecordingNotifier;
    use crate::storage::LocalStorage;
    use crate::utils::time::now_local;
    use chrono::Duration;
    use tempfile::TempDir;
    use tokio::sync::Notify;

    const GROUP: &str = "-4242";

    struct Harness {
        _tmp: TempDir,
        notifier: Arc<RecordingNotifier>,
        cache: Arc<Mutex<ScheduleCache>>,
        settings: Arc<Mutex<SettingsStore>>,
    }

    impl Harness {
        async fn new(subscribers: &[i64]) -> Self {
            let tmp = TempDir::new().unwrap();
            let storage = Arc::new(LocalStorage::new(tmp.path()));
            let mut settings = SettingsStore::open(storage.clone()).await;
            for &chat in subscribers {
                settings.set_group(chat, "КІ-24-1", GROUP).await;
                settings.toggle(chat, NotificationKind::Changes).await;
            }
            Self {
                _tmp: tmp,
                notifier: Arc::new(RecordingNotifier::default()),
                cache: Arc::new(Mutex::new(ScheduleCache::open(storage).await)),
                settings: Arc::new(Mutex::new(settings)),
            }
        }

        fn job(&self, source: ScriptedSource) -> ChangeCheckJob {
            let delivery = Delivery::new(self.notifier.clone(), self.settings.clone(), 5);
            ChangeCheckJob::new(
                Arc::new(source),
                self.cache.clone(),
                self.settings.clone(),
                delivery,
            )
        }
    }

    fn upcoming(subject: &str, hours: i64) -> Event {
        lesson(subject, now_local() + Duration::days(2) + Duration::hours(hours))
    }

    #[tokio::test]
    async fn test_first_run_baselines_then_reports_added() {
        let h = Harness::new(&[1, 2]).await;
        let e1 = upcoming("Фізика", 0);
        let e2 = upcoming("Хімія", 2);
        let job = h.job(ScriptedSource::with(vec![
            Reply::Events(vec![e1.clone()]),
            Reply::Events(vec![e1, e2]),
        ]));

        let first = job.run_once().await.unwrap();
        assert_eq!(first.entities_checked, 1);
        assert_eq!(first.changes, 0);
        assert!(h.notifier.sent.lock().unwrap().is_empty());

        let second = job.run_once().await.unwrap();
        assert_eq!(second.changes, 1);
        assert_eq!(second.notifications_sent, 2);
        for chat in [1, 2] {
            let sent = h.notifier.sent_to(chat);
            assert_eq!(sent.len(), 1);
            assert!(sent[0].contains("Хімія"));
        }
        assert_eq!(h.notifier.pinned.lock().unwrap().len(), 2);
        assert_eq!(
            h.settings.lock().await.get(1).unwrap().pinned_messages.len(),
            1
        );
        assert!(!job.is_running());
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_baseline() {
        let h = Harness::new(&[1]).await;
        let e1 = upcoming("Фізика", 0);
        let job = h.job(ScriptedSource::with(vec![
            Reply::Events(vec![e1.clone()]),
            Reply::Fail,
        ]));

        job.run_once().await.unwrap();
        let report = job.run_once().await.unwrap();

        assert_eq!(report.entities_skipped, 1);
        assert_eq!(report.changes, 0);
        assert!(h.notifier.sent.lock().unwrap().is_empty());
        assert_eq!(h.cache.lock().await.baseline(GROUP), Some(&[e1][..]));
    }

    #[tokio::test]
    async fn test_empty_fetch_with_baseline_is_not_mass_removal() {
        let h = Harness::new(&[1]).await;
        let e1 = upcoming("Фізика", 0);
        let job = h.job(ScriptedSource::with(vec![
            Reply::Events(vec![e1.clone()]),
            Reply::Events(vec![]),
        ]));

        job.run_once().await.unwrap();
        let report = job.run_once().await.unwrap();

        assert_eq!(report.entities_skipped, 1);
        assert!(h.notifier.sent.lock().unwrap().is_empty());
        assert!(h.cache.lock().await.has_baseline(GROUP));
    }

    #[tokio::test]
    async fn test_removed_lesson_is_reported() {
        let h = Harness::new(&[1]).await;
        let e1 = upcoming("Фізика", 0);
        let e2 = upcoming("Хімія", 2);
        let job = h.job(ScriptedSource::with(vec![
            Reply::Events(vec![e1.clone(), e2]),
            Reply::Events(vec![e1]),
        ]));

        job.run_once().await.unwrap();
        let report = job.run_once().await.unwrap();
        assert_eq!(report.changes, 1);

        let sent = h.notifier.sent_to(1);
        assert!(sent[0].contains("<s>"));
        assert!(sent[0].contains("Хімія"));
        assert_eq!(h.cache.lock().await.baseline(GROUP).map(<[Event]>::len), Some(1));
    }

    #[tokio::test]
    async fn test_unsubscribed_groups_are_not_fetched() {
        let h = Harness::new(&[]).await;
        let source = ScriptedSource::default();
        let job = h.job(source);
        let report = job.run_once().await.unwrap();
        assert_eq!(report, CheckReport::default());
    }

    #[tokio::test]
    async fn test_overlapping_run_is_refused() {
        let h = Harness::new(&[1]).await;
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let source = ScriptedSource {
            gate: Some((entered.clone(), release.clone())),
            ..ScriptedSource::with(vec![Reply::Events(vec![upcoming("Фізика", 0)])])
        };
        let job = Arc::new(h.job(source));

        let first = tokio::spawn({
            let job = job.clone();
            async move { job.run_once().await }
        });

        entered.notified().await;
        assert!(job.is_running());
        assert!(job.run_once().await.is_none());

        release.notify_one();
        let report = first.await.unwrap();
        assert!(report.is_some());
        assert!(!job.is_running());
    }
}
