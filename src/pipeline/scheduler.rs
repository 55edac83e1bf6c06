//! Background job scheduling.
//!
//! The change check runs on a fixed interval; digests run at Kyiv
//! wall-clock times. Every job lives on its own tokio task so a slow
//! fetch in one never holds up another.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Datelike, Days, FixedOffset, NaiveTime, Weekday};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::check::ChangeCheckJob;
use super::digest::{DigestJob, DigestKind};
use crate::error::{AppError, Result};
use crate::models::ScheduleConfig;
use crate::utils::time::{localize, now_local};

/// Next instant strictly after `now` at wall-clock `at`.
///
/// With `weekday` set only that day of the week qualifies. Days on which
/// `at` does not exist in Kyiv are skipped.
pub fn next_run_after(
    now: DateTime<FixedOffset>,
    at: NaiveTime,
    weekday: Option<Weekday>,
) -> Option<DateTime<FixedOffset>> {
    let today = now.date_naive();
    (0..=8u64)
        .filter_map(|offset| today.checked_add_days(Days::new(offset)))
        .filter(|date| weekday.is_none_or(|w| date.weekday() == w))
        .filter_map(|date| localize(date, at))
        .find(|candidate| *candidate > now)
}

/// Owns the periodic jobs until [`Scheduler::spawn`] hands them to tokio.
pub struct Scheduler {
    check: Arc<ChangeCheckJob>,
    digests: Arc<DigestJob>,
    config: ScheduleConfig,
}

impl Scheduler {
    pub fn new(check: Arc<ChangeCheckJob>, digests: Arc<DigestJob>, config: ScheduleConfig) -> Self {
        Self {
            check,
            digests,
            config,
        }
    }

    /// Start every job, returning their task handles.
    ///
    /// Fails if a digest time or weekday in the config is invalid.
    pub fn spawn(self) -> Result<Vec<JoinHandle<()>>> {
        let daily_at = self.config.daily_at()?;
        let weekly_at = self.config.weekly_at()?;
        let weekly_day = u8::try_from(self.config.weekly_weekday)
            .ok()
            .and_then(|day| Weekday::try_from(day).ok())
            .ok_or_else(|| {
                AppError::validation(format!(
                    "schedule.weekly_weekday {} is not in 0..=6",
                    self.config.weekly_weekday
                ))
            })?;

        log::info!(
            "Scheduler starting: check every {}s, daily at {}, weekly on {} at {}",
            self.config.check_interval_secs,
            daily_at.format("%H:%M"),
            weekly_day,
            weekly_at.format("%H:%M")
        );

        Ok(vec![
            spawn_check_loop(
                self.check,
                Duration::from_secs(self.config.first_check_delay_secs),
                Duration::from_secs(self.config.check_interval_secs.max(1)),
            ),
            spawn_digest_loop(self.digests.clone(), DigestKind::Daily, daily_at, None),
            spawn_digest_loop(self.digests, DigestKind::Weekly, weekly_at, Some(weekly_day)),
        ])
    }
}

fn spawn_check_loop(job: Arc<ChangeCheckJob>, delay: Duration, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(Instant::now() + delay, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            // detached so a long run cannot delay the next tick; the job
            // itself refuses to overlap
            let job = job.clone();
            tokio::spawn(async move {
                job.run_once().await;
            });
        }
    })
}

fn spawn_digest_loop(
    job: Arc<DigestJob>,
    kind: DigestKind,
    at: NaiveTime,
    weekday: Option<Weekday>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let now = now_local();
            let Some(next) = next_run_after(now, at, weekday) else {
                log::error!("No upcoming slot for the {} digest, stopping", kind);
                return;
            };
            let wait = (next - now).to_std().unwrap_or_default();
            log::debug!("Next {} digest at {}", kind, next);

            tokio::time::sleep(wait).await;
            job.run(kind).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NotificationKind;
    use crate::models::fixtures::kyiv;
    use crate::pipeline::check::testing::{Reply, ScriptedSource};
    use crate::pipeline::delivery::Delivery;
    use crate::pipeline::delivery::testing::RecordingNotifier;
    use crate::storage::{LocalStorage, ScheduleCache, SettingsStore};
    use tempfile::TempDir;
    use tokio::sync::{Mutex, Notify};

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_next_daily_run_later_today() {
        let now = kyiv(2026, 10, 19, 4, 0);
        let next = next_run_after(now, hm(5, 0), None).unwrap();
        assert_eq!(next, kyiv(2026, 10, 19, 5, 0));
    }

    #[test]
    fn test_next_daily_run_rolls_to_tomorrow() {
        let now = kyiv(2026, 10, 19, 5, 0);
        let next = next_run_after(now, hm(5, 0), None).unwrap();
        assert_eq!(next.date_naive(), kyiv(2026, 10, 20, 0, 0).date_naive());
        assert_eq!(next.time(), hm(5, 0));
    }

    #[test]
    fn test_next_weekly_run() {
        // Monday afternoon, weekly digest on Mondays at 15:00 already passed
        let now = kyiv(2026, 10, 19, 16, 0);
        let next = next_run_after(now, hm(15, 0), Some(Weekday::Mon)).unwrap();
        assert_eq!(next.date_naive(), kyiv(2026, 10, 26, 0, 0).date_naive());

        let next = next_run_after(now, hm(15, 0), Some(Weekday::Thu)).unwrap();
        assert_eq!(next.date_naive(), kyiv(2026, 10, 22, 0, 0).date_naive());
    }

    #[test]
    fn test_skipped_wall_clock_time_moves_to_next_day() {
        // 03:30 does not exist on 2026-03-29 in Kyiv
        let now = kyiv(2026, 3, 28, 12, 0);
        let next = next_run_after(now, hm(3, 30), None).unwrap();
        assert_eq!(next.date_naive(), chrono::NaiveDate::from_ymd_opt(2026, 3, 30).unwrap());
    }

    #[tokio::test]
    async fn test_bad_weekday_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let (check, digests) = jobs(&tmp, ScriptedSource::default()).await;
        let config = ScheduleConfig {
            weekly_weekday: 9,
            ..ScheduleConfig::default()
        };
        assert!(Scheduler::new(check, digests, config).spawn().is_err());
    }

    #[tokio::test]
    async fn test_first_check_runs_after_delay() {
        let tmp = TempDir::new().unwrap();
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let source = ScriptedSource {
            gate: Some((entered.clone(), release.clone())),
            ..ScriptedSource::with(vec![Reply::Events(vec![])])
        };
        let (check, digests) = jobs(&tmp, source).await;
        let config = ScheduleConfig {
            first_check_delay_secs: 0,
            ..ScheduleConfig::default()
        };

        let handles = Scheduler::new(check, digests, config).spawn().unwrap();
        let fetched = tokio::time::timeout(Duration::from_secs(5), entered.notified()).await;
        assert!(fetched.is_ok());

        release.notify_one();
        for handle in handles {
            handle.abort();
        }
    }

    async fn jobs(tmp: &TempDir, source: ScriptedSource) -> (Arc<ChangeCheckJob>, Arc<DigestJob>) {
        let storage = Arc::new(LocalStorage::new(tmp.path()));
        let mut settings = SettingsStore::open(storage.clone()).await;
        settings.set_group(1, "КІ-24-1", "-4242").await;
        settings.toggle(1, NotificationKind::Changes).await;

        let settings = Arc::new(Mutex::new(settings));
        let cache = Arc::new(Mutex::new(ScheduleCache::open(storage).await));
        let source: Arc<ScriptedSource> = Arc::new(source);
        let delivery = Delivery::new(
            Arc::new(RecordingNotifier::default()),
            settings.clone(),
            5,
        );

        let check = ChangeCheckJob::new(source.clone(), cache, settings.clone(), delivery.clone());
        let digests = DigestJob::new(source, settings, delivery, 1);
        (Arc::new(check), Arc::new(digests))
    }
}
