//! Daily client certificate expiry check.
//!
//! Once a client key store is built, the "not valid after" instant of its
//! certificate is handed to an [`ExpiryMonitor`]. The monitor registers a
//! recurring task on a caller-supplied [`TaskScheduler`]: the first run is at
//! 09:00 local time (today, or tomorrow if that has already passed) and then
//! every 24 hours. Each run logs an error below `error_in_days` and a warning
//! below `warn_in_days`, and forwards the alert to an optional channel.

use crate::config::CertInfoConfig;
use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Local hour of the first check.
pub const CHECK_HOUR: u32 = 9;

/// Interval between two checks.
pub const CHECK_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExpiryLevel {
    Warning,
    Error,
}

/// Emitted by a check that found the certificate close to expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiryAlert {
    pub level: ExpiryLevel,
    /// Whole days left, truncated toward zero. Negative once expired.
    pub days_remaining: i64,
    pub not_after: DateTime<Utc>,
    pub checked_at: DateTime<Utc>,
}

/// Classify the remaining validity. The error threshold is tested first, so it
/// wins when it is configured above the warning threshold.
pub fn evaluate_expiry(not_after: DateTime<Utc>, now: DateTime<Utc>, config: &CertInfoConfig) -> Option<ExpiryAlert> {
    let days_remaining = (not_after - now).num_days();

    let level = if days_remaining < config.error_in_days {
        ExpiryLevel::Error
    } else if days_remaining < config.warn_in_days {
        ExpiryLevel::Warning
    } else {
        return None;
    };

    Some(ExpiryAlert {
        level,
        days_remaining,
        not_after,
        checked_at: now,
    })
}

/// Run one check: evaluate, log and forward the alert.
pub fn check_expiry(
    not_after: DateTime<Utc>,
    now: DateTime<Utc>,
    config: &CertInfoConfig,
    alert_sink: Option<&UnboundedSender<ExpiryAlert>>,
) -> Option<ExpiryAlert> {
    let Some(alert) = evaluate_expiry(not_after, now, config) else {
        debug!(%not_after, "Client certificate is not close to expiry");
        return None;
    };

    let message = if alert.days_remaining < 0 {
        format!("ssl client auth cert expired {} days ago", -alert.days_remaining)
    } else {
        format!("ssl client auth cert is going to expire in {} days", alert.days_remaining)
    };
    match alert.level {
        ExpiryLevel::Error => error!(%not_after, "{}", message),
        ExpiryLevel::Warning => warn!(%not_after, "{}", message),
    }

    if let Some(sink) = alert_sink {
        if sink.send(alert.clone()).is_err() {
            debug!("Expiry alert receiver dropped");
        }
    }

    Some(alert)
}

/// Next 09:00 in the time zone of `now`, or `now` itself at exactly 09:00.
pub fn first_run_at<Tz: TimeZone>(now: DateTime<Tz>) -> DateTime<Utc> {
    let tz = now.timezone();
    let at_check_hour = |date: NaiveDate| {
        date.and_hms_opt(CHECK_HOUR, 0, 0)
            .and_then(|local| tz.from_local_datetime(&local).earliest())
    };

    let today = now.date_naive();
    let next = match at_check_hour(today) {
        Some(run) if run >= now => Some(run),
        _ => today.succ_opt().and_then(at_check_hour),
    };

    match next {
        Some(run) => run.with_timezone(&Utc),
        // 09:00 does not exist locally (DST gap): fall back to a day from now
        None => now.with_timezone(&Utc) + chrono::Duration::days(1),
    }
}

pub type ScheduledFn = Arc<dyn Fn() + Send + Sync>;

/// Handle to a task registered with a [`TaskScheduler`].
///
/// Dropping the handle leaves the task running; call [`ScheduledTask::cancel`]
/// to stop it.
pub struct ScheduledTask {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl ScheduledTask {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A handle for a task that cannot be stopped.
    pub fn detached() -> Self {
        Self { cancel: None }
    }

    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for ScheduledTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledTask")
            .field("cancellable", &self.cancel.is_some())
            .finish()
    }
}

/// Runs recurring work on behalf of the monitor. The scheduler, not the
/// monitor, owns threads and runtimes.
pub trait TaskScheduler: Send + Sync {
    fn schedule_at_fixed_rate(&self, task: ScheduledFn, first_run: DateTime<Utc>, period: Duration) -> ScheduledTask;
}

/// Spawns recurring tasks on an existing tokio runtime.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Scheduler for the runtime the caller is running on, if any.
    pub fn try_current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }
}

impl TaskScheduler for TokioScheduler {
    fn schedule_at_fixed_rate(&self, task: ScheduledFn, first_run: DateTime<Utc>, period: Duration) -> ScheduledTask {
        let delay = (first_run - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        let period = period.max(Duration::from_secs(1));

        let join = self.handle.spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + delay, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                interval.tick().await;
                task();
            }
        });

        let abort = join.abort_handle();
        ScheduledTask::new(move || abort.abort())
    }
}

/// Outcome of [`ExpiryMonitor::schedule_expiry_check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchStatus {
    Scheduled { first_run: DateTime<Utc> },
    NoExpiry,
    Disabled,
    SchedulerUnavailable,
}

/// Keeps at most one expiry watch alive. Registering a new watch cancels the
/// previous one.
pub struct ExpiryMonitor {
    scheduler: Option<Arc<dyn TaskScheduler>>,
    alert_sink: Option<UnboundedSender<ExpiryAlert>>,
    current: Mutex<Option<ScheduledTask>>,
}

impl ExpiryMonitor {
    pub fn new(scheduler: Option<Arc<dyn TaskScheduler>>) -> Self {
        Self {
            scheduler,
            alert_sink: None,
            current: Mutex::new(None),
        }
    }

    /// Also deliver alerts on a channel.
    pub fn with_alert_sink(mut self, sink: UnboundedSender<ExpiryAlert>) -> Self {
        self.alert_sink = Some(sink);
        self
    }

    pub fn has_scheduler(&self) -> bool {
        self.scheduler.is_some()
    }

    pub fn schedule_expiry_check(&self, not_after: Option<DateTime<Utc>>, config: &CertInfoConfig) -> WatchStatus {
        // Held across the swap: at most one watch is registered at a time
        let mut current = self.current.lock();
        if let Some(previous) = current.take() {
            debug!("Cancelling previous expiry watch");
            previous.cancel();
        }

        let Some(not_after) = not_after else {
            debug!("No client certificate expiry available, skipping expiry check");
            return WatchStatus::NoExpiry;
        };

        if !config.enabled {
            debug!("Client certificate expiry check disabled");
            return WatchStatus::Disabled;
        }

        let Some(scheduler) = &self.scheduler else {
            warn!("No task scheduler available, client certificate expiry will not be checked");
            return WatchStatus::SchedulerUnavailable;
        };

        let first_run = first_run_at(Local::now());
        let check_config = config.clone();
        let alert_sink = self.alert_sink.clone();
        let task: ScheduledFn = Arc::new(move || {
            check_expiry(not_after, Utc::now(), &check_config, alert_sink.as_ref());
        });

        let scheduled = scheduler.schedule_at_fixed_rate(task, first_run, CHECK_PERIOD);
        *current = Some(scheduled);
        drop(current);

        info!(
            %not_after,
            %first_run,
            warn_in_days = config.warn_in_days,
            error_in_days = config.error_in_days,
            "Scheduled daily client certificate expiry check"
        );
        WatchStatus::Scheduled { first_run }
    }

    /// Stop the current watch, if any.
    pub fn cancel(&self) {
        if let Some(previous) = self.current.lock().take() {
            debug!("Cancelling previous expiry watch");
            previous.cancel();
        }
    }
}

impl fmt::Debug for ExpiryMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpiryMonitor")
            .field("has_scheduler", &self.scheduler.is_some())
            .field("has_alert_sink", &self.alert_sink.is_some())
            .field("current", &*self.current.lock())
            .finish()
    }
}
