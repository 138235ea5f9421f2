//! Execution modes for a unit of reconcile work.
//!
//! A [`Job`] either runs its work once (the process was kicked by an external
//! trigger such as a Cloud Scheduler or crontab entry) or keeps firing it on a
//! cron schedule until the cancellation token is triggered.

use crate::error::{Result, SlackdutyError};
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use std::str::FromStr;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// The wrapped unit of work. Called once per firing.
pub type Work = Arc<dyn Fn() -> BoxFuture<'static, Result<()>> + Send + Sync>;

// ---------------------------------------------------------------------------
// CronSchedule
// ---------------------------------------------------------------------------

/// A parsed cron pattern.
///
/// Five-field patterns (`min hour dom month dow`) fire at second zero;
/// six-field patterns carry their own seconds column. `@hourly`-style
/// shorthands are passed through.
#[derive(Debug, Clone)]
pub struct CronSchedule {
    pattern: String,
    schedule: cron::Schedule,
}

impl CronSchedule {
    pub fn parse(pattern: &str) -> Result<Self> {
        let invalid = |reason: String| SlackdutyError::InvalidSchedule {
            pattern: pattern.to_string(),
            reason,
        };
        let trimmed = pattern.trim();
        let normalized = if trimmed.starts_with('@') {
            trimmed.to_string()
        } else {
            match trimmed.split_whitespace().count() {
                5 => format!("0 {trimmed}"),
                6 => trimmed.to_string(),
                n => return Err(invalid(format!("expected 5 or 6 fields, got {n}"))),
            }
        };
        let schedule = cron::Schedule::from_str(&normalized).map_err(|e| invalid(e.to_string()))?;
        Ok(Self {
            pattern: pattern.to_string(),
            schedule,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// First firing strictly after `after`.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&after).next()
    }
}

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

pub enum Job {
    OneShot {
        name: String,
        work: Work,
    },
    Recurring {
        name: String,
        work: Work,
        schedule: CronSchedule,
    },
}

impl Job {
    pub fn one_shot(name: impl Into<String>, work: Work) -> Self {
        Self::OneShot {
            name: name.into(),
            work,
        }
    }

    pub fn recurring(name: impl Into<String>, work: Work, pattern: &str) -> Result<Self> {
        Ok(Self::Recurring {
            name: name.into(),
            work,
            schedule: CronSchedule::parse(pattern)?,
        })
    }

    pub fn name(&self) -> &str {
        match self {
            Self::OneShot { name, .. } | Self::Recurring { name, .. } => name,
        }
    }

    /// One-shot jobs return the work's result; `cancel` is not consulted once
    /// the work has started.
    ///
    /// Recurring jobs return `Ok(())` after `cancel` fires (or the schedule has
    /// no further firings). Per-firing errors are logged, never returned, and
    /// firings still in progress at cancellation are awaited first.
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        match self {
            Self::OneShot { work, .. } => work().await,
            Self::Recurring {
                name,
                work,
                schedule,
            } => {
                run_recurring(name, work, schedule, cancel).await;
                Ok(())
            }
        }
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OneShot { name, .. } => f.debug_struct("OneShot").field("name", name).finish(),
            Self::Recurring { name, schedule, .. } => f
                .debug_struct("Recurring")
                .field("name", name)
                .field("schedule", &schedule.pattern())
                .finish(),
        }
    }
}

async fn run_recurring(name: &str, work: &Work, schedule: &CronSchedule, cancel: CancellationToken) {
    let mut firings = JoinSet::new();
    let mut last_fired: Option<DateTime<Utc>> = None;

    loop {
        let now = Utc::now();
        let from = last_fired.map_or(now, |last| last.max(now));
        let Some(next) = schedule.next_after(from) else {
            info!(job = %name, schedule = %schedule.pattern(), "schedule has no further firings");
            break;
        };
        let wait = (next - now).to_std().unwrap_or_default();
        debug!(job = %name, next = %next, "waiting for next firing");

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(wait) => {}
        }
        last_fired = Some(next);

        let work = work.clone();
        let job = name.to_string();
        firings.spawn(async move {
            info!(job = %job, "job fired");
            if let Err(e) = work().await {
                error!(job = %job, error = %e, "scheduled run failed");
            }
        });
        while let Some(done) = firings.try_join_next() {
            if let Err(e) = done {
                error!(job = %name, error = %e, "scheduled run panicked");
            }
        }
    }

    info!(job = %name, in_flight = firings.len(), "stopping recurring job");
    while let Some(done) = firings.join_next().await {
        if let Err(e) = done {
            error!(job = %name, error = %e, "scheduled run panicked");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
