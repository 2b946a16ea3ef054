use chrono::{DateTime, Utc};

use crate::db::{JobStore, StoreError};

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed,
    /// The requester must wait `retry_after_secs` more seconds.
    Exceeded { retry_after_secs: i64 },
}

impl RateDecision {
    pub fn is_exceeded(&self) -> bool {
        matches!(self, RateDecision::Exceeded { .. })
    }
}

/// Per-identity spacing between accepted requests, derived from a
/// requests-per-minute limit.
#[derive(Debug, Clone, Copy)]
pub struct RateLimiter {
    per_minute: u32,
}

impl RateLimiter {
    /// `per_minute` is clamped to at least 1.
    pub fn new(per_minute: u32) -> Self {
        Self {
            per_minute: per_minute.max(1),
        }
    }

    /// Minimum whole seconds between two accepted requests (`60 / limit`).
    pub fn waiting_time(&self) -> i64 {
        60 / i64::from(self.per_minute)
    }

    /// Decide from the last activity time of a requester.
    ///
    /// Elapsed time is truncated to whole seconds. A timestamp in the
    /// future counts as zero elapsed seconds.
    pub fn decide(&self, last_modified: Option<DateTime<Utc>>, now: DateTime<Utc>) -> RateDecision {
        let Some(last) = last_modified else {
            return RateDecision::Allowed;
        };

        let elapsed = (now - last).num_seconds().max(0);
        let waiting = self.waiting_time();

        if elapsed < waiting {
            RateDecision::Exceeded {
                retry_after_secs: waiting - elapsed,
            }
        } else {
            RateDecision::Allowed
        }
    }

    /// Look up the requester's most recent job and decide.
    pub async fn check(
        &self,
        jobs: &dyn JobStore,
        identity: &str,
        now: DateTime<Utc>,
    ) -> Result<RateDecision, StoreError> {
        let last = jobs.most_recent_job(identity).await?;
        Ok(self.decide(last.map(|job| job.modify_time), now))
    }
}
