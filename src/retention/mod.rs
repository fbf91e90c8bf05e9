//! Retention Scheduler
//!
//! Review urgency, the session time split between review and new material,
//! and the next review date of a retained topic.
//!
//! - Overdue priority: 1 + rate · days_overdue (uncapped)
//! - Review share cap: 40% of session time, 60% once any due card is more
//!   than 7 days overdue
//! - Intervals follow the power-law forgetting curve
//!   R(t) = (1 + F · t / S)^D with F = 19/81, D = -0.5

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::RetentionConfig;
use crate::error::{EngineError, Result};

const DECAY: f64 = -0.5;
const FACTOR: f64 = 19.0 / 81.0;
const SECONDS_PER_DAY: f64 = 86_400.0;

pub fn overdue_days(due_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    ((now - due_at).num_seconds() as f64 / SECONDS_PER_DAY).max(0.0)
}

pub fn overdue_priority(days_overdue: f64, config: &RetentionConfig) -> f64 {
    1.0 + config.overdue_rate * days_overdue.max(0.0)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewBudget {
    pub cap: f64,
    pub relaxed: bool,
    pub used_share: f64,
    pub max_overdue_days: f64,
}

impl ReviewBudget {
    pub fn compute(
        review_secs: f64,
        elapsed_secs: f64,
        max_overdue_days: f64,
        config: &RetentionConfig,
    ) -> Self {
        let relaxed = max_overdue_days > config.relax_after_overdue_days;
        let cap = if relaxed {
            config.relaxed_review_share
        } else {
            config.review_share
        };
        let used_share = if elapsed_secs > 0.0 {
            (review_secs / elapsed_secs).clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            cap,
            relaxed,
            used_share,
            max_overdue_days,
        }
    }

    pub fn has_room(&self) -> bool {
        self.used_share < self.cap
    }
}

/// Recall probability `elapsed_days` after a review.
pub fn retrievability(stability_days: f64, elapsed_days: f64) -> f64 {
    if stability_days <= 0.0 {
        return 0.0;
    }
    (1.0 + FACTOR * elapsed_days.max(0.0) / stability_days).powf(DECAY)
}

pub fn next_interval_days(stability_days: f64, config: &RetentionConfig) -> f64 {
    let r = config.desired_retention.clamp(0.0001, 0.9999);
    let interval = stability_days / FACTOR * (r.powf(1.0 / DECAY) - 1.0);
    interval.clamp(1.0, config.max_interval_days)
}

/// Stability after a retention-lane review.
pub fn stability_after_review(
    stability_days: f64,
    full_marks: bool,
    mastery_probability: f64,
    config: &RetentionConfig,
) -> f64 {
    if full_marks {
        stability_days * (1.0 + config.stability_growth * mastery_probability.clamp(0.0, 1.0))
    } else {
        config.initial_stability_days
    }
}

pub fn next_due_at(
    reviewed_at: DateTime<Utc>,
    stability_days: f64,
    config: &RetentionConfig,
) -> Result<DateTime<Utc>> {
    let days = next_interval_days(stability_days, config);
    Duration::try_seconds((days * SECONDS_PER_DAY).round() as i64)
        .and_then(|interval| reviewed_at.checked_add_signed(interval))
        .ok_or_else(|| {
            EngineError::invalid(format!(
                "review interval of {days} days from {reviewed_at} is out of range"
            ))
        })
}
