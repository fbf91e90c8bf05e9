//! Exposure and Fatigue Tracker
//!
//! - Cooldown: an item shown within the cooldown window is held back unless
//!   one of its topics lags the blueprint by more than the override deficit
//! - Exposure multiplier: 1 / (1 + decay · count), floored
//! - Fatigue: a session-level level in [0, 1] from elapsed time and recent
//!   errors, turned into a per-item scalar that penalizes long items more

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{ExposureConfig, FatigueConfig};
use crate::types::EPSILON;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CooldownVerdict {
    /// Never shown, or shown before the window.
    Clear,
    /// Inside the window and held back.
    Cooling { hours_since: f64 },
    /// Inside the window but admitted because of a blueprint deficit.
    Overridden { hours_since: f64, deficit: f64 },
}

impl CooldownVerdict {
    pub fn is_eligible(&self) -> bool {
        !matches!(self, Self::Cooling { .. })
    }
}

pub fn hours_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> f64 {
    (later - earlier).num_milliseconds() as f64 / 3_600_000.0
}

pub fn cooldown_verdict(
    last_shown_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    topic_deficit: f64,
    config: &ExposureConfig,
) -> CooldownVerdict {
    let Some(last) = last_shown_at else {
        return CooldownVerdict::Clear;
    };
    let hours_since = hours_between(last, now);
    if hours_since >= config.cooldown_hours as f64 {
        return CooldownVerdict::Clear;
    }
    if topic_deficit > config.cooldown_override_deficit + EPSILON {
        CooldownVerdict::Overridden {
            hours_since,
            deficit: topic_deficit,
        }
    } else {
        CooldownVerdict::Cooling { hours_since }
    }
}

pub fn exposure_multiplier(exposure_count: u32, config: &ExposureConfig) -> f64 {
    (1.0 / (1.0 + config.exposure_decay * exposure_count as f64)).max(config.min_multiplier)
}

/// Session fatigue in [0, 1].
pub fn fatigue_level(elapsed_secs: f64, recent_outcomes: &[bool], config: &FatigueConfig) -> f64 {
    let minutes = elapsed_secs.max(0.0) / 60.0;
    let span = config.saturation_minutes - config.onset_minutes;
    let duration_component = ((minutes - config.onset_minutes) / span).clamp(0.0, 1.0);

    let window_start = recent_outcomes.len().saturating_sub(config.window);
    let window = &recent_outcomes[window_start..];
    let error_rate = if window.is_empty() {
        0.0
    } else {
        window.iter().filter(|&&correct| !correct).count() as f64 / window.len() as f64
    };

    let w = config.error_weight;
    ((1.0 - w) * duration_component + w * error_rate).clamp(0.0, 1.0)
}

/// Per-item fatigue scalar; long items lose more when the learner is tired.
pub fn fatigue_scalar(level: f64, estimated_secs: f64, config: &FatigueConfig) -> f64 {
    let length_weight = estimated_secs / (estimated_secs + config.reference_item_secs);
    1.0 - config.max_penalty * level.clamp(0.0, 1.0) * length_weight
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(hours: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap() + Duration::hours(hours)
    }

    fn config() -> ExposureConfig {
        ExposureConfig::default()
    }

    #[test]
    fn test_never_shown_is_clear() {
        assert_eq!(cooldown_verdict(None, at(0), 0.0, &config()), CooldownVerdict::Clear);
    }

    #[test]
    fn test_recent_exposure_cools_down() {
        let verdict = cooldown_verdict(Some(at(0)), at(95), 0.0, &config());
        assert!(matches!(verdict, CooldownVerdict::Cooling { hours_since } if hours_since == 95.0));
        assert!(!verdict.is_eligible());
    }

    #[test]
    fn test_window_ends_at_96_hours() {
        assert_eq!(cooldown_verdict(Some(at(0)), at(96), 0.0, &config()), CooldownVerdict::Clear);
    }

    #[test]
    fn test_deficit_over_eight_percent_overrides() {
        let verdict = cooldown_verdict(Some(at(0)), at(10), 0.09, &config());
        assert!(matches!(verdict, CooldownVerdict::Overridden { .. }));
        assert!(verdict.is_eligible());
        let at_limit = cooldown_verdict(Some(at(0)), at(10), 0.08, &config());
        assert!(!at_limit.is_eligible());
    }

    #[test]
    fn test_deficit_at_limit_from_real_proportions_still_cools() {
        // 21 of 50 attempts against a 0.5 target: deficit 0.08 plus rounding.
        let deficit = 0.5 - 21.0 / 50.0;
        assert!(deficit > 0.08);
        let verdict = cooldown_verdict(Some(at(0)), at(10), deficit, &config());
        assert!(matches!(verdict, CooldownVerdict::Cooling { .. }));
    }

    #[test]
    fn test_huge_cooldown_does_not_overflow() {
        let c = ExposureConfig {
            cooldown_hours: 9_000_000_000_000_000,
            ..config()
        };
        assert!(!cooldown_verdict(Some(at(0)), at(10_000), 0.0, &c).is_eligible());
    }

    #[test]
    fn test_exposure_multiplier_decays_to_floor() {
        let c = config();
        assert_eq!(exposure_multiplier(0, &c), 1.0);
        assert!(exposure_multiplier(3, &c) < exposure_multiplier(2, &c));
        assert_eq!(exposure_multiplier(10_000, &c), c.min_multiplier);
    }

    #[test]
    fn test_fresh_session_has_no_fatigue() {
        let c = FatigueConfig::default();
        assert_eq!(fatigue_level(5.0 * 60.0, &[true, true], &c), 0.0);
        assert_eq!(fatigue_scalar(0.0, 120.0, &c), 1.0);
    }

    #[test]
    fn test_long_error_prone_session_is_tiring() {
        let c = FatigueConfig::default();
        let level = fatigue_level(90.0 * 60.0, &[false; 10], &c);
        assert!((level - 1.0).abs() < 1e-12);
        let short = fatigue_scalar(level, 10.0, &c);
        let long = fatigue_scalar(level, 300.0, &c);
        assert!(long < short);
        assert!(long >= 1.0 - c.max_penalty);
    }

    #[test]
    fn test_only_recent_window_counts() {
        let c = FatigueConfig::default();
        let mut outcomes = vec![false; 30];
        outcomes.extend([true; 10]);
        assert_eq!(fatigue_level(0.0, &outcomes, &c), 0.0);
    }
}
