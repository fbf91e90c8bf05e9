//! Engine configuration.
//!
//! One immutable [`EngineConfig`] value is threaded through every call. There
//! is no global or environment lookup; hosts load it (usually from JSON) and
//! pass it in.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::types::MasteryLevel;

/// Longest cooldown accepted: 100 years.
pub const MAX_COOLDOWN_HOURS: i64 = 100 * 365 * 24;

/// Longest review interval accepted: 100 years.
pub const MAX_INTERVAL_DAYS: f64 = 36_500.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuadratureConfig {
    pub points: usize,
    pub min_theta: f64,
    pub max_theta: f64,
    /// Posterior SE never drops below this.
    pub min_se: f64,
}

impl Default for QuadratureConfig {
    fn default() -> Self {
        Self {
            points: 41,
            min_theta: -4.0,
            max_theta: 4.0,
            min_se: 0.01,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MasteryTier {
    pub level: MasteryLevel,
    pub min_theta: f64,
    pub max_se: f64,
    pub min_mastery: f64,
}

impl MasteryTier {
    pub fn admits(&self, theta: f64, se: f64, mastery_probability: f64) -> bool {
        theta >= self.min_theta && se <= self.max_se && mastery_probability >= self.min_mastery
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MasteryConfig {
    /// Ability above which a topic counts as mastered.
    pub mastery_cut: f64,
    /// Weight of smoothed recent accuracy against the posterior term.
    pub accuracy_weight: f64,
    pub history_window: usize,
    /// Ordered lowest to highest.
    pub tiers: Vec<MasteryTier>,
}

impl Default for MasteryConfig {
    fn default() -> Self {
        Self {
            mastery_cut: 0.0,
            accuracy_weight: 0.3,
            history_window: 20,
            tiers: vec![
                MasteryTier {
                    level: MasteryLevel::Novice,
                    min_theta: -0.5,
                    max_se: 0.30,
                    min_mastery: 0.70,
                },
                MasteryTier {
                    level: MasteryLevel::Competent,
                    min_theta: -0.2,
                    max_se: 0.25,
                    min_mastery: 0.80,
                },
                MasteryTier {
                    level: MasteryLevel::Expert,
                    min_theta: 0.0,
                    max_se: 0.20,
                    min_mastery: 0.85,
                },
                MasteryTier {
                    level: MasteryLevel::Master,
                    min_theta: 0.3,
                    max_se: 0.15,
                    min_mastery: 0.90,
                },
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BlueprintConfig {
    pub drift_threshold: f64,
    pub over_slope: f64,
    pub over_floor: f64,
    pub under_slope: f64,
    pub under_cap: f64,
}

impl Default for BlueprintConfig {
    fn default() -> Self {
        Self {
            drift_threshold: 0.05,
            over_slope: 2.0,
            over_floor: 0.2,
            under_slope: 3.0,
            under_cap: 1.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExposureConfig {
    pub cooldown_hours: i64,
    pub cooldown_override_deficit: f64,
    pub exposure_decay: f64,
    pub min_multiplier: f64,
}

impl Default for ExposureConfig {
    fn default() -> Self {
        Self {
            cooldown_hours: 96,
            cooldown_override_deficit: 0.08,
            exposure_decay: 0.15,
            min_multiplier: 0.1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FatigueConfig {
    pub onset_minutes: f64,
    pub saturation_minutes: f64,
    pub error_weight: f64,
    pub max_penalty: f64,
    pub reference_item_secs: f64,
    /// Recent outcomes considered for the error component.
    pub window: usize,
}

impl Default for FatigueConfig {
    fn default() -> Self {
        Self {
            onset_minutes: 25.0,
            saturation_minutes: 60.0,
            error_weight: 0.5,
            max_penalty: 0.5,
            reference_item_secs: 60.0,
            window: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RankerConfig {
    /// Relative spread of the sampled utility around its mean.
    pub exploration_scale: f64,
    pub min_estimated_secs: f64,
}

impl Default for RankerConfig {
    fn default() -> Self {
        Self {
            exploration_scale: 0.15,
            min_estimated_secs: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    pub overdue_rate: f64,
    pub review_share: f64,
    pub relaxed_review_share: f64,
    pub relax_after_overdue_days: f64,
    pub desired_retention: f64,
    pub initial_stability_days: f64,
    pub stability_growth: f64,
    pub max_interval_days: f64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            overdue_rate: 0.1,
            review_share: 0.40,
            relaxed_review_share: 0.60,
            relax_after_overdue_days: 7.0,
            desired_retention: 0.9,
            initial_stability_days: 1.0,
            stability_growth: 1.5,
            max_interval_days: 180.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LaneConfig {
    pub promote_mastery: f64,
    /// Half-width of the difficulty window a calibration probe must fall in.
    pub probe_window: f64,
}

impl Default for LaneConfig {
    fn default() -> Self {
        Self {
            promote_mastery: 0.85,
            probe_window: 0.3,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub quadrature: QuadratureConfig,
    pub mastery: MasteryConfig,
    pub blueprint: BlueprintConfig,
    pub exposure: ExposureConfig,
    pub fatigue: FatigueConfig,
    pub ranker: RankerConfig,
    pub retention: RetentionConfig,
    pub lanes: LaneConfig,
}

impl EngineConfig {
    /// Parse a (possibly partial) JSON overlay on top of the defaults.
    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let q = &self.quadrature;
        if q.points < 2 {
            return Err(config_err("quadrature.points must be at least 2"));
        }
        if !(q.min_theta.is_finite() && q.max_theta.is_finite()) || q.min_theta >= q.max_theta {
            return Err(config_err("quadrature range must be finite with min < max"));
        }
        check_positive("quadrature.min_se", q.min_se)?;

        let m = &self.mastery;
        check_unit("mastery.accuracy_weight", m.accuracy_weight)?;
        check_finite("mastery.mastery_cut", m.mastery_cut)?;
        if m.history_window == 0 {
            return Err(config_err("mastery.history_window must be positive"));
        }
        for pair in m.tiers.windows(2) {
            if pair[1].level <= pair[0].level {
                return Err(config_err("mastery.tiers must be ordered by level"));
            }
        }
        for tier in &m.tiers {
            check_finite("mastery tier min_theta", tier.min_theta)?;
            check_positive("mastery tier max_se", tier.max_se)?;
            check_unit("mastery tier min_mastery", tier.min_mastery)?;
        }

        let b = &self.blueprint;
        check_unit("blueprint.drift_threshold", b.drift_threshold)?;
        check_positive("blueprint.over_slope", b.over_slope)?;
        check_unit("blueprint.over_floor", b.over_floor)?;
        check_positive("blueprint.under_slope", b.under_slope)?;
        if !b.under_cap.is_finite() || b.under_cap < 1.0 {
            return Err(config_err("blueprint.under_cap must be >= 1"));
        }

        let e = &self.exposure;
        if !(0..=MAX_COOLDOWN_HOURS).contains(&e.cooldown_hours) {
            return Err(EngineError::Config(format!(
                "exposure.cooldown_hours must lie in [0, {MAX_COOLDOWN_HOURS}]"
            )));
        }
        check_unit("exposure.cooldown_override_deficit", e.cooldown_override_deficit)?;
        check_non_negative("exposure.exposure_decay", e.exposure_decay)?;
        check_unit("exposure.min_multiplier", e.min_multiplier)?;

        let f = &self.fatigue;
        check_non_negative("fatigue.onset_minutes", f.onset_minutes)?;
        if !f.saturation_minutes.is_finite() || f.saturation_minutes <= f.onset_minutes {
            return Err(config_err("fatigue.saturation_minutes must exceed onset_minutes"));
        }
        check_unit("fatigue.error_weight", f.error_weight)?;
        check_unit("fatigue.max_penalty", f.max_penalty)?;
        check_positive("fatigue.reference_item_secs", f.reference_item_secs)?;

        check_non_negative("ranker.exploration_scale", self.ranker.exploration_scale)?;
        check_positive("ranker.min_estimated_secs", self.ranker.min_estimated_secs)?;

        let r = &self.retention;
        check_non_negative("retention.overdue_rate", r.overdue_rate)?;
        check_share("retention.review_share", r.review_share)?;
        check_share("retention.relaxed_review_share", r.relaxed_review_share)?;
        if r.relaxed_review_share < r.review_share {
            return Err(config_err(
                "retention.relaxed_review_share must not be below review_share",
            ));
        }
        check_non_negative("retention.relax_after_overdue_days", r.relax_after_overdue_days)?;
        check_share("retention.desired_retention", r.desired_retention)?;
        check_positive("retention.initial_stability_days", r.initial_stability_days)?;
        check_non_negative("retention.stability_growth", r.stability_growth)?;
        if !r.max_interval_days.is_finite() || !(1.0..=MAX_INTERVAL_DAYS).contains(&r.max_interval_days) {
            return Err(EngineError::Config(format!(
                "retention.max_interval_days must lie in [1, {MAX_INTERVAL_DAYS}]"
            )));
        }
        if r.initial_stability_days > r.max_interval_days {
            return Err(config_err(
                "retention.initial_stability_days must not exceed max_interval_days",
            ));
        }

        check_unit("lanes.promote_mastery", self.lanes.promote_mastery)?;
        check_non_negative("lanes.probe_window", self.lanes.probe_window)?;

        Ok(())
    }
}

fn config_err(message: &str) -> EngineError {
    EngineError::Config(message.to_string())
}

fn check_finite(name: &str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(EngineError::Config(format!("{name} must be finite")))
    }
}

fn check_positive(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(EngineError::Config(format!("{name} must be positive")))
    }
}

fn check_non_negative(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(EngineError::Config(format!("{name} must not be negative")))
    }
}

fn check_unit(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(EngineError::Config(format!("{name} must lie in [0, 1]")))
    }
}

fn check_share(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(EngineError::Config(format!("{name} must lie in (0, 1]")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_default_grid_is_41_points_over_pm4() {
        let q = QuadratureConfig::default();
        assert_eq!(q.points, 41);
        assert_eq!(q.min_theta, -4.0);
        assert_eq!(q.max_theta, 4.0);
    }

    #[test]
    fn test_partial_json_overlays_defaults() {
        let config =
            EngineConfig::from_json(r#"{"exposure": {"cooldown_hours": 48}}"#).unwrap();
        assert_eq!(config.exposure.cooldown_hours, 48);
        assert_eq!(config.exposure.cooldown_override_deficit, 0.08);
        assert_eq!(config.retention.review_share, 0.40);
    }

    #[test]
    fn test_rejects_inverted_review_shares() {
        let raw = r#"{"retention": {"review_share": 0.7, "relaxed_review_share": 0.6}}"#;
        assert!(matches!(
            EngineConfig::from_json(raw),
            Err(EngineError::Config(_))
        ));
    }

    #[test]
    fn test_rejects_time_spans_beyond_a_century() {
        let raw = r#"{"exposure": {"cooldown_hours": 9000000000000000}}"#;
        assert!(matches!(EngineConfig::from_json(raw), Err(EngineError::Config(_))));

        let raw = r#"{"retention": {"initial_stability_days": 1e300, "max_interval_days": 1e300}}"#;
        assert!(matches!(EngineConfig::from_json(raw), Err(EngineError::Config(_))));

        let raw = r#"{"retention": {"initial_stability_days": 400, "max_interval_days": 365}}"#;
        assert!(matches!(EngineConfig::from_json(raw), Err(EngineError::Config(_))));

        let raw = r#"{"exposure": {"cooldown_hours": 876000}, "retention": {"max_interval_days": 36500}}"#;
        assert!(EngineConfig::from_json(raw).is_ok());
    }

    #[test]
    fn test_rejects_degenerate_grid() {
        let mut config = EngineConfig::default();
        config.quadrature.points = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_json_is_serde_error() {
        assert!(matches!(
            EngineConfig::from_json("{not json"),
            Err(EngineError::Serde(_))
        ));
    }
}
