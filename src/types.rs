//! Common Types
//!
//! Shared data structures used across all engine modules. Everything here is
//! plain data: derived state is recomputed from the attempt log, never edited
//! out of band.

use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

pub type LearnerId = String;
pub type ItemId = String;
pub type TopicId = String;

// ==================== Constants ====================

/// Numerical stability epsilon
pub const EPSILON: f64 = 1e-10;

/// Ability a learner starts from before any evidence.
pub const DEFAULT_PRIOR_THETA: f64 = 0.0;

/// Uncertainty a learner starts from before any evidence.
pub const DEFAULT_PRIOR_SE: f64 = 1.0;

// ==================== Enums ====================

/// Operating mode of a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lane {
    #[default]
    Training,
    Retention,
}

impl Lane {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Training => "training",
            Self::Retention => "retention",
        }
    }

    pub fn other(&self) -> Self {
        match self {
            Self::Training => Self::Retention,
            Self::Retention => Self::Training,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MasteryLevel {
    Novice,
    Competent,
    Expert,
    Master,
}

impl MasteryLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Novice => "novice",
            Self::Competent => "competent",
            Self::Expert => "expert",
            Self::Master => "master",
        }
    }
}

// ==================== Ability ====================

/// Global ability estimate of one learner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbilityState {
    pub learner_id: LearnerId,
    pub theta: f64,
    pub se: f64,
    /// Number of attempts folded into this estimate.
    pub attempt_count: u64,
    pub updated_at: Option<DateTime<Utc>>,
}

impl AbilityState {
    pub fn initial(learner_id: impl Into<LearnerId>) -> Self {
        Self {
            learner_id: learner_id.into(),
            theta: DEFAULT_PRIOR_THETA,
            se: DEFAULT_PRIOR_SE,
            attempt_count: 0,
            updated_at: None,
        }
    }

    /// Reject estimates outside the valid domain (`range` is the grid span).
    pub fn validate(&self, range: (f64, f64)) -> Result<()> {
        validate_estimate(&self.learner_id, self.theta, self.se, range)
    }
}

pub(crate) fn validate_estimate(owner: &str, theta: f64, se: f64, range: (f64, f64)) -> Result<()> {
    if !theta.is_finite() || theta < range.0 - EPSILON || theta > range.1 + EPSILON {
        return Err(EngineError::corrupt(format!(
            "{owner}: theta {theta} outside [{}, {}]",
            range.0, range.1
        )));
    }
    if !se.is_finite() || se <= 0.0 {
        return Err(EngineError::corrupt(format!("{owner}: standard error {se} must be > 0")));
    }
    Ok(())
}

// ==================== Items and events ====================

/// Item as handed over by the content source, before calibration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemDefinition {
    pub id: ItemId,
    pub difficulty: Option<f64>,
    /// Ordered step thresholds; `None` falls back to binomial scoring.
    #[serde(default)]
    pub thresholds: Option<Vec<f64>>,
    /// Highest attainable score for binomial items.
    #[serde(default = "default_max_score")]
    pub max_score: u32,
    pub topic_ids: Vec<TopicId>,
    #[serde(default)]
    pub exposure_count: u32,
    #[serde(default)]
    pub last_shown_at: Option<DateTime<Utc>>,
    #[serde(default = "default_estimated_secs")]
    pub estimated_secs: f64,
    /// When the item is next due for review, if it is on a review schedule.
    #[serde(default)]
    pub due_at: Option<DateTime<Utc>>,
}

fn default_max_score() -> u32 {
    1
}

fn default_estimated_secs() -> f64 {
    30.0
}

impl ItemDefinition {
    pub fn new(id: impl Into<ItemId>, difficulty: f64, topic_ids: &[&str]) -> Self {
        Self {
            id: id.into(),
            difficulty: Some(difficulty),
            thresholds: None,
            max_score: 1,
            topic_ids: topic_ids.iter().map(|t| t.to_string()).collect(),
            exposure_count: 0,
            last_shown_at: None,
            estimated_secs: default_estimated_secs(),
            due_at: None,
        }
    }
}

/// One answered item. Immutable once logged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptEvent {
    pub learner_id: LearnerId,
    pub item_id: ItemId,
    pub topic_ids: Vec<TopicId>,
    /// Points earned: 0/1 for dichotomous items, a category index otherwise.
    pub score: u32,
    pub duration_secs: f64,
    pub timestamp: DateTime<Utc>,
}

// ==================== Per-topic state ====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicMastery {
    pub topic_id: TopicId,
    pub theta: f64,
    pub se: f64,
    pub mastery_probability: f64,
    pub level: Option<MasteryLevel>,
    pub lane: Lane,
    pub last_transition_at: Option<DateTime<Utc>>,
    pub attempts: u64,
    /// Full-marks flags of the most recent attempts, oldest first.
    pub recent_outcomes: VecDeque<bool>,
    /// Review memory stability in days, used while in the retention lane.
    pub review_stability_days: f64,
    pub next_review_at: Option<DateTime<Utc>>,
}

impl TopicMastery {
    pub fn fresh(topic_id: impl Into<TopicId>, initial_stability_days: f64) -> Self {
        Self {
            topic_id: topic_id.into(),
            theta: DEFAULT_PRIOR_THETA,
            se: DEFAULT_PRIOR_SE,
            mastery_probability: 0.0,
            level: None,
            lane: Lane::Training,
            last_transition_at: None,
            attempts: 0,
            recent_outcomes: VecDeque::new(),
            review_stability_days: initial_stability_days,
            next_review_at: None,
        }
    }

    pub fn validate(&self, range: (f64, f64)) -> Result<()> {
        validate_estimate(&self.topic_id, self.theta, self.se, range)?;
        if !(0.0..=1.0).contains(&self.mastery_probability) {
            return Err(EngineError::corrupt(format!(
                "{}: mastery probability {} outside [0, 1]",
                self.topic_id, self.mastery_probability
            )));
        }
        Ok(())
    }
}

/// Everything derived for one learner at a point in the attempt log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnerSnapshot {
    pub ability: AbilityState,
    pub topics: BTreeMap<TopicId, TopicMastery>,
}

impl LearnerSnapshot {
    pub fn new(learner_id: impl Into<LearnerId>) -> Self {
        Self {
            ability: AbilityState::initial(learner_id),
            topics: BTreeMap::new(),
        }
    }

    pub fn learner_id(&self) -> &str {
        &self.ability.learner_id
    }

    /// Lane of a topic; topics without a record are still in training.
    pub fn lane_of(&self, topic_id: &str) -> Lane {
        self.topics
            .get(topic_id)
            .map(|t| t.lane)
            .unwrap_or_default()
    }

    pub fn validate(&self, range: (f64, f64)) -> Result<()> {
        self.ability.validate(range)?;
        for topic in self.topics.values() {
            topic.validate(range)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RANGE: (f64, f64) = (-4.0, 4.0);

    #[test]
    fn test_initial_ability_is_valid() {
        let state = AbilityState::initial("u1");
        assert!(state.validate(RANGE).is_ok());
        assert_eq!(state.attempt_count, 0);
    }

    #[test]
    fn test_zero_se_is_state_corruption() {
        let mut state = AbilityState::initial("u1");
        state.se = 0.0;
        assert!(matches!(
            state.validate(RANGE),
            Err(EngineError::StateCorruption(_))
        ));
    }

    #[test]
    fn test_theta_outside_grid_is_state_corruption() {
        let mut state = AbilityState::initial("u1");
        state.theta = 7.5;
        assert!(state.validate(RANGE).is_err());
        state.theta = f64::NAN;
        assert!(state.validate(RANGE).is_err());
    }

    #[test]
    fn test_unknown_topic_defaults_to_training() {
        let snapshot = LearnerSnapshot::new("u1");
        assert_eq!(snapshot.lane_of("algebra"), Lane::Training);
    }

    #[test]
    fn test_mastery_levels_are_ordered() {
        assert!(MasteryLevel::Novice < MasteryLevel::Competent);
        assert!(MasteryLevel::Expert < MasteryLevel::Master);
        assert_eq!(Lane::Training.other(), Lane::Retention);
    }

    #[test]
    fn test_item_definition_defaults_from_json() {
        let raw = r#"{"id": "q1", "difficulty": 0.4, "topic_ids": ["t1"]}"#;
        let item: ItemDefinition = serde_json::from_str(raw).unwrap();
        assert_eq!(item.max_score, 1);
        assert!(item.thresholds.is_none());
        assert_eq!(item.exposure_count, 0);
    }
}
