//! Blueprint Compliance Monitor
//!
//! Compares observed practice proportions per topic with the exam blueprint
//! and produces a multiplier per topic:
//! - |drift| ≤ threshold → 1
//! - over-represented → max(floor, 1 - drift · over_slope)
//! - under-represented → min(cap, 1 + |drift| · under_slope)
//!
//! where drift = observed - target.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::BlueprintConfig;
use crate::error::{EngineError, Result};
use crate::types::{AttemptEvent, TopicId, EPSILON};

const SUM_TOLERANCE: f64 = 1e-6;

/// Target topic proportions; read-only for a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<TopicId, f64>", into = "BTreeMap<TopicId, f64>")]
pub struct BlueprintTarget {
    targets: BTreeMap<TopicId, f64>,
}

impl BlueprintTarget {
    pub fn new(targets: BTreeMap<TopicId, f64>) -> Result<Self> {
        if targets.is_empty() {
            return Err(EngineError::invalid("blueprint has no topics"));
        }
        for (topic, p) in &targets {
            if !p.is_finite() || *p < 0.0 {
                return Err(EngineError::invalid(format!(
                    "blueprint proportion for {topic} is {p}"
                )));
            }
        }
        let sum: f64 = targets.values().sum();
        if (sum - 1.0).abs() > SUM_TOLERANCE {
            return Err(EngineError::invalid(format!(
                "blueprint proportions sum to {sum}, expected 1"
            )));
        }
        Ok(Self { targets })
    }

    pub fn from_pairs(pairs: &[(&str, f64)]) -> Result<Self> {
        Self::new(pairs.iter().map(|(t, p)| (t.to_string(), *p)).collect())
    }

    /// Target for a topic; topics outside the blueprint target 0.
    pub fn target(&self, topic_id: &str) -> f64 {
        self.targets.get(topic_id).copied().unwrap_or(0.0)
    }

    pub fn topics(&self) -> impl Iterator<Item = &TopicId> {
        self.targets.keys()
    }
}

impl TryFrom<BTreeMap<TopicId, f64>> for BlueprintTarget {
    type Error = EngineError;

    fn try_from(targets: BTreeMap<TopicId, f64>) -> Result<Self> {
        Self::new(targets)
    }
}

impl From<BlueprintTarget> for BTreeMap<TopicId, f64> {
    fn from(target: BlueprintTarget) -> Self {
        target.targets
    }
}

/// Observed topic proportions, recomputed every selection cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PracticeDistribution {
    proportions: BTreeMap<TopicId, f64>,
    pub attempts: usize,
}

impl PracticeDistribution {
    /// Each attempt is split evenly across its topics.
    pub fn from_topic_sets<'a, I>(topic_sets: I) -> Self
    where
        I: IntoIterator<Item = &'a [TopicId]>,
    {
        let mut weights: BTreeMap<TopicId, f64> = BTreeMap::new();
        let mut attempts = 0usize;
        for topics in topic_sets {
            if topics.is_empty() {
                continue;
            }
            attempts += 1;
            let share = 1.0 / topics.len() as f64;
            for topic in topics {
                *weights.entry(topic.clone()).or_default() += share;
            }
        }
        if attempts > 0 {
            for w in weights.values_mut() {
                *w /= attempts as f64;
            }
        }
        Self {
            proportions: weights,
            attempts,
        }
    }

    pub fn from_attempts(events: &[AttemptEvent]) -> Self {
        Self::from_topic_sets(events.iter().map(|e| e.topic_ids.as_slice()))
    }

    pub fn observed(&self, topic_id: &str) -> f64 {
        self.proportions.get(topic_id).copied().unwrap_or(0.0)
    }

    pub fn topics(&self) -> impl Iterator<Item = &TopicId> {
        self.proportions.keys()
    }
}

pub fn drift(observed: f64, target: f64) -> f64 {
    observed - target
}

/// Multiplier for one topic given its drift. Drift exactly at the threshold
/// (up to rounding in the observed proportion) is still in tolerance.
pub fn blueprint_multiplier(drift: f64, config: &BlueprintConfig) -> f64 {
    if drift.abs() <= config.drift_threshold + EPSILON {
        1.0
    } else if drift > 0.0 {
        (1.0 - drift * config.over_slope).max(config.over_floor)
    } else {
        (1.0 + drift.abs() * config.under_slope).min(config.under_cap)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicCompliance {
    pub target: f64,
    pub observed: f64,
    pub drift: f64,
    pub multiplier: f64,
}

impl TopicCompliance {
    /// How far the topic lags its target (positive when under-practised).
    pub fn deficit(&self) -> f64 {
        -self.drift
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub topics: BTreeMap<TopicId, TopicCompliance>,
}

impl ComplianceReport {
    pub fn assess(
        target: &BlueprintTarget,
        observed: &PracticeDistribution,
        config: &BlueprintConfig,
    ) -> Self {
        let mut topics = BTreeMap::new();
        for topic in target.topics().chain(observed.topics()) {
            if topics.contains_key(topic) {
                continue;
            }
            let t = target.target(topic);
            let o = observed.observed(topic);
            let d = drift(o, t);
            topics.insert(
                topic.clone(),
                TopicCompliance {
                    target: t,
                    observed: o,
                    drift: d,
                    multiplier: blueprint_multiplier(d, config),
                },
            );
        }
        Self { topics }
    }

    pub fn multiplier(&self, topic_id: &str) -> f64 {
        self.topics.get(topic_id).map(|c| c.multiplier).unwrap_or(1.0)
    }

    pub fn deficit(&self, topic_id: &str) -> f64 {
        self.topics.get(topic_id).map(|c| c.deficit()).unwrap_or(0.0)
    }

    /// Largest deficit among the given topics.
    pub fn max_deficit(&self, topic_ids: &[TopicId]) -> f64 {
        topic_ids
            .iter()
            .map(|t| self.deficit(t))
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Geometric mean of the topic multipliers of a multi-topic item.
    pub fn item_multiplier(&self, topic_ids: &[TopicId]) -> f64 {
        if topic_ids.is_empty() {
            return 1.0;
        }
        let log_sum: f64 = topic_ids.iter().map(|t| self.multiplier(t).ln()).sum();
        (log_sum / topic_ids.len() as f64).exp()
    }
}
