//! Item Scoring Models
//!
//! Two response models feed the estimator through one interface:
//! - **Binomial** - `trials` independent steps, each following the
//!   one-parameter logistic model at the item difficulty
//! - **Partial credit** - ordered step thresholds τ_j around the difficulty:
//!   P(X = k | θ) ∝ exp(Σ_{j≤k} (θ - b - τ_j)), k = 0..m
//!
//! Which model an item uses is decided once, in [`CalibratedItem::load`].
//! Item information is the variance of the score distribution at θ, which
//! for a binomial item reduces to n·p·(1 - p).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::sanitize::{has_invalid_values, is_ordered, logistic, softmax};
use crate::types::{ItemDefinition, ItemId, TopicId};

/// Probability of a correct step under the one-parameter logistic model.
pub fn rasch_probability(theta: f64, difficulty: f64) -> f64 {
    logistic(theta - difficulty)
}

/// Fisher information of an n-step binomial item.
pub fn binomial_information(theta: f64, difficulty: f64, trials: u32) -> f64 {
    let p = rasch_probability(theta, difficulty);
    trials as f64 * p * (1.0 - p)
}

/// Highest score (binomial steps or partial-credit categories) an item may carry.
pub const MAX_ITEM_SCORE: u32 = 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScoringModel {
    Binomial { trials: u32 },
    PartialCredit { thresholds: Vec<f64> },
}

impl ScoringModel {
    /// Resolve the scoring branch for an item. Missing thresholds fall back to
    /// binomial scoring over `max_score` steps.
    pub fn resolve(thresholds: Option<&[f64]>, max_score: u32) -> Result<Self> {
        match thresholds {
            None => {
                if max_score == 0 || max_score > MAX_ITEM_SCORE {
                    return Err(EngineError::invalid(format!(
                        "max_score {max_score} outside 1..={MAX_ITEM_SCORE}"
                    )));
                }
                Ok(Self::Binomial { trials: max_score })
            }
            Some([]) => Err(EngineError::invalid("threshold list is empty")),
            Some(taus) => {
                if taus.len() > MAX_ITEM_SCORE as usize {
                    return Err(EngineError::invalid(format!(
                        "{} thresholds exceed the limit of {MAX_ITEM_SCORE}",
                        taus.len()
                    )));
                }
                if has_invalid_values(taus) {
                    return Err(EngineError::invalid("thresholds contain non-finite values"));
                }
                if !is_ordered(taus) {
                    return Err(EngineError::invalid("thresholds are not ordered"));
                }
                Ok(Self::PartialCredit {
                    thresholds: taus.to_vec(),
                })
            }
        }
    }

    pub fn max_score(&self) -> u32 {
        match self {
            Self::Binomial { trials } => *trials,
            Self::PartialCredit { thresholds } => thresholds.len() as u32,
        }
    }

    pub fn check_score(&self, score: u32) -> Result<()> {
        if score > self.max_score() {
            return Err(EngineError::invalid(format!(
                "score {score} exceeds maximum {}",
                self.max_score()
            )));
        }
        Ok(())
    }

    /// P(X = k | θ) for k = 0..=max_score.
    pub fn category_probabilities(&self, theta: f64, difficulty: f64) -> Vec<f64> {
        match self {
            Self::Binomial { trials } => {
                let p = rasch_probability(theta, difficulty);
                (0..=*trials)
                    .map(|k| binomial_pmf(*trials, k, p))
                    .collect()
            }
            Self::PartialCredit { thresholds } => {
                let mut logits = Vec::with_capacity(thresholds.len() + 1);
                let mut running = 0.0;
                logits.push(running);
                for tau in thresholds {
                    running += theta - difficulty - tau;
                    logits.push(running);
                }
                softmax(&logits)
            }
        }
    }

    /// Likelihood of the observed score; `score` must already be checked.
    pub fn likelihood(&self, theta: f64, difficulty: f64, score: u32) -> f64 {
        match self {
            Self::Binomial { trials } => {
                binomial_pmf(*trials, score, rasch_probability(theta, difficulty))
            }
            Self::PartialCredit { .. } => self
                .category_probabilities(theta, difficulty)
                .get(score as usize)
                .copied()
                .unwrap_or(0.0),
        }
    }

    pub fn expected_score(&self, theta: f64, difficulty: f64) -> f64 {
        self.category_probabilities(theta, difficulty)
            .iter()
            .enumerate()
            .map(|(k, p)| k as f64 * p)
            .sum()
    }

    /// Item information at θ.
    pub fn information(&self, theta: f64, difficulty: f64) -> f64 {
        match self {
            Self::Binomial { trials } => binomial_information(theta, difficulty, *trials),
            Self::PartialCredit { .. } => {
                let probs = self.category_probabilities(theta, difficulty);
                let mean: f64 = probs.iter().enumerate().map(|(k, p)| k as f64 * p).sum();
                probs
                    .iter()
                    .enumerate()
                    .map(|(k, p)| (k as f64 - mean).powi(2) * p)
                    .sum()
            }
        }
    }
}

fn binomial_pmf(n: u32, k: u32, p: f64) -> f64 {
    if k > n {
        return 0.0;
    }
    binomial_coefficient(n, k) * p.powi(k as i32) * (1.0 - p).powi((n - k) as i32)
}

fn binomial_coefficient(n: u32, k: u32) -> f64 {
    let k = k.min(n - k);
    (0..k).fold(1.0, |acc, i| acc * (n - i) as f64 / (i + 1) as f64)
}

/// An item after load-time validation, with its scoring branch fixed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibratedItem {
    pub id: ItemId,
    pub difficulty: f64,
    pub scoring: ScoringModel,
    pub topic_ids: Vec<TopicId>,
    pub exposure_count: u32,
    pub last_shown_at: Option<DateTime<Utc>>,
    pub estimated_secs: f64,
    pub due_at: Option<DateTime<Utc>>,
}

impl CalibratedItem {
    pub fn load(def: &ItemDefinition) -> Result<Self> {
        let difficulty = match def.difficulty {
            Some(b) if b.is_finite() => b,
            Some(b) => {
                return Err(EngineError::invalid(format!(
                    "item {}: difficulty {b} is not finite",
                    def.id
                )))
            }
            None => {
                return Err(EngineError::invalid(format!(
                    "item {}: difficulty is missing",
                    def.id
                )))
            }
        };
        if def.topic_ids.is_empty() {
            return Err(EngineError::invalid(format!("item {}: no topics", def.id)));
        }
        if !def.estimated_secs.is_finite() || def.estimated_secs <= 0.0 {
            return Err(EngineError::invalid(format!(
                "item {}: estimated time {} must be positive",
                def.id, def.estimated_secs
            )));
        }
        let scoring = ScoringModel::resolve(def.thresholds.as_deref(), def.max_score)
            .map_err(|e| EngineError::invalid(format!("item {}: {e}", def.id)))?;

        Ok(Self {
            id: def.id.clone(),
            difficulty,
            scoring,
            topic_ids: def.topic_ids.clone(),
            exposure_count: def.exposure_count,
            last_shown_at: def.last_shown_at,
            estimated_secs: def.estimated_secs,
            due_at: def.due_at,
        })
    }

    pub fn load_all(defs: &[ItemDefinition]) -> Result<Vec<Self>> {
        defs.iter().map(Self::load).collect()
    }

    pub fn information(&self, theta: f64) -> f64 {
        self.scoring.information(theta, self.difficulty)
    }

    pub fn is_full_marks(&self, score: u32) -> bool {
        score == self.scoring.max_score()
    }
}
