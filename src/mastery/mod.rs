//! Mastery Classifier
//!
//! Turns a topic-local ability estimate plus recent accuracy into a mastery
//! probability and a discrete level.
//!
//! mastery = (1 - w) · Φ((θ̂ - cut) / SE) + w · (correct + 1) / (n + 2)
//!
//! A level is granted only when ability floor, uncertainty ceiling and
//! mastery floor all hold for that tier; the highest such tier wins.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::config::{MasteryConfig, MasteryTier};
use crate::types::MasteryLevel;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MasteryAssessment {
    pub mastery_probability: f64,
    pub level: Option<MasteryLevel>,
}

/// Standard normal CDF (erfc approximation, fractional error < 1.2e-7).
pub fn normal_cdf(x: f64) -> f64 {
    0.5 * erfc(-x / std::f64::consts::SQRT_2)
}

fn erfc(x: f64) -> f64 {
    let z = x.abs();
    let t = 1.0 / (1.0 + 0.5 * z);
    let poly = -z * z - 1.265_512_23
        + t * (1.000_023_68
            + t * (0.374_091_96
                + t * (0.096_784_18
                    + t * (-0.186_288_06
                        + t * (0.278_868_07
                            + t * (-1.135_203_98
                                + t * (1.488_515_87 + t * (-0.822_152_23 + t * 0.170_872_77))))))));
    let r = t * poly.exp();
    if x >= 0.0 {
        r
    } else {
        2.0 - r
    }
}

/// Laplace-smoothed accuracy; 0.5 with no history.
pub fn smoothed_accuracy(outcomes: &VecDeque<bool>) -> f64 {
    let correct = outcomes.iter().filter(|&&c| c).count() as f64;
    (correct + 1.0) / (outcomes.len() as f64 + 2.0)
}

/// Append an outcome, keeping at most `window` entries.
pub fn push_outcome(outcomes: &mut VecDeque<bool>, correct: bool, window: usize) {
    outcomes.push_back(correct);
    while outcomes.len() > window {
        outcomes.pop_front();
    }
}

pub fn mastery_probability(theta: f64, se: f64, accuracy: f64, config: &MasteryConfig) -> f64 {
    let posterior_term = normal_cdf((theta - config.mastery_cut) / se);
    let w = config.accuracy_weight;
    ((1.0 - w) * posterior_term + w * accuracy).clamp(0.0, 1.0)
}

pub fn classify_level(
    theta: f64,
    se: f64,
    mastery_probability: f64,
    tiers: &[MasteryTier],
) -> Option<MasteryLevel> {
    tiers
        .iter()
        .filter(|tier| tier.admits(theta, se, mastery_probability))
        .map(|tier| tier.level)
        .max()
}

pub fn assess(theta: f64, se: f64, outcomes: &VecDeque<bool>, config: &MasteryConfig) -> MasteryAssessment {
    let accuracy = smoothed_accuracy(outcomes);
    let mastery_probability = mastery_probability(theta, se, accuracy, config);
    MasteryAssessment {
        mastery_probability,
        level: classify_level(theta, se, mastery_probability, &config.tiers),
    }
}
