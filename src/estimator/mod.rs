//! Quadrature Ability Estimator
//!
//! Expected-A-Posteriori (EAP) update of a learner's ability after one
//! response.
//!
//! Algorithm:
//! - Lay a fixed, equispaced grid over the ability range (41 nodes on
//!   [-4, 4] by default)
//! - Weight each node by the prior density times the response likelihood
//! - Normalize; θ̂ is the weighted mean, SE the square root of the weighted
//!   variance
//!
//! The grid is an approximation of adaptive (Gauss-Hermite) quadrature and is
//! kept as-is: regression tests pin its outputs. Because θ̂ is a mean over
//! grid nodes it can never leave the grid range, so all-correct and
//! all-incorrect histories stay bounded.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::QuadratureConfig;
use crate::error::{EngineError, Result};
use crate::sanitize::normalize_weights;
use crate::scoring::{CalibratedItem, ScoringModel};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Prior {
    Flat,
    Normal { theta: f64, se: f64 },
}

impl Prior {
    fn density(&self, x: f64) -> f64 {
        match self {
            Self::Flat => 1.0,
            Self::Normal { theta, se } => {
                let z = (x - theta) / se;
                (-0.5 * z * z).exp()
            }
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            Self::Flat => Ok(()),
            Self::Normal { theta, se } => {
                if !theta.is_finite() {
                    return Err(EngineError::corrupt(format!("prior theta {theta} is not finite")));
                }
                if !se.is_finite() || *se <= 0.0 {
                    return Err(EngineError::corrupt(format!("prior SE {se} must be > 0")));
                }
                Ok(())
            }
        }
    }
}

impl From<&Posterior> for Prior {
    fn from(p: &Posterior) -> Self {
        Self::Normal {
            theta: p.theta,
            se: p.se,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Posterior {
    pub theta: f64,
    pub se: f64,
}

/// Fixed equispaced quadrature grid.
#[derive(Debug, Clone)]
pub struct QuadratureGrid {
    nodes: Vec<f64>,
    min_se: f64,
}

impl QuadratureGrid {
    pub fn new(config: &QuadratureConfig) -> Result<Self> {
        if config.points < 2
            || !(config.min_theta.is_finite() && config.max_theta.is_finite())
            || config.min_theta >= config.max_theta
        {
            return Err(EngineError::Config(format!(
                "quadrature grid needs >= 2 points over a non-empty range, got {} on [{}, {}]",
                config.points, config.min_theta, config.max_theta
            )));
        }
        let step = (config.max_theta - config.min_theta) / (config.points - 1) as f64;
        let nodes = (0..config.points)
            .map(|i| config.min_theta + i as f64 * step)
            .collect();
        Ok(Self {
            nodes,
            min_se: config.min_se,
        })
    }

    pub fn nodes(&self) -> &[f64] {
        &self.nodes
    }

    pub fn range(&self) -> (f64, f64) {
        (self.nodes[0], self.nodes[self.nodes.len() - 1])
    }

    /// Posterior after observing `score` on an item of `difficulty`.
    pub fn update(
        &self,
        prior: &Prior,
        scoring: &ScoringModel,
        difficulty: f64,
        score: u32,
    ) -> Result<Posterior> {
        if !difficulty.is_finite() {
            return Err(EngineError::invalid(format!(
                "item difficulty {difficulty} is not finite"
            )));
        }
        prior.validate()?;
        scoring.check_score(score)?;

        let mut weights: Vec<f64> = self
            .nodes
            .iter()
            .map(|&x| prior.density(x) * scoring.likelihood(x, difficulty, score))
            .collect();
        self.summarize(&mut weights)
    }

    pub fn update_item(&self, prior: &Prior, item: &CalibratedItem, score: u32) -> Result<Posterior> {
        self.update(prior, &item.scoring, item.difficulty, score)
    }

    /// Fold a sequence of `(item, score)` responses, feeding each posterior
    /// back in as the next prior.
    pub fn estimate_sequence<'a, I>(&self, prior: Prior, responses: I) -> Result<Posterior>
    where
        I: IntoIterator<Item = (&'a CalibratedItem, u32)>,
    {
        let mut current = prior;
        let mut posterior = self.prior_summary(&prior)?;
        for (item, score) in responses {
            posterior = self.update_item(&current, item, score)?;
            current = Prior::from(&posterior);
        }
        Ok(posterior)
    }

    /// Mean and SE of the prior itself, as seen through the grid.
    pub fn prior_summary(&self, prior: &Prior) -> Result<Posterior> {
        prior.validate()?;
        let mut weights: Vec<f64> = self.nodes.iter().map(|&x| prior.density(x)).collect();
        self.summarize(&mut weights)
    }

    fn summarize(&self, weights: &mut [f64]) -> Result<Posterior> {
        if !normalize_weights(weights) {
            return Err(EngineError::corrupt(
                "posterior mass vanished on the quadrature grid",
            ));
        }
        let theta: f64 = self.nodes.iter().zip(weights.iter()).map(|(x, w)| x * w).sum();
        let variance: f64 = self
            .nodes
            .iter()
            .zip(weights.iter())
            .map(|(x, w)| (x - theta).powi(2) * w)
            .sum();
        let se = variance.sqrt().max(self.min_se);

        debug!(theta, se, "EAP posterior");
        Ok(Posterior { theta, se })
    }
}
