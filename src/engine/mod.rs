//! Adaptive Engine
//!
//! Ties the per-concern modules together:
//! - `select_next`: rank the candidate pool and pick one item
//! - `record_attempt`: fold one response into a learner snapshot
//! - `replay`: rebuild a snapshot from an attempt log
//!
//! Every call is a pure function of its inputs. A snapshot is never edited in
//! place; a new one is returned together with the before/after deltas.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::estimator::{Posterior, Prior, QuadratureGrid};
use crate::lanes::{transition, CalibrationProbe, LaneTransition};
use crate::mastery::{assess, push_outcome};
use crate::ranker::{select_next, SelectionDecision, SelectionRequest};
use crate::retention::{next_due_at, stability_after_review};
use crate::scoring::CalibratedItem;
use crate::types::{
    AttemptEvent, Lane, LearnerId, LearnerSnapshot, MasteryLevel, TopicId, TopicMastery,
};

/// Change to one topic caused by a single response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicDelta {
    pub topic_id: TopicId,
    pub theta_before: f64,
    pub theta_after: f64,
    pub se_before: f64,
    pub se_after: f64,
    pub mastery_before: f64,
    pub mastery_after: f64,
    pub level_before: Option<MasteryLevel>,
    pub level_after: Option<MasteryLevel>,
    pub transition: Option<LaneTransition>,
    pub next_review_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptOutcome {
    pub snapshot: LearnerSnapshot,
    pub ability_before: Posterior,
    pub ability_after: Posterior,
    pub full_marks: bool,
    pub topics: Vec<TopicDelta>,
}

impl AttemptOutcome {
    pub fn transitions(&self) -> impl Iterator<Item = (&TopicId, &LaneTransition)> {
        self.topics
            .iter()
            .filter_map(|d| d.transition.as_ref().map(|t| (&d.topic_id, t)))
    }
}

/// One learner's log for batch replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnerLog {
    pub learner_id: LearnerId,
    pub prior: Posterior,
    pub events: Vec<AttemptEvent>,
}

/// Validated configuration plus its quadrature grid.
#[derive(Debug, Clone)]
pub struct AdaptiveEngine {
    config: EngineConfig,
    grid: QuadratureGrid,
}

impl AdaptiveEngine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let grid = QuadratureGrid::new(&config.quadrature)?;
        Ok(Self { config, grid })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn grid(&self) -> &QuadratureGrid {
        &self.grid
    }

    pub fn select_next(&self, request: &SelectionRequest<'_>) -> Result<SelectionDecision> {
        select_next(request, &self.config)
    }

    /// Fold one response into `snapshot`.
    pub fn record_attempt(
        &self,
        snapshot: &LearnerSnapshot,
        item: &CalibratedItem,
        event: &AttemptEvent,
    ) -> Result<AttemptOutcome> {
        snapshot.validate(self.grid.range())?;
        check_event(snapshot, item, event)?;

        let config = &self.config;
        let full_marks = item.is_full_marks(event.score);
        let ability_before = Posterior {
            theta: snapshot.ability.theta,
            se: snapshot.ability.se,
        };
        let ability_after = self
            .grid
            .update_item(&Prior::from(&ability_before), item, event.score)?;

        let mut next = snapshot.clone();
        next.ability.theta = ability_after.theta;
        next.ability.se = ability_after.se;
        next.ability.attempt_count += 1;
        next.ability.updated_at = Some(event.timestamp);

        let topic_ids: BTreeSet<&TopicId> = item.topic_ids.iter().collect();
        let mut deltas = Vec::with_capacity(topic_ids.len());
        for topic_id in topic_ids {
            let before = snapshot
                .topics
                .get(topic_id)
                .cloned()
                .unwrap_or_else(|| TopicMastery::fresh(topic_id.clone(), config.retention.initial_stability_days));
            let (after, delta) = self.update_topic(&before, item, event, full_marks)?;
            next.topics.insert(topic_id.clone(), after);
            deltas.push(delta);
        }

        debug!(
            learner_id = %event.learner_id,
            item_id = %event.item_id,
            score = event.score,
            theta = ability_after.theta,
            se = ability_after.se,
            "attempt recorded"
        );

        Ok(AttemptOutcome {
            snapshot: next,
            ability_before,
            ability_after,
            full_marks,
            topics: deltas,
        })
    }

    fn update_topic(
        &self,
        before: &TopicMastery,
        item: &CalibratedItem,
        event: &AttemptEvent,
        full_marks: bool,
    ) -> Result<(TopicMastery, TopicDelta)> {
        let config = &self.config;
        let prior = Prior::Normal {
            theta: before.theta,
            se: before.se,
        };
        let posterior = self.grid.update_item(&prior, item, event.score)?;

        let mut after = before.clone();
        after.theta = posterior.theta;
        after.se = posterior.se;
        after.attempts += 1;
        push_outcome(&mut after.recent_outcomes, full_marks, config.mastery.history_window);

        let assessment = assess(posterior.theta, posterior.se, &after.recent_outcomes, &config.mastery);
        after.mastery_probability = assessment.mastery_probability;
        after.level = assessment.level;

        // The probe is judged against the estimate the learner was shown the item under.
        let probe = CalibrationProbe {
            item_difficulty: item.difficulty,
            theta_estimate: before.theta,
            full_marks,
        };
        let lane_change = transition(before.lane, assessment.mastery_probability, &probe, &config.lanes);

        match (before.lane, lane_change) {
            (Lane::Training, Some(change)) => {
                after.lane = change.to;
                after.last_transition_at = Some(event.timestamp);
                after.review_stability_days = config.retention.initial_stability_days;
                after.next_review_at = Some(next_due_at(
                    event.timestamp,
                    after.review_stability_days,
                    &config.retention,
                )?);
            }
            (Lane::Retention, Some(change)) => {
                after.lane = change.to;
                after.last_transition_at = Some(event.timestamp);
                after.review_stability_days = config.retention.initial_stability_days;
                after.next_review_at = None;
            }
            (Lane::Retention, None) => {
                after.review_stability_days = stability_after_review(
                    before.review_stability_days,
                    full_marks,
                    assessment.mastery_probability,
                    &config.retention,
                );
                after.next_review_at = Some(next_due_at(
                    event.timestamp,
                    after.review_stability_days,
                    &config.retention,
                )?);
            }
            (Lane::Training, None) => {}
        }

        if let Some(change) = &lane_change {
            info!(
                learner_id = %event.learner_id,
                topic_id = %before.topic_id,
                from = change.from.as_str(),
                to = change.to.as_str(),
                mastery = assessment.mastery_probability,
                "topic changed lane"
            );
        }

        let delta = TopicDelta {
            topic_id: before.topic_id.clone(),
            theta_before: before.theta,
            theta_after: after.theta,
            se_before: before.se,
            se_after: after.se,
            mastery_before: before.mastery_probability,
            mastery_after: after.mastery_probability,
            level_before: before.level,
            level_after: after.level,
            transition: lane_change,
            next_review_at: after.next_review_at,
        };
        Ok((after, delta))
    }

    /// Rebuild a learner's snapshot by folding `events` in order.
    pub fn replay(
        &self,
        learner_id: &str,
        prior: Posterior,
        events: &[AttemptEvent],
        items: &[CalibratedItem],
    ) -> Result<LearnerSnapshot> {
        let catalog = catalog(items);
        self.replay_with(learner_id, prior, events, &catalog)
    }

    fn replay_with(
        &self,
        learner_id: &str,
        prior: Posterior,
        events: &[AttemptEvent],
        catalog: &BTreeMap<&str, &CalibratedItem>,
    ) -> Result<LearnerSnapshot> {
        let mut snapshot = LearnerSnapshot::new(learner_id);
        snapshot.ability.theta = prior.theta;
        snapshot.ability.se = prior.se;

        for event in events {
            let item = catalog
                .get(event.item_id.as_str())
                .ok_or_else(|| EngineError::invalid(format!("unknown item {}", event.item_id)))?;
            snapshot = self.record_attempt(&snapshot, item, event)?.snapshot;
        }
        Ok(snapshot)
    }

    /// Replay many independent learners in parallel; results keep input order.
    pub fn replay_learners(&self, logs: &[LearnerLog], items: &[CalibratedItem]) -> Vec<Result<LearnerSnapshot>> {
        let catalog = catalog(items);
        logs.par_iter()
            .map(|log| self.replay_with(&log.learner_id, log.prior, &log.events, &catalog))
            .collect()
    }
}

fn catalog(items: &[CalibratedItem]) -> BTreeMap<&str, &CalibratedItem> {
    items.iter().map(|item| (item.id.as_str(), item)).collect()
}

fn check_event(snapshot: &LearnerSnapshot, item: &CalibratedItem, event: &AttemptEvent) -> Result<()> {
    if event.learner_id != snapshot.learner_id() {
        return Err(EngineError::invalid(format!(
            "event for learner {} applied to snapshot of {}",
            event.learner_id,
            snapshot.learner_id()
        )));
    }
    if event.item_id != item.id {
        return Err(EngineError::invalid(format!(
            "event for item {} scored against item {}",
            event.item_id, item.id
        )));
    }
    if !event.topic_ids.is_empty() {
        let logged: BTreeSet<&TopicId> = event.topic_ids.iter().collect();
        let tagged: BTreeSet<&TopicId> = item.topic_ids.iter().collect();
        if logged != tagged {
            return Err(EngineError::invalid(format!(
                "event topics for item {} do not match the item's topics",
                item.id
            )));
        }
    }
    if !event.duration_secs.is_finite() || event.duration_secs < 0.0 {
        return Err(EngineError::invalid(format!(
            "event duration {} is invalid",
            event.duration_secs
        )));
    }
    if let Some(last) = snapshot.ability.updated_at {
        if event.timestamp < last {
            return Err(EngineError::invalid(format!(
                "event at {} precedes the last recorded attempt at {last}",
                event.timestamp
            )));
        }
    }
    item.scoring.check_score(event.score)
}

/// Select with a one-off engine built from `config`.
pub fn select(request: &SelectionRequest<'_>, config: &EngineConfig) -> Result<SelectionDecision> {
    config.validate()?;
    select_next(request, config)
}

/// Record one attempt with a one-off engine built from `config`.
pub fn record_attempt(
    snapshot: &LearnerSnapshot,
    item: &CalibratedItem,
    event: &AttemptEvent,
    config: &EngineConfig,
) -> Result<AttemptOutcome> {
    AdaptiveEngine::new(config.clone())?.record_attempt(snapshot, item, event)
}

pub fn replay(
    learner_id: &str,
    prior: Posterior,
    events: &[AttemptEvent],
    items: &[CalibratedItem],
    config: &EngineConfig,
) -> Result<LearnerSnapshot> {
    AdaptiveEngine::new(config.clone())?.replay(learner_id, prior, events, items)
}

pub fn replay_learners(
    logs: &[LearnerLog],
    items: &[CalibratedItem],
    config: &EngineConfig,
) -> Result<Vec<Result<LearnerSnapshot>>> {
    Ok(AdaptiveEngine::new(config.clone())?.replay_learners(logs, items))
}
