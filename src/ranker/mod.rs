//! Item Utility Ranker (seeded scheduler)
//!
//! Picks the next item for a learner.
//!
//! utility = (information / estimated_time)
//!         × blueprint_multiplier × exposure_multiplier × fatigue_scalar
//!         × overdue_priority (review lane only)
//!
//! Selection is Thompson-style rather than greedy: every candidate's utility
//! is treated as a mean and one draw is taken around it from an
//! [`ExplorationStream`] seeded by the caller. Candidates are visited in item
//! id order, so the same seed, state and candidate set always give the same
//! pick and the same decision record, whatever order the items arrive in.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::blueprint::{BlueprintTarget, ComplianceReport, PracticeDistribution};
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::exposure::{cooldown_verdict, exposure_multiplier, fatigue_level, fatigue_scalar, CooldownVerdict};
use crate::retention::{overdue_days, overdue_priority, ReviewBudget};
use crate::sampling::ExplorationStream;
use crate::scoring::CalibratedItem;
use crate::types::{ItemId, Lane, LearnerId, LearnerSnapshot};

/// Session progress supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub elapsed_secs: f64,
    /// Part of `elapsed_secs` spent on review items.
    pub review_secs: f64,
    /// Full-marks flags of this session's responses, oldest first.
    pub recent_outcomes: Vec<bool>,
}

/// Everything one selection call looks at.
#[derive(Debug, Clone, Copy)]
pub struct SelectionRequest<'a> {
    pub snapshot: &'a LearnerSnapshot,
    pub items: &'a [CalibratedItem],
    pub blueprint: &'a BlueprintTarget,
    pub practice: &'a PracticeDistribution,
    pub session: &'a SessionState,
    pub now: DateTime<Utc>,
    pub seed: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateScore {
    pub item_id: ItemId,
    pub information: f64,
    pub estimated_secs: f64,
    pub blueprint_multiplier: f64,
    pub exposure_multiplier: f64,
    pub fatigue_scalar: f64,
    pub overdue_multiplier: f64,
    pub utility: f64,
    /// Standard normal draw used for this candidate.
    pub z: f64,
    pub sampled_utility: f64,
    pub cooldown: CooldownVerdict,
}

/// Exposure bookkeeping for the chosen item; counts move at selection time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExposureUpdate {
    pub item_id: ItemId,
    pub exposure_count: u32,
    pub last_shown_at: DateTime<Utc>,
}

/// Audit record of one selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionDecision {
    pub learner_id: LearnerId,
    pub item_id: ItemId,
    pub lane: Lane,
    pub preferred_lane: Lane,
    pub seed: u64,
    pub theta: f64,
    pub se: f64,
    pub fatigue_level: f64,
    pub review_budget: ReviewBudget,
    pub compliance: ComplianceReport,
    pub candidates: Vec<CandidateScore>,
    pub excluded_by_cooldown: Vec<ItemId>,
    pub exposure_update: ExposureUpdate,
    pub rationale: String,
    pub decided_at: DateTime<Utc>,
}

impl SelectionDecision {
    pub fn chosen(&self) -> Option<&CandidateScore> {
        self.candidates.iter().find(|c| c.item_id == self.item_id)
    }
}

struct LanePool<'a> {
    lane: Lane,
    items: Vec<&'a CalibratedItem>,
}

/// Select the next item.
pub fn select_next(request: &SelectionRequest<'_>, config: &EngineConfig) -> Result<SelectionDecision> {
    let snapshot = request.snapshot;
    snapshot.validate((config.quadrature.min_theta, config.quadrature.max_theta))?;
    check_session(request.session)?;

    let mut items: Vec<&CalibratedItem> = request.items.iter().collect();
    items.sort_by(|a, b| a.id.cmp(&b.id));
    if let Some(pair) = items.windows(2).find(|w| w[0].id == w[1].id) {
        return Err(EngineError::invalid(format!("duplicate item id {}", pair[0].id)));
    }

    let compliance = ComplianceReport::assess(request.blueprint, request.practice, &config.blueprint);
    let fatigue = fatigue_level(
        request.session.elapsed_secs,
        &request.session.recent_outcomes,
        &config.fatigue,
    );

    let review_pool: Vec<&CalibratedItem> = items
        .iter()
        .copied()
        .filter(|item| is_review_eligible(item, snapshot, request.now))
        .collect();
    let training_pool: Vec<&CalibratedItem> = items
        .iter()
        .copied()
        .filter(|item| item.topic_ids.iter().any(|t| snapshot.lane_of(t) == Lane::Training))
        .collect();

    let max_overdue = review_pool
        .iter()
        .filter_map(|item| effective_due_at(item, snapshot))
        .map(|due| overdue_days(due, request.now))
        .fold(0.0, f64::max);
    let budget = ReviewBudget::compute(
        request.session.review_secs,
        request.session.elapsed_secs,
        max_overdue,
        &config.retention,
    );

    let preferred = if !review_pool.is_empty() && budget.has_room() {
        Lane::Retention
    } else {
        Lane::Training
    };
    let (first, second) = match preferred {
        Lane::Retention => (review_pool, training_pool),
        Lane::Training => (training_pool, review_pool),
    };
    let pools = [
        LanePool {
            lane: preferred,
            items: first,
        },
        LanePool {
            lane: preferred.other(),
            items: second,
        },
    ];

    let mut considered: BTreeSet<&str> = BTreeSet::new();
    let mut cooling: BTreeSet<ItemId> = BTreeSet::new();
    let mut stream = ExplorationStream::new(request.seed);

    for pool in &pools {
        let mut eligible = Vec::with_capacity(pool.items.len());
        for item in &pool.items {
            considered.insert(item.id.as_str());
            let deficit = compliance.max_deficit(&item.topic_ids);
            let verdict = cooldown_verdict(item.last_shown_at, request.now, deficit, &config.exposure);
            if verdict.is_eligible() {
                eligible.push((*item, verdict));
            } else {
                cooling.insert(item.id.clone());
            }
        }
        if eligible.is_empty() {
            continue;
        }
        if pool.lane != preferred {
            warn!(
                learner_id = %snapshot.learner_id(),
                preferred = preferred.as_str(),
                fallback = pool.lane.as_str(),
                "preferred lane has no eligible items, using the other lane"
            );
        }

        let theta = snapshot.ability.theta;
        let candidates: Vec<CandidateScore> = eligible
            .into_iter()
            .map(|(item, verdict)| {
                let due = effective_due_at(item, snapshot);
                score_candidate(item, verdict, due, pool.lane, theta, fatigue, &compliance, request.now, config, &mut stream)
            })
            .collect();

        let winner = candidates
            .iter()
            .fold(None::<&CandidateScore>, |best, c| match best {
                Some(b) if b.sampled_utility >= c.sampled_utility => Some(b),
                _ => Some(c),
            })
            .ok_or_else(|| EngineError::corrupt("scored pool came back empty"))?;

        let chosen_item = pool
            .items
            .iter()
            .find(|item| item.id == winner.item_id)
            .ok_or_else(|| EngineError::corrupt("winning candidate is not in its pool"))?;

        let exposure_update = ExposureUpdate {
            item_id: chosen_item.id.clone(),
            exposure_count: chosen_item.exposure_count.saturating_add(1),
            last_shown_at: request.now,
        };
        let rationale = rationale(winner, pool.lane, preferred, &budget, candidates.len(), cooling.len());
        let item_id = winner.item_id.clone();

        debug!(
            learner_id = %snapshot.learner_id(),
            item_id = %item_id,
            lane = pool.lane.as_str(),
            seed = request.seed,
            candidates = candidates.len(),
            "selected next item"
        );

        return Ok(SelectionDecision {
            learner_id: snapshot.learner_id().to_string(),
            item_id,
            lane: pool.lane,
            preferred_lane: preferred,
            seed: request.seed,
            theta,
            se: snapshot.ability.se,
            fatigue_level: fatigue,
            review_budget: budget,
            compliance,
            candidates,
            excluded_by_cooldown: cooling.into_iter().collect(),
            exposure_update,
            rationale,
            decided_at: request.now,
        });
    }

    Err(EngineError::NoEligibleItems {
        lane: preferred,
        considered: considered.len(),
        excluded_by_cooldown: cooling.len(),
    })
}

fn check_session(session: &SessionState) -> Result<()> {
    if !session.elapsed_secs.is_finite() || session.elapsed_secs < 0.0 {
        return Err(EngineError::invalid(format!(
            "session elapsed time {} is invalid",
            session.elapsed_secs
        )));
    }
    if !session.review_secs.is_finite()
        || session.review_secs < 0.0
        || session.review_secs > session.elapsed_secs
    {
        return Err(EngineError::invalid(format!(
            "session review time {} is invalid for {} elapsed",
            session.review_secs, session.elapsed_secs
        )));
    }
    Ok(())
}

/// The item's own due date, else the earliest review date of its retained topics.
fn effective_due_at(item: &CalibratedItem, snapshot: &LearnerSnapshot) -> Option<DateTime<Utc>> {
    item.due_at.or_else(|| {
        item.topic_ids
            .iter()
            .filter_map(|t| snapshot.topics.get(t))
            .filter(|t| t.lane == Lane::Retention)
            .filter_map(|t| t.next_review_at)
            .min()
    })
}

/// Due, and at least one of its topics is being retained.
fn is_review_eligible(item: &CalibratedItem, snapshot: &LearnerSnapshot, now: DateTime<Utc>) -> bool {
    matches!(effective_due_at(item, snapshot), Some(due) if due <= now)
        && item.topic_ids.iter().any(|t| snapshot.lane_of(t) == Lane::Retention)
}

#[allow(clippy::too_many_arguments)]
fn score_candidate(
    item: &CalibratedItem,
    cooldown: CooldownVerdict,
    due_at: Option<DateTime<Utc>>,
    lane: Lane,
    theta: f64,
    fatigue: f64,
    compliance: &ComplianceReport,
    now: DateTime<Utc>,
    config: &EngineConfig,
    stream: &mut ExplorationStream,
) -> CandidateScore {
    let information = item.information(theta);
    let estimated_secs = item.estimated_secs.max(config.ranker.min_estimated_secs);
    let blueprint = compliance.item_multiplier(&item.topic_ids);
    let exposure = exposure_multiplier(item.exposure_count, &config.exposure);
    let fatigue_scalar = fatigue_scalar(fatigue, estimated_secs, &config.fatigue);
    let overdue = match (lane, due_at) {
        (Lane::Retention, Some(due)) => overdue_priority(overdue_days(due, now), &config.retention),
        _ => 1.0,
    };

    let utility = information / estimated_secs * blueprint * exposure * fatigue_scalar * overdue;
    let (sampled_utility, z) = stream.perturb(utility, config.ranker.exploration_scale);

    CandidateScore {
        item_id: item.id.clone(),
        information,
        estimated_secs,
        blueprint_multiplier: blueprint,
        exposure_multiplier: exposure,
        fatigue_scalar,
        overdue_multiplier: overdue,
        utility,
        z,
        sampled_utility,
        cooldown,
    }
}

fn rationale(
    winner: &CandidateScore,
    lane: Lane,
    preferred: Lane,
    budget: &ReviewBudget,
    candidates: usize,
    cooling: usize,
) -> String {
    let mut text = format!(
        "{} lane: {} sampled {:.4} around utility {:.4} = info {:.4} / {:.1}s x blueprint {:.3} x exposure {:.3} x fatigue {:.3}",
        lane.as_str(),
        winner.item_id,
        winner.sampled_utility,
        winner.utility,
        winner.information,
        winner.estimated_secs,
        winner.blueprint_multiplier,
        winner.exposure_multiplier,
        winner.fatigue_scalar,
    );
    if lane == Lane::Retention {
        text.push_str(&format!(" x overdue {:.3}", winner.overdue_multiplier));
    }
    if let CooldownVerdict::Overridden { deficit, .. } = winner.cooldown {
        text.push_str(&format!("; cooldown overridden by blueprint deficit {deficit:.3}"));
    }
    if lane != preferred {
        text.push_str(&format!("; {} lane had nothing eligible", preferred.as_str()));
    }
    text.push_str(&format!(
        "; review share {:.2} of cap {:.2}{}; {} candidates, {} in cooldown",
        budget.used_share,
        budget.cap,
        if budget.relaxed { " (relaxed)" } else { "" },
        candidates,
        cooling,
    ));
    text
}
