//! Training ⇄ Retention hand-off through attempt processing.

mod common;

use danci_adaptive::lanes::transition;
use danci_adaptive::{
    AdaptiveEngine, CalibrationProbe, EngineConfig, Lane, LaneConfig, TransitionReason,
};

use common::{attempt, hours, item, strong_topic};

#[test]
fn integration_probe_at_ninety_percent_mastery_promotes() {
    let probe = CalibrationProbe {
        item_difficulty: 1.2,
        theta_estimate: 1.2,
        full_marks: true,
    };
    let change = transition(Lane::Training, 0.90, &probe, &LaneConfig::default()).unwrap();
    assert_eq!(change.to, Lane::Retention);
    assert_eq!(
        change.reason,
        TransitionReason::Promoted {
            mastery_probability: 0.90,
            probe_gap: 0.0
        }
    );
}

#[test]
fn integration_promotion_then_single_slip_reverts() {
    common::init_tracing();
    let engine = AdaptiveEngine::new(EngineConfig::default()).unwrap();
    let snapshot = strong_topic("u1", "alg", 1.5, 0.3, 0.90, Lane::Training);
    let probe_item = item("probe", 1.5, &["alg"]);

    let promoted = engine
        .record_attempt(&snapshot, &probe_item, &attempt("u1", &probe_item, 1, hours(0)))
        .unwrap();
    let topic = &promoted.snapshot.topics["alg"];
    assert_eq!(topic.lane, Lane::Retention);
    assert_eq!(topic.last_transition_at, Some(hours(0)));
    assert!(topic.mastery_probability >= 0.85);
    assert_eq!(topic.next_review_at, Some(hours(24)));
    let (topic_id, change) = promoted.transitions().next().unwrap();
    assert_eq!(topic_id, "alg");
    assert!(matches!(change.reason, TransitionReason::Promoted { probe_gap, .. } if probe_gap == 0.0));

    let review_item = item("review", 1.4, &["alg"]);
    let slipped = engine
        .record_attempt(
            &promoted.snapshot,
            &review_item,
            &attempt("u1", &review_item, 0, hours(30)),
        )
        .unwrap();
    let topic = &slipped.snapshot.topics["alg"];
    assert_eq!(topic.lane, Lane::Training);
    assert_eq!(topic.next_review_at, None);
    assert_eq!(
        slipped.transitions().next().map(|(_, c)| c.reason),
        Some(TransitionReason::Slip)
    );
}

#[test]
fn integration_off_level_success_does_not_promote() {
    let engine = AdaptiveEngine::new(EngineConfig::default()).unwrap();
    let snapshot = strong_topic("u1", "alg", 1.5, 0.3, 0.90, Lane::Training);
    let easy = item("easy", 0.5, &["alg"]);

    let outcome = engine
        .record_attempt(&snapshot, &easy, &attempt("u1", &easy, 1, hours(0)))
        .unwrap();
    assert!(outcome.snapshot.topics["alg"].mastery_probability >= 0.85);
    assert_eq!(outcome.snapshot.topics["alg"].lane, Lane::Training);
    assert_eq!(outcome.transitions().count(), 0);
}

#[test]
fn integration_partial_credit_is_a_slip_in_retention() {
    let engine = AdaptiveEngine::new(EngineConfig::default()).unwrap();
    let snapshot = strong_topic("u1", "alg", 1.5, 0.3, 0.95, Lane::Retention);
    let mut def = danci_adaptive::ItemDefinition::new("essay", 1.5, &["alg"]);
    def.thresholds = Some(vec![-0.5, 0.5]);
    let essay = danci_adaptive::CalibratedItem::load(&def).unwrap();

    let outcome = engine
        .record_attempt(&snapshot, &essay, &attempt("u1", &essay, 1, hours(0)))
        .unwrap();
    assert!(!outcome.full_marks);
    assert_eq!(outcome.snapshot.topics["alg"].lane, Lane::Training);
}

#[test]
fn integration_other_topics_are_untouched() {
    let engine = AdaptiveEngine::new(EngineConfig::default()).unwrap();
    let mut snapshot = strong_topic("u1", "alg", 1.5, 0.3, 0.90, Lane::Retention);
    let geo = strong_topic("u1", "geo", 0.2, 0.5, 0.40, Lane::Training).topics["geo"].clone();
    snapshot.topics.insert("geo".into(), geo.clone());

    let q = item("q", 1.5, &["alg"]);
    let outcome = engine
        .record_attempt(&snapshot, &q, &attempt("u1", &q, 0, hours(0)))
        .unwrap();
    assert_eq!(outcome.snapshot.topics["geo"], geo);
}
