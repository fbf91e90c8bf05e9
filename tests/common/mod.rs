#![allow(dead_code)]

use std::sync::Once;

use chrono::{DateTime, Duration, TimeZone, Utc};
use danci_adaptive::{
    AttemptEvent, BlueprintTarget, CalibratedItem, ItemDefinition, Lane, LearnerSnapshot,
    TopicMastery,
};

static INIT: Once = Once::new();

/// Route engine logs to the test harness; `RUST_LOG=danci_adaptive=debug` to see them.
pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 9, 2, 8, 0, 0).unwrap()
}

pub fn hours(h: i64) -> DateTime<Utc> {
    t0() + Duration::hours(h)
}

pub fn item(id: &str, difficulty: f64, topics: &[&str]) -> CalibratedItem {
    CalibratedItem::load(&ItemDefinition::new(id, difficulty, topics)).unwrap()
}

/// `count` items on one topic with difficulties spread over [-1, 1].
pub fn topic_bank(topic: &str, count: usize) -> Vec<CalibratedItem> {
    (0..count)
        .map(|i| {
            let b = if count > 1 {
                -1.0 + 2.0 * i as f64 / (count - 1) as f64
            } else {
                0.0
            };
            item(&format!("{topic}-{i:02}"), b, &[topic])
        })
        .collect()
}

pub fn blueprint(pairs: &[(&str, f64)]) -> BlueprintTarget {
    BlueprintTarget::from_pairs(pairs).unwrap()
}

pub fn attempt(learner: &str, item: &CalibratedItem, score: u32, at: DateTime<Utc>) -> AttemptEvent {
    AttemptEvent {
        learner_id: learner.to_string(),
        item_id: item.id.clone(),
        topic_ids: item.topic_ids.clone(),
        score,
        duration_secs: 30.0,
        timestamp: at,
    }
}

/// A snapshot whose `topic` is already well established.
pub fn strong_topic(learner: &str, topic: &str, theta: f64, se: f64, mastery: f64, lane: Lane) -> LearnerSnapshot {
    let mut snapshot = LearnerSnapshot::new(learner);
    let mut record = TopicMastery::fresh(topic, 1.0);
    record.theta = theta;
    record.se = se;
    record.mastery_probability = mastery;
    record.lane = lane;
    record.attempts = 10;
    record.recent_outcomes = std::iter::repeat(true).take(10).collect();
    snapshot.topics.insert(topic.to_string(), record);
    snapshot
}
