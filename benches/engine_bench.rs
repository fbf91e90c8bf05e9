//! Benchmark suite for danci-adaptive
//!
//! Run with: cargo bench

use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use danci_adaptive::{
    AdaptiveEngine, AttemptEvent, BlueprintTarget, CalibratedItem, EngineConfig, ItemDefinition,
    LearnerLog, LearnerSnapshot, Posterior, PracticeDistribution, Prior, SelectionRequest,
    SessionState,
};

const TOPICS: [&str; 4] = ["alg", "geo", "num", "stat"];

fn pool(size: usize) -> Vec<CalibratedItem> {
    (0..size)
        .map(|i| {
            let mut def = ItemDefinition::new(
                format!("q{i:04}"),
                -2.0 + 4.0 * (i as f64 / size as f64),
                &[TOPICS[i % TOPICS.len()]],
            );
            if i % 3 == 0 {
                def.thresholds = Some(vec![-0.6, 0.0, 0.6]);
            }
            CalibratedItem::load(&def).unwrap()
        })
        .collect()
}

fn bench_eap_update(c: &mut Criterion) {
    let engine = AdaptiveEngine::new(EngineConfig::default()).unwrap();
    let items = pool(3);
    let prior = Prior::Normal { theta: 0.2, se: 0.8 };
    c.bench_function("QuadratureGrid::update_item (binomial)", |b| {
        b.iter(|| engine.grid().update_item(black_box(&prior), &items[1], 1))
    });
    c.bench_function("QuadratureGrid::update_item (partial credit)", |b| {
        b.iter(|| engine.grid().update_item(black_box(&prior), &items[0], 2))
    });
}

fn bench_select_next(c: &mut Criterion) {
    let engine = AdaptiveEngine::new(EngineConfig::default()).unwrap();
    let snapshot = LearnerSnapshot::new("bench");
    let target =
        BlueprintTarget::from_pairs(&[("alg", 0.4), ("geo", 0.3), ("num", 0.2), ("stat", 0.1)]).unwrap();
    let history: Vec<Vec<String>> = (0..50).map(|i| vec![TOPICS[i % 2].to_string()]).collect();
    let practice = PracticeDistribution::from_topic_sets(history.iter().map(|s| s.as_slice()));
    let session = SessionState {
        elapsed_secs: 1200.0,
        review_secs: 0.0,
        recent_outcomes: vec![true, true, false, true],
    };
    let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

    let mut group = c.benchmark_group("select_next");
    for size in [50usize, 500, 2000] {
        let items = pool(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &items, |b, items| {
            b.iter(|| {
                let request = SelectionRequest {
                    snapshot: &snapshot,
                    items,
                    blueprint: &target,
                    practice: &practice,
                    session: &session,
                    now,
                    seed: black_box(42),
                };
                engine.select_next(&request)
            })
        });
    }
    group.finish();
}

fn bench_replay_learners(c: &mut Criterion) {
    let engine = AdaptiveEngine::new(EngineConfig::default()).unwrap();
    let items = pool(40);
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let logs: Vec<LearnerLog> = (0..64)
        .map(|l| {
            let learner_id = format!("l{l}");
            let events = (0..100)
                .map(|i| {
                    let item = &items[(i * 7 + l) % items.len()];
                    AttemptEvent {
                        learner_id: learner_id.clone(),
                        item_id: item.id.clone(),
                        topic_ids: item.topic_ids.clone(),
                        score: ((i + l) % 2) as u32,
                        duration_secs: 30.0,
                        timestamp: start + Duration::minutes(i as i64),
                    }
                })
                .collect();
            LearnerLog {
                learner_id,
                prior: Posterior { theta: 0.0, se: 1.0 },
                events,
            }
        })
        .collect();

    c.bench_function("replay_learners (64 x 100)", |b| {
        b.iter(|| engine.replay_learners(black_box(&logs), &items))
    });
}

criterion_group!(benches, bench_eap_update, bench_select_next, bench_replay_learners);
criterion_main!(benches);
