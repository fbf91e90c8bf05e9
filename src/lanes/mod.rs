//! Lane Hand-off State Machine
//!
//! Each topic is either in Training (new material) or Retention (spaced
//! review); topics start in Training.
//!
//! - Training → Retention: mastery probability ≥ 0.85 and the response is a
//!   full-marks calibration probe on an item whose difficulty lies within
//!   θ̂ ± 0.3 of the topic estimate
//! - Retention → Training: any response short of full marks
//!
//! There are no other states or transitions, and no debounce on the slip rule.

use serde::{Deserialize, Serialize};

use crate::config::LaneConfig;
use crate::types::{Lane, EPSILON};

/// A response viewed as a local check of the topic estimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationProbe {
    pub item_difficulty: f64,
    /// Topic θ̂ before the response was folded in.
    pub theta_estimate: f64,
    pub full_marks: bool,
}

impl CalibrationProbe {
    pub fn gap(&self) -> f64 {
        (self.item_difficulty - self.theta_estimate).abs()
    }

    pub fn confirms(&self, window: f64) -> bool {
        self.full_marks && self.gap() <= window + EPSILON
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum TransitionReason {
    Promoted { mastery_probability: f64, probe_gap: f64 },
    Slip,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LaneTransition {
    pub from: Lane,
    pub to: Lane,
    pub reason: TransitionReason,
}

/// Decide whether one response moves a topic to the other lane.
pub fn transition(
    current: Lane,
    mastery_probability: f64,
    probe: &CalibrationProbe,
    config: &LaneConfig,
) -> Option<LaneTransition> {
    match current {
        Lane::Training => {
            if mastery_probability >= config.promote_mastery && probe.confirms(config.probe_window) {
                Some(LaneTransition {
                    from: Lane::Training,
                    to: Lane::Retention,
                    reason: TransitionReason::Promoted {
                        mastery_probability,
                        probe_gap: probe.gap(),
                    },
                })
            } else {
                None
            }
        }
        Lane::Retention => {
            if probe.full_marks {
                None
            } else {
                Some(LaneTransition {
                    from: Lane::Retention,
                    to: Lane::Training,
                    reason: TransitionReason::Slip,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe(difficulty: f64, theta: f64, full_marks: bool) -> CalibrationProbe {
        CalibrationProbe {
            item_difficulty: difficulty,
            theta_estimate: theta,
            full_marks,
        }
    }

    #[test]
    fn test_promotes_on_mastery_and_zero_gap_probe() {
        let t = transition(Lane::Training, 0.90, &probe(0.4, 0.4, true), &LaneConfig::default());
        let t = t.unwrap();
        assert_eq!(t.to, Lane::Retention);
        assert!(matches!(t.reason, TransitionReason::Promoted { probe_gap, .. } if probe_gap == 0.0));
    }

    #[test]
    fn test_mastery_alone_is_not_enough() {
        let c = LaneConfig::default();
        assert!(transition(Lane::Training, 0.99, &probe(1.0, 0.4, true), &c).is_none());
        assert!(transition(Lane::Training, 0.99, &probe(0.4, 0.4, false), &c).is_none());
    }

    #[test]
    fn test_probe_alone_is_not_enough() {
        let c = LaneConfig::default();
        assert!(transition(Lane::Training, 0.84, &probe(0.4, 0.4, true), &c).is_none());
    }

    #[test]
    fn test_probe_window_edges() {
        let c = LaneConfig::default();
        assert!(transition(Lane::Training, 0.85, &probe(0.25, 0.0, true), &c).is_some());
        assert!(transition(Lane::Training, 0.85, &probe(-0.31, 0.0, true), &c).is_none());
    }

    #[test]
    fn test_gap_at_window_edge_after_rounding_confirms() {
        // |0.4 - 0.1| evaluates to 0.30000000000000004.
        let p = probe(0.4, 0.1, true);
        assert!(p.gap() > 0.3);
        assert!(p.confirms(0.3));
        assert!(transition(Lane::Training, 0.9, &p, &LaneConfig::default()).is_some());
    }

    #[test]
    fn test_single_slip_reverts_immediately() {
        let t = transition(Lane::Retention, 0.99, &probe(0.0, 0.0, false), &LaneConfig::default());
        assert_eq!(
            t,
            Some(LaneTransition {
                from: Lane::Retention,
                to: Lane::Training,
                reason: TransitionReason::Slip,
            })
        );
    }

    #[test]
    fn test_correct_review_stays_in_retention() {
        let c = LaneConfig::default();
        assert!(transition(Lane::Retention, 0.2, &probe(3.0, 0.0, true), &c).is_none());
    }
}
