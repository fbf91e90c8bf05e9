//! # danci-adaptive - adaptive estimation and selection engine
//!
//! Pure Rust implementation of the adaptive practice loop:
//!
//! - **EAP Estimator** - grid-quadrature ability update after each response
//! - **Partial Credit** - graded scoring with a binomial fallback
//! - **Mastery Tiers** - mastery probability and Novice..Master levels
//! - **Blueprint Compliance** - steer practice back toward target topic mix
//! - **Exposure & Fatigue** - cooldowns, overexposure decay, session fatigue
//! - **Seeded Ranker** - Thompson-style item selection from an explicit seed
//! - **Retention** - overdue priority, review budget, review intervals
//! - **Lanes** - Training ⇄ Retention hand-off per topic
//!
//! ## Design
//!
//! - **Pure** - no I/O, no clock, no global state; every call is a function
//!   of explicit immutable inputs
//! - **Deterministic** - the only randomness is a ChaCha8 stream seeded by
//!   the caller
//! - **Auditable** - every selection returns the full multiplier breakdown
//!
//! ## Modules
//!
//! - [`estimator`] - quadrature grid and EAP posterior
//! - [`scoring`] - Rasch / partial-credit / binomial models, item loading
//! - [`mastery`] - mastery probability and level classification
//! - [`blueprint`] - target vs observed topic proportions
//! - [`exposure`] - cooldown, exposure and fatigue multipliers
//! - [`sampling`] - seeded exploration stream
//! - [`ranker`] - candidate scoring and selection
//! - [`retention`] - review scheduling
//! - [`lanes`] - lane state machine
//! - [`engine`] - attempt processing and replay
//! - [`ports`] - persistence / telemetry / content interfaces
//! - [`sanitize`] - numerical hygiene
//! - [`types`] - shared types and constants
//!
//! ## Example
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use danci_adaptive::{
//!     AdaptiveEngine, BlueprintTarget, CalibratedItem, EngineConfig, ItemDefinition,
//!     LearnerSnapshot, PracticeDistribution, SelectionRequest, SessionState,
//! };
//!
//! let engine = AdaptiveEngine::new(EngineConfig::default())?;
//! let items = CalibratedItem::load_all(&[
//!     ItemDefinition::new("q1", -0.3, &["algebra"]),
//!     ItemDefinition::new("q2", 0.4, &["geometry"]),
//! ])?;
//! let blueprint = BlueprintTarget::from_pairs(&[("algebra", 0.6), ("geometry", 0.4)])?;
//! let snapshot = LearnerSnapshot::new("learner-1");
//! let practice = PracticeDistribution::default();
//! let session = SessionState::default();
//!
//! let request = SelectionRequest {
//!     snapshot: &snapshot,
//!     items: &items,
//!     blueprint: &blueprint,
//!     practice: &practice,
//!     session: &session,
//!     now: Utc.with_ymd_and_hms(2024, 9, 1, 8, 0, 0).unwrap(),
//!     seed: 42,
//! };
//! let decision = engine.select_next(&request)?;
//! assert_eq!(decision.candidates.len(), 2);
//! # Ok::<(), danci_adaptive::EngineError>(())
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod config;
pub mod error;
pub mod sanitize;
pub mod types;
pub mod scoring;
pub mod estimator;
pub mod mastery;
pub mod blueprint;
pub mod exposure;
pub mod sampling;
pub mod retention;
pub mod lanes;
pub mod ranker;
pub mod engine;
pub mod ports;

// ============================================================================
// Re-exports
// ============================================================================

pub use types::*;

pub use config::{
    BlueprintConfig, EngineConfig, ExposureConfig, FatigueConfig, LaneConfig, MasteryConfig,
    MasteryTier, QuadratureConfig, RankerConfig, RetentionConfig,
};

pub use error::{EngineError, Result};

pub use scoring::{CalibratedItem, ScoringModel};

pub use estimator::{Posterior, Prior, QuadratureGrid};

pub use mastery::MasteryAssessment;

pub use blueprint::{BlueprintTarget, ComplianceReport, PracticeDistribution, TopicCompliance};

pub use exposure::CooldownVerdict;

pub use sampling::ExplorationStream;

pub use retention::ReviewBudget;

pub use lanes::{CalibrationProbe, LaneTransition, TransitionReason};

pub use ranker::{CandidateScore, ExposureUpdate, SelectionDecision, SelectionRequest, SessionState};

pub use engine::{
    record_attempt, replay, replay_learners, select, AdaptiveEngine, AttemptOutcome, LearnerLog,
    TopicDelta,
};

pub use ports::{AttemptStore, InMemoryAttemptStore, ItemSource, TelemetrySink};
