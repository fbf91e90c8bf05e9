//! Collaborator interfaces.
//!
//! The engine never performs I/O. Persistence, telemetry and content delivery
//! live behind these traits and are driven by the host around engine calls.

use std::collections::BTreeMap;

use crate::engine::AttemptOutcome;
use crate::error::{EngineError, Result};
use crate::ranker::SelectionDecision;
use crate::scoring::CalibratedItem;
use crate::types::{AttemptEvent, ItemDefinition, LearnerId};

/// Append-only attempt log, keyed by learner.
pub trait AttemptStore {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Every logged attempt of a learner, oldest first.
    fn load(&self, learner_id: &str) -> std::result::Result<Vec<AttemptEvent>, Self::Error>;

    fn append(&mut self, event: AttemptEvent) -> std::result::Result<(), Self::Error>;
}

/// Receives audit records; formatting and aggregation are its own business.
pub trait TelemetrySink {
    type Error: std::error::Error + Send + Sync + 'static;

    fn record_selection(&mut self, decision: &SelectionDecision) -> std::result::Result<(), Self::Error>;

    fn record_attempt(
        &mut self,
        event: &AttemptEvent,
        outcome: &AttemptOutcome,
    ) -> std::result::Result<(), Self::Error>;
}

/// Supplies item definitions as authored.
pub trait ItemSource {
    type Error: std::error::Error + Send + Sync + 'static;

    fn items(&self) -> std::result::Result<Vec<ItemDefinition>, Self::Error>;
}

/// Pull every item from `source` and calibrate it.
pub fn calibrate_from<S: ItemSource>(source: &S) -> Result<Vec<CalibratedItem>> {
    let defs = source
        .items()
        .map_err(|e| EngineError::invalid(format!("item source failed: {e}")))?;
    CalibratedItem::load_all(&defs)
}

#[derive(Debug, thiserror::Error)]
pub enum InMemoryStoreError {
    #[error("attempt for {learner_id} is older than the last logged attempt")]
    OutOfOrder { learner_id: LearnerId },
}

/// [`AttemptStore`] kept in process memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAttemptStore {
    logs: BTreeMap<LearnerId, Vec<AttemptEvent>>,
}

impl InMemoryAttemptStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn learners(&self) -> impl Iterator<Item = &LearnerId> {
        self.logs.keys()
    }

    pub fn len(&self) -> usize {
        self.logs.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AttemptStore for InMemoryAttemptStore {
    type Error = InMemoryStoreError;

    fn load(&self, learner_id: &str) -> std::result::Result<Vec<AttemptEvent>, Self::Error> {
        Ok(self.logs.get(learner_id).cloned().unwrap_or_default())
    }

    fn append(&mut self, event: AttemptEvent) -> std::result::Result<(), Self::Error> {
        let log = self.logs.entry(event.learner_id.clone()).or_default();
        if let Some(last) = log.last() {
            if event.timestamp < last.timestamp {
                return Err(InMemoryStoreError::OutOfOrder {
                    learner_id: event.learner_id,
                });
            }
        }
        log.push(event);
        Ok(())
    }
}

impl ItemSource for Vec<ItemDefinition> {
    type Error = std::convert::Infallible;

    fn items(&self) -> std::result::Result<Vec<ItemDefinition>, Self::Error> {
        Ok(self.clone())
    }
}
