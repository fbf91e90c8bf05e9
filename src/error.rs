//! Engine error taxonomy.
//!
//! Every failure propagates synchronously to the caller. The engine never
//! retries and never returns a partial result.

use crate::types::Lane;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Malformed item, threshold, score or event data.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Nothing left to select after lane and cooldown filtering.
    #[error("no eligible items (lane {lane:?}, {considered} considered, {excluded_by_cooldown} in cooldown)")]
    NoEligibleItems {
        lane: Lane,
        considered: usize,
        excluded_by_cooldown: usize,
    },

    /// Ability or topic state outside its valid domain.
    #[error("state corruption: {0}")]
    StateCorruption(String),

    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

impl EngineError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidParameter(message.into())
    }

    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::StateCorruption(message.into())
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
