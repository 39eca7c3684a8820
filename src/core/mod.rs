// Core engine exports
pub mod matchmaker;
pub mod queue;
pub mod rating;
pub mod registry;
pub mod relay;

use thiserror::Error;

use crate::services::StoreError;

/// Core error taxonomy.
///
/// `AlreadyQueued` and `AlreadyInSession` are state-integrity errors; the
/// normal request path prevents them by force-cleaning the user first, so
/// surfacing one means a caller skipped that step.
#[derive(Debug, Error)]
pub enum MatchError {
    #[error("user is already in the waiting queue")]
    AlreadyQueued,

    #[error("user is already in an active session")]
    AlreadyInSession,

    #[error("user is banned")]
    Banned,

    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub use matchmaker::{EngineStats, MatchOutcome, Matchmaker, PairState};
pub use queue::{CandidateFilter, WaitQueue};
pub use rating::{DislikeProtection, RatingEngine, ReputationBoost};
pub use registry::{EndedSession, SessionRegistry};
pub use relay::{Relay, RelayOutcome};
