//! Caller-facing error taxonomy (spec §7).
//!
//! Internal plumbing (hot-store persistence, write-queue jobs, startup
//! wiring) keeps using `anyhow::Error` with `.context(..)` breadcrumbs, the
//! same way the teacher's `MatchConfig::save`/`get` do. `CoreError` is only
//! for the boundary the matchmaker, lifecycle service, and admin override
//! expose to presenters, so that a presenter can match on a kind without
//! downcasting an `anyhow::Error`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    #[error("not authorized: {0}")]
    AuthorizationFailure(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// A mutator detected a broken invariant. This is a programmer error:
    /// surface it immediately, do not commit, do not retry.
    #[error("integrity violation: {0}")]
    IntegrityViolation(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
