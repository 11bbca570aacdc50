//! Error types for the Wagerpot wagering engine.
//!
//! All errors use the `WP_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Match registry errors
//! - 2xx: Ledger errors
//! - 3xx: Wager errors
//! - 4xx: Settlement errors
//! - 5xx: External feed errors
//! - 8xx: Security / admission errors
//! - 9xx: General / internal errors

use thiserror::Error;

use crate::{Identity, MatchId};

/// Central error enum for all Wagerpot operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WagerpotError {
    // =================================================================
    // Match Registry Errors (1xx)
    // =================================================================
    /// A match is already Open; only one may be active at a time.
    #[error("WP_ERR_100: Match {active} is already open; resolve it before scheduling another")]
    Conflict { active: MatchId },

    /// The requested match does not exist.
    #[error("WP_ERR_101: Match not found: {0}")]
    MatchNotFound(MatchId),

    /// The winning side is not one of the match's two labels.
    #[error("WP_ERR_102: Invalid side {side:?} for {match_id}")]
    InvalidSide { match_id: MatchId, side: String },

    /// The match no longer accepts wagers.
    #[error("WP_ERR_103: Match {0} is not open for wagers")]
    MatchClosed(MatchId),

    // =================================================================
    // Ledger Errors (2xx)
    // =================================================================
    /// Not enough points to cover the debit.
    #[error("WP_ERR_200: Insufficient balance: need {needed}, have {available}")]
    InsufficientBalance { needed: u64, available: u64 },

    /// No ledger entry matches the reference.
    #[error("WP_ERR_201: Identity not found: {0}")]
    IdentityNotFound(Identity),

    // =================================================================
    // Wager / Input Errors (3xx)
    // =================================================================
    /// Missing or malformed input (empty label, non-positive stake, etc.).
    #[error("WP_ERR_300: Validation failed: {reason}")]
    Validation { reason: String },

    // =================================================================
    // Settlement Errors (4xx)
    // =================================================================
    /// The match was already resolved.
    #[error("WP_ERR_400: Match already resolved: {0}")]
    AlreadyResolved(MatchId),

    /// Pot conservation invariant violated; the settlement plan is discarded.
    #[error("WP_ERR_401: Pot invariant violation: {reason}")]
    PotInvariantViolation { reason: String },

    // =================================================================
    // External Feed Errors (5xx)
    // =================================================================
    /// The upstream feed could not be reached or returned garbage.
    #[error("WP_ERR_500: Feed unavailable: {reason}")]
    FeedUnavailable { reason: String },

    /// The feed has no API key or event key configured.
    #[error("WP_ERR_501: Feed not configured: API key and event key are required")]
    FeedUnconfigured,

    /// The upstream result cannot be mapped to a winner (tie, blank result).
    #[error("WP_ERR_502: Feed result undecidable: {reason}")]
    FeedResultUndecidable { reason: String },

    // =================================================================
    // Security / Admission Errors (8xx)
    // =================================================================
    /// Admission controller denied the call.
    #[error("WP_ERR_800: Rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// The caller has no valid session for this operation.
    #[error("WP_ERR_801: Unauthorized")]
    Unauthorized,

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error.
    #[error("WP_ERR_900: Internal error: {0}")]
    Internal(String),

    /// Configuration error (bad environment value, out-of-range setting).
    #[error("WP_ERR_902: Configuration error: {0}")]
    Configuration(String),
}

/// Coarse error classification handed to the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Conflict,
    NotFound,
    AlreadyResolved,
    InvalidSide,
    InsufficientBalance,
    ValidationError,
    RateLimited,
    FeedUnavailable,
    FeedUnconfigured,
    Unauthorized,
    Internal,
}

impl WagerpotError {
    /// Shorthand for [`WagerpotError::Validation`].
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    /// Classify this error for 1:1 mapping onto user-visible messages.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::MatchNotFound(_) | Self::IdentityNotFound(_) => ErrorKind::NotFound,
            Self::AlreadyResolved(_) => ErrorKind::AlreadyResolved,
            Self::InvalidSide { .. } => ErrorKind::InvalidSide,
            Self::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
            Self::Validation { .. } | Self::MatchClosed(_) | Self::FeedResultUndecidable { .. } => {
                ErrorKind::ValidationError
            }
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::FeedUnavailable { .. } => ErrorKind::FeedUnavailable,
            Self::FeedUnconfigured => ErrorKind::FeedUnconfigured,
            Self::Unauthorized => ErrorKind::Unauthorized,
            Self::PotInvariantViolation { .. } | Self::Internal(_) | Self::Configuration(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Seconds the caller should wait before retrying, if this is a rate-limit denial.
    #[must_use]
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        }
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, WagerpotError>;
