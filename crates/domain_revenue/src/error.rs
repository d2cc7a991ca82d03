//! Revenue domain errors
//!
//! Every variant is a deterministic, recoverable condition. Nothing here is
//! retried internally; callers correct their input and try again.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use core_kernel::{
    AdjustmentId, Currency, MerchantId, Money, MoneyError, SplitResultId, SplitRuleId,
    TemporalError,
};

/// Errors that can occur in the revenue split domain
#[derive(Debug, Error, PartialEq)]
pub enum RevenueError {
    /// A rule set mutation would violate its invariants
    #[error("Validation error on {field}: {message}")]
    Validation {
        field: String,
        message: String,
        /// Computed total percentage, when the failure is an over-allocation
        total: Option<Decimal>,
    },

    /// The rules handed to the calculator are not usable at the timestamp
    #[error("Invalid rule set: {reason}")]
    InvalidRuleSet {
        reason: String,
        total: Option<Decimal>,
    },

    /// An input amount is negative
    #[error("Negative amount for {field}: {amount}")]
    NegativeAmount {
        field: String,
        amount: Money,
    },

    #[error("Unknown split result: {0}")]
    UnknownSplitResult(SplitResultId),

    #[error("Adjustment already applied: {0}")]
    AlreadyApplied(AdjustmentId),

    #[error("Split result is finalized: {0}")]
    FinalizedResult(SplitResultId),

    #[error("Split rule not found: {0}")]
    RuleNotFound(SplitRuleId),

    #[error("No rule set configured for merchant: {0}")]
    UnknownMerchant(MerchantId),

    #[error("Currency mismatch: expected {expected}, got {actual}")]
    CurrencyMismatch {
        expected: Currency,
        actual: Currency,
    },

    /// Optimistic concurrency check on a rule set failed
    #[error("Rule set version conflict: expected {expected}, found {actual}")]
    VersionConflict {
        expected: u64,
        actual: u64,
    },

    #[error("Actor {actor} is not allowed to {capability}")]
    Unauthorized {
        actor: String,
        capability: String,
    },

    #[error("Audit event at {attempted} precedes last recorded event at {last}")]
    AuditOutOfOrder {
        last: DateTime<Utc>,
        attempted: DateTime<Utc>,
    },

    #[error("Money error: {0}")]
    Money(#[from] MoneyError),
}

impl RevenueError {
    /// Creates a validation error for a field
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        RevenueError::Validation {
            field: field.into(),
            message: message.into(),
            total: None,
        }
    }

    /// Creates a validation error for an over-allocated percentage total
    pub fn over_allocated(total: Decimal) -> Self {
        RevenueError::Validation {
            field: "percentage".to_string(),
            message: format!("total active percentage would be {}%, exceeding 100%", total),
            total: Some(total),
        }
    }

    /// Creates a rule set error
    pub fn invalid_rule_set(reason: impl Into<String>) -> Self {
        RevenueError::InvalidRuleSet {
            reason: reason.into(),
            total: None,
        }
    }

    pub fn currency_mismatch(expected: Currency, actual: Currency) -> Self {
        RevenueError::CurrencyMismatch { expected, actual }
    }
}

impl From<TemporalError> for RevenueError {
    fn from(err: TemporalError) -> Self {
        RevenueError::validation("effective_to", err.to_string())
    }
}
