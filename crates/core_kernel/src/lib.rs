//! Core Kernel - Foundational types for the revenue split engine
//!
//! This crate provides the building blocks used across the domain crates:
//! - Money in integer minor units and exact percentages
//! - Effective periods for time-bounded rules
//! - Strongly-typed identifiers

pub mod money;
pub mod temporal;
pub mod identifiers;

pub use money::{apportion, Currency, Money, MoneyError, Percentage, PercentageShare};
pub use temporal::{EffectivePeriod, TemporalError};
pub use identifiers::{
    AdjustmentId, AuditEventId, MerchantId, PartnerId, SplitResultId, SplitRuleId,
};
