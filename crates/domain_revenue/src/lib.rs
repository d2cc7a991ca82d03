//! Revenue Domain - Split & Payout Computation
//!
//! This crate distributes a merchant's revenue between the merchant and any
//! number of partners, and keeps an auditable record of how it did so.
//!
//! # Key Concepts
//!
//! - **Split Rule**: a partner's entitlement, either a percentage of the
//!   gross amount or a minimum guarantee
//! - **Rule Set**: every rule a merchant has configured, with effective
//!   periods; active percentages never exceed 100% at any instant
//! - **Split Result**: the reconciled allocation of one source amount
//! - **Adjustment**: a signed post-hoc change producing a new revision
//! - **Audit Event**: an immutable record of one state change
//!
//! # Exactness
//!
//! All amounts are integer minor units. For every computed split,
//! `merchant_share + Σ partner shares == source_amount` holds exactly.
//!
//! # Example
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use core_kernel::{Currency, Money, PartnerId, Percentage};
//! use domain_revenue::{SplitCalculator, SplitRule};
//! use rust_decimal_macros::dec;
//!
//! let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
//! let rules = [SplitRule::percentage(PartnerId::new(), Percentage::new(dec!(30)).unwrap(), at)];
//! let usd = |minor| Money::from_minor(minor, Currency::USD);
//!
//! let split = SplitCalculator::default()
//!     .compute(usd(100_000), usd(0), usd(0), &rules, at)
//!     .unwrap();
//!
//! assert_eq!(split.merchant_share, usd(70_000));
//! assert!(split.is_reconciled());
//! ```

pub mod adjustment;
pub mod audit;
pub mod calculator;
pub mod capability;
pub mod config;
pub mod error;
pub mod rule;
pub mod rule_set;
pub mod services;

pub use adjustment::{Adjustment, AdjustmentKind, SplitLedger, SplitStatus};
pub use audit::{AuditAction, AuditEvent, AuditQuery, AuditRecorder, EntityType, FieldChange};
pub use calculator::{FeePolicy, PartnerShare, SplitCalculator, SplitResult};
pub use capability::{Actor, AllowAll, Capability, CapabilityCheck, Role, RoleCapabilities};
pub use config::SplitEngineConfig;
pub use error::RevenueError;
pub use rule::{RuleKind, SplitRule};
pub use rule_set::SplitRuleSet;
pub use services::{RevenueSplitService, SplitRequest};
