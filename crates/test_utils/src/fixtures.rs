//! Pre-built Test Fixtures
//!
//! Provides ready-to-use test data for the revenue split engine. Everything
//! here is deterministic so expected values can be written by hand.

use chrono::{DateTime, Duration, TimeZone, Utc};
use core_kernel::{Currency, MerchantId, Money, PartnerId, Percentage};
use domain_revenue::{Actor, Role};
use rust_decimal::Decimal;
use uuid::Uuid;

/// Fixture for Money test data
pub struct MoneyFixtures;

impl MoneyFixtures {
    /// USD amount from cents
    pub fn usd(minor: i64) -> Money {
        Money::from_minor(minor, Currency::USD)
    }

    /// $1000.00, the gross amount used by most scenarios
    pub fn usd_1000() -> Money {
        Self::usd(100_000)
    }

    pub fn usd_zero() -> Money {
        Money::zero(Currency::USD)
    }

    /// Creates a EUR amount for currency mismatch tests
    pub fn eur(minor: i64) -> Money {
        Money::from_minor(minor, Currency::EUR)
    }
}

/// Fixture for temporal test data
pub struct TemporalFixtures;

impl TemporalFixtures {
    /// Start of the standard rule period (Jan 1, 2024)
    pub fn rules_start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    /// Mid-year timestamp used as the default split instant
    pub fn mid_year() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    /// Before any standard rule takes effect
    pub fn before_rules() -> DateTime<Utc> {
        Self::rules_start() - Duration::days(30)
    }

    pub fn days_after_start(days: i64) -> DateTime<Utc> {
        Self::rules_start() + Duration::days(days)
    }
}

/// Fixture for identifiers
pub struct IdFixtures;

impl IdFixtures {
    pub fn merchant_id() -> MerchantId {
        MerchantId::new()
    }

    /// Partner id with a fixed, ordered value
    ///
    /// `partner(1) < partner(2)`, which makes rounding tie-breaks predictable.
    pub fn partner(n: u128) -> PartnerId {
        PartnerId::from_uuid(Uuid::from_u128(n))
    }
}

/// Fixture for actors
pub struct ActorFixtures;

impl ActorFixtures {
    pub fn owner() -> Actor {
        Actor::new("owner@merchant.test", Role::MerchantOwner)
    }

    pub fn finance() -> Actor {
        Actor::new("finance@merchant.test", Role::FinanceManager)
    }

    pub fn partner() -> Actor {
        Actor::new("partner@affiliate.test", Role::Partner)
    }

    pub fn viewer() -> Actor {
        Actor::new("viewer@merchant.test", Role::Viewer)
    }
}

/// Builds a percentage, panicking on out-of-range input
pub fn pct(value: Decimal) -> Percentage {
    Percentage::new(value).expect("percentage fixture out of range")
}
